//! Row decoding helpers shared by the models

use chrono::{DateTime, Utc};
use ticketdb_core::{QueryOutcome, Row, Value};

use crate::error::{ModelError, ModelResult};

/// Build a record from one result row
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> ModelResult<Self>;
}

fn column<'r>(row: &'r Row, name: &str) -> ModelResult<&'r Value> {
    row.get_by_name(name)
        .ok_or_else(|| ModelError::MissingColumn(name.to_string()))
}

fn mismatch(name: &str, expected: &str, found: &Value) -> ModelError {
    ModelError::UnexpectedResult(format!(
        "column '{}' should be {}, found {:?}",
        name, expected, found
    ))
}

pub(crate) fn opt_id(row: &Row, name: &str) -> ModelResult<Option<i32>> {
    match column(row, name)? {
        Value::Null => Ok(None),
        value => value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| mismatch(name, "an integer id", value)),
    }
}

pub(crate) fn id(row: &Row, name: &str) -> ModelResult<i32> {
    opt_id(row, name)?.ok_or_else(|| mismatch(name, "an integer id", &Value::Null))
}

pub(crate) fn opt_string(row: &Row, name: &str) -> ModelResult<Option<String>> {
    match column(row, name)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        value => Err(mismatch(name, "text", value)),
    }
}

pub(crate) fn string(row: &Row, name: &str) -> ModelResult<String> {
    opt_string(row, name)?.ok_or_else(|| mismatch(name, "text", &Value::Null))
}

/// Nullable booleans default to false, as the schema's `DEFAULT FALSE` does
pub(crate) fn flag(row: &Row, name: &str) -> ModelResult<bool> {
    match column(row, name)? {
        Value::Null => Ok(false),
        value => value.as_bool().ok_or_else(|| mismatch(name, "a boolean", value)),
    }
}

pub(crate) fn json(row: &Row, name: &str) -> ModelResult<serde_json::Value> {
    match column(row, name)? {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Json(v) => Ok(v.clone()),
        Value::String(s) => serde_json::from_str(s)
            .map_err(|_| mismatch(name, "JSON", &Value::String(s.clone()))),
        value => Err(mismatch(name, "JSON", value)),
    }
}

pub(crate) fn bytes(row: &Row, name: &str) -> ModelResult<Vec<u8>> {
    let value = column(row, name)?;
    value
        .as_bytes()
        .map(<[u8]>::to_vec)
        .ok_or_else(|| mismatch(name, "binary data", value))
}

pub(crate) fn timestamp(row: &Row, name: &str) -> ModelResult<Option<DateTime<Utc>>> {
    match column(row, name)? {
        Value::Null => Ok(None),
        value => value
            .as_datetime_utc()
            .map(Some)
            .ok_or_else(|| mismatch(name, "a timestamp", value)),
    }
}

fn rows(outcome: QueryOutcome) -> ModelResult<Vec<Row>> {
    outcome.into_rows().ok_or_else(|| {
        ModelError::UnexpectedResult("statement produced no result set".to_string())
    })
}

pub(crate) fn all<T: FromRow>(outcome: QueryOutcome) -> ModelResult<Vec<T>> {
    rows(outcome)?.iter().map(T::from_row).collect()
}

pub(crate) fn optional<T: FromRow>(outcome: QueryOutcome) -> ModelResult<Option<T>> {
    rows(outcome)?.first().map(T::from_row).transpose()
}

/// The `id` of the single row an `INSERT ... RETURNING id` produced
pub(crate) fn returned_id(outcome: QueryOutcome) -> ModelResult<i32> {
    let rows = rows(outcome)?;
    let row = rows.first().ok_or_else(|| {
        ModelError::UnexpectedResult("INSERT ... RETURNING produced no row".to_string())
    })?;
    id(row, "id")
}

/// Whether a `... RETURNING` statement touched at least one row
pub(crate) fn any_returned(outcome: &QueryOutcome) -> bool {
    outcome.has_rows()
}
