//! Conversions between `ticketdb_core::Value` and PostgreSQL wire types

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres_types::{FromSql, IsNull, ToSql, Type};
use ticketdb_core::Value;
use tokio_postgres::Row as PgRow;

type BoxError = Box<dyn std::error::Error + Sync + Send>;

/// Owned parameter value; tokio-postgres binds `&dyn ToSql`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    DateTimeUtc(DateTime<Utc>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl PgValue {
    /// Convert a value to the variant matching the prepared parameter type,
    /// so integers are written with the column's width and strings bound to
    /// JSONB or timestamp parameters are parsed first.
    pub(crate) fn for_type(value: &Value, target: &Type) -> Self {
        match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => PgValue::Bool(*v),
            Value::Int16(v) => Self::coerce_int(i64::from(*v), target),
            Value::Int32(v) => Self::coerce_int(i64::from(*v), target),
            Value::Int64(v) => Self::coerce_int(*v, target),
            Value::Float64(v) => match *target {
                Type::FLOAT4 => PgValue::Float32(*v as f32),
                _ => PgValue::Float64(*v),
            },
            Value::Decimal(v) => PgValue::String(v.clone()),
            Value::String(v) => Self::coerce_string(v, target),
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Uuid(v) => PgValue::Uuid(*v),
            Value::Json(v) => match *target {
                Type::TEXT | Type::VARCHAR => PgValue::String(v.to_string()),
                _ => PgValue::Json(v.clone()),
            },
            Value::DateTimeUtc(v) => match *target {
                Type::TIMESTAMP => PgValue::DateTime(v.naive_utc()),
                _ => PgValue::DateTimeUtc(*v),
            },
            Value::Date(v) => PgValue::Date(*v),
            Value::DateTime(v) => match *target {
                Type::TIMESTAMPTZ => PgValue::DateTimeUtc(v.and_utc()),
                _ => PgValue::DateTime(*v),
            },
            Value::Array(_) => PgValue::String(value.to_string()),
        }
    }

    fn coerce_int(value: i64, target: &Type) -> Self {
        match *target {
            Type::INT2 => i16::try_from(value).map_or(PgValue::Int64(value), PgValue::Int16),
            Type::INT4 => i32::try_from(value).map_or(PgValue::Int64(value), PgValue::Int32),
            Type::TEXT | Type::VARCHAR => PgValue::String(value.to_string()),
            _ => PgValue::Int64(value),
        }
    }

    fn coerce_string(value: &str, target: &Type) -> Self {
        let parsed = match *target {
            Type::JSON | Type::JSONB => serde_json::from_str(value).ok().map(PgValue::Json),
            Type::DATE => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(PgValue::Date),
            Type::TIMESTAMP => parse_naive_timestamp(value).map(PgValue::DateTime),
            Type::TIMESTAMPTZ => DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|ts| ts.with_timezone(&Utc))
                .or_else(|| parse_naive_timestamp(value).map(|ts| ts.and_utc()))
                .map(PgValue::DateTimeUtc),
            Type::BOOL => match value.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Some(PgValue::Bool(true)),
                "false" | "f" | "0" => Some(PgValue::Bool(false)),
                _ => None,
            },
            Type::INT2 | Type::INT4 | Type::INT8 => value
                .trim()
                .parse::<i64>()
                .ok()
                .map(|v| Self::coerce_int(v, target)),
            _ => None,
        };
        parsed.unwrap_or_else(|| PgValue::String(value.to_string()))
    }
}

fn parse_naive_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

impl ToSql for PgValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            PgValue::Null => Ok(IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::Int16(v) => v.to_sql(ty, out),
            PgValue::Int32(v) => v.to_sql(ty, out),
            PgValue::Int64(v) => v.to_sql(ty, out),
            PgValue::Float32(v) => v.to_sql(ty, out),
            PgValue::Float64(v) => v.to_sql(ty, out),
            PgValue::String(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Uuid(v) => v.to_sql(ty, out),
            PgValue::Json(v) => v.to_sql(ty, out),
            PgValue::DateTimeUtc(v) => v.to_sql(ty, out),
            PgValue::Date(v) => v.to_sql(ty, out),
            PgValue::DateTime(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}

/// Raw UTF-8 payload of a column whose type has no dedicated mapping
/// (enums, domains, text-like extension types).
struct FallbackString(String);

impl<'a> FromSql<'a> for FallbackString {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(Self(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Option<T> {
    row.try_get::<_, Option<T>>(idx).ok().flatten()
}

/// Decode one column of a result row
pub(crate) fn column_value(row: &PgRow, idx: usize) -> Value {
    let Some(column) = row.columns().get(idx) else {
        return Value::Null;
    };

    let value = match column.type_().name() {
        "bool" => get(row, idx).map(Value::Bool),
        "int2" => get(row, idx).map(Value::Int16),
        "int4" => get(row, idx).map(Value::Int32),
        "int8" => get(row, idx).map(Value::Int64),
        "float4" => get::<f32>(row, idx).map(|v| Value::Float64(f64::from(v))),
        "float8" => get(row, idx).map(Value::Float64),
        "text" | "varchar" | "bpchar" | "name" => get(row, idx).map(Value::String),
        "bytea" => get(row, idx).map(Value::Bytes),
        "uuid" => get(row, idx).map(Value::Uuid),
        "json" | "jsonb" => get(row, idx).map(Value::Json),
        "date" => get(row, idx).map(Value::Date),
        "time" => get::<NaiveTime>(row, idx).map(|v| Value::String(v.to_string())),
        "timestamp" => get(row, idx).map(Value::DateTime),
        "timestamptz" => get(row, idx).map(Value::DateTimeUtc),
        "_text" | "_varchar" | "_bpchar" => get::<Vec<String>>(row, idx)
            .map(|arr| Value::Array(arr.into_iter().map(Value::String).collect())),
        "_int4" => get::<Vec<i32>>(row, idx)
            .map(|arr| Value::Array(arr.into_iter().map(Value::Int32).collect())),
        "_int8" => get::<Vec<i64>>(row, idx)
            .map(|arr| Value::Array(arr.into_iter().map(Value::Int64).collect())),
        _ => get::<FallbackString>(row, idx).map(|v| Value::String(v.0)),
    };

    value.unwrap_or(Value::Null)
}

/// Decode every column of a result row
pub(crate) fn row_values(row: &PgRow) -> Vec<Value> {
    (0..row.len()).map(|idx| column_value(row, idx)).collect()
}
