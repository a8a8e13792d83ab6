//! Core value and result types

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A database value that can represent any column or parameter type the
/// ticket tracker uses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// 16-bit signed integer
    Int16(i16),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// Decimal/Numeric (stored as string for precision)
    Decimal(String),
    /// UTF-8 string
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// UUID
    Uuid(Uuid),
    /// Date (year, month, day)
    Date(NaiveDate),
    /// DateTime without timezone
    DateTime(NaiveDateTime),
    /// DateTime with timezone (UTC)
    DateTimeUtc(DateTime<Utc>),
    /// JSON value
    Json(serde_json::Value),
    /// Array of values
    Array(Vec<Value>),
}

impl Value {
    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            Value::Decimal(s) | Value::String(s) => s.parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as a UTC timestamp; naive timestamps are assumed to be UTC
    pub fn as_datetime_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTimeUtc(v) => Some(*v),
            Value::DateTime(v) => Some(v.and_utc()),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Uuid(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::DateTimeUtc(v) => write!(f, "{}", v),
            Value::Json(v) => write!(f, "{}", v),
            Value::Array(v) => write!(f, "[{} items]", v.len()),
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_for_value! {
    bool => Bool,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f64 => Float64,
    String => String,
    Vec<u8> => Bytes,
    Uuid => Uuid,
    NaiveDate => Date,
    NaiveDateTime => DateTime,
    DateTime<Utc> => DateTimeUtc,
    serde_json::Value => Json,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A row from a query result
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Column values
    pub values: Vec<Value>,
    /// Column names, in result order
    columns: Vec<String>,
}

impl Row {
    /// Create a new row
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Get a value by column index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Convert to a HashMap
    pub fn to_map(&self) -> HashMap<String, Value> {
        self.columns
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// What a statement produced.
///
/// `Rows(vec![])` (a row-returning statement that matched nothing) and
/// `NoResultSet` (DDL, UPDATE without RETURNING) are deliberately distinct.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The statement produced a result set, possibly empty
    Rows(Vec<Row>),
    /// The statement produced no result set
    NoResultSet {
        /// Rows affected, as reported by the backing store
        affected_rows: u64,
    },
}

impl QueryOutcome {
    pub fn no_result_set(affected_rows: u64) -> Self {
        QueryOutcome::NoResultSet { affected_rows }
    }

    /// The rows, or `None` when the statement produced no result set
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            QueryOutcome::Rows(rows) => Some(rows),
            QueryOutcome::NoResultSet { .. } => None,
        }
    }

    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            QueryOutcome::Rows(rows) => Some(rows),
            QueryOutcome::NoResultSet { .. } => None,
        }
    }

    /// First row of a result set
    pub fn first(&self) -> Option<&Row> {
        self.rows().and_then(|rows| rows.first())
    }

    pub fn is_no_result_set(&self) -> bool {
        matches!(self, QueryOutcome::NoResultSet { .. })
    }

    /// True only for a result set with at least one row
    pub fn has_rows(&self) -> bool {
        self.rows().is_some_and(|rows| !rows.is_empty())
    }

    /// Number of rows in the result set, or affected rows otherwise
    pub fn row_count(&self) -> u64 {
        match self {
            QueryOutcome::Rows(rows) => rows.len() as u64,
            QueryOutcome::NoResultSet { affected_rows } => *affected_rows,
        }
    }
}
