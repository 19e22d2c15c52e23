//! Record helpers.
//!
//! Backends return rows as JSON objects whose column names may come back
//! upper-cased, so every column access goes through [`lookup`].

use crate::model::PrimaryKey;
use crate::{Error, Result};
use serde_json::{Map, Number, Value};
use std::fmt;

/// A row: column name → JSON value.
pub type Record = Map<String, Value>;

/// Finds a column by exact name, then upper-case, then lower-case.
pub fn lookup<'a>(record: &'a Record, column: &str) -> Option<&'a Value> {
    record
        .get(column)
        .or_else(|| record.get(&column.to_uppercase()))
        .or_else(|| record.get(&column.to_lowercase()))
}

/// Copy of `record` with every key present both as-is and lower-cased.
pub fn normalize_for_edit(record: &Record) -> Record {
    let mut normalized = record.clone();
    for (key, value) in record {
        let lower = key.to_lowercase();
        if !normalized.contains_key(&lower) {
            normalized.insert(lower, value.clone());
        }
    }
    normalized
}

/// Converts an arbitrary JSON value into a record.
pub fn as_record(value: Value) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::validation(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

/// Short name of a JSON value's type.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// String form of a value as users see it.
///
/// Strings are returned raw, null is empty, and integral floats print
/// without a fractional part.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Missing, null, or the empty string.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Numeric reading of a value: numbers, or strings that parse as numbers.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// JSON value for a computed number; integral results become integers.
///
/// Non-finite results become null.
pub fn number_value(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        return Value::from(n as i64);
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

/// Loose equality: identical values, or equal display strings when
/// neither side is null (`1` matches `"1"`).
pub fn values_match(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    if a.is_null() || b.is_null() {
        return false;
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => display_string(a) == display_string(b),
    }
}

// ============================================================================
// RecordKey
// ============================================================================

/// Identifies one record for update and delete.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordKey {
    /// A single key column.
    Single {
        /// Key column name.
        column: String,
        /// Key value.
        value: Value,
    },
    /// Several key columns, in key order.
    Composite(Record),
}

impl RecordKey {
    /// A single `id` key.
    pub fn id(value: impl Into<Value>) -> Self {
        Self::Single {
            column: "id".to_string(),
            value: value.into(),
        }
    }

    /// Extracts the key of `record`.
    ///
    /// Fails when a key column is missing or null.
    pub fn from_record(record: &Record, key: &PrimaryKey) -> Result<Self> {
        let fetch = |column: &str| -> Result<Value> {
            match lookup(record, column) {
                Some(v) if !v.is_null() => Ok(v.clone()),
                _ => Err(Error::validation_field(
                    column,
                    format!("record has no value for key column '{column}'"),
                )),
            }
        };

        if key.is_composite() {
            let mut values = Record::new();
            for column in key.columns() {
                values.insert(column.to_string(), fetch(column)?);
            }
            Ok(Self::Composite(values))
        } else {
            let column = key.columns().first().copied().unwrap_or("id").to_string();
            let value = fetch(&column)?;
            Ok(Self::Single { column, value })
        }
    }

    /// Returns `true` if `record` carries this key.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::Single { column, value } => {
                lookup(record, column).is_some_and(|v| values_match(v, value))
            }
            Self::Composite(values) => values.iter().all(|(column, value)| {
                lookup(record, column).is_some_and(|v| values_match(v, value))
            }),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single { column, value } => write!(f, "{column}={}", display_string(value)),
            Self::Composite(values) => {
                let parts: Vec<String> = values
                    .iter()
                    .map(|(c, v)| format!("{c}={}", display_string(v)))
                    .collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}
