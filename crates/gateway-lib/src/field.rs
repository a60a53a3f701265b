//! Per-field normalization of loosely-typed backend objects
//!
//! Every value pulled out of a backend response goes through [`Field`] once,
//! so a record is either built completely or rejected with a reason.
//! List operations fold per-element results into a [`Partial`], keeping the
//! successes and a side log of what was skipped.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("required field {0} is missing")]
    Missing(&'static str),
    #[error("field {field} is malformed: {reason}")]
    Malformed { field: &'static str, reason: String },
}

/// Outcome of reading one field from a backend object
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Present(T),
    Absent,
    Malformed(String),
}

impl<T> Field<T> {
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Field::Present(v),
            None => Field::Absent,
        }
    }

    /// Field must be present and well-formed
    pub fn required(self, name: &'static str) -> Result<T, NormalizeError> {
        match self {
            Field::Present(v) => Ok(v),
            Field::Absent => Err(NormalizeError::Missing(name)),
            Field::Malformed(reason) => Err(NormalizeError::Malformed {
                field: name,
                reason,
            }),
        }
    }

    /// Absent falls back to `default`; malformed is still an error
    pub fn or(self, name: &'static str, default: T) -> Result<T, NormalizeError> {
        match self {
            Field::Present(v) => Ok(v),
            Field::Absent => Ok(default),
            Field::Malformed(reason) => Err(NormalizeError::Malformed {
                field: name,
                reason,
            }),
        }
    }

    pub fn optional(self, name: &'static str) -> Result<Option<T>, NormalizeError> {
        match self {
            Field::Present(v) => Ok(Some(v)),
            Field::Absent => Ok(None),
            Field::Malformed(reason) => Err(NormalizeError::Malformed {
                field: name,
                reason,
            }),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Field<U> {
        match self {
            Field::Present(v) => Field::Present(f(v)),
            Field::Absent => Field::Absent,
            Field::Malformed(reason) => Field::Malformed(reason),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Field<U>) -> Field<U> {
        match self {
            Field::Present(v) => f(v),
            Field::Absent => Field::Absent,
            Field::Malformed(reason) => Field::Malformed(reason),
        }
    }
}

fn lookup<'a>(object: &'a Value, pointer: &str) -> Option<&'a Value> {
    object.pointer(pointer).filter(|v| !v.is_null())
}

/// Read a string at a JSON pointer. `null` counts as absent.
pub fn string_at(object: &Value, pointer: &str) -> Field<String> {
    match lookup(object, pointer) {
        None => Field::Absent,
        Some(Value::String(s)) => Field::Present(s.clone()),
        Some(other) => Field::Malformed(format!("expected string at {pointer}, got {other}")),
    }
}

pub fn u64_at(object: &Value, pointer: &str) -> Field<u64> {
    match lookup(object, pointer) {
        None => Field::Absent,
        Some(v) => match v.as_u64() {
            Some(n) => Field::Present(n),
            None => Field::Malformed(format!("expected unsigned integer at {pointer}, got {v}")),
        },
    }
}

pub fn object_at(object: &Value, pointer: &str) -> Field<Map<String, Value>> {
    match lookup(object, pointer) {
        None => Field::Absent,
        Some(Value::Object(map)) => Field::Present(map.clone()),
        Some(other) => Field::Malformed(format!("expected object at {pointer}, got {other}")),
    }
}

pub fn array_at<'a>(object: &'a Value, pointer: &str) -> Field<&'a Vec<Value>> {
    match lookup(object, pointer) {
        None => Field::Absent,
        Some(Value::Array(items)) => Field::Present(items),
        Some(other) => Field::Malformed(format!("expected array at {pointer}, got {other}")),
    }
}

/// An element dropped from a list result
#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub key: String,
    pub reason: String,
}

/// Result of a list operation under the partial-result policy
#[derive(Debug, Clone)]
pub struct Partial<T> {
    pub items: Vec<T>,
    pub skipped: Vec<Skipped>,
}

impl<T> Default for Partial<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> Partial<T> {
    /// Fold keyed per-element results into successes and skipped entries
    pub fn fold<E, I>(results: I) -> Self
    where
        E: std::fmt::Display,
        I: IntoIterator<Item = (String, Result<T, E>)>,
    {
        results
            .into_iter()
            .fold(Partial::default(), |mut acc, (key, result)| {
                match result {
                    Ok(item) => acc.items.push(item),
                    Err(err) => acc.skipped.push(Skipped {
                        key,
                        reason: err.to_string(),
                    }),
                }
                acc
            })
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}
