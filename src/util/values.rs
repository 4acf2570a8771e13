//! Metadata value trees and element-wise ("deep") operations on them.

use serde_json::Value;
use std::fmt;

/// A decoded metadata value.
///
/// Scalars are `Number`, vectors and arrays are (nested) `Array`s.
#[derive(Clone, Debug, PartialEq)]
pub enum MetadataValue {
    Number(f64),
    Boolean(bool),
    String(String),
    Array(Vec<MetadataValue>),
}

impl MetadataValue {
    /// Build a value from a JSON value. Objects and `null` have no
    /// metadata representation.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(Self::Number),
            Value::Bool(b) => Some(Self::Boolean(*b)),
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Self::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Self::Array),
            Value::Null | Value::Object(_) => None,
        }
    }

    /// Convert into a JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Boolean(b) => Value::Bool(*b),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    /// Build an array of numbers.
    pub fn numbers(values: impl IntoIterator<Item = f64>) -> Self {
        Self::Array(values.into_iter().map(Self::Number).collect())
    }

    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_array(&self) -> Option<&[MetadataValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Apply `f` to every number in the tree.
    pub fn map_numbers(&self, f: &impl Fn(f64) -> f64) -> Self {
        match self {
            Self::Number(n) => Self::Number(f(*n)),
            Self::Array(items) => Self::Array(items.iter().map(|v| v.map_numbers(f)).collect()),
            other => other.clone(),
        }
    }

    /// Combine two trees element-wise. A number on one side is broadcast
    /// against an array on the other side.
    pub fn zip_numbers(&self, other: &MetadataValue, f: &impl Fn(f64, f64) -> f64) -> Self {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => Self::Number(f(*a, *b)),
            (Self::Array(a), Self::Array(b)) => Self::Array(
                a.iter().zip(b.iter()).map(|(x, y)| x.zip_numbers(y, f)).collect(),
            ),
            (Self::Array(a), n @ Self::Number(_)) => {
                Self::Array(a.iter().map(|x| x.zip_numbers(n, f)).collect())
            }
            (n @ Self::Number(_), Self::Array(b)) => {
                Self::Array(b.iter().map(|y| n.zip_numbers(y, f)).collect())
            }
            (a, _) => a.clone(),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::String(s) => write!(f, "{}", s),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

fn any_deep(a: &MetadataValue, b: &MetadataValue, pred: &impl Fn(f64, f64) -> bool) -> bool {
    use MetadataValue::*;
    match (a, b) {
        (Number(x), Number(y)) => pred(*x, *y),
        (Array(xs), Array(ys)) => xs.iter().zip(ys.iter()).any(|(x, y)| any_deep(x, y, pred)),
        (Array(xs), n @ Number(_)) => xs.iter().any(|x| any_deep(x, n, pred)),
        (n @ Number(_), Array(ys)) => ys.iter().any(|y| any_deep(n, y, pred)),
        _ => false,
    }
}

/// Whether any element of `value` is smaller than the corresponding
/// element of `bound`.
pub fn any_deep_less_than(value: &MetadataValue, bound: &MetadataValue) -> bool {
    any_deep(value, bound, &|a, b| a < b)
}

/// Whether any element of `value` is greater than the corresponding
/// element of `bound`.
pub fn any_deep_greater_than(value: &MetadataValue, bound: &MetadataValue) -> bool {
    any_deep(value, bound, &|a, b| a > b)
}

/// Element-wise minimum.
pub fn deep_min(a: &MetadataValue, b: &MetadataValue) -> MetadataValue {
    a.zip_numbers(b, &f64::min)
}

/// Element-wise maximum.
pub fn deep_max(a: &MetadataValue, b: &MetadataValue) -> MetadataValue {
    a.zip_numbers(b, &f64::max)
}

/// Exact structural equality. Arrays of different lengths are unequal.
pub fn deep_equals(a: &MetadataValue, b: &MetadataValue) -> bool {
    use MetadataValue::*;
    match (a, b) {
        (Number(x), Number(y)) => x == y,
        (Array(xs), Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(x, y)| deep_equals(x, y))
        }
        _ => a == b,
    }
}
