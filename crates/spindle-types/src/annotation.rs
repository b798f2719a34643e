use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Free-form key/value annotations attached to any entity.
pub type Annotations = BTreeMap<String, AnnotationValue>;

/// A scalar magnitude paired with its physical units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub magnitude: f64,
    pub units: String,
}

impl Quantity {
    pub fn new(magnitude: f64, units: impl Into<String>) -> Self {
        Self {
            magnitude,
            units: units.into(),
        }
    }
}

/// A value stored in an entity's annotation map.
///
/// Not every variant survives a trip through the container format: physical
/// quantities and nested sequences are dropped on write, unsigned integers
/// that do not fit `i64` are dropped, and bytes come back as text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    /// Unsigned scalar, narrowed to `Int` when stored.
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// Stored as integer epoch seconds.
    DateTime(NaiveDateTime),
    Quantity(Quantity),
    List(Vec<AnnotationValue>),
}

impl AnnotationValue {
    /// Short type label used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::DateTime(_) => "datetime",
            Self::Quantity(_) => "quantity",
            Self::List(_) => "list",
        }
    }

    /// Returns `true` for every variant except `List`.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl From<bool> for AnnotationValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AnnotationValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for AnnotationValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u64> for AnnotationValue {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f64> for AnnotationValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AnnotationValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AnnotationValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<NaiveDateTime> for AnnotationValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<Quantity> for AnnotationValue {
    fn from(v: Quantity) -> Self {
        Self::Quantity(v)
    }
}

impl<T: Into<AnnotationValue>> From<Vec<T>> for AnnotationValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(AnnotationValue::from("x"), AnnotationValue::Text("x".into()));
        assert_eq!(AnnotationValue::from(3), AnnotationValue::Int(3));
        assert_eq!(
            AnnotationValue::from(vec![1.0, 2.0]),
            AnnotationValue::List(vec![
                AnnotationValue::Float(1.0),
                AnnotationValue::Float(2.0)
            ])
        );
    }

    #[test]
    fn scalar_detection() {
        assert!(AnnotationValue::Bool(true).is_scalar());
        assert!(AnnotationValue::Quantity(Quantity::new(1.0, "mV")).is_scalar());
        assert!(!AnnotationValue::List(vec![]).is_scalar());
    }

    #[test]
    fn float_accessor_widens_ints() {
        assert_eq!(AnnotationValue::Int(4).as_float(), Some(4.0));
        assert_eq!(AnnotationValue::Text("4".into()).as_float(), None);
    }
}
