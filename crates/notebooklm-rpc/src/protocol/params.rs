//! Positional parameter trees for batchexecute calls.
//!
//! The wire format addresses arguments by list position, not by name.
//! Absent arguments must be an explicit `Null` at their slot; dropping a
//! trailing position shifts every later argument and silently changes the
//! call's meaning.

use crate::{Result, RpcError};
use serde_json::Value;

/// One node of a positional parameter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Build a list node from anything convertible to parameter values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ParamValue>,
    {
        ParamValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }

    /// Convert to a JSON value, rejecting trees the wire format cannot
    /// carry (non-finite floats).
    pub fn to_json(&self) -> Result<Value> {
        match self {
            ParamValue::Null => Ok(Value::Null),
            ParamValue::Bool(b) => Ok(Value::Bool(*b)),
            ParamValue::Int(n) => Ok(Value::from(*n)),
            ParamValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .ok_or_else(|| RpcError::Encoding {
                    message: format!("non-finite float {f} cannot be serialized"),
                }),
            ParamValue::Str(s) => Ok(Value::String(s.clone())),
            ParamValue::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.to_json()?);
                }
                Ok(Value::Array(out))
            }
        }
    }

    /// Serialize to the compact textual form embedded in the envelope.
    pub fn serialize_compact(&self) -> Result<String> {
        let json = self.to_json()?;
        serde_json::to_string(&json).map_err(|e| RpcError::Encoding {
            message: format!("parameter tree serialization failed: {e}"),
        })
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl From<Vec<ParamValue>> for ParamValue {
    fn from(v: Vec<ParamValue>) -> Self {
        ParamValue::List(v)
    }
}

/// `None` maps to an explicit `Null` slot, keeping positions stable.
impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => ParamValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars_to_json() {
        assert_eq!(ParamValue::Null.to_json().unwrap(), Value::Null);
        assert_eq!(ParamValue::from(true).to_json().unwrap(), Value::Bool(true));
        assert_eq!(ParamValue::from(42).to_json().unwrap(), Value::from(42));
        assert_eq!(
            ParamValue::from("abc").to_json().unwrap(),
            Value::String("abc".to_string())
        );
    }

    #[test]
    fn test_list_preserves_positions() {
        let tree = ParamValue::list([
            ParamValue::Null,
            ParamValue::from("abc"),
            ParamValue::list([ParamValue::from(1)]),
        ]);
        assert_eq!(
            tree.serialize_compact().unwrap(),
            r#"[null,"abc",[1]]"#
        );
    }

    #[test]
    fn test_none_becomes_explicit_null() {
        let absent: Option<&str> = None;
        let tree = ParamValue::list([ParamValue::from(absent), ParamValue::from("x")]);
        assert_eq!(tree.serialize_compact().unwrap(), r#"[null,"x"]"#);
    }

    #[test]
    fn test_nested_lists_serialize_compact() {
        let tree = ParamValue::list([
            ParamValue::from("nb_123"),
            ParamValue::list([ParamValue::list([ParamValue::from("src_1")])]),
        ]);
        assert_eq!(
            tree.serialize_compact().unwrap(),
            r#"["nb_123",[["src_1"]]]"#
        );
    }

    #[test]
    fn test_non_finite_float_is_encoding_error() {
        let tree = ParamValue::list([ParamValue::from(f64::NAN)]);
        let err = tree.serialize_compact().unwrap_err();
        assert!(matches!(err, RpcError::Encoding { .. }));
    }

    #[test]
    fn test_float_serializes() {
        let tree = ParamValue::from(1.5);
        assert_eq!(tree.serialize_compact().unwrap(), "1.5");
    }
}
