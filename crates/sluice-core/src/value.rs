//! Typed filter, cursor and row values.

use serde::{Deserialize, Deserializer, Serialize};

/// A value supplied by a client: a filter operand, a cursor key, or a cell of
/// an insert/update payload.
///
/// JSON objects have no variant of their own; they arrive as their JSON text
/// in [`Value::String`] and are cast by the query builder when the target
/// column is `json`/`jsonb`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical text form, as Postgres would accept it for an input cast.
    /// `None` for `Null`. Lists render as array literals.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(b.to_string()),
            Value::Int(n) => Some(n.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::String(s) => Some(s.clone()),
            Value::List(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|v| match v.to_text() {
                        None => "NULL".to_string(),
                        Some(t) => format!("\"{}\"", t.replace('\\', "\\\\").replace('"', "\\\"")),
                    })
                    .collect();
                Some(format!("{{{}}}", parts.join(",")))
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            obj @ serde_json::Value::Object(_) => Value::String(obj.to_string()),
        }
    }
}

// Goes through `serde_json::Value` so objects are accepted wherever a value is.
impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_conversion() {
        assert_eq!(Value::from(json!(42)), Value::Int(42));
        assert_eq!(Value::from(json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from(json!("x")), Value::from("x"));
        assert_eq!(Value::from(json!([1, null])), Value::List(vec![Value::Int(1), Value::Null]));
        assert_eq!(Value::from(json!({"a": 1})), Value::from(r#"{"a":1}"#));
        assert_eq!(Value::from(vec![1, 2]).to_json(), json!([1, 2]));
    }

    #[test]
    fn untagged_serde_keeps_number_kind() {
        let v: Value = serde_json::from_str("42").unwrap();
        assert_eq!(v, Value::Int(42));
        let v: Value = serde_json::from_str("2.0").unwrap();
        assert_eq!(v, Value::Float(2.0));
        let v: Value = serde_json::from_str("null").unwrap();
        assert!(v.is_null());
        assert_eq!(serde_json::to_string(&Value::Float(2.0)).unwrap(), "2.0");
    }

    #[test]
    fn objects_deserialize_as_json_text() {
        let v: Value = serde_json::from_str(r#"{"k": 1}"#).unwrap();
        assert_eq!(v, Value::from(r#"{"k":1}"#));
        let v: Value = serde_json::from_str(r#"[{"a": true}, 2]"#).unwrap();
        assert_eq!(v, Value::List(vec![Value::from(r#"{"a":true}"#), Value::Int(2)]));
    }

    #[test]
    fn text_rendering() {
        assert_eq!(Value::Null.to_text(), None);
        assert_eq!(Value::Bool(true).to_text().as_deref(), Some("true"));
        assert_eq!(
            Value::from(vec!["a", "b\"c"]).to_text().as_deref(),
            Some(r#"{"a","b\"c"}"#)
        );
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Null]).to_text().as_deref(),
            Some(r#"{"1",NULL}"#)
        );
    }
}
