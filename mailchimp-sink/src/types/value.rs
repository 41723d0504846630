use std::borrow::Cow;

use chrono::{DateTime, SecondsFormat, Utc};

/// A single field value of a [`crate::types::Row`].
///
/// The variants mirror the column types an upstream pipeline produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Value {
    /// Renders the value as text, or [`None`] when it is null or an empty string.
    ///
    /// Non-string values are stringified, so `42` renders as `"42"` and `1.0` as `"1.0"`.
    pub fn to_text(&self) -> Option<Cow<'_, str>> {
        let text = match self {
            Value::Null => return None,
            Value::Bool(value) => Cow::Owned(value.to_string()),
            Value::I64(value) => Cow::Owned(value.to_string()),
            Value::F64(value) => Cow::Owned(format!("{value:?}")),
            Value::String(value) => Cow::Borrowed(value.as_str()),
            Value::Timestamp(value) => {
                Cow::Owned(value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Json(serde_json::Value::Null) => return None,
            Value::Json(serde_json::Value::String(value)) => Cow::Borrowed(value.as_str()),
            Value::Json(value) => Cow::Owned(value.to_string()),
        };

        if text.is_empty() { None } else { Some(text) }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Maps JSON scalars onto their matching variant. Arrays and objects stay JSON.
impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => Value::I64(value),
                None => number
                    .as_f64()
                    .map_or(Value::Json(serde_json::Value::Number(number)), Value::F64),
            },
            serde_json::Value::String(value) => Value::String(value),
            other => Value::Json(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_to_text_stringifies_scalars() {
        assert_eq!(Value::I64(42).to_text().as_deref(), Some("42"));
        assert_eq!(Value::F64(1.3).to_text().as_deref(), Some("1.3"));
        assert_eq!(Value::Bool(true).to_text().as_deref(), Some("true"));
        assert_eq!(Value::from("a,b").to_text().as_deref(), Some("a,b"));
    }

    #[test]
    fn test_to_text_keeps_the_fraction_of_whole_floats() {
        assert_eq!(Value::F64(1.0).to_text().as_deref(), Some("1.0"));
        assert_eq!(Value::F64(-3.0).to_text().as_deref(), Some("-3.0"));
        assert_eq!(Value::from(json!(2.0)).to_text().as_deref(), Some("2.0"));
    }

    #[test]
    fn test_to_text_treats_null_and_empty_as_absent() {
        assert_eq!(Value::Null.to_text(), None);
        assert_eq!(Value::from("").to_text(), None);
        assert_eq!(Value::Json(json!(null)).to_text(), None);
    }

    #[test]
    fn test_to_text_renders_timestamps_and_json() {
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(
            Value::from(timestamp).to_text().as_deref(),
            Some("2024-05-01T12:30:00Z")
        );
        assert_eq!(
            Value::Json(json!(["a", 1])).to_text().as_deref(),
            Some(r#"["a",1]"#)
        );
    }

    #[test]
    fn test_from_json_value() {
        assert_eq!(Value::from(json!(7)), Value::I64(7));
        assert_eq!(Value::from(json!(2.5)), Value::F64(2.5));
        assert_eq!(Value::from(json!("x")), Value::from("x"));
        assert_eq!(Value::from(json!(null)), Value::Null);
        assert_eq!(Value::from(json!({"a": 1})), Value::Json(json!({"a": 1})));
    }
}
