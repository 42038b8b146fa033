use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DispatchError;

/// What a handler returns: how to build the response, and for how long it
/// may be cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Seconds the response may be cached. Values `<= 0` disable caching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    /// Template under `www/views`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<Value>,
}

impl ResponseDescriptor {
    /// Validate a handler's return value. Anything but a JSON object is a
    /// contract violation.
    pub fn from_value(value: Value) -> Result<Self, DispatchError> {
        match value {
            Value::Object(_) => {
                let desc: Self = serde_json::from_value(value)
                    .map_err(|e| DispatchError::InvalidResult(e.to_string()))?;
                if let Some(code) = desc.status_code {
                    StatusCode::from_u16(code)
                        .map_err(|_| DispatchError::InvalidResult(format!("invalid status_code {}", code)))?;
                }
                Ok(desc)
            }
            Value::Null => Err(DispatchError::InvalidResult("null result".to_string())),
            other => Err(DispatchError::InvalidResult(format!(
                "expected an object, got {}",
                kind(&other)
            ))),
        }
    }

    /// Positive cache lifetime, if any.
    pub fn cache_ttl(&self) -> Option<u64> {
        self.ttl.filter(|t| *t > 0).map(|t| t as u64)
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_parses() {
        let d = ResponseDescriptor::from_value(json!({
            "view": "helloworld.html",
            "package": {"now": 1},
            "ttl": 5
        }))
        .unwrap();
        assert_eq!(d.view.as_deref(), Some("helloworld.html"));
        assert_eq!(d.cache_ttl(), Some(5));
        assert!(d.redirect.is_none());
    }

    #[test]
    fn non_objects_are_rejected() {
        for v in [json!(null), json!("hi"), json!(3), json!([1, 2])] {
            let err = ResponseDescriptor::from_value(v).unwrap_err();
            assert!(matches!(err, DispatchError::InvalidResult(_)));
        }
    }

    #[test]
    fn wrongly_typed_fields_are_rejected() {
        let err = ResponseDescriptor::from_value(json!({"status_code": "teapot"})).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidResult(_)));
    }

    #[test]
    fn out_of_range_status_code_is_rejected() {
        for code in [0, 42, 1000] {
            let err = ResponseDescriptor::from_value(json!({"json": 1, "status_code": code})).unwrap_err();
            assert!(matches!(err, DispatchError::InvalidResult(_)), "{} accepted", code);
        }
        let d = ResponseDescriptor::from_value(json!({"status_code": 204})).unwrap();
        assert_eq!(d.status_code, Some(204));
    }

    #[test]
    fn zero_or_negative_ttl_never_caches() {
        let d = ResponseDescriptor::from_value(json!({"json": [], "ttl": 0})).unwrap();
        assert_eq!(d.cache_ttl(), None);
        let d = ResponseDescriptor::from_value(json!({"json": [], "ttl": -4})).unwrap();
        assert_eq!(d.cache_ttl(), None);
    }

    #[test]
    fn serialization_skips_absent_fields() {
        let d = ResponseDescriptor {
            json: Some(json!({"a": 1})),
            ttl: Some(30),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&d).unwrap(), json!({"json": {"a": 1}, "ttl": 30}));
    }
}
