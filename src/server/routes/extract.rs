use crate::db::MetricRecord;
use crate::error::ValidationError;
use crate::utils::logging::debug_json;
use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::Serialize;
use serde_json::{Map, Value};

/// `POST /metric` body as sent. Fields stay untyped until `validate` so that every missing or
/// mistyped field can be reported at once.
#[derive(Debug, Default, Serialize)]
pub struct MetricBody {
    pub room: Option<Value>,
    pub time: Option<Value>,
    pub metric: Option<Value>,
    pub action: Option<Value>,
}

impl MetricBody {
    pub fn from_slice(raw: &[u8]) -> Result<Self, ValidationError> {
        let mut fields = json_object(raw)?;
        Ok(Self {
            room: fields.remove("room"),
            time: fields.remove("time"),
            metric: fields.remove("metric"),
            action: fields.remove("action"),
        })
    }

    pub fn validate(self) -> Result<MetricRecord, ValidationError> {
        let mut invalid = Vec::new();
        let room = require_string("room", self.room, &mut invalid);
        let time = require_string("time", self.time, &mut invalid);
        let metric = require_string("metric", self.metric, &mut invalid);
        let action = require_string("action", self.action, &mut invalid);

        match (room, time, metric, action) {
            (Some(room), Some(time), Some(metric), Some(action)) => Ok(MetricRecord {
                room,
                time,
                metric,
                action,
            }),
            _ => Err(ValidationError::Fields { fields: invalid }),
        }
    }
}

/// Parses `raw` as a JSON object. Syntax errors and any other top-level value (arrays
/// included) are `InvalidJson`.
pub(crate) fn json_object(raw: &[u8]) -> Result<Map<String, Value>, ValidationError> {
    match serde_json::from_slice::<Value>(raw) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(ValidationError::InvalidJson {
            detail: format!("expected a JSON object, found {}", json_kind(&other)),
        }),
        Err(e) => Err(ValidationError::InvalidJson {
            detail: e.to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Takes the string out of `value`, or records `name` as invalid.
pub(crate) fn require_string(
    name: &'static str,
    value: Option<Value>,
    invalid: &mut Vec<&'static str>,
) -> Option<String> {
    if let Some(Value::String(s)) = value {
        Some(s)
    } else {
        invalid.push(name);
        None
    }
}

/// Extractor yielding a validated `MetricRecord`.
pub(crate) struct MetricPayload(pub(crate) MetricRecord);

impl<S> FromRequest<S> for MetricPayload
where
    S: Send + Sync,
{
    type Rejection = ValidationError;

    /// The body is decoded as JSON whatever the content type says. Syntax errors and non-object
    /// bodies become `InvalidJson`; a well-formed object with missing or non-string fields
    /// becomes `Fields`.
    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let raw = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ValidationError::InvalidJson {
                detail: rejection.body_text(),
            })?;
        let body = MetricBody::from_slice(&raw)?;
        debug_json("Extracted metric request body", &body);
        Ok(Self(body.validate()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> MetricBody {
        MetricBody::from_slice(value.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn complete_body_validates() {
        let record = body(json!({"room":"201","time":"now","metric":"temp","action":"write"}))
            .validate()
            .unwrap();
        assert_eq!(record.values(), ["201", "now", "temp", "write"]);
    }

    #[test]
    fn missing_and_mistyped_fields_are_listed_in_order() {
        let err = body(json!({"room": 201, "metric": "temp", "action": null}))
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::Fields {
                fields: vec!["room", "time", "action"]
            }
        );
    }

    #[test]
    fn extra_fields_are_ignored() {
        let record = body(json!({"room":"a","time":"b","metric":"c","action":"d","x":1}))
            .validate()
            .unwrap();
        assert_eq!(record.room, "a");
    }

    #[test]
    fn array_body_is_not_an_object() {
        let err = MetricBody::from_slice(br#"["201","now","temp","write"]"#).unwrap_err();
        assert!(
            matches!(&err, ValidationError::InvalidJson { detail } if detail.contains("an array")),
            "{err:?}"
        );
    }

    #[test]
    fn scalar_and_malformed_bodies_are_invalid_json() {
        for raw in [&b"\"room\""[..], b"42", b"null", b"{\"room\":"] {
            assert!(matches!(
                MetricBody::from_slice(raw),
                Err(ValidationError::InvalidJson { .. })
            ));
        }
    }
}
