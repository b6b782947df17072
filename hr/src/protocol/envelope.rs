//! Message envelope and inbound validation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Generate a fresh correlation id
pub fn new_correlation_id() -> String {
    Uuid::now_v7().to_string()
}

/// Which way a message flows relative to its correlation id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Request,
    Response,
    Notification,
}

/// One routed message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message kind, e.g. `readFile`
    #[serde(rename = "messageType")]
    pub kind: String,

    /// Correlation id; echoed verbatim by responses
    #[serde(rename = "messageId")]
    pub correlation_id: String,

    /// Opaque payload
    #[serde(default)]
    pub data: Value,

    /// Optional on the wire; inferred from the pending table when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

/// Reasons an inbound value is not a routable message
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Message is not a JSON object")]
    NotAnObject,

    #[error("Message is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Message could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Envelope {
    pub fn request(kind: impl Into<String>, correlation_id: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            correlation_id: correlation_id.into(),
            data,
            direction: Some(Direction::Request),
        }
    }

    pub fn response(kind: impl Into<String>, correlation_id: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            correlation_id: correlation_id.into(),
            data,
            direction: Some(Direction::Response),
        }
    }

    /// Notifications still carry an id, but nothing waits on it
    pub fn notification(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            correlation_id: new_correlation_id(),
            data,
            direction: Some(Direction::Notification),
        }
    }

    /// Validate and decode a raw inbound value
    ///
    /// `messageType` and `messageId` must both be present strings; `data`
    /// defaults to null.
    pub fn from_value(raw: Value) -> Result<Self, ProtocolError> {
        let obj = raw.as_object().ok_or(ProtocolError::NotAnObject)?;
        if !obj.get("messageType").is_some_and(Value::is_string) {
            return Err(ProtocolError::MissingField("messageType"));
        }
        if !obj.get("messageId").is_some_and(Value::is_string) {
            return Err(ProtocolError::MissingField("messageId"));
        }
        Ok(serde_json::from_value(raw)?)
    }

    /// Serialize to a single line of JSON
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
