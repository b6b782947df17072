//! Request failure outcomes and response payload encoding

use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;

/// Everything a requester can observe instead of a result
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RouterFailure {
    #[error("Unsupported message kind: {kind}")]
    Unsupported { kind: String },

    #[error("Error handling message of type {kind}: {message}")]
    Handler { kind: String, message: String },

    /// Failure payload relayed from the peer that handled the request
    #[error("{message}")]
    Remote { code: Option<String>, message: String },

    #[error("Transport closed before a response arrived")]
    TransportClosed,

    #[error("Bridge not ready")]
    BridgeNotReady,

    #[error("Unknown endpoint: {name}")]
    UnknownEndpoint { name: String },

    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Correlation id already outstanding: {id}")]
    DuplicateId { id: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Router shut down")]
    Shutdown,
}

impl RouterFailure {
    /// Stable wire code carried in the failure payload's `kind` field
    pub fn code(&self) -> &str {
        match self {
            RouterFailure::Unsupported { .. } => "unsupported",
            RouterFailure::Handler { .. } => "handler",
            RouterFailure::Remote { code, .. } => code.as_deref().unwrap_or("remote"),
            RouterFailure::TransportClosed => "transport",
            RouterFailure::BridgeNotReady => "not_ready",
            RouterFailure::UnknownEndpoint { .. } => "unknown_endpoint",
            RouterFailure::Timeout(_) => "timeout",
            RouterFailure::DuplicateId { .. } => "duplicate_id",
            RouterFailure::Cancelled => "cancelled",
            RouterFailure::Shutdown => "shutdown",
        }
    }

    /// True for unsupported-kind failures, local or relayed
    pub fn is_unsupported(&self) -> bool {
        self.code() == "unsupported"
    }

    /// Encode as a `{error: true, kind, message}` payload
    pub fn to_payload(&self) -> Value {
        failure_payload(self.code(), &self.to_string())
    }
}

pub fn success_payload(data: Value) -> Value {
    json!({ "error": false, "data": data })
}

pub fn failure_payload(code: &str, message: &str) -> Value {
    json!({ "error": true, "kind": code, "message": message })
}

/// Turn a response payload back into a result
///
/// Payloads that are not wrapped in the `error` envelope are passed through
/// as the result unchanged.
pub fn decode_response(mut data: Value) -> Result<Value, RouterFailure> {
    match data.get("error").and_then(Value::as_bool) {
        Some(true) => {
            let code = data.get("kind").and_then(Value::as_str).map(str::to_string);
            let message = data
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            Err(RouterFailure::Remote { code, message })
        }
        Some(false) => Ok(data.get_mut("data").map(Value::take).unwrap_or(Value::Null)),
        None => Ok(data),
    }
}
