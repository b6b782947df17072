//! Handler error types

use thiserror::Error;

/// Failure modes a handler can declare
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("{capability} is not supported on this host")]
    NotSupported { capability: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Command '{command}' failed: {message}")]
    Command { command: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn not_supported(capability: impl Into<String>) -> Self {
        Self::NotSupported {
            capability: capability.into(),
        }
    }

    /// A required payload field is absent or has the wrong type
    pub fn missing(field: &str) -> Self {
        Self::InvalidArgument(format!("'{}' is required", field))
    }

    /// Declared outcomes are answered quietly; anything else is also shown to the user
    pub fn is_declared(&self) -> bool {
        matches!(
            self,
            HandlerError::NotFound { .. } | HandlerError::NotSupported { .. } | HandlerError::InvalidArgument(_)
        )
    }
}
