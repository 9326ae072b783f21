use crate::transport::TransportError;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Shown when neither the server nor the error itself provides any text
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Error of a single service operation
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The server answered but reported a failure in its envelope
    #[error("{0}")]
    Refused(String),

    #[error("{0}")]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

/// UI-facing error: always just a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_ERROR)
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&ServiceError> for ErrorInfo {
    fn from(err: &ServiceError) -> Self {
        if let ServiceError::Transport(transport) = err {
            if let Some(message) = transport.server_message() {
                return ErrorInfo::new(message.trim());
            }
        }

        let display = err.to_string();
        if !display.trim().is_empty() {
            return ErrorInfo::new(display.trim());
        }

        let mut source = err.source();
        while let Some(cause) = source {
            let text = cause.to_string();
            if !text.trim().is_empty() {
                return ErrorInfo::new(text.trim());
            }
            source = cause.source();
        }

        ErrorInfo::unknown()
    }
}

impl From<ServiceError> for ErrorInfo {
    fn from(err: ServiceError) -> Self {
        ErrorInfo::from(&err)
    }
}
