//! Error types for the gateway core

use std::fmt;

use rcc_adapter::{AdapterError, ErrorKind, NormalizedError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised by the device inventory
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InventoryError {
    /// Radio not found
    #[error("radio not found: {0}")]
    RadioNotFound(String),

    /// No active radio
    #[error("no active radio selected")]
    NoActiveRadio,

    /// The adapter could not report its frequency profiles
    #[error("failed to load capabilities for radio {radio_id}: {source}")]
    CapabilitiesUnavailable {
        /// Radio being registered or refreshed
        radio_id: String,
        /// Adapter failure
        #[source]
        source: AdapterError,
    },
}

/// Codes a command caller can observe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Parameter or resolved value out of bounds
    InvalidRange,
    /// Transient vendor condition
    Busy,
    /// Device or dependency not reachable
    Unavailable,
    /// Unclassified failure
    Internal,
    /// Unknown radio id
    NotFound,
    /// Malformed request
    BadRequest,
}

impl ErrorCode {
    /// Wire code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRange => "INVALID_RANGE",
            Self::Busy => "BUSY",
            Self::Unavailable => "UNAVAILABLE",
            Self::Internal => "INTERNAL",
            Self::NotFound => "NOT_FOUND",
            Self::BadRequest => "BAD_REQUEST",
        }
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::InvalidRange => Self::InvalidRange,
            ErrorKind::Busy => Self::Busy,
            ErrorKind::Unavailable => Self::Unavailable,
            ErrorKind::Internal => Self::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every orchestrator command
#[derive(Debug, Error)]
pub enum CommandError {
    /// The target radio is not in the inventory
    #[error("radio not found: {0}")]
    NotFound(String),

    /// The request itself is malformed
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A required collaborator (inventory, adapter) is missing
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Validation failure or normalized adapter failure
    #[error(transparent)]
    Normalized(#[from] NormalizedError),
}

impl CommandError {
    pub(crate) fn invalid_range(message: impl Into<String>, details: Option<Value>) -> Self {
        let message: String = message.into();
        Self::Normalized(NormalizedError::new(ErrorKind::InvalidRange, message, details))
    }

    /// Caller-visible error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::BadRequest(_) => ErrorCode::BadRequest,
            Self::Unavailable(_) => ErrorCode::Unavailable,
            Self::Normalized(err) => err.kind().into(),
        }
    }

    /// Diagnostic payload, when one was attached
    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::Normalized(err) => err.details(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_codes() {
        assert_eq!(
            CommandError::NotFound("r1".into()).code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            CommandError::BadRequest("empty".into()).code(),
            ErrorCode::BadRequest
        );
        assert_eq!(
            CommandError::Unavailable("no adapter".into()).code(),
            ErrorCode::Unavailable
        );

        let err = CommandError::invalid_range("power 40 dBm", Some(json!({"max": 39})));
        assert_eq!(err.code(), ErrorCode::InvalidRange);
        assert_eq!(err.details(), Some(&json!({"max": 39})));
    }

    #[test]
    fn test_normalized_kind_maps_through() {
        let err: CommandError =
            NormalizedError::new(ErrorKind::Busy, "RF_BUSY".to_string(), None).into();
        assert_eq!(err.code(), ErrorCode::Busy);
        assert_eq!(err.code().to_string(), "BUSY");
    }
}
