//! Error types for payload decoding

use thiserror::Error;

/// Result type for decoding operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Reasons a raw message body could not become a notification
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Body was empty or whitespace only
    #[error("Message body is empty")]
    EmptyBody,

    /// Body was not valid JSON or did not fit the payload type
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// JSON was valid but of the wrong kind (e.g. object where an array was expected)
    #[error("Unexpected payload shape: expected {expected}, got {actual}")]
    UnexpectedShape {
        expected: &'static str,
        actual: &'static str,
    },

    /// A field needed to act on the notification is missing
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field is present but its value is unusable
    #[error("Invalid value for field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}
