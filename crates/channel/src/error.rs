// crates/channel/src/error.rs
//! Error types for the message channel

use thiserror::Error;

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur while talking to the broker
#[derive(Debug, Error)]
pub enum ChannelError {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// Transport could not be established or failed mid-stream
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid broker URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Malformed STOMP frame
    #[error("Malformed frame: {0}")]
    Frame(String),

    /// Broker answered with an ERROR frame (for example a rejected token)
    #[error("Broker rejected the session: {0}")]
    Rejected(String),

    /// Transport closed by the remote side
    #[error("Connection closed")]
    ConnectionClosed,

    /// No traffic within the negotiated heart-beat window
    #[error("Heart-beat timed out")]
    HeartbeatTimeout,

    /// Timeout or retry exhaustion while connecting
    #[error("Resilience error: {0}")]
    Resilience(#[from] bookwire_resilience::ResilienceError),

    /// The channel was disconnected and can no longer be used
    #[error("Channel is closed")]
    Closed,

    /// Not running inside a Tokio runtime
    #[error("No Tokio runtime available to drive the channel")]
    NoRuntime,

    /// Internal lock poisoned
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl From<tokio_tungstenite::tungstenite::Error> for ChannelError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChannelError::WebSocket(Box::new(err))
    }
}

impl ChannelError {
    /// Returns true if reconnecting may cure the error
    pub fn is_retryable(&self) -> bool {
        match self {
            ChannelError::Resilience(e) => !e.is_exhausted(),
            other => matches!(
                other,
                ChannelError::WebSocket(_)
                    | ChannelError::Transport(_)
                    | ChannelError::Rejected(_)
                    | ChannelError::ConnectionClosed
                    | ChannelError::HeartbeatTimeout
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_display() {
        let err = ChannelError::InvalidUrl("ftp://x".to_string());
        assert!(err.to_string().contains("Invalid URL"));

        let err = ChannelError::Rejected("bad token".to_string());
        assert!(err.to_string().contains("bad token"));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ChannelError::ConnectionClosed.is_retryable());
        assert!(ChannelError::HeartbeatTimeout.is_retryable());
        assert!(ChannelError::Transport("refused".to_string()).is_retryable());
        assert!(ChannelError::Resilience(bookwire_resilience::ResilienceError::Timeout(
            Duration::from_secs(1)
        ))
        .is_retryable());

        assert!(!ChannelError::Resilience(
            bookwire_resilience::ResilienceError::RetriesExhausted {
                attempts: 3,
                last_error: "refused".to_string(),
            }
        )
        .is_retryable());
        assert!(!ChannelError::InvalidUrl("x".to_string()).is_retryable());
        assert!(!ChannelError::Closed.is_retryable());
        assert!(!ChannelError::Frame("x".to_string()).is_retryable());
    }
}
