// crates/dispatch/src/error.rs
//! Error types for routing and session lifecycle

use bookwire_core::{BookId, DecodeError, Topic};
use thiserror::Error;

/// Result type for dispatch operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors that can occur while routing notifications
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Payload could not be decoded
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// Channel refused a watch or connect
    #[error("Channel error: {0}")]
    Channel(#[from] bookwire_channel::ChannelError),

    /// A sink received a notification meant for another topic
    #[error("{sink} cannot take a {topic} notification")]
    WrongNotification { sink: &'static str, topic: Topic },

    /// Metadata update for a book the collection does not hold
    #[error("Book {0} is not in the collection")]
    UnknownBook(BookId),

    /// Session has been torn down and cannot be activated again
    #[error("Session has been torn down")]
    TornDown,

    /// Readiness signal source went away before it became ready
    #[error("Readiness signal closed before authentication was ready")]
    ReadinessClosed,

    /// Not running inside a Tokio runtime
    #[error("No Tokio runtime available for delivery tasks")]
    NoRuntime,

    /// Internal lock poisoned
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl DispatchError {
    /// Returns true for errors raised by a sink rather than the decoder
    pub fn is_sink_rejection(&self) -> bool {
        matches!(
            self,
            DispatchError::WrongNotification { .. } | DispatchError::UnknownBook(_)
        )
    }
}
