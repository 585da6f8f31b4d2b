// crates/channel/src/transport.rs
//! Transport seam between the STOMP session and the wire

use crate::error::ChannelResult;
use async_trait::async_trait;

/// A bidirectional text-message pipe to the broker
///
/// `recv` must be cancel-safe: the channel driver races it against
/// commands, timers and shutdown.
#[async_trait]
pub trait Transport: Send {
    /// Sends one text message
    async fn send(&mut self, text: String) -> ChannelResult<()>;

    /// Receives the next text message; `None` once the transport has closed
    async fn recv(&mut self) -> Option<ChannelResult<String>>;

    /// Closes the transport
    async fn close(&mut self) -> ChannelResult<()>;
}

/// Opens new transports; called again on every reconnect
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establishes a fresh transport
    async fn connect(&self) -> ChannelResult<Box<dyn Transport>>;

    /// Where this connector connects to, for log lines
    fn endpoint(&self) -> String;
}
