// crates/channel/src/lib.rs
//! Message channel to the library server's STOMP broker
//!
//! - [`MessageChannel`]: one connection, many [`Watch`]es, transparent reconnect
//! - [`frame`]: STOMP 1.2 frame codec
//! - [`Transport`] / [`Connector`]: the seam between the channel and the wire
//! - [`WebSocketConnector`]: the production transport
//! - [`memory::MemoryBroker`]: an in-process broker for tests and demos
//!
//! # Example
//!
//! ```rust,no_run
//! use bookwire_channel::{ChannelConfig, MessageChannel, WebSocketConnector};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = WebSocketConnector::new("ws://localhost:6060/ws")?;
//! let channel = MessageChannel::new(connector, ChannelConfig::default());
//! let mut watch = channel.watch("/user/queue/log")?;
//! channel.connect()?;
//!
//! while let Some(message) = watch.recv().await {
//!     println!("{}", message.body);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod frame;
mod heartbeat;
pub mod memory;
mod transport;
mod websocket;

pub use client::{ChannelConfig, Connection, ConnectionState, Message, MessageChannel, Watch};
pub use error::{ChannelError, ChannelResult};
pub use frame::{Command, Frame};
pub use heartbeat::{HeartBeat, HeartBeatTiming, MAX_HEARTBEAT_MS};
pub use transport::{Connector, Transport};
pub use websocket::{WebSocketConnector, WebSocketTransport};
