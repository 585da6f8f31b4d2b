// crates/dispatch/src/lib.rs
//! Topic routing, state sinks and session lifecycle
//!
//! A [`Session`] subscribes once per topic through a
//! [`bookwire_channel::MessageChannel`], decodes each message and applies it
//! to the matching sink in [`Sinks`]. Consumers only read sinks, through
//! `snapshot()` or `observe()`.
//!
//! # Example
//!
//! ```rust,no_run
//! use bookwire_channel::{ChannelConfig, MessageChannel, WebSocketConnector};
//! use bookwire_dispatch::{Session, SessionConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = WebSocketConnector::new("ws://localhost:6060/ws")?;
//! let channel = Arc::new(MessageChannel::new(connector, ChannelConfig::default()));
//! let session = Session::new(channel, SessionConfig::default());
//!
//! session.set_authentication_ready(true)?;
//! let mut tasks = session.sinks().tasks.observe();
//! while tasks.changed().await.is_ok() {
//!     if let Some(latest) = tasks.borrow_and_update().latest.clone() {
//!         println!("{}: {}%", latest.task_id, latest.progress);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod cell;
pub mod error;
pub mod router;
pub mod session;
pub mod sinks;
pub mod stats;

pub use cell::StateCell;
pub use error::{DispatchError, DispatchResult};
pub use router::{Route, RoutingTable};
pub use session::{LifecycleState, Session, SessionConfig};
pub use sinks::{
    BookCollection, LatestNotification, MetadataProgressTracker, NotificationQueue,
    NotificationSink, ProgressBoard, ProgressSnapshot, Sinks, TaskTracker, Tracked,
    UpdateOutcome,
};
pub use stats::{DeliverySnapshot, DeliveryStats};
