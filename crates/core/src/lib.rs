//! Core types for bookwire live notifications
//!
//! This crate holds everything that is independent of the transport:
//! - `topic`: the catalogue of notification topics and their broker destinations
//! - `types`: wire payload types (books, progress, log lines, file notices)
//! - `notification`: the typed [`Notification`] enum
//! - `decode`: pure decoders from raw message bodies to notifications
//!
//! # Example
//!
//! ```rust
//! use bookwire_core::{decode, Notification, Topic};
//!
//! let body = r#"{"taskId":"t1","progress":40,"taskStatus":"IN_PROGRESS"}"#;
//! match decode(Topic::TaskProgress, body).unwrap() {
//!     Notification::TaskProgress(p) => assert_eq!(p.progress, 40),
//!     _ => unreachable!(),
//! }
//! ```

pub mod decode;
pub mod error;
pub mod notification;
pub mod topic;
pub mod types;

pub use decode::{decode, decoder_for, Decoder};
pub use error::{DecodeError, DecodeResult};
pub use notification::Notification;
pub use topic::{Topic, UnknownTopic, DEFAULT_DESTINATION_PREFIX};
pub use types::{
    Book, BookId, BookMetadata, BookdropFile, DuplicateFile, LogNotification,
    MetadataBatchProgress, MetadataBatchStatus, Severity, TaskProgress, TaskStatus,
    NO_RECENT_NOTIFICATIONS,
};
