//! Wire payload types for live notifications
//!
//! - `book`: books and their metadata
//! - `progress`: task and batch metadata progress
//! - `log`: server log lines
//! - `files`: duplicate and bookdrop file notices

mod book;
mod files;
mod lenient;
mod log;
mod progress;

pub use book::{Book, BookId, BookMetadata};
pub use files::{BookdropFile, DuplicateFile};
pub use log::{LogNotification, Severity, NO_RECENT_NOTIFICATIONS};
pub use progress::{MetadataBatchProgress, MetadataBatchStatus, TaskProgress, TaskStatus};
