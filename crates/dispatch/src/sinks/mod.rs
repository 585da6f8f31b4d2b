// crates/dispatch/src/sinks/mod.rs
//! Per-domain state sinks

mod books;
mod latest;
mod progress;
mod queue;

pub use books::{BookCollection, UpdateOutcome};
pub use latest::LatestNotification;
pub use progress::{
    MetadataProgressTracker, ProgressBoard, ProgressSnapshot, TaskTracker, Tracked,
};
pub use queue::NotificationQueue;

use crate::error::DispatchResult;
use bookwire_core::{BookdropFile, DuplicateFile, Notification, Topic};
use std::sync::Arc;

/// Receives decoded notifications from the router
///
/// `update` is called only from the delivery path, one notification at a
/// time per topic.
pub trait NotificationSink: Send + Sync {
    /// Applies one notification
    fn update(&self, notification: Notification) -> DispatchResult<()>;

    /// Sink name for log lines
    fn name(&self) -> &'static str;
}

/// Every sink a session feeds, shared with observers
#[derive(Clone, Default)]
pub struct Sinks {
    pub books: Arc<BookCollection>,
    pub metadata_progress: Arc<MetadataProgressTracker>,
    pub tasks: Arc<TaskTracker>,
    pub latest_log: Arc<LatestNotification>,
    pub duplicates: Arc<NotificationQueue<DuplicateFile>>,
    pub bookdrop: Arc<NotificationQueue<BookdropFile>>,
}

impl Sinks {
    /// Fresh, empty sinks
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that takes notifications for `topic`
    pub fn sink_for(&self, topic: Topic) -> Arc<dyn NotificationSink> {
        match topic {
            Topic::BookAdd
            | Topic::BooksRemove
            | Topic::BookMetadataUpdate
            | Topic::BookMetadataBatchUpdate => self.books.clone(),
            Topic::BookMetadataBatchProgress => self.metadata_progress.clone(),
            Topic::Log => self.latest_log.clone(),
            Topic::TaskProgress => self.tasks.clone(),
            Topic::DuplicateFile => self.duplicates.clone(),
            Topic::BookdropFile => self.bookdrop.clone(),
        }
    }
}
