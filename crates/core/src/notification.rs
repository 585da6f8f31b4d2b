//! Typed notifications produced by the decoders

use crate::topic::Topic;
use crate::types::{
    Book, BookId, BookdropFile, DuplicateFile, LogNotification, MetadataBatchProgress,
    TaskProgress,
};

/// A decoded server-side change
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    BookAdded(Book),
    BooksRemoved(Vec<BookId>),
    BookMetadataUpdated(Book),
    BookMetadataBatchUpdated(Vec<Book>),
    MetadataBatchProgress(MetadataBatchProgress),
    Log(LogNotification),
    TaskProgress(TaskProgress),
    DuplicateFile(DuplicateFile),
    BookdropFile(BookdropFile),
}

impl Notification {
    /// Topic this notification is delivered on
    pub fn topic(&self) -> Topic {
        match self {
            Notification::BookAdded(_) => Topic::BookAdd,
            Notification::BooksRemoved(_) => Topic::BooksRemove,
            Notification::BookMetadataUpdated(_) => Topic::BookMetadataUpdate,
            Notification::BookMetadataBatchUpdated(_) => Topic::BookMetadataBatchUpdate,
            Notification::MetadataBatchProgress(_) => Topic::BookMetadataBatchProgress,
            Notification::Log(_) => Topic::Log,
            Notification::TaskProgress(_) => Topic::TaskProgress,
            Notification::DuplicateFile(_) => Topic::DuplicateFile,
            Notification::BookdropFile(_) => Topic::BookdropFile,
        }
    }

    /// Short human-readable summary, used for logging
    pub fn summary(&self) -> String {
        match self {
            Notification::BookAdded(book) => format!("book added: {}", book.display_title()),
            Notification::BooksRemoved(ids) => format!("{} book(s) removed", ids.len()),
            Notification::BookMetadataUpdated(book) => {
                format!("metadata updated: {}", book.display_title())
            }
            Notification::BookMetadataBatchUpdated(books) => {
                format!("metadata updated for {} book(s)", books.len())
            }
            Notification::MetadataBatchProgress(p) => format!(
                "metadata batch {}: {}/{} ({:?})",
                p.task_id, p.completed, p.total, p.status
            ),
            Notification::Log(log) => log.to_string(),
            Notification::TaskProgress(p) => {
                format!("task {}: {}% {}", p.task_id, p.progress, p.task_status)
            }
            Notification::DuplicateFile(d) => format!(
                "duplicate file: {}",
                d.file_name.as_deref().unwrap_or("<unnamed>")
            ),
            Notification::BookdropFile(f) => format!(
                "bookdrop: {} pending of {}",
                f.pending_count, f.total_count
            ),
        }
    }
}
