// crates/core/src/topic.rs
//! Notification topic catalogue
//!
//! Every server-to-client notification category is a [`Topic`]. A topic has a
//! stable name (used in configuration and on the command line) and a queue
//! name on the broker. The broker destination is `{prefix}/{queue}`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default per-user destination prefix on the broker
pub const DEFAULT_DESTINATION_PREFIX: &str = "/user/queue";

/// A named notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    /// A book was added to a library
    BookAdd,
    /// One or more books were removed
    BooksRemove,
    /// A single book's metadata changed
    BookMetadataUpdate,
    /// Several books changed at once (e.g. after a bulk file move)
    BookMetadataBatchUpdate,
    /// Progress of a batch metadata fetch
    BookMetadataBatchProgress,
    /// Free-form server log line for the live notification box
    Log,
    /// Background task progress
    TaskProgress,
    /// A duplicate file was detected during a scan
    DuplicateFile,
    /// A file was dropped into the bookdrop folder
    BookdropFile,
}

impl Topic {
    /// All known topics, in routing order
    pub const ALL: [Topic; 9] = [
        Topic::BookAdd,
        Topic::BooksRemove,
        Topic::BookMetadataUpdate,
        Topic::BookMetadataBatchUpdate,
        Topic::BookMetadataBatchProgress,
        Topic::Log,
        Topic::TaskProgress,
        Topic::DuplicateFile,
        Topic::BookdropFile,
    ];

    /// Stable topic name
    pub fn name(&self) -> &'static str {
        match self {
            Topic::BookAdd => "book-add",
            Topic::BooksRemove => "books-remove",
            Topic::BookMetadataUpdate => "book-metadata-update",
            Topic::BookMetadataBatchUpdate => "book-metadata-batch-update",
            Topic::BookMetadataBatchProgress => "book-metadata-batch-progress",
            Topic::Log => "log",
            Topic::TaskProgress => "task-progress",
            Topic::DuplicateFile => "duplicate-file",
            Topic::BookdropFile => "bookdrop-file",
        }
    }

    /// Queue name the server publishes this topic on
    pub fn queue(&self) -> &'static str {
        match self {
            // The server publishes task progress on the plain "task" queue
            Topic::TaskProgress => "task",
            other => other.name(),
        }
    }

    /// Full broker destination under the given prefix
    pub fn destination(&self, prefix: &str) -> String {
        format!("{}/{}", prefix.trim_end_matches('/'), self.queue())
    }

    /// Destination under [`DEFAULT_DESTINATION_PREFIX`]
    pub fn default_destination(&self) -> String {
        self.destination(DEFAULT_DESTINATION_PREFIX)
    }

    /// Resolves a topic from its broker destination
    pub fn from_destination(destination: &str, prefix: &str) -> Option<Topic> {
        let prefix = prefix.trim_end_matches('/');
        let queue = destination.strip_prefix(prefix)?.strip_prefix('/')?;
        Topic::ALL.into_iter().find(|t| t.queue() == queue)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a topic name is not in the catalogue
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Topic::ALL
            .into_iter()
            .find(|t| t.name() == needle)
            .ok_or_else(|| UnknownTopic(needle.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<_> = Topic::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(names.len(), Topic::ALL.len());
    }

    #[test]
    fn test_destination_uses_queue_name() {
        assert_eq!(Topic::BookAdd.default_destination(), "/user/queue/book-add");
        assert_eq!(Topic::TaskProgress.default_destination(), "/user/queue/task");
        assert_eq!(Topic::Log.destination("/user/queue/"), "/user/queue/log");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("duplicate-file".parse::<Topic>(), Ok(Topic::DuplicateFile));
        assert_eq!(" log ".parse::<Topic>(), Ok(Topic::Log));
        assert!("task".parse::<Topic>().is_err());
    }

    #[test]
    fn test_from_destination() {
        assert_eq!(
            Topic::from_destination("/user/queue/task", DEFAULT_DESTINATION_PREFIX),
            Some(Topic::TaskProgress)
        );
        assert_eq!(
            Topic::from_destination("/topic/other", DEFAULT_DESTINATION_PREFIX),
            None
        );
    }

    #[test]
    fn test_serde_uses_names() {
        let json = serde_json::to_string(&Topic::BookMetadataBatchProgress).unwrap();
        assert_eq!(json, "\"book-metadata-batch-progress\"");
        let back: Topic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Topic::BookMetadataBatchProgress);
    }
}
