//! Background task and batch metadata progress payloads

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a background task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Accepted,
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    /// Status string this client does not know about
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Returns true once the task can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Accepted => "ACCEPTED",
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Cancelled => "CANCELLED",
            TaskStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Progress update for a background task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    pub task_id: String,
    pub task_type: Option<String>,
    pub message: Option<String>,
    /// Percentage, always within 0..=100
    pub progress: u8,
    pub task_status: TaskStatus,
}

impl TaskProgress {
    /// Creates a progress update, clamping `progress` to 100
    pub fn new(task_id: impl Into<String>, progress: u8, task_status: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            task_type: None,
            message: None,
            progress: progress.min(100),
            task_status,
        }
    }

    /// Sets the message (builder style)
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Status of a batch metadata fetch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataBatchStatus {
    InProgress,
    Completed,
    Error,
    #[serde(other)]
    Unknown,
}

impl MetadataBatchStatus {
    /// Returns true when the batch has finished, successfully or not
    pub fn is_finished(&self) -> bool {
        matches!(self, MetadataBatchStatus::Completed | MetadataBatchStatus::Error)
    }
}

/// Progress of a batch metadata fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataBatchProgress {
    pub task_id: String,
    pub completed: u32,
    pub total: u32,
    pub message: Option<String>,
    pub status: MetadataBatchStatus,
    /// True when fetched metadata waits for review instead of being applied
    pub review: bool,
}

impl MetadataBatchProgress {
    /// Completion percentage; an empty batch counts as done
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.completed as f64 / self.total as f64 * 100.0).min(100.0)
        }
    }
}
