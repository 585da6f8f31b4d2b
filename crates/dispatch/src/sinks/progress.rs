// crates/dispatch/src/sinks/progress.rs
//! Progress boards keyed by task id

use super::NotificationSink;
use crate::cell::StateCell;
use crate::error::{DispatchError, DispatchResult};
use bookwire_core::{MetadataBatchProgress, Notification, TaskProgress};
use std::collections::HashMap;
use tokio::sync::watch;

/// A progress report that belongs to one task
pub trait Tracked: Clone + Send + Sync + 'static {
    fn task_id(&self) -> &str;

    /// True once the task will report no further progress
    fn is_finished(&self) -> bool;
}

impl Tracked for TaskProgress {
    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn is_finished(&self) -> bool {
        self.task_status.is_terminal()
    }
}

impl Tracked for MetadataBatchProgress {
    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn is_finished(&self) -> bool {
        self.status.is_finished()
    }
}

/// Everything a progress board holds at one point in time
#[derive(Debug, Clone)]
pub struct ProgressSnapshot<T> {
    /// Latest report per task id
    pub entries: HashMap<String, T>,
    /// Most recent report across all tasks
    pub latest: Option<T>,
}

impl<T> Default for ProgressSnapshot<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            latest: None,
        }
    }
}

/// Last-write-wins progress per task
///
/// Each report replaces the previous one for the same task id, terminal
/// states included.
#[derive(Debug)]
pub struct ProgressBoard<T> {
    board: StateCell<ProgressSnapshot<T>>,
}

/// Progress of batch metadata fetches
pub type MetadataProgressTracker = ProgressBoard<MetadataBatchProgress>;

/// Progress of background tasks
pub type TaskTracker = ProgressBoard<TaskProgress>;

impl<T: Tracked> ProgressBoard<T> {
    pub fn new() -> Self {
        Self {
            board: StateCell::new(ProgressSnapshot::default()),
        }
    }

    /// Records a report, replacing any earlier one for the same task
    pub fn record(&self, progress: T) {
        self.board.modify_if(|board| {
            board
                .entries
                .insert(progress.task_id().to_string(), progress.clone());
            board.latest = Some(progress);
            true
        });
    }

    /// Forgets a task; returns false when it was not tracked
    pub fn clear(&self, task_id: &str) -> bool {
        self.board.modify_if(|board| {
            let removed = board.entries.remove(task_id).is_some();
            if removed
                && board
                    .latest
                    .as_ref()
                    .is_some_and(|latest| latest.task_id() == task_id)
            {
                board.latest = None;
            }
            removed
        })
    }

    /// Drops every finished task; returns how many were removed
    ///
    /// `latest` is cleared as well when its task was one of them.
    pub fn clear_finished(&self) -> usize {
        let mut removed = 0;
        self.board.modify_if(|board| {
            let before = board.entries.len();
            board.entries.retain(|_, progress| !progress.is_finished());
            removed = before - board.entries.len();

            let stale = board
                .latest
                .as_ref()
                .is_some_and(|latest| !board.entries.contains_key(latest.task_id()));
            if stale {
                board.latest = None;
            }
            removed > 0 || stale
        });
        removed
    }

    pub fn get(&self, task_id: &str) -> Option<T> {
        self.board.read(|board| board.entries.get(task_id).cloned())
    }

    /// Most recently reported progress across all tasks
    pub fn latest(&self) -> Option<T> {
        self.board.read(|board| board.latest.clone())
    }

    /// Tasks that have not reached a terminal state
    pub fn active(&self) -> Vec<T> {
        self.board.read(|board| {
            board
                .entries
                .values()
                .filter(|progress| !progress.is_finished())
                .cloned()
                .collect()
        })
    }

    /// All tracked tasks
    pub fn snapshot(&self) -> HashMap<String, T> {
        self.board.read(|board| board.entries.clone())
    }

    /// Clone of the whole board
    pub fn board(&self) -> ProgressSnapshot<T> {
        self.board.snapshot()
    }

    pub fn len(&self) -> usize {
        self.board.read(|board| board.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observes the board
    pub fn observe(&self) -> watch::Receiver<ProgressSnapshot<T>> {
        self.board.observe()
    }
}

impl<T: Tracked> Default for ProgressBoard<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for MetadataProgressTracker {
    fn update(&self, notification: Notification) -> DispatchResult<()> {
        match notification {
            Notification::MetadataBatchProgress(progress) => {
                self.record(progress);
                Ok(())
            }
            other => Err(DispatchError::WrongNotification {
                sink: self.name(),
                topic: other.topic(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "MetadataProgressTracker"
    }
}

impl NotificationSink for TaskTracker {
    fn update(&self, notification: Notification) -> DispatchResult<()> {
        match notification {
            Notification::TaskProgress(progress) => {
                self.record(progress);
                Ok(())
            }
            other => Err(DispatchError::WrongNotification {
                sink: self.name(),
                topic: other.topic(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "TaskTracker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookwire_core::{MetadataBatchStatus, TaskStatus};

    fn batch(task_id: &str, completed: u32, status: MetadataBatchStatus) -> MetadataBatchProgress {
        MetadataBatchProgress {
            task_id: task_id.to_string(),
            completed,
            total: 10,
            message: None,
            status,
            review: false,
        }
    }

    #[test]
    fn test_last_write_wins_per_task() {
        let tracker = TaskTracker::new();
        tracker.record(TaskProgress::new("t1", 40, TaskStatus::InProgress));
        tracker.record(TaskProgress::new("t1", 100, TaskStatus::Completed));

        let progress = tracker.get("t1").unwrap();
        assert_eq!(progress.progress, 100);
        assert_eq!(progress.task_status, TaskStatus::Completed);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_active_excludes_terminal() {
        let tracker = TaskTracker::new();
        tracker.record(TaskProgress::new("a", 10, TaskStatus::InProgress));
        tracker.record(TaskProgress::new("b", 100, TaskStatus::Completed));
        tracker.record(TaskProgress::new("c", 0, TaskStatus::Failed));

        let active = tracker.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].task_id, "a");
    }

    #[test]
    fn test_latest_tracks_most_recent() {
        let tracker = TaskTracker::new();
        assert!(tracker.latest().is_none());

        tracker.record(TaskProgress::new("a", 10, TaskStatus::InProgress));
        tracker.record(TaskProgress::new("b", 20, TaskStatus::InProgress));
        assert_eq!(tracker.latest().unwrap().task_id, "b");

        assert!(tracker.clear("b"));
        assert!(tracker.latest().is_none());
        assert!(!tracker.clear("b"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_clear_finished() {
        let tracker = MetadataProgressTracker::new();
        tracker.record(batch("x", 3, MetadataBatchStatus::InProgress));
        tracker.record(batch("y", 10, MetadataBatchStatus::Completed));
        tracker.record(batch("z", 1, MetadataBatchStatus::Error));

        assert_eq!(tracker.clear_finished(), 2);
        assert_eq!(tracker.snapshot().len(), 1);
        assert_eq!(tracker.clear_finished(), 0);
    }

    #[test]
    fn test_clear_finished_drops_stale_latest() {
        let tracker = TaskTracker::new();
        tracker.record(TaskProgress::new("a", 40, TaskStatus::InProgress));
        tracker.record(TaskProgress::new("b", 100, TaskStatus::Completed));
        let mut rx = tracker.observe();
        rx.borrow_and_update();

        assert_eq!(tracker.clear_finished(), 1);
        assert!(tracker.latest().is_none());
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().latest.is_none());

        // A still-running latest survives
        tracker.record(TaskProgress::new("a", 60, TaskStatus::InProgress));
        assert_eq!(tracker.clear_finished(), 0);
        assert_eq!(tracker.latest().map(|p| p.progress), Some(60));
    }

    #[test]
    fn test_sinks_reject_foreign_notifications() {
        let tasks = TaskTracker::new();
        let result = tasks.update(Notification::MetadataBatchProgress(batch(
            "x",
            1,
            MetadataBatchStatus::InProgress,
        )));
        assert!(matches!(result, Err(DispatchError::WrongNotification { .. })));

        let metadata = MetadataProgressTracker::new();
        assert!(metadata
            .update(Notification::MetadataBatchProgress(batch(
                "x",
                1,
                MetadataBatchStatus::InProgress
            )))
            .is_ok());
        assert_eq!(metadata.len(), 1);
    }
}
