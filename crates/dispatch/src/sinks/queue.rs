// crates/dispatch/src/sinks/queue.rs
//! Triage queues for discrete actionable items

use super::NotificationSink;
use crate::cell::StateCell;
use crate::error::{DispatchError, DispatchResult};
use bookwire_core::{BookdropFile, DuplicateFile, Notification};
use std::collections::VecDeque;
use tokio::sync::watch;

/// FIFO of items waiting for the user
///
/// Grows until a consumer pops or clears entries. Items are kept exactly as
/// they arrived; replays show up twice.
#[derive(Debug)]
pub struct NotificationQueue<T> {
    items: StateCell<VecDeque<T>>,
}

impl<T> NotificationQueue<T>
where
    T: Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self {
            items: StateCell::new(VecDeque::new()),
        }
    }

    /// Appends an item at the back
    pub fn push(&self, item: T) {
        self.items.modify_if(|items| {
            items.push_back(item);
            true
        });
    }

    /// Takes the oldest item for triage
    pub fn pop(&self) -> Option<T> {
        let mut popped = None;
        self.items.modify_if(|items| {
            popped = items.pop_front();
            popped.is_some()
        });
        popped
    }

    /// Oldest item without removing it
    pub fn peek(&self) -> Option<T> {
        self.items.read(|items| items.front().cloned())
    }

    /// Removes every item matching `predicate`; returns how many went
    pub fn remove_where(&self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let mut removed = 0;
        self.items.modify_if(|items| {
            let before = items.len();
            items.retain(|item| !predicate(item));
            removed = before - items.len();
            removed > 0
        });
        removed
    }

    /// Drops everything; returns how many items were queued
    pub fn clear(&self) -> usize {
        let mut cleared = 0;
        self.items.modify_if(|items| {
            cleared = items.len();
            items.clear();
            cleared > 0
        });
        cleared
    }

    pub fn len(&self) -> usize {
        self.items.read(VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queued items, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.items.read(|items| items.iter().cloned().collect())
    }

    pub fn observe(&self) -> watch::Receiver<VecDeque<T>> {
        self.items.observe()
    }
}

impl<T> Default for NotificationQueue<T>
where
    T: Clone + Send + Sync,
{
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for NotificationQueue<DuplicateFile> {
    fn update(&self, notification: Notification) -> DispatchResult<()> {
        match notification {
            Notification::DuplicateFile(file) => {
                log::debug!("Queued duplicate {:?}", file.key());
                self.push(file);
                Ok(())
            }
            other => Err(DispatchError::WrongNotification {
                sink: self.name(),
                topic: other.topic(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "DuplicateFileQueue"
    }
}

impl NotificationSink for NotificationQueue<BookdropFile> {
    fn update(&self, notification: Notification) -> DispatchResult<()> {
        match notification {
            Notification::BookdropFile(file) => {
                self.push(file);
                Ok(())
            }
            other => Err(DispatchError::WrongNotification {
                sink: self.name(),
                topic: other.topic(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "BookdropQueue"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duplicate(file_id: u64) -> DuplicateFile {
        DuplicateFile {
            file_id: Some(file_id),
            file_name: Some(format!("file-{}.epub", file_id)),
            ..Default::default()
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = NotificationQueue::new();
        queue.push(duplicate(1));
        queue.push(duplicate(2));

        assert_eq!(queue.peek().unwrap().file_id, Some(1));
        assert_eq!(queue.pop().unwrap().file_id, Some(1));
        assert_eq!(queue.pop().unwrap().file_id, Some(2));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_remove_where_and_clear() {
        let queue = NotificationQueue::new();
        for id in 1..=5 {
            queue.push(duplicate(id));
        }

        assert_eq!(queue.remove_where(|d| d.file_id.unwrap_or(0) % 2 == 0), 2);
        let left: Vec<_> = queue.snapshot().iter().filter_map(|d| d.file_id).collect();
        assert_eq!(left, vec![1, 3, 5]);

        assert_eq!(queue.clear(), 3);
        assert!(queue.is_empty());
        assert_eq!(queue.clear(), 0);
    }

    #[test]
    fn test_replayed_items_are_kept() {
        let queue: NotificationQueue<DuplicateFile> = NotificationQueue::new();
        queue
            .update(Notification::DuplicateFile(duplicate(7)))
            .unwrap();
        queue
            .update(Notification::DuplicateFile(duplicate(7)))
            .unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_bookdrop_sink() {
        let queue: NotificationQueue<BookdropFile> = NotificationQueue::new();
        let file = BookdropFile {
            pending_count: 3,
            total_count: 4,
            ..Default::default()
        };
        queue.update(Notification::BookdropFile(file.clone())).unwrap();
        assert_eq!(queue.snapshot(), vec![file]);

        let result = queue.update(Notification::Log(Default::default()));
        assert!(matches!(result, Err(DispatchError::WrongNotification { .. })));
    }

    #[tokio::test]
    async fn test_pop_on_empty_does_not_notify() {
        let queue: NotificationQueue<DuplicateFile> = NotificationQueue::new();
        let mut rx = queue.observe();
        rx.borrow_and_update();

        assert!(queue.pop().is_none());
        assert!(!rx.has_changed().unwrap());

        queue.push(duplicate(1));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);
    }
}
