// crates/dispatch/src/cell.rs
//! Observable single-writer state cell

use tokio::sync::watch;

/// Holds one value and notifies observers on every change
///
/// Writes come only from the delivery path; readers get a
/// [`watch::Receiver`] that always sees the latest value.
#[derive(Debug)]
pub struct StateCell<T> {
    tx: watch::Sender<T>,
}

impl<T> StateCell<T>
where
    T: Clone + Send + Sync,
{
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Receiver yielding the current value first, then every later one
    pub fn observe(&self) -> watch::Receiver<T> {
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        rx
    }

    /// Clone of the current value
    pub fn snapshot(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Reads the current value without cloning it
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.tx.borrow())
    }

    /// Replaces the value and notifies observers
    pub fn replace(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Mutates in place; observers are notified only when `f` returns true
    pub fn modify_if(&self, f: impl FnOnce(&mut T) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }
}

impl<T> Default for StateCell<T>
where
    T: Clone + Default + Send + Sync,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_observe_yields_current_then_updates() {
        let cell = StateCell::new(1);
        let mut rx = cell.observe();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);

        cell.replace(2);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 2);
    }

    #[test]
    fn test_modify_if_skips_notification() {
        let cell = StateCell::new(vec![1]);
        let mut rx = cell.observe();
        rx.borrow_and_update();

        assert!(!cell.modify_if(|_| false));
        assert!(!rx.has_changed().unwrap());

        assert!(cell.modify_if(|v| {
            v.push(2);
            true
        }));
        assert!(rx.has_changed().unwrap());
        assert_eq!(cell.snapshot(), vec![1, 2]);
        assert_eq!(cell.read(|v| v.len()), 2);
    }
}
