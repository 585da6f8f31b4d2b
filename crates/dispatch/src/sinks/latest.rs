// crates/dispatch/src/sinks/latest.rs
//! Most recent server log line

use super::NotificationSink;
use crate::cell::StateCell;
use crate::error::{DispatchError, DispatchResult};
use bookwire_core::{LogNotification, Notification};
use tokio::sync::watch;

/// Holds the newest log notification
///
/// Starts out as the "no recent notifications" placeholder.
#[derive(Debug, Default)]
pub struct LatestNotification {
    latest: StateCell<LogNotification>,
}

impl LatestNotification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, notification: LogNotification) {
        self.latest.replace(notification);
    }

    pub fn latest(&self) -> LogNotification {
        self.latest.snapshot()
    }

    /// True until the first real log line arrives
    pub fn is_placeholder(&self) -> bool {
        self.latest.read(LogNotification::is_placeholder)
    }

    pub fn observe(&self) -> watch::Receiver<LogNotification> {
        self.latest.observe()
    }
}

impl NotificationSink for LatestNotification {
    fn update(&self, notification: Notification) -> DispatchResult<()> {
        match notification {
            Notification::Log(log) => {
                self.set(log);
                Ok(())
            }
            other => Err(DispatchError::WrongNotification {
                sink: self.name(),
                topic: other.topic(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "LatestNotification"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookwire_core::{Severity, NO_RECENT_NOTIFICATIONS};

    #[test]
    fn test_starts_with_placeholder() {
        let latest = LatestNotification::new();
        assert!(latest.is_placeholder());
        assert_eq!(latest.latest().message, NO_RECENT_NOTIFICATIONS);
    }

    #[test]
    fn test_newest_replaces_previous() {
        let latest = LatestNotification::new();
        latest
            .update(Notification::Log(LogNotification::new("first")))
            .unwrap();
        latest
            .update(Notification::Log(
                LogNotification::new("second").with_severity(Severity::Warn),
            ))
            .unwrap();

        let current = latest.latest();
        assert_eq!(current.message, "second");
        assert_eq!(current.severity, Severity::Warn);
        assert!(!latest.is_placeholder());
    }
}
