//! Server log lines shown in the live notification box

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder message shown before the first log line arrives
pub const NO_RECENT_NOTIFICATIONS: &str = "No recent notifications...";

/// Severity of a log notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[default]
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warn => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single log line pushed by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogNotification {
    pub timestamp: Option<DateTime<Utc>>,
    pub message: String,
    pub severity: Severity,
}

impl LogNotification {
    /// Creates an INFO notification without a timestamp
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            message: message.into(),
            severity: Severity::Info,
        }
    }

    /// Sets the severity (builder style)
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Returns true for the "nothing received yet" placeholder
    pub fn is_placeholder(&self) -> bool {
        self.timestamp.is_none() && self.message == NO_RECENT_NOTIFICATIONS
    }
}

impl Default for LogNotification {
    fn default() -> Self {
        Self::new(NO_RECENT_NOTIFICATIONS)
    }
}

impl fmt::Display for LogNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timestamp {
            Some(ts) => write!(
                f,
                "[{}] {} {}",
                ts.format("%Y-%m-%d %H:%M:%S"),
                self.severity,
                self.message
            ),
            None => write!(f, "{} {}", self.severity, self.message),
        }
    }
}
