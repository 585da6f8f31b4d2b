//! Notification routing configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use bookwire_core::Topic;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Which topics to subscribe to and how much to buffer per subscription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Topic names to subscribe to; defaults to every known topic
    pub topics: Vec<String>,

    /// Messages buffered per subscription before overflow is dropped
    pub buffer: usize,
}

impl NotificationConfig {
    /// Resolves the configured names to topics, keeping catalogue order
    ///
    /// Unknown names are skipped with a warning; `validate` reports them.
    pub fn enabled_topics(&self) -> Vec<Topic> {
        let mut wanted = HashSet::new();
        for name in &self.topics {
            match name.parse::<Topic>() {
                Ok(topic) => {
                    wanted.insert(topic);
                }
                Err(e) => log::warn!("Ignoring configured topic: {}", e),
            }
        }
        Topic::ALL
            .into_iter()
            .filter(|t| wanted.contains(t))
            .collect()
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            topics: Topic::ALL.iter().map(|t| t.name().to_string()).collect(),
            buffer: 64,
        }
    }
}

impl ConfigSection for NotificationConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![Validator::in_range(
            self.buffer,
            1,
            10_000,
            "notifications.buffer",
        )];

        let mut seen = HashSet::new();
        for name in &self.topics {
            if let Err(e) = name.parse::<Topic>() {
                results.push(Err(ValidationError::with_value(
                    "notifications.topics",
                    "unknown topic",
                    e.0,
                )));
            } else if !seen.insert(name.trim()) {
                results.push(Err(ValidationError::with_value(
                    "notifications.topics",
                    "listed more than once",
                    name,
                )));
            }
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.topics = other.topics;
        self.buffer = other.buffer;
    }

    fn section_name(&self) -> &'static str {
        "notifications"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enables_every_topic() {
        let config = NotificationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.enabled_topics(), Topic::ALL.to_vec());
    }

    #[test]
    fn test_enabled_topics_keep_catalogue_order() {
        let config = NotificationConfig {
            topics: vec!["log".to_string(), "book-add".to_string(), "nope".to_string()],
            ..Default::default()
        };
        assert_eq!(config.enabled_topics(), vec![Topic::BookAdd, Topic::Log]);
    }

    #[test]
    fn test_validation_reports_unknown_and_duplicates() {
        let config = NotificationConfig {
            topics: vec![
                "log".to_string(),
                "log".to_string(),
                "mystery".to_string(),
            ],
            buffer: 0,
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
