//! Reconnect policy configuration section

use crate::validation::{ConfigSection, ValidationError, Validator};
use bookwire_resilience::BackoffPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the channel backs off between reconnect attempts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt, in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound on the delay between attempts, in milliseconds
    pub max_delay_ms: u64,

    /// Growth factor between consecutive delays
    pub multiplier: f64,

    /// Spread delays so many clients don't reconnect in lockstep
    pub jitter: bool,

    /// Give up after this many attempts; absent means never give up
    pub max_attempts: Option<usize>,
}

impl ReconnectConfig {
    /// Builds the backoff policy used by the channel driver
    pub fn to_backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::unlimited()
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_multiplier(self.multiplier)
            .with_jitter(self.jitter)
            .with_max_attempts(self.max_attempts)
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 5_000,
            max_delay_ms: 60_000,
            multiplier: 1.5,
            jitter: true,
            max_attempts: None,
        }
    }
}

impl ConfigSection for ReconnectConfig {
    fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut results = vec![
            Validator::in_range(
                self.initial_delay_ms,
                100,
                3_600_000,
                "reconnect.initial_delay_ms",
            ),
            Validator::in_range(self.multiplier, 1.0, 10.0, "reconnect.multiplier"),
        ];

        if self.max_delay_ms < self.initial_delay_ms {
            results.push(Err(ValidationError::with_value(
                "reconnect.max_delay_ms",
                "must not be smaller than reconnect.initial_delay_ms",
                self.max_delay_ms,
            )));
        }

        if self.max_attempts == Some(0) {
            results.push(Err(ValidationError::new(
                "reconnect.max_attempts",
                "must be at least 1 when set",
            )));
        }

        Validator::collect_errors(results)
    }

    fn merge(&mut self, other: Self) {
        self.initial_delay_ms = other.initial_delay_ms;
        self.max_delay_ms = other.max_delay_ms;
        self.multiplier = other.multiplier;
        self.jitter = other.jitter;
        self.max_attempts = other.max_attempts;
    }

    fn section_name(&self) -> &'static str {
        "reconnect"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ReconnectConfig::default().validate().is_ok());
    }

    #[test]
    fn test_max_below_initial_rejected() {
        let config = ReconnectConfig {
            initial_delay_ms: 5_000,
            max_delay_ms: 1_000,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors[0].field, "reconnect.max_delay_ms");
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = ReconnectConfig {
            max_attempts: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_backoff_policy() {
        let config = ReconnectConfig {
            initial_delay_ms: 200,
            max_delay_ms: 1_000,
            multiplier: 2.0,
            jitter: false,
            max_attempts: Some(4),
        };
        let policy = config.to_backoff_policy();
        assert_eq!(policy.max_attempts(), Some(4));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(5), Duration::from_millis(1_000));
    }
}
