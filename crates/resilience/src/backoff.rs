// crates/resilience/src/backoff.rs
//! Reconnect backoff with exponential growth and deterministic jitter

use crate::error::{ResilienceError, ResilienceResult};
use std::future::Future;
use std::time::Duration;

/// Backoff policy for repeated attempts
///
/// `max_attempts` of `None` means keep trying forever, which is what a
/// long-lived connection wants.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Maximum number of attempts including the first one
    max_attempts: Option<usize>,
    /// Delay before the first retry
    initial_delay: Duration,
    /// Upper bound for any single delay
    max_delay: Duration,
    /// Growth factor between consecutive delays
    multiplier: f64,
    /// Whether to spread delays with jitter
    use_jitter: bool,
}

impl BackoffPolicy {
    /// Creates a policy that gives up after `max_attempts`
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            ..Self::unlimited()
        }
    }

    /// Creates a policy that never gives up
    pub fn unlimited() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            use_jitter: true,
        }
    }

    /// Sets the initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier; values below 1.0 are treated as 1.0
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Sets whether to use jitter
    pub fn with_jitter(mut self, use_jitter: bool) -> Self {
        self.use_jitter = use_jitter;
        self
    }

    /// Sets the attempt limit (`None` for unlimited)
    pub fn with_max_attempts(mut self, max_attempts: Option<usize>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay to wait before attempt number `attempt` (1-based retries; 0 is immediate)
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        // Cap the exponent so powi never overflows to infinity
        let exponent = (attempt - 1).min(64) as i32;
        let base_delay = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_delay = base_delay.min(self.max_delay.as_millis() as f64);

        let final_delay = if self.use_jitter {
            // Between 75% and 100% of the capped delay, stable per attempt
            let jitter_factor = 0.75 + (attempt as f64 * 0.1 % 0.25);
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }

    /// Returns the attempt limit
    pub fn max_attempts(&self) -> Option<usize> {
        self.max_attempts
    }

    /// Returns true if another attempt is allowed after `attempts_made`
    pub fn allows(&self, attempts_made: usize) -> bool {
        self.max_attempts.map_or(true, |max| attempts_made < max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Runs an async operation until it succeeds or the policy gives up
pub async fn retry_async<F, Fut, T, E>(policy: &BackoffPolicy, mut operation: F) -> ResilienceResult<T>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if !policy.allows(attempt) {
                    return Err(ResilienceError::RetriesExhausted {
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }

                let delay = policy.delay_for_attempt(attempt);
                log::debug!("Attempt {} failed: {}; retrying in {:?}", attempt, e, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
