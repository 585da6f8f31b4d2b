// crates/resilience/src/error.rs
//! Why a bounded or retried operation produced no value

use std::time::Duration;
use thiserror::Error;

pub type ResilienceResult<T> = Result<T, ResilienceError>;

#[derive(Debug, Error)]
pub enum ResilienceError {
    /// Still pending when its time bound elapsed
    #[error("No answer within {0:?}")]
    Timeout(Duration),

    /// The backoff policy allows no further attempt
    #[error("Gave up after {attempts} attempt(s), last failure: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },
}

impl ResilienceError {
    /// True once the backoff policy has run out of attempts
    pub fn is_exhausted(&self) -> bool {
        matches!(self, ResilienceError::RetriesExhausted { .. })
    }

    /// Attempts made before giving up, if the error came from a retry loop
    pub fn attempts(&self) -> Option<usize> {
        match self {
            ResilienceError::RetriesExhausted { attempts, .. } => Some(*attempts),
            ResilienceError::Timeout(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_timeout_reads_as_silence() {
        let err = ResilienceError::Timeout(Duration::from_millis(1_500));
        assert_eq!(err.to_string(), "No answer within 1.5s");
        assert!(!err.is_exhausted());
        assert_eq!(err.attempts(), None);
    }

    #[test]
    fn test_exhausted_keeps_last_broker_failure() {
        let err = ResilienceError::RetriesExhausted {
            attempts: 4,
            last_error: "Broker rejected the session: bad token".to_string(),
        };
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), Some(4));
        assert_eq!(
            err.to_string(),
            "Gave up after 4 attempt(s), last failure: Broker rejected the session: bad token"
        );
    }
}
