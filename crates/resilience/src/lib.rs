//! Resilience helpers for long-lived connections
//!
//! - [`BackoffPolicy`]: exponential backoff with jitter, bounded or unlimited
//! - [`retry_async`]: run an async operation under a backoff policy
//! - [`with_timeout`] / [`Timeout`]: bound an async operation in time
//!
//! # Example
//!
//! ```rust
//! use bookwire_resilience::BackoffPolicy;
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::unlimited()
//!     .with_initial_delay(Duration::from_secs(5))
//!     .with_jitter(false);
//! assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(5));
//! ```

mod backoff;
mod error;
mod timeout;

pub use backoff::{retry_async, BackoffPolicy};
pub use error::{ResilienceError, ResilienceResult};
pub use timeout::{with_timeout, Timeout};
