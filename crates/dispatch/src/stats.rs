// crates/dispatch/src/stats.rs
//! Delivery counters for one session

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of [`DeliveryStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySnapshot {
    pub delivered: u64,
    pub decode_failures: u64,
    pub sink_rejections: u64,
}

impl DeliverySnapshot {
    /// Every message that reached a route
    pub fn received(&self) -> u64 {
        self.delivered + self.decode_failures + self.sink_rejections
    }
}

/// Lock-free counters bumped by delivery tasks
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    decode_failures: AtomicU64,
    sink_rejections: AtomicU64,
}

impl DeliveryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_rejection(&self) {
        self.sink_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            sink_rejections: self.sink_rejections.load(Ordering::Relaxed),
        }
    }
}
