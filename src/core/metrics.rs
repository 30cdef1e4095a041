//! Pipeline metrics for observability
//!
//! Counters for the synchronous log path (`LoggerMetrics`) and for each
//! batching sink's background worker (`BatchMetrics`).

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the routing/delivery path
///
/// # Example
///
/// ```
/// use rust_log_pipeline::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
/// metrics.record_delivered();
/// metrics.record_failed();
///
/// assert_eq!(metrics.delivered_count(), 1);
/// assert_eq!(metrics.failed_count(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Handler deliveries that reached every sink
    delivered: AtomicU64,

    /// Handler deliveries stopped by a sink error
    failed: AtomicU64,

    /// Log calls for levels with no handler
    unrouted: AtomicU64,
}

impl LoggerMetrics {
    pub const fn new() -> Self {
        Self {
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            unrouted: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn unrouted_count(&self) -> u64 {
        self.unrouted.load(Ordering::Relaxed)
    }

    /// Record a successful delivery, returning the previous count
    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.delivered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_failed(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_unrouted(&self) -> u64 {
        self.unrouted.fetch_add(1, Ordering::Relaxed)
    }

    /// Failure rate as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing has been delivered yet.
    pub fn failure_rate(&self) -> f64 {
        let failed = self.failed_count() as f64;
        let total = self.delivered_count() as f64 + failed;
        if total == 0.0 {
            0.0
        } else {
            (failed / total) * 100.0
        }
    }

    pub fn reset(&self) {
        self.delivered.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.unrouted.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            delivered: AtomicU64::new(self.delivered_count()),
            failed: AtomicU64::new(self.failed_count()),
            unrouted: AtomicU64::new(self.unrouted_count()),
        }
    }
}

/// Counters kept by a batching sink's worker
#[derive(Debug, Default)]
pub struct BatchMetrics {
    accepted: AtomicU64,
    batches_sent: AtomicU64,
    send_failures: AtomicU64,
}

impl BatchMetrics {
    pub const fn new() -> Self {
        Self {
            accepted: AtomicU64::new(0),
            batches_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        }
    }

    /// Messages handed to the worker
    #[inline]
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Batches delivered by the transport
    #[inline]
    pub fn batches_sent(&self) -> u64 {
        self.batches_sent.load(Ordering::Relaxed)
    }

    /// Batches the transport rejected
    #[inline]
    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    /// Batches attempted, successful or not
    pub fn batches_attempted(&self) -> u64 {
        self.batches_sent() + self.send_failures()
    }

    #[inline]
    pub fn record_accepted(&self) -> u64 {
        self.accepted.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sent(&self) -> u64 {
        self.batches_sent.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_send_failure(&self) -> u64 {
        self.send_failures.fetch_add(1, Ordering::Relaxed)
    }
}
