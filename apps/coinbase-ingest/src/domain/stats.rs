//! Ingestion Counters
//!
//! Process-lifetime counters updated from multiple concurrent tasks: the
//! receive loop counts accepted and malformed frames while the flush path
//! counts inserted rows and failed writes. Counters are monotonic and only
//! ever incremented; readers take point-in-time snapshots for logging and
//! the exit summary.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Trade frames accepted from the feed.
    pub received: u64,
    /// Rows acknowledged by the sink.
    pub inserted: u64,
    /// Malformed frames, transport failures, and failed flushes.
    pub errors: u64,
}

/// Shared ingestion counters.
///
/// The one piece of state legitimately mutated from multiple concurrent
/// contexts, so every update is an atomic increment.
#[derive(Debug, Default)]
pub struct Stats {
    received: AtomicU64,
    inserted: AtomicU64,
    errors: AtomicU64,
}

impl Stats {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one accepted trade frame, returning the new total.
    pub fn record_received(&self) -> u64 {
        self.received.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Add acknowledged rows from a successful flush.
    pub fn add_inserted(&self, count: u64) {
        self.inserted.fetch_add(count, Ordering::Relaxed);
    }

    /// Count one error (malformed frame, transport failure, failed flush).
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            inserted: self.inserted.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
