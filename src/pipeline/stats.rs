// SPDX-License-Identifier: GPL-3.0-only

//! Per-stage counters
//!
//! Stage workers and the capture loop swallow per-item failures and
//! backpressure drops. The counters here make that loss visible.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct StageStats {
    processed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    last_duration_us: AtomicU64,
}

/// Point-in-time copy of [`StageStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Items that produced a result (or frames read, for capture)
    pub processed: u64,
    /// Items whose stage function failed (or failed reads)
    pub failed: u64,
    /// Results discarded because the next queue was full
    pub dropped: u64,
    /// Duration of the most recent successful item
    pub last_duration: Duration,
}

impl StageStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, took: Duration) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.last_duration_us
            .store(took.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            last_duration: Duration::from_micros(self.last_duration_us.load(Ordering::Relaxed)),
        }
    }
}

impl StatsSnapshot {
    /// Compact form for the status bar, e.g. "12 ok/1 err/30 drop 41ms"
    pub fn summary(&self) -> String {
        format!(
            "{} ok/{} err/{} drop {}ms",
            self.processed,
            self.failed,
            self.dropped,
            self.last_duration.as_millis()
        )
    }
}
