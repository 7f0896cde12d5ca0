//! Metrics for a waiting line.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::queue::Placement;

/// Counters for monitoring one queue
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Entrants accepted into the queue
    pub entrants_inserted: AtomicU64,

    /// Inserts rejected because the identity was already waiting
    pub duplicates_rejected: AtomicU64,

    /// Inserts placed by a remembered position
    pub saved_placements: AtomicU64,

    /// Inserts placed by the priority scan
    pub priority_placements: AtomicU64,

    /// Entrants that left before being dispatched
    pub entrants_left: AtomicU64,

    /// Entrants popped and handed to the backend
    pub dispatched: AtomicU64,

    /// Admission attempts the backend accepted
    pub connects_succeeded: AtomicU64,

    /// Admission attempts the backend refused
    pub connects_failed: AtomicU64,

    /// Ticks that found the queue emptied under them
    pub skipped_ticks: AtomicU64,

    /// Maximum queue depth observed
    pub max_queue_depth: AtomicU64,
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted insert and the resulting depth
    pub fn record_inserted(&self, placement: Placement, depth: usize) {
        self.entrants_inserted.fetch_add(1, Ordering::Relaxed);
        match placement {
            Placement::Saved => self.saved_placements.fetch_add(1, Ordering::Relaxed),
            Placement::Priority => self.priority_placements.fetch_add(1, Ordering::Relaxed),
        };

        let depth = depth as u64;
        let mut current_max = self.max_queue_depth.load(Ordering::Relaxed);
        while depth > current_max {
            match self.max_queue_depth.compare_exchange_weak(
                current_max,
                depth,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_max = x,
            }
        }
    }

    pub fn record_duplicate(&self) {
        self.duplicates_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_left(&self) {
        self.entrants_left.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connected(&self) {
        self.connects_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect_failed(&self) {
        self.connects_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped_tick(&self) {
        self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Share of finished admission attempts that succeeded
    pub fn success_rate(&self) -> f64 {
        let ok = self.connects_succeeded.load(Ordering::Relaxed);
        let failed = self.connects_failed.load(Ordering::Relaxed);
        if ok + failed == 0 {
            return 1.0;
        }
        ok as f64 / (ok + failed) as f64
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            entrants_inserted: self.entrants_inserted.load(Ordering::Relaxed),
            duplicates_rejected: self.duplicates_rejected.load(Ordering::Relaxed),
            saved_placements: self.saved_placements.load(Ordering::Relaxed),
            priority_placements: self.priority_placements.load(Ordering::Relaxed),
            entrants_left: self.entrants_left.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            connects_succeeded: self.connects_succeeded.load(Ordering::Relaxed),
            connects_failed: self.connects_failed.load(Ordering::Relaxed),
            skipped_ticks: self.skipped_ticks.load(Ordering::Relaxed),
            max_queue_depth: self.max_queue_depth.load(Ordering::Relaxed),
            success_rate: self.success_rate(),
        }
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub entrants_inserted: u64,
    pub duplicates_rejected: u64,
    pub saved_placements: u64,
    pub priority_placements: u64,
    pub entrants_left: u64,
    pub dispatched: u64,
    pub connects_succeeded: u64,
    pub connects_failed: u64,
    pub skipped_ticks: u64,
    pub max_queue_depth: u64,
    pub success_rate: f64,
}
