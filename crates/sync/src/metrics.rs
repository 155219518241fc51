//! Lock-free sync counters.
//!
//! Updated from the tick loop with relaxed atomics and read whenever a
//! snapshot is wanted (the headless driver logs one on exit).

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::{Duration, Instant};

pub struct SyncMetrics {
    // Monotonic counters
    chunks_published: AtomicU64,
    chunks_retrieved: AtomicU64,
    block_pushes: AtomicU64,
    remote_chunks_applied: AtomicU64,
    write_failures: AtomicU64,
    resyncs: AtomicU64,
    ticks: AtomicU64,

    // Tick duration histogram
    hist_under_1ms: AtomicU64,
    hist_1_4ms: AtomicU64,
    hist_4_16ms: AtomicU64,
    hist_over_16ms: AtomicU64,

    started_at: Instant,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            chunks_published: AtomicU64::new(0),
            chunks_retrieved: AtomicU64::new(0),
            block_pushes: AtomicU64::new(0),
            remote_chunks_applied: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            resyncs: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            hist_under_1ms: AtomicU64::new(0),
            hist_1_4ms: AtomicU64::new(0),
            hist_4_16ms: AtomicU64::new(0),
            hist_over_16ms: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn chunks_published(&self, n: u64) {
        self.chunks_published.fetch_add(n, Relaxed);
    }

    pub fn chunks_retrieved(&self, n: u64) {
        self.chunks_retrieved.fetch_add(n, Relaxed);
    }

    pub fn block_pushed(&self) {
        self.block_pushes.fetch_add(1, Relaxed);
    }

    pub fn remote_chunk_applied(&self) {
        self.remote_chunks_applied.fetch_add(1, Relaxed);
    }

    pub fn write_failed(&self) {
        self.write_failures.fetch_add(1, Relaxed);
    }

    pub fn resynced(&self) {
        self.resyncs.fetch_add(1, Relaxed);
    }

    pub fn record_tick(&self, duration: Duration) {
        self.ticks.fetch_add(1, Relaxed);
        match duration.as_millis() {
            0 => self.hist_under_1ms.fetch_add(1, Relaxed),
            1..=3 => self.hist_1_4ms.fetch_add(1, Relaxed),
            4..=15 => self.hist_4_16ms.fetch_add(1, Relaxed),
            _ => self.hist_over_16ms.fetch_add(1, Relaxed),
        };
    }

    pub fn snapshot(&self) -> SyncMetricsSnapshot {
        SyncMetricsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            chunks_published: self.chunks_published.load(Relaxed),
            chunks_retrieved: self.chunks_retrieved.load(Relaxed),
            block_pushes: self.block_pushes.load(Relaxed),
            remote_chunks_applied: self.remote_chunks_applied.load(Relaxed),
            write_failures: self.write_failures.load(Relaxed),
            resyncs: self.resyncs.load(Relaxed),
            ticks: self.ticks.load(Relaxed),
            hist: [
                self.hist_under_1ms.load(Relaxed),
                self.hist_1_4ms.load(Relaxed),
                self.hist_4_16ms.load(Relaxed),
                self.hist_over_16ms.load(Relaxed),
            ],
        }
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`SyncMetrics`].
#[derive(Clone, Debug, Serialize)]
pub struct SyncMetricsSnapshot {
    pub uptime_secs: f64,
    pub chunks_published: u64,
    pub chunks_retrieved: u64,
    pub block_pushes: u64,
    pub remote_chunks_applied: u64,
    pub write_failures: u64,
    pub resyncs: u64,
    pub ticks: u64,
    /// `[<1ms, 1-4ms, 4-16ms, >16ms]`
    pub hist: [u64; 4],
}
