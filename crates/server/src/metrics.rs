//! Lock-free host counters.
//!
//! The tick loop and the action layer update these with relaxed atomics; the
//! stats task reads them at its own pace and logs a snapshot.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::Instant;

use plotgrid_engine::task::TickReport;

pub struct Metrics {
    // Monotonic counters
    turns: AtomicU64,
    turn_ns_sum: AtomicU64,
    items_stepped: AtomicU64,
    tasks_completed: AtomicU64,
    claims: AtomicU64,
    merges: AtomicU64,
    clears: AtomicU64,

    // Gauges
    tasks_pending: AtomicU64,

    // Turn duration histogram
    hist_under_100us: AtomicU64,
    hist_100us_1ms: AtomicU64,
    hist_1_5ms: AtomicU64,
    hist_5_20ms: AtomicU64,
    hist_over_20ms: AtomicU64,

    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            turns: AtomicU64::new(0),
            turn_ns_sum: AtomicU64::new(0),
            items_stepped: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            claims: AtomicU64::new(0),
            merges: AtomicU64::new(0),
            clears: AtomicU64::new(0),
            tasks_pending: AtomicU64::new(0),
            hist_under_100us: AtomicU64::new(0),
            hist_100us_1ms: AtomicU64::new(0),
            hist_1_5ms: AtomicU64::new(0),
            hist_5_20ms: AtomicU64::new(0),
            hist_over_20ms: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    /// Called after every scheduler turn.
    pub fn record_turn(&self, report: &TickReport) {
        self.turns.fetch_add(1, Relaxed);
        self.turn_ns_sum
            .fetch_add(report.elapsed.as_nanos() as u64, Relaxed);
        self.items_stepped.fetch_add(report.items as u64, Relaxed);
        self.tasks_completed
            .fetch_add(report.completed as u64, Relaxed);
        self.tasks_pending.store(report.remaining as u64, Relaxed);

        let bucket = match report.elapsed.as_micros() {
            0..=99 => &self.hist_under_100us,
            100..=999 => &self.hist_100us_1ms,
            1_000..=4_999 => &self.hist_1_5ms,
            5_000..=19_999 => &self.hist_5_20ms,
            _ => &self.hist_over_20ms,
        };
        bucket.fetch_add(1, Relaxed);
    }

    pub fn record_claim(&self) {
        self.claims.fetch_add(1, Relaxed);
    }

    pub fn record_merge(&self) {
        self.merges.fetch_add(1, Relaxed);
    }

    pub fn record_clear(&self) {
        self.clears.fetch_add(1, Relaxed);
    }

    pub fn snapshot(&self, plots_owned: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            turns: self.turns.load(Relaxed),
            turn_ns_sum: self.turn_ns_sum.load(Relaxed),
            items_stepped: self.items_stepped.load(Relaxed),
            tasks_completed: self.tasks_completed.load(Relaxed),
            tasks_pending: self.tasks_pending.load(Relaxed),
            claims: self.claims.load(Relaxed),
            merges: self.merges.load(Relaxed),
            clears: self.clears.load(Relaxed),
            plots_owned,
            hist: [
                self.hist_under_100us.load(Relaxed),
                self.hist_100us_1ms.load(Relaxed),
                self.hist_1_5ms.load(Relaxed),
                self.hist_5_20ms.load(Relaxed),
                self.hist_over_20ms.load(Relaxed),
            ],
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable snapshot of all counters at a point in time.
#[derive(Clone, Debug, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: f64,
    pub turns: u64,
    pub turn_ns_sum: u64,
    pub items_stepped: u64,
    pub tasks_completed: u64,
    pub tasks_pending: u64,
    pub claims: u64,
    pub merges: u64,
    pub clears: u64,
    pub plots_owned: u64,
    /// `[<100μs, 100μs-1ms, 1-5ms, 5-20ms, >20ms]`
    pub hist: [u64; 5],
}
