//! The tick host: drives the engine's scheduler at a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use plotgrid_engine::task::TaskScheduler;

use crate::metrics::Metrics;

/// Tick `scheduler` every `period` forever. Turns that overrun are not
/// caught up; the next turn simply starts late.
pub async fn run(scheduler: &mut TaskScheduler, period: Duration, metrics: Arc<Metrics>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let report = scheduler.tick();
        metrics.record_turn(&report);
        if report.ran > 0 {
            tracing::trace!(
                "turn {}: {} jobs, {} items, {} left ({:.2?})",
                report.tick,
                report.ran,
                report.items,
                report.remaining,
                report.elapsed
            );
        }
    }
}

/// Run queued work to completion before shutdown, giving up after
/// `max_ticks` turns. Returns whether the scheduler went idle.
pub fn drain(scheduler: &mut TaskScheduler, max_ticks: u64, metrics: &Metrics) -> bool {
    let mut ticks = 0;
    while ticks < max_ticks && !scheduler.is_idle() {
        let report = scheduler.tick();
        metrics.record_turn(&report);
        ticks += 1;
    }
    let idle = scheduler.is_idle();
    if !idle {
        tracing::warn!(
            "{} tasks still pending after {} shutdown turns",
            scheduler.pending(),
            ticks
        );
    }
    idle
}
