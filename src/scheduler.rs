//! Fixed-interval refresh loop around a snapshot source.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

use crate::dashboard::{DashboardSnapshot, DashboardSnapshotSource};
use crate::pipeline::Selection;

/// Runs a cycle per tick and hands each snapshot to `on_snapshot`.
///
/// The first tick fires immediately. A slow cycle delays the next tick rather
/// than queueing a burst, so cycles never overlap. Returns the number of ticks
/// run, which only happens when `max_ticks` is set.
pub async fn run_refresh_loop<F>(
    source: Arc<dyn DashboardSnapshotSource>,
    selection: Selection,
    interval: Duration,
    max_ticks: Option<u64>,
    mut on_snapshot: F,
) -> u64
where
    F: FnMut(u64, DashboardSnapshot),
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick: u64 = 0;

    while max_ticks.map_or(true, |max| tick < max) {
        ticker.tick().await;
        tick += 1;
        debug!(
            component = "scheduler",
            event = "refresh.tick",
            tick,
            segment = selection.segment.as_str()
        );

        let source = Arc::clone(&source);
        let cycle_selection = selection.clone();
        match tokio::task::spawn_blocking(move || source.snapshot(&cycle_selection)).await {
            Ok(snapshot) => on_snapshot(tick, snapshot),
            Err(err) => error!(
                component = "scheduler",
                event = "refresh.join_error",
                tick,
                error = %err
            ),
        }
    }

    tick
}
