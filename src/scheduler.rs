/// Periodic, non-overlapping sync scheduling.
///
/// The interval timer only fires the trigger; the engine's own run guard
/// turns an overlapping tick into a no-op, so a slow cycle is never
/// stacked on top of itself.
use crate::logger::{self, LogTag};
use crate::sync::SyncEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub fn start_sync_scheduler(
    engine: Arc<SyncEngine>,
    shutdown: Arc<Notify>,
    interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        logger::info(
            LogTag::Sync,
            &format!("Sync scheduler started (every {}s)", interval_secs),
        );

        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // Pinned once so a notification arriving mid-cycle is not lost
        let shutdown_signal = shutdown.notified();
        tokio::pin!(shutdown_signal);

        loop {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    logger::info(LogTag::Sync, "Sync scheduler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let outcome = engine.trigger_sync().await;
                    if !outcome.ran {
                        logger::debug(LogTag::Sync, "Tick skipped: previous cycle still running");
                    }
                }
            }
        }
    })
}
