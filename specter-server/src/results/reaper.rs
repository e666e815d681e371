//! Background deletion of result files that were never downloaded.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::store::ResultStore;

/// Spawn the cleanup loop: sweep the store every `interval`, deleting files
/// older than `max_age`. Runs until `shutdown` fires.
pub fn spawn(
    store: ResultStore,
    interval: Duration,
    max_age: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            dir = %store.dir().display(),
            interval_secs = interval.as_secs(),
            max_age_secs = max_age.as_secs(),
            "result cleanup loop started"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("result cleanup loop stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = store.sweep_stale(max_age).await;
                    if removed > 0 {
                        debug!(removed, "reaped stale result files");
                    }
                }
            }
        }
    })
}
