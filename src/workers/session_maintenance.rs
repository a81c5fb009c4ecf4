use crate::services::conversation::{Dispatcher, PruneReport};
use chrono::TimeDelta;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::info;

/// Background worker that prunes idle session locks, old delivery records
/// and settled extraction jobs
///
/// Message ids older than `retention` are forgotten, so a redelivery after
/// that window is processed again. Completed and failed jobs are dropped
/// after the same window.
pub async fn session_maintenance_worker(
    dispatcher: Arc<Dispatcher>,
    prune_interval: Duration,
    retention: TimeDelta,
    mut shutdown_rx: tokio::sync::broadcast::Receiver<()>,
) {
    let mut prune = interval(prune_interval);
    info!(
        "[SessionMaintenance] Worker started (runs every {} seconds)",
        prune_interval.as_secs()
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("[SessionMaintenance] Shutting down");
                break;
            }
            _ = prune.tick() => {
                let report = dispatcher.prune(retention).await;
                if report != PruneReport::default() {
                    info!(
                        "[SessionMaintenance] Pruned {} idle locks, {} delivery records and {} settled jobs",
                        report.locks, report.deliveries, report.jobs
                    );
                }
            }
        }
    }

    info!("[SessionMaintenance] Worker stopped");
}
