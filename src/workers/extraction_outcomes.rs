use crate::models::jobs::ExtractionOutcome;
use crate::services::conversation::Dispatcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

const DELIVERY_ATTEMPTS: u32 = 3;

/// Background worker that feeds settled extraction jobs into their sessions
pub async fn extraction_outcome_worker(
    dispatcher: Arc<Dispatcher>,
    mut outcomes: mpsc::Receiver<ExtractionOutcome>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    info!("[ExtractionOutcomes] Worker started");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("[ExtractionOutcomes] Shutting down");
                break;
            }
            received = outcomes.recv() => {
                let Some(outcome) = received else {
                    info!("[ExtractionOutcomes] Channel closed");
                    break;
                };
                deliver(&dispatcher, outcome).await;
            }
        }
    }

    info!("[ExtractionOutcomes] Worker stopped");
}

async fn deliver(dispatcher: &Dispatcher, outcome: ExtractionOutcome) {
    for attempt in 1..=DELIVERY_ATTEMPTS {
        match dispatcher.deliver_extraction_outcome(outcome.clone()).await {
            Ok(report) => {
                info!(
                    identity = %report.identity,
                    job_id = %outcome.job_id,
                    outcome = ?report.outcome,
                    "[ExtractionOutcomes] Outcome delivered"
                );
                return;
            }
            Err(e) if attempt < DELIVERY_ATTEMPTS => {
                warn!(job_id = %outcome.job_id, attempt, error = %e, "[ExtractionOutcomes] Delivery failed, retrying");
                tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
            }
            Err(e) => {
                // The job record keeps the result; the session applies it on
                // the user's next message.
                error!(job_id = %outcome.job_id, error = %e, "[ExtractionOutcomes] Delivery failed, left for the next message");
            }
        }
    }
}
