use crate::models::jobs::{
    ExtractionJob, ExtractionOutcome, ExtractionResult, JobStatus, UNREADABLE_DOCUMENT,
};
use crate::providers::DocumentExtractor;
use crate::services::extraction::JobQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Background worker that runs document extraction jobs
///
/// Wakes when a job is submitted and on every poll tick. Terminal outcomes
/// are sent on `outcomes` for delivery back into the chat session.
pub async fn extraction_worker(
    jobs: Arc<dyn JobQueue>,
    extractor: Arc<dyn DocumentExtractor>,
    outcomes: mpsc::Sender<ExtractionOutcome>,
    poll_interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut poll = interval(poll_interval);
    info!(
        "[ExtractionWorker] Started (polls every {} seconds)",
        poll_interval.as_secs()
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("[ExtractionWorker] Shutting down");
                break;
            }
            _ = jobs.wait_for_work() => {
                run_pending_jobs(jobs.as_ref(), extractor.as_ref(), &outcomes).await;
            }
            _ = poll.tick() => {
                run_pending_jobs(jobs.as_ref(), extractor.as_ref(), &outcomes).await;
            }
        }
    }

    info!("[ExtractionWorker] Stopped");
}

/// Claims and runs pending jobs until the queue is empty or a job is
/// re-queued for retry. Returns the number of jobs run.
pub async fn run_pending_jobs(
    jobs: &dyn JobQueue,
    extractor: &dyn DocumentExtractor,
    outcomes: &mpsc::Sender<ExtractionOutcome>,
) -> usize {
    let mut processed = 0;
    loop {
        let job = match jobs.claim_next().await {
            Ok(Some(job)) => job,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "[ExtractionWorker] Failed to claim job");
                break;
            }
        };
        processed += 1;

        match run_job(jobs, extractor, &job).await {
            Some(outcome) => {
                if outcomes.send(outcome).await.is_err() {
                    warn!(job_id = %job.id, "[ExtractionWorker] Outcome channel closed");
                    break;
                }
            }
            None => break,
        }
    }
    processed
}

/// Runs one claimed job. Returns the outcome once the job is terminal.
async fn run_job(
    jobs: &dyn JobQueue,
    extractor: &dyn DocumentExtractor,
    job: &ExtractionJob,
) -> Option<ExtractionOutcome> {
    debug!(job_id = %job.id, attempt = job.attempts, "[ExtractionWorker] Extracting document");

    let result = match extractor.extract(&job.media_ref, job.usage_type).await {
        Ok(vehicle) => match jobs.complete(job.id, vehicle.clone()).await {
            Ok(_) => {
                info!(job_id = %job.id, plate = %vehicle.plate_number, "[ExtractionWorker] Job completed");
                ExtractionResult::Completed { vehicle }
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "[ExtractionWorker] Failed to record completion");
                return None;
            }
        },
        Err(extract_error) => {
            let failed = match jobs.fail(job.id, extract_error.to_string()).await {
                Ok(failed) => failed,
                Err(e) => {
                    error!(job_id = %job.id, error = %e, "[ExtractionWorker] Failed to record failure");
                    return None;
                }
            };
            if failed.status != JobStatus::Failed {
                warn!(
                    job_id = %job.id,
                    attempt = failed.attempts,
                    max_attempts = failed.max_attempts,
                    error = %extract_error,
                    "[ExtractionWorker] Attempt failed, job re-queued"
                );
                return None;
            }
            warn!(job_id = %job.id, error = %extract_error, "[ExtractionWorker] Job failed");
            ExtractionResult::Failed {
                reason: UNREADABLE_DOCUMENT.to_string(),
            }
        }
    };

    Some(ExtractionOutcome {
        job_id: job.id,
        identity: job.identity.clone(),
        result,
    })
}
