//! Document extraction job queue.
//!
//! Jobs follow their own lifecycle (see [`JobStatus`]), independent of the
//! chat state machine. The extraction worker claims pending jobs, runs the
//! extractor, and records the result; terminal outcomes are handed back to
//! the chat layer by the worker.

use crate::error::{Error, Result};
use crate::models::jobs::{ExtractionJob, JobStatus};
use crate::models::vehicles::ExtractedVehicle;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use std::collections::{HashMap, VecDeque};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueues a pending job and returns its id.
    async fn submit(&self, job: ExtractionJob) -> Result<Uuid>;

    async fn get(&self, id: Uuid) -> Result<Option<ExtractionJob>>;

    /// Moves the oldest pending job to processing and counts the attempt.
    async fn claim_next(&self) -> Result<Option<ExtractionJob>>;

    /// Marks a processing job completed.
    async fn complete(&self, id: Uuid, vehicle: ExtractedVehicle) -> Result<ExtractionJob>;

    /// Records a failed attempt. The job goes back to pending while attempts
    /// remain, otherwise it fails for good.
    ///
    /// A re-queued job does not wake [`JobQueue::wait_for_work`].
    async fn fail(&self, id: Uuid, error: String) -> Result<ExtractionJob>;

    /// Resolves when a job was submitted.
    async fn wait_for_work(&self);

    /// Removes completed and failed jobs last updated more than `retention`
    /// ago. Returns how many were removed.
    async fn prune_settled(&self, retention: TimeDelta) -> Result<usize>;
}

#[derive(Default)]
struct JobTable {
    jobs: HashMap<Uuid, ExtractionJob>,
    pending: VecDeque<Uuid>,
}

impl JobTable {
    fn move_to(&mut self, id: Uuid, target: JobStatus) -> Result<&mut ExtractionJob> {
        let job = self
            .jobs
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Extraction job {} not found", id)))?;
        if !job.status.can_transition_to(target) {
            return Err(Error::Conflict(format!(
                "Extraction job {} cannot move from {} to {}",
                id, job.status, target
            )));
        }
        job.status = target;
        job.updated_at = Utc::now();
        Ok(job)
    }
}

/// Job queue held in memory.
#[derive(Default)]
pub struct InMemoryJobQueue {
    table: Mutex<JobTable>,
    notify: Notify,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn submit(&self, job: ExtractionJob) -> Result<Uuid> {
        if job.status != JobStatus::Pending {
            return Err(Error::Validation(format!(
                "Only pending jobs can be submitted, got {}",
                job.status
            )));
        }

        let id = job.id;
        {
            let mut table = self.table.lock().await;
            if table.jobs.contains_key(&id) {
                return Err(Error::Conflict(format!("Extraction job {} already exists", id)));
            }
            table.jobs.insert(id, job);
            table.pending.push_back(id);
        }
        self.notify.notify_one();

        tracing::info!(job_id = %id, "[JobQueue] Extraction job submitted");
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<Option<ExtractionJob>> {
        Ok(self.table.lock().await.jobs.get(&id).cloned())
    }

    async fn claim_next(&self) -> Result<Option<ExtractionJob>> {
        let mut table = self.table.lock().await;
        while let Some(id) = table.pending.pop_front() {
            let pending = table
                .jobs
                .get(&id)
                .is_some_and(|job| job.status == JobStatus::Pending);
            if !pending {
                continue;
            }
            let job = table.move_to(id, JobStatus::Processing)?;
            job.attempts += 1;
            return Ok(Some(job.clone()));
        }
        Ok(None)
    }

    async fn complete(&self, id: Uuid, vehicle: ExtractedVehicle) -> Result<ExtractionJob> {
        let mut table = self.table.lock().await;
        let job = table.move_to(id, JobStatus::Completed)?;
        job.result = Some(vehicle);
        job.last_error = None;
        Ok(job.clone())
    }

    async fn fail(&self, id: Uuid, error: String) -> Result<ExtractionJob> {
        let mut table = self.table.lock().await;
        let retry = table
            .jobs
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("Extraction job {} not found", id)))?
            .has_attempts_left();

        let target = if retry {
            JobStatus::Pending
        } else {
            JobStatus::Failed
        };
        let job = table.move_to(id, target)?;
        job.last_error = Some(error);
        let job = job.clone();

        // Retries wait for the worker's next poll, not a wake-up.
        if retry {
            table.pending.push_back(id);
        }
        Ok(job)
    }

    async fn wait_for_work(&self) {
        self.notify.notified().await;
    }

    async fn prune_settled(&self, retention: TimeDelta) -> Result<usize> {
        let cutoff = Utc::now() - retention;
        let mut table = self.table.lock().await;
        let before = table.jobs.len();
        table
            .jobs
            .retain(|_, job| !job.status.is_terminal() || job.updated_at >= cutoff);
        Ok(before - table.jobs.len())
    }
}
