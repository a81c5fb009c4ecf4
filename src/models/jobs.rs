//! Document extraction job records.
//!
//! Extraction runs outside the chat state machine with its own lifecycle:
//!
//! ```text
//! Pending ──claim──> Processing ──ok──> Completed (terminal)
//!    ^                   │
//!    └──retry (attempts < max)──┘
//!                        └──final failure──> Failed (terminal)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use super::vehicles::{ExtractedVehicle, UsageType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Legal job lifecycle moves.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
                | (Self::Processing, Self::Pending)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub id: Uuid,
    /// Chat identity to notify when the job settles
    pub identity: String,
    pub media_ref: String,
    pub usage_type: UsageType,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub result: Option<ExtractedVehicle>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExtractionJob {
    pub fn new(identity: String, media_ref: String, usage_type: UsageType, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            identity,
            media_ref,
            usage_type,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts,
            result: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Outcome to hand back to the chat session, once the job has settled.
    pub fn settled_outcome(&self) -> Option<ExtractionOutcome> {
        let result = match (self.status, &self.result) {
            (JobStatus::Completed, Some(vehicle)) => ExtractionResult::Completed {
                vehicle: vehicle.clone(),
            },
            (JobStatus::Failed, _) => ExtractionResult::Failed {
                reason: UNREADABLE_DOCUMENT.to_string(),
            },
            _ => return None,
        };
        Some(ExtractionOutcome {
            job_id: self.id,
            identity: self.identity.clone(),
            result,
        })
    }
}

/// Reason shown to the user when a job fails for good.
pub const UNREADABLE_DOCUMENT: &str = "we could not read the vehicle details";

/// Terminal result of a job, delivered back into the chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExtractionResult {
    Completed { vehicle: ExtractedVehicle },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub job_id: Uuid,
    pub identity: String,
    pub result: ExtractionResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_lifecycle_rules() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Processing));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Pending));
        assert!(JobStatus::Processing.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Processing));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn test_settled_outcome_only_for_terminal_jobs() {
        let mut job = ExtractionJob::new("u1".into(), "media-1".into(), UsageType::Taxi, 3);
        assert!(job.settled_outcome().is_none());

        job.status = JobStatus::Failed;
        job.last_error = Some("timeout".into());
        let outcome = job.settled_outcome().unwrap();
        assert_eq!(outcome.identity, "u1");
        assert_eq!(
            outcome.result,
            ExtractionResult::Failed {
                reason: UNREADABLE_DOCUMENT.to_string()
            }
        );
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = ExtractionJob::new("u1".into(), "media-1".into(), UsageType::Taxi, 3);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert!(job.has_attempts_left());
    }
}
