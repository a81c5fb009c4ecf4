mod common;

use chatflows::models::events::InboundEvent;
use chatflows::models::jobs::{ExtractionOutcome, ExtractionResult, JobStatus};
use chatflows::models::vehicles::UsageType;
use chatflows::providers::RecordStore;
use chatflows::services::conversation::DispatchOutcome;
use chatflows::services::conversation::state_machine::State;
use chatflows::services::extraction::JobQueue;
use chatflows::workers::run_pending_jobs;
use common::{Harness, ScriptedExtractor, sample_vehicle};
use tokio::sync::mpsc;
use uuid::Uuid;

const USER: &str = "250788000555";

async fn upload_document(h: &Harness) -> Uuid {
    h.list(USER, "add_vehicle").await;
    h.button(USER, "taxi").await;
    let report = h.send(InboundEvent::image(USER, "media-42")).await;
    assert_eq!(report.state, Some(State::VehicleProcessing));

    h.session(USER)
        .await
        .unwrap()
        .context
        .vehicle
        .extraction_job_id
        .expect("job id stored")
}

async fn run_extraction(h: &Harness, extractor: &ScriptedExtractor) -> ExtractionOutcome {
    let (tx, mut rx) = mpsc::channel(4);
    run_pending_jobs(h.jobs.as_ref(), extractor, &tx).await;
    rx.recv().await.expect("outcome emitted")
}

#[tokio::test]
async fn test_upload_submits_extraction_job() {
    let h = Harness::new();
    let job_id = upload_document(&h).await;

    let job = h.jobs.get(job_id).await.unwrap().expect("job queued");
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.identity, USER);
    assert_eq!(job.media_ref, "media-42");
    assert_eq!(job.usage_type, UsageType::Taxi);

    let saved = h.session(USER).await.unwrap();
    assert_eq!(saved.context.vehicle.document_uploaded, Some(true));
}

#[tokio::test]
async fn test_text_while_processing_is_answered_without_moving() {
    let h = Harness::new();
    upload_document(&h).await;

    let report = h.text(USER, "done?").await;
    assert_eq!(report.outcome, DispatchOutcome::Unchanged);
    assert!(h.sender.last_for(USER).await.unwrap().body().contains("still reading"));
    assert_eq!(h.stored_state(USER).await, Some(State::VehicleProcessing));
}

#[tokio::test]
async fn test_text_instead_of_document_reprompts() {
    let h = Harness::new();
    h.list(USER, "add_vehicle").await;
    h.button(USER, "personal").await;

    let report = h.text(USER, "here it is").await;
    assert_eq!(report.outcome, DispatchOutcome::Unchanged);
    assert_eq!(h.stored_state(USER).await, Some(State::VehicleUploadDocument));
}

#[tokio::test]
async fn test_completed_extraction_is_confirmed_and_saved() {
    let h = Harness::new();
    upload_document(&h).await;

    let extractor = ScriptedExtractor::new(vec![Ok(sample_vehicle())]);
    let outcome = run_extraction(&h, &extractor).await;
    let report = h.dispatcher.deliver_extraction_outcome(outcome).await.unwrap();
    assert_eq!(
        report.outcome,
        DispatchOutcome::Transitioned {
            from: State::VehicleProcessing,
            to: State::VehicleConfirm
        }
    );

    let prompt = h.sender.last_for(USER).await.unwrap();
    assert!(prompt.body().contains("RAD123A"));
    assert_eq!(prompt.option_ids(), vec!["confirm_vehicle", "retake"]);

    let report = h.button(USER, "confirm_vehicle").await;
    assert_eq!(report.state, Some(State::VehicleSaved));

    let saved = h.session(USER).await.unwrap();
    let vehicle = h
        .records
        .get_vehicle(saved.context.vehicle.vehicle_id.unwrap())
        .await
        .unwrap()
        .expect("vehicle stored");
    assert_eq!(vehicle.owner, USER);
    assert_eq!(vehicle.usage_type, UsageType::Taxi);
    assert_eq!(vehicle.details, sample_vehicle());
}

#[tokio::test]
async fn test_failed_extraction_asks_for_new_upload() {
    let h = Harness::new();
    let job_id = upload_document(&h).await;

    let report = h
        .dispatcher
        .deliver_extraction_outcome(ExtractionOutcome {
            job_id,
            identity: USER.to_string(),
            result: ExtractionResult::Failed {
                reason: "image too blurry".to_string(),
            },
        })
        .await
        .unwrap();
    assert_eq!(report.state, Some(State::VehicleUploadDocument));
    assert!(
        h.sender
            .last_for(USER)
            .await
            .unwrap()
            .body()
            .contains("We could not read your document (image too blurry)")
    );

    // A second upload starts a fresh job.
    let report = h.send(InboundEvent::image(USER, "media-43")).await;
    assert_eq!(report.state, Some(State::VehicleProcessing));
    let new_job = h.session(USER).await.unwrap().context.vehicle.extraction_job_id;
    assert_ne!(new_job, Some(job_id));
}

#[tokio::test]
async fn test_retake_returns_to_upload() {
    let h = Harness::new();
    upload_document(&h).await;
    let extractor = ScriptedExtractor::new(vec![Ok(sample_vehicle())]);
    let outcome = run_extraction(&h, &extractor).await;
    h.dispatcher.deliver_extraction_outcome(outcome).await.unwrap();

    let report = h.button(USER, "retake").await;
    assert_eq!(
        report.outcome,
        DispatchOutcome::Transitioned {
            from: State::VehicleConfirm,
            to: State::VehicleUploadDocument
        }
    );
}

#[tokio::test]
async fn test_stale_outcome_is_ignored() {
    let h = Harness::new();
    upload_document(&h).await;
    let before = h.session(USER).await.unwrap();

    let report = h
        .dispatcher
        .deliver_extraction_outcome(ExtractionOutcome {
            job_id: Uuid::now_v7(),
            identity: USER.to_string(),
            result: ExtractionResult::Completed {
                vehicle: sample_vehicle(),
            },
        })
        .await
        .unwrap();
    assert_eq!(report.outcome, DispatchOutcome::Ignored);
    assert_eq!(h.session(USER).await.unwrap(), before);
}

#[tokio::test]
async fn test_outcome_after_leaving_flow_is_ignored() {
    let h = Harness::new();
    let job_id = upload_document(&h).await;
    h.text(USER, "menu").await;

    let report = h
        .dispatcher
        .deliver_extraction_outcome(ExtractionOutcome {
            job_id,
            identity: USER.to_string(),
            result: ExtractionResult::Completed {
                vehicle: sample_vehicle(),
            },
        })
        .await
        .unwrap();
    assert_eq!(report.outcome, DispatchOutcome::Ignored);
    assert_eq!(h.stored_state(USER).await, Some(State::Home));
}

#[tokio::test]
async fn test_missed_outcome_is_applied_on_next_message() {
    let h = Harness::new();
    let job_id = upload_document(&h).await;

    // Settle the job without delivering its outcome.
    h.jobs.claim_next().await.unwrap().unwrap();
    h.jobs.complete(job_id, sample_vehicle()).await.unwrap();

    let report = h.text(USER, "any news?").await;
    assert_eq!(
        report.outcome,
        DispatchOutcome::Transitioned {
            from: State::VehicleProcessing,
            to: State::VehicleConfirm
        }
    );
    assert!(h.sender.last_for(USER).await.unwrap().body().contains("RAD123A"));
}

#[tokio::test]
async fn test_forgotten_job_asks_for_new_upload() {
    let h = Harness::new();
    let job_id = upload_document(&h).await;
    h.jobs.claim_next().await.unwrap().unwrap();
    h.jobs.complete(job_id, sample_vehicle()).await.unwrap();
    h.jobs
        .prune_settled(chrono::TimeDelta::seconds(-1))
        .await
        .unwrap();

    let report = h.text(USER, "any news?").await;
    assert_eq!(report.state, Some(State::VehicleUploadDocument));
    assert!(h.sender.last_for(USER).await.unwrap().body().contains("upload it again"));
}
