//! Vehicle registration from an uploaded document.
//!
//! The upload is handed to the extraction job queue and the session parks
//! in `VEHICLE_PROCESSING`. The job outcome arrives later through
//! [`AddVehicleFlow::on_extraction_outcome`], never by polling from the chat
//! path.

use super::{FlowContext, FlowHandler, FlowOutcome, created_once, parse_choice};
use crate::error::Result;
use crate::models::events::InboundEvent;
use crate::models::jobs::{ExtractionJob, ExtractionOutcome, ExtractionResult};
use crate::models::messages::ButtonOption;
use crate::models::vehicles::{ExtractedVehicle, UsageType, VehicleRecord};
use crate::services::conversation::context::{ContextPatch, FieldValue};
use crate::services::conversation::state_machine::{FlowType, State};
use async_trait::async_trait;
use chrono::Utc;
use strum::IntoEnumIterator;

const ASK_USAGE: &str = "Add a vehicle. How is the vehicle used?";
const ASK_DOCUMENT: &str =
    "Please upload a clear photo of the vehicle's registration card or insurance certificate.";
const STILL_PROCESSING: &str =
    "We are still reading your document. You will get a message as soon as it is done.";
const JOB_LOST: &str = "We could not finish reading your document. Please upload it again.";

pub struct AddVehicleFlow;

impl AddVehicleFlow {
    async fn ask_usage(&self, ctx: &FlowContext<'_>) -> Result<()> {
        let options = UsageType::iter()
            .map(|u| ButtonOption::new(u.to_string(), u.label()))
            .collect();
        ctx.buttons(ASK_USAGE, options).await
    }

    async fn ask_confirm(&self, ctx: &FlowContext<'_>, vehicle: &ExtractedVehicle) -> Result<()> {
        ctx.buttons(
            &format!("We read the following details:\n{}\nIs this correct?", vehicle.summary()),
            vec![
                ButtonOption::new("confirm_vehicle", "Save vehicle"),
                ButtonOption::new("retake", "Upload again"),
            ],
        )
        .await
    }

    async fn ask_document(&self, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let patch = ContextPatch::new();
        if let Some(outcome) = ctx.guard(State::VehicleUploadDocument, &patch) {
            return Ok(outcome);
        }
        ctx.say(ASK_DOCUMENT).await?;
        Ok(ctx.commit(State::VehicleUploadDocument, patch))
    }

    async fn on_select_usage(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let Some(usage_type) = parse_choice::<UsageType>(event) else {
            if event.text_body().is_some() || event.selection().is_some() {
                self.ask_usage(ctx).await?;
                return Ok(FlowOutcome::Unchanged);
            }
            return Ok(ctx.ignore(event));
        };

        let patch = ContextPatch::from(FieldValue::UsageType(usage_type));
        if let Some(outcome) = ctx.guard(State::VehicleUploadDocument, &patch) {
            return Ok(outcome);
        }
        ctx.say(ASK_DOCUMENT).await?;
        Ok(ctx.commit(State::VehicleUploadDocument, patch))
    }

    async fn on_upload(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let Some(media) = event.media() else {
            if event.text_body().is_some() || event.selection().is_some() {
                return ctx.reprompt(ASK_DOCUMENT).await;
            }
            return Ok(ctx.ignore(event));
        };
        let Some(usage_type) = ctx.machine.context().vehicle.usage_type else {
            return Ok(ctx.reset("usage type missing"));
        };

        let job = ExtractionJob::new(
            ctx.identity.to_string(),
            media.id.clone(),
            usage_type,
            ctx.settings.extraction_max_attempts,
        );
        let patch = ContextPatch::new()
            .set(FieldValue::DocumentUploaded(true))
            .set(FieldValue::ExtractionJobId(job.id));
        if let Some(outcome) = ctx.guard(State::VehicleProcessing, &patch) {
            return Ok(outcome);
        }

        let job_id = ctx.services.jobs.submit(job).await?;
        tracing::info!(identity = %ctx.identity, job_id = %job_id, "[AddVehicle] Document queued for extraction");

        ctx.say("Thanks! We are reading your document, this usually takes a moment.")
            .await?;
        Ok(ctx.commit(State::VehicleProcessing, patch))
    }

    /// Answers a message sent while the document is being read. A job that
    /// settled without its outcome reaching the session is applied here.
    async fn on_processing(&self, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let Some(job_id) = ctx.machine.context().vehicle.extraction_job_id else {
            return Ok(ctx.reset("extraction job missing"));
        };

        match ctx.services.jobs.get(job_id).await? {
            Some(job) => match job.settled_outcome() {
                Some(outcome) => {
                    tracing::info!(identity = %ctx.identity, job_id = %job_id, "[AddVehicle] Applying settled job from the queue");
                    self.on_extraction_outcome(&outcome, ctx).await
                }
                None => ctx.reprompt(STILL_PROCESSING).await,
            },
            None => {
                tracing::warn!(identity = %ctx.identity, job_id = %job_id, "[AddVehicle] Extraction job no longer held");
                let patch = ContextPatch::new();
                if let Some(outcome) = ctx.guard(State::VehicleUploadDocument, &patch) {
                    return Ok(outcome);
                }
                ctx.say(JOB_LOST).await?;
                Ok(ctx.commit(State::VehicleUploadDocument, patch))
            }
        }
    }

    async fn on_confirm(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        match event.choice().as_deref() {
            Some("confirm_vehicle") => self.save(ctx).await,
            Some("retake") => self.ask_document(ctx).await,
            Some(_) => {
                let Some(vehicle) = ctx.machine.context().vehicle.extraction_result.clone() else {
                    return Ok(ctx.reset("extraction result missing"));
                };
                self.ask_confirm(ctx, &vehicle).await?;
                Ok(FlowOutcome::Unchanged)
            }
            None => Ok(ctx.ignore(event)),
        }
    }

    async fn save(&self, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let vehicle_id = ctx.record_id("vehicle");
        let patch = ContextPatch::from(FieldValue::VehicleId(vehicle_id));
        if let Some(outcome) = ctx.guard(State::VehicleSaved, &patch) {
            return Ok(outcome);
        }

        let slots = ctx.machine.context().vehicle.clone();
        let (Some(usage_type), Some(details)) = (slots.usage_type, slots.extraction_result) else {
            return Ok(ctx.reset("vehicle details missing"));
        };
        let plate = details.plate_number.clone();

        created_once(
            ctx.services
                .records
                .create_vehicle(VehicleRecord {
                    id: vehicle_id,
                    owner: ctx.identity.to_string(),
                    usage_type,
                    details,
                    created_at: Utc::now(),
                })
                .await,
        )?;
        tracing::info!(identity = %ctx.identity, vehicle_id = %vehicle_id, "[AddVehicle] Vehicle saved");

        ctx.say(&format!(
            "Vehicle {} has been added to your account. Type menu for more services.",
            plate
        ))
        .await?;
        Ok(ctx.commit(State::VehicleSaved, patch))
    }

    /// Applies a settled extraction job to the session.
    ///
    /// Outcomes for a job other than the one the session waits on, or
    /// arriving after the session moved on, are ignored.
    pub async fn on_extraction_outcome(
        &self,
        outcome: &ExtractionOutcome,
        ctx: &mut FlowContext<'_>,
    ) -> Result<FlowOutcome> {
        let waiting_on = ctx.machine.context().vehicle.extraction_job_id;
        if ctx.state() != State::VehicleProcessing || waiting_on != Some(outcome.job_id) {
            tracing::warn!(
                identity = %ctx.identity,
                state = %ctx.state(),
                job_id = %outcome.job_id,
                "[AddVehicle] Ignoring stale extraction outcome"
            );
            return Ok(FlowOutcome::Ignored);
        }

        match &outcome.result {
            ExtractionResult::Completed { vehicle } => {
                let patch = ContextPatch::from(FieldValue::ExtractionResult(vehicle.clone()));
                if let Some(outcome) = ctx.guard(State::VehicleConfirm, &patch) {
                    return Ok(outcome);
                }
                self.ask_confirm(ctx, vehicle).await?;
                Ok(ctx.commit(State::VehicleConfirm, patch))
            }
            ExtractionResult::Failed { reason } => {
                let patch = ContextPatch::new();
                if let Some(outcome) = ctx.guard(State::VehicleUploadDocument, &patch) {
                    return Ok(outcome);
                }
                ctx.say(&format!(
                    "We could not read your document ({}). Please upload a clearer photo.",
                    reason
                ))
                .await?;
                Ok(ctx.commit(State::VehicleUploadDocument, patch))
            }
        }
    }
}

#[async_trait]
impl FlowHandler for AddVehicleFlow {
    fn flow(&self) -> FlowType {
        FlowType::AddVehicle
    }

    async fn enter(&self, ctx: &mut FlowContext<'_>) -> Result<()> {
        match ctx.state() {
            State::VehicleUploadDocument => ctx.say(ASK_DOCUMENT).await,
            State::VehicleProcessing => ctx.say(STILL_PROCESSING).await,
            _ => self.ask_usage(ctx).await,
        }
    }

    async fn handle(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        match ctx.state() {
            State::VehicleSelectUsage => self.on_select_usage(event, ctx).await,
            State::VehicleUploadDocument => self.on_upload(event, ctx).await,
            State::VehicleProcessing => self.on_processing(ctx).await,
            State::VehicleConfirm => self.on_confirm(event, ctx).await,
            _ => Ok(ctx.ignore(event)),
        }
    }
}
