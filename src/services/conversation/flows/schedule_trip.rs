//! Trip scheduling: vehicle, pickup, dropoff, time, confirm.

use super::{FlowContext, FlowHandler, FlowOutcome, created_once, parse_choice, vehicle_type_list};
use crate::error::Result;
use crate::models::events::InboundEvent;
use crate::models::messages::ButtonOption;
use crate::models::trips::{GeoPoint, TripBooking, VehicleType};
use crate::services::conversation::context::{ContextPatch, FieldValue};
use crate::services::conversation::state_machine::{FlowType, State};
use crate::validation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

const ASK_VEHICLE: &str = "Schedule a trip. Which type of vehicle?";
const ASK_PICKUP: &str = "Share the pickup location using the attachment button.";
const ASK_DROPOFF: &str = "Now share the drop-off location.";
const ASK_TIME: &str =
    "When should we pick you up? For example: tomorrow 08:30, today 17:00 or 2026-03-01 14:00.";

pub struct ScheduleTripFlow;

impl ScheduleTripFlow {
    fn format_local(ctx: &FlowContext<'_>, time: DateTime<Utc>) -> String {
        time.with_timezone(&ctx.settings.local_offset)
            .format("%d/%m/%Y %H:%M")
            .to_string()
    }

    async fn ask_confirm(&self, ctx: &FlowContext<'_>, time: DateTime<Utc>) -> Result<()> {
        let vehicle = ctx
            .machine
            .context()
            .trip
            .vehicle_type
            .map(VehicleType::label)
            .unwrap_or("Any");
        ctx.buttons(
            &format!(
                "Trip summary\nVehicle: {}\nPickup time: {}\nConfirm this booking?",
                vehicle,
                Self::format_local(ctx, time)
            ),
            vec![
                ButtonOption::new("confirm_trip", "Confirm"),
                ButtonOption::new("change_time", "Change time"),
            ],
        )
        .await
    }

    /// Moves to `target` after prompting, the common shape of this flow.
    async fn step(
        &self,
        ctx: &mut FlowContext<'_>,
        target: State,
        patch: ContextPatch,
        prompt: &str,
    ) -> Result<FlowOutcome> {
        if let Some(outcome) = ctx.guard(target, &patch) {
            return Ok(outcome);
        }
        ctx.say(prompt).await?;
        Ok(ctx.commit(target, patch))
    }

    async fn on_location(
        &self,
        event: &InboundEvent,
        ctx: &mut FlowContext<'_>,
        to_patch: fn(GeoPoint) -> FieldValue,
        target: State,
        prompt: &str,
        reprompt: &str,
    ) -> Result<FlowOutcome> {
        match event.location_point() {
            Some(location) if location.is_valid() => {
                self.step(ctx, target, to_patch(location).into(), prompt).await
            }
            Some(_) => ctx.reprompt("That location looks invalid. Please share it again.").await,
            None if event.text_body().is_some() => ctx.reprompt(reprompt).await,
            None => Ok(ctx.ignore(event)),
        }
    }

    async fn on_time(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let Some(text) = event.text_body() else {
            return Ok(ctx.ignore(event));
        };
        let time = match validation::parse_schedule_time(text, ctx.settings.local_now()) {
            Ok(time) => time,
            Err(e) => return ctx.reject_input(e).await,
        };

        let patch = ContextPatch::from(FieldValue::ScheduledTime(time));
        if let Some(outcome) = ctx.guard(State::ScheduleConfirm, &patch) {
            return Ok(outcome);
        }
        self.ask_confirm(ctx, time).await?;
        Ok(ctx.commit(State::ScheduleConfirm, patch))
    }

    async fn on_confirm(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        match event.choice().as_deref() {
            Some("confirm_trip") => self.book(ctx).await,
            Some("change_time") => {
                self.step(ctx, State::ScheduleTime, ContextPatch::new(), ASK_TIME)
                    .await
            }
            Some(_) => {
                let Some(time) = ctx.machine.context().trip.scheduled_time else {
                    return Ok(ctx.reset("scheduled time missing"));
                };
                self.ask_confirm(ctx, time).await?;
                Ok(FlowOutcome::Unchanged)
            }
            None => Ok(ctx.ignore(event)),
        }
    }

    async fn book(&self, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let booking_id = ctx.record_id("booking");
        let patch = ContextPatch::from(FieldValue::BookingId(booking_id));
        if let Some(outcome) = ctx.guard(State::ScheduleBooked, &patch) {
            return Ok(outcome);
        }

        let trip = ctx.machine.context().trip.clone();
        let (Some(vehicle_type), Some(pickup), Some(dropoff), Some(scheduled_at)) = (
            trip.vehicle_type,
            trip.pickup_location,
            trip.dropoff_location,
            trip.scheduled_time,
        ) else {
            return Ok(ctx.reset("trip details missing"));
        };

        let booking = TripBooking {
            id: booking_id,
            passenger: ctx.identity.to_string(),
            vehicle_type,
            pickup,
            dropoff,
            scheduled_at,
            created_at: Utc::now(),
        };
        created_once(ctx.services.records.create_booking(booking).await)?;
        tracing::info!(identity = %ctx.identity, booking_id = %booking_id, "[ScheduleTrip] Trip booked");

        ctx.say(&format!(
            "Your trip is booked for {}. We will notify you when a driver is assigned. Type menu for more services.",
            Self::format_local(ctx, scheduled_at)
        ))
        .await?;
        Ok(ctx.commit(State::ScheduleBooked, patch))
    }
}

#[async_trait]
impl FlowHandler for ScheduleTripFlow {
    fn flow(&self) -> FlowType {
        FlowType::ScheduleTrip
    }

    async fn enter(&self, ctx: &mut FlowContext<'_>) -> Result<()> {
        match ctx.state() {
            State::SchedulePickup => ctx.say(ASK_PICKUP).await,
            State::ScheduleDropoff => ctx.say(ASK_DROPOFF).await,
            State::ScheduleTime => ctx.say(ASK_TIME).await,
            _ => {
                ctx.list(ASK_VEHICLE, "Choose vehicle", vehicle_type_list())
                    .await
            }
        }
    }

    async fn handle(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        match ctx.state() {
            State::ScheduleSelectVehicle => match parse_choice::<VehicleType>(event) {
                Some(vehicle_type) => {
                    self.step(
                        ctx,
                        State::SchedulePickup,
                        FieldValue::VehicleType(vehicle_type).into(),
                        ASK_PICKUP,
                    )
                    .await
                }
                None if event.text_body().is_some() || event.selection().is_some() => {
                    self.enter(ctx).await?;
                    Ok(FlowOutcome::Unchanged)
                }
                None => Ok(ctx.ignore(event)),
            },
            State::SchedulePickup => {
                self.on_location(
                    event,
                    ctx,
                    FieldValue::PickupLocation,
                    State::ScheduleDropoff,
                    ASK_DROPOFF,
                    ASK_PICKUP,
                )
                .await
            }
            State::ScheduleDropoff => {
                self.on_location(
                    event,
                    ctx,
                    FieldValue::DropoffLocation,
                    State::ScheduleTime,
                    ASK_TIME,
                    ASK_DROPOFF,
                )
                .await
            }
            State::ScheduleTime => self.on_time(event, ctx).await,
            State::ScheduleConfirm => self.on_confirm(event, ctx).await,
            _ => Ok(ctx.ignore(event)),
        }
    }
}
