//! On-demand ride matching.
//!
//! vehicle type -> pickup location -> pick one of the nearby drivers ->
//! confirm -> ride request created.

use super::{FlowContext, FlowHandler, FlowOutcome, created_once, parse_choice, vehicle_type_list};
use crate::error::Result;
use crate::models::events::{InboundEvent, InboundPayload};
use crate::models::messages::{ButtonOption, ListRow, ListSection};
use crate::models::trips::{DriverCandidate, GeoPoint, RideRequest, RideStatus, VehicleType};
use crate::services::conversation::context::{ContextPatch, FieldValue};
use crate::services::conversation::state_machine::{FlowType, State};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

/// Extension key holding the driver ids last shown to the user.
pub const OFFERED_DRIVER_IDS: &str = "offered_driver_ids";

const ASK_VEHICLE: &str = "Which type of vehicle do you need?";
const ASK_LOCATION: &str = "Please share your pickup location using the attachment button.";

pub struct NearbyDriversFlow;

impl NearbyDriversFlow {
    async fn ask_vehicle(&self, ctx: &FlowContext<'_>) -> Result<()> {
        ctx.list(ASK_VEHICLE, "Choose vehicle", vehicle_type_list())
            .await
    }

    async fn search(
        &self,
        ctx: &FlowContext<'_>,
        location: GeoPoint,
        vehicle_type: VehicleType,
    ) -> Result<Vec<DriverCandidate>> {
        let mut drivers = ctx
            .services
            .drivers
            .find_nearby(location, ctx.settings.nearby_radius_km, Some(vehicle_type))
            .await?;
        drivers.truncate(ctx.settings.max_driver_results);
        Ok(drivers)
    }

    async fn show_drivers(&self, ctx: &FlowContext<'_>, drivers: &[DriverCandidate]) -> Result<()> {
        let rows = drivers
            .iter()
            .map(|d| {
                ListRow::new(d.id.clone(), d.name.clone()).with_description(format!(
                    "{:.1} km away, rated {:.1}",
                    d.distance_km, d.rating
                ))
            })
            .collect();
        let sections = vec![ListSection {
            title: "Nearby drivers".to_string(),
            rows,
        }];
        ctx.list(
            &format!("Found {} driver(s) near you. Pick one:", drivers.len()),
            "View drivers",
            sections,
        )
        .await?;
        ctx.buttons(
            "Not the right place?",
            vec![ButtonOption::new("new_location", "New location")],
        )
        .await
    }

    async fn no_drivers(&self, ctx: &FlowContext<'_>, vehicle_type: VehicleType) -> Result<FlowOutcome> {
        ctx.reprompt(&format!(
            "No {} drivers within {} km right now. Send another location or type menu.",
            vehicle_type.label(),
            ctx.settings.nearby_radius_km
        ))
        .await
    }

    fn offered_patch(location: GeoPoint, drivers: &[DriverCandidate]) -> ContextPatch {
        let ids: Vec<&str> = drivers.iter().map(|d| d.id.as_str()).collect();
        ContextPatch::new()
            .set(FieldValue::Location(location))
            .extra(OFFERED_DRIVER_IDS, json!(ids))
    }

    /// Searches around `location` and moves to the driver list. Stays put
    /// with a prompt when nobody is nearby.
    async fn offer_drivers(&self, ctx: &mut FlowContext<'_>, location: GeoPoint) -> Result<FlowOutcome> {
        let location_only = ContextPatch::from(FieldValue::Location(location));
        if let Some(outcome) = ctx.guard(State::NearbyShowDrivers, &location_only) {
            return Ok(outcome);
        }

        let Some(vehicle_type) = ctx.machine.context().trip.vehicle_type else {
            return Ok(ctx.reset("vehicle type missing"));
        };
        let drivers = self.search(ctx, location, vehicle_type).await?;
        if drivers.is_empty() {
            return self.no_drivers(ctx, vehicle_type).await;
        }

        let patch = Self::offered_patch(location, &drivers);
        self.show_drivers(ctx, &drivers).await?;
        Ok(ctx.commit(State::NearbyShowDrivers, patch))
    }

    async fn on_select_vehicle(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let Some(vehicle_type) = parse_choice::<VehicleType>(event) else {
            if event.text_body().is_some() || event.selection().is_some() {
                self.ask_vehicle(ctx).await?;
                return Ok(FlowOutcome::Unchanged);
            }
            return Ok(ctx.ignore(event));
        };

        let patch = ContextPatch::from(FieldValue::VehicleType(vehicle_type));
        if let Some(outcome) = ctx.guard(State::NearbyWaitLocation, &patch) {
            return Ok(outcome);
        }
        ctx.say(ASK_LOCATION).await?;
        Ok(ctx.commit(State::NearbyWaitLocation, patch))
    }

    async fn on_wait_location(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        if event.choice().as_deref() == Some("back") {
            let patch = ContextPatch::new();
            if let Some(outcome) = ctx.guard(State::NearbySelectVehicle, &patch) {
                return Ok(outcome);
            }
            self.ask_vehicle(ctx).await?;
            return Ok(ctx.commit(State::NearbySelectVehicle, patch));
        }

        match event.location_point() {
            Some(location) if location.is_valid() => self.offer_drivers(ctx, location).await,
            Some(_) => ctx.reprompt("That location looks invalid. Please share it again.").await,
            None if event.text_body().is_some() => ctx.reprompt(ASK_LOCATION).await,
            None => Ok(ctx.ignore(event)),
        }
    }

    async fn on_show_drivers(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        if event.choice().as_deref() == Some("new_location") {
            let patch = ContextPatch::new();
            if let Some(outcome) = ctx.guard(State::NearbyWaitLocation, &patch) {
                return Ok(outcome);
            }
            ctx.say(ASK_LOCATION).await?;
            return Ok(ctx.commit(State::NearbyWaitLocation, patch));
        }

        let offered = ctx.machine.context().extra_strings(OFFERED_DRIVER_IDS);
        let Some(driver_id) = event.selection().filter(|id| offered.iter().any(|o| o == id)) else {
            if event.text_body().is_some() || event.selection().is_some() {
                return ctx
                    .reprompt("Please pick a driver from the list, or tap New location.")
                    .await;
            }
            return Ok(ctx.ignore(event));
        };

        let driver_name = match &event.payload {
            InboundPayload::List {
                title: Some(title), ..
            } => title.clone(),
            _ => "the selected driver".to_string(),
        };

        let patch = ContextPatch::from(FieldValue::SelectedDriverId(driver_id.to_string()));
        if let Some(outcome) = ctx.guard(State::NearbyConfirmDriver, &patch) {
            return Ok(outcome);
        }
        ctx.buttons(
            &format!("Request a ride from {}?", driver_name),
            vec![
                ButtonOption::new("confirm_ride", "Confirm"),
                ButtonOption::new("back", "Back to list"),
            ],
        )
        .await?;
        Ok(ctx.commit(State::NearbyConfirmDriver, patch))
    }

    async fn on_confirm_driver(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        match event.choice().as_deref() {
            Some("confirm_ride") => self.request_ride(ctx).await,
            Some("back") => {
                let Some(location) = ctx.machine.context().trip.location else {
                    return Ok(ctx.reset("pickup location missing"));
                };
                self.offer_drivers(ctx, location).await
            }
            Some(_) => {
                ctx.buttons(
                    "Please confirm the ride or go back to the list.",
                    vec![
                        ButtonOption::new("confirm_ride", "Confirm"),
                        ButtonOption::new("back", "Back to list"),
                    ],
                )
                .await?;
                Ok(FlowOutcome::Unchanged)
            }
            None => Ok(ctx.ignore(event)),
        }
    }

    async fn request_ride(&self, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let ride_id = ctx.record_id("ride");
        let patch = ContextPatch::from(FieldValue::RideId(ride_id));
        if let Some(outcome) = ctx.guard(State::NearbyRideRequested, &patch) {
            return Ok(outcome);
        }

        let trip = ctx.machine.context().trip.clone();
        let (Some(driver_id), Some(vehicle_type), Some(pickup)) =
            (trip.selected_driver_id, trip.vehicle_type, trip.location)
        else {
            return Ok(ctx.reset("ride details missing"));
        };

        let ride = RideRequest {
            id: ride_id,
            passenger: ctx.identity.to_string(),
            driver_id,
            vehicle_type,
            pickup,
            status: RideStatus::Requested,
            created_at: Utc::now(),
        };
        created_once(ctx.services.records.create_ride(ride).await)?;
        tracing::info!(identity = %ctx.identity, ride_id = %ride_id, "[NearbyDrivers] Ride requested");

        ctx.say("Your ride request has been sent. The driver will contact you shortly. Type menu for more services.")
            .await?;
        Ok(ctx.commit(State::NearbyRideRequested, patch))
    }
}

#[async_trait]
impl FlowHandler for NearbyDriversFlow {
    fn flow(&self) -> FlowType {
        FlowType::NearbyDrivers
    }

    async fn enter(&self, ctx: &mut FlowContext<'_>) -> Result<()> {
        match ctx.state() {
            State::NearbyWaitLocation => ctx.say(ASK_LOCATION).await,
            _ => self.ask_vehicle(ctx).await,
        }
    }

    async fn handle(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        match ctx.state() {
            State::NearbySelectVehicle => self.on_select_vehicle(event, ctx).await,
            State::NearbyWaitLocation => self.on_wait_location(event, ctx).await,
            State::NearbyShowDrivers => self.on_show_drivers(event, ctx).await,
            State::NearbyConfirmDriver => self.on_confirm_driver(event, ctx).await,
            _ => Ok(ctx.ignore(event)),
        }
    }
}
