//! Main menu and mobility sub-menu.

use super::{FlowContext, FlowHandler, FlowOutcome};
use crate::error::Result;
use crate::models::events::InboundEvent;
use crate::models::messages::{ButtonOption, ListRow, ListSection};
use crate::services::conversation::context::ContextPatch;
use crate::services::conversation::state_machine::{FlowType, HOME, State};
use async_trait::async_trait;

const MAIN_MENU: &str = "Welcome! What would you like to do today?";
const MOBILITY_MENU: &str = "Mobility services. Choose an option:";

pub struct HubFlow;

impl HubFlow {
    async fn show_main_menu(&self, ctx: &FlowContext<'_>) -> Result<()> {
        let sections = vec![ListSection {
            title: "Services".to_string(),
            rows: vec![
                ListRow::new("mobility", "Mobility")
                    .with_description("Find drivers, schedule trips, add vehicles"),
                ListRow::new("qr_code", "Payment QR code")
                    .with_description("MoMo QR for a number or pay code"),
                ListRow::new("insurance", "Motor insurance")
                    .with_description("Get a quote for your vehicle"),
            ],
        }];
        ctx.list(MAIN_MENU, "Open menu", sections).await
    }

    async fn show_mobility_menu(&self, ctx: &FlowContext<'_>) -> Result<()> {
        ctx.buttons(
            MOBILITY_MENU,
            vec![
                ButtonOption::new("nearby_drivers", "Nearby drivers"),
                ButtonOption::new("schedule_trip", "Schedule trip"),
                ButtonOption::new("add_vehicle", "Add vehicle"),
            ],
        )
        .await
    }
}

/// Flow entry state for a menu option id.
fn menu_target(id: &str) -> Option<State> {
    match id {
        "mobility" => Some(State::Mobility),
        "nearby_drivers" => Some(FlowType::NearbyDrivers.entry_state()),
        "schedule_trip" => Some(FlowType::ScheduleTrip.entry_state()),
        "add_vehicle" => Some(FlowType::AddVehicle.entry_state()),
        "qr_code" => Some(FlowType::QrGeneration.entry_state()),
        "insurance" => Some(FlowType::Insurance.entry_state()),
        _ => None,
    }
}

#[async_trait]
impl FlowHandler for HubFlow {
    fn flow(&self) -> FlowType {
        FlowType::Hub
    }

    async fn enter(&self, ctx: &mut FlowContext<'_>) -> Result<()> {
        match ctx.state() {
            State::Mobility => self.show_mobility_menu(ctx).await,
            _ => self.show_main_menu(ctx).await,
        }
    }

    async fn handle(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome> {
        let current = ctx.state();
        let choice = event.choice();

        if current == State::Mobility && choice.as_deref() == Some("back") {
            let patch = ContextPatch::new();
            if let Some(outcome) = ctx.guard(HOME, &patch) {
                return Ok(outcome);
            }
            self.show_main_menu(ctx).await?;
            return Ok(ctx.commit(HOME, patch));
        }

        let target = choice
            .as_deref()
            .and_then(menu_target)
            .filter(|target| ctx.machine.transition_table().is_valid_transition(current, *target));

        match target {
            Some(State::Mobility) => {
                let patch = ContextPatch::new();
                if let Some(outcome) = ctx.guard(State::Mobility, &patch) {
                    return Ok(outcome);
                }
                self.show_mobility_menu(ctx).await?;
                Ok(ctx.commit(State::Mobility, patch))
            }
            // The new flow's own entry prompt is sent by the dispatcher
            Some(target) => Ok(ctx.commit(target, ContextPatch::new())),
            None if event.text_body().is_some() || event.selection().is_some() => {
                self.enter(ctx).await?;
                Ok(FlowOutcome::Unchanged)
            }
            None => Ok(ctx.ignore(event)),
        }
    }
}
