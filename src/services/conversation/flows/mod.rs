//! Flow handlers for the conversation state machine.
//!
//! One handler per [`FlowType`]. A handler reads an inbound event against
//! the session's current state, validates the input, performs any side
//! effect, and only then commits the transition:
//!
//! 1. build the context patch for the target state
//! 2. [`FlowContext::guard`] dry-runs the transition
//! 3. send messages, create records, submit jobs
//! 4. [`FlowContext::commit`] applies the transition
//!
//! If step 3 fails the handler returns the error before anything was
//! committed, so the stored session keeps its prior state. Records created
//! in step 3 take their id from [`FlowContext::record_id`], so a redelivery
//! of the same message finds the record already there instead of adding a
//! second one.

use crate::config::FlowConfig;
use crate::error::{Error, Result};
use crate::models::events::InboundEvent;
use crate::models::insurance::InsuranceRates;
use crate::models::messages::{ButtonOption, ListRow, ListSection};
use crate::models::trips::VehicleType;
use crate::providers::{DriverLocator, MessageSender, QrRenderer, RecordStore};
use crate::services::conversation::context::ContextPatch;
use crate::services::conversation::state_machine::{
    FlowType, State, StateMachine, TransitionError,
};
use crate::services::extraction::JobQueue;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::Serialize;
use std::sync::Arc;
use strum::IntoEnumIterator;
use uuid::Uuid;

pub mod add_vehicle;
pub mod home;
pub mod insurance;
pub mod nearby_drivers;
pub mod qr_generation;
pub mod schedule_trip;

/// Result of handling one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowOutcome {
    /// A transition was committed
    Transitioned { from: State, to: State },
    /// The session was forced back to a safe state
    Recovered { to: State },
    /// Input was handled (usually with a corrective prompt) but the state
    /// did not move
    Unchanged,
    /// The event means nothing in the current state
    Ignored,
}

impl FlowOutcome {
    /// True when the session changed and must be saved.
    pub fn progressed(&self) -> bool {
        matches!(self, Self::Transitioned { .. } | Self::Recovered { .. })
    }
}

/// External services available to handlers.
#[derive(Clone)]
pub struct Collaborators {
    pub messages: Arc<dyn MessageSender>,
    pub drivers: Arc<dyn DriverLocator>,
    pub jobs: Arc<dyn JobQueue>,
    pub qr: Arc<dyn QrRenderer>,
    pub records: Arc<dyn RecordStore>,
}

/// Flow tunables resolved from configuration.
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub nearby_radius_km: f64,
    pub max_driver_results: usize,
    pub extraction_max_attempts: u32,
    pub rates: InsuranceRates,
    pub local_offset: FixedOffset,
}

impl FlowSettings {
    pub fn from_config(config: &FlowConfig) -> Self {
        let local_offset = FixedOffset::east_opt(config.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix());
        Self {
            nearby_radius_km: config.nearby_radius_km,
            max_driver_results: config.max_driver_results,
            extraction_max_attempts: config.extraction_max_attempts,
            rates: InsuranceRates {
                base_monthly_premium: config.base_monthly_premium,
                comesa_monthly_surcharge: config.comesa_monthly_surcharge,
            },
            local_offset,
        }
    }

    /// Current wall-clock time in the users' timezone.
    pub fn local_now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.local_offset)
    }

    pub fn local_today(&self) -> NaiveDate {
        self.local_now().date_naive()
    }
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self::from_config(&FlowConfig::default())
    }
}

/// Everything a handler needs while processing one event.
pub struct FlowContext<'a> {
    pub identity: &'a str,
    /// Platform id of the message being handled, when it carried one
    pub message_id: Option<&'a str>,
    pub machine: &'a mut StateMachine,
    pub services: &'a Collaborators,
    pub settings: &'a FlowSettings,
}

impl<'a> FlowContext<'a> {
    pub fn new(
        identity: &'a str,
        machine: &'a mut StateMachine,
        services: &'a Collaborators,
        settings: &'a FlowSettings,
    ) -> Self {
        Self {
            identity,
            message_id: None,
            machine,
            services,
            settings,
        }
    }

    pub fn with_message_id(mut self, message_id: Option<&'a str>) -> Self {
        self.message_id = message_id;
        self
    }

    /// Id for a `kind` record created while handling the current message.
    /// Stable across redeliveries of one message id; random without one.
    pub fn record_id(&self, kind: &str) -> Uuid {
        match self.message_id {
            Some(message_id) => {
                let name = format!("{}:{}:{}", self.identity, kind, message_id);
                Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
            }
            None => Uuid::now_v7(),
        }
    }

    pub fn state(&self) -> State {
        self.machine.current_state()
    }

    pub async fn say(&self, body: &str) -> Result<()> {
        self.services.messages.send_text(self.identity, body).await
    }

    pub async fn buttons(&self, body: &str, options: Vec<ButtonOption>) -> Result<()> {
        self.services
            .messages
            .send_buttons(self.identity, body, options)
            .await
    }

    pub async fn list(&self, body: &str, button_label: &str, sections: Vec<ListSection>) -> Result<()> {
        self.services
            .messages
            .send_list(self.identity, body, button_label, sections)
            .await
    }

    /// Sends a corrective prompt and stays put.
    pub async fn reprompt(&self, body: &str) -> Result<FlowOutcome> {
        self.say(body).await?;
        Ok(FlowOutcome::Unchanged)
    }

    /// Turns a validation failure into a re-prompt carrying its message.
    /// Other errors propagate.
    pub async fn reject_input(&self, error: Error) -> Result<FlowOutcome> {
        match error {
            Error::Validation(message) => self.reprompt(&message).await,
            other => Err(other),
        }
    }

    /// Dry-runs a transition before side effects. Returns the recovery
    /// outcome when the transition could not be committed.
    pub fn guard(&mut self, target: State, patch: &ContextPatch) -> Option<FlowOutcome> {
        match self.machine.check_transition(target, patch) {
            Ok(()) => None,
            Err(error) => Some(self.recover(error)),
        }
    }

    /// Commits a transition. A refused transition forces the session back
    /// to its last safe state.
    pub fn commit(&mut self, target: State, patch: ContextPatch) -> FlowOutcome {
        match self.machine.transition_to(target, patch) {
            Ok(transition) => FlowOutcome::Transitioned {
                from: transition.from,
                to: transition.to,
            },
            Err(error) => self.recover(error),
        }
    }

    fn recover(&mut self, error: TransitionError) -> FlowOutcome {
        self.reset(&error.to_string())
    }

    /// Forces the session back to its last safe state.
    pub fn reset(&mut self, reason: &str) -> FlowOutcome {
        tracing::warn!(
            identity = %self.identity,
            state = %self.state(),
            reason = %reason,
            "[Flow] Recovering to safe state"
        );
        let to = self.machine.reset_to_safe_state();
        FlowOutcome::Recovered { to }
    }

    /// Logs an event the current state has no use for.
    pub fn ignore(&self, event: &InboundEvent) -> FlowOutcome {
        tracing::debug!(
            identity = %self.identity,
            state = %self.state(),
            kind = event.kind(),
            "[Flow] Ignoring event"
        );
        FlowOutcome::Ignored
    }
}

/// Behaviour of one flow family.
#[async_trait]
pub trait FlowHandler: Send + Sync {
    fn flow(&self) -> FlowType;

    /// Prompts for the session's current state. Called when the flow is
    /// entered from another family and after recovery.
    async fn enter(&self, ctx: &mut FlowContext<'_>) -> Result<()>;

    async fn handle(&self, event: &InboundEvent, ctx: &mut FlowContext<'_>) -> Result<FlowOutcome>;
}

/// Registry of flow handlers, one per family.
pub struct FlowHandlerRegistry {
    hub: home::HubFlow,
    nearby: nearby_drivers::NearbyDriversFlow,
    schedule: schedule_trip::ScheduleTripFlow,
    vehicle: add_vehicle::AddVehicleFlow,
    qr: qr_generation::QrGenerationFlow,
    insurance: insurance::InsuranceFlow,
}

impl FlowHandlerRegistry {
    pub fn new() -> Self {
        Self {
            hub: home::HubFlow,
            nearby: nearby_drivers::NearbyDriversFlow,
            schedule: schedule_trip::ScheduleTripFlow,
            vehicle: add_vehicle::AddVehicleFlow,
            qr: qr_generation::QrGenerationFlow,
            insurance: insurance::InsuranceFlow,
        }
    }

    pub fn get_handler(&self, flow: FlowType) -> &dyn FlowHandler {
        match flow {
            FlowType::Hub => &self.hub,
            FlowType::NearbyDrivers => &self.nearby,
            FlowType::ScheduleTrip => &self.schedule,
            FlowType::AddVehicle => &self.vehicle,
            FlowType::QrGeneration => &self.qr,
            FlowType::Insurance => &self.insurance,
        }
    }

    /// The add-vehicle handler, which also consumes extraction outcomes.
    pub fn add_vehicle(&self) -> &add_vehicle::AddVehicleFlow {
        &self.vehicle
    }
}

impl Default for FlowHandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Vehicle type picker shared by the trip flows.
pub(crate) fn vehicle_type_list() -> Vec<ListSection> {
    vec![ListSection {
        title: "Vehicle type".to_string(),
        rows: VehicleType::iter()
            .map(|v| ListRow::new(v.to_string(), v.label()))
            .collect(),
    }]
}

/// Accepts a create that found its record already stored by an earlier
/// delivery of the same message.
pub(crate) fn created_once(result: Result<()>) -> Result<()> {
    match result {
        Err(Error::Conflict(message)) => {
            tracing::info!(reason = %message, "[Flow] Record already created by an earlier delivery");
            Ok(())
        }
        other => other,
    }
}

/// Parses an enum choice from a button id or typed text.
pub(crate) fn parse_choice<T: std::str::FromStr>(event: &InboundEvent) -> Option<T> {
    event.choice().and_then(|choice| choice.parse().ok())
}
