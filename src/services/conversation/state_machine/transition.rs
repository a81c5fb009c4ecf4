//! Transition table and transition errors for the conversation state machine.
//!
//! The table maps every state in the catalog to the ordered set of states
//! it may move to. States with no outgoing edges still get an entry.

use super::state::{HOME, State};
use crate::services::conversation::context::ContextField;
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

/// Errors returned when a requested transition is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// Target not reachable from the current state.
    #[error("Invalid transition from {from} to {attempted}")]
    InvalidTransition { from: State, attempted: State },

    /// Target reachable, but required context is absent after merging.
    #[error("Cannot enter {target}: missing context fields {missing:?}")]
    MissingContext {
        target: State,
        missing: Vec<ContextField>,
    },
}

/// Allowed next states for every state in the catalog.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    transitions: IndexMap<State, IndexSet<State>>,
}

impl TransitionTable {
    /// Creates the table with the default conversation topology.
    pub fn new() -> Self {
        let mut table = Self {
            transitions: State::all().map(|s| (s, IndexSet::new())).collect(),
        };
        table.initialize_default_transitions();
        table
    }

    fn initialize_default_transitions(&mut self) {
        use State::*;

        // Hub
        self.insert(
            Home,
            &[
                Mobility,
                NearbySelectVehicle,
                ScheduleSelectVehicle,
                VehicleSelectUsage,
                QrMenu,
                InsuranceMenu,
            ],
        );
        self.insert(
            Mobility,
            &[NearbySelectVehicle, ScheduleSelectVehicle, VehicleSelectUsage, HOME],
        );

        // Nearby drivers
        self.insert(NearbySelectVehicle, &[NearbyWaitLocation, HOME]);
        self.insert(NearbyWaitLocation, &[NearbyShowDrivers, NearbySelectVehicle, HOME]);
        self.insert(NearbyShowDrivers, &[NearbyConfirmDriver, NearbyWaitLocation, HOME]);
        self.insert(NearbyConfirmDriver, &[NearbyRideRequested, NearbyShowDrivers, HOME]);
        self.insert(NearbyRideRequested, &[HOME]);

        // Schedule trip
        self.insert(ScheduleSelectVehicle, &[SchedulePickup, HOME]);
        self.insert(SchedulePickup, &[ScheduleDropoff, HOME]);
        self.insert(ScheduleDropoff, &[ScheduleTime, HOME]);
        self.insert(ScheduleTime, &[ScheduleConfirm, HOME]);
        self.insert(ScheduleConfirm, &[ScheduleBooked, ScheduleTime, HOME]);
        self.insert(ScheduleBooked, &[HOME]);

        // Add vehicle
        self.insert(VehicleSelectUsage, &[VehicleUploadDocument, HOME]);
        self.insert(VehicleUploadDocument, &[VehicleProcessing, HOME]);
        self.insert(VehicleProcessing, &[VehicleConfirm, VehicleUploadDocument, HOME]);
        self.insert(VehicleConfirm, &[VehicleSaved, VehicleUploadDocument, HOME]);
        self.insert(VehicleSaved, &[HOME]);

        // QR generation: "no amount" skips the amount entry state
        self.insert(QrMenu, &[QrIdentifierInput, HOME]);
        self.insert(QrIdentifierInput, &[QrAmountMode, HOME]);
        self.insert(QrAmountMode, &[QrAmountInput, QrGenerated, HOME]);
        self.insert(QrAmountInput, &[QrGenerated, HOME]);
        self.insert(QrGenerated, &[HOME]);

        // Insurance: PA category only when that add-on was chosen,
        // end-date edits loop back to the confirmation state
        self.insert(InsuranceMenu, &[InsurancePlate, HOME]);
        self.insert(InsurancePlate, &[InsuranceStartDate, HOME]);
        self.insert(InsuranceStartDate, &[InsurancePeriod, HOME]);
        self.insert(InsurancePeriod, &[InsuranceConfirmDates, HOME]);
        self.insert(
            InsuranceConfirmDates,
            &[InsuranceAddons, InsuranceEditEndDate, HOME],
        );
        self.insert(InsuranceEditEndDate, &[InsuranceConfirmDates, HOME]);
        self.insert(InsuranceAddons, &[InsurancePaCategory, InsuranceSummary, HOME]);
        self.insert(InsurancePaCategory, &[InsuranceSummary, HOME]);
        self.insert(InsuranceSummary, &[InsurancePaymentPlan, InsuranceAddons, HOME]);
        self.insert(InsurancePaymentPlan, &[InsuranceQuoteReady, HOME]);
        self.insert(InsuranceQuoteReady, &[HOME]);
    }

    fn insert(&mut self, from: State, targets: &[State]) {
        self.transitions
            .entry(from)
            .or_default()
            .extend(targets.iter().copied());
    }

    /// True iff `to` is in the allowed set for `from`.
    pub fn is_valid_transition(&self, from: State, to: State) -> bool {
        self.transitions
            .get(&from)
            .is_some_and(|targets| targets.contains(&to))
    }

    /// Allowed targets for `from`, in declaration order.
    pub fn allowed_targets(&self, from: State) -> Vec<State> {
        self.transitions
            .get(&from)
            .map(|targets| targets.iter().copied().collect())
            .unwrap_or_default()
    }

    /// True if `state` has no exits, or its only exit is the hub.
    pub fn is_terminal(&self, state: State) -> bool {
        match self.transitions.get(&state) {
            None => true,
            Some(targets) => targets.iter().all(|t| *t == HOME),
        }
    }

    pub fn contains(&self, state: State) -> bool {
        self.transitions.contains_key(&state)
    }

    pub fn states(&self) -> impl Iterator<Item = State> + '_ {
        self.transitions.keys().copied()
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_state_has_an_entry() {
        let table = TransitionTable::new();
        for state in State::all() {
            assert!(table.contains(state), "{state} missing from table");
        }
    }

    #[test]
    fn test_every_non_home_state_can_return_home() {
        let table = TransitionTable::new();
        for state in State::all().filter(|s| *s != HOME) {
            assert!(
                table.is_valid_transition(state, HOME),
                "{state} cannot return to HOME"
            );
        }
    }

    #[test]
    fn test_each_flow_has_exactly_one_terminal_state() {
        let table = TransitionTable::new();
        let terminals: Vec<State> = State::all()
            .filter(|s| *s != HOME && table.is_terminal(*s))
            .collect();
        assert_eq!(
            terminals,
            vec![
                State::NearbyRideRequested,
                State::ScheduleBooked,
                State::VehicleSaved,
                State::QrGenerated,
                State::InsuranceQuoteReady,
            ]
        );
    }

    #[test]
    fn test_branch_points() {
        let table = TransitionTable::new();
        assert!(table.is_valid_transition(State::QrAmountMode, State::QrGenerated));
        assert!(table.is_valid_transition(State::QrAmountMode, State::QrAmountInput));
        assert!(table.is_valid_transition(State::InsuranceAddons, State::InsurancePaCategory));
        assert!(table.is_valid_transition(State::InsuranceAddons, State::InsuranceSummary));
        assert!(table.is_valid_transition(
            State::InsuranceEditEndDate,
            State::InsuranceConfirmDates
        ));
        assert!(!table.is_valid_transition(State::InsuranceEditEndDate, State::InsuranceAddons));
    }

    #[test]
    fn test_invalid_transitions() {
        let table = TransitionTable::new();
        assert!(!table.is_valid_transition(State::Home, State::QrGenerated));
        assert!(!table.is_valid_transition(State::NearbySelectVehicle, State::NearbyShowDrivers));
        assert!(!table.is_valid_transition(State::Home, State::Home));
    }

    #[test]
    fn test_allowed_targets_keep_declaration_order() {
        let table = TransitionTable::new();
        assert_eq!(
            table.allowed_targets(State::QrAmountMode),
            vec![State::QrAmountInput, State::QrGenerated, HOME]
        );
    }

    #[test]
    fn test_transition_error_display() {
        let err = TransitionError::InvalidTransition {
            from: State::Home,
            attempted: State::QrGenerated,
        };
        assert!(err.to_string().contains("Invalid transition from HOME to QR_GENERATED"));

        let err = TransitionError::MissingContext {
            target: State::NearbyWaitLocation,
            missing: vec![ContextField::VehicleType],
        };
        assert!(err.to_string().contains("NEARBY_WAIT_LOCATION"));
    }
}
