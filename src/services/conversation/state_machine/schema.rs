//! Context schema: the fields that must be present before a state may be entered.

use super::state::State;
use crate::services::conversation::context::ContextField;

/// Per-state required context fields.
///
/// Total over the catalog: states without requirements map to an empty slice.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextSchema;

impl ContextSchema {
    pub fn new() -> Self {
        Self
    }

    /// Fields that must hold a non-empty value for a transition into `state`.
    pub fn required_fields(&self, state: State) -> &'static [ContextField] {
        use ContextField as F;

        match state {
            State::Home
            | State::Mobility
            | State::NearbySelectVehicle
            | State::ScheduleSelectVehicle
            | State::VehicleSelectUsage
            | State::QrMenu
            | State::InsuranceMenu
            | State::InsurancePlate => &[],

            State::NearbyWaitLocation => &[F::VehicleType],
            State::NearbyShowDrivers => &[F::VehicleType, F::Location],
            State::NearbyConfirmDriver => &[F::SelectedDriverId],
            State::NearbyRideRequested => &[F::SelectedDriverId, F::RideId],

            State::SchedulePickup => &[F::VehicleType],
            State::ScheduleDropoff => &[F::PickupLocation],
            State::ScheduleTime => &[F::PickupLocation, F::DropoffLocation],
            State::ScheduleConfirm => &[F::ScheduledTime],
            State::ScheduleBooked => &[F::BookingId],

            State::VehicleUploadDocument => &[F::UsageType],
            State::VehicleProcessing => &[F::DocumentUploaded, F::ExtractionJobId],
            State::VehicleConfirm => &[F::ExtractionResult],
            State::VehicleSaved => &[F::VehicleId],

            State::QrIdentifierInput => &[F::QrType],
            State::QrAmountMode => &[F::QrIdentifier],
            State::QrAmountInput => &[F::AmountMode],
            State::QrGenerated => &[F::QrType, F::QrIdentifier, F::Amount],

            State::InsuranceStartDate => &[F::VehiclePlate],
            State::InsurancePeriod => &[F::StartDate],
            State::InsuranceConfirmDates => &[F::StartDate, F::EndDate],
            State::InsuranceEditEndDate => &[F::StartDate, F::EndDate],
            State::InsuranceAddons => &[F::StartDate, F::EndDate],
            State::InsurancePaCategory => &[F::Addons],
            State::InsuranceSummary => &[F::Addons],
            State::InsurancePaymentPlan => &[F::StartDate, F::EndDate, F::Addons],
            State::InsuranceQuoteReady => &[F::PaymentPlan, F::QuoteId],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::conversation::state_machine::TransitionTable;

    #[test]
    fn test_schema_is_total_over_the_table() {
        let schema = ContextSchema::new();
        let table = TransitionTable::new();
        for state in table.states() {
            // Must not panic; the match is exhaustive.
            let _ = schema.required_fields(state);
        }
    }

    #[test]
    fn test_safe_states_have_no_requirements() {
        let schema = ContextSchema::new();
        for state in State::all().filter(|s| s.is_safe()) {
            assert!(schema.required_fields(state).is_empty(), "{state}");
        }
    }

    #[test]
    fn test_generation_requires_amount() {
        let schema = ContextSchema::new();
        assert!(schema
            .required_fields(State::QrGenerated)
            .contains(&ContextField::Amount));
        assert_eq!(
            schema.required_fields(State::NearbyWaitLocation),
            &[ContextField::VehicleType]
        );
    }
}
