//! Conversation state catalog.
//!
//! Every state belongs to exactly one [`FlowType`]. Family membership comes
//! from the explicit lookup in [`State::flow_type`], never from the state's
//! spelling.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

/// Flow families a session can be in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlowType {
    /// Main menu and the mobility sub-menu
    Hub,
    NearbyDrivers,
    ScheduleTrip,
    AddVehicle,
    QrGeneration,
    Insurance,
}

/// A named conversation state.
///
/// Serialized in `SCREAMING_SNAKE_CASE` so persisted sessions stay readable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    // Hub
    Home,
    Mobility,

    // Nearby drivers
    NearbySelectVehicle,
    NearbyWaitLocation,
    NearbyShowDrivers,
    NearbyConfirmDriver,
    NearbyRideRequested,

    // Schedule trip
    ScheduleSelectVehicle,
    SchedulePickup,
    ScheduleDropoff,
    ScheduleTime,
    ScheduleConfirm,
    ScheduleBooked,

    // Add vehicle
    VehicleSelectUsage,
    VehicleUploadDocument,
    VehicleProcessing,
    VehicleConfirm,
    VehicleSaved,

    // QR generation
    QrMenu,
    QrIdentifierInput,
    QrAmountMode,
    QrAmountInput,
    QrGenerated,

    // Insurance
    InsuranceMenu,
    InsurancePlate,
    InsuranceStartDate,
    InsurancePeriod,
    InsuranceConfirmDates,
    InsuranceEditEndDate,
    InsuranceAddons,
    InsurancePaCategory,
    InsuranceSummary,
    InsurancePaymentPlan,
    InsuranceQuoteReady,
}

/// The hub state every flow returns to.
pub const HOME: State = State::Home;

impl State {
    /// Iterates the full catalog in declaration order.
    pub fn all() -> impl Iterator<Item = State> {
        State::iter()
    }

    /// Returns the family that owns this state.
    pub fn flow_type(self) -> FlowType {
        match self {
            Self::Home | Self::Mobility => FlowType::Hub,

            Self::NearbySelectVehicle
            | Self::NearbyWaitLocation
            | Self::NearbyShowDrivers
            | Self::NearbyConfirmDriver
            | Self::NearbyRideRequested => FlowType::NearbyDrivers,

            Self::ScheduleSelectVehicle
            | Self::SchedulePickup
            | Self::ScheduleDropoff
            | Self::ScheduleTime
            | Self::ScheduleConfirm
            | Self::ScheduleBooked => FlowType::ScheduleTrip,

            Self::VehicleSelectUsage
            | Self::VehicleUploadDocument
            | Self::VehicleProcessing
            | Self::VehicleConfirm
            | Self::VehicleSaved => FlowType::AddVehicle,

            Self::QrMenu
            | Self::QrIdentifierInput
            | Self::QrAmountMode
            | Self::QrAmountInput
            | Self::QrGenerated => FlowType::QrGeneration,

            Self::InsuranceMenu
            | Self::InsurancePlate
            | Self::InsuranceStartDate
            | Self::InsurancePeriod
            | Self::InsuranceConfirmDates
            | Self::InsuranceEditEndDate
            | Self::InsuranceAddons
            | Self::InsurancePaCategory
            | Self::InsuranceSummary
            | Self::InsurancePaymentPlan
            | Self::InsuranceQuoteReady => FlowType::Insurance,
        }
    }

    /// Safe states are recovery targets: the hub menus and each flow's
    /// top-level menu.
    pub fn is_safe(self) -> bool {
        matches!(
            self,
            Self::Home
                | Self::Mobility
                | Self::NearbySelectVehicle
                | Self::ScheduleSelectVehicle
                | Self::VehicleSelectUsage
                | Self::QrMenu
                | Self::InsuranceMenu
        )
    }
}

impl FlowType {
    /// The state a flow starts in when entered from the hub.
    pub fn entry_state(self) -> State {
        match self {
            Self::Hub => State::Home,
            Self::NearbyDrivers => State::NearbySelectVehicle,
            Self::ScheduleTrip => State::ScheduleSelectVehicle,
            Self::AddVehicle => State::VehicleSelectUsage,
            Self::QrGeneration => State::QrMenu,
            Self::Insurance => State::InsuranceMenu,
        }
    }
}
