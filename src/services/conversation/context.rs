//! Typed session context.
//!
//! Slots are grouped per flow family. Each slot is addressable by a
//! [`ContextField`] so the context schema can name required fields
//! explicitly. Anything that does not deserve a typed slot goes into the
//! small `extra` map.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

use super::state_machine::State;
use crate::models::insurance::{Addon, InsurancePeriod, PaCategory, PaymentPlan};
use crate::models::payments::{AmountMode, QrAmount, QrType};
use crate::models::trips::{GeoPoint, VehicleType};
use crate::models::vehicles::{ExtractedVehicle, UsageType};

/// Names of every schema-addressable context slot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContextField {
    VehicleType,
    Location,
    SelectedDriverId,
    RideId,
    PickupLocation,
    DropoffLocation,
    ScheduledTime,
    BookingId,
    UsageType,
    DocumentUploaded,
    ExtractionJobId,
    ExtractionResult,
    VehicleId,
    QrType,
    QrIdentifier,
    AmountMode,
    Amount,
    QrCodeId,
    VehiclePlate,
    StartDate,
    Period,
    EndDate,
    Addons,
    PaCategory,
    PaymentPlan,
    QuoteId,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TripSlots {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<VehicleType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_driver_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ride_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropoff_location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleSlots {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_type: Option<UsageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_uploaded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_job_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_result: Option<ExtractedVehicle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrSlots {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_type: Option<QrType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_mode: Option<AmountMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<QrAmount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsuranceSlots {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_plate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<InsurancePeriod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// An empty list is a deliberate "no add-ons" answer and counts as present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addons: Option<Vec<Addon>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pa_category: Option<PaCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_plan: Option<PaymentPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_id: Option<Uuid>,
}

/// Accumulated slot values for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionContext {
    /// Most recent safe state this session passed through; the recovery target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_safe_state: Option<State>,
    pub trip: TripSlots,
    pub vehicle: VehicleSlots,
    pub qr: QrSlots,
    pub insurance: InsuranceSlots,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn text_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

impl SessionContext {
    /// True when the slot holds a usable value: set, and non-empty for text.
    pub fn has(&self, field: ContextField) -> bool {
        match field {
            ContextField::VehicleType => self.trip.vehicle_type.is_some(),
            ContextField::Location => self.trip.location.is_some(),
            ContextField::SelectedDriverId => text_present(&self.trip.selected_driver_id),
            ContextField::RideId => self.trip.ride_id.is_some(),
            ContextField::PickupLocation => self.trip.pickup_location.is_some(),
            ContextField::DropoffLocation => self.trip.dropoff_location.is_some(),
            ContextField::ScheduledTime => self.trip.scheduled_time.is_some(),
            ContextField::BookingId => self.trip.booking_id.is_some(),
            ContextField::UsageType => self.vehicle.usage_type.is_some(),
            ContextField::DocumentUploaded => self.vehicle.document_uploaded.is_some(),
            ContextField::ExtractionJobId => self.vehicle.extraction_job_id.is_some(),
            ContextField::ExtractionResult => self.vehicle.extraction_result.is_some(),
            ContextField::VehicleId => self.vehicle.vehicle_id.is_some(),
            ContextField::QrType => self.qr.qr_type.is_some(),
            ContextField::QrIdentifier => text_present(&self.qr.qr_identifier),
            ContextField::AmountMode => self.qr.amount_mode.is_some(),
            ContextField::Amount => self.qr.amount.is_some(),
            ContextField::QrCodeId => self.qr.qr_code_id.is_some(),
            ContextField::VehiclePlate => text_present(&self.insurance.vehicle_plate),
            ContextField::StartDate => self.insurance.start_date.is_some(),
            ContextField::Period => self.insurance.period.is_some(),
            ContextField::EndDate => self.insurance.end_date.is_some(),
            ContextField::Addons => self.insurance.addons.is_some(),
            ContextField::PaCategory => self.insurance.pa_category.is_some(),
            ContextField::PaymentPlan => self.insurance.payment_plan.is_some(),
            ContextField::QuoteId => self.insurance.quote_id.is_some(),
        }
    }

    /// Required fields that are not present, in the order given.
    pub fn missing(&self, required: &[ContextField]) -> Vec<ContextField> {
        required.iter().copied().filter(|f| !self.has(*f)).collect()
    }

    /// Merges a patch. Only the named slots change.
    pub fn apply(&mut self, patch: &ContextPatch) {
        for value in &patch.values {
            self.set(value.clone());
        }
        for (key, value) in &patch.extra {
            if value.is_null() {
                self.extra.remove(key);
            } else {
                self.extra.insert(key.clone(), value.clone());
            }
        }
    }

    fn set(&mut self, value: FieldValue) {
        match value {
            FieldValue::VehicleType(v) => self.trip.vehicle_type = Some(v),
            FieldValue::Location(v) => self.trip.location = Some(v),
            FieldValue::SelectedDriverId(v) => self.trip.selected_driver_id = Some(v),
            FieldValue::RideId(v) => self.trip.ride_id = Some(v),
            FieldValue::PickupLocation(v) => self.trip.pickup_location = Some(v),
            FieldValue::DropoffLocation(v) => self.trip.dropoff_location = Some(v),
            FieldValue::ScheduledTime(v) => self.trip.scheduled_time = Some(v),
            FieldValue::BookingId(v) => self.trip.booking_id = Some(v),
            FieldValue::UsageType(v) => self.vehicle.usage_type = Some(v),
            FieldValue::DocumentUploaded(v) => self.vehicle.document_uploaded = Some(v),
            FieldValue::ExtractionJobId(v) => self.vehicle.extraction_job_id = Some(v),
            FieldValue::ExtractionResult(v) => self.vehicle.extraction_result = Some(v),
            FieldValue::VehicleId(v) => self.vehicle.vehicle_id = Some(v),
            FieldValue::QrType(v) => self.qr.qr_type = Some(v),
            FieldValue::QrIdentifier(v) => self.qr.qr_identifier = Some(v),
            FieldValue::AmountMode(v) => self.qr.amount_mode = Some(v),
            FieldValue::Amount(v) => self.qr.amount = Some(v),
            FieldValue::QrCodeId(v) => self.qr.qr_code_id = Some(v),
            FieldValue::VehiclePlate(v) => self.insurance.vehicle_plate = Some(v),
            FieldValue::StartDate(v) => self.insurance.start_date = Some(v),
            FieldValue::Period(v) => self.insurance.period = Some(v),
            FieldValue::EndDate(v) => self.insurance.end_date = Some(v),
            FieldValue::Addons(v) => self.insurance.addons = Some(v),
            FieldValue::PaCategory(v) => self.insurance.pa_category = Some(v),
            FieldValue::PaymentPlan(v) => self.insurance.payment_plan = Some(v),
            FieldValue::QuoteId(v) => self.insurance.quote_id = Some(v),
        }
    }

    /// Wipes every slot, including `last_safe_state`.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Reads a string list stored in `extra`.
    pub fn extra_strings(&self, key: &str) -> Vec<String> {
        self.extra
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A typed assignment to one context slot.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    VehicleType(VehicleType),
    Location(GeoPoint),
    SelectedDriverId(String),
    RideId(Uuid),
    PickupLocation(GeoPoint),
    DropoffLocation(GeoPoint),
    ScheduledTime(DateTime<Utc>),
    BookingId(Uuid),
    UsageType(UsageType),
    DocumentUploaded(bool),
    ExtractionJobId(Uuid),
    ExtractionResult(ExtractedVehicle),
    VehicleId(Uuid),
    QrType(QrType),
    QrIdentifier(String),
    AmountMode(AmountMode),
    Amount(QrAmount),
    QrCodeId(Uuid),
    VehiclePlate(String),
    StartDate(NaiveDate),
    Period(InsurancePeriod),
    EndDate(NaiveDate),
    Addons(Vec<Addon>),
    PaCategory(PaCategory),
    PaymentPlan(PaymentPlan),
    QuoteId(Uuid),
}

impl FieldValue {
    pub fn field(&self) -> ContextField {
        match self {
            Self::VehicleType(_) => ContextField::VehicleType,
            Self::Location(_) => ContextField::Location,
            Self::SelectedDriverId(_) => ContextField::SelectedDriverId,
            Self::RideId(_) => ContextField::RideId,
            Self::PickupLocation(_) => ContextField::PickupLocation,
            Self::DropoffLocation(_) => ContextField::DropoffLocation,
            Self::ScheduledTime(_) => ContextField::ScheduledTime,
            Self::BookingId(_) => ContextField::BookingId,
            Self::UsageType(_) => ContextField::UsageType,
            Self::DocumentUploaded(_) => ContextField::DocumentUploaded,
            Self::ExtractionJobId(_) => ContextField::ExtractionJobId,
            Self::ExtractionResult(_) => ContextField::ExtractionResult,
            Self::VehicleId(_) => ContextField::VehicleId,
            Self::QrType(_) => ContextField::QrType,
            Self::QrIdentifier(_) => ContextField::QrIdentifier,
            Self::AmountMode(_) => ContextField::AmountMode,
            Self::Amount(_) => ContextField::Amount,
            Self::QrCodeId(_) => ContextField::QrCodeId,
            Self::VehiclePlate(_) => ContextField::VehiclePlate,
            Self::StartDate(_) => ContextField::StartDate,
            Self::Period(_) => ContextField::Period,
            Self::EndDate(_) => ContextField::EndDate,
            Self::Addons(_) => ContextField::Addons,
            Self::PaCategory(_) => ContextField::PaCategory,
            Self::PaymentPlan(_) => ContextField::PaymentPlan,
            Self::QuoteId(_) => ContextField::QuoteId,
        }
    }
}

/// A set of slot assignments requested together with a transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextPatch {
    values: Vec<FieldValue>,
    extra: Vec<(String, serde_json::Value)>,
}

impl ContextPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, value: FieldValue) -> Self {
        self.values.push(value);
        self
    }

    /// Sets an extension entry. `Null` removes the key on merge.
    pub fn extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.push((key.into(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.extra.is_empty()
    }

    /// Fields this patch assigns.
    pub fn fields(&self) -> Vec<ContextField> {
        self.values.iter().map(FieldValue::field).collect()
    }
}

impl From<FieldValue> for ContextPatch {
    fn from(value: FieldValue) -> Self {
        Self::new().set(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_empty_string_is_not_present() {
        let mut ctx = SessionContext::default();
        ctx.apply(&FieldValue::QrIdentifier(String::new()).into());
        assert!(!ctx.has(ContextField::QrIdentifier));

        ctx.apply(&FieldValue::QrIdentifier("0788123456".into()).into());
        assert!(ctx.has(ContextField::QrIdentifier));
    }

    #[test]
    fn test_patch_merge_is_monotonic() {
        let mut ctx = SessionContext::default();
        ctx.apply(&FieldValue::VehicleType(VehicleType::Moto).into());
        ctx.apply(&FieldValue::Location(GeoPoint::new(-1.95, 30.06)).into());

        assert_eq!(ctx.trip.vehicle_type, Some(VehicleType::Moto));
        assert!(ctx.has(ContextField::Location));
        assert_eq!(
            ctx.missing(&[ContextField::VehicleType, ContextField::Location, ContextField::RideId]),
            vec![ContextField::RideId]
        );
    }

    #[test]
    fn test_empty_addons_count_as_answered() {
        let mut ctx = SessionContext::default();
        assert!(!ctx.has(ContextField::Addons));
        ctx.apply(&FieldValue::Addons(vec![]).into());
        assert!(ctx.has(ContextField::Addons));
    }

    #[test]
    fn test_extra_entries_and_null_removal() {
        let mut ctx = SessionContext::default();
        let patch = ContextPatch::new().extra("offered", serde_json::json!(["d1", "d2"]));
        ctx.apply(&patch);
        assert_eq!(ctx.extra_strings("offered"), vec!["d1", "d2"]);

        ctx.apply(&ContextPatch::new().extra("offered", serde_json::Value::Null));
        assert!(ctx.extra.is_empty());
    }

    #[test]
    fn test_field_value_names_its_field() {
        let patch = ContextPatch::new()
            .set(FieldValue::QrType(QrType::Phone))
            .set(FieldValue::Amount(QrAmount::Open));
        assert_eq!(patch.fields(), vec![ContextField::QrType, ContextField::Amount]);
    }

    #[test]
    fn test_context_serde_round_trip() {
        let mut ctx = SessionContext::default();
        ctx.last_safe_state = Some(State::QrMenu);
        ctx.apply(
            &ContextPatch::new()
                .set(FieldValue::QrType(QrType::MomoCode))
                .set(FieldValue::Amount(QrAmount::Fixed(2500)))
                .set(FieldValue::StartDate(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())),
        );
        let json = serde_json::to_value(&ctx).unwrap();
        let back: SessionContext = serde_json::from_value(json).unwrap();
        assert_eq!(back, ctx);
    }

    #[test]
    fn test_field_names_are_snake_case() {
        assert_eq!(ContextField::SelectedDriverId.to_string(), "selected_driver_id");
        assert_eq!(ContextField::iter().count(), 26);
    }
}
