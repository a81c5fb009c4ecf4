use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

/// How a registered vehicle is used. Drives which document fields matter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UsageType {
    Personal,
    Commercial,
    Taxi,
}

impl UsageType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Personal => "Personal",
            Self::Commercial => "Commercial",
            Self::Taxi => "Taxi / moto-taxi",
        }
    }
}

/// Structured fields read off a vehicle document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractedVehicle {
    pub plate_number: String,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub insurance_expiry: Option<NaiveDate>,
}

impl ExtractedVehicle {
    /// Multi-line summary shown to the user for confirmation.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!("Plate: {}", self.plate_number)];
        match (&self.make, &self.model) {
            (Some(make), Some(model)) => lines.push(format!("Vehicle: {make} {model}")),
            (Some(make), None) => lines.push(format!("Vehicle: {make}")),
            _ => {}
        }
        if let Some(year) = self.year {
            lines.push(format!("Year: {year}"));
        }
        if let Some(owner) = &self.owner_name {
            lines.push(format!("Owner: {owner}"));
        }
        if let Some(expiry) = self.insurance_expiry {
            lines.push(format!("Insurance expires: {}", expiry.format("%d/%m/%Y")));
        }
        lines.join("\n")
    }
}

/// A vehicle registered by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub id: Uuid,
    pub owner: String,
    pub usage_type: UsageType,
    pub details: ExtractedVehicle,
    pub created_at: DateTime<Utc>,
}
