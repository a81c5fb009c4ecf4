use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};
use uuid::Uuid;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Vehicle categories offered for rides and trips.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VehicleType {
    Moto,
    Cab,
    Liffan,
    Truck,
}

impl VehicleType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Moto => "Moto",
            Self::Cab => "Cab",
            Self::Liffan => "Liffan",
            Self::Truck => "Truck",
        }
    }
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both coordinates are finite and within range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// A driver returned by the locator, already ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverCandidate {
    pub id: String,
    pub name: String,
    pub vehicle_type: VehicleType,
    pub distance_km: f64,
    pub rating: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RideStatus {
    Requested,
    Accepted,
    Cancelled,
    Completed,
}

/// On-demand ride request created when a passenger confirms a driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideRequest {
    pub id: Uuid,
    pub passenger: String,
    pub driver_id: String,
    pub vehicle_type: VehicleType,
    pub pickup: GeoPoint,
    pub status: RideStatus,
    pub created_at: DateTime<Utc>,
}

/// Scheduled trip booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripBooking {
    pub id: Uuid,
    pub passenger: String,
    pub vehicle_type: VehicleType,
    pub pickup: GeoPoint,
    pub dropoff: GeoPoint,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
