//! Nearby driver search.

use crate::error::{Error, Result};
use crate::models::trips::{DriverCandidate, GeoPoint, VehicleType};
use async_trait::async_trait;
use serde::Deserialize;
use std::cmp::Ordering;

#[async_trait]
pub trait DriverLocator: Send + Sync {
    /// Drivers within `radius_km` of `location`, nearest first.
    async fn find_nearby(
        &self,
        location: GeoPoint,
        radius_km: f64,
        vehicle_type: Option<VehicleType>,
    ) -> Result<Vec<DriverCandidate>>;
}

/// Last known position of an online driver.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DriverPosition {
    pub id: String,
    pub name: String,
    pub vehicle_type: VehicleType,
    pub location: GeoPoint,
    pub rating: f32,
}

/// Locator over positions held in memory, ranked by distance then rating.
#[derive(Default)]
pub struct InMemoryDriverLocator {
    drivers: scc::HashMap<String, DriverPosition>,
}

impl InMemoryDriverLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, position: DriverPosition) {
        let _ = self
            .drivers
            .upsert_async(position.id.clone(), position)
            .await;
    }

    /// Loads positions from a JSON array of
    /// `{id, name, vehicle_type, location: {latitude, longitude}, rating}`.
    /// Returns how many were loaded.
    pub async fn seed_from_json(&self, json: &str) -> Result<usize> {
        let positions: Vec<DriverPosition> = serde_json::from_str(json)?;
        for position in &positions {
            if !(0.0..=5.0).contains(&position.rating) {
                return Err(Error::Validation(format!(
                    "Driver {} has rating {} outside 0 to 5",
                    position.id, position.rating
                )));
            }
        }
        let loaded = positions.len();
        for position in positions {
            self.upsert(position).await;
        }
        Ok(loaded)
    }

    pub async fn remove(&self, driver_id: &str) {
        let _ = self.drivers.remove_async(driver_id).await;
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

#[async_trait]
impl DriverLocator for InMemoryDriverLocator {
    async fn find_nearby(
        &self,
        location: GeoPoint,
        radius_km: f64,
        vehicle_type: Option<VehicleType>,
    ) -> Result<Vec<DriverCandidate>> {
        let mut candidates = Vec::new();
        self.drivers
            .retain_async(|_, driver| {
                let matches_type = vehicle_type.is_none_or(|t| t == driver.vehicle_type);
                if matches_type {
                    let distance_km = location.distance_km(&driver.location);
                    if distance_km <= radius_km {
                        candidates.push(DriverCandidate {
                            id: driver.id.clone(),
                            name: driver.name.clone(),
                            vehicle_type: driver.vehicle_type,
                            distance_km,
                            rating: driver.rating,
                        });
                    }
                }
                true
            })
            .await;

        candidates.sort_by(|a, b| {
            a.distance_km
                .partial_cmp(&b.distance_km)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.rating.partial_cmp(&a.rating).unwrap_or(Ordering::Equal))
        });

        tracing::debug!(
            latitude = location.latitude,
            longitude = location.longitude,
            radius_km,
            found = candidates.len(),
            "[DriverLocator] Nearby search"
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(id: &str, vehicle_type: VehicleType, lat: f64, lon: f64, rating: f32) -> DriverPosition {
        DriverPosition {
            id: id.to_string(),
            name: format!("Driver {id}"),
            vehicle_type,
            location: GeoPoint::new(lat, lon),
            rating,
        }
    }

    #[tokio::test]
    async fn test_seed_from_json() {
        let locator = InMemoryDriverLocator::new();
        let seed = r#"[
            {"id": "d1", "name": "Eric", "vehicle_type": "moto",
             "location": {"latitude": -1.9445, "longitude": 30.0620}, "rating": 4.5},
            {"id": "d2", "name": "Aline", "vehicle_type": "cab",
             "location": {"latitude": -1.9500, "longitude": 30.0600}, "rating": 4.8}
        ]"#;
        assert_eq!(locator.seed_from_json(seed).await.unwrap(), 2);
        assert_eq!(locator.len(), 2);

        let found = locator
            .find_nearby(GeoPoint::new(-1.9441, 30.0619), 5.0, Some(VehicleType::Moto))
            .await
            .unwrap();
        assert_eq!(found[0].name, "Eric");
    }

    #[tokio::test]
    async fn test_seed_rejects_bad_entries() {
        let locator = InMemoryDriverLocator::new();
        assert!(locator.seed_from_json("{\"id\": \"d1\"}").await.is_err());

        let bad_rating = r#"[{"id": "d1", "name": "Eric", "vehicle_type": "moto",
            "location": {"latitude": -1.9, "longitude": 30.0}, "rating": 7.0}]"#;
        assert!(matches!(
            locator.seed_from_json(bad_rating).await,
            Err(Error::Validation(_))
        ));
        assert!(locator.is_empty());
    }

    #[tokio::test]
    async fn test_find_nearby_filters_and_ranks() {
        let locator = InMemoryDriverLocator::new();
        let here = GeoPoint::new(-1.9441, 30.0619);

        locator.upsert(driver("far", VehicleType::Moto, -1.9900, 30.1000, 5.0)).await;
        locator.upsert(driver("near", VehicleType::Moto, -1.9445, 30.0620, 4.1)).await;
        locator.upsert(driver("cab", VehicleType::Cab, -1.9442, 30.0619, 4.9)).await;
        locator.upsert(driver("huye", VehicleType::Moto, -2.5967, 29.7394, 5.0)).await;

        let found = locator
            .find_nearby(here, 10.0, Some(VehicleType::Moto))
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "far"]);

        let any = locator.find_nearby(here, 1.0, None).await.unwrap();
        assert_eq!(any.len(), 2);
    }

    #[tokio::test]
    async fn test_equal_distance_prefers_higher_rating() {
        let locator = InMemoryDriverLocator::new();
        let here = GeoPoint::new(-1.95, 30.06);
        locator.upsert(driver("low", VehicleType::Cab, -1.95, 30.06, 3.0)).await;
        locator.upsert(driver("high", VehicleType::Cab, -1.95, 30.06, 4.8)).await;

        let found = locator.find_nearby(here, 1.0, None).await.unwrap();
        assert_eq!(found[0].id, "high");

        locator.remove("high").await;
        assert_eq!(locator.len(), 1);
    }
}
