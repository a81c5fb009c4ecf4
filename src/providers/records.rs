//! Domain record store for the records each flow produces.

use crate::error::{Error, Result};
use crate::models::insurance::InsuranceQuote;
use crate::models::payments::QrCodeRecord;
use crate::models::trips::{RideRequest, TripBooking};
use crate::models::vehicles::VehicleRecord;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_ride(&self, ride: RideRequest) -> Result<()>;
    async fn get_ride(&self, id: Uuid) -> Result<Option<RideRequest>>;

    async fn create_booking(&self, booking: TripBooking) -> Result<()>;
    async fn get_booking(&self, id: Uuid) -> Result<Option<TripBooking>>;

    async fn create_vehicle(&self, vehicle: VehicleRecord) -> Result<()>;
    async fn get_vehicle(&self, id: Uuid) -> Result<Option<VehicleRecord>>;

    async fn create_quote(&self, quote: InsuranceQuote) -> Result<()>;
    async fn get_quote(&self, id: Uuid) -> Result<Option<InsuranceQuote>>;

    async fn create_qr_code(&self, qr_code: QrCodeRecord) -> Result<()>;
    async fn get_qr_code(&self, id: Uuid) -> Result<Option<QrCodeRecord>>;
}

/// Record store held in memory.
#[derive(Default)]
pub struct InMemoryRecordStore {
    rides: scc::HashMap<Uuid, RideRequest>,
    bookings: scc::HashMap<Uuid, TripBooking>,
    vehicles: scc::HashMap<Uuid, VehicleRecord>,
    quotes: scc::HashMap<Uuid, InsuranceQuote>,
    qr_codes: scc::HashMap<Uuid, QrCodeRecord>,
}

/// Number of stored records of each kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub rides: usize,
    pub bookings: usize,
    pub vehicles: usize,
    pub quotes: usize,
    pub qr_codes: usize,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> RecordCounts {
        RecordCounts {
            rides: self.rides.len(),
            bookings: self.bookings.len(),
            vehicles: self.vehicles.len(),
            quotes: self.quotes.len(),
            qr_codes: self.qr_codes.len(),
        }
    }
}

async fn insert_new<V: Clone + Send + Sync + 'static>(
    map: &scc::HashMap<Uuid, V>,
    id: Uuid,
    record: V,
    kind: &str,
) -> Result<()> {
    map.insert_async(id, record)
        .await
        .map_err(|_| Error::Conflict(format!("{} {} already exists", kind, id)))
}

async fn read<V: Clone + Send + Sync + 'static>(map: &scc::HashMap<Uuid, V>, id: Uuid) -> Option<V> {
    map.read_async(&id, |_, v| v.clone()).await
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create_ride(&self, ride: RideRequest) -> Result<()> {
        insert_new(&self.rides, ride.id, ride, "Ride").await
    }

    async fn get_ride(&self, id: Uuid) -> Result<Option<RideRequest>> {
        Ok(read(&self.rides, id).await)
    }

    async fn create_booking(&self, booking: TripBooking) -> Result<()> {
        insert_new(&self.bookings, booking.id, booking, "Booking").await
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<TripBooking>> {
        Ok(read(&self.bookings, id).await)
    }

    async fn create_vehicle(&self, vehicle: VehicleRecord) -> Result<()> {
        insert_new(&self.vehicles, vehicle.id, vehicle, "Vehicle").await
    }

    async fn get_vehicle(&self, id: Uuid) -> Result<Option<VehicleRecord>> {
        Ok(read(&self.vehicles, id).await)
    }

    async fn create_quote(&self, quote: InsuranceQuote) -> Result<()> {
        insert_new(&self.quotes, quote.id, quote, "Quote").await
    }

    async fn get_quote(&self, id: Uuid) -> Result<Option<InsuranceQuote>> {
        Ok(read(&self.quotes, id).await)
    }

    async fn create_qr_code(&self, qr_code: QrCodeRecord) -> Result<()> {
        insert_new(&self.qr_codes, qr_code.id, qr_code, "QR code").await
    }

    async fn get_qr_code(&self, id: Uuid) -> Result<Option<QrCodeRecord>> {
        Ok(read(&self.qr_codes, id).await)
    }
}
