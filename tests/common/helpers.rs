//! Dispatcher harness over in-memory stores and substitute collaborators.

use std::sync::Arc;

use chatflows::models::events::InboundEvent;
use chatflows::models::trips::{GeoPoint, VehicleType};
use chatflows::providers::{DriverLocator, DriverPosition, InMemoryDriverLocator, InMemoryRecordStore};
use chatflows::services::conversation::state_machine::State;
use chatflows::services::conversation::{Collaborators, DispatchReport, Dispatcher, FlowSettings};
use chatflows::services::extraction::InMemoryJobQueue;
use chatflows::services::sessions::{InMemorySessionStore, Session, SessionStore};

use super::fakes::{RecordingSender, StubQrRenderer};

/// Kigali city centre.
pub const KIGALI: (f64, f64) = (-1.9441, 30.0619);

pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    pub sessions: Arc<InMemorySessionStore>,
    pub sender: Arc<RecordingSender>,
    pub drivers: Arc<InMemoryDriverLocator>,
    pub jobs: Arc<InMemoryJobQueue>,
    pub records: Arc<InMemoryRecordStore>,
    pub qr: Arc<StubQrRenderer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(FlowSettings::default())
    }

    pub fn with_settings(settings: FlowSettings) -> Self {
        let drivers = Arc::new(InMemoryDriverLocator::new());
        Self::build(settings, drivers.clone(), drivers)
    }

    /// Harness whose driver searches go to `locator`.
    pub fn with_locator(locator: Arc<dyn DriverLocator>) -> Self {
        Self::build(
            FlowSettings::default(),
            Arc::new(InMemoryDriverLocator::new()),
            locator,
        )
    }

    fn build(
        settings: FlowSettings,
        drivers: Arc<InMemoryDriverLocator>,
        locator: Arc<dyn DriverLocator>,
    ) -> Self {
        let sessions = Arc::new(InMemorySessionStore::new());
        let sender = Arc::new(RecordingSender::new());
        let jobs = Arc::new(InMemoryJobQueue::new());
        let records = Arc::new(InMemoryRecordStore::new());
        let qr = Arc::new(StubQrRenderer::new());

        let services = Collaborators {
            messages: sender.clone(),
            drivers: locator,
            jobs: jobs.clone(),
            qr: qr.clone(),
            records: records.clone(),
        };
        let store: Arc<dyn SessionStore> = sessions.clone();
        let dispatcher = Arc::new(Dispatcher::new(store, services, settings));

        Self {
            dispatcher,
            sessions,
            sender,
            drivers,
            jobs,
            records,
            qr,
        }
    }

    /// Dispatches `event`, panicking on error.
    pub async fn send(&self, event: InboundEvent) -> DispatchReport {
        self.dispatcher
            .dispatch(event)
            .await
            .expect("dispatch should succeed")
    }

    pub async fn text(&self, identity: &str, body: &str) -> DispatchReport {
        self.send(InboundEvent::text(identity, body)).await
    }

    pub async fn button(&self, identity: &str, id: &str) -> DispatchReport {
        self.send(InboundEvent::button(identity, id)).await
    }

    pub async fn list(&self, identity: &str, id: &str) -> DispatchReport {
        self.send(InboundEvent::list(identity, id)).await
    }

    pub async fn location(&self, identity: &str, point: (f64, f64)) -> DispatchReport {
        self.send(InboundEvent::location(identity, point.0, point.1))
            .await
    }

    pub async fn session(&self, identity: &str) -> Option<Session> {
        self.sessions.load(identity).await.expect("load should succeed")
    }

    pub async fn stored_state(&self, identity: &str) -> Option<State> {
        self.session(identity).await.map(|s| s.state)
    }

    pub async fn add_driver(&self, id: &str, name: &str, vehicle_type: VehicleType, at: (f64, f64), rating: f32) {
        self.drivers
            .upsert(DriverPosition {
                id: id.to_string(),
                name: name.to_string(),
                vehicle_type,
                location: GeoPoint::new(at.0, at.1),
                rating,
            })
            .await;
    }
}
