//! Substitute collaborators for flow and dispatcher tests.

use async_trait::async_trait;
use bytes::Bytes;
use chatflows::error::{Error, Result};
use chatflows::models::messages::OutboundMessage;
use chatflows::models::trips::{DriverCandidate, GeoPoint, VehicleType};
use chatflows::models::vehicles::{ExtractedVehicle, UsageType};
use chatflows::providers::{DocumentExtractor, DriverLocator, MessageSender, QrRenderer};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Sender that records every message and can be switched to fail.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, OutboundMessage)>>,
    failing: AtomicBool,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn messages_for(&self, identity: &str) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|(to, _)| to == identity)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub async fn last_for(&self, identity: &str) -> Option<OutboundMessage> {
        self.messages_for(identity).await.pop()
    }

    /// Message bodies sent to `identity`, oldest first.
    pub async fn bodies_for(&self, identity: &str) -> Vec<String> {
        self.messages_for(identity)
            .await
            .iter()
            .map(|m| m.body().to_string())
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, identity: &str, message: OutboundMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Collaborator("sender unavailable".to_string()));
        }
        self.sent.lock().await.push((identity.to_string(), message));
        Ok(())
    }
}

/// Locator that always fails.
pub struct FailingDriverLocator;

#[async_trait]
impl DriverLocator for FailingDriverLocator {
    async fn find_nearby(
        &self,
        _location: GeoPoint,
        _radius_km: f64,
        _vehicle_type: Option<VehicleType>,
    ) -> Result<Vec<DriverCandidate>> {
        Err(Error::Collaborator("driver search unavailable".to_string()))
    }
}

/// Renderer returning a fixed PNG stub, or failing when switched.
#[derive(Default)]
pub struct StubQrRenderer {
    failing: AtomicBool,
    rendered: Mutex<Vec<String>>,
}

impl StubQrRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn rendered(&self) -> Vec<String> {
        self.rendered.lock().await.clone()
    }
}

#[async_trait]
impl QrRenderer for StubQrRenderer {
    async fn render(&self, data: &str) -> Result<Bytes> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Collaborator("renderer unavailable".to_string()));
        }
        self.rendered.lock().await.push(data.to_string());
        Ok(Bytes::from_static(b"\x89PNG stub"))
    }
}

/// Extractor replaying scripted results. Fails once the script runs out.
#[derive(Default)]
pub struct ScriptedExtractor {
    script: Mutex<VecDeque<std::result::Result<ExtractedVehicle, String>>>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn new(script: Vec<std::result::Result<ExtractedVehicle, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentExtractor for ScriptedExtractor {
    async fn extract(&self, _media_ref: &str, _usage_type: UsageType) -> Result<ExtractedVehicle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().await.pop_front() {
            Some(Ok(vehicle)) => Ok(vehicle),
            Some(Err(reason)) => Err(Error::Collaborator(reason)),
            None => Err(Error::Collaborator("no scripted result".to_string())),
        }
    }
}

pub fn sample_vehicle() -> ExtractedVehicle {
    ExtractedVehicle {
        plate_number: "RAD123A".to_string(),
        make: Some("Toyota".to_string()),
        model: Some("Corolla".to_string()),
        year: Some(2015),
        owner_name: Some("Jean Uwimana".to_string()),
        insurance_expiry: None,
    }
}
