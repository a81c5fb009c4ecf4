//! Document extraction for vehicle registration cards.

use crate::config::ExtractorConfig;
use crate::error::{Error, Result};
use crate::models::vehicles::{ExtractedVehicle, UsageType};
use async_trait::async_trait;
use serde::Serialize;

#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Reads vehicle fields off the uploaded document `media_ref`.
    async fn extract(&self, media_ref: &str, usage_type: UsageType) -> Result<ExtractedVehicle>;
}

#[derive(Debug, Serialize)]
struct ExtractionRequest<'a> {
    media_id: &'a str,
    usage_type: UsageType,
}

/// Extractor backed by an HTTP service returning `ExtractedVehicle` JSON.
pub struct HttpDocumentExtractor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDocumentExtractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl DocumentExtractor for HttpDocumentExtractor {
    async fn extract(&self, media_ref: &str, usage_type: UsageType) -> Result<ExtractedVehicle> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ExtractionRequest {
                media_id: media_ref,
                usage_type,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Collaborator(format!(
                "Extraction service returned status {}",
                status
            )));
        }

        let vehicle: ExtractedVehicle = response.json().await?;
        if vehicle.plate_number.trim().is_empty() {
            return Err(Error::Collaborator(
                "No plate number found on the document".to_string(),
            ));
        }
        Ok(vehicle)
    }
}
