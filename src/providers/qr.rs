//! QR code rendering.

use crate::config::QrConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait QrRenderer: Send + Sync {
    /// Renders `data` as a PNG image.
    async fn render(&self, data: &str) -> Result<Bytes>;
}

/// Renderer backed by an HTTP QR image service.
pub struct HttpQrRenderer {
    client: reqwest::Client,
    base_url: url::Url,
}

impl HttpQrRenderer {
    pub fn new(config: &QrConfig) -> Result<Self> {
        let base_url = url::Url::parse(&config.renderer_url)
            .map_err(|e| Error::Internal(format!("Invalid QR renderer URL: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, base_url })
    }

    /// Request URL for `data`, with the payload percent-encoded.
    pub fn render_url(&self, data: &str) -> url::Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("size", "400x400")
            .append_pair("format", "png")
            .append_pair("data", data);
        url
    }
}

#[async_trait]
impl QrRenderer for HttpQrRenderer {
    async fn render(&self, data: &str) -> Result<Bytes> {
        let response = self.client.get(self.render_url(data)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Collaborator(format!(
                "QR renderer returned status {}",
                status
            )));
        }

        let image = response.bytes().await?;
        if image.is_empty() {
            return Err(Error::Collaborator("QR renderer returned no image".to_string()));
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_url_encodes_ussd() {
        let renderer = HttpQrRenderer::new(&QrConfig::default()).unwrap();
        let url = renderer.render_url("*182*1*1*0788123456*5000#");
        let data = url
            .query_pairs()
            .find(|(k, _)| k == "data")
            .map(|(_, v)| v.into_owned());
        assert_eq!(data.as_deref(), Some("*182*1*1*0788123456*5000#"));
        assert!(!url.as_str().contains('#'));
    }
}
