//! Outbound message delivery.
//!
//! Flows talk to users only through [`MessageSender`]. The HTTP sender
//! speaks the WhatsApp Cloud API message format; the log sender is used when
//! no API endpoint is configured.

use crate::config::WhatsAppConfig;
use crate::error::{Error, Result};
use crate::models::messages::{ButtonOption, ListSection, MediaSource, OutboundMessage};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Delivers one message to `identity`. Returns once the transport has
    /// accepted it.
    async fn send(&self, identity: &str, message: OutboundMessage) -> Result<()>;

    async fn send_text(&self, identity: &str, body: &str) -> Result<()> {
        self.send(
            identity,
            OutboundMessage::Text {
                body: body.to_string(),
            },
        )
        .await
    }

    async fn send_buttons(
        &self,
        identity: &str,
        body: &str,
        options: Vec<ButtonOption>,
    ) -> Result<()> {
        self.send(
            identity,
            OutboundMessage::Buttons {
                body: body.to_string(),
                options,
            },
        )
        .await
    }

    async fn send_list(
        &self,
        identity: &str,
        body: &str,
        button_label: &str,
        sections: Vec<ListSection>,
    ) -> Result<()> {
        self.send(
            identity,
            OutboundMessage::List {
                body: body.to_string(),
                button_label: button_label.to_string(),
                sections,
            },
        )
        .await
    }

    async fn send_image(
        &self,
        identity: &str,
        media: MediaSource,
        caption: Option<String>,
    ) -> Result<()> {
        self.send(identity, OutboundMessage::Image { media, caption })
            .await
    }

    async fn send_document(
        &self,
        identity: &str,
        media: MediaSource,
        caption: Option<String>,
        filename: Option<String>,
    ) -> Result<()> {
        self.send(
            identity,
            OutboundMessage::Document {
                media,
                caption,
                filename,
            },
        )
        .await
    }
}

/// Sender that only logs. Used in development and when the API is unset.
#[derive(Debug, Default, Clone)]
pub struct LogMessageSender;

#[async_trait]
impl MessageSender for LogMessageSender {
    async fn send(&self, identity: &str, message: OutboundMessage) -> Result<()> {
        tracing::info!(
            identity = %identity,
            kind = message.kind(),
            body = %message.body(),
            options = ?message.option_ids(),
            "[LogMessageSender] Outbound message"
        );
        Ok(())
    }
}

/// Sender for the WhatsApp Cloud API.
pub struct HttpMessageSender {
    client: reqwest::Client,
    messages_url: String,
    media_url: String,
    access_token: SecretString,
}

impl HttpMessageSender {
    pub fn new(config: &WhatsAppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let base = config.api_base_url.trim_end_matches('/');
        Ok(Self {
            client,
            messages_url: format!("{}/{}/messages", base, config.phone_number_id),
            media_url: format!("{}/{}/media", base, config.phone_number_id),
            access_token: config.access_token.clone(),
        })
    }

    /// Uploads raw bytes and returns the transport media id.
    async fn upload_media(&self, data: bytes::Bytes, mime_type: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name("upload")
            .mime_str(mime_type)?;
        let form = reqwest::multipart::Form::new()
            .text("messaging_product", "whatsapp")
            .text("type", mime_type.to_string())
            .part("file", part);

        let response = self
            .client
            .post(&self.media_url)
            .bearer_auth(self.access_token.expose_secret())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Collaborator(format!(
                "Media upload failed with status {}: {}",
                status, body
            )));
        }

        let uploaded: Value = response.json().await?;
        uploaded
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Collaborator("Media upload response has no id".to_string()))
    }
}

#[async_trait]
impl MessageSender for HttpMessageSender {
    async fn send(&self, identity: &str, message: OutboundMessage) -> Result<()> {
        let message = match message {
            OutboundMessage::Image {
                media: MediaSource::Bytes { data, mime_type },
                caption,
            } => OutboundMessage::Image {
                media: MediaSource::Id(self.upload_media(data, &mime_type).await?),
                caption,
            },
            OutboundMessage::Document {
                media: MediaSource::Bytes { data, mime_type },
                caption,
                filename,
            } => OutboundMessage::Document {
                media: MediaSource::Id(self.upload_media(data, &mime_type).await?),
                caption,
                filename,
            },
            other => other,
        };

        let payload = wire_payload(identity, &message)?;
        let response = self
            .client
            .post(&self.messages_url)
            .bearer_auth(self.access_token.expose_secret())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(identity = %identity, status = %status, "[HttpMessageSender] Delivery rejected");
            return Err(Error::Collaborator(format!(
                "Message delivery failed with status {}: {}",
                status, body
            )));
        }

        tracing::debug!(identity = %identity, kind = message.kind(), "[HttpMessageSender] Delivered");
        Ok(())
    }
}

fn media_object(media: &MediaSource) -> Result<Value> {
    match media {
        MediaSource::Id(id) => Ok(json!({ "id": id })),
        MediaSource::Link(link) => Ok(json!({ "link": link })),
        MediaSource::Bytes { .. } => Err(Error::Internal(
            "Raw media must be uploaded before sending".to_string(),
        )),
    }
}

/// Builds the Cloud API request body for `message`.
pub fn wire_payload(to: &str, message: &OutboundMessage) -> Result<Value> {
    let body = match message {
        OutboundMessage::Text { body } => json!({
            "type": "text",
            "text": { "body": body, "preview_url": false },
        }),
        OutboundMessage::Buttons { body, options } => json!({
            "type": "interactive",
            "interactive": {
                "type": "button",
                "body": { "text": body },
                "action": {
                    "buttons": options.iter().map(|o| json!({
                        "type": "reply",
                        "reply": { "id": o.id, "title": o.title },
                    })).collect::<Vec<_>>(),
                },
            },
        }),
        OutboundMessage::List {
            body,
            button_label,
            sections,
        } => json!({
            "type": "interactive",
            "interactive": {
                "type": "list",
                "body": { "text": body },
                "action": {
                    "button": button_label,
                    "sections": sections,
                },
            },
        }),
        OutboundMessage::Image { media, caption } => {
            let mut image = media_object(media)?;
            if let Some(caption) = caption {
                image["caption"] = json!(caption);
            }
            json!({ "type": "image", "image": image })
        }
        OutboundMessage::Document {
            media,
            caption,
            filename,
        } => {
            let mut document = media_object(media)?;
            if let Some(caption) = caption {
                document["caption"] = json!(caption);
            }
            if let Some(filename) = filename {
                document["filename"] = json!(filename);
            }
            json!({ "type": "document", "document": document })
        }
    };

    let mut payload = json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
    });
    if let (Some(target), Some(fields)) = (payload.as_object_mut(), body.as_object()) {
        target.extend(fields.clone());
    }
    Ok(payload)
}
