use serde::{Deserialize, Serialize};

use super::trips::GeoPoint;

/// Reference to media uploaded through the message transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Payload of an inbound message, tagged by its transport type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum InboundPayload {
    Text(String),
    Button {
        id: String,
        #[serde(default)]
        title: Option<String>,
    },
    List {
        id: String,
        #[serde(default)]
        title: Option<String>,
    },
    Location(GeoPoint),
    Image(MediaRef),
    Document(MediaRef),
}

/// One inbound message from one user identity.
///
/// Wire shape: `{"identity": "...", "message_id": "...", "type": "text", "payload": "hi"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub identity: String,
    /// Transport message id, used to drop duplicate deliveries.
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(flatten)]
    pub payload: InboundPayload,
}

impl InboundEvent {
    pub fn new(identity: impl Into<String>, payload: InboundPayload) -> Self {
        Self {
            identity: identity.into(),
            message_id: None,
            payload,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn text(identity: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(identity, InboundPayload::Text(body.into()))
    }

    pub fn button(identity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(
            identity,
            InboundPayload::Button {
                id: id.into(),
                title: None,
            },
        )
    }

    pub fn list(identity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(
            identity,
            InboundPayload::List {
                id: id.into(),
                title: None,
            },
        )
    }

    pub fn location(identity: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self::new(
            identity,
            InboundPayload::Location(GeoPoint::new(latitude, longitude)),
        )
    }

    pub fn image(identity: impl Into<String>, media_id: impl Into<String>) -> Self {
        Self::new(
            identity,
            InboundPayload::Image(MediaRef {
                id: media_id.into(),
                mime_type: None,
                caption: None,
            }),
        )
    }

    /// Short event kind name for logs.
    pub fn kind(&self) -> &'static str {
        match self.payload {
            InboundPayload::Text(_) => "text",
            InboundPayload::Button { .. } => "button",
            InboundPayload::List { .. } => "list",
            InboundPayload::Location(_) => "location",
            InboundPayload::Image(_) => "image",
            InboundPayload::Document(_) => "document",
        }
    }

    /// Trimmed free text, if this is a text message.
    pub fn text_body(&self) -> Option<&str> {
        match &self.payload {
            InboundPayload::Text(body) => Some(body.trim()),
            _ => None,
        }
    }

    /// Selected option id from a button or list reply.
    pub fn selection(&self) -> Option<&str> {
        match &self.payload {
            InboundPayload::Button { id, .. } | InboundPayload::List { id, .. } => Some(id.as_str()),
            _ => None,
        }
    }

    /// Selection id, or the lower-cased text. Lets users type an option id.
    pub fn choice(&self) -> Option<String> {
        self.selection()
            .map(str::to_string)
            .or_else(|| self.text_body().map(str::to_lowercase))
    }

    pub fn location_point(&self) -> Option<GeoPoint> {
        match &self.payload {
            InboundPayload::Location(point) => Some(*point),
            _ => None,
        }
    }

    /// Uploaded image or document.
    pub fn media(&self) -> Option<&MediaRef> {
        match &self.payload {
            InboundPayload::Image(media) | InboundPayload::Document(media) => Some(media),
            _ => None,
        }
    }

    /// True for the global "go back to the main menu" commands.
    pub fn is_home_command(&self) -> bool {
        matches!(
            self.choice().as_deref(),
            Some("home" | "menu" | "main_menu" | "cancel")
        )
    }
}
