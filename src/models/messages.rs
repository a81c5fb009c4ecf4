use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Reply button (the transport renders at most three).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonOption {
    pub id: String,
    pub title: String,
}

impl ButtonOption {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ListRow {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSection {
    pub title: String,
    pub rows: Vec<ListRow>,
}

/// Where outbound media comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    /// Media already uploaded to the transport
    Id(String),
    /// Publicly reachable URL
    Link(String),
    /// Raw bytes the sender uploads first
    Bytes { data: Bytes, mime_type: String },
}

/// A message composed by a flow handler.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Text {
        body: String,
    },
    Buttons {
        body: String,
        options: Vec<ButtonOption>,
    },
    List {
        body: String,
        button_label: String,
        sections: Vec<ListSection>,
    },
    Image {
        media: MediaSource,
        caption: Option<String>,
    },
    Document {
        media: MediaSource,
        caption: Option<String>,
        filename: Option<String>,
    },
}

impl OutboundMessage {
    /// Text shown to the user, for logs and assertions.
    pub fn body(&self) -> &str {
        match self {
            Self::Text { body } | Self::Buttons { body, .. } | Self::List { body, .. } => body,
            Self::Image { caption, .. } | Self::Document { caption, .. } => {
                caption.as_deref().unwrap_or_default()
            }
        }
    }

    /// Ids of every selectable option carried by the message.
    pub fn option_ids(&self) -> Vec<&str> {
        match self {
            Self::Buttons { options, .. } => options.iter().map(|o| o.id.as_str()).collect(),
            Self::List { sections, .. } => sections
                .iter()
                .flat_map(|s| s.rows.iter().map(|r| r.id.as_str()))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Buttons { .. } => "buttons",
            Self::List { .. } => "list",
            Self::Image { .. } => "image",
            Self::Document { .. } => "document",
        }
    }
}
