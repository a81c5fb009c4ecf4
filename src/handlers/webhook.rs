//! Messaging webhook handlers
//!
//! The GET endpoint answers the platform's subscription handshake. The POST
//! endpoint accepts one normalized [`InboundEvent`] per request and routes it
//! through the dispatcher.

use axum::{
    Json,
    extract::{Query, State},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};
use crate::models::events::InboundEvent;
use crate::services::conversation::{DispatchOutcome, DispatchReport};
use crate::state::AppState;

/// Query parameters of the subscription handshake
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAccepted {
    pub status: &'static str,
    pub identity: String,
    pub outcome: DispatchOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl From<DispatchReport> for WebhookAccepted {
    fn from(report: DispatchReport) -> Self {
        Self {
            status: "accepted",
            identity: report.identity,
            outcome: report.outcome,
            state: report.state.map(|s| s.to_string()),
        }
    }
}

/// Subscription handshake
///
/// Echoes `hub.challenge` when `hub.mode` is `subscribe` and the token
/// matches the configured verify token.
///
/// # Example
/// ```bash
/// curl "http://localhost:3000/api/v1/webhook?hub.mode=subscribe&hub.verify_token=TOKEN&hub.challenge=42"
/// # Returns: 42
/// ```
pub async fn verify_webhook(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<String> {
    let expected = state.config.whatsapp.verify_token.expose_secret();
    let provided = query.verify_token.unwrap_or_default();

    let token_matches: bool = !expected.is_empty()
        && expected.as_bytes().ct_eq(provided.as_bytes()).into();
    if query.mode.as_deref() != Some("subscribe") || !token_matches {
        tracing::warn!(mode = ?query.mode, "[Webhook] Verification rejected");
        return Err(Error::Unauthorized("Webhook verification failed".to_string()));
    }

    tracing::info!("[Webhook] Subscription verified");
    Ok(query.challenge.unwrap_or_default())
}

/// Inbound event delivery
///
/// # Example
/// ```bash
/// curl -X POST http://localhost:3000/api/v1/webhook \
///   -H "Content-Type: application/json" \
///   -d '{"identity":"250788000111","message_id":"wamid.1","type":"text","payload":"hi"}'
/// # Returns: {"status":"accepted","identity":"250788000111","outcome":{"kind":"unchanged"},"state":"HOME"}
/// ```
pub async fn receive_event(
    State(state): State<AppState>,
    Json(event): Json<InboundEvent>,
) -> Result<Json<WebhookAccepted>> {
    if event.identity.trim().is_empty() {
        return Err(Error::Validation("identity must not be empty".to_string()));
    }
    let report = state.dispatcher.dispatch(event).await?;
    Ok(Json(report.into()))
}
