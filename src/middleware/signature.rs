//! Webhook signature verification.
//!
//! The messaging platform signs each POST body with HMAC-SHA256 using the
//! app secret and sends `X-Hub-Signature-256: sha256=<hex>`.

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{Error, Result};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Largest webhook body accepted, in bytes.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Checks `header` against the HMAC-SHA256 of `body` under `secret`.
pub fn verify_signature(secret: &[u8], body: &[u8], header: &str) -> Result<()> {
    let provided_hex = header
        .strip_prefix("sha256=")
        .ok_or_else(|| Error::Unauthorized("Malformed signature header".to_string()))?;
    let provided = hex::decode(provided_hex)
        .map_err(|_| Error::Unauthorized("Invalid signature encoding".to_string()))?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|e| Error::Internal(format!("Failed to create HMAC: {}", e)))?;
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    if expected.as_slice().ct_eq(&provided[..]).into() {
        Ok(())
    } else {
        Err(Error::Unauthorized("Invalid webhook signature".to_string()))
    }
}

/// Computes the header value for `body`. Used by clients and tests.
pub fn sign(secret: &[u8], body: &[u8]) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|e| Error::Internal(format!("Failed to create HMAC: {}", e)))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Rejects webhook requests whose body signature does not verify.
///
/// Verification is skipped when no app secret is configured.
pub async fn verify_signature_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let secret = state.config.whatsapp.app_secret.expose_secret().as_bytes().to_vec();
    if secret.is_empty() {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let header = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| Error::Unauthorized("Missing signature header".to_string()))?
        .to_string();

    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| Error::Validation(format!("Failed to read request body: {}", e)))?;

    if let Err(e) = verify_signature(&secret, &bytes, &header) {
        tracing::warn!(error = %e, "[Webhook] Signature rejected");
        return Err(e);
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(request).await)
}
