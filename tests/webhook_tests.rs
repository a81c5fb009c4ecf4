mod common;

use chatflows::middleware::SIGNATURE_HEADER;
use chatflows::middleware::signature::sign;
use chatflows::services::conversation::state_machine::State;
use common::{TestApp, TestAppOptions};
use serde_json::{Value, json};

const SECRET: &str = "test-app-secret";

fn text_event(identity: &str, message_id: &str, body: &str) -> Value {
    json!({
        "identity": identity,
        "message_id": message_id,
        "type": "text",
        "payload": body
    })
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;

    let response = app
        .client
        .get(app.url("/api/v1/health"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["session_store"], "memory");
}

#[tokio::test]
async fn test_verification_echoes_challenge() {
    let app = TestApp::with_options(TestAppOptions {
        verify_token: "verify-me".to_string(),
        ..Default::default()
    })
    .await;

    let response = app
        .client
        .get(app.url(
            "/api/v1/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444",
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "1158201444");
}

#[tokio::test]
async fn test_verification_rejects_wrong_token() {
    let app = TestApp::with_options(TestAppOptions {
        verify_token: "verify-me".to_string(),
        ..Default::default()
    })
    .await;

    let response = app
        .client
        .get(app.url("/api/v1/webhook?hub.mode=subscribe&hub.verify_token=guess&hub.challenge=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_verification_rejected_without_configured_token() {
    let app = TestApp::new().await;

    let response = app
        .client
        .get(app.url("/api/v1/webhook?hub.mode=subscribe&hub.verify_token=&hub.challenge=1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn test_event_is_dispatched() {
    let app = TestApp::new().await;

    let response = app
        .client
        .post(app.url("/api/v1/webhook"))
        .json(&json!({
            "identity": "250788000888",
            "message_id": "wamid.http.1",
            "type": "list",
            "payload": { "id": "qr_code" }
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["identity"], "250788000888");
    assert_eq!(body["outcome"]["kind"], "transitioned");
    assert_eq!(body["state"], "QR_MENU");
    assert_eq!(
        app.harness.stored_state("250788000888").await,
        Some(State::QrMenu)
    );
}

#[tokio::test]
async fn test_redelivered_event_reports_duplicate() {
    let app = TestApp::new().await;
    let event = text_event("250788000888", "wamid.http.2", "hello");

    for expected in ["unchanged", "duplicate"] {
        let body: Value = app
            .client
            .post(app.url("/api/v1/webhook"))
            .json(&event)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["outcome"]["kind"], expected);
    }
}

#[tokio::test]
async fn test_empty_identity_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .client
        .post(app.url("/api/v1/webhook"))
        .json(&text_event("  ", "wamid.http.3", "hi"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_signed_event_is_accepted() {
    let app = TestApp::with_options(TestAppOptions {
        app_secret: SECRET.to_string(),
        ..Default::default()
    })
    .await;
    let body = serde_json::to_vec(&text_event("250788000999", "wamid.sig.1", "hi")).unwrap();
    let signature = sign(SECRET.as_bytes(), &body).unwrap();

    let response = app
        .client
        .post(app.url("/api/v1/webhook"))
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_unsigned_or_tampered_event_is_rejected() {
    let app = TestApp::with_options(TestAppOptions {
        app_secret: SECRET.to_string(),
        ..Default::default()
    })
    .await;
    let body = serde_json::to_vec(&text_event("250788000999", "wamid.sig.2", "hi")).unwrap();

    let unsigned = app
        .client
        .post(app.url("/api/v1/webhook"))
        .header("content-type", "application/json")
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(unsigned.status(), 403);

    let signature = sign(b"some-other-secret", &body).unwrap();
    let tampered = app
        .client
        .post(app.url("/api/v1/webhook"))
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(tampered.status(), 403);

    assert_eq!(app.harness.sender.count().await, 0);
}
