use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::handlers::{health_check, receive_event, verify_webhook};
use crate::middleware::verify_signature_middleware;
use crate::state::AppState;

/// Builds the HTTP surface: `/api/v1/health` and `/api/v1/webhook`.
pub fn build_router(state: AppState) -> Router {
    let receive = post(receive_event).route_layer(middleware::from_fn_with_state(
        state.clone(),
        verify_signature_middleware,
    ));

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/webhook", get(verify_webhook).merge(receive));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
