use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::server::handlers::{events, health, model, privacy};
use crate::state::AppState;

/// Routes served to the browser shim on the loopback interface.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/status", get(health::get_status))
        .route("/api/events", post(events::post_event))
        .route("/api/model", get(model::get_model))
        .route("/api/model/sync", post(model::sync_model))
        .route(
            "/api/privacy",
            get(privacy::get_privacy).post(privacy::set_privacy),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
