use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let model = match &state.runtime {
        Some(runtime) => Some(runtime.synchronizer.state().await),
        None => None,
    };
    let session_events = match &state.runtime {
        Some(runtime) => runtime.observer.session_len().await,
        None => 0,
    };

    Json(json!({
        "study": state.study,
        "model": model,
        "places": state.places.len(),
        "session_events": session_events,
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
    }))
}
