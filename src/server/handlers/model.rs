use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::state::AppState;

pub async fn get_model(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let weights = state.weights.snapshot().await;
    let (branch, sync_state, model_url) = match &state.runtime {
        Some(runtime) => (
            Some(runtime.synchronizer.branch().clone()),
            Some(runtime.synchronizer.state().await),
            runtime.synchronizer.model_url(),
        ),
        None => (None, None, None),
    };

    Ok(Json(json!({
        "branch": branch,
        "model_url": model_url,
        "state": sync_state,
        "weights": weights.to_prefs(),
    })))
}

/// Fetches and applies the branch's model now, outside the schedule.
pub async fn sync_model(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;

    let runtime = state
        .runtime
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("study is not active".to_string()))?;

    let version = runtime.synchronizer.fetch_and_apply().await?;
    Ok(Json(json!({ "version": version })))
}
