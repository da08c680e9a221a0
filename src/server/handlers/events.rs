use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::interaction::ObservedEvent;
use crate::state::AppState;

/// Records one raw awesome bar event from the browser shim.
pub async fn post_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(event): Json<ObservedEvent>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;

    let runtime = state
        .runtime
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("study is not active".to_string()))?;

    let disposition = runtime.observer.on_event(event).await?;
    Ok(Json(disposition))
}
