use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::privacy::PrivacyGate;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PrivacyUpdate {
    pub private_window_open: Option<bool>,
    pub permanent: Option<bool>,
}

async fn privacy_body(state: &AppState) -> serde_json::Value {
    json!({
        "private_browsing_active": state.privacy.private_browsing_active().await,
        "permanent_private_browsing": state.privacy.permanent_private_browsing().await,
    })
}

pub async fn get_privacy(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(privacy_body(&state).await)
}

pub async fn set_privacy(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<PrivacyUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.session_token)?;

    if let Some(open) = update.private_window_open {
        state.privacy.set_private_window_open(open);
    }
    if let Some(permanent) = update.permanent {
        state.privacy.set_permanent(permanent);
    }
    tracing::info!(?update, "Privacy state updated");
    Ok(Json(privacy_body(&state).await))
}
