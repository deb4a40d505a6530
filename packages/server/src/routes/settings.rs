//! `GET`/`PUT /api/settings` - the single global settings record

use axum::{extract::State, response::Json, routing::get, Router};
use notesai_core::{Settings, SettingsUpdate};

use crate::{AppState, HttpError};

async fn get_settings(State(state): State<AppState>) -> Result<Json<Settings>, HttpError> {
    let settings = state
        .pages
        .get_settings()
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to fetch settings"))?;
    Ok(Json(settings))
}

/// Upsert, then rebuild the assistant engine from the new values
///
/// The settings are saved even when the engine cannot be built; the
/// previous engine stays in place and the failure is logged.
async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<Settings>, HttpError> {
    let settings = state
        .pages
        .update_settings(update)
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to update settings"))?;

    if let Err(e) = state.apply_settings(&settings) {
        tracing::warn!("Keeping previous assistant engine: {}", e);
    }
    Ok(Json(settings))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/settings", get(get_settings).put(update_settings))
        .with_state(state)
}
