//! `GET /api/search?q=` - full-text search over titles, tags and content
//!
//! Each hit is the page plus a `snippet` with the query wrapped in `<mark>`.

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use notesai_core::SearchHit;
use serde::Deserialize;

use crate::{AppState, HttpError};

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: Option<String>,
}

/// Blank or missing queries return an empty list rather than an error
async fn search_pages(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchHit>>, HttpError> {
    let query = params.q.unwrap_or_default();
    let hits = state
        .pages
        .search_hits(&query)
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to search pages"))?;
    tracing::debug!("Search '{}' matched {} pages", query, hits.len());
    Ok(Json(hits))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/search", get(search_pages))
        .with_state(state)
}
