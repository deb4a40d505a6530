//! Page endpoints
//!
//! - `GET /api/pages` - all pages in sibling order
//! - `POST /api/pages` - create a page (201)
//! - `GET /api/pages/tree` - the sidebar forest
//! - `GET /api/pages/:id` - one page with its images and children
//! - `PUT /api/pages/:id` - partial update
//! - `DELETE /api/pages/:id` - delete a page and its images
//! - `POST /api/pages/:id/subpages` - new untitled child (201)
//! - `GET /api/pages/:id/breadcrumbs` - root-first trail
//! - `POST /api/pages/:id/move` - reorder, by drop target or explicit slot

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use notesai_core::{
    CreatePage, DropPosition, MoveRequest, Page, PageNode, PageSummary, PageUpdate,
    PageServiceError, PageWithRelations,
};
use serde::Deserialize;

use super::MessageResponse;
use crate::{AppState, HttpError};

/// Move request body
///
/// Either a drop (`targetId` + `position`) or an explicit `newOrder` with
/// an optional `newParentId` (null for the root level). A drop may send the
/// pointer's `offset` within a target row of `height` pixels instead of a
/// `position`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveBody {
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub position: Option<DropPosition>,
    #[serde(default)]
    pub offset: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub new_order: Option<i64>,
    #[serde(default)]
    pub new_parent_id: Option<String>,
}

async fn list_pages(State(state): State<AppState>) -> Result<Json<Vec<Page>>, HttpError> {
    let pages = state
        .pages
        .list_pages()
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to fetch pages"))?;
    Ok(Json(pages))
}

async fn create_page(
    State(state): State<AppState>,
    Json(input): Json<CreatePage>,
) -> Result<(StatusCode, Json<Page>), HttpError> {
    let page = state
        .pages
        .create_page(input)
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to create page"))?;
    Ok((StatusCode::CREATED, Json(page)))
}

async fn page_tree(State(state): State<AppState>) -> Result<Json<Vec<PageNode>>, HttpError> {
    let tree = state
        .pages
        .tree()
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to fetch pages"))?;
    Ok(Json(tree))
}

async fn get_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PageWithRelations>, HttpError> {
    let page = state
        .pages
        .get_page(&id)
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to fetch page"))?;
    Ok(Json(page))
}

async fn update_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<PageUpdate>,
) -> Result<Json<Page>, HttpError> {
    let page = state
        .pages
        .update_page(&id, update)
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to update page"))?;
    Ok(Json(page))
}

async fn delete_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, HttpError> {
    let detached = state
        .pages
        .delete_page(&id)
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to delete page"))?;
    tracing::debug!("Pages left without a parent after deleting {}: {:?}", id, detached);
    Ok(Json(MessageResponse::new("Page deleted successfully")))
}

async fn create_subpage(
    State(state): State<AppState>,
    Path(parent_id): Path<String>,
) -> Result<(StatusCode, Json<Page>), HttpError> {
    let page = state
        .pages
        .create_subpage(&parent_id)
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to create page"))?;
    Ok((StatusCode::CREATED, Json(page)))
}

async fn breadcrumbs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PageSummary>>, HttpError> {
    let trail = state
        .pages
        .breadcrumbs(&id)
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to fetch page"))?;
    Ok(Json(trail))
}

async fn move_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MoveBody>,
) -> Result<Json<Page>, HttpError> {
    let failure = |e: PageServiceError| HttpError::from_service(e, "Failed to move page");

    let position = body.position.or(match (body.offset, body.height) {
        (Some(offset), Some(height)) if height > 0.0 => {
            Some(DropPosition::from_offset(offset, height))
        }
        _ => None,
    });

    let moved = match (body.target_id, position, body.new_order) {
        (Some(target_id), Some(position), _) => {
            match state
                .pages
                .drop_page(&id, &target_id, position)
                .await
                .map_err(failure)?
            {
                Some(page) => page,
                // Dropped onto itself
                None => state.pages.get_page(&id).await.map_err(failure)?.page,
            }
        }
        (_, _, Some(new_order)) => state
            .pages
            .move_page(MoveRequest {
                page_id: id,
                new_order,
                new_parent_id: body.new_parent_id,
            })
            .await
            .map_err(failure)?,
        _ => {
            return Err(HttpError::bad_request(
                "Provide targetId with position or offset and height, or newOrder",
            ))
        }
    };
    Ok(Json(moved))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/pages", get(list_pages).post(create_page))
        .route("/api/pages/tree", get(page_tree))
        .route(
            "/api/pages/:id",
            get(get_page).put(update_page).delete(delete_page),
        )
        .route("/api/pages/:id/subpages", post(create_subpage))
        .route("/api/pages/:id/breadcrumbs", get(breadcrumbs))
        .route("/api/pages/:id/move", post(move_page))
        .with_state(state)
}
