//! Image metadata endpoints
//!
//! The files themselves live with the frontend; only their metadata and
//! owning page are stored here.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use notesai_core::{CreateImage, Image, ImageUpdate, ImageWithPage};

use super::MessageResponse;
use crate::{AppState, HttpError};

async fn list_images(State(state): State<AppState>) -> Result<Json<Vec<Image>>, HttpError> {
    let images = state
        .pages
        .list_images()
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to fetch images"))?;
    Ok(Json(images))
}

async fn create_image(
    State(state): State<AppState>,
    Json(input): Json<CreateImage>,
) -> Result<(StatusCode, Json<Image>), HttpError> {
    let image = state
        .pages
        .create_image(input)
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to create image"))?;
    Ok((StatusCode::CREATED, Json(image)))
}

async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ImageWithPage>, HttpError> {
    let image = state
        .pages
        .get_image(&id)
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to fetch image"))?;
    Ok(Json(image))
}

async fn update_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<ImageUpdate>,
) -> Result<Json<Image>, HttpError> {
    let image = state
        .pages
        .update_image(&id, update)
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to update image"))?;
    Ok(Json(image))
}

async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, HttpError> {
    state
        .pages
        .delete_image(&id)
        .await
        .map_err(|e| HttpError::from_service(e, "Failed to delete image"))?;
    Ok(Json(MessageResponse::new("Image deleted successfully")))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/images", get(list_images).post(create_image))
        .route(
            "/api/images/:id",
            get(get_image).put(update_image).delete(delete_image),
        )
        .with_state(state)
}
