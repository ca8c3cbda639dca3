//! HTTP entry points for the two thumbnail handlers.
//!
//! - POST /events/object-created -> run the creator on a delivered S3 event
//! - GET  /images                -> run the lister, reply with its envelope

use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::{
    errors::AppError,
    models::event::S3Event,
    services::thumbnail_service::{ThumbnailCreator, ThumbnailLister},
};

/// `POST /events/object-created`
///
/// Replies with the thumbnail URL as a JSON string, or `null` when the
/// object was skipped.
pub async fn object_created(
    State(creator): State<Arc<ThumbnailCreator>>,
    Json(event): Json<S3Event>,
) -> Result<Json<Option<String>>, AppError> {
    let url = creator.handle(&event).await?;
    Ok(Json(url))
}

/// `GET /images`
pub async fn list_thumbnails(
    State(lister): State<Arc<ThumbnailLister>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(lister.handle().await?)
}
