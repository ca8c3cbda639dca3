//! Defines routes for the object store and the thumbnail handlers.
//!
//! ## Structure
//! - **Thumbnail endpoints**
//!   - `GET    /images`: list every thumbnail record
//!   - `POST   /events/object-created`: deliver an S3 event to the creator
//!
//! - **Bucket-level endpoints**
//!   - `PUT    /{bucket}`: create bucket
//!
//! - **Object-level endpoints**
//!   - `PUT    /{bucket}/{*key}`: upload object (fires object-created)
//!   - `GET    /{bucket}/{*key}`: download object (public URLs land here)
//!
//! The wildcard `*key` allows nested keys like `photos/2025/img.jpg`.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{create_bucket, get_object, upload_object},
        thumbnail_handlers::{list_thumbnails, object_created},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Build the router. Static paths are matched before the `/{bucket}`
/// captures, so `images`, `events`, `healthz` and `readyz` cannot be used as
/// bucket names over HTTP.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/images", get(list_thumbnails))
        .route("/events/object-created", post(object_created))
        .route("/{bucket}/{*key}", put(upload_object).get(get_object))
        .route("/{bucket}", put(create_bucket))
}
