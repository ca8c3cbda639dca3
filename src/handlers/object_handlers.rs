//! HTTP handlers for bucket and object operations.
//! Streams object bodies to avoid buffering in memory and delegates storage
//! concerns to `StorageService`.

use crate::{
    errors::AppError,
    models::object::{Object, ObjectAcl},
    services::storage_service::StorageService,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use std::io;
use tokio_util::io::ReaderStream;

const ACL_HEADER: &str = "x-amz-acl";

/// Minimal request body for `PUT /{bucket}` (create bucket).
#[derive(Debug, Deserialize)]
pub struct CreateBucketReq {
    #[serde(rename = "LocationConstraint")]
    pub location_constraint: Option<String>,
}

/// Upload an object to `/{bucket}/{*key}`.
///
/// A successful upload notifies the thumbnail pipeline.
pub async fn upload_object(
    State(service): State<StorageService>,
    Path((bucket, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let acl = match headers.get(ACL_HEADER).map(|v| v.to_str()) {
        None => ObjectAcl::default(),
        Some(Ok(value)) => value.parse::<ObjectAcl>().map_err(AppError::bad_request)?,
        Some(Err(_)) => return Err(AppError::bad_request("x-amz-acl is not valid text")),
    };

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));

    let object = service
        .upload_object_stream(&bucket, &key, content_type, acl, stream)
        .await?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    if let Some(etag) = object.etag.as_ref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            response.headers_mut().insert(header::ETAG, value);
        }
    }
    Ok(response)
}

/// Download an object `/{bucket}/{*key}` as a streaming response. This is
/// the target of the public URLs recorded for thumbnails.
pub async fn get_object(
    State(service): State<StorageService>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (meta, file) = service.get_object_reader(&bucket, &key).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);

    Ok(response)
}

/// PUT `/{bucket}`: create bucket.
pub async fn create_bucket(
    State(service): State<StorageService>,
    Path(bucket): Path<String>,
    payload: Option<Json<CreateBucketReq>>,
) -> Result<impl IntoResponse, AppError> {
    let region = payload
        .and_then(|Json(p)| p.location_constraint)
        .unwrap_or_else(|| "local".into());

    let created = service.create_bucket(&bucket, &region).await?;
    tracing::info!(bucket = %created.name, region = %created.region, "bucket created");

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    if let Ok(location) = HeaderValue::from_str(&format!("/{}", created.name)) {
        response.headers_mut().insert(header::LOCATION, location);
    }
    Ok(response)
}

fn set_object_headers(headers: &mut HeaderMap, meta: &Object) {
    let content_type = meta
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(meta.size_bytes.max(0) as u64),
    );

    if let Some(etag) = meta.etag.as_ref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            headers.insert(header::ETAG, value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&meta.last_modified.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }

    if let Ok(value) = HeaderValue::from_str(&meta.acl) {
        headers.insert(HeaderName::from_static(ACL_HEADER), value);
    }
}
