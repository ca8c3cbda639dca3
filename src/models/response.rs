//! HTTP-style response envelope returned by the lister.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// `{statusCode, headers, body}` where `body` is already serialized.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ResponseEnvelope {
    /// A 200 envelope carrying `value` as JSON.
    pub fn ok_json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_string(value)?;
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string());
        Ok(Self {
            status_code: StatusCode::OK.as_u16(),
            headers,
            body,
        })
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }
}
