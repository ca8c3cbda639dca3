//! Represents an object (file) stored in a bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Canned access control applied to an object at write time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ObjectAcl {
    #[default]
    Private,
    PublicRead,
}

impl ObjectAcl {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectAcl::Private => "private",
            ObjectAcl::PublicRead => "public-read",
        }
    }
}

impl FromStr for ObjectAcl {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "private" => Ok(ObjectAcl::Private),
            "public-read" => Ok(ObjectAcl::PublicRead),
            other => Err(format!("unsupported canned ACL `{}`", other)),
        }
    }
}

/// Metadata of a single object (blob) within a bucket.
///
/// The payload itself lives on disk; this row describes it.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Object {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Foreign key linking to the parent bucket.
    pub bucket_id: Uuid,

    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Last path segment of the key.
    pub filename: String,

    /// Content type (MIME type).
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 of the payload.
    pub etag: Option<String>,

    /// Canned ACL as stored (`private` or `public-read`).
    pub acl: String,

    /// Timestamp when object was last written.
    pub last_modified: DateTime<Utc>,
}
