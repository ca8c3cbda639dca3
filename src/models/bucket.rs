//! Represents a logical bucket: a top-level container for objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A storage bucket. Source images and their thumbnails live side by side
/// in the same bucket.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Bucket {
    /// Unique identifier for this bucket (UUID for internal DB use).
    pub id: Uuid,

    /// Globally unique bucket name (must conform to DNS naming rules).
    pub name: String,

    /// Region where the bucket is hosted (e.g. "us-east-2").
    pub region: String,

    /// When this bucket was created.
    pub created_at: DateTime<Utc>,
}
