//! Metadata row written once per generated thumbnail.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Ratio applied to the source size to approximate the thumbnail size.
const REDUCTION_RATIO: f64 = 0.53;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// A persisted thumbnail record. Records are append-only: nothing in the
/// service updates or deletes them once written.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailRecord {
    /// Random v4 UUID, freshly generated for every record.
    pub id: String,

    /// Public URL of the thumbnail object. Not checked against the store.
    pub url: String,

    /// Human-readable size estimate, e.g. `"5.3 KB"`.
    pub approx_reduced_size: String,

    pub created_at: String,

    pub updated_at: String,
}

impl ThumbnailRecord {
    /// Build a record for `url`, estimating its size from the byte size of
    /// the *source* object the thumbnail was generated from.
    pub fn new(url: impl Into<String>, source_size: u64) -> Self {
        let now = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            approx_reduced_size: approx_reduced_size(source_size),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// `(size * 0.53) / 1000` followed by `" KB"`.
///
/// Whole numbers keep one fractional digit (`53.0 KB`); everything else uses
/// the shortest representation that round-trips (`5.3 KB`, `0.53 KB`).
pub fn approx_reduced_size(source_size: u64) -> String {
    let kilobytes = (source_size as f64 * REDUCTION_RATIO) / 1000.0;
    if kilobytes.fract() == 0.0 {
        format!("{:.1} KB", kilobytes)
    } else {
        format!("{} KB", kilobytes)
    }
}
