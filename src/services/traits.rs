use async_trait::async_trait;
use bytes::Bytes;

use super::metadata_table::MetadataError;
use super::storage_service::StorageError;
use crate::models::{object::ObjectAcl, thumbnail_record::ThumbnailRecord};

/// Blob storage addressed by bucket and key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Read the full payload of an object.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError>;

    /// Write (or replace) an object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
        acl: ObjectAcl,
    ) -> Result<(), StorageError>;

    /// Public URL of an object: `{endpoint}/{bucket}/{key}`.
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// One page of a table scan.
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub items: Vec<ThumbnailRecord>,
    /// Opaque token for the next page; `None` on the last page.
    pub last_evaluated_key: Option<String>,
}

/// Key-value table of thumbnail records.
#[async_trait]
pub trait MetadataTable: Send + Sync {
    async fn put_item(&self, record: &ThumbnailRecord) -> Result<(), MetadataError>;

    /// Scan from the start, or after `exclusive_start_key` when given.
    async fn scan(&self, exclusive_start_key: Option<String>) -> Result<ScanPage, MetadataError>;
}
