//! Thumbnail creation and listing.
//!
//! The creator turns an object-created event into a square PNG stored next
//! to the source plus one metadata record. Its own output is also an
//! object-created event, so the naming rule and the skip rule below must
//! agree: every derived key ends with [`THUMBNAIL_SUFFIX`] and every key
//! with that suffix is skipped.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, field, info, instrument};

use crate::config::PipelineConfig;
use crate::models::{
    event::{EventError, ObjectCreated, S3Event},
    object::ObjectAcl,
    response::ResponseEnvelope,
    thumbnail_record::ThumbnailRecord,
};
use crate::services::{
    metadata_table::MetadataError,
    storage_service::StorageError,
    thumbnail_codec::{self, CodecError},
    traits::{MetadataTable, ObjectStore},
};

pub const THUMBNAIL_SUFFIX: &str = "_thumbnail.png";
pub const THUMBNAIL_CONTENT_TYPE: &str = "image/png";

#[derive(Debug, Error)]
pub enum ThumbnailError {
    #[error("invalid event: {0}")]
    InvalidEvent(#[from] EventError),
    #[error("failed to fetch `{bucket}/{key}`: {source}")]
    Fetch {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },
    #[error("`{bucket}/{key}` is not a decodable image: {source}")]
    Decode {
        bucket: String,
        key: String,
        #[source]
        source: CodecError,
    },
    #[error("failed to produce thumbnail: {0}")]
    Transform(#[source] CodecError),
    #[error("thumbnail task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("failed to store thumbnail `{bucket}/{key}`: {source}")]
    StorageWrite {
        bucket: String,
        key: String,
        #[source]
        source: StorageError,
    },
    #[error("failed to record thumbnail metadata: {0}")]
    MetadataWrite(#[source] MetadataError),
    #[error("failed to scan thumbnail metadata: {0}")]
    Scan(#[source] MetadataError),
    #[error("failed to serialize thumbnail list: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// True for keys the creator itself produces.
pub fn is_thumbnail_key(key: &str) -> bool {
    key.ends_with(THUMBNAIL_SUFFIX)
}

/// Drop everything after the last `.` and append [`THUMBNAIL_SUFFIX`].
/// A key without a `.` keeps its full text as the stem.
pub fn derive_thumbnail_key(key: &str) -> String {
    let stem = match key.rsplit_once('.') {
        Some((stem, _extension)) => stem,
        None => key,
    };
    format!("{}{}", stem, THUMBNAIL_SUFFIX)
}

/// Handles object-created events.
pub struct ThumbnailCreator {
    config: PipelineConfig,
    store: Arc<dyn ObjectStore>,
    table: Arc<dyn MetadataTable>,
}

impl ThumbnailCreator {
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn ObjectStore>,
        table: Arc<dyn MetadataTable>,
    ) -> Self {
        Self {
            config,
            store,
            table,
        }
    }

    /// Generate, store and record a thumbnail for the object in
    /// `Records[0]`. Returns `Ok(None)` without touching any collaborator
    /// when the object is itself a thumbnail.
    ///
    /// Nothing is retried. A failure after the thumbnail was stored leaves
    /// the object in place without a record.
    #[instrument(skip_all, fields(bucket = field::Empty, key = field::Empty))]
    pub async fn handle(&self, event: &S3Event) -> Result<Option<String>, ThumbnailError> {
        let created = event.first_object_created()?;
        let span = tracing::Span::current();
        span.record("bucket", created.bucket.as_str());
        span.record("key", created.key.as_str());

        if is_thumbnail_key(&created.key) {
            debug!("object is a generated thumbnail, skipping");
            return Ok(None);
        }

        let source = self
            .store
            .get_object(&created.bucket, &created.key)
            .await
            .map_err(|source| ThumbnailError::Fetch {
                bucket: created.bucket.clone(),
                key: created.key.clone(),
                source,
            })?;

        let png = self.render(source, &created).await?;

        let thumbnail_key = derive_thumbnail_key(&created.key);
        self.store
            .put_object(
                &created.bucket,
                &thumbnail_key,
                Bytes::from(png),
                THUMBNAIL_CONTENT_TYPE,
                ObjectAcl::PublicRead,
            )
            .await
            .map_err(|source| ThumbnailError::StorageWrite {
                bucket: created.bucket.clone(),
                key: thumbnail_key.clone(),
                source,
            })?;
        let url = self.store.public_url(&created.bucket, &thumbnail_key);

        let record = ThumbnailRecord::new(url.clone(), created.size);
        self.table
            .put_item(&record)
            .await
            .map_err(ThumbnailError::MetadataWrite)?;

        info!(%url, record_id = %record.id, "thumbnail stored");
        Ok(Some(url))
    }

    /// Decode and fit on the blocking pool.
    async fn render(
        &self,
        source: Bytes,
        created: &ObjectCreated,
    ) -> Result<Vec<u8>, ThumbnailError> {
        let size = self.config.thumbnail_size;
        let bucket = created.bucket.clone();
        let key = created.key.clone();
        tokio::task::spawn_blocking(move || {
            let image = thumbnail_codec::decode(&source)
                .map_err(|source| ThumbnailError::Decode { bucket, key, source })?;
            thumbnail_codec::fit_square_png(&image, size).map_err(ThumbnailError::Transform)
        })
        .await?
    }
}

/// Handles list requests.
pub struct ThumbnailLister {
    config: PipelineConfig,
    table: Arc<dyn MetadataTable>,
}

impl ThumbnailLister {
    pub fn new(config: PipelineConfig, table: Arc<dyn MetadataTable>) -> Self {
        Self { config, table }
    }

    /// Scan every page of the table and return all records in a 200 JSON
    /// envelope.
    #[instrument(skip_all, fields(table = %self.config.table_name))]
    pub async fn handle(&self) -> Result<ResponseEnvelope, ThumbnailError> {
        let mut items = Vec::new();
        let mut start_key = None;
        let mut pages = 0usize;
        loop {
            let page = self
                .table
                .scan(start_key.take())
                .await
                .map_err(ThumbnailError::Scan)?;
            pages += 1;
            items.extend(page.items);
            match page.last_evaluated_key {
                Some(next) => start_key = Some(next),
                None => break,
            }
        }

        debug!(pages, items = items.len(), "scan complete");
        Ok(ResponseEnvelope::ok_json(&items)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::traits::ScanPage;
    use async_trait::async_trait;
    use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    const ENDPOINT: &str = "http://localhost:3000";

    #[derive(Debug, Clone)]
    struct StoredBlob {
        body: Bytes,
        content_type: String,
        acl: ObjectAcl,
    }

    #[derive(Default)]
    struct FakeStore {
        objects: Mutex<HashMap<(String, String), StoredBlob>>,
        gets: Mutex<usize>,
        fail_puts: bool,
    }

    impl FakeStore {
        fn with_object(bucket: &str, key: &str, body: Bytes) -> Self {
            let store = Self::default();
            store.objects.lock().unwrap().insert(
                (bucket.to_string(), key.to_string()),
                StoredBlob {
                    body,
                    content_type: "application/octet-stream".into(),
                    acl: ObjectAcl::Private,
                },
            );
            store
        }

        fn object(&self, bucket: &str, key: &str) -> Option<StoredBlob> {
            self.objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
        }

        fn len(&self) -> usize {
            self.objects.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
            *self.gets.lock().unwrap() += 1;
            self.object(bucket, key)
                .map(|blob| blob.body)
                .ok_or_else(|| StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
        }

        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            body: Bytes,
            content_type: &str,
            acl: ObjectAcl,
        ) -> Result<(), StorageError> {
            if self.fail_puts {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.objects.lock().unwrap().insert(
                (bucket.to_string(), key.to_string()),
                StoredBlob {
                    body,
                    content_type: content_type.to_string(),
                    acl,
                },
            );
            Ok(())
        }

        fn public_url(&self, bucket: &str, key: &str) -> String {
            format!("{}/{}/{}", ENDPOINT, bucket, key)
        }
    }

    /// Holds records and serves them `page_size` at a time.
    #[derive(Default)]
    struct FakeTable {
        records: Mutex<Vec<ThumbnailRecord>>,
        page_size: usize,
        scans: Mutex<Vec<Option<String>>>,
        fail: bool,
    }

    impl FakeTable {
        fn paged(page_size: usize, records: Vec<ThumbnailRecord>) -> Self {
            Self {
                records: Mutex::new(records),
                page_size,
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn records(&self) -> Vec<ThumbnailRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MetadataTable for FakeTable {
        async fn put_item(&self, record: &ThumbnailRecord) -> Result<(), MetadataError> {
            if self.fail {
                return Err(MetadataError::Sqlx(sqlx::Error::PoolTimedOut));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn scan(
            &self,
            exclusive_start_key: Option<String>,
        ) -> Result<ScanPage, MetadataError> {
            if self.fail {
                return Err(MetadataError::Sqlx(sqlx::Error::PoolTimedOut));
            }
            self.scans.lock().unwrap().push(exclusive_start_key.clone());
            let records = self.records.lock().unwrap();
            let start = exclusive_start_key
                .map(|token| token.parse::<usize>().unwrap())
                .unwrap_or(0);
            let end = (start + self.page_size.max(1)).min(records.len());
            Ok(ScanPage {
                items: records[start..end].to_vec(),
                last_evaluated_key: (end < records.len()).then(|| end.to_string()),
            })
        }
    }

    fn config(size: u32) -> PipelineConfig {
        PipelineConfig {
            thumbnail_size: size,
            region_name: "us-east-2".into(),
            table_name: "thumb_table".into(),
        }
    }

    fn png_bytes(width: u32, height: u32) -> Bytes {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 10, 10])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        Bytes::from(buf.into_inner())
    }

    fn event(bucket: &str, key: &str, size: u64) -> S3Event {
        S3Event::object_created(bucket, key, size, "us-east-2")
    }

    fn creator(store: Arc<FakeStore>, table: Arc<FakeTable>, size: u32) -> ThumbnailCreator {
        ThumbnailCreator::new(config(size), store, table)
    }

    #[test]
    fn derived_names_strip_the_last_extension() {
        assert_eq!(derive_thumbnail_key("a/b/photo.JPG"), "a/b/photo_thumbnail.png");
        assert_eq!(derive_thumbnail_key("noext"), "noext_thumbnail.png");
        assert_eq!(
            derive_thumbnail_key("archive.tar.gz"),
            "archive.tar_thumbnail.png"
        );
        assert_eq!(derive_thumbnail_key("dir.v2/file"), "dir_thumbnail.png");
    }

    #[test]
    fn derived_names_are_always_skipped() {
        for key in ["cat.jpg", "noext", "a/b/c.d.png", ".hidden", "x.png"] {
            let derived = derive_thumbnail_key(key);
            assert!(derived.ends_with(THUMBNAIL_SUFFIX));
            assert!(is_thumbnail_key(&derived), "{derived}");
        }
        assert!(!is_thumbnail_key("cat_thumbnail.jpg"));
        assert!(!is_thumbnail_key("thumbnail.png"));
    }

    #[tokio::test]
    async fn thumbnail_keys_cause_no_io() {
        let store = Arc::new(FakeStore::default());
        let table = Arc::new(FakeTable::default());
        let creator = creator(store.clone(), table.clone(), 128);

        let result = creator
            .handle(&event("photo-bucket", "a/cat_thumbnail.png", 5000))
            .await
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(*store.gets.lock().unwrap(), 0);
        assert_eq!(store.len(), 0);
        assert!(table.records().is_empty());
    }

    #[tokio::test]
    async fn creates_square_public_png_and_one_record() {
        let store = Arc::new(FakeStore::with_object(
            "photo-bucket",
            "trips/beach.JPG",
            png_bytes(300, 120),
        ));
        let table = Arc::new(FakeTable::default());
        let creator = creator(store.clone(), table.clone(), 128);

        let url = creator
            .handle(&event("photo-bucket", "trips/beach.JPG", 10_000))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(url, "http://localhost:3000/photo-bucket/trips/beach_thumbnail.png");

        let thumb = store.object("photo-bucket", "trips/beach_thumbnail.png").unwrap();
        assert_eq!(thumb.content_type, "image/png");
        assert_eq!(thumb.acl, ObjectAcl::PublicRead);
        let decoded = image::load_from_memory_with_format(&thumb.body, ImageFormat::Png).unwrap();
        assert_eq!(decoded.dimensions(), (128, 128));

        let records = table.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, url);
        assert_eq!(records[0].approx_reduced_size, "5.3 KB");
        assert!(!records[0].id.is_empty());
        assert_eq!(records[0].created_at, records[0].updated_at);
    }

    #[tokio::test]
    async fn retrigger_on_own_output_is_filtered() {
        let store = Arc::new(FakeStore::with_object("photo-bucket", "cat.png", png_bytes(50, 80)));
        let table = Arc::new(FakeTable::default());
        let creator = creator(store.clone(), table.clone(), 32);

        creator
            .handle(&event("photo-bucket", "cat.png", 900))
            .await
            .unwrap();
        let second = creator
            .handle(&event("photo-bucket", &derive_thumbnail_key("cat.png"), 900))
            .await
            .unwrap();

        assert_eq!(second, None);
        assert_eq!(store.len(), 2);
        assert_eq!(table.records().len(), 1);
    }

    #[tokio::test]
    async fn redelivery_overwrites_object_but_duplicates_record() {
        let store = Arc::new(FakeStore::with_object("photo-bucket", "cat.png", png_bytes(10, 10)));
        let table = Arc::new(FakeTable::default());
        let creator = creator(store.clone(), table.clone(), 8);
        let delivery = event("photo-bucket", "cat.png", 100);

        creator.handle(&delivery).await.unwrap();
        creator.handle(&delivery).await.unwrap();

        assert_eq!(store.len(), 2);
        let records = table.records();
        assert_eq!(records.len(), 2);
        assert_ne!(records[0].id, records[1].id);
    }

    #[tokio::test]
    async fn missing_source_is_a_fetch_error_without_writes() {
        let store = Arc::new(FakeStore::default());
        let table = Arc::new(FakeTable::default());
        let creator = creator(store.clone(), table.clone(), 64);

        let err = creator
            .handle(&event("photo-bucket", "gone.jpg", 10))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ThumbnailError::Fetch { source: StorageError::ObjectNotFound { .. }, .. }
        ));
        assert_eq!(store.len(), 0);
        assert!(table.records().is_empty());
    }

    #[tokio::test]
    async fn undecodable_source_is_a_decode_error() {
        let store = Arc::new(FakeStore::with_object(
            "photo-bucket",
            "notes.txt",
            Bytes::from_static(b"hello"),
        ));
        let table = Arc::new(FakeTable::default());
        let creator = creator(store.clone(), table.clone(), 64);

        let err = creator
            .handle(&event("photo-bucket", "notes.txt", 5))
            .await
            .unwrap_err();

        assert!(matches!(err, ThumbnailError::Decode { .. }));
        assert_eq!(store.len(), 1);
        assert!(table.records().is_empty());
    }

    #[tokio::test]
    async fn store_failure_is_a_storage_write_error() {
        let store = Arc::new(FakeStore {
            fail_puts: true,
            ..FakeStore::with_object("photo-bucket", "cat.png", png_bytes(10, 10))
        });
        let table = Arc::new(FakeTable::default());
        let creator = creator(store, table.clone(), 8);

        let err = creator
            .handle(&event("photo-bucket", "cat.png", 10))
            .await
            .unwrap_err();

        assert!(matches!(err, ThumbnailError::StorageWrite { ref key, .. } if key == "cat_thumbnail.png"));
        assert!(table.records().is_empty());
    }

    #[tokio::test]
    async fn metadata_failure_leaves_the_thumbnail_stored() {
        let store = Arc::new(FakeStore::with_object("photo-bucket", "cat.png", png_bytes(10, 10)));
        let table = Arc::new(FakeTable::failing());
        let creator = creator(store.clone(), table, 8);

        let err = creator
            .handle(&event("photo-bucket", "cat.png", 10))
            .await
            .unwrap_err();

        assert!(matches!(err, ThumbnailError::MetadataWrite(_)));
        assert!(store.object("photo-bucket", "cat_thumbnail.png").is_some());
    }

    #[tokio::test]
    async fn event_without_records_is_invalid() {
        let creator = creator(Arc::new(FakeStore::default()), Arc::new(FakeTable::default()), 8);
        let err = creator.handle(&S3Event { records: vec![] }).await.unwrap_err();
        assert!(matches!(err, ThumbnailError::InvalidEvent(EventError::NoRecords)));
    }

    #[tokio::test]
    async fn lister_collects_every_page_once() {
        let records: Vec<_> = (0..7)
            .map(|n| ThumbnailRecord::new(format!("{ENDPOINT}/b/{n}_thumbnail.png"), n * 1000))
            .collect();
        let table = Arc::new(FakeTable::paged(3, records.clone()));
        let lister = ThumbnailLister::new(config(128), table.clone());

        let envelope = lister.handle().await.unwrap();

        assert_eq!(envelope.status_code, 200);
        assert_eq!(
            envelope.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        let listed: Vec<ThumbnailRecord> = serde_json::from_str(&envelope.body).unwrap();
        assert_eq!(listed, records);
        assert_eq!(
            *table.scans.lock().unwrap(),
            vec![None, Some("3".to_string()), Some("6".to_string())]
        );
    }

    #[tokio::test]
    async fn lister_returns_empty_array_for_empty_table() {
        let lister = ThumbnailLister::new(config(128), Arc::new(FakeTable::paged(3, vec![])));
        let envelope = lister.handle().await.unwrap();
        assert_eq!(envelope.body, "[]");
    }

    #[tokio::test]
    async fn lister_propagates_scan_errors() {
        let lister = ThumbnailLister::new(config(128), Arc::new(FakeTable::failing()));
        let err = lister.handle().await.unwrap_err();
        assert!(matches!(err, ThumbnailError::Scan(_)));
    }
}
