//! SQLite-backed key-value table for thumbnail records.
//!
//! Each logical table is a name registered in `metadata_tables`; its rows
//! live in `thumbnail_records` keyed by `(table_name, id)`. Scans walk the
//! rows in id order and hand out base64 continuation tokens.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::models::thumbnail_record::ThumbnailRecord;
use crate::services::storage_service::is_unique_violation;
use crate::services::traits::{MetadataTable, ScanPage};

const TABLE_NAME_MIN_LEN: usize = 3;
const TABLE_NAME_MAX_LEN: usize = 255;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("table name `{0}` is invalid")]
    InvalidTableName(String),
    #[error("continuation token `{0}` is not valid")]
    InvalidToken(String),
    #[error("item `{0}` already exists")]
    DuplicateItem(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct SqliteMetadataTable {
    db: Arc<SqlitePool>,
    table_name: String,
    region: String,
    page_size: usize,
}

impl SqliteMetadataTable {
    pub fn new(db: Arc<SqlitePool>, table_name: &str, region: &str, page_size: usize) -> Self {
        Self {
            db,
            table_name: table_name.to_string(),
            region: region.to_string(),
            page_size: page_size.max(1),
        }
    }

    /// Validate the table name and register it. Idempotent.
    pub async fn ensure_table(&self) -> Result<(), MetadataError> {
        let name = &self.table_name;
        let valid_len = (TABLE_NAME_MIN_LEN..=TABLE_NAME_MAX_LEN).contains(&name.len());
        let valid_chars = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid_len || !valid_chars {
            return Err(MetadataError::InvalidTableName(name.clone()));
        }

        sqlx::query(
            "INSERT INTO metadata_tables (name, region, created_at) VALUES (?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(&self.region)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        debug!(table = %name, region = %self.region, "metadata table ready");
        Ok(())
    }
}

#[async_trait]
impl MetadataTable for SqliteMetadataTable {
    async fn put_item(&self, record: &ThumbnailRecord) -> Result<(), MetadataError> {
        let result = sqlx::query(
            "INSERT INTO thumbnail_records
                (table_name, id, url, approx_reduced_size, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&self.table_name)
        .bind(&record.id)
        .bind(&record.url)
        .bind(&record.approx_reduced_size)
        .bind(&record.created_at)
        .bind(&record.updated_at)
        .execute(&*self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(MetadataError::DuplicateItem(record.id.clone()))
            }
            Err(err) => Err(MetadataError::Sqlx(err)),
        }
    }

    async fn scan(&self, exclusive_start_key: Option<String>) -> Result<ScanPage, MetadataError> {
        let fetch_limit = self.page_size + 1;

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, url, approx_reduced_size, created_at, updated_at \
             FROM thumbnail_records WHERE table_name = ",
        );
        builder.push_bind(&self.table_name);

        if let Some(token) = exclusive_start_key.as_deref() {
            builder.push(" AND id > ");
            builder.push_bind(decode_token(token)?);
        }

        builder.push(" ORDER BY id ASC LIMIT ");
        builder.push_bind(fetch_limit as i64);

        let mut items: Vec<ThumbnailRecord> =
            builder.build_query_as().fetch_all(&*self.db).await?;

        let mut last_evaluated_key = None;
        if items.len() == fetch_limit {
            items.pop();
            last_evaluated_key = items.last().map(|last| encode_token(&last.id));
        }

        Ok(ScanPage {
            items,
            last_evaluated_key,
        })
    }
}

fn encode_token(id: &str) -> String {
    general_purpose::STANDARD.encode(id)
}

fn decode_token(token: &str) -> Result<String, MetadataError> {
    general_purpose::STANDARD
        .decode(token)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| MetadataError::InvalidToken(token.to_string()))
}
