//! Core data models for the thumbnail pipeline.
//!
//! Buckets and objects describe what the object store holds, events carry
//! object-created notifications, and thumbnail records are the rows kept in
//! the metadata table. Row types map to SQLite via `sqlx::FromRow` and
//! serialize as JSON via `serde`.

pub mod bucket;
pub mod event;
pub mod object;
pub mod response;
pub mod thumbnail_record;
