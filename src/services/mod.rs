//! Storage, metadata and thumbnail services.
//!
//! `traits` defines the collaborator seams the thumbnail handlers depend on;
//! `storage_service` and `metadata_table` are the SQLite/disk-backed
//! implementations wired up in `main`.

pub mod metadata_table;
pub mod notifications;
pub mod storage_service;
pub mod thumbnail_codec;
pub mod thumbnail_service;
pub mod traits;
