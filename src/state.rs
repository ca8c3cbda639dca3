use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    config::PipelineConfig,
    services::{
        storage_service::StorageService,
        thumbnail_service::{ThumbnailCreator, ThumbnailLister},
    },
};

/// Shared handles given to every request. Nothing here is mutated after
/// startup.
#[derive(Clone)]
pub struct AppState {
    pub storage: StorageService,
    pub creator: Arc<ThumbnailCreator>,
    pub lister: Arc<ThumbnailLister>,
    pub pipeline: PipelineConfig,
}

impl FromRef<AppState> for StorageService {
    fn from_ref(state: &AppState) -> Self {
        state.storage.clone()
    }
}

impl FromRef<AppState> for Arc<ThumbnailCreator> {
    fn from_ref(state: &AppState) -> Self {
        state.creator.clone()
    }
}

impl FromRef<AppState> for Arc<ThumbnailLister> {
    fn from_ref(state: &AppState) -> Self {
        state.lister.clone()
    }
}
