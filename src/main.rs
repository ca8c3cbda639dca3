use anyhow::Result;
use axum::Router;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use services::{
    metadata_table::SqliteMetadataTable,
    notifications,
    storage_service::StorageService,
    thumbnail_service::{ThumbnailCreator, ThumbnailLister},
    traits::{MetadataTable, ObjectStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting thumbnail-service with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db_path = cfg
        .database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    let db = Arc::new(db::connect(&cfg.database_url).await?);

    db::run_migrations(&db).await?;
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    // --- Collaborators ---
    let (events_tx, events_rx) = notifications::channel();
    let storage = StorageService::new(db.clone(), cfg.storage_dir.clone(), &cfg.endpoint)
        .with_notifications(events_tx);

    let table = SqliteMetadataTable::new(
        db.clone(),
        &cfg.pipeline.table_name,
        &cfg.pipeline.region_name,
        cfg.scan_page_size,
    );
    table.ensure_table().await?;
    let table: Arc<dyn MetadataTable> = Arc::new(table);
    let store: Arc<dyn ObjectStore> = Arc::new(storage.clone());

    // --- Handlers ---
    let creator = Arc::new(ThumbnailCreator::new(
        cfg.pipeline.clone(),
        store,
        table.clone(),
    ));
    let lister = Arc::new(ThumbnailLister::new(cfg.pipeline.clone(), table));
    tokio::spawn(notifications::dispatch(events_rx, creator.clone()));

    let app_state = state::AppState {
        storage,
        creator,
        lister,
        pipeline: cfg.pipeline.clone(),
    };
    let app: Router = routes::routes::routes().with_state(app_state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
