mod config;
mod error;
mod routes;

use std::sync::Arc;

use chatnote_core::services::SyncStore;
use chatnote_core::sink::HttpNoteSink;
use chatnote_core::sync::SyncEngine;
use chatnote_core::watch::FolderWatcher;
use config::{ApiConfig, ConfigError};
use routes::{app_router, AppState};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("chatnote_api=info,chatnote_core=info")
            }),
        )
        .init();

    let config = ApiConfig::from_env()?;
    tracing::info!("Starting chatnote-api with config: {:?}", config);

    let notes = config
        .notes()
        .ok_or(ConfigError::MissingVar("NOTES_API_URL"))?;
    let sink = HttpNoteSink::new(&notes.base_url, &notes.token, &notes.notebook)?;
    if let Err(error) = sink.check_connection().await {
        tracing::warn!(base_url = %sink.base_url(), "Notes service health check failed: {error}");
    }

    let store = SyncStore::open_path(&config.app.db_path).await?;
    let engine = SyncEngine::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(sink),
        config.app.engine_config(),
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let watcher = if config.watch {
        let watcher = FolderWatcher::new(
            config.app.watch_path.clone(),
            config.app.file_filter(),
            engine.clone(),
        );
        let mut stop_rx = stop_rx;
        Some(tokio::spawn(watcher.run(async move {
            let _ = stop_rx.changed().await;
        })))
    } else {
        None
    };

    let router = app_router(AppState::new(engine));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("chatnote-api listening on {}", config.bind_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = stop_tx.send(true);
    if let Some(handle) = watcher {
        match handle.await {
            Ok(Ok(report)) => tracing::info!(
                created = report.created,
                updated = report.updated,
                skipped = report.skipped,
                failed = report.failed,
                "Folder watcher stopped"
            ),
            Ok(Err(error)) => tracing::error!("Folder watcher failed: {error}"),
            Err(error) => tracing::error!("Folder watcher task failed: {error}"),
        }
    }

    store.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl-C: {error}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
