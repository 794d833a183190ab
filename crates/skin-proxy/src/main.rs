//! Skin proxy - batched and cached Mojang textures over HTTP
//!
//! Resolves player names to their signed Mojang profiles while keeping the
//! number of calls to the Mojang API as low as possible.

mod config;
mod error;
mod pipeline;
mod server;
mod store;
mod types;

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::MojangPipeline;
use crate::server::{start_server, ServerState, SharedState};
use crate::store::PgUuidStore;
use mojang_api::MojangClient;
use mojang_textures::{MemoryUuidStore, NilProfilesProvider, UuidStore};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("skin_proxy=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting skin proxy...");

    let config = Config::from_env()?;
    info!("Port: {}", config.port);
    info!("Mojang textures enabled: {}", config.textures_enabled);

    let mut pg_store = None;
    let pipeline = if config.textures_enabled {
        info!("Batch UUIDs URL: {}", config.batch_uuids_url);
        info!("Profile URL: {}", config.profile_url);
        info!(
            "Queue: {} usernames every {} ms (fire on full: {})",
            config.queue.batch_size,
            config.queue.delay.as_millis(),
            config.queue.fire_on_full
        );

        let store: Arc<dyn UuidStore> = match &config.database_url {
            Some(database_url) => {
                let store = Arc::new(PgUuidStore::connect(database_url).await?);
                pg_store = Some(store.clone());
                store
            }
            None => {
                warn!("DATABASE_URL not set, UUIDs are only cached in memory");
                Arc::new(MemoryUuidStore::new())
            }
        };

        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        let client =
            MojangClient::with_endpoints(http, &config.batch_uuids_url, &config.profile_url);

        let pipeline = Arc::new(MojangPipeline::new(client, store, config.queue.clone()));
        pipeline.start()?;
        Some(pipeline)
    } else {
        None
    };

    let state: SharedState = Arc::new(match &pipeline {
        Some(pipeline) => ServerState::new(pipeline.provider(), Some(pipeline.clone())),
        None => ServerState::new(Arc::new(NilProfilesProvider), None),
    });

    // Start HTTP server (blocking until a shutdown signal)
    let served = start_server(state, config.port, shutdown_signal()).await;

    if let Some(pipeline) = &pipeline {
        pipeline.shutdown();
    }
    if let Some(store) = &pg_store {
        store.close().await;
    }

    served?;
    info!("Skin proxy stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
