use anyhow::Result;
use modelctl_core::monitor::HttpTelemetrySource;
use modelctl_core::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::state::AppState;

pub async fn run_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.daemon.host, config.daemon.port).parse()?;
    let state = Arc::new(AppState::from_config(&config)?);

    let cache_path = Config::registry_cache_path()?;
    match state.registry.restore_cache(&cache_path).await {
        Ok(restored) => tracing::info!("Restored {} model statuses from {:?}", restored, cache_path),
        Err(e) => tracing::warn!("Ignoring registry cache {:?}: {}", cache_path, e),
    }

    let ingestion = match &config.monitor.telemetry_url {
        Some(url) => {
            let source = Arc::new(HttpTelemetrySource::new(url)?);
            tracing::info!("Sampling telemetry from {} every {:?}", url, config.monitor.sample_interval());
            Some(state.monitor.spawn_ingestion(source, config.monitor.sample_interval()))
        }
        None => {
            tracing::info!("No telemetry_url configured; expecting pushed samples");
            None
        }
    };

    let idle_unloader = config.runtime.idle_unload_after().map(|max_age| {
        tracing::info!("Unloading models idle for more than {:?}", max_age);
        state
            .loader
            .spawn_idle_unloader(max_age, max_age.min(Duration::from_secs(60)))
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::routes(state.clone())
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Starting daemon on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    for handle in [ingestion, idle_unloader].into_iter().flatten() {
        handle.abort();
    }
    state.downloads.shutdown().await;
    state.registry.save_cache(&cache_path).await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
