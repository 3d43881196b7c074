mod config;
mod error;
mod export;
mod orchestrator;
mod pipeline;
mod routes;
mod schemas;
mod state;
mod store;
mod sweeper;
#[cfg(test)]
mod testutil;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::pipeline::TextTo3d;
use crate::pipeline::worker::WorkerPipeline;
use crate::state::AppState;
use crate::store::ArtifactStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    info!(?config, "starting trellis gateway");

    let store = ArtifactStore::open(&config.artifact_root).await?;
    info!(root = %store.root().display(), "artifact store ready");

    let pipeline: Arc<dyn TextTo3d> = Arc::new(WorkerPipeline::new(
        config.worker_url.as_str(),
        config.device.as_str(),
        config.spconv_algo.as_str(),
        config.attn_backend.clone(),
    ));

    // Eager load so the first request does not pay the model warm-up. Failure
    // keeps the server up but unhealthy; loading is retried on first use.
    if let Err(err) = pipeline.ensure_loaded().await {
        warn!(error = %err, "pipeline not loaded at startup, will retry on first request");
    }

    let orchestrator = Orchestrator::new(pipeline.clone(), store.clone(), config.job_timeout);
    sweeper::spawn(store.clone(), config.sweep_interval, config.retention);

    let state = Arc::new(AppState {
        orchestrator,
        store,
        pipeline,
    });

    let app = routes::api_routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to install shutdown handler");
    }
    info!("shutting down");
}
