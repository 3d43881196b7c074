use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use chrono::Utc;
use serde_json::{Value, json};

use crate::schemas::HealthResponse;
use crate::state::AppState;

mod artifact;
mod job;

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(service_index))
        .route("/health", get(health))
        .route("/generate", post(job::generate))
        .route("/files/{job_id}/{filename}", get(artifact::download))
}

async fn service_index() -> Json<Value> {
    Json(json!({
        "name": "trellis-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Generate 3D assets from text descriptions",
        "endpoints": {
            "/generate": "POST - Generate 3D model from text",
            "/health": "GET - Health check",
            "/files/{job_id}/{filename}": "GET - Download generated files",
        }
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let pipeline = state.pipeline.health().await;
    let (status, message) = if pipeline.model_loaded {
        ("healthy", "API is running")
    } else {
        ("unhealthy", "Pipeline not loaded")
    };
    Json(HealthResponse {
        status: status.to_string(),
        message: message.to_string(),
        gpu_available: pipeline.gpu_available,
        model_loaded: pipeline.model_loaded,
        timestamp: Utc::now().to_rfc3339(),
    })
}
