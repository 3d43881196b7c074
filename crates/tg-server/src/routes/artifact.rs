use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn download(
    State(state): State<Arc<AppState>>,
    Path((job_id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let bytes = state.store.get(&job_id, &filename).await?;
    let headers = [
        (header::CONTENT_TYPE, media_type(&filename)),
        (header::CONTENT_DISPOSITION, "attachment"),
    ];
    Ok((headers, bytes).into_response())
}

fn media_type(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("glb") => "model/gltf-binary",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}
