use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use crate::error::ApiError;
use crate::schemas::{GenerateRequest, GenerateResponse};
use crate::state::AppState;

pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let response = state
        .orchestrator
        .submit(&request.prompt, &request.params)
        .await?;
    Ok(Json(response))
}
