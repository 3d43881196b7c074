use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tg_core::GenerationParams;

/// Body of `POST /generate`. Everything except the prompt is optional and
/// defaulted by [`GenerationParams`].
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(flatten)]
    pub params: GenerationParams,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub num_gaussians: usize,
    pub num_meshes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerateResponse {
    pub job_id: String,
    pub status: String,
    pub message: String,
    pub prompt: String,
    pub seed: u64,
    pub generation_time_seconds: f64,
    /// Format key to download URL, relative to the API base.
    pub files: BTreeMap<String, String>,
    pub model_info: ModelInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub gpu_available: bool,
    pub model_loaded: bool,
    pub timestamp: String,
}
