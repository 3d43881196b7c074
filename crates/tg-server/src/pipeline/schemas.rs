//! Wire types for the pipeline worker's HTTP API. Binary payloads travel as
//! base64 fields inside JSON.

use serde::{Deserialize, Serialize};

use tg_core::MeshSummary;

#[derive(Debug, Clone, Serialize)]
pub struct LoadRequest<'a> {
    pub device: &'a str,
    pub spconv_algo: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attn_backend: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunRequest<'a> {
    pub prompt: &'a str,
    pub seed: u64,
    pub ss_steps: u32,
    pub ss_cfg_strength: f32,
    pub slat_steps: u32,
    pub slat_cfg_strength: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunResponse {
    pub session: String,
    #[serde(default)]
    pub gaussian_ply_b64: Vec<String>,
    #[serde(default)]
    pub meshes: Vec<MeshSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BakeGlbRequest<'a> {
    pub session: &'a str,
    pub simplify_ratio: f32,
    pub texture_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BakeGlbResponse {
    pub glb_b64: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderRequest<'a> {
    pub session: &'a str,
    /// "gaussian" renders the color pass, "mesh" the normal pass.
    pub kind: &'a str,
    pub num_frames: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderResponse {
    /// PNG-encoded frames.
    pub frames_b64: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EncodeRequest {
    pub frames_b64: Vec<String>,
    pub fps: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncodeResponse {
    pub mp4_b64: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkerHealth {
    #[serde(default)]
    pub gpu_available: bool,
    #[serde(default)]
    pub model_loaded: bool,
}

/// Error body the worker returns alongside a non-2xx status.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerError {
    #[serde(default)]
    pub error: String,
}
