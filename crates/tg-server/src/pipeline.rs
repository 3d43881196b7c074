use async_trait::async_trait;
use image::RgbImage;
use rand::Rng;
use thiserror::Error;

use tg_core::params::MAX_SEED;
use tg_core::{AssetBundle, GenerationParams, OutputFormat};

mod schemas;
pub mod worker;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    ResourceExhausted(String),

    #[error("{0}")]
    Failed(String),
}

/// What `/health` reports about the wrapped pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineHealth {
    pub gpu_available: bool,
    pub model_loaded: bool,
}

/// The external text-to-3D pipeline as a uniform capability.
///
/// `generate` runs both sampling stages and pulls gaussian clouds into the
/// process; `bake_glb`, `render_views` and `encode_video` are the black-box
/// post-processing transforms, addressed through the bundle's session handle.
///
/// The trait itself carries no locking. Callers must serialize `generate` and
/// the session-bound calls; the orchestrator holds a single-permit semaphore
/// for the whole job.
#[async_trait]
pub trait TextTo3d: Send + Sync {
    /// Make the model resident on the accelerator. Idempotent; called eagerly
    /// at startup and again lazily if the first attempt failed.
    async fn ensure_loaded(&self) -> Result<(), PipelineError>;

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
        seed: u64,
    ) -> Result<AssetBundle, PipelineError>;

    async fn bake_glb(
        &self,
        session: &str,
        simplify_ratio: f32,
        texture_size: u32,
    ) -> Result<Vec<u8>, PipelineError>;

    /// Rotating-view frames for one representation family of the session.
    async fn render_views(
        &self,
        session: &str,
        format: OutputFormat,
        num_frames: u32,
    ) -> Result<Vec<RgbImage>, PipelineError>;

    async fn encode_video(&self, frames: &[RgbImage], fps: u32) -> Result<Vec<u8>, PipelineError>;

    /// Flush accelerator caches. Invoked after every job, success or failure,
    /// to bound peak memory across a long-running process.
    async fn release_memory(&self) -> Result<(), PipelineError>;

    async fn health(&self) -> PipelineHealth;
}

/// Resolve the seed for a job: the caller's if given, otherwise a fresh random
/// one. Always reported back so a run is reproducible after the fact.
pub fn resolve_seed(requested: Option<u64>) -> u64 {
    requested.unwrap_or_else(|| rand::thread_rng().gen_range(0..=MAX_SEED))
}
