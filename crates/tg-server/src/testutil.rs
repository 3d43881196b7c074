//! Shared test doubles for the pipeline adapter seam.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgb, RgbImage};

use tg_core::{AssetBundle, GaussianCloud, GenerationParams, MeshSummary, OutputFormat};
use tg_core::gaussian_cloud::GaussianPoint;

use crate::pipeline::{PipelineError, PipelineHealth, TextTo3d};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    Generate,
    Bake,
    Render,
}

/// Deterministic in-process pipeline: output derives only from the seed, every
/// call is logged, and overlap between `generate` calls is tracked so tests
/// can prove the pipeline lock holds.
#[derive(Default)]
pub struct MockPipeline {
    failure: Option<FailureMode>,
    delay: Option<Duration>,
    log: Mutex<Vec<String>>,
    seeds: Mutex<Vec<u64>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    generate_count: AtomicUsize,
    flush_count: AtomicUsize,
}

impl MockPipeline {
    pub fn with_failure(mode: FailureMode) -> Self {
        Self {
            failure: Some(mode),
            ..Default::default()
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn call_log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn seen_seeds(&self) -> Vec<u64> {
        self.seeds.lock().unwrap().clone()
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_count.load(Ordering::SeqCst)
    }

    pub fn flush_calls(&self) -> usize {
        self.flush_count.load(Ordering::SeqCst)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn record(&self, event: &str) {
        self.log.lock().unwrap().push(event.to_string());
    }
}

#[async_trait]
impl TextTo3d for MockPipeline {
    async fn ensure_loaded(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn generate(
        &self,
        _prompt: &str,
        _params: &GenerationParams,
        seed: u64,
    ) -> Result<AssetBundle, PipelineError> {
        self.record("generate:enter");
        self.generate_count.fetch_add(1, Ordering::SeqCst);
        self.seeds.lock().unwrap().push(seed);

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.record("generate:exit");

        if self.failure == Some(FailureMode::Generate) {
            return Err(PipelineError::Failed("sampling diverged".into()));
        }

        // Structurally seed-determined output.
        let anchor = (seed % 1000) as f32;
        Ok(AssetBundle {
            session: format!("session-{seed}"),
            gaussians: vec![GaussianCloud::new(vec![GaussianPoint {
                position: [anchor, -anchor, 0.5],
                opacity: 0.8,
                ..Default::default()
            }])],
            meshes: vec![MeshSummary {
                vertices: 8,
                faces: 12,
            }],
        })
    }

    async fn bake_glb(
        &self,
        session: &str,
        _simplify_ratio: f32,
        _texture_size: u32,
    ) -> Result<Vec<u8>, PipelineError> {
        self.record("bake_glb");
        if self.failure == Some(FailureMode::Bake) {
            return Err(PipelineError::Failed("texture baking failed".into()));
        }
        Ok(format!("glTF:{session}").into_bytes())
    }

    async fn render_views(
        &self,
        _session: &str,
        format: OutputFormat,
        _num_frames: u32,
    ) -> Result<Vec<RgbImage>, PipelineError> {
        self.record("render_views");
        if self.failure == Some(FailureMode::Render) {
            return Err(PipelineError::Failed("rasterizer crashed".into()));
        }
        let shade = match format {
            OutputFormat::Gaussian => 64,
            OutputFormat::Mesh => 192,
        };
        Ok(vec![RgbImage::from_pixel(4, 4, Rgb([shade; 3])); 2])
    }

    async fn encode_video(&self, frames: &[RgbImage], fps: u32) -> Result<Vec<u8>, PipelineError> {
        self.record("encode_video");
        Ok(format!("mp4:{}x{fps}", frames.len()).into_bytes())
    }

    async fn release_memory(&self) -> Result<(), PipelineError> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn health(&self) -> PipelineHealth {
        PipelineHealth {
            gpu_available: true,
            model_loaded: true,
        }
    }
}
