use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{ImageFormat, RgbImage};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use tg_core::{AssetBundle, GaussianCloud, GenerationParams, OutputFormat};

use super::schemas::{
    BakeGlbRequest, BakeGlbResponse, EncodeRequest, EncodeResponse, LoadRequest, RenderRequest,
    RenderResponse, RunRequest, RunResponse, WorkerError, WorkerHealth,
};
use super::{PipelineError, PipelineHealth, TextTo3d};

/// Pipeline adapter backed by the TRELLIS worker process over HTTP.
///
/// The model is loaded into accelerator memory exactly once per process; the
/// `OnceCell` retries on the next call if a load attempt failed.
pub struct WorkerPipeline {
    http: reqwest::Client,
    base_url: String,
    loaded: OnceCell<()>,
    model_loaded: AtomicBool,
    device: String,
    spconv_algo: String,
    attn_backend: Option<String>,
}

impl WorkerPipeline {
    pub fn new(
        base_url: impl Into<String>,
        device: impl Into<String>,
        spconv_algo: impl Into<String>,
        attn_backend: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            loaded: OnceCell::new(),
            model_loaded: AtomicBool::new(false),
            device: device.into(),
            spconv_algo: spconv_algo.into(),
            attn_backend,
        }
    }

    async fn post<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, PipelineError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "pipeline worker call");

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| PipelineError::Unavailable(format!("worker unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<WorkerError>()
                .await
                .map(|e| e.error)
                .unwrap_or_default();
            return Err(classify_failure(status, detail));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| PipelineError::Failed(format!("malformed worker response: {e}")))
    }
}

/// Resource exhaustion is distinguished so partially allocated device memory
/// can be released and the caller told to retry with smaller parameters.
fn classify_failure(status: reqwest::StatusCode, detail: String) -> PipelineError {
    let detail = if detail.is_empty() {
        format!("worker returned HTTP {status}")
    } else {
        detail
    };
    if status == reqwest::StatusCode::INSUFFICIENT_STORAGE
        || detail.to_ascii_lowercase().contains("out of memory")
    {
        PipelineError::ResourceExhausted(detail)
    } else if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
        PipelineError::Unavailable(detail)
    } else {
        PipelineError::Failed(detail)
    }
}

fn decode_b64(field: &str, value: &str) -> Result<Vec<u8>, PipelineError> {
    BASE64
        .decode(value)
        .map_err(|e| PipelineError::Failed(format!("invalid base64 in {field}: {e}")))
}

#[async_trait]
impl TextTo3d for WorkerPipeline {
    async fn ensure_loaded(&self) -> Result<(), PipelineError> {
        self.loaded
            .get_or_try_init(|| async {
                info!(device = %self.device, "loading text-to-3D pipeline");
                self.post::<_, serde_json::Value>(
                    "/load",
                    &LoadRequest {
                        device: &self.device,
                        spconv_algo: &self.spconv_algo,
                        attn_backend: self.attn_backend.as_deref(),
                    },
                )
                .await?;
                self.model_loaded.store(true, Ordering::Release);
                info!("pipeline loaded");
                Ok(())
            })
            .await
            .copied()
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
        seed: u64,
    ) -> Result<AssetBundle, PipelineError> {
        self.ensure_loaded().await?;

        let response: RunResponse = self
            .post(
                "/run",
                &RunRequest {
                    prompt,
                    seed,
                    ss_steps: params.ss_steps,
                    ss_cfg_strength: params.ss_cfg_strength,
                    slat_steps: params.slat_steps,
                    slat_cfg_strength: params.slat_cfg_strength,
                },
            )
            .await?;

        let mut gaussians = Vec::with_capacity(response.gaussian_ply_b64.len());
        for encoded in &response.gaussian_ply_b64 {
            let bytes = decode_b64("gaussian_ply_b64", encoded)?;
            let cloud = GaussianCloud::from_ply_bytes(&bytes)
                .map_err(|e| PipelineError::Failed(format!("worker sent unreadable PLY: {e}")))?;
            gaussians.push(cloud);
        }

        Ok(AssetBundle {
            session: response.session,
            gaussians,
            meshes: response.meshes,
        })
    }

    async fn bake_glb(
        &self,
        session: &str,
        simplify_ratio: f32,
        texture_size: u32,
    ) -> Result<Vec<u8>, PipelineError> {
        let response: BakeGlbResponse = self
            .post(
                "/export/glb",
                &BakeGlbRequest {
                    session,
                    simplify_ratio,
                    texture_size,
                },
            )
            .await?;
        decode_b64("glb_b64", &response.glb_b64)
    }

    async fn render_views(
        &self,
        session: &str,
        format: OutputFormat,
        num_frames: u32,
    ) -> Result<Vec<RgbImage>, PipelineError> {
        let response: RenderResponse = self
            .post(
                "/render",
                &RenderRequest {
                    session,
                    kind: format.key(),
                    num_frames,
                },
            )
            .await?;

        let mut frames = Vec::with_capacity(response.frames_b64.len());
        for encoded in &response.frames_b64 {
            let bytes = decode_b64("frames_b64", encoded)?;
            let frame = image::load_from_memory(&bytes)
                .map_err(|e| PipelineError::Failed(format!("worker sent unreadable frame: {e}")))?
                .to_rgb8();
            frames.push(frame);
        }
        Ok(frames)
    }

    async fn encode_video(&self, frames: &[RgbImage], fps: u32) -> Result<Vec<u8>, PipelineError> {
        let mut frames_b64 = Vec::with_capacity(frames.len());
        for frame in frames {
            let mut png = Vec::new();
            frame
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .map_err(|e| PipelineError::Failed(format!("frame encode failed: {e}")))?;
            frames_b64.push(BASE64.encode(&png));
        }

        let response: EncodeResponse = self
            .post("/encode", &EncodeRequest { frames_b64, fps })
            .await?;
        decode_b64("mp4_b64", &response.mp4_b64)
    }

    async fn release_memory(&self) -> Result<(), PipelineError> {
        self.post::<_, serde_json::Value>("/flush", &serde_json::json!({}))
            .await?;
        Ok(())
    }

    async fn health(&self) -> PipelineHealth {
        let url = format!("{}/health", self.base_url);
        let worker = match self.http.get(&url).send().await {
            Ok(response) => response.json::<WorkerHealth>().await.unwrap_or_default(),
            Err(_) => return PipelineHealth::default(),
        };
        PipelineHealth {
            gpu_available: worker.gpu_available,
            model_loaded: worker.model_loaded && self.model_loaded.load(Ordering::Acquire),
        }
    }
}
