use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use tg_core::GenerationParams;
use tg_core::params::FieldError;

use crate::error::ApiError;
use crate::export;
use crate::pipeline::{TextTo3d, resolve_seed};
use crate::schemas::{GenerateResponse, ModelInfo};
use crate::store::{ArtifactStore, JobManifest};

/// Drives one job end to end: validate, generate, export, persist.
///
/// The pipeline instance is a single shared accelerator-resident resource, so
/// jobs queue FIFO behind a one-permit semaphore; a busy server queues rather
/// than rejects. A failed or timed-out job leaves no artifact directory
/// behind.
#[derive(Clone)]
pub struct Orchestrator {
    pipeline: Arc<dyn TextTo3d>,
    store: ArtifactStore,
    gpu: Arc<Semaphore>,
    job_timeout: Duration,
}

impl Orchestrator {
    pub fn new(pipeline: Arc<dyn TextTo3d>, store: ArtifactStore, job_timeout: Duration) -> Self {
        Self {
            pipeline,
            store,
            gpu: Arc::new(Semaphore::new(1)),
            job_timeout,
        }
    }

    pub async fn submit(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<GenerateResponse, ApiError> {
        if prompt.trim().is_empty() {
            return Err(ApiError::Validation(vec![FieldError::new(
                "prompt",
                "must not be empty",
            )]));
        }
        params.validate().map_err(ApiError::Validation)?;

        let job_id = Uuid::new_v4().to_string();
        let seed = resolve_seed(params.seed);
        let started = Instant::now();

        // Tokio semaphores hand out permits in arrival order, which is the
        // FIFO queue the pipeline lock requires.
        let _permit = self
            .gpu
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ApiError::Unavailable("server is shutting down".into()))?;

        info!(job_id, prompt, seed, "job started");

        let outcome = match timeout(
            self.job_timeout,
            self.run_job(&job_id, prompt, params, seed),
        )
        .await
        {
            Ok(Ok(success)) => Ok(success),
            Ok(Err(err)) => {
                self.discard(&job_id).await;
                Err(err)
            }
            Err(_elapsed) => {
                self.discard(&job_id).await;
                Err(ApiError::Timeout(self.job_timeout.as_secs()))
            }
        };

        // Bound peak accelerator memory across a long-running process.
        if let Err(err) = self.pipeline.release_memory().await {
            warn!(job_id, error = %err, "accelerator cache flush failed");
        }

        let (files, model_info) = outcome?;
        let elapsed = started.elapsed().as_secs_f64();
        info!(job_id, elapsed, "job succeeded");

        Ok(GenerateResponse {
            job_id,
            status: "success".to_string(),
            message: "3D asset generated successfully".to_string(),
            prompt: prompt.to_string(),
            seed,
            generation_time_seconds: elapsed,
            files,
            model_info,
        })
    }

    async fn run_job(
        &self,
        job_id: &str,
        prompt: &str,
        params: &GenerationParams,
        seed: u64,
    ) -> Result<(BTreeMap<String, String>, ModelInfo), ApiError> {
        self.store
            .create(&JobManifest {
                job_id: job_id.to_string(),
                prompt: prompt.to_string(),
                seed,
                created_at: Utc::now(),
                in_progress: true,
            })
            .await?;

        let bundle = self.pipeline.generate(prompt, params, seed).await?;

        let mut files = BTreeMap::new();
        for format in &params.formats {
            let filename =
                export::export_format(self.pipeline.as_ref(), &self.store, job_id, &bundle, *format, params)
                    .await?;
            files.insert(
                format.key().to_string(),
                format!("/files/{job_id}/{filename}"),
            );
        }

        if params.generate_video {
            // A preview that fails to render is a degraded success, not a
            // failed job.
            match export::export_preview(self.pipeline.as_ref(), &self.store, job_id, &bundle, params)
                .await
            {
                Ok(Some(filename)) => {
                    files.insert("preview".to_string(), format!("/files/{job_id}/{filename}"));
                }
                Ok(None) => {}
                Err(err) => warn!(job_id, error = %err, "preview video skipped"),
            }
        }

        self.store.finalize(job_id).await?;

        Ok((
            files,
            ModelInfo {
                num_gaussians: bundle.gaussian_count(),
                num_meshes: bundle.mesh_count(),
            },
        ))
    }

    async fn discard(&self, job_id: &str) {
        if let Err(err) = self.store.purge(job_id).await {
            warn!(job_id, error = %err, "failed to purge artifacts of failed job");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FailureMode, MockPipeline};
    use tg_core::OutputFormat;

    fn orchestrator(pipeline: Arc<MockPipeline>, store: ArtifactStore) -> Orchestrator {
        Orchestrator::new(pipeline, store, Duration::from_secs(5))
    }

    async fn fresh_store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_success_writes_exactly_requested_formats() {
        let (_dir, store) = fresh_store().await;
        let pipeline = Arc::new(MockPipeline::default());
        let orch = orchestrator(pipeline, store.clone());

        let params = GenerationParams {
            formats: vec![OutputFormat::Gaussian],
            generate_video: false,
            ..Default::default()
        };
        let response = orch.submit("a red chair", &params).await.unwrap();

        assert_eq!(response.status, "success");
        assert_eq!(response.files.len(), 1);
        assert!(response.files["gaussian"].ends_with("/model.ply"));
        assert!(store.get(&response.job_id, "model.ply").await.is_ok());
        // Unrequested formats must not leave files behind.
        assert!(store.get(&response.job_id, "model.glb").await.is_err());
        assert!(store.get(&response.job_id, "preview.mp4").await.is_err());

        let manifest = store.read_manifest(&response.job_id).await.unwrap();
        assert!(!manifest.in_progress);
        assert_eq!(manifest.seed, response.seed);
    }

    #[tokio::test]
    async fn test_both_formats_and_preview() {
        let (_dir, store) = fresh_store().await;
        let pipeline = Arc::new(MockPipeline::default());
        let orch = orchestrator(pipeline, store.clone());

        let response = orch
            .submit("a vase", &GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(
            response.files.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["gaussian", "mesh", "preview"]
        );
        assert!(store.get(&response.job_id, "model.glb").await.is_ok());
        assert!(store.get(&response.job_id, "preview.mp4").await.is_ok());
        assert_eq!(response.model_info.num_gaussians, 1);
        assert_eq!(response.model_info.num_meshes, 1);
    }

    #[tokio::test]
    async fn test_explicit_seed_is_echoed_and_deterministic() {
        let (_dir, store) = fresh_store().await;
        let pipeline = Arc::new(MockPipeline::default());
        let orch = orchestrator(pipeline.clone(), store);

        let params = GenerationParams {
            seed: Some(1234),
            formats: vec![OutputFormat::Gaussian],
            generate_video: false,
            ..Default::default()
        };
        let first = orch.submit("a lamp", &params).await.unwrap();
        let second = orch.submit("a lamp", &params).await.unwrap();

        assert_eq!(first.seed, 1234);
        assert_eq!(second.seed, 1234);
        let seeds = pipeline.seen_seeds();
        assert_eq!(seeds, vec![1234, 1234]);
    }

    #[tokio::test]
    async fn test_random_seed_is_reported() {
        let (_dir, store) = fresh_store().await;
        let pipeline = Arc::new(MockPipeline::default());
        let orch = orchestrator(pipeline.clone(), store);

        let params = GenerationParams {
            formats: vec![OutputFormat::Gaussian],
            generate_video: false,
            ..Default::default()
        };
        let response = orch.submit("a boat", &params).await.unwrap();
        assert_eq!(pipeline.seen_seeds(), vec![response.seed]);
    }

    #[tokio::test]
    async fn test_validation_rejects_before_pipeline() {
        let (_dir, store) = fresh_store().await;
        let pipeline = Arc::new(MockPipeline::default());
        let orch = orchestrator(pipeline.clone(), store);

        let params = GenerationParams {
            ss_steps: 99,
            ..Default::default()
        };
        let err = orch.submit("a dog", &params).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(pipeline.generate_calls(), 0);

        let err = orch
            .submit("   ", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(pipeline.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_no_directory() {
        let (_dir, store) = fresh_store().await;
        let pipeline = Arc::new(MockPipeline::with_failure(FailureMode::Generate));
        let orch = orchestrator(pipeline, store.clone());

        let err = orch
            .submit("a cat", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Generation(_)));

        let leftovers = store
            .list_expired(Utc::now() + chrono::TimeDelta::days(365), Duration::ZERO)
            .await
            .unwrap();
        assert!(leftovers.is_empty(), "no directory may survive a failure");
    }

    #[tokio::test]
    async fn test_export_failure_leaves_no_directory() {
        let (_dir, store) = fresh_store().await;
        let pipeline = Arc::new(MockPipeline::with_failure(FailureMode::Bake));
        let orch = orchestrator(pipeline, store.clone());

        let params = GenerationParams {
            formats: vec![OutputFormat::Mesh],
            generate_video: false,
            ..Default::default()
        };
        let err = orch.submit("a table", &params).await.unwrap_err();
        assert!(matches!(err, ApiError::Export(_)));

        let mut entries = tokio::fs::read_dir(store.root()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_timeout_marks_failure_and_purges() {
        let (_dir, store) = fresh_store().await;
        let pipeline = Arc::new(MockPipeline::with_delay(Duration::from_secs(60)));
        let orch = Orchestrator::new(pipeline, store.clone(), Duration::from_millis(50));

        let err = orch
            .submit("a slow asset", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Timeout(_)));

        let mut entries = tokio::fs::read_dir(store.root()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_preview_failure_degrades_instead_of_failing() {
        let (_dir, store) = fresh_store().await;
        let pipeline = Arc::new(MockPipeline::with_failure(FailureMode::Render));
        let orch = orchestrator(pipeline, store.clone());

        let response = orch
            .submit("a plant", &GenerationParams::default())
            .await
            .unwrap();
        assert!(!response.files.contains_key("preview"));
        assert!(store.get(&response.job_id, "model.ply").await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_jobs_never_interleave_pipeline_calls() {
        let (_dir, store) = fresh_store().await;
        let pipeline = Arc::new(MockPipeline::with_delay(Duration::from_millis(30)));
        let orch = orchestrator(pipeline.clone(), store);

        let params = GenerationParams {
            formats: vec![OutputFormat::Gaussian],
            generate_video: false,
            ..Default::default()
        };
        let (a, b) = tokio::join!(
            orch.submit("first", &params),
            orch.submit("second", &params)
        );
        a.unwrap();
        b.unwrap();

        // Every enter must be followed by its own exit before the next enter.
        let log = pipeline.call_log();
        assert_eq!(log.len(), 4);
        assert_eq!(log[0], "generate:enter");
        assert_eq!(log[1], "generate:exit");
        assert_eq!(log[2], "generate:enter");
        assert_eq!(log[3], "generate:exit");
        assert_eq!(pipeline.max_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_cache_flush_runs_on_failure_too() {
        let (_dir, store) = fresh_store().await;
        let pipeline = Arc::new(MockPipeline::with_failure(FailureMode::Generate));
        let orch = orchestrator(pipeline.clone(), store);

        let _ = orch.submit("a cat", &GenerationParams::default()).await;
        assert_eq!(pipeline.flush_calls(), 1);
    }
}
