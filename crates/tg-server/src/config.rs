use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

/// Server configuration, loaded from the environment once at startup.
///
/// `device`, `spconv_algo` and `attn_backend` are opaque pass-through knobs
/// handed to the pipeline worker at load time; the server never interprets
/// them.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub artifact_root: PathBuf,
    pub worker_url: String,
    pub retention: Duration,
    pub sweep_interval: Duration,
    pub job_timeout: Duration,
    pub device: String,
    pub spconv_algo: String,
    pub attn_backend: Option<String>,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        // Optional .env for local runs; real deployments set the environment.
        let _ = dotenvy::dotenv();

        Ok(Self {
            port: parse_var("PORT", 8000)?,
            artifact_root: env::var("TG_ARTIFACT_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("trellis_gateway")),
            worker_url: env::var("TG_WORKER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5000".to_string()),
            retention: Duration::from_secs(parse_var("TG_RETENTION_SECS", 3600)?),
            sweep_interval: Duration::from_secs(parse_var("TG_SWEEP_INTERVAL_SECS", 300)?),
            job_timeout: Duration::from_secs(parse_var("TG_JOB_TIMEOUT_SECS", 600)?),
            device: env::var("TG_DEVICE").unwrap_or_else(|_| "cuda".to_string()),
            // Recommended for single runs, per the upstream pipeline.
            spconv_algo: env::var("SPCONV_ALGO").unwrap_or_else(|_| "native".to_string()),
            attn_backend: env::var("ATTN_BACKEND").ok(),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{name} must be a number, got {raw:?}")),
        Err(_) => Ok(default),
    }
}
