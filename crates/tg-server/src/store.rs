use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;
use tracing::warn;

/// Per-job manifest, written before any artifact.
///
/// `created_at` is the authoritative age of the directory; the sweeper never
/// falls back to filesystem mtime. `in_progress` guards a directory that an
/// active job is still writing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobManifest {
    pub job_id: String,
    pub prompt: String,
    pub seed: u64,
    pub created_at: DateTime<Utc>,
    pub in_progress: bool,
}

pub const MANIFEST_FILE: &str = "job.json";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("artifact not found")]
    NotFound,

    #[error("corrupt manifest: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// On-disk artifact store: one directory per job id under a fixed root.
/// Directory presence and the manifest are the only persisted state.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub async fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    /// Create the job directory and write its manifest.
    pub async fn create(&self, manifest: &JobManifest) -> Result<(), StoreError> {
        let dir = self.job_dir(&manifest.job_id);
        fs::create_dir_all(&dir).await?;
        let body = serde_json::to_vec_pretty(manifest)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        fs::write(dir.join(MANIFEST_FILE), body).await?;
        Ok(())
    }

    /// Write one artifact file. The job directory must already exist.
    pub async fn put(
        &self,
        job_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, StoreError> {
        let path = self.artifact_path(job_id, filename)?;
        fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Read an artifact back. Unknown job, unknown filename and the manifest
    /// itself all answer `NotFound`.
    pub async fn get(&self, job_id: &str, filename: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.artifact_path(job_id, filename)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// Clear the in-progress flag once every artifact is on disk.
    pub async fn finalize(&self, job_id: &str) -> Result<(), StoreError> {
        let mut manifest = self.read_manifest(job_id).await?;
        manifest.in_progress = false;
        let body = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        fs::write(self.job_dir(job_id).join(MANIFEST_FILE), body).await?;
        Ok(())
    }

    pub async fn read_manifest(&self, job_id: &str) -> Result<JobManifest, StoreError> {
        let path = self.job_dir(job_id).join(MANIFEST_FILE);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound);
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    /// Remove the whole job directory. A no-op for unknown or already purged
    /// jobs.
    pub async fn purge(&self, job_id: &str) -> io::Result<()> {
        match fs::remove_dir_all(self.job_dir(job_id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Job ids whose manifest age exceeds `ttl` at `now`.
    ///
    /// In-progress directories are never listed, and directories without a
    /// readable manifest are skipped rather than guessed at by mtime.
    pub async fn list_expired(
        &self,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> io::Result<Vec<String>> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::MAX);
        let mut expired = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let job_id = entry.file_name().to_string_lossy().into_owned();
            let manifest = match self.read_manifest(&job_id).await {
                Ok(manifest) => manifest,
                Err(err) => {
                    warn!(job_id, error = %err, "skipping job directory without readable manifest");
                    continue;
                }
            };
            if manifest.in_progress {
                continue;
            }
            if now - manifest.created_at > ttl {
                expired.push(job_id);
            }
        }

        Ok(expired)
    }

    fn artifact_path(&self, job_id: &str, filename: &str) -> Result<PathBuf, StoreError> {
        if !is_safe_component(job_id) || !is_safe_component(filename) || filename == MANIFEST_FILE {
            return Err(StoreError::NotFound);
        }
        Ok(self.job_dir(job_id).join(filename))
    }
}

/// Single path component: no separators, no traversal.
fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}
