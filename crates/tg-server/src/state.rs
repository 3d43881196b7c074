use std::sync::Arc;

use crate::orchestrator::Orchestrator;
use crate::pipeline::TextTo3d;
use crate::store::ArtifactStore;

/// Shared handler state: the orchestrator for submissions, the store for
/// downloads, and the pipeline for health.
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub store: ArtifactStore,
    pub pipeline: Arc<dyn TextTo3d>,
}
