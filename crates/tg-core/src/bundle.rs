use crate::gaussian_cloud::GaussianCloud;
use crate::mesh::MeshSummary;
use crate::params::OutputFormat;

/// In-memory result of one pipeline run.
///
/// Gaussian clouds are pulled into the process so they can be serialized
/// locally; meshes stay worker-resident (GLB baking and view rendering are
/// black-box transforms) and are referenced through `session`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetBundle {
    /// Worker-side handle for post-processing calls against this run's outputs.
    pub session: String,
    pub gaussians: Vec<GaussianCloud>,
    pub meshes: Vec<MeshSummary>,
}

impl AssetBundle {
    /// Whether the bundle holds at least one representation of the family.
    pub fn has(&self, format: OutputFormat) -> bool {
        match format {
            OutputFormat::Gaussian => !self.gaussians.is_empty(),
            OutputFormat::Mesh => !self.meshes.is_empty(),
        }
    }

    pub fn gaussian_count(&self) -> usize {
        self.gaussians.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}
