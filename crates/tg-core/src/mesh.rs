use serde::{Deserialize, Serialize};

/// Geometry counts for one generated mesh, carried into response metadata.
/// The mesh data itself stays on the pipeline worker until GLB export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshSummary {
    pub vertices: u32,
    pub faces: u32,
}
