pub mod bundle;
pub mod error;
pub mod gaussian_cloud;
pub mod mesh;
pub mod params;

pub use bundle::AssetBundle;
pub use gaussian_cloud::GaussianCloud;
pub use mesh::MeshSummary;
pub use params::{GenerationParams, OutputFormat};
