use serde::{Deserialize, Serialize};

/// Largest seed the generation pipeline accepts (i32 range on the worker side).
pub const MAX_SEED: u64 = i32::MAX as u64;

/// Output format families the pipeline can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Mesh,
    Gaussian,
}

impl OutputFormat {
    /// Key used in API responses and request format lists.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Mesh => "mesh",
            Self::Gaussian => "gaussian",
        }
    }

    /// On-disk artifact filename inside a job directory.
    pub fn filename(&self) -> &'static str {
        match self {
            Self::Mesh => "model.glb",
            Self::Gaussian => "model.ply",
        }
    }

    pub fn all() -> [OutputFormat; 2] {
        [Self::Mesh, Self::Gaussian]
    }
}

/// A single rejected field with the reason, surfaced verbatim in error bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl FieldError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Generation parameters for one job.
///
/// The sparse-structure and structured-latent stages are sampled independently,
/// so each carries its own step count and guidance strength. Every numeric
/// field is range-checked by [`GenerationParams::validate`] before it may reach
/// the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_formats")]
    pub formats: Vec<OutputFormat>,

    #[serde(default = "default_steps")]
    pub ss_steps: u32,
    #[serde(default = "default_cfg_strength")]
    pub ss_cfg_strength: f32,
    #[serde(default = "default_steps")]
    pub slat_steps: u32,
    #[serde(default = "default_cfg_strength")]
    pub slat_cfg_strength: f32,

    #[serde(default = "default_true")]
    pub generate_video: bool,
    #[serde(default = "default_video_frames")]
    pub video_frames: u32,
    #[serde(default = "default_video_fps")]
    pub video_fps: u32,

    #[serde(default = "default_simplify_ratio")]
    pub simplify_ratio: f32,
    #[serde(default = "default_texture_size")]
    pub texture_size: u32,
}

fn default_formats() -> Vec<OutputFormat> {
    OutputFormat::all().to_vec()
}

fn default_steps() -> u32 {
    12
}

fn default_cfg_strength() -> f32 {
    7.5
}

fn default_true() -> bool {
    true
}

fn default_video_frames() -> u32 {
    120
}

fn default_video_fps() -> u32 {
    15
}

fn default_simplify_ratio() -> f32 {
    0.95
}

fn default_texture_size() -> u32 {
    1024
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            seed: None,
            formats: default_formats(),
            ss_steps: default_steps(),
            ss_cfg_strength: default_cfg_strength(),
            slat_steps: default_steps(),
            slat_cfg_strength: default_cfg_strength(),
            generate_video: default_true(),
            video_frames: default_video_frames(),
            video_fps: default_video_fps(),
            simplify_ratio: default_simplify_ratio(),
            texture_size: default_texture_size(),
        }
    }
}

impl GenerationParams {
    /// Check every field against its documented range.
    ///
    /// Returns all offending fields at once so the caller can report them in a
    /// single response. A job whose params fail here must never reach the
    /// pipeline adapter.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if let Some(seed) = self.seed {
            if seed > MAX_SEED {
                errors.push(FieldError::new(
                    "seed",
                    format!("must be at most {MAX_SEED}"),
                ));
            }
        }

        if self.formats.is_empty() {
            errors.push(FieldError::new(
                "formats",
                "at least one output format is required",
            ));
        }

        check_range_u32(&mut errors, "ss_steps", self.ss_steps, 1, 50);
        check_range_u32(&mut errors, "slat_steps", self.slat_steps, 1, 50);
        check_range_f32(&mut errors, "ss_cfg_strength", self.ss_cfg_strength, 0.0, 20.0);
        check_range_f32(
            &mut errors,
            "slat_cfg_strength",
            self.slat_cfg_strength,
            0.0,
            20.0,
        );
        check_range_u32(&mut errors, "video_frames", self.video_frames, 30, 240);
        check_range_u32(&mut errors, "video_fps", self.video_fps, 10, 60);
        check_range_f32(&mut errors, "simplify_ratio", self.simplify_ratio, 0.5, 1.0);
        check_range_u32(&mut errors, "texture_size", self.texture_size, 512, 2048);

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Whether the caller asked for the given format family.
    pub fn requested(&self, format: OutputFormat) -> bool {
        self.formats.contains(&format)
    }
}

fn check_range_u32(errors: &mut Vec<FieldError>, field: &'static str, value: u32, min: u32, max: u32) {
    if value < min || value > max {
        errors.push(FieldError::new(
            field,
            format!("must be between {min} and {max}, got {value}"),
        ));
    }
}

fn check_range_f32(errors: &mut Vec<FieldError>, field: &'static str, value: f32, min: f32, max: f32) {
    if !value.is_finite() || value < min || value > max {
        errors.push(FieldError::new(
            field,
            format!("must be between {min} and {max}, got {value}"),
        ));
    }
}
