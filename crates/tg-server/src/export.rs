use image::RgbImage;
use image::imageops;
use tracing::debug;

use tg_core::{AssetBundle, GenerationParams, OutputFormat};

use crate::error::ApiError;
use crate::pipeline::TextTo3d;
use crate::store::ArtifactStore;

pub const PREVIEW_FILE: &str = "preview.mp4";

/// Write one requested format into the job directory and return its filename.
///
/// Gaussian clouds are serialized in-process; GLB baking runs on the worker
/// with the caller's simplification and texture options.
pub async fn export_format(
    pipeline: &dyn TextTo3d,
    store: &ArtifactStore,
    job_id: &str,
    bundle: &AssetBundle,
    format: OutputFormat,
    params: &GenerationParams,
) -> Result<&'static str, ApiError> {
    let bytes = match format {
        OutputFormat::Gaussian => {
            let cloud = bundle
                .gaussians
                .first()
                .ok_or_else(|| ApiError::Export("pipeline produced no gaussian output".into()))?;
            cloud.write_ply()
        }
        OutputFormat::Mesh => {
            if bundle.meshes.is_empty() {
                return Err(ApiError::Export("pipeline produced no mesh output".into()));
            }
            pipeline
                .bake_glb(&bundle.session, params.simplify_ratio, params.texture_size)
                .await
                .map_err(|e| ApiError::Export(e.to_string()))?
        }
    };

    let filename = format.filename();
    store.put(job_id, filename, &bytes).await?;
    debug!(job_id, filename, size = bytes.len(), "artifact written");
    Ok(filename)
}

/// Render and write the rotating-view preview video.
///
/// One frame track per requested format that the bundle actually holds; when
/// both render, the tracks are combined side by side into a single comparison
/// video. Returns `None` when nothing was renderable.
pub async fn export_preview(
    pipeline: &dyn TextTo3d,
    store: &ArtifactStore,
    job_id: &str,
    bundle: &AssetBundle,
    params: &GenerationParams,
) -> Result<Option<&'static str>, ApiError> {
    let mut tracks: Vec<Vec<RgbImage>> = Vec::new();
    for format in [OutputFormat::Gaussian, OutputFormat::Mesh] {
        if params.requested(format) && bundle.has(format) {
            let frames = pipeline
                .render_views(&bundle.session, format, params.video_frames)
                .await
                .map_err(|e| ApiError::Export(e.to_string()))?;
            if !frames.is_empty() {
                tracks.push(frames);
            }
        }
    }

    let frames = match tracks.len() {
        0 => return Ok(None),
        1 => tracks.remove(0),
        _ => combine_side_by_side(&tracks),
    };

    let bytes = pipeline
        .encode_video(&frames, params.video_fps)
        .await
        .map_err(|e| ApiError::Export(e.to_string()))?;
    store.put(job_id, PREVIEW_FILE, &bytes).await?;
    debug!(job_id, frames = frames.len(), "preview video written");
    Ok(Some(PREVIEW_FILE))
}

/// Horizontally concatenate the n-th frame of every track. Tracks are trimmed
/// to the shortest one so the output stays rectangular.
fn combine_side_by_side(tracks: &[Vec<RgbImage>]) -> Vec<RgbImage> {
    let frame_count = tracks.iter().map(Vec::len).min().unwrap_or(0);
    let height = tracks
        .iter()
        .map(|t| t[0].height())
        .max()
        .unwrap_or(0);
    let total_width: u32 = tracks.iter().map(|t| t[0].width()).sum();

    (0..frame_count)
        .map(|index| {
            let mut canvas = RgbImage::new(total_width, height);
            let mut x_offset: i64 = 0;
            for track in tracks {
                let frame = &track[index];
                imageops::replace(&mut canvas, frame, x_offset, 0);
                x_offset += i64::from(frame.width());
            }
            canvas
        })
        .collect()
}
