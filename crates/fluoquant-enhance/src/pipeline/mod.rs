//! Enhancement pipelines
//!
//! The full pipeline runs the enabled stages in a fixed order:
//! percentile stretch, background suppression, local contrast, noise
//! smoothing, display gamma. Illumination and background are normalized
//! before structure enhancement and gamma is the last, display-only step.
//!
//! The realtime variant (`realtime`) uses its own key set for low-latency
//! previews and is not expected to match the full pipeline.

mod realtime;


pub use realtime::process_realtime;

use std::borrow::Cow;
use std::time::Instant;

use crate::accel::Acceleration;
use crate::config::{PipelineParams, StageConfig, StageDefaults};
use crate::error::EnhanceError;
use crate::image::ImageBuffer;
use crate::stages::Stage;

/// Ordered stages for the enabled parameters.
pub fn plan(params: &PipelineParams) -> Vec<Stage> {
    let mut stages = Vec::with_capacity(5);
    if let Some(clip) = params.stretch_clip {
        stages.push(Stage::Stretch {
            low: clip,
            high: 100.0 - clip,
        });
    }
    if let Some(bg) = params.background {
        stages.push(Stage::Background {
            kernel: bg.kernel,
            strength: bg.strength,
        });
    }
    if let Some(contrast) = params.contrast {
        stages.push(Stage::Contrast {
            clip_limit: contrast.clip_limit,
            tile_size: contrast.tile_size,
        });
    }
    if let Some(sigma) = params.noise_sigma {
        stages.push(Stage::NoiseSmoothing { sigma });
    }
    if let Some(gamma) = params.gamma {
        stages.push(Stage::DisplayGamma { gamma });
    }
    stages
}

/// Run the full enhancement pipeline.
///
/// The configuration is parsed before any stage runs, so a malformed value
/// fails the call without partial work. When no stage is enabled the input
/// is returned as [`Cow::Borrowed`] (the same allocation); otherwise every
/// stage produces a new buffer and the result is [`Cow::Owned`].
pub fn apply_pipeline<'a>(
    image: &'a ImageBuffer,
    cfg: &StageConfig,
    defaults: &StageDefaults,
    accel: Acceleration<'_>,
) -> Result<Cow<'a, ImageBuffer>, EnhanceError> {
    let params = PipelineParams::from_config(cfg, defaults)?;
    let stages = plan(&params);
    if stages.is_empty() {
        return Ok(Cow::Borrowed(image));
    }

    let _span = tracing::debug_span!(
        "enhance",
        width = image.width(),
        height = image.height(),
        channels = image.channels(),
        accelerated = accel.is_accelerated(),
    )
    .entered();

    let total = Instant::now();
    let mut working = Cow::Borrowed(image);
    for stage in &stages {
        let start = Instant::now();
        working = Cow::Owned(stage.apply(&working, accel)?);
        tracing::debug!(
            stage = stage.name(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "stage finished"
        );
    }

    if tracing::enabled!(tracing::Level::DEBUG) {
        let (mean_in, std_in) = image.mean_std();
        let (mean_out, std_out) = working.mean_std();
        tracing::debug!(
            stages = stages.len(),
            elapsed_ms = total.elapsed().as_secs_f64() * 1000.0,
            mean_in,
            std_in,
            mean_out,
            std_out,
            "pipeline finished"
        );
    }

    Ok(working)
}
