//! Mixed-media pipeline: one visual looped under narration mixed with an
//! attenuated, looped background track.
//!
//! The output length is pinned to the probed narration duration since
//! looped inputs never end on their own.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use slidecast_common::config::MixDefaults;
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_render_engine::MixRequest;
use slidecast_scene_model::{is_image, is_video};

use crate::orchestrator::RunContext;
use crate::progress::{Stage, StageSlice};
use crate::run::PipelineRun;
use crate::session::{AssetRole, SessionAssets};

const PROBE: StageSlice = StageSlice::new(0.0, 10.0);
const MIX: StageSlice = StageSlice::new(10.0, 100.0);

/// Per-request overrides for a mixed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MixOptions {
    pub background_volume: Option<f64>,
    pub fps: Option<u32>,
}

/// Options with defaults applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedMix {
    pub background_volume: f64,
    pub fps: u32,
}

impl MixOptions {
    pub fn resolve(&self, defaults: &MixDefaults) -> SlidecastResult<ResolvedMix> {
        let background_volume = self.background_volume.unwrap_or(defaults.background_volume);
        if !background_volume.is_finite() || background_volume < 0.0 {
            return Err(SlidecastError::config(format!(
                "background volume must be a non-negative number, got {background_volume}"
            )));
        }
        let fps = self.fps.unwrap_or(defaults.fps);
        if fps == 0 {
            return Err(SlidecastError::config("frame rate must be at least 1"));
        }
        Ok(ResolvedMix {
            background_volume,
            fps,
        })
    }
}

pub(crate) async fn run(
    ctx: &RunContext<'_>,
    run: &mut PipelineRun,
    options: &MixOptions,
    filename: &str,
) -> SlidecastResult<PathBuf> {
    let mix = options.resolve(&ctx.config.mix)?;

    run.enter(Stage::Probing);
    ctx.reporter
        .transition(Stage::Probing, "Probing narration duration", PROBE.start);
    let assets = SessionAssets::open(&ctx.config.sessions_dir, &run.session_id, &ctx.config.layout)?;
    let visual = assets.first_file(AssetRole::Visual)?;
    let visual_is_image = visual_is_image(&visual)?;
    let foreground = assets.first_file(AssetRole::Narration)?;
    let background = assets.first_file(AssetRole::Background)?;

    let duration_secs = ctx
        .engine_call(Stage::Probing, ctx.engine.probe_duration(&foreground))
        .await?;
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Err(SlidecastError::probe(format!(
            "{} reported an unusable duration of {duration_secs}s",
            foreground.display()
        )));
    }

    run.enter(Stage::Mixing);
    ctx.reporter.transition(
        Stage::Mixing,
        format!("Mixing {duration_secs:.1}s of audio onto the visual"),
        MIX.start,
    );

    tracing::info!(
        visual = %visual.display(),
        visual_is_image,
        duration_secs,
        background_volume = mix.background_volume,
        fps = mix.fps,
        "Mixing inputs resolved"
    );

    let request = MixRequest {
        visual,
        visual_is_image,
        foreground,
        background,
        background_volume: mix.background_volume,
        duration_secs,
        fps: mix.fps,
        crf: ctx.config.render.crf,
        preset: ctx.config.render.preset.clone(),
        audio_bitrate_kbps: ctx.config.render.audio_bitrate_kbps,
    };
    let output = ctx.work.join(filename);
    let progress = |fraction: f64| ctx.reporter.tick("Mixing", MIX.at(fraction));

    ctx.engine_call(
        Stage::Mixing,
        ctx.engine.mix_and_apply(&request, &output, &progress),
    )
    .await
}

/// Stills are looped as single frames and videos with a stream loop.
/// Anything else is refused.
fn visual_is_image(visual: &Path) -> SlidecastResult<bool> {
    if is_image(visual) {
        Ok(true)
    } else if is_video(visual) {
        Ok(false)
    } else {
        Err(SlidecastError::input_missing(format!(
            "visual {} is neither a supported image nor a supported video",
            visual.display()
        )))
    }
}
