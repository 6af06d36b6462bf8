//! Story pipeline: subtitles and an image set become one clip per scene,
//! joined in order and laid under the narration.
//!
//! Progress slices: synthesis 0–50, concatenation 50–60, mux 60–100.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use futures::{StreamExt, TryStreamExt};
use slidecast_common::config::{AppConfig, PlanPolicy};
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_render_engine::{
    ClipProfile, ConcatRequest, FadeSpec, MuxRequest, SegmentRequest, ZoomRange,
};
use slidecast_scene_model::{derive_scenes, load_subtitles, total_duration_ms, PlanOptions, Scene};

use crate::orchestrator::RunContext;
use crate::progress::{Stage, StageSlice};
use crate::run::PipelineRun;
use crate::session::{AssetRole, SessionAssets};

const SYNTHESIS: StageSlice = StageSlice::new(0.0, 50.0);
const CONCAT: StageSlice = StageSlice::new(50.0, 60.0);
const MUX: StageSlice = StageSlice::new(60.0, 100.0);

const MANIFEST_NAME: &str = "concat.txt";
const JOINED_NAME: &str = "joined.mp4";

/// Derive the scene plan for a session without rendering anything.
pub fn plan_scenes(config: &AppConfig, session_id: &str) -> SlidecastResult<Vec<Scene>> {
    let assets = SessionAssets::open(&config.sessions_dir, session_id, &config.layout)?;
    plan_session(&assets, &config.plan)
}

/// Parse the session's subtitles and pair them with its images.
pub fn plan_session(assets: &SessionAssets, policy: &PlanPolicy) -> SlidecastResult<Vec<Scene>> {
    let subtitles = assets.first_file(AssetRole::Subtitles)?;
    let segments = load_subtitles(&subtitles)?;
    if segments.is_empty() {
        return Err(SlidecastError::parse_empty(format!(
            "{} has no blocks with a valid timestamp line",
            subtitles.display()
        )));
    }
    let images = assets.images()?;
    let options = PlanOptions {
        strict_image_count: policy.strict_image_count,
        close_gaps: policy.close_subtitle_gaps,
    };
    derive_scenes(&segments, &images, &options)
}

pub(crate) async fn run(
    ctx: &RunContext<'_>,
    run: &mut PipelineRun,
    filename: &str,
) -> SlidecastResult<PathBuf> {
    run.enter(Stage::Parsing);
    ctx.reporter
        .transition(Stage::Parsing, "Parsing subtitles", SYNTHESIS.start);
    let assets = SessionAssets::open(&ctx.config.sessions_dir, &run.session_id, &ctx.config.layout)?;
    let scenes = plan_session(&assets, &ctx.config.plan)?;
    let narration = assets.first_file(AssetRole::Narration)?;
    let expected_secs = total_duration_ms(&scenes) as f64 / 1000.0;
    tracing::info!(scenes = scenes.len(), expected_secs, "Scene plan ready");

    run.enter(Stage::Synthesizing);
    let clips = synthesize(ctx, &scenes).await?;
    run.produced_clips = clips.clone();

    run.enter(Stage::Concatenating);
    let joined = sequence(ctx, &clips, expected_secs).await?;

    run.enter(Stage::Muxing);
    mux(ctx, &joined, &narration, expected_secs, &ctx.work.join(filename)).await
}

/// Render every scene, up to `synthesis_workers` at a time. Clips come back
/// in scene order whatever order they finish in.
async fn synthesize(ctx: &RunContext<'_>, scenes: &[Scene]) -> SlidecastResult<Vec<PathBuf>> {
    let total = scenes.len();
    let workers = ctx.config.limits.synthesis_workers.max(1);
    let profile = ClipProfile::from(&ctx.config.render);
    let fractions = Mutex::new(vec![0.0f64; total]);

    futures::stream::iter(0..total)
        .map(|position| {
            render_scene(ctx, &scenes[position], position, total, &profile, &fractions)
        })
        .buffered(workers)
        .try_collect()
        .await
}

async fn render_scene(
    ctx: &RunContext<'_>,
    scene: &Scene,
    position: usize,
    total: usize,
    profile: &ClipProfile,
    fractions: &Mutex<Vec<f64>>,
) -> SlidecastResult<PathBuf> {
    if scene.duration_ms() == 0 {
        return Err(SlidecastError::invalid_scene(
            scene.index,
            "scene has zero duration",
        ));
    }
    if !scene.image_path.is_file() {
        return Err(SlidecastError::asset_not_found(&scene.image_path));
    }

    let label = format!("Synthesizing scene {}/{}", position + 1, total);
    let done = record_fraction(fractions, position, 0.0);
    ctx.reporter
        .transition(Stage::Synthesizing, label.as_str(), SYNTHESIS.at(done));

    let duration_secs = scene.duration_secs();
    let request = SegmentRequest {
        image: scene.image_path.clone(),
        duration_secs,
        zoom: ZoomRange::dolly_in(duration_secs, ctx.config.render.zoom_rate),
        fade: FadeSpec::for_scene(position, total, duration_secs, ctx.config.render.fade_secs),
        profile: profile.clone(),
    };
    let output = ctx.work.join(clip_name(position));
    let progress = |fraction: f64| {
        let done = record_fraction(fractions, position, fraction);
        ctx.reporter.tick(label.as_str(), SYNTHESIS.at(done));
    };

    let clip = ctx
        .engine_call(
            Stage::Synthesizing,
            ctx.engine.render_image_segment(&request, &output, &progress),
        )
        .await?;
    record_fraction(fractions, position, 1.0);
    tracing::debug!(scene = position, duration_secs, clip = %clip.display(), "Scene rendered");
    Ok(clip)
}

/// Store one clip's fraction and return the mean over all clips.
fn record_fraction(fractions: &Mutex<Vec<f64>>, position: usize, fraction: f64) -> f64 {
    let mut fractions = fractions.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(slot) = fractions.get_mut(position) {
        *slot = slot.max(fraction.clamp(0.0, 1.0));
    }
    fractions.iter().sum::<f64>() / fractions.len().max(1) as f64
}

fn clip_name(position: usize) -> String {
    format!("clip_{position:04}.mp4")
}

async fn sequence(
    ctx: &RunContext<'_>,
    clips: &[PathBuf],
    expected_secs: f64,
) -> SlidecastResult<PathBuf> {
    ctx.reporter.transition(
        Stage::Concatenating,
        format!("Concatenating {} clips", clips.len()),
        CONCAT.start,
    );
    if let Some(missing) = clips.iter().find(|clip| !clip.is_file()) {
        return Err(SlidecastError::asset_not_found(missing));
    }

    let request = ConcatRequest {
        clips: clips.to_vec(),
        manifest: ctx.work.join(MANIFEST_NAME),
        expected_secs,
    };
    let output = ctx.work.join(JOINED_NAME);
    let progress = |fraction: f64| ctx.reporter.tick("Concatenating clips", CONCAT.at(fraction));

    ctx.engine_call(
        Stage::Concatenating,
        ctx.engine.concatenate(&request, &output, &progress),
    )
    .await
}

async fn mux(
    ctx: &RunContext<'_>,
    video: &Path,
    narration: &Path,
    expected_secs: f64,
    output: &Path,
) -> SlidecastResult<PathBuf> {
    ctx.reporter
        .transition(Stage::Muxing, "Muxing narration", MUX.start);
    if !narration.is_file() {
        return Err(SlidecastError::asset_not_found(narration));
    }

    let request = MuxRequest {
        video: video.to_path_buf(),
        audio: narration.to_path_buf(),
        expected_secs,
        audio_bitrate_kbps: ctx.config.render.audio_bitrate_kbps,
    };
    let progress = |fraction: f64| ctx.reporter.tick("Muxing narration", MUX.at(fraction));

    ctx.engine_call(
        Stage::Muxing,
        ctx.engine.mux_audio(&request, output, &progress),
    )
    .await
}
