//! Render a mixed-media video.

use std::sync::Arc;

use slidecast_common::config::AppConfig;
use slidecast_pipeline::{MixOptions, Orchestrator};
use slidecast_render_engine::FfmpegEngine;

pub async fn run(
    config: AppConfig,
    session: String,
    background_volume: Option<f64>,
    fps: Option<u32>,
    json: bool,
) -> anyhow::Result<()> {
    let options = MixOptions {
        background_volume,
        fps,
    };
    let resolved = options.resolve(&config.mix)?;
    if !json {
        println!("Mixing media for session: {session}");
        println!(
            "  Background volume: {:.2}, {}fps",
            resolved.background_volume, resolved.fps
        );
    }

    let orchestrator = Orchestrator::new(config, Arc::new(FfmpegEngine::new()));
    let handle = orchestrator.start_mixed(&session, options)?;
    super::follow(handle, json).await
}
