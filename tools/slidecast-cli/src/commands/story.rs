//! Render a story video.

use std::sync::Arc;

use slidecast_common::config::AppConfig;
use slidecast_pipeline::Orchestrator;
use slidecast_render_engine::FfmpegEngine;

pub async fn run(config: AppConfig, session: String, json: bool) -> anyhow::Result<()> {
    if !json {
        println!("Rendering story for session: {session}");
        println!(
            "  Profile: {}x{} @ {}fps",
            config.render.width, config.render.height, config.render.fps
        );
    }

    let orchestrator = Orchestrator::new(config, Arc::new(FfmpegEngine::new()));
    let handle = orchestrator.start_story(&session)?;
    super::follow(handle, json).await
}
