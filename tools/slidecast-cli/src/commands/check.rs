//! Check encoder availability and configuration.

use slidecast_common::config::AppConfig;
use slidecast_render_engine::{FfmpegEngine, MediaEngine};

pub async fn run(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let engine = FfmpegEngine::new();
    let available = engine.is_available().await;

    if json {
        let report = serde_json::json!({
            "engine": engine.name(),
            "available": available,
            "sessions_dir": config.sessions_dir.display().to_string(),
            "work_dir": config.work_dir.display().to_string(),
            "output_dir": config.output_dir.display().to_string(),
            "max_engine_processes": config.limits.max_engine_processes,
            "synthesis_workers": config.limits.synthesis_workers,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Slidecast System Check");
    println!("{}", "=".repeat(50));

    if available {
        println!("[OK] Encoder: ffmpeg and ffprobe found");
    } else {
        println!("[FAIL] Encoder: ffmpeg or ffprobe is missing from PATH");
    }

    for (label, dir) in [
        ("Sessions", &config.sessions_dir),
        ("Work", &config.work_dir),
        ("Output", &config.output_dir),
    ] {
        let state = if dir.is_dir() { "OK" } else { "WARN" };
        println!("[{state}] {label} directory: {}", dir.display());
    }

    println!(
        "[OK] Limits: {} engine processes, {} synthesis workers, {}s stage timeout",
        config.limits.max_engine_processes,
        config.limits.synthesis_workers,
        config.limits.stage_timeout_secs
    );

    println!();
    if available {
        println!("Slidecast is ready.");
    } else {
        println!("Install ffmpeg (which provides ffprobe) to render videos.");
    }
    Ok(())
}
