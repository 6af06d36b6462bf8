//! Show the derived scene plan without rendering.

use slidecast_common::config::AppConfig;
use slidecast_pipeline::plan_scenes;
use slidecast_scene_model::total_duration_ms;

pub fn run(config: &AppConfig, session: &str, json: bool) -> anyhow::Result<()> {
    let scenes = plan_scenes(config, session)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&scenes)?);
        return Ok(());
    }

    println!("Scene plan for session: {session}");
    for scene in &scenes {
        let image = scene
            .image_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let caption = scene.text.lines().next().unwrap_or_default();
        println!(
            "  #{:<3} {:>9.3}s - {:>9.3}s ({:>6.3}s)  {:<20} {}",
            scene.index + 1,
            scene.start_ms as f64 / 1000.0,
            scene.end_ms as f64 / 1000.0,
            scene.duration_secs(),
            image,
            caption
        );
    }
    println!();
    println!(
        "{} scenes, {:.3}s total",
        scenes.len(),
        total_duration_ms(&scenes) as f64 / 1000.0
    );
    Ok(())
}
