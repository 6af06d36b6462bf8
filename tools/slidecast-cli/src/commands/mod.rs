pub mod check;
pub mod mix;
pub mod plan;
pub mod story;

use slidecast_pipeline::{join_run, RunEvent, RunHandle};

/// Print a run's events until it ends, then report its result.
pub async fn follow(mut handle: RunHandle, json: bool) -> anyhow::Result<()> {
    while let Some(event) = handle.events.recv().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
            continue;
        }
        match event {
            RunEvent::Status(p) => {
                println!("  [{:>5.1}%] {:<13} {}", p.percent, p.stage, p.message);
            }
            RunEvent::Finished { url, filename } => {
                println!("Finished: {filename} ({url})");
            }
            RunEvent::Error { message } => {
                println!("Failed: {message}");
            }
        }
    }

    let artifact = join_run(handle.join)
        .await
        .map_err(|e| anyhow::anyhow!("Run for session {} failed: {e}", handle.session_id))?;
    if !json {
        println!("  Output: {}", artifact.path.display());
    }
    Ok(())
}
