//! Slidecast CLI — render narrated slideshow videos from session uploads.
//!
//! Usage:
//!   slidecast story --session ID     Render subtitles + images + narration
//!   slidecast mix --session ID       Loop one visual under narration and background audio
//!   slidecast plan --session ID      Print the derived scene plan
//!   slidecast check                  Check encoder availability and configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use slidecast_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "slidecast",
    about = "Turn narration, subtitles and images into a finished video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/slidecast/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print progress events and results as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a story video: one zooming clip per subtitle block, joined and narrated
    Story {
        /// Session id (directory name under sessions_dir)
        #[arg(short, long)]
        session: String,
    },

    /// Loop a single image or video under mixed narration and background audio
    Mix {
        /// Session id (directory name under sessions_dir)
        #[arg(short, long)]
        session: String,

        /// Background track volume multiplier
        #[arg(long)]
        background_volume: Option<f64>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,
    },

    /// Show the scene plan derived from a session's subtitles and images
    Plan {
        /// Session id (directory name under sessions_dir)
        #[arg(short, long)]
        session: String,
    },

    /// Check encoder availability and configuration
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    slidecast_common::logging::init_logging(&config.logging);
    config.validate()?;
    tracing::debug!(sessions_dir = %config.sessions_dir.display(), "Configuration loaded");

    match cli.command {
        Commands::Story { session } => commands::story::run(config, session, cli.json).await,
        Commands::Mix {
            session,
            background_volume,
            fps,
        } => commands::mix::run(config, session, background_volume, fps, cli.json).await,
        Commands::Plan { session } => commands::plan::run(&config, &session, cli.json),
        Commands::Check => commands::check::run(&config, cli.json).await,
    }
}
