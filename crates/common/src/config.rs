//! Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SlidecastError, SlidecastResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root holding one upload area per session (`<sessions_dir>/<session_id>/`).
    pub sessions_dir: PathBuf,

    /// Root for per-run working directories.
    pub work_dir: PathBuf,

    /// Directory finished artifacts are published into.
    pub output_dir: PathBuf,

    /// Prefix joined with the artifact filename to form the `finished` URL.
    pub public_url_prefix: String,

    /// Subdirectory names for each asset role inside a session.
    pub layout: SessionLayout,

    /// Story pipeline render parameters.
    pub render: RenderDefaults,

    /// Mixed-media pipeline defaults.
    pub mix: MixDefaults,

    /// Concurrency and timeout limits.
    pub limits: Limits,

    /// Scene planning policy.
    pub plan: PlanPolicy,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Well-known asset subdirectories inside a session upload area.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionLayout {
    pub audio: String,
    pub subtitles: String,
    pub background: String,
    pub visual: String,
    pub images: String,
}

/// Fixed output profile for rendered scene clips.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Output width (portrait).
    pub width: u32,

    /// Output height (portrait).
    pub height: u32,

    /// Constant output frame rate; also the keyframe interval.
    pub fps: u32,

    /// Zoom gained per second of scene duration.
    pub zoom_rate: f64,

    /// Crossfade length at interior scene edges.
    pub fade_secs: f64,

    /// Extra seconds of zoom frames rendered before truncation.
    pub render_margin_secs: f64,

    /// x264 constant rate factor.
    pub crf: u8,

    /// x264 preset.
    pub preset: String,

    /// AAC bitrate for muxed narration.
    pub audio_bitrate_kbps: u32,
}

/// Mixed-media pipeline defaults; both are overridable per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixDefaults {
    /// Background track amplitude multiplier.
    pub background_volume: f64,

    /// Output frame rate.
    pub fps: u32,
}

/// Concurrency and timeout limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Scene clips rendered concurrently within one run (1 = sequential).
    pub synthesis_workers: usize,

    /// Engine processes allowed at once across all runs.
    pub max_engine_processes: usize,

    /// Per engine call timeout in seconds; 0 disables.
    pub stage_timeout_secs: u64,

    /// Minimum spacing between intra-stage progress events.
    pub progress_interval_ms: u64,
}

/// Policy knobs for turning subtitles and images into a scene plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanPolicy {
    /// Fail when the image count differs from the segment count instead of
    /// reusing the last image.
    pub strict_image_count: bool,

    /// Stretch each scene to the next scene's start so gaps between
    /// subtitles do not desynchronise picture and narration.
    pub close_subtitle_gaps: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "slidecast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data = data_home().join("slidecast");
        Self {
            sessions_dir: data.join("sessions"),
            work_dir: std::env::temp_dir().join("slidecast"),
            output_dir: data.join("outputs"),
            public_url_prefix: "/outputs".to_string(),
            layout: SessionLayout::default(),
            render: RenderDefaults::default(),
            mix: MixDefaults::default(),
            limits: Limits::default(),
            plan: PlanPolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SessionLayout {
    fn default() -> Self {
        Self {
            audio: "audio".to_string(),
            subtitles: "subtitles".to_string(),
            background: "background".to_string(),
            visual: "visual".to_string(),
            images: "images".to_string(),
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            zoom_rate: 0.02,
            fade_secs: 0.5,
            render_margin_secs: 2.0,
            crf: 23,
            preset: "medium".to_string(),
            audio_bitrate_kbps: 192,
        }
    }
}

impl Default for MixDefaults {
    fn default() -> Self {
        Self {
            background_volume: 0.3,
            fps: 30,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            synthesis_workers: 1,
            max_engine_processes: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            stage_timeout_secs: 900,
            progress_interval_ms: 250,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Unlike [`AppConfig::load`], errors
    /// are returned rather than replaced by defaults.
    pub fn load_from(path: &Path) -> SlidecastResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SlidecastError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            SlidecastError::config(format!("Failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no run could succeed with.
    pub fn validate(&self) -> SlidecastResult<()> {
        if self.render.width == 0 || self.render.height == 0 {
            return Err(SlidecastError::config("render size must be non-zero"));
        }
        if self.render.width % 2 != 0 || self.render.height % 2 != 0 {
            return Err(SlidecastError::config(
                "render size must be even for yuv420p output",
            ));
        }
        if self.render.fps == 0 || self.mix.fps == 0 {
            return Err(SlidecastError::config("fps must be at least 1"));
        }
        if self.render.zoom_rate < 0.0 || self.render.fade_secs < 0.0 {
            return Err(SlidecastError::config(
                "zoom_rate and fade_secs must not be negative",
            ));
        }
        if self.render.render_margin_secs < 0.0 {
            return Err(SlidecastError::config(
                "render_margin_secs must not be negative",
            ));
        }
        if self.mix.background_volume < 0.0 {
            return Err(SlidecastError::config(
                "background_volume must not be negative",
            ));
        }
        if self.limits.synthesis_workers == 0 || self.limits.max_engine_processes == 0 {
            return Err(SlidecastError::config(
                "worker and process limits must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home().join(".config"));
    base.join("slidecast").join("config.json")
}

fn data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home().join(".local").join("share"))
}

fn home() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string()))
}
