//! Error types shared across Slidecast crates.

use std::path::PathBuf;

/// Top-level error type for Slidecast operations.
///
/// Every variant is fatal to the run that raised it. Nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum SlidecastError {
    /// A required asset directory or file is absent or empty.
    #[error("Missing input: {message}")]
    InputMissing { message: String },

    /// The subtitle file yielded zero usable segments.
    #[error("No renderable scenes: {message}")]
    ParseEmpty { message: String },

    /// A file referenced by the derived plan does not exist on disk.
    #[error("File not found: {path}")]
    AssetNotFound { path: PathBuf },

    /// The encoding engine call failed or exited non-zero.
    #[error("Encoding engine error: {message}")]
    EngineFailure { message: String },

    /// Duration probing failed.
    #[error("Probe error: {message}")]
    ProbeFailure { message: String },

    #[error("Invalid scene {index}: {message}")]
    InvalidScene { index: usize, message: String },

    #[error("Stage {stage} timed out after {secs}s")]
    StageTimeout { stage: String, secs: u64 },

    #[error("Session {session_id} already has an active run")]
    SessionBusy { session_id: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SlidecastError.
pub type SlidecastResult<T> = Result<T, SlidecastError>;

impl SlidecastError {
    pub fn input_missing(msg: impl Into<String>) -> Self {
        Self::InputMissing {
            message: msg.into(),
        }
    }

    pub fn parse_empty(msg: impl Into<String>) -> Self {
        Self::ParseEmpty {
            message: msg.into(),
        }
    }

    pub fn asset_not_found(path: impl Into<PathBuf>) -> Self {
        Self::AssetNotFound { path: path.into() }
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::EngineFailure {
            message: msg.into(),
        }
    }

    pub fn probe(msg: impl Into<String>) -> Self {
        Self::ProbeFailure {
            message: msg.into(),
        }
    }

    pub fn invalid_scene(index: usize, msg: impl Into<String>) -> Self {
        Self::InvalidScene {
            index,
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Stable snake_case tag for log fields and event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputMissing { .. } => "input_missing",
            Self::ParseEmpty { .. } => "parse_empty",
            Self::AssetNotFound { .. } => "asset_not_found",
            Self::EngineFailure { .. } => "engine_failure",
            Self::ProbeFailure { .. } => "probe_failure",
            Self::InvalidScene { .. } => "invalid_scene",
            Self::StageTimeout { .. } => "stage_timeout",
            Self::SessionBusy { .. } => "session_busy",
            Self::Config { .. } => "config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}
