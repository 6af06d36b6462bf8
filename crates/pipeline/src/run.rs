//! Per-run state.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::progress::Stage;

/// Which pipeline a run drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    /// Subtitles + image set + narration.
    Story,
    /// One visual + narration + background track.
    Mixed,
}

impl RunKind {
    /// Prefix of the published artifact name.
    pub fn output_prefix(self) -> &'static str {
        match self {
            RunKind::Story => "video",
            RunKind::Mixed => "mixed",
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::Story => f.write_str("story"),
            RunKind::Mixed => f.write_str("mixed"),
        }
    }
}

/// Bookkeeping for one run: where it works, what it has produced so far.
///
/// The working directory itself is owned by the orchestrator's
/// [`WorkDir`](crate::workdir::WorkDir); this only records its path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub session_id: String,
    pub kind: RunKind,
    pub work_dir: PathBuf,
    pub stage: Stage,
    pub produced_clips: Vec<PathBuf>,
    pub output_path: PathBuf,
}

impl PipelineRun {
    pub fn new(session_id: &str, kind: RunKind, work_dir: PathBuf, output_path: PathBuf) -> Self {
        Self {
            session_id: session_id.to_string(),
            kind,
            work_dir,
            stage: Stage::Initializing,
            produced_clips: Vec::new(),
            output_path,
        }
    }

    /// Record a stage transition. Terminal stages are final.
    pub fn enter(&mut self, stage: Stage) {
        if self.stage.is_terminal() {
            tracing::warn!(
                session_id = %self.session_id,
                from = %self.stage,
                to = %stage,
                "Ignoring transition out of a terminal stage"
            );
            return;
        }
        tracing::debug!(session_id = %self.session_id, from = %self.stage, to = %stage, "Run stage");
        self.stage = stage;
    }

    pub fn is_finished(&self) -> bool {
        self.stage.is_terminal()
    }
}
