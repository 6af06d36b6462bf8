//! Slidecast Pipeline
//!
//! Orchestrates generation runs on top of the render engine:
//!
//! ```text
//! story:  Initializing ─► Parsing ─► Synthesizing(1..N) ─► Concatenating ─► Muxing ─► Cleanup ─► Done
//! mixed:  Initializing ─► Probing ─► Mixing ─► Cleanup ─► Done
//!                         (any non-terminal stage) ─► Failed
//! ```
//!
//! Each run owns a private working directory that is removed on its
//! terminal transition, reports monotonic 0–100 progress over a typed
//! channel, and is tracked in a registry keyed by session id.

pub mod mixed;
pub mod orchestrator;
pub mod progress;
pub mod registry;
pub mod run;
pub mod session;
pub mod story;
pub mod workdir;

pub use mixed::{MixOptions, ResolvedMix};
pub use orchestrator::{join_run, Artifact, Orchestrator, RunHandle};
pub use progress::{ProgressEvent, ProgressReporter, RunEvent, Stage, StageSlice};
pub use registry::{RegistryGuard, RunRegistry, RunSnapshot};
pub use run::{PipelineRun, RunKind};
pub use session::{validate_session_id, AssetRole, SessionAssets};
pub use story::{plan_scenes, plan_session};
pub use workdir::{publish, remove_work_dir, WorkDir};
