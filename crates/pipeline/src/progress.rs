//! Run progress: stages, events, and the reporter that publishes them.
//!
//! Every run publishes [`RunEvent`]s on its own channel. Status events carry
//! a percent that never decreases within a run; exactly one terminal event
//! (`finished` or `error`) closes the stream.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use slidecast_common::clock::{RateController, RunClock};
use tokio::sync::mpsc;

use crate::registry::{RegistryGuard, RunSnapshot};

/// Lifecycle stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initializing,
    Parsing,
    Synthesizing,
    Concatenating,
    Muxing,
    Probing,
    Mixing,
    Cleanup,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initializing => "initializing",
            Stage::Parsing => "parsing",
            Stage::Synthesizing => "synthesizing",
            Stage::Concatenating => "concatenating",
            Stage::Muxing => "muxing",
            Stage::Probing => "probing",
            Stage::Mixing => "mixing",
            Stage::Cleanup => "cleanup",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Portion of the overall 0–100 range owned by one stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSlice {
    pub start: f64,
    pub end: f64,
}

impl StageSlice {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Overall percent for a stage-local `fraction` in `[0.0, 1.0]`.
    pub fn at(&self, fraction: f64) -> f64 {
        self.start + (self.end - self.start) * fraction.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub message: String,
    pub percent: f64,
}

/// Message published on a run's channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    Status(ProgressEvent),
    Finished { url: String, filename: String },
    Error { message: String },
}

impl RunEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunEvent::Status(_))
    }
}

#[derive(Debug)]
struct ReporterState {
    stage: Stage,
    percent: f64,
    rate: RateController,
    terminal: bool,
}

/// Publishes progress for one run.
///
/// Safe to share between concurrently rendering scenes. A closed receiver
/// is ignored: the run keeps going when nobody is listening.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<RunEvent>,
    snapshot: Option<Arc<Mutex<RunSnapshot>>>,
    /// Released on the terminal event, before it is sent.
    registration: Mutex<Option<RegistryGuard>>,
    state: Mutex<ReporterState>,
    clock: RunClock,
}

impl ProgressReporter {
    /// Intra-stage ticks closer together than `interval` are dropped.
    pub fn new(tx: mpsc::UnboundedSender<RunEvent>, interval: Duration) -> Self {
        Self {
            tx,
            snapshot: None,
            registration: Mutex::new(None),
            state: Mutex::new(ReporterState {
                stage: Stage::Initializing,
                percent: 0.0,
                rate: RateController::new(interval),
                terminal: false,
            }),
            clock: RunClock::start(),
        }
    }

    /// Mirror stage and percent into a registry entry and hold it until the
    /// run reaches a terminal event.
    pub fn with_registration(mut self, guard: RegistryGuard) -> Self {
        self.snapshot = Some(guard.snapshot());
        self.registration = Mutex::new(Some(guard));
        self
    }

    pub fn stage(&self) -> Stage {
        self.lock().stage
    }

    pub fn percent(&self) -> f64 {
        self.lock().percent
    }

    /// Enter `stage`. Always published.
    pub fn transition(&self, stage: Stage, message: impl Into<String>, percent: f64) {
        let event = {
            let mut state = self.lock();
            if state.terminal {
                return;
            }
            state.stage = stage;
            state.percent = state.percent.max(percent.clamp(0.0, 100.0));
            state.rate.reset();
            state.rate.should_tick(self.clock.elapsed_ns());
            ProgressEvent {
                stage,
                message: message.into(),
                percent: state.percent,
            }
        };
        tracing::info!(stage = %event.stage, percent = event.percent, "{}", event.message);
        self.publish_status(event);
    }

    /// Intra-stage update. Dropped unless it advances the percent and the
    /// rate limit allows it.
    pub fn tick(&self, message: impl Into<String>, percent: f64) {
        let event = {
            let mut state = self.lock();
            let percent = percent.clamp(0.0, 100.0);
            if state.terminal || percent <= state.percent {
                return;
            }
            if !state.rate.should_tick(self.clock.elapsed_ns()) {
                return;
            }
            state.percent = percent;
            ProgressEvent {
                stage: state.stage,
                message: message.into(),
                percent,
            }
        };
        tracing::debug!(stage = %event.stage, percent = event.percent, "{}", event.message);
        self.publish_status(event);
    }

    /// Publish the success terminal event.
    pub fn finish(&self, url: impl Into<String>, filename: impl Into<String>) {
        if !self.enter_terminal(Stage::Done) {
            return;
        }
        self.send(RunEvent::Finished {
            url: url.into(),
            filename: filename.into(),
        });
    }

    /// Publish the failure terminal event.
    pub fn fail(&self, message: impl Into<String>) {
        if !self.enter_terminal(Stage::Failed) {
            return;
        }
        self.send(RunEvent::Error {
            message: message.into(),
        });
    }

    fn enter_terminal(&self, stage: Stage) -> bool {
        let percent = {
            let mut state = self.lock();
            if state.terminal {
                return false;
            }
            state.terminal = true;
            state.stage = stage;
            state.percent
        };
        self.update_snapshot(stage, percent);
        let guard = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(guard);
        true
    }

    fn publish_status(&self, event: ProgressEvent) {
        self.update_snapshot(event.stage, event.percent);
        self.send(RunEvent::Status(event));
    }

    fn update_snapshot(&self, stage: Stage, percent: f64) {
        if let Some(snapshot) = &self.snapshot {
            let mut snapshot = snapshot.lock().unwrap_or_else(PoisonError::into_inner);
            snapshot.stage = stage;
            snapshot.percent = percent;
        }
    }

    fn send(&self, event: RunEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Progress receiver closed; event dropped");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
