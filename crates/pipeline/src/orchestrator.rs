//! Run orchestration.
//!
//! [`Orchestrator`] is the single entry point for starting runs. Each run is
//! spawned onto the tokio runtime and owns a registry entry, a working
//! directory and a progress channel for its whole lifetime. Whatever stage
//! fails, the run removes its working directory and publishes exactly one
//! terminal event.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use slidecast_common::clock::RunClock;
use slidecast_common::config::AppConfig;
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_render_engine::MediaEngine;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::mixed::{self, MixOptions};
use crate::progress::{ProgressReporter, RunEvent, Stage};
use crate::registry::RunRegistry;
use crate::run::{PipelineRun, RunKind};
use crate::session::validate_session_id;
use crate::story;
use crate::workdir::{self, WorkDir};

/// A published output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub filename: String,
    pub url: String,
}

/// Caller's side of a started run.
#[derive(Debug)]
pub struct RunHandle {
    pub session_id: String,
    pub kind: RunKind,
    /// Progress stream. Closes after the terminal event.
    pub events: mpsc::UnboundedReceiver<RunEvent>,
    pub join: JoinHandle<SlidecastResult<Artifact>>,
}

impl RunHandle {
    /// Wait for the run to finish, discarding any unread events.
    pub async fn wait(self) -> SlidecastResult<Artifact> {
        drop(self.events);
        join_run(self.join).await
    }
}

/// Await a run task, turning a panic or abort into an error.
pub async fn join_run(join: JoinHandle<SlidecastResult<Artifact>>) -> SlidecastResult<Artifact> {
    match join.await {
        Ok(result) => result,
        Err(e) => Err(SlidecastError::engine(format!("run task did not complete: {e}"))),
    }
}

enum Job {
    Story,
    Mixed(MixOptions),
}

impl Job {
    fn kind(&self) -> RunKind {
        match self {
            Job::Story => RunKind::Story,
            Job::Mixed(_) => RunKind::Mixed,
        }
    }
}

struct Inner {
    config: AppConfig,
    engine: Arc<dyn MediaEngine>,
    registry: RunRegistry,
    /// Engine processes allowed at once across every run.
    slots: Arc<Semaphore>,
}

/// Starts and tracks story and mixed-media runs.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("engine", &self.inner.engine.name())
            .field("active_runs", &self.inner.registry.len())
            .finish()
    }
}

impl Orchestrator {
    pub fn new(config: AppConfig, engine: Arc<dyn MediaEngine>) -> Self {
        let slots = Arc::new(Semaphore::new(config.limits.max_engine_processes.max(1)));
        Self {
            inner: Arc::new(Inner {
                config,
                engine,
                registry: RunRegistry::new(),
                slots,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn engine(&self) -> &Arc<dyn MediaEngine> {
        &self.inner.engine
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.inner.registry
    }

    /// Start a story run for `session_id`.
    ///
    /// Fails immediately, without spawning, for a malformed session id or a
    /// session that already has an active run.
    pub fn start_story(&self, session_id: &str) -> SlidecastResult<RunHandle> {
        self.start(session_id, Job::Story)
    }

    /// Start a mixed-media run. Unset options fall back to the `mix` config.
    pub fn start_mixed(&self, session_id: &str, options: MixOptions) -> SlidecastResult<RunHandle> {
        options.resolve(&self.inner.config.mix)?;
        self.start(session_id, Job::Mixed(options))
    }

    fn start(&self, session_id: &str, job: Job) -> SlidecastResult<RunHandle> {
        validate_session_id(session_id)?;
        let kind = job.kind();
        let guard = self.inner.registry.register(session_id, kind)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let interval = Duration::from_millis(self.inner.config.limits.progress_interval_ms);
        let reporter = ProgressReporter::new(tx, interval).with_registration(guard);

        let inner = self.inner.clone();
        let session = session_id.to_string();
        let span = tracing::info_span!("run", session_id = %session, %kind);
        let join = tokio::spawn(
            async move {
                let run = AssertUnwindSafe(inner.execute(&session, job, &reporter));
                match run.catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(inner.fail(
                        &reporter,
                        SlidecastError::engine("run task panicked"),
                    )),
                }
            }
            .instrument(span),
        );

        Ok(RunHandle {
            session_id: session_id.to_string(),
            kind,
            events: rx,
            join,
        })
    }
}

impl Inner {
    async fn execute(
        &self,
        session_id: &str,
        job: Job,
        reporter: &ProgressReporter,
    ) -> SlidecastResult<Artifact> {
        let stamp = RunClock::start().stamp();
        let kind = job.kind();
        let filename = format!("{}_{}_{}.mp4", kind.output_prefix(), session_id, stamp);
        tracing::info!(%filename, "Run started");
        reporter.transition(Stage::Initializing, "Preparing working directory", 0.0);

        let mut work = match WorkDir::create(&self.config.work_dir, session_id, &stamp) {
            Ok(work) => work,
            Err(err) => return Err(self.fail(reporter, err)),
        };
        let mut run = PipelineRun::new(
            session_id,
            kind,
            work.path().to_path_buf(),
            self.config.output_dir.join(&filename),
        );

        let produced = {
            let ctx = RunContext::new(
                &self.config,
                self.engine.as_ref(),
                reporter,
                &work,
                &self.slots,
            );
            match job {
                Job::Story => story::run(&ctx, &mut run, &filename).await,
                Job::Mixed(options) => mixed::run(&ctx, &mut run, &options, &filename).await,
            }
        };

        let outcome = match produced {
            Ok(path) => self.complete(&mut run, &mut work, reporter, path, &filename).await,
            Err(err) => Err(err),
        };

        match outcome {
            Ok(artifact) => {
                run.enter(Stage::Done);
                reporter.transition(Stage::Done, "Done", 100.0);
                reporter.finish(artifact.url.clone(), artifact.filename.clone());
                tracing::info!(path = %artifact.path.display(), "Run finished");
                Ok(artifact)
            }
            Err(err) => {
                run.enter(Stage::Failed);
                if let Err(cleanup) = work.remove().await {
                    tracing::warn!(
                        path = %work.path().display(),
                        error = %cleanup,
                        "Failed to remove work directory after failure"
                    );
                }
                Err(self.fail(reporter, err))
            }
        }
    }

    /// Publish the finished file and tear down the working directory.
    async fn complete(
        &self,
        run: &mut PipelineRun,
        work: &mut WorkDir,
        reporter: &ProgressReporter,
        produced: PathBuf,
        filename: &str,
    ) -> SlidecastResult<Artifact> {
        run.enter(Stage::Cleanup);
        reporter.transition(Stage::Cleanup, "Publishing output", 100.0);
        workdir::publish(&produced, &run.output_path).await?;

        if let Err(e) = work.remove().await {
            tracing::warn!(path = %work.path().display(), error = %e, "Failed to remove work directory");
        }

        Ok(Artifact {
            path: run.output_path.clone(),
            filename: filename.to_string(),
            url: public_url(&self.config.public_url_prefix, filename),
        })
    }

    fn fail(&self, reporter: &ProgressReporter, err: SlidecastError) -> SlidecastError {
        tracing::error!(error_kind = err.kind(), error = %err, "Run failed");
        reporter.fail(err.to_string());
        err
    }
}

fn stage_timeout(config: &AppConfig) -> Option<Duration> {
    match config.limits.stage_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    }
}

fn public_url(prefix: &str, filename: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), filename)
}

/// Everything a pipeline stage needs from its run.
pub(crate) struct RunContext<'a> {
    pub config: &'a AppConfig,
    pub engine: &'a dyn MediaEngine,
    pub reporter: &'a ProgressReporter,
    pub work: &'a WorkDir,
    slots: &'a Semaphore,
    timeout: Option<Duration>,
}

impl<'a> RunContext<'a> {
    pub fn new(
        config: &'a AppConfig,
        engine: &'a dyn MediaEngine,
        reporter: &'a ProgressReporter,
        work: &'a WorkDir,
        slots: &'a Semaphore,
    ) -> Self {
        Self {
            config,
            engine,
            reporter,
            work,
            slots,
            timeout: stage_timeout(config),
        }
    }

    /// Run one engine call under the global process cap and the stage
    /// timeout. Timing out drops the call, which kills its process.
    pub async fn engine_call<T, F>(&self, stage: Stage, call: F) -> SlidecastResult<T>
    where
        F: Future<Output = SlidecastResult<T>>,
    {
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| SlidecastError::engine("engine process slots closed"))?;

        match self.timeout {
            None => call.await,
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                tracing::warn!(%stage, secs = limit.as_secs(), "Engine call timed out");
                SlidecastError::StageTimeout {
                    stage: stage.to_string(),
                    secs: limit.as_secs(),
                }
            })?,
        }
    }
}
