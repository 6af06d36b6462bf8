//! Shared fixtures: a scripted engine and on-disk session builders.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use slidecast_common::config::AppConfig;
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_pipeline::{join_run, Artifact, RunEvent, RunHandle, Stage};
use slidecast_render_engine::{
    ConcatRequest, MediaEngine, MixRequest, MuxRequest, ProgressFn, SegmentRequest,
};

#[derive(Debug, Clone)]
pub enum Call {
    Probe(PathBuf),
    Segment(SegmentRequest),
    Concat(ConcatRequest),
    Mux(MuxRequest),
    Mix(MixRequest),
}

/// Engine that writes placeholder outputs instead of encoding.
#[derive(Debug)]
pub struct FakeEngine {
    calls: Mutex<Vec<Call>>,
    fail_on: Option<&'static str>,
    probe_secs: f64,
    segment_delay: Option<Duration>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: None,
            probe_secs: 10.0,
            segment_delay: None,
        }
    }

    /// Fail the named operation (`probe`, `segment`, `concat`, `mux`, `mix`).
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    pub fn with_probe_secs(mut self, secs: f64) -> Self {
        self.probe_secs = secs;
        self
    }

    pub fn with_segment_delay(mut self, delay: Duration) -> Self {
        self.segment_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn segments(&self) -> Vec<SegmentRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Segment(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    fn record(&self, operation: &str, call: Call) -> SlidecastResult<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail_on == Some(operation) {
            return Err(SlidecastError::engine(format!("injected {operation} failure")));
        }
        Ok(())
    }

    fn produce(&self, output: &Path, progress: &ProgressFn<'_>) -> SlidecastResult<PathBuf> {
        progress(0.25);
        progress(0.75);
        std::fs::write(output, b"fake media")?;
        progress(1.0);
        Ok(output.to_path_buf())
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn probe_duration(&self, path: &Path) -> SlidecastResult<f64> {
        self.record("probe", Call::Probe(path.to_path_buf()))?;
        Ok(self.probe_secs)
    }

    async fn render_image_segment(
        &self,
        request: &SegmentRequest,
        output: &Path,
        progress: &ProgressFn<'_>,
    ) -> SlidecastResult<PathBuf> {
        self.record("segment", Call::Segment(request.clone()))?;
        if let Some(delay) = self.segment_delay {
            tokio::time::sleep(delay).await;
        }
        self.produce(output, progress)
    }

    async fn concatenate(
        &self,
        request: &ConcatRequest,
        output: &Path,
        progress: &ProgressFn<'_>,
    ) -> SlidecastResult<PathBuf> {
        self.record("concat", Call::Concat(request.clone()))?;
        for clip in &request.clips {
            if !clip.is_file() {
                return Err(SlidecastError::asset_not_found(clip));
            }
        }
        self.produce(output, progress)
    }

    async fn mux_audio(
        &self,
        request: &MuxRequest,
        output: &Path,
        progress: &ProgressFn<'_>,
    ) -> SlidecastResult<PathBuf> {
        self.record("mux", Call::Mux(request.clone()))?;
        self.produce(output, progress)
    }

    async fn mix_and_apply(
        &self,
        request: &MixRequest,
        output: &Path,
        progress: &ProgressFn<'_>,
    ) -> SlidecastResult<PathBuf> {
        self.record("mix", Call::Mix(request.clone()))?;
        self.produce(output, progress)
    }
}

/// Temporary sessions/work/output roots with a matching config.
pub struct Fixture {
    pub root: tempfile::TempDir,
    pub config: AppConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let mut config = AppConfig {
            sessions_dir: root.path().join("sessions"),
            work_dir: root.path().join("work"),
            output_dir: root.path().join("outputs"),
            ..AppConfig::default()
        };
        config.limits.progress_interval_ms = 0;
        Self { root, config }
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.config.sessions_dir.join(session_id)
    }

    pub fn write(&self, session_id: &str, relative: &str, content: &[u8]) {
        let path = self.session_dir(session_id).join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Narration, subtitles and the named images.
    pub fn story_session(&self, session_id: &str, subtitles: &str, images: &[&str]) {
        self.write(session_id, "audio/voice.mp3", b"narration");
        self.write(session_id, "subtitles/story.srt", subtitles.as_bytes());
        for image in images {
            self.write(session_id, &format!("images/{image}"), b"image");
        }
    }

    pub fn mixed_session(&self, session_id: &str, visual: &str) {
        self.write(session_id, "audio/voice.mp3", b"narration");
        self.write(session_id, "background/loop.mp3", b"background");
        self.write(session_id, &format!("visual/{visual}"), b"visual");
    }

    pub fn work_entries(&self) -> usize {
        count_entries(&self.config.work_dir)
    }

    pub fn output_entries(&self) -> usize {
        count_entries(&self.config.output_dir)
    }
}

fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

pub const THREE_BLOCKS: &str = "1\n00:00:00,000 --> 00:00:02,000\nFirst line\n\n\
2\n00:00:02,000 --> 00:00:04,500\nSecond line\nwraps here\n\n\
3\n00:00:04,500 --> 00:00:07,000\nThird line\n";

/// Drain every event, then wait for the run result.
pub async fn run_to_end(mut handle: RunHandle) -> (Vec<RunEvent>, SlidecastResult<Artifact>) {
    let mut events = Vec::new();
    while let Some(event) = handle.events.recv().await {
        events.push(event);
    }
    let result = join_run(handle.join).await;
    (events, result)
}

pub fn status_percents(events: &[RunEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Status(p) => Some(p.percent),
            _ => None,
        })
        .collect()
}

/// Stages of the status events with consecutive repeats collapsed.
pub fn stage_sequence(events: &[RunEvent]) -> Vec<Stage> {
    let mut stages: Vec<Stage> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Status(p) => Some(p.stage),
            _ => None,
        })
        .collect();
    stages.dedup();
    stages
}

pub fn messages(events: &[RunEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Status(p) => Some(p.message.clone()),
            _ => None,
        })
        .collect()
}

pub fn terminal_events(events: &[RunEvent]) -> Vec<&RunEvent> {
    events.iter().filter(|e| e.is_terminal()).collect()
}

pub fn engine_arc(engine: FakeEngine) -> Arc<FakeEngine> {
    Arc::new(engine)
}
