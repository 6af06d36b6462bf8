//! ffmpeg-backed [`MediaEngine`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;
use slidecast_common::error::{SlidecastError, SlidecastResult};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::engine::{
    ConcatRequest, MediaEngine, MixRequest, MuxRequest, ProgressFn, SegmentRequest,
};
use crate::filters;

/// Seconds without ffmpeg progress before a stall warning is logged.
const STALL_WARN_SECS: u64 = 10;

/// Runs one `ffmpeg` or `ffprobe` process per operation.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegEngine {
    /// Use `ffmpeg` and `ffprobe` from `PATH`.
    pub fn new() -> Self {
        Self::with_binaries("ffmpeg", "ffprobe")
    }

    pub fn with_binaries(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    async fn run_ffmpeg(
        &self,
        operation: &str,
        args: &[String],
        expected_secs: f64,
        progress: &ProgressFn<'_>,
    ) -> SlidecastResult<()> {
        tracing::debug!(operation, args = ?args, "Running ffmpeg");
        let mut child = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SlidecastError::engine(format!("Failed to start ffmpeg: {e}")))?;

        tracing::debug!(operation, pid = child.id(), "ffmpeg process started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SlidecastError::engine("Failed to capture ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| SlidecastError::engine("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut output = String::new();
            match stderr.read_to_string(&mut output).await {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let started = Instant::now();
        let mut lines = BufReader::new(stdout).lines();
        let mut state = ProgressState::default();
        let mut last_advance_secs = 0.0f64;
        let mut last_advance_wall = Instant::now();

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| SlidecastError::engine(format!("Failed reading ffmpeg progress: {e}")))?
        {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            state.update(key, value);
            if key != "progress" {
                continue;
            }

            if state.out_time_secs > last_advance_secs + 0.001 {
                last_advance_secs = state.out_time_secs;
                last_advance_wall = Instant::now();
            } else if last_advance_wall.elapsed().as_secs() >= STALL_WARN_SECS {
                tracing::warn!(
                    operation,
                    out_time_secs = state.out_time_secs,
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for {}s",
                    STALL_WARN_SECS
                );
                last_advance_wall = Instant::now();
            }
            progress(state.fraction(expected_secs));
        }

        let status = child
            .wait()
            .await
            .map_err(|e| SlidecastError::engine(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(SlidecastError::engine(format!(
                "ffmpeg {operation} failed (status {status}): {}",
                stderr_output.trim()
            )));
        }

        tracing::debug!(
            operation,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "ffmpeg finished"
        );
        progress(1.0);
        Ok(())
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn is_available(&self) -> bool {
        binary_runs(&self.ffmpeg).await && binary_runs(&self.ffprobe).await
    }

    async fn probe_duration(&self, path: &Path) -> SlidecastResult<f64> {
        ensure_exists(path)?;
        let output = Command::new(&self.ffprobe)
            .args(filters::probe_args(path))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SlidecastError::probe(format!("Failed to start ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(SlidecastError::probe(format!(
                "ffprobe failed for {}: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let duration = parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| {
                SlidecastError::probe(format!("No duration reported for {}", path.display()))
            })?;
        tracing::debug!(path = %path.display(), duration_secs = duration, "Probed duration");
        Ok(duration)
    }

    async fn render_image_segment(
        &self,
        request: &SegmentRequest,
        output: &Path,
        progress: &ProgressFn<'_>,
    ) -> SlidecastResult<PathBuf> {
        ensure_exists(&request.image)?;
        let args = filters::segment_args(request, output);
        self.run_ffmpeg("segment", &args, request.duration_secs, progress)
            .await?;
        Ok(output.to_path_buf())
    }

    async fn concatenate(
        &self,
        request: &ConcatRequest,
        output: &Path,
        progress: &ProgressFn<'_>,
    ) -> SlidecastResult<PathBuf> {
        let mut absolute = Vec::with_capacity(request.clips.len());
        for clip in &request.clips {
            ensure_exists(clip)?;
            absolute.push(tokio::fs::canonicalize(clip).await?);
        }
        tokio::fs::write(&request.manifest, filters::concat_manifest(&absolute)).await?;

        let args = filters::concat_args(request, output);
        self.run_ffmpeg("concat", &args, request.expected_secs, progress)
            .await?;
        Ok(output.to_path_buf())
    }

    async fn mux_audio(
        &self,
        request: &MuxRequest,
        output: &Path,
        progress: &ProgressFn<'_>,
    ) -> SlidecastResult<PathBuf> {
        ensure_exists(&request.video)?;
        ensure_exists(&request.audio)?;
        let args = filters::mux_args(request, output);
        self.run_ffmpeg("mux", &args, request.expected_secs, progress)
            .await?;
        Ok(output.to_path_buf())
    }

    async fn mix_and_apply(
        &self,
        request: &MixRequest,
        output: &Path,
        progress: &ProgressFn<'_>,
    ) -> SlidecastResult<PathBuf> {
        ensure_exists(&request.visual)?;
        ensure_exists(&request.foreground)?;
        ensure_exists(&request.background)?;
        let args = filters::mix_args(request, output);
        self.run_ffmpeg("mix", &args, request.duration_secs, progress)
            .await?;
        Ok(output.to_path_buf())
    }
}

fn ensure_exists(path: &Path) -> SlidecastResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(SlidecastError::asset_not_found(path))
    }
}

async fn binary_runs(binary: &Path) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

fn parse_probe_duration(raw: &str) -> Option<f64> {
    let parsed: ProbeOutput = serde_json::from_str(raw).ok()?;
    let duration = parsed.format?.duration?.trim().parse::<f64>().ok()?;
    (duration.is_finite() && duration > 0.0).then_some(duration)
}

/// Accumulates `-progress` key/value pairs between `progress=` markers.
#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // Despite the name, ffmpeg reports out_time_ms in microseconds.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.trim().parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value.trim() == "end";
            }
            _ => {}
        }
    }

    fn fraction(&self, expected_secs: f64) -> f64 {
        if self.complete {
            return 1.0;
        }
        if expected_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs / expected_secs).clamp(0.0, 1.0)
    }
}
