//! Capability surface of the encoding engine.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slidecast_common::config::RenderDefaults;
use slidecast_common::error::SlidecastResult;

/// Receives the fraction `[0.0, 1.0]` of the current call that is done.
pub type ProgressFn<'a> = dyn Fn(f64) + Send + Sync + 'a;

/// Linear zoom applied across a clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub start: f64,
    pub end: f64,
}

impl ZoomRange {
    /// Constant-rate dolly-in from 1.0 to `1.0 + duration_secs * zoom_rate`.
    pub fn dolly_in(duration_secs: f64, zoom_rate: f64) -> Self {
        Self {
            start: 1.0,
            end: 1.0 + duration_secs.max(0.0) * zoom_rate.max(0.0),
        }
    }
}

/// Fade windows baked into a clip, in seconds relative to the clip start.
/// A zero length means no fade on that edge.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FadeSpec {
    pub fade_in_secs: f64,
    pub fade_out_start_secs: f64,
    pub fade_out_secs: f64,
}

impl FadeSpec {
    /// Fades for the scene at `position` of `total`: no fade-in on the first
    /// scene, no fade-out on the last, windows clamped to the scene length.
    pub fn for_scene(position: usize, total: usize, duration_secs: f64, fade_secs: f64) -> Self {
        let fade = fade_secs.min(duration_secs).max(0.0);
        let mut spec = Self::default();
        if position > 0 {
            spec.fade_in_secs = fade;
        }
        if position + 1 < total {
            spec.fade_out_secs = fade;
            spec.fade_out_start_secs = (duration_secs - fade_secs).max(0.0);
        }
        spec
    }

    pub fn has_fade_in(&self) -> bool {
        self.fade_in_secs > 0.0
    }

    pub fn has_fade_out(&self) -> bool {
        self.fade_out_secs > 0.0
    }
}

/// Fixed output profile for scene clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipProfile {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub crf: u8,
    pub preset: String,
    /// Extra seconds of zoom frames rendered before truncation.
    pub margin_secs: f64,
}

impl From<&RenderDefaults> for ClipProfile {
    fn from(render: &RenderDefaults) -> Self {
        Self {
            width: render.width,
            height: render.height,
            fps: render.fps,
            crf: render.crf,
            preset: render.preset.clone(),
            margin_secs: render.render_margin_secs,
        }
    }
}

/// Render one still image into a clip of exactly `duration_secs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRequest {
    pub image: PathBuf,
    pub duration_secs: f64,
    pub zoom: ZoomRange,
    pub fade: FadeSpec,
    pub profile: ClipProfile,
}

/// Join pre-rendered clips in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcatRequest {
    pub clips: Vec<PathBuf>,
    /// Where the ordered join manifest is written.
    pub manifest: PathBuf,
    /// Nominal joined duration, used for progress.
    pub expected_secs: f64,
}

/// Attach narration to a picture track, copying video verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuxRequest {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub expected_secs: f64,
    pub audio_bitrate_kbps: u32,
}

/// Loop one visual under mixed foreground and background audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixRequest {
    pub visual: PathBuf,
    pub visual_is_image: bool,
    pub foreground: PathBuf,
    pub background: PathBuf,
    pub background_volume: f64,
    /// Output length, pinned to the probed foreground duration.
    pub duration_secs: f64,
    pub fps: u32,
    pub crf: u8,
    pub preset: String,
    pub audio_bitrate_kbps: u32,
}

/// Operations the pipeline needs from an encoding engine.
///
/// Every call either produces `output` and returns its path, or fails.
/// Implementations report intra-call progress through `progress` when they
/// can; a final `1.0` is not required.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Engine name for logs.
    fn name(&self) -> &str;

    /// Check if the engine can run on this system.
    async fn is_available(&self) -> bool;

    /// Duration of a media file in seconds.
    async fn probe_duration(&self, path: &Path) -> SlidecastResult<f64>;

    async fn render_image_segment(
        &self,
        request: &SegmentRequest,
        output: &Path,
        progress: &ProgressFn<'_>,
    ) -> SlidecastResult<PathBuf>;

    async fn concatenate(
        &self,
        request: &ConcatRequest,
        output: &Path,
        progress: &ProgressFn<'_>,
    ) -> SlidecastResult<PathBuf>;

    async fn mux_audio(
        &self,
        request: &MuxRequest,
        output: &Path,
        progress: &ProgressFn<'_>,
    ) -> SlidecastResult<PathBuf>;

    async fn mix_and_apply(
        &self,
        request: &MixRequest,
        output: &Path,
        progress: &ProgressFn<'_>,
    ) -> SlidecastResult<PathBuf>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dolly_in_scales_with_duration() {
        let zoom = ZoomRange::dolly_in(10.0, 0.02);
        assert!((zoom.start - 1.0).abs() < 1e-9);
        assert!((zoom.end - 1.2).abs() < 1e-9);

        let still = ZoomRange::dolly_in(10.0, 0.0);
        assert!((still.end - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_edge_scenes_skip_outer_fades() {
        let first = FadeSpec::for_scene(0, 3, 4.0, 0.5);
        assert!(!first.has_fade_in());
        assert!(first.has_fade_out());
        assert!((first.fade_out_start_secs - 3.5).abs() < 1e-9);

        let middle = FadeSpec::for_scene(1, 3, 4.0, 0.5);
        assert!(middle.has_fade_in() && middle.has_fade_out());

        let last = FadeSpec::for_scene(2, 3, 4.0, 0.5);
        assert!(last.has_fade_in());
        assert!(!last.has_fade_out());

        let only = FadeSpec::for_scene(0, 1, 4.0, 0.5);
        assert_eq!(only, FadeSpec::default());
    }

    #[test]
    fn test_fades_clamped_to_short_scenes() {
        let spec = FadeSpec::for_scene(1, 3, 0.3, 0.5);
        assert!((spec.fade_in_secs - 0.3).abs() < 1e-9);
        assert!((spec.fade_out_secs - 0.3).abs() < 1e-9);
        assert_eq!(spec.fade_out_start_secs, 0.0);
    }
}
