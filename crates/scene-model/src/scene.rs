//! Scene plan derivation.
//!
//! A scene pairs one subtitle segment with one image. Segments and images
//! are zipped by position after the images are naturally sorted; when the
//! images run out the last one is reused.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use slidecast_common::error::{SlidecastError, SlidecastResult};

use crate::natural::sort_paths_natural;
use crate::subtitles::TimedSegment;

/// Image extensions picked up from an image-set directory.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// Extensions accepted as a looping video visual.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "mkv", "webm", "avi"];

/// One unit of the render plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// Zero-based position in playback order.
    pub index: usize,

    /// Still image shown for the whole scene.
    pub image_path: PathBuf,

    /// Absolute start offset in the narration (ms).
    pub start_ms: u64,

    /// Absolute end offset in the narration (ms).
    pub end_ms: u64,

    /// Caption text.
    pub text: String,
}

impl Scene {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_ms() as f64 / 1000.0
    }
}

/// Policy for pairing segments with images.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    /// Reject a plan whose image count differs from its segment count.
    pub strict_image_count: bool,

    /// Extend each scene to the start of the next one (and the first scene
    /// back to zero) so subtitle gaps do not shorten the picture track.
    pub close_gaps: bool,
}

/// Derive the ordered scene plan.
///
/// `images` may be given in any order; they are sorted naturally by file
/// name before pairing. Excess images are ignored.
pub fn derive_scenes(
    segments: &[TimedSegment],
    images: &[PathBuf],
    options: &PlanOptions,
) -> SlidecastResult<Vec<Scene>> {
    if segments.is_empty() {
        return Err(SlidecastError::parse_empty(
            "subtitles contain no timed segments",
        ));
    }

    let mut images = images.to_vec();
    sort_paths_natural(&mut images);

    let last_image = images
        .last()
        .cloned()
        .ok_or_else(|| SlidecastError::input_missing("no images available for scenes"))?;

    if images.len() != segments.len() {
        if options.strict_image_count {
            return Err(SlidecastError::input_missing(format!(
                "{} subtitle segments but {} images",
                segments.len(),
                images.len()
            )));
        }
        tracing::warn!(
            segments = segments.len(),
            images = images.len(),
            "Image count does not match segment count"
        );
    }

    let mut scenes: Vec<Scene> = segments
        .iter()
        .enumerate()
        .map(|(index, segment)| Scene {
            index,
            image_path: images.get(index).cloned().unwrap_or_else(|| last_image.clone()),
            start_ms: segment.start_ms,
            end_ms: segment.end_ms,
            text: segment.text.clone(),
        })
        .collect();

    if options.close_gaps {
        close_gaps(&mut scenes);
    }

    Ok(scenes)
}

fn close_gaps(scenes: &mut [Scene]) {
    if let Some(first) = scenes.first_mut() {
        first.start_ms = 0;
    }
    for i in 1..scenes.len() {
        let next_start = scenes[i].start_ms;
        let prev = &mut scenes[i - 1];
        if next_start > prev.end_ms {
            prev.end_ms = next_start;
        }
    }
}

/// List the image files in `dir`, naturally sorted. Hidden files and
/// non-image extensions are skipped.
pub fn list_images(dir: &Path) -> SlidecastResult<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && !is_hidden(&path) && is_image(&path) {
            images.push(path);
        }
    }
    sort_paths_natural(&mut images);
    Ok(images)
}

/// Whether the path has one of the [`IMAGE_EXTENSIONS`].
pub fn is_image(path: &Path) -> bool {
    has_extension(path, IMAGE_EXTENSIONS)
}

/// Whether the path has one of the [`VIDEO_EXTENSIONS`].
pub fn is_video(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS)
}

fn has_extension(path: &Path, known: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| known.iter().any(|k| k.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Sum of scene durations; the nominal length of the concatenated stream.
pub fn total_duration_ms(scenes: &[Scene]) -> u64 {
    scenes.iter().map(Scene::duration_ms).sum()
}
