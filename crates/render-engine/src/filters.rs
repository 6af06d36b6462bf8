//! ffmpeg argument and filter-graph builders.
//!
//! Everything here is pure so the exact command lines can be unit tested
//! without an ffmpeg binary.

use std::path::{Path, PathBuf};

use crate::engine::{ConcatRequest, FadeSpec, MixRequest, MuxRequest, SegmentRequest};

/// Supersampling factor applied before zoompan to avoid sub-pixel jitter.
const ZOOM_SUPERSAMPLE: u32 = 2;

/// Options shared by every ffmpeg invocation: overwrite, quiet stderr,
/// machine-readable progress on stdout.
pub fn base_args() -> Vec<String> {
    [
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostats",
        "-progress",
        "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Number of frames in a clip of `duration_secs` at `fps`.
pub fn frame_count(duration_secs: f64, fps: u32) -> u64 {
    (duration_secs * fps as f64).round().max(0.0) as u64
}

/// Ken-Burns filter chain for one still image.
///
/// Zoom advances by a fixed step per output frame so it reaches
/// `zoom.end` exactly at `duration_secs`; the input is looped for longer
/// than needed and `trim` cuts the stream to the target length.
pub fn segment_filter(request: &SegmentRequest) -> String {
    let profile = &request.profile;
    let fps = profile.fps.max(1);
    let sw = profile.width * ZOOM_SUPERSAMPLE;
    let sh = profile.height * ZOOM_SUPERSAMPLE;
    let frames = frame_count(request.duration_secs, fps).max(1);
    let step = (request.zoom.end - request.zoom.start) / frames as f64;

    let mut chain = vec![
        format!("scale={sw}:{sh}:force_original_aspect_ratio=increase"),
        format!("crop={sw}:{sh}"),
        format!(
            "zoompan=z='min({start:.6}+{step:.9}*on,{end:.6})':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=1:s={w}x{h}:fps={fps}",
            start = request.zoom.start,
            end = request.zoom.end,
            w = profile.width,
            h = profile.height,
        ),
        format!("trim=duration={:.6}", request.duration_secs),
        "setpts=PTS-STARTPTS".to_string(),
    ];
    chain.extend(fade_filters(&request.fade));
    chain.push("format=yuv420p".to_string());
    chain.join(",")
}

fn fade_filters(fade: &FadeSpec) -> Vec<String> {
    let mut filters = Vec::new();
    if fade.has_fade_in() {
        filters.push(format!("fade=t=in:st=0:d={:.3}", fade.fade_in_secs));
    }
    if fade.has_fade_out() {
        filters.push(format!(
            "fade=t=out:st={:.3}:d={:.3}",
            fade.fade_out_start_secs, fade.fade_out_secs
        ));
    }
    filters
}

/// Full argument list for rendering one scene clip.
pub fn segment_args(request: &SegmentRequest, output: &Path) -> Vec<String> {
    let profile = &request.profile;
    let fps = profile.fps.max(1).to_string();
    let source_secs = request.duration_secs + profile.margin_secs.max(0.0);

    let mut args = base_args();
    args.extend([
        "-loop".to_string(),
        "1".to_string(),
        "-framerate".to_string(),
        fps.clone(),
        "-t".to_string(),
        format!("{source_secs:.6}"),
        "-i".to_string(),
        request.image.display().to_string(),
        "-filter_complex".to_string(),
        format!("[0:v]{}[vout]", segment_filter(request)),
        "-map".to_string(),
        "[vout]".to_string(),
        "-t".to_string(),
        format!("{:.6}", request.duration_secs),
        "-r".to_string(),
        fps.clone(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        profile.preset.clone(),
        "-crf".to_string(),
        profile.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-g".to_string(),
        fps.clone(),
        "-keyint_min".to_string(),
        fps,
        "-sc_threshold".to_string(),
        "0".to_string(),
        "-an".to_string(),
        output.display().to_string(),
    ]);
    args
}

/// Concat demuxer manifest listing `clips` in order.
pub fn concat_manifest(clips: &[PathBuf]) -> String {
    let mut manifest = String::from("ffconcat version 1.0\n");
    for clip in clips {
        let escaped = clip.display().to_string().replace('\'', "'\\''");
        manifest.push_str(&format!("file '{escaped}'\n"));
    }
    manifest
}

/// Stream-copy join with regenerated, zero-based timestamps.
pub fn concat_args(request: &ConcatRequest, output: &Path) -> Vec<String> {
    let mut args = base_args();
    args.extend([
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-fflags".to_string(),
        "+genpts".to_string(),
        "-i".to_string(),
        request.manifest.display().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        "-avoid_negative_ts".to_string(),
        "make_zero".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.display().to_string(),
    ]);
    args
}

/// Narration mux: video copied, audio re-encoded, shorter input wins.
pub fn mux_args(request: &MuxRequest, output: &Path) -> Vec<String> {
    let mut args = base_args();
    args.extend([
        "-i".to_string(),
        request.video.display().to_string(),
        "-i".to_string(),
        request.audio.display().to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", request.audio_bitrate_kbps.max(64)),
        "-shortest".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.display().to_string(),
    ]);
    args
}

/// Filter graph for the mixed-media job. Input 0 is the visual, 1 the
/// foreground narration, 2 the looped background.
pub fn mix_filter(request: &MixRequest) -> String {
    format!(
        "[0:v]scale=trunc(iw/2)*2:trunc(ih/2)*2,fps={fps},format=yuv420p[vout];\
         [2:a]volume={volume:.3}[bg];\
         [1:a][bg]amix=inputs=2:duration=first:dropout_transition=0:normalize=1[aout]",
        fps = request.fps.max(1),
        volume = request.background_volume.max(0.0),
    )
}

/// Full argument list for the mixed-media job. Both looped inputs never
/// end on their own, so the output length is pinned with `-t`.
pub fn mix_args(request: &MixRequest, output: &Path) -> Vec<String> {
    let fps = request.fps.max(1).to_string();
    let mut args = base_args();

    if request.visual_is_image {
        args.extend([
            "-loop".to_string(),
            "1".to_string(),
            "-framerate".to_string(),
            fps.clone(),
        ]);
    } else {
        args.extend(["-stream_loop".to_string(), "-1".to_string()]);
    }
    args.extend([
        "-i".to_string(),
        request.visual.display().to_string(),
        "-i".to_string(),
        request.foreground.display().to_string(),
        "-stream_loop".to_string(),
        "-1".to_string(),
        "-i".to_string(),
        request.background.display().to_string(),
        "-filter_complex".to_string(),
        mix_filter(request),
        "-map".to_string(),
        "[vout]".to_string(),
        "-map".to_string(),
        "[aout]".to_string(),
        "-t".to_string(),
        format!("{:.3}", request.duration_secs),
        "-r".to_string(),
        fps,
        "-c:v".to_string(),
        "libx264".to_string(),
        "-preset".to_string(),
        request.preset.clone(),
        "-crf".to_string(),
        request.crf.to_string(),
    ]);
    if request.visual_is_image {
        args.extend(["-tune".to_string(), "stillimage".to_string()]);
    }
    args.extend([
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{}k", request.audio_bitrate_kbps.max(64)),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.display().to_string(),
    ]);
    args
}

/// ffprobe arguments reporting the container duration as JSON.
pub fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        path.display().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ClipProfile, ZoomRange};

    fn profile() -> ClipProfile {
        ClipProfile {
            width: 1080,
            height: 1920,
            fps: 30,
            crf: 23,
            preset: "medium".to_string(),
            margin_secs: 2.0,
        }
    }

    fn segment(position: usize, total: usize, duration_secs: f64) -> SegmentRequest {
        SegmentRequest {
            image: PathBuf::from("/work/img/1.png"),
            duration_secs,
            zoom: ZoomRange::dolly_in(duration_secs, 0.02),
            fade: FadeSpec::for_scene(position, total, duration_secs, 0.5),
            profile: profile(),
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
        args.windows(2)
            .filter(|w| w[0] == flag)
            .map(|w| w[1].as_str())
            .collect()
    }

    #[test]
    fn test_segment_renders_margin_then_truncates() {
        let args = segment_args(&segment(1, 3, 4.0), Path::new("/work/clip_001.mp4"));
        assert_eq!(value_after(&args, "-t"), vec!["6.000000", "4.000000"]);
        assert_eq!(value_after(&args, "-g"), vec!["30"]);
        assert_eq!(value_after(&args, "-keyint_min"), vec!["30"]);
        assert_eq!(value_after(&args, "-r"), vec!["30"]);
        assert_eq!(args.last().unwrap(), "/work/clip_001.mp4");

        let filter = value_after(&args, "-filter_complex")[0];
        assert!(filter.contains("trim=duration=4.000000"));
        assert!(filter.contains("s=1080x1920"));
        assert!(filter.contains("min(1.000000+0.000666667*on,1.080000)"));
    }

    #[test]
    fn test_segment_fades_follow_position() {
        let first = segment_filter(&segment(0, 3, 4.0));
        assert!(!first.contains("fade=t=in"));
        assert!(first.contains("fade=t=out:st=3.500:d=0.500"));

        let middle = segment_filter(&segment(1, 3, 4.0));
        assert!(middle.contains("fade=t=in:st=0:d=0.500"));
        assert!(middle.contains("fade=t=out"));

        let last = segment_filter(&segment(2, 3, 4.0));
        assert!(last.contains("fade=t=in"));
        assert!(!last.contains("fade=t=out"));
    }

    #[test]
    fn test_zero_zoom_rate_holds_still() {
        let mut request = segment(0, 1, 3.0);
        request.zoom = ZoomRange::dolly_in(3.0, 0.0);
        assert!(segment_filter(&request).contains("min(1.000000+0.000000000*on,1.000000)"));
    }

    #[test]
    fn test_frame_count_rounds() {
        assert_eq!(frame_count(4.0, 30), 120);
        assert_eq!(frame_count(1.234, 30), 37);
        assert_eq!(frame_count(0.0, 30), 0);
    }

    #[test]
    fn test_concat_manifest_is_ordered_and_escaped() {
        let manifest = concat_manifest(&[
            PathBuf::from("/work/clip_000.mp4"),
            PathBuf::from("/work/it's/clip_001.mp4"),
        ]);
        assert_eq!(
            manifest,
            "ffconcat version 1.0\nfile '/work/clip_000.mp4'\nfile '/work/it'\\''s/clip_001.mp4'\n"
        );
    }

    #[test]
    fn test_concat_regenerates_timestamps() {
        let request = ConcatRequest {
            clips: vec![],
            manifest: PathBuf::from("/work/concat.txt"),
            expected_secs: 3.0,
        };
        let args = concat_args(&request, Path::new("/work/joined.mp4"));
        assert_eq!(value_after(&args, "-fflags"), vec!["+genpts"]);
        assert_eq!(value_after(&args, "-avoid_negative_ts"), vec!["make_zero"]);
        assert_eq!(value_after(&args, "-c"), vec!["copy"]);
        let fflags = args.iter().position(|a| a == "-fflags").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(fflags < input);
    }

    #[test]
    fn test_mux_copies_video_and_takes_shortest() {
        let request = MuxRequest {
            video: PathBuf::from("/work/joined.mp4"),
            audio: PathBuf::from("/s/audio/voice.mp3"),
            expected_secs: 3.0,
            audio_bitrate_kbps: 192,
        };
        let args = mux_args(&request, Path::new("/work/final.mp4"));
        assert_eq!(value_after(&args, "-c:v"), vec!["copy"]);
        assert_eq!(value_after(&args, "-c:a"), vec!["aac"]);
        assert_eq!(value_after(&args, "-b:a"), vec!["192k"]);
        assert!(args.iter().any(|a| a == "-shortest"));
    }

    fn mix_request(visual_is_image: bool) -> MixRequest {
        MixRequest {
            visual: PathBuf::from("/s/visual/cover.png"),
            visual_is_image,
            foreground: PathBuf::from("/s/audio/voice.mp3"),
            background: PathBuf::from("/s/background/music.mp3"),
            background_volume: 0.3,
            duration_secs: 10.0,
            fps: 30,
            crf: 23,
            preset: "medium".to_string(),
            audio_bitrate_kbps: 192,
        }
    }

    #[test]
    fn test_mix_pins_duration_and_loops_background() {
        let args = mix_args(&mix_request(true), Path::new("/work/final.mp4"));
        assert_eq!(value_after(&args, "-t"), vec!["10.000"]);
        assert_eq!(value_after(&args, "-loop"), vec!["1"]);
        assert_eq!(value_after(&args, "-stream_loop"), vec!["-1"]);
        assert_eq!(value_after(&args, "-tune"), vec!["stillimage"]);
        assert!(!args.iter().any(|a| a == "-shortest"));

        let filter = mix_filter(&mix_request(true));
        assert!(filter.contains("[2:a]volume=0.300[bg]"));
        assert!(filter.contains("amix=inputs=2:duration=first"));
        assert!(filter.contains("normalize=1"));
    }

    #[test]
    fn test_mix_video_visual_loops_forever() {
        let args = mix_args(&mix_request(false), Path::new("/work/final.mp4"));
        assert_eq!(value_after(&args, "-stream_loop"), vec!["-1", "-1"]);
        assert!(value_after(&args, "-loop").is_empty());
        assert!(value_after(&args, "-tune").is_empty());
    }
}
