//! Slidecast Render Engine
//!
//! The encoding engine is consumed as a capability, never as a library:
//! a small async surface ([`MediaEngine`]) that the pipeline drives and
//! tests replace with a fake.
//!
//! # Operations
//!
//! ```text
//! image ──► render_image_segment ──► clip_000.mp4 ┐
//! image ──► render_image_segment ──► clip_001.mp4 ├─► concatenate ──► joined.mp4
//! image ──► render_image_segment ──► clip_002.mp4 ┘                      │
//!                                                  narration ──► mux_audio ──► final.mp4
//!
//! visual + narration + background ──► mix_and_apply ──► final.mp4
//! ```
//!
//! [`FfmpegEngine`] implements the surface with one `ffmpeg`/`ffprobe`
//! process per call.

pub mod engine;
pub mod ffmpeg;
pub mod filters;

pub use engine::*;
pub use ffmpeg::FfmpegEngine;
