//! Slidecast Scene Model
//!
//! Turns authoring inputs into an ordered render plan:
//! - **Subtitles:** SRT/WebVTT-style blocks parsed into [`TimedSegment`]s
//! - **Natural ordering:** numeric-aware filename comparison for image sets
//! - **Scenes:** segments zipped with images into absolute-time [`Scene`]s
//!
//! Ordering is preserved end to end: subtitle order is scene order is
//! playback order.

pub mod natural;
pub mod scene;
pub mod subtitles;

pub use natural::*;
pub use scene::*;
pub use subtitles::*;
