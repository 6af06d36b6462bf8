//! Subtitle parsing into timed segments.
//!
//! The accepted format is block based: blocks are separated by blank lines
//! and carry a `start --> end` line, normally on their second line (after a
//! numeric cue id). Timestamps are `HH:MM:SS.mmm` or `HH:MM:SS,mmm`; the
//! WebVTT short form `MM:SS.mmm` is accepted as well.
//!
//! Blocks without a usable timestamp line are skipped, never reported as
//! errors. An input with no usable blocks yields an empty list and it is up
//! to the caller to treat that as fatal.

use std::path::Path;

use serde::{Deserialize, Serialize};
use slidecast_common::error::SlidecastResult;

/// One caption with its absolute time range in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedSegment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

impl TimedSegment {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Parse raw subtitle text into ordered segments.
pub fn parse_subtitles(raw: &str) -> Vec<TimedSegment> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    let mut segments = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    let mut skipped = 0usize;

    for line in raw.lines().chain(std::iter::once("")) {
        let line = line.trim_end_matches('\r');
        if !line.trim().is_empty() {
            block.push(line);
            continue;
        }
        if block.is_empty() {
            continue;
        }
        match parse_block(&block) {
            Some(segment) => segments.push(segment),
            None => skipped += 1,
        }
        block.clear();
    }

    tracing::debug!(
        segments = segments.len(),
        skipped_blocks = skipped,
        "Parsed subtitles"
    );
    segments
}

/// Read and parse a subtitle file. Invalid UTF-8 is replaced rather than
/// rejected.
pub fn load_subtitles(path: &Path) -> SlidecastResult<Vec<TimedSegment>> {
    let bytes = std::fs::read(path)?;
    Ok(parse_subtitles(&String::from_utf8_lossy(&bytes)))
}

fn parse_block(block: &[&str]) -> Option<TimedSegment> {
    let (timing, text_lines) = match block.get(1).and_then(|line| parse_timing(line)) {
        Some(timing) => (timing, &block[2..]),
        // WebVTT cues may omit the id line.
        None => (parse_timing(block.first()?)?, &block[1..]),
    };

    let (start_ms, end_ms) = timing;
    if end_ms <= start_ms {
        return None;
    }

    let text = text_lines
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n");

    Some(TimedSegment {
        start_ms,
        end_ms,
        text,
    })
}

/// Parse a `start --> end [cue settings]` line.
fn parse_timing(line: &str) -> Option<(u64, u64)> {
    let (start, end) = line.split_once("-->")?;
    let start = parse_timestamp(start.trim())?;
    let end = parse_timestamp(end.split_whitespace().next()?)?;
    Some((start, end))
}

/// Parse `HH:MM:SS{.,}mmm` (or `MM:SS{.,}mmm`) into milliseconds.
pub fn parse_timestamp(value: &str) -> Option<u64> {
    let parts: Vec<&str> = value.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (parse_digits(h)?, parse_digits(m)?, *s),
        [m, s] => (0, parse_digits(m)?, *s),
        _ => return None,
    };

    let (secs, millis) = match seconds.split_once(|c: char| c == '.' || c == ',') {
        Some((secs, frac)) => (parse_digits(secs)?, parse_millis(frac)?),
        None => (parse_digits(seconds)?, 0),
    };

    if minutes >= 60 || secs >= 60 {
        return None;
    }

    hours
        .checked_mul(3_600_000)?
        .checked_add(minutes * 60_000 + secs * 1_000 + millis)
}

fn parse_digits(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Fractional seconds scaled to milliseconds: `5` is 500, `0512` is 51.
fn parse_millis(frac: &str) -> Option<u64> {
    if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut digits: String = frac.chars().take(3).collect();
    while digits.len() < 3 {
        digits.push('0');
    }
    digits.parse().ok()
}
