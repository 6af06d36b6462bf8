//! Clock and timing utilities for pipeline runs.
//!
//! Each run is anchored to a monotonic epoch captured when it starts. This
//! module provides:
//! - The run epoch and its wall-clock stamp (used in artifact names)
//! - A rate controller that bounds how often intra-stage progress is emitted

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Monotonic clock anchored to the start of a pipeline run.
#[derive(Debug, Clone)]
pub struct RunClock {
    epoch: Instant,
    epoch_wall: DateTime<Utc>,
}

impl RunClock {
    /// Create a clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: Utc::now(),
        }
    }

    /// Nanoseconds elapsed since the run started.
    pub fn elapsed_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Filesystem-safe stamp with millisecond resolution, e.g. `20261016T101500123`.
    pub fn stamp(&self) -> String {
        self.epoch_wall.format("%Y%m%dT%H%M%S%3f").to_string()
    }
}

/// Bounds how often a recurring signal is forwarded.
#[derive(Debug)]
pub struct RateController {
    interval_ns: u64,
    last_tick_ns: Option<u64>,
}

impl RateController {
    /// Create a controller that lets at most one tick through per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ns: interval.as_nanos() as u64,
            last_tick_ns: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ns: u64) -> bool {
        match self.last_tick_ns {
            None => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            Some(last) if current_ns >= last + self.interval_ns => {
                self.last_tick_ns = Some(current_ns);
                true
            }
            _ => false,
        }
    }

    /// Forget the last tick so the next call fires unconditionally.
    pub fn reset(&mut self) {
        self.last_tick_ns = None;
    }
}
