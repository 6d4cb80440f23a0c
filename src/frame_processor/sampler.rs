// SPDX-License-Identifier: GPL-3.0-only

//! Decode rate limiting
//!
//! Frames arrive at the capture rate; the sampler admits at most
//! `max_rate` of them per second and the rest are dropped, never queued.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct FrameSampler {
    min_interval: Duration,
    last_sample: Option<Instant>,
}

impl FrameSampler {
    /// Sampler admitting at most `max_rate` frames per second (minimum 1)
    pub fn new(max_rate: u32) -> Self {
        Self::with_interval(Duration::from_secs(1) / max_rate.max(1))
    }

    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_sample: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Decide whether a frame captured at `captured_at` should be decoded
    pub fn should_sample(&mut self, captured_at: Instant) -> bool {
        let due = match self.last_sample {
            None => true,
            Some(last) => captured_at.saturating_duration_since(last) >= self.min_interval,
        };
        if due {
            self.last_sample = Some(captured_at);
        }
        due
    }

    /// Forget the last sample so the next frame is admitted
    pub fn reset(&mut self) {
        self.last_sample = None;
    }
}
