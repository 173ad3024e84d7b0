//! Bucket-full detection
//!
//! When the bucket is full or the bait is gone the game refuses each cast
//! and the cast prompt comes straight back. That shows up as a run of casts
//! in quick succession.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Casts closer together than this count as refused
pub const CAST_INTERVAL_THRESHOLD: Duration = Duration::from_secs(1);

/// Number of consecutive quick casts that signal a full bucket
pub const REQUIRED_QUICK_CASTS: usize = 4;

/// Tracks recent cast times
#[derive(Debug, Default)]
pub struct CastMonitor {
    casts: VecDeque<Instant>,
}

impl CastMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cast at `at`; returns true when the bucket now reads full
    pub fn record_cast(&mut self, at: Instant) -> bool {
        self.casts.push_back(at);
        while self.casts.len() > REQUIRED_QUICK_CASTS {
            self.casts.pop_front();
        }

        self.casts.len() == REQUIRED_QUICK_CASTS
            && self
                .casts
                .iter()
                .zip(self.casts.iter().skip(1))
                .all(|(a, b)| b.saturating_duration_since(*a) < CAST_INTERVAL_THRESHOLD)
    }

    pub fn reset(&mut self) {
        self.casts.clear();
    }
}
