//! Randomized actuation durations
//!
//! Every nominal duration is scaled by a uniform factor in
//! `[1 - r/100, 1 + r/100]`, rounded to the millisecond and floored at
//! [`MIN_DURATION`]. A reporter logs how far each actual duration strayed
//! from nominal; it never feeds back into control flow.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use rand::Rng;

/// Shortest duration ever produced, in seconds
pub const MIN_DURATION: f64 = 0.01;

/// Upper bound of the jitter percentage
pub const MAX_JITTER_PERCENT: u8 = 50;

/// Default jitter percentage
pub const DEFAULT_JITTER_PERCENT: u8 = 15;

/// Multiplicative jitter of `percent` percent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    percent: u8,
}

impl Jitter {
    /// Jitter of `percent`, clamped to 0-50
    pub fn new(percent: u8) -> Self {
        Self {
            percent: percent.min(MAX_JITTER_PERCENT),
        }
    }

    /// No randomization
    pub fn none() -> Self {
        Self { percent: 0 }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Jittered duration for `base` seconds
    pub fn apply<R: Rng + ?Sized>(&self, rng: &mut R, base: f64) -> f64 {
        let factor = if self.percent == 0 {
            1.0
        } else {
            let r = self.percent as f64 / 100.0;
            rng.random_range((1.0 - r)..=(1.0 + r))
        };
        round_millis(base * factor).max(MIN_DURATION)
    }

    /// [`apply`](Self::apply) with the thread-local generator
    pub fn sample(&self, base: f64) -> f64 {
        self.apply(&mut rand::rng(), base)
    }

    /// Inclusive (min, max) range `apply` can return for `base`, before rounding
    pub fn bounds(&self, base: f64) -> (f64, f64) {
        let r = self.percent as f64 / 100.0;
        ((base * (1.0 - r)).max(MIN_DURATION), base * (1.0 + r))
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::new(DEFAULT_JITTER_PERCENT)
    }
}

fn round_millis(secs: f64) -> f64 {
    (secs * 1000.0).round() / 1000.0
}

/// Kinds of timed operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Cast,
    /// One full press-and-release reel attempt
    Reel,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Cast => "cast",
            Operation::Reel => "reel",
        };
        f.write_str(name)
    }
}

/// One timing observation
#[derive(Debug, Clone, PartialEq)]
pub struct TimingReport {
    pub operation: Operation,
    pub base: f64,
    pub actual: f64,
    /// `(actual - base) / base * 100`
    pub deviation_percent: f64,
    /// Time since the previous operation of the same kind
    pub interval: Option<Duration>,
}

/// Remembers when each kind of operation last ran
#[derive(Debug, Default)]
pub struct TimingReporter {
    last: Mutex<HashMap<Operation, Instant>>,
}

impl TimingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, operation: Operation, base: f64, actual: f64) -> TimingReport {
        self.report_at(operation, base, actual, Instant::now())
    }

    fn report_at(&self, operation: Operation, base: f64, actual: f64, now: Instant) -> TimingReport {
        let interval = self
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(operation, now)
            .map(|at| now.saturating_duration_since(at));

        let deviation_percent = if base > 0.0 {
            (actual - base) / base * 100.0
        } else {
            0.0
        };

        match interval {
            Some(iv) => log::debug!(
                "[timing] {}: base {:.3}s, actual {:.3}s ({:+.1}%), interval {:.3}s",
                operation,
                base,
                actual,
                deviation_percent,
                iv.as_secs_f64()
            ),
            None => log::debug!(
                "[timing] {}: base {:.3}s, actual {:.3}s ({:+.1}%)",
                operation,
                base,
                actual,
                deviation_percent
            ),
        }

        TimingReport {
            operation,
            base,
            actual,
            deviation_percent,
            interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(1);
        let jitter = Jitter::none();
        assert_eq!(jitter.apply(&mut rng, 2.5), 2.5);
        assert_eq!(jitter.apply(&mut rng, 0.12345), 0.123);
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for percent in [0u8, 5, 15, 30, 50] {
            let jitter = Jitter::new(percent);
            for base in [0.05, 0.1, 0.5, 2.5] {
                let (lo, hi) = jitter.bounds(base);
                for _ in 0..200 {
                    let actual = jitter.apply(&mut rng, base);
                    // Millisecond rounding may cross the bound by half a step
                    assert!(actual >= lo - 0.0005, "{actual} < {lo} (r={percent}, base={base})");
                    assert!(actual <= hi + 0.0005, "{actual} > {hi} (r={percent}, base={base})");
                    assert!(actual >= MIN_DURATION);
                }
            }
        }
    }

    #[test]
    fn test_percent_is_clamped() {
        assert_eq!(Jitter::new(90).percent(), MAX_JITTER_PERCENT);
        assert_eq!(Jitter::default().percent(), 15);
    }

    #[test]
    fn test_jitter_actually_varies() {
        let mut rng = StdRng::seed_from_u64(7);
        let jitter = Jitter::new(30);
        let samples: Vec<f64> = (0..20).map(|_| jitter.apply(&mut rng, 1.0)).collect();
        assert!(samples.iter().any(|s| (*s - 1.0).abs() > 0.01));
    }

    #[test]
    fn test_report_deviation_and_interval() {
        let reporter = TimingReporter::new();
        let t0 = Instant::now();

        let first = reporter.report_at(Operation::Cast, 0.5, 0.55, t0);
        assert!((first.deviation_percent - 10.0).abs() < 1e-9);
        assert_eq!(first.interval, None);

        let second = reporter.report_at(Operation::Cast, 0.5, 0.45, t0 + Duration::from_millis(800));
        assert!((second.deviation_percent + 10.0).abs() < 1e-9);
        assert_eq!(second.interval, Some(Duration::from_millis(800)));

        // Reels in between do not affect the cast interval
        let reel = reporter.report_at(Operation::Reel, 4.5, 4.5, t0 + Duration::from_secs(1));
        assert_eq!(reel.interval, None);
        let third = reporter.report_at(Operation::Cast, 0.5, 0.5, t0 + Duration::from_secs(2));
        assert_eq!(third.interval, Some(Duration::from_millis(1200)));
    }
}
