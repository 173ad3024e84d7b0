//! Humanized timing
//!
//! Nominal durations are never used as-is: each one goes through a
//! [`Jitter`] so consecutive presses and casts are not identical.

pub mod jitter;

pub use jitter::{Jitter, Operation, TimingReport, TimingReporter, MIN_DURATION};
