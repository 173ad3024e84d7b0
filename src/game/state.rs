//! Control-loop state
//!
//! The loop moves through [`LoopState`] one transition per tick. A bite is
//! detected from the bait counter going down, so every reading is compared
//! against the previous one with [`BaitChange::classify`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Control-loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoopState {
    /// Not fishing, or waiting for a first bait reading
    Idle,
    /// Watching prompts and the bait counter
    Polling,
    /// Bait count dropped: a fish took the bait
    Hooked,
    /// Pressing until the bite indicator clears or the cap is hit
    Reeling,
    /// Reading and storing the catch
    Recording,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Whether automation is switched on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        *self == RunState::Running
    }

    pub fn toggled(&self) -> Self {
        match self {
            RunState::Stopped => RunState::Running,
            RunState::Running => RunState::Stopped,
        }
    }
}

/// Outcome of comparing a bait reading with the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaitChange {
    /// Nothing readable; the baseline is kept
    Unreadable,
    /// First reading, becomes the baseline
    Initialized(u32),
    /// Count decreased
    Bite { from: u32, to: u32 },
    /// Count increased
    Replenished { from: u32, to: u32 },
    Unchanged(u32),
}

impl BaitChange {
    pub fn classify(baseline: Option<u32>, reading: Option<u32>) -> Self {
        match (baseline, reading) {
            (_, None) => BaitChange::Unreadable,
            (None, Some(now)) => BaitChange::Initialized(now),
            (Some(prev), Some(now)) if now < prev => BaitChange::Bite { from: prev, to: now },
            (Some(prev), Some(now)) if now > prev => BaitChange::Replenished { from: prev, to: now },
            (Some(_), Some(now)) => BaitChange::Unchanged(now),
        }
    }

    /// Baseline after applying this change
    pub fn baseline(&self, previous: Option<u32>) -> Option<u32> {
        match *self {
            BaitChange::Unreadable => previous,
            BaitChange::Initialized(n) | BaitChange::Unchanged(n) => Some(n),
            BaitChange::Bite { to, .. } | BaitChange::Replenished { to, .. } => Some(to),
        }
    }

    pub fn is_bite(&self) -> bool {
        matches!(self, BaitChange::Bite { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(BaitChange::classify(Some(5), None), BaitChange::Unreadable);
        assert_eq!(BaitChange::classify(None, Some(42)), BaitChange::Initialized(42));
        assert_eq!(BaitChange::classify(Some(42), Some(39)), BaitChange::Bite { from: 42, to: 39 });
        assert_eq!(
            BaitChange::classify(Some(39), Some(41)),
            BaitChange::Replenished { from: 39, to: 41 }
        );
        assert_eq!(BaitChange::classify(Some(39), Some(39)), BaitChange::Unchanged(39));
    }

    #[test]
    fn test_reading_sequence_bites_once() {
        let readings = [None, Some(42), Some(42), Some(39), Some(39), Some(41)];
        let mut baseline = None;
        let mut bites = Vec::new();
        let mut baselines = Vec::new();

        for reading in readings {
            let change = BaitChange::classify(baseline, reading);
            if change.is_bite() {
                bites.push(change);
            }
            baseline = change.baseline(baseline);
            baselines.push(baseline);
        }

        assert_eq!(bites, vec![BaitChange::Bite { from: 42, to: 39 }]);
        assert_eq!(baselines, vec![None, Some(42), Some(42), Some(39), Some(39), Some(41)]);
    }

    #[test]
    fn test_run_state_toggle() {
        assert_eq!(RunState::default(), RunState::Stopped);
        assert_eq!(RunState::Stopped.toggled(), RunState::Running);
        assert!(!RunState::Running.toggled().is_running());
    }
}
