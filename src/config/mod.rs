//! Configuration module
//!
//! Handles the fishing parameters, presets and the parameter file.

pub mod settings;

pub use settings::{preset, ConfigError, OvertimeChoice, Preset, ResolutionMode, Settings, PRESETS};
