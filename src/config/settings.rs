//! Fishing parameters
//!
//! Defines every configurable option for the automation and its JSON
//! persistence.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::input::Hotkey;
use crate::timing::jitter::MAX_JITTER_PERCENT;

/// Smallest custom resolution accepted
pub const MIN_RESOLUTION: (u32, u32) = (800, 600);
/// Largest custom resolution accepted
pub const MAX_RESOLUTION: (u32, u32) = (7680, 4320);

/// Main settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Pause between polls (seconds)
    pub loop_interval: f64,
    /// How long the button is held to cast (seconds)
    pub cast_duration: f64,
    /// Hold time of one reel press (seconds)
    pub reel_down: f64,
    /// Release time between reel presses (seconds)
    pub reel_up: f64,
    /// Reel presses before a catch is abandoned
    pub max_reel_attempts: u32,
    /// Screen resolution the regions are laid out for
    pub resolution: ResolutionMode,
    /// Used when `resolution` is `custom`
    pub custom_width: u32,
    pub custom_height: u32,
    /// Random variation applied to every press (0-50 %)
    pub jitter_percent: u8,
    /// Start/stop hotkey
    pub hotkey: Hotkey,
    /// Read and store each catch
    pub record_enabled: bool,
    /// Save a screenshot of legendary catches
    pub screenshot_on_rare: bool,
    /// Answer to the overtime dialog
    pub overtime: OvertimeChoice,
    /// Stop automatically once the bucket reads full
    pub bucket_full_pause: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            loop_interval: 0.3,
            cast_duration: 0.5,
            reel_down: 2.5,
            reel_up: 2.0,
            max_reel_attempts: 15,
            resolution: ResolutionMode::Current,
            custom_width: 2560,
            custom_height: 1440,
            jitter_percent: 15,
            hotkey: Hotkey::default(),
            record_enabled: true,
            screenshot_on_rare: true,
            overtime: OvertimeChoice::Decline,
            bucket_full_pause: false,
        }
    }
}

impl Settings {
    /// Copy of these settings with a preset's timing fields applied
    pub fn with_preset(&self, preset: &Preset) -> Self {
        Self {
            loop_interval: preset.loop_interval,
            reel_down: preset.reel_down,
            reel_up: preset.reel_up,
            max_reel_attempts: preset.max_reel_attempts,
            cast_duration: preset.cast_duration,
            ..self.clone()
        }
    }

    /// Check the settings and normalize what can be normalized
    ///
    /// Jitter above the maximum is clamped. Non-positive durations, a zero
    /// attempt cap and out-of-range custom resolutions are rejected.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        let durations = [
            ("loop_interval", self.loop_interval),
            ("cast_duration", self.cast_duration),
            ("reel_down", self.reel_down),
            ("reel_up", self.reel_up),
        ];
        for (field, value) in durations {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidDuration { field, value });
            }
        }

        if self.max_reel_attempts == 0 {
            return Err(ConfigError::InvalidAttempts);
        }

        if self.resolution == ResolutionMode::Custom {
            check_resolution(self.custom_width, self.custom_height)?;
        }

        self.jitter_percent = self.jitter_percent.min(MAX_JITTER_PERCENT);
        Ok(self)
    }

    /// Resolution the regions should be computed for
    ///
    /// `display` is the size of the screen actually captured; `current`
    /// resolves to it.
    pub fn resolve_resolution(&self, display: (u32, u32)) -> Result<(u32, u32), ConfigError> {
        match self.resolution {
            ResolutionMode::Hd1080 => Ok((1920, 1080)),
            ResolutionMode::Qhd2k => Ok((2560, 1440)),
            ResolutionMode::Uhd4k => Ok((3840, 2160)),
            ResolutionMode::Current => Ok(display),
            ResolutionMode::Custom => {
                check_resolution(self.custom_width, self.custom_height)?;
                Ok((self.custom_width, self.custom_height))
            }
        }
    }

    /// Load from a JSON file, falling back to defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("No parameter file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&text)?;
        settings.validated()
    }

    /// Save as pretty JSON, copying any previous file to `<file>.backup` first
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            let backup = backup_path(path);
            fs::copy(path, &backup)?;
            log::debug!("Backed up parameters to {}", backup.display());
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }
}

fn check_resolution(width: u32, height: u32) -> Result<(), ConfigError> {
    let (min_w, min_h) = MIN_RESOLUTION;
    let (max_w, max_h) = MAX_RESOLUTION;
    if (min_w..=max_w).contains(&width) && (min_h..=max_h).contains(&height) {
        Ok(())
    } else {
        Err(ConfigError::InvalidResolution { width, height })
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".backup");
    PathBuf::from(name)
}

/// Target resolution selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionMode {
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "2k")]
    Qhd2k,
    #[serde(rename = "4k")]
    Uhd4k,
    #[serde(rename = "current")]
    Current,
    #[serde(rename = "custom")]
    Custom,
}

/// What to do when the overtime dialog appears
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OvertimeChoice {
    /// Leave the dialog alone
    Off,
    Decline,
    Accept,
}

impl OvertimeChoice {
    pub fn is_enabled(&self) -> bool {
        *self != OvertimeChoice::Off
    }
}

/// Named set of the five core timing fields
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    pub name: &'static str,
    pub loop_interval: f64,
    pub reel_down: f64,
    pub reel_up: f64,
    pub max_reel_attempts: u32,
    pub cast_duration: f64,
}

/// Built-in presets, from slow and steady to fast
pub const PRESETS: [Preset; 4] = [
    Preset {
        name: "steady",
        loop_interval: 0.9,
        reel_down: 1.0,
        reel_up: 0.7,
        max_reel_attempts: 25,
        cast_duration: 2.0,
    },
    Preset {
        name: "balanced",
        loop_interval: 0.5,
        reel_down: 0.9,
        reel_up: 0.5,
        max_reel_attempts: 25,
        cast_duration: 3.0,
    },
    Preset {
        name: "quick",
        loop_interval: 0.2,
        reel_down: 0.4,
        reel_up: 0.2,
        max_reel_attempts: 25,
        cast_duration: 0.1,
    },
    Preset {
        name: "heavy",
        loop_interval: 0.2,
        reel_down: 1.5,
        reel_up: 1.0,
        max_reel_attempts: 25,
        cast_duration: 0.1,
    },
];

/// Look up a built-in preset by name (case-insensitive)
pub fn preset(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid parameter file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} must be a positive number of seconds, got {value}")]
    InvalidDuration { field: &'static str, value: f64 },
    #[error("max_reel_attempts must be at least 1")]
    InvalidAttempts,
    #[error("Resolution {width}x{height} is outside 800x600..7680x4320")]
    InvalidResolution { width: u32, height: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::hotkey::{MainKey, Modifiers};

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.loop_interval, 0.3);
        assert_eq!(settings.reel_down, 2.5);
        assert_eq!(settings.reel_up, 2.0);
        assert_eq!(settings.max_reel_attempts, 15);
        assert_eq!(settings.jitter_percent, 15);
        assert_eq!(settings.hotkey.to_string(), "F2");
        assert_eq!(settings.overtime, OvertimeChoice::Decline);
        assert!(settings.record_enabled);
    }

    #[test]
    fn test_missing_and_unknown_keys() {
        let json = r#"{ "reel_down": 1.2, "resolution": "4k", "window_theme": "dark" }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.reel_down, 1.2);
        assert_eq!(settings.resolution, ResolutionMode::Uhd4k);
        assert_eq!(settings.reel_up, 2.0);
    }

    #[test]
    fn test_hotkey_key() {
        let json = r#"{ "hotkey": "Ctrl+Shift+Mouse5" }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(
            settings.hotkey.modifiers,
            Modifiers { ctrl: true, alt: false, shift: true }
        );
        assert!(matches!(settings.hotkey.main, MainKey::Mouse(_)));

        assert!(serde_json::from_str::<Settings>(r#"{ "hotkey": "Ctrl+" }"#).is_err());
    }

    #[test]
    fn test_validation() {
        let bad = Settings { reel_up: 0.0, ..Default::default() };
        assert!(matches!(
            bad.validated(),
            Err(ConfigError::InvalidDuration { field: "reel_up", .. })
        ));

        let bad = Settings { max_reel_attempts: 0, ..Default::default() };
        assert!(matches!(bad.validated(), Err(ConfigError::InvalidAttempts)));

        let bad = Settings {
            resolution: ResolutionMode::Custom,
            custom_width: 640,
            custom_height: 480,
            ..Default::default()
        };
        assert!(matches!(bad.validated(), Err(ConfigError::InvalidResolution { .. })));

        let clamped = Settings { jitter_percent: 90, ..Default::default() }.validated().unwrap();
        assert_eq!(clamped.jitter_percent, MAX_JITTER_PERCENT);
    }

    #[test]
    fn test_resolve_resolution() {
        let mut settings = Settings::default();
        assert_eq!(settings.resolve_resolution((1600, 900)).unwrap(), (1600, 900));

        settings.resolution = ResolutionMode::Hd1080;
        assert_eq!(settings.resolve_resolution((1600, 900)).unwrap(), (1920, 1080));

        settings.resolution = ResolutionMode::Custom;
        settings.custom_width = 3440;
        settings.custom_height = 1440;
        assert_eq!(settings.resolve_resolution((1600, 900)).unwrap(), (3440, 1440));
    }

    #[test]
    fn test_presets() {
        let base = Settings { record_enabled: false, ..Default::default() };
        let quick = base.with_preset(preset("Quick").unwrap());
        assert_eq!(quick.reel_down, 0.4);
        assert_eq!(quick.cast_duration, 0.1);
        assert_eq!(quick.max_reel_attempts, 25);
        assert!(!quick.record_enabled);
        assert!(preset("missing").is_none());

        for p in &PRESETS {
            assert!(base.with_preset(p).validated().is_ok());
        }
    }

    #[test]
    fn test_save_writes_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parameters.json");

        let first = Settings::default();
        first.save(&path).unwrap();
        assert!(!backup_path(&path).exists());

        let second = Settings { reel_down: 1.1, ..Default::default() };
        second.save(&path).unwrap();

        let backup = Settings::load_or_default(&backup_path(&path)).unwrap();
        assert_eq!(backup, first);
        assert_eq!(Settings::load_or_default(&path).unwrap(), second);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_or_default(&dir.path().join("none.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }
}
