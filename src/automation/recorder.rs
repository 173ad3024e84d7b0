//! Catch recording
//!
//! Reads the catch banner after a reel, stores the record and keeps a
//! screenshot of legendary catches. Every failure here ends as "no record";
//! the control loop carries on either way.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Local;
use image::RgbaImage;

use crate::game::records::{FishRecord, Quality, RecordStore};
use crate::vision::{OcrAdapter, ScreenProbe};

/// Wait for the catch banner to appear before reading it
pub const BANNER_DELAY: Duration = Duration::from_millis(300);

/// Default screenshot directory
pub const SCREENSHOT_DIR: &str = "screenshots";

pub struct CatchRecorder {
    ocr: OcrAdapter,
    store: Arc<RecordStore>,
    screenshot_dir: PathBuf,
    banner_delay: Duration,
}

impl CatchRecorder {
    pub fn new(ocr: OcrAdapter, store: Arc<RecordStore>) -> Self {
        Self {
            ocr,
            store,
            screenshot_dir: PathBuf::from(SCREENSHOT_DIR),
            banner_delay: BANNER_DELAY,
        }
    }

    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }

    pub fn with_banner_delay(mut self, delay: Duration) -> Self {
        self.banner_delay = delay;
        self
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn is_available(&self) -> bool {
        self.ocr.is_available()
    }

    /// Read and store the catch on screen
    ///
    /// With `screenshot` set, a legendary catch also saves the full display.
    pub fn record(&self, probe: &mut dyn ScreenProbe, screenshot: bool) -> Option<FishRecord> {
        if !self.ocr.is_available() {
            log::debug!("OCR unavailable, catch not recorded");
            return None;
        }

        thread::sleep(self.banner_delay);

        let Some(banner) = probe.fish_info() else {
            log::warn!("Could not capture the catch banner");
            return None;
        };
        let info = self.ocr.recognize_fish(&banner)?;

        let Some(record) = self.store.new_record(info.name, info.quality, info.weight) else {
            log::debug!("No active session, catch not recorded");
            return None;
        };
        if let Err(e) = self.store.add_record(record.clone()) {
            log::error!("Failed to save catch record: {}", e);
            return None;
        }

        if screenshot && record.quality == Quality::Legendary {
            match probe.full_screen() {
                Some(image) => match save_screenshot(&self.screenshot_dir, &record, &image) {
                    Ok(path) => log::info!("Saved legendary catch to {}", path.display()),
                    Err(e) => log::warn!("Failed to save screenshot: {}", e),
                },
                None => log::warn!("Could not capture the screen for a legendary catch"),
            }
        }

        Some(record)
    }
}

/// `<dir>/<YYYYmmdd_HHMMSS>_<name>_<quality>.png`
pub fn screenshot_path(dir: &Path, record: &FishRecord) -> PathBuf {
    let name: String = record
        .name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{}_{}_{}.png", stamp, name, record.quality.label()))
}

fn save_screenshot(
    dir: &Path,
    record: &FishRecord,
    image: &RgbaImage,
) -> Result<PathBuf, image::ImageError> {
    fs::create_dir_all(dir)?;
    let path = screenshot_path(dir, record);
    image.save(&path)?;
    Ok(path)
}
