//! OCR for the catch banner
//!
//! Recognition itself is delegated to an [`OcrProvider`]; this module turns
//! the recognized lines into a fish name, quality and weight. Everything is
//! optional: a missing engine or unreadable text simply yields no result.

use std::path::{Path, PathBuf};
use std::process::Command;

use image::RgbaImage;
use once_cell::sync::Lazy;
use regex::Regex;
use tempfile::NamedTempFile;

use crate::game::records::Quality;

/// Turns an image into recognized text lines
pub trait OcrProvider: Send + Sync {
    /// Whether the engine can be used at all
    fn is_available(&self) -> bool;

    /// Recognize text lines in `image`
    fn recognize(&self, image: &RgbaImage) -> Result<Vec<String>, OcrError>;
}

/// Fields parsed from the catch banner
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FishInfo {
    pub name: Option<String>,
    pub quality: Option<Quality>,
    /// Normalized to kilograms, e.g. `"1.23kg"`
    pub weight: Option<String>,
}

impl FishInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.quality.is_none() && self.weight.is_none()
    }
}

/// OCR front end with an availability flag
pub struct OcrAdapter {
    provider: Option<Box<dyn OcrProvider>>,
}

impl OcrAdapter {
    pub fn new(provider: impl OcrProvider + 'static) -> Self {
        let available = provider.is_available();
        if !available {
            log::warn!("OCR engine unavailable, catches will not be recorded");
        }
        Self {
            provider: available.then(|| Box::new(provider) as Box<dyn OcrProvider>),
        }
    }

    /// Adapter with no engine behind it
    pub fn disabled() -> Self {
        Self { provider: None }
    }

    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    /// Recognize the catch banner, `None` when nothing usable was read
    pub fn recognize_fish(&self, image: &RgbaImage) -> Option<FishInfo> {
        let provider = self.provider.as_ref()?;

        let lines = match provider.recognize(image) {
            Ok(lines) => lines,
            Err(e) => {
                log::warn!("OCR failed: {}", e);
                return None;
            }
        };

        let text = lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        log::debug!("OCR text: {:?}", text);

        parse_fish_text(&text)
    }
}

static WEIGHT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)(\d+\.?\d*)\s*(kg|g|千克|克)?").ok());

static NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    ["你钓到了", "首次捕获", "钓到了", "捕获"]
        .iter()
        .filter_map(|prefix| {
            Regex::new(&format!(
                r"{prefix}\s*[「【\[]?\s*(.+?)\s*[」】\]]?\s*(?:标准|非凡|稀有|史诗|传说|传奇|$)"
            ))
            .ok()
        })
        .collect()
});

static NON_NAME_CHARS: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"[^\x{4e00}-\x{9fa5}a-zA-Z\s]").ok());

static NON_NAME_OR_SPACE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"[^\x{4e00}-\x{9fa5}a-zA-Z]").ok());

static CJK_RUN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[\x{4e00}-\x{9fa5}]{2,}").ok());

const NAME_PREFIXES: [&str; 6] = ["你钓到了", "首次捕获", "钓到了", "捕获", "你钓到", "钓到"];

/// Parse the joined banner text
///
/// Returns `None` for empty text or when no field could be extracted.
pub fn parse_fish_text(text: &str) -> Option<FishInfo> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let quality_word = Quality::WORDS.iter().find(|w| text.contains(**w)).copied();
    let info = FishInfo {
        name: parse_name(text, quality_word),
        quality: quality_word.and_then(Quality::from_label),
        weight: parse_weight(text),
    };

    (!info.is_empty()).then_some(info)
}

fn parse_weight(text: &str) -> Option<String> {
    let caps = WEIGHT.as_ref()?.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let kg = match caps.get(2).map(|m| m.as_str().to_lowercase()) {
        Some(unit) if unit == "g" || unit == "克" => value / 1000.0,
        _ => value,
    };
    Some(format!("{kg:.2}kg"))
}

fn parse_name(text: &str, quality_word: Option<&str>) -> Option<String> {
    let weight = WEIGHT.as_ref()?;
    let non_name = NON_NAME_CHARS.as_ref()?;

    for pattern in NAME_PATTERNS.iter() {
        let Some(caps) = pattern.captures(text) else {
            continue;
        };
        let Some(raw) = caps.get(1) else {
            continue;
        };
        let without_weight = weight.replace_all(raw.as_str(), "");
        let cleaned = non_name.replace_all(&without_weight, "");
        let cleaned = cleaned.trim();
        if cleaned.chars().count() >= 2 {
            return Some(cleaned.to_string());
        }
    }

    let mut rest = text.to_string();
    for prefix in NAME_PREFIXES {
        rest = rest.replace(prefix, " ");
    }
    if let Some(word) = quality_word {
        rest = rest.replace(word, " ");
    }
    let rest = weight.replace_all(&rest, "");
    let rest = NON_NAME_OR_SPACE.as_ref()?.replace_all(&rest, " ");

    CJK_RUN
        .as_ref()?
        .find_iter(&rest)
        .map(|m| m.as_str())
        .fold(None, |longest: Option<&str>, run| match longest {
            Some(l) if l.chars().count() >= run.chars().count() => Some(l),
            _ => Some(run),
        })
        .map(str::to_string)
}

/// Tesseract command-line engine
pub struct TesseractOcr {
    executable: PathBuf,
    language: String,
    available: bool,
}

impl TesseractOcr {
    /// Use `tesseract` from `PATH` with simplified Chinese
    pub fn new() -> Self {
        Self::with_executable("tesseract")
    }

    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        let executable = executable.into();
        let available = Self::probe(&executable);
        Self {
            executable,
            language: "chi_sim".to_string(),
            available,
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn probe(executable: &Path) -> bool {
        match Command::new(executable).arg("--version").output() {
            Ok(output) if output.status.success() => {
                log::info!("Found OCR engine at {}", executable.display());
                true
            }
            Ok(output) => {
                log::debug!("tesseract --version exited with {}", output.status);
                false
            }
            Err(e) => {
                log::debug!("tesseract not found: {}", e);
                false
            }
        }
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrProvider for TesseractOcr {
    fn is_available(&self) -> bool {
        self.available
    }

    fn recognize(&self, image: &RgbaImage) -> Result<Vec<String>, OcrError> {
        if !self.available {
            return Err(OcrError::Unavailable);
        }

        let input = NamedTempFile::with_suffix(".png")?;
        image::imageops::grayscale(image).save(input.path())?;

        let output = Command::new(&self.executable)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg("6")
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::EngineFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }
}

/// OCR errors
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR engine unavailable")]
    Unavailable,
    #[error("OCR engine failed: {0}")]
    EngineFailed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
