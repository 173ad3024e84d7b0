//! Vision and screen-state recognition
//!
//! Maps the reference layout onto the actual display, captures the probe
//! regions and classifies them with template matching. OCR of the catch
//! banner lives here too.

pub mod capture;
pub mod classifiers;
pub mod matcher;
pub mod ocr;
pub mod scaling;
pub mod templates;

pub use capture::{CaptureProvider, CaptureSession, FrameCapture};
pub use classifiers::{Classifiers, LiveProbe, PromptSlot, ScreenProbe};
pub use matcher::{MatchResult, TemplateMatcher};
pub use ocr::{FishInfo, OcrAdapter, OcrProvider, TesseractOcr};
pub use scaling::{Anchor, Point, Region, RegionLayout, ScaleContext};
pub use templates::{TemplateCache, TemplateSource};

/// Open a capture session and wrap it in a [`LiveProbe`] for `layout`
pub fn open_probe<'a>(
    provider: &'a dyn CaptureProvider,
    layout: &'a RegionLayout,
    cache: &'a TemplateCache,
) -> Result<LiveProbe<'a>, VisionError> {
    let session = provider.open()?;
    Ok(LiveProbe::new(session, Classifiers::new(layout, cache)))
}

/// Vision system errors
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Failed to load template: {0}")]
    TemplateLoadError(String),
    #[error("Screen capture failed: {0}")]
    CaptureError(String),
    #[error("Region {0:?} is outside the display")]
    RegionOutOfBounds(Region),
    #[error("No frame available")]
    NoFrame,
}
