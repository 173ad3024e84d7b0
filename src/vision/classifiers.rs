//! Screen-state classifiers
//!
//! Each probe captures its fixed region from the current [`RegionLayout`],
//! matches it against one template and returns a typed answer. Capture or
//! template failures come back as the "no signal" value (`false`/`None`).

use image::{GrayImage, RgbaImage};

use super::capture::{self, CaptureSession};
use super::matcher::TemplateMatcher;
use super::scaling::{reference, Region, RegionLayout};
use super::templates::TemplateCache;

/// Threshold for bait-count digit templates
pub const DIGIT_THRESHOLD: f32 = 0.7;

/// Threshold for state icon templates
pub const ICON_THRESHOLD: f32 = 0.8;

/// The two reel/cast prompt slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptSlot {
    F1,
    F2,
}

impl PromptSlot {
    pub fn template(&self) -> &'static str {
        match self {
            PromptSlot::F1 => "F1",
            PromptSlot::F2 => "F2",
        }
    }
}

/// Everything the control loops need to know about the screen
pub trait ScreenProbe {
    /// Bite indicator ("star") visible
    fn bite(&mut self) -> bool;

    /// Prompt in `slot` visible
    fn prompt(&mut self, slot: PromptSlot) -> bool;

    /// "Fish landed" icon visible
    fn landed(&mut self) -> bool;

    /// Current bait count, `None` when unreadable
    fn bait_count(&mut self) -> Option<u32>;

    /// Overtime dialog visible
    fn overtime_dialog(&mut self) -> bool;

    /// Color crop of the catch banner for OCR
    fn fish_info(&mut self) -> Option<RgbaImage>;

    /// Whole display, for rare-catch screenshots
    fn full_screen(&mut self) -> Option<RgbaImage>;
}

/// Template-backed classifiers for one layout
pub struct Classifiers<'a> {
    layout: &'a RegionLayout,
    matcher: TemplateMatcher<'a>,
}

impl<'a> Classifiers<'a> {
    pub fn new(layout: &'a RegionLayout, cache: &'a TemplateCache) -> Self {
        Self {
            layout,
            matcher: TemplateMatcher::new(cache, layout.scale.scale_uniform),
        }
    }

    pub fn layout(&self) -> &RegionLayout {
        self.layout
    }

    pub fn detect_bite(&self, session: &mut dyn CaptureSession) -> bool {
        self.icon(session, self.layout.bite, "star")
    }

    pub fn detect_prompt(&self, session: &mut dyn CaptureSession, slot: PromptSlot) -> bool {
        let region = match slot {
            PromptSlot::F1 => self.layout.prompt_f1,
            PromptSlot::F2 => self.layout.prompt_f2,
        };
        self.icon(session, region, slot.template())
    }

    pub fn detect_landed(&self, session: &mut dyn CaptureSession) -> bool {
        self.icon(session, self.layout.landed, "shangyu")
    }

    pub fn detect_overtime_dialog(&self, session: &mut dyn CaptureSession) -> bool {
        self.icon(session, self.layout.overtime, "chang")
    }

    pub fn detect_bait_count(&self, session: &mut dyn CaptureSession) -> Option<u32> {
        let Some(region) = capture::capture_gray(session, self.layout.bait) else {
            log::debug!("Bait region capture failed");
            return None;
        };
        self.read_bait_digits(&region)
    }

    /// Read up to two digits from a captured bait region
    ///
    /// The region is split into two digit cells read most-significant
    /// first. When neither cell yields a confident digit, a single cell
    /// centered in the region is tried instead.
    pub fn read_bait_digits(&self, region: &GrayImage) -> Option<u32> {
        let scale = self.layout.scale.scale_uniform;
        let (img_w, img_h) = region.dimensions();

        let crop_h = ((reference::BAIT_DIGIT_HEIGHT as f64 * scale) as u32)
            .max(1)
            .min(img_h);
        let crop_w = ((reference::BAIT_DIGIT_WIDTH as f64 * scale) as u32)
            .max(1)
            .min(img_w / 2);
        if crop_w == 0 || crop_h == 0 {
            return None;
        }

        let mut digits: Vec<u32> = Vec::with_capacity(2);
        if crop_w * 2 <= img_w {
            for i in 0..2 {
                let cell = image::imageops::crop_imm(region, i * crop_w, 0, crop_w, crop_h).to_image();
                if let Some(d) = self.best_digit(&cell) {
                    digits.push(d);
                }
            }
        }

        if digits.is_empty() {
            let mid = img_w.saturating_sub(crop_w) / 2;
            let width = crop_w.min(img_w - mid);
            let cell = image::imageops::crop_imm(region, mid, 0, width, crop_h).to_image();
            digits.extend(self.best_digit(&cell));
        }

        if digits.is_empty() {
            log::trace!("No bait digit recognized");
            return None;
        }

        let count = digits.iter().fold(0, |acc, d| acc * 10 + d);
        log::trace!("Bait digits {:?} -> {}", digits, count);
        Some(count)
    }

    fn best_digit(&self, cell: &GrayImage) -> Option<u32> {
        let mut best: Option<(u32, f32)> = None;
        for digit in 0..10u32 {
            let result = self
                .matcher
                .match_named(cell, &digit.to_string(), DIGIT_THRESHOLD);
            if result.matched && best.map_or(true, |(_, c)| result.confidence > c) {
                best = Some((digit, result.confidence));
            }
        }
        best.map(|(d, _)| d)
    }

    fn icon(&self, session: &mut dyn CaptureSession, region: Region, name: &str) -> bool {
        match capture::capture_gray(session, region) {
            Some(buffer) => self.matcher.match_named(&buffer, name, ICON_THRESHOLD).matched,
            None => false,
        }
    }
}

/// [`ScreenProbe`] over one live capture session
///
/// Built once per tick; the session is released when the probe drops.
pub struct LiveProbe<'a> {
    session: Box<dyn CaptureSession + 'a>,
    classifiers: Classifiers<'a>,
}

impl<'a> LiveProbe<'a> {
    pub fn new(session: Box<dyn CaptureSession + 'a>, classifiers: Classifiers<'a>) -> Self {
        Self {
            session,
            classifiers,
        }
    }
}

impl ScreenProbe for LiveProbe<'_> {
    fn bite(&mut self) -> bool {
        self.classifiers.detect_bite(self.session.as_mut())
    }

    fn prompt(&mut self, slot: PromptSlot) -> bool {
        self.classifiers.detect_prompt(self.session.as_mut(), slot)
    }

    fn landed(&mut self) -> bool {
        self.classifiers.detect_landed(self.session.as_mut())
    }

    fn bait_count(&mut self) -> Option<u32> {
        self.classifiers.detect_bait_count(self.session.as_mut())
    }

    fn overtime_dialog(&mut self) -> bool {
        self.classifiers.detect_overtime_dialog(self.session.as_mut())
    }

    fn fish_info(&mut self) -> Option<RgbaImage> {
        let region = self.classifiers.layout().fish_info;
        capture::capture_rgba(self.session.as_mut(), region)
    }

    fn full_screen(&mut self) -> Option<RgbaImage> {
        capture::capture_full(self.session.as_mut())
    }
}
