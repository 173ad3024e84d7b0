//! Reference-to-target coordinate scaling
//!
//! Every probe region is authored against a 2560x1440 reference layout. The
//! game pins its HUD elements to screen edges, so each region is scaled with
//! the anchor that keeps it attached to the same edge on the user's display.

use serde::{Deserialize, Serialize};

/// Reference layout width
pub const REFERENCE_WIDTH: u32 = 2560;
/// Reference layout height
pub const REFERENCE_HEIGHT: u32 = 1440;

/// A point in target-resolution pixel space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// A rectangle in target-resolution pixel space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Pull the region inside a `screen_width` x `screen_height` display.
    ///
    /// Out-of-bounds regions are shifted back on screen first and then
    /// shortened; `None` means nothing is left to capture.
    pub fn clamp_to(&self, screen_width: u32, screen_height: u32) -> Option<Region> {
        let sw = screen_width as i32;
        let sh = screen_height as i32;
        let (mut x, mut y, mut w, mut h) = (self.x, self.y, self.width, self.height);

        if x < 0 || y < 0 || x + w > sw || y + h > sh {
            x = x.min(sw - w).max(0);
            y = y.min(sh - h).max(0);
            w = w.min(sw - x);
            h = h.min(sh - y);
        }

        if w <= 0 || h <= 0 {
            return None;
        }

        Some(Region::new(x, y, w, h))
    }

    /// Area in pixels (zero for degenerate regions)
    pub fn area(&self) -> u64 {
        if self.width <= 0 || self.height <= 0 {
            0
        } else {
            self.width as u64 * self.height as u64
        }
    }
}

/// How a reference rectangle follows the screen when the resolution changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    /// Independent X/Y factors (stretches with the aspect ratio)
    Stretch,
    /// Height-derived factor on both axes, measured from the top-left corner
    Uniform,
    /// Fixed offset from the screen center
    Center,
    /// Fixed offset from the bottom-right corner
    BottomRight,
    /// Horizontally centered, fixed offset from the bottom edge
    BottomCenter,
    /// Horizontally centered, fixed offset from the top edge
    TopCenter,
}

/// Derived ratios between the reference layout and the target display
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleContext {
    pub reference_width: u32,
    pub reference_height: u32,
    pub target_width: u32,
    pub target_height: u32,
    pub scale_x: f64,
    pub scale_y: f64,
    pub scale_uniform: f64,
}

impl ScaleContext {
    /// Scale context from the standard reference layout to `width` x `height`
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self::with_reference(REFERENCE_WIDTH, REFERENCE_HEIGHT, target_width, target_height)
    }

    pub fn with_reference(
        reference_width: u32,
        reference_height: u32,
        target_width: u32,
        target_height: u32,
    ) -> Self {
        let scale_x = target_width as f64 / reference_width as f64;
        let scale_y = target_height as f64 / reference_height as f64;
        Self {
            reference_width,
            reference_height,
            target_width,
            target_height,
            scale_x,
            scale_y,
            scale_uniform: scale_y,
        }
    }

    /// Whether a cached template resized for `other` is still valid here
    pub fn same_scale(&self, other: &ScaleContext) -> bool {
        self.scale_x == other.scale_x && self.scale_y == other.scale_y
    }

    /// Scale a reference rectangle, truncating every component
    pub fn scale_rect(&self, x: i32, y: i32, w: i32, h: i32, anchor: Anchor) -> Region {
        let s = self.scale_uniform;
        let (bw, bh) = (self.reference_width as f64, self.reference_height as f64);
        let (tw, th) = (self.target_width as f64, self.target_height as f64);
        let (xf, yf, wf, hf) = (x as f64, y as f64, w as f64, h as f64);

        match anchor {
            Anchor::Stretch => Region::new(
                (xf * self.scale_x) as i32,
                (yf * self.scale_y) as i32,
                (wf * self.scale_x) as i32,
                (hf * self.scale_y) as i32,
            ),
            Anchor::Uniform => Region::new(
                (xf * s) as i32,
                (yf * s) as i32,
                (wf * s) as i32,
                (hf * s) as i32,
            ),
            Anchor::Center => Region::new(
                (tw / 2.0 + (xf - bw / 2.0) * s) as i32,
                (th / 2.0 + (yf - bh / 2.0) * s) as i32,
                (wf * s) as i32,
                (hf * s) as i32,
            ),
            Anchor::BottomRight => Region::new(
                self.target_width as i32 - ((bw - xf) * s) as i32,
                self.target_height as i32 - ((bh - yf) * s) as i32,
                (wf * s) as i32,
                (hf * s) as i32,
            ),
            Anchor::BottomCenter => Region::new(
                (tw / 2.0 + (xf - bw / 2.0) * s) as i32,
                self.target_height as i32 - ((bh - yf) * s) as i32,
                (wf * s) as i32,
                (hf * s) as i32,
            ),
            Anchor::TopCenter => Region::new(
                (tw / 2.0 + (xf - bw / 2.0) * s) as i32,
                (yf * s) as i32,
                (wf * s) as i32,
                (hf * s) as i32,
            ),
        }
    }

    /// Scale a reference point using the same anchoring rules as rectangles
    pub fn scale_point(&self, x: i32, y: i32, anchor: Anchor) -> Point {
        let r = self.scale_rect(x, y, 0, 0, anchor);
        Point { x: r.x, y: r.y }
    }
}

impl Default for ScaleContext {
    fn default() -> Self {
        Self::new(REFERENCE_WIDTH, REFERENCE_HEIGHT)
    }
}

/// Reference-space rectangles for every probe, with their anchors
pub mod reference {
    use super::Anchor;

    /// (x, y, width, height, anchor) in the 2560x1440 layout
    pub type RefRect = (i32, i32, i32, i32, Anchor);

    /// Bite indicator star, top center
    pub const BITE: RefRect = (1172, 165, 34, 34, Anchor::TopCenter);
    /// First prompt slot, bottom center
    pub const PROMPT_F1: RefRect = (1100, 1329, 10, 19, Anchor::BottomCenter);
    /// Second prompt slot, bottom center
    pub const PROMPT_F2: RefRect = (1212, 1329, 10, 19, Anchor::BottomCenter);
    /// Fish landed icon, bottom center
    pub const LANDED: RefRect = (1146, 1316, 17, 21, Anchor::BottomCenter);
    /// Two-digit bait counter, bottom right
    pub const BAIT: RefRect = (2318, 1296, 30, 22, Anchor::BottomRight);
    /// Overtime "continue" dialog marker, centered
    pub const OVERTIME: RefRect = (1245, 675, 26, 27, Anchor::Center);
    /// Catch banner with name, quality and weight
    pub const FISH_INFO: RefRect = (915, 75, 725, 150, Anchor::Stretch);

    /// Height of one bait digit cell
    pub const BAIT_DIGIT_HEIGHT: i32 = 22;
    /// Width of one bait digit cell
    pub const BAIT_DIGIT_WIDTH: i32 = 15;

    /// Overtime dialog "no" button
    pub const OVERTIME_DECLINE: (i32, i32) = (1182, 776);
    /// Overtime dialog "yes" button
    pub const OVERTIME_ACCEPT: (i32, i32) = (1398, 776);
}

/// Every target-space probe region, derived together from one ScaleContext
///
/// Rebuilt as a whole whenever the target resolution changes so related
/// regions never disagree about the scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionLayout {
    pub scale: ScaleContext,
    pub bite: Region,
    pub prompt_f1: Region,
    pub prompt_f2: Region,
    pub landed: Region,
    pub bait: Region,
    pub overtime: Region,
    pub fish_info: Region,
    pub overtime_decline: Point,
    pub overtime_accept: Point,
}

impl RegionLayout {
    pub fn compute(scale: ScaleContext) -> Self {
        let rect = |r: reference::RefRect| scale.scale_rect(r.0, r.1, r.2, r.3, r.4);
        let (dx, dy) = reference::OVERTIME_DECLINE;
        let (ax, ay) = reference::OVERTIME_ACCEPT;

        Self {
            scale,
            bite: rect(reference::BITE),
            prompt_f1: rect(reference::PROMPT_F1),
            prompt_f2: rect(reference::PROMPT_F2),
            landed: rect(reference::LANDED),
            bait: rect(reference::BAIT),
            overtime: rect(reference::OVERTIME),
            fish_info: rect(reference::FISH_INFO),
            overtime_decline: scale.scale_point(dx, dy, Anchor::Center),
            overtime_accept: scale.scale_point(ax, ay, Anchor::Center),
        }
    }

    /// Layout for a display of `width` x `height`
    pub fn for_resolution(width: u32, height: u32) -> Self {
        Self::compute(ScaleContext::new(width, height))
    }
}

impl Default for RegionLayout {
    fn default() -> Self {
        Self::compute(ScaleContext::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ANCHORS: [Anchor; 6] = [
        Anchor::Stretch,
        Anchor::Uniform,
        Anchor::Center,
        Anchor::BottomRight,
        Anchor::BottomCenter,
        Anchor::TopCenter,
    ];

    #[test]
    fn test_identity_scale_is_noop() {
        let ctx = ScaleContext::default();
        assert_eq!(ctx.scale_x, 1.0);
        assert_eq!(ctx.scale_uniform, 1.0);

        for anchor in ALL_ANCHORS {
            assert_eq!(
                ctx.scale_rect(1172, 165, 34, 34, anchor),
                Region::new(1172, 165, 34, 34),
                "{anchor:?}"
            );
        }
    }

    #[test]
    fn test_uniform_is_linear() {
        let ctx = ScaleContext::new(1920, 1080);
        let cases = [(100, 200, 30, 40), (1172, 165, 34, 34), (7, 9, 3, 5)];

        for (x, y, w, h) in cases {
            let single = ctx.scale_rect(x, y, w, h, Anchor::Uniform);
            let double = ctx.scale_rect(2 * x, 2 * y, 2 * w, 2 * h, Anchor::Uniform);
            // Truncation can lose at most one pixel per doubling
            assert!((double.x - 2 * single.x).abs() <= 1);
            assert!((double.y - 2 * single.y).abs() <= 1);
            assert!((double.width - 2 * single.width).abs() <= 1);
            assert!((double.height - 2 * single.height).abs() <= 1);
        }
    }

    #[test]
    fn test_truncates_instead_of_rounding() {
        // 0.75 * 13 = 9.75 -> 9
        let ctx = ScaleContext::new(1920, 1080);
        let r = ctx.scale_rect(13, 13, 13, 13, Anchor::Uniform);
        assert_eq!(r, Region::new(9, 9, 9, 9));
    }

    #[test]
    fn test_bottom_right_keeps_corner_offset() {
        for (tw, th) in [(1920, 1080), (3840, 2160), (3440, 1440), (1280, 1024)] {
            let ctx = ScaleContext::new(tw, th);
            let (x, y) = (2318, 1296);
            let r = ctx.scale_rect(x, y, 30, 22, Anchor::BottomRight);

            let ref_dx = (REFERENCE_WIDTH as i32 - x) as f64 * ctx.scale_uniform;
            let ref_dy = (REFERENCE_HEIGHT as i32 - y) as f64 * ctx.scale_uniform;
            let dx = (tw as i32 - r.x) as f64;
            let dy = (th as i32 - r.y) as f64;

            assert!((dx - ref_dx).abs() < 1.0, "{tw}x{th}: {dx} vs {ref_dx}");
            assert!((dy - ref_dy).abs() < 1.0, "{tw}x{th}: {dy} vs {ref_dy}");
        }
    }

    #[test]
    fn test_center_anchor_on_ultrawide() {
        // Same height, wider screen: the dialog stays centered
        let ctx = ScaleContext::new(3440, 1440);
        let r = ctx.scale_rect(1245, 675, 26, 27, Anchor::Center);
        assert_eq!(r.x, 1245 + (3440 - 2560) / 2);
        assert_eq!(r.y, 675);
        assert_eq!((r.width, r.height), (26, 27));
    }

    #[test]
    fn test_region_clamping() {
        let r = Region::new(-5, 10, 20, 20);
        assert_eq!(r.clamp_to(100, 100), Some(Region::new(0, 10, 20, 20)));

        let r = Region::new(95, 95, 20, 20);
        assert_eq!(r.clamp_to(100, 100), Some(Region::new(80, 80, 20, 20)));

        let r = Region::new(0, 0, 200, 50);
        assert_eq!(r.clamp_to(100, 100), Some(Region::new(0, 0, 100, 50)));

        assert_eq!(Region::new(10, 10, 0, 5).clamp_to(100, 100), None);
    }

    #[test]
    fn test_layout_recomputes_every_region() {
        let base = RegionLayout::default();
        let hd = RegionLayout::for_resolution(1920, 1080);

        assert_ne!(base.bite, hd.bite);
        assert_ne!(base.bait, hd.bait);
        assert_ne!(base.prompt_f1, hd.prompt_f1);
        assert_ne!(base.overtime, hd.overtime);
        assert_eq!(hd.scale.target_width, 1920);
        assert_eq!(hd.overtime_decline, Point { x: 886, y: 582 });
    }
}
