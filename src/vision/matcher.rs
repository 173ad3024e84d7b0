//! Normalized cross-correlation template matching
//!
//! Scores are the zero-mean normalized correlation coefficient, so a flat
//! region never matches and brightness offsets do not inflate the score.
//! The raw product term comes from `imageproc`; window means and energies
//! come from summed-area tables over the searched buffer.

use image::GrayImage;
use imageproc::template_matching::{match_template, MatchTemplateMethod};

use super::templates::TemplateCache;

/// Variance below which a window or template is considered flat
const FLAT_EPSILON: f64 = 1e-6;

/// Outcome of matching one template against one captured buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Whether the best score exceeded the threshold
    pub matched: bool,
    /// Best correlation score in [0, 1], reported even when unmatched
    pub confidence: f32,
    /// Top-left corner of the best match, only when matched
    pub location: Option<(u32, u32)>,
    /// (width, height) of the template used
    pub template_size: Option<(u32, u32)>,
}

impl MatchResult {
    /// Zero-confidence result for missing templates or unusable buffers
    pub fn none() -> Self {
        Self {
            matched: false,
            confidence: 0.0,
            location: None,
            template_size: None,
        }
    }
}

/// Matches captured buffers against named templates at the current scale
pub struct TemplateMatcher<'a> {
    cache: &'a TemplateCache,
    scale: f64,
}

impl<'a> TemplateMatcher<'a> {
    pub fn new(cache: &'a TemplateCache, scale: f64) -> Self {
        Self { cache, scale }
    }

    /// Match `buffer` against the cached template `name`
    ///
    /// `matched` is `best > threshold`. A missing template gives
    /// [`MatchResult::none`].
    pub fn match_named(&self, buffer: &GrayImage, name: &str, threshold: f32) -> MatchResult {
        let Some(template) = self.cache.get(name, self.scale, self.scale) else {
            return MatchResult::none();
        };

        let result = match_gray(buffer, &template, threshold);
        log::trace!(
            "Template '{}': confidence {:.3} (threshold {:.2})",
            name,
            result.confidence,
            threshold
        );
        result
    }
}

/// Match a template against a buffer of at least the template's size
pub fn match_gray(buffer: &GrayImage, template: &GrayImage, threshold: f32) -> MatchResult {
    let (bw, bh) = buffer.dimensions();
    let (tw, th) = template.dimensions();
    let template_size = Some((tw, th));

    if tw == 0 || th == 0 || tw > bw || th > bh {
        return MatchResult {
            template_size,
            ..MatchResult::none()
        };
    }

    let Some((best, location)) = best_correlation(buffer, template) else {
        return MatchResult {
            template_size,
            ..MatchResult::none()
        };
    };

    let matched = best > threshold;
    MatchResult {
        matched,
        confidence: best,
        location: matched.then_some(location),
        template_size,
    }
}

/// Best zero-mean correlation coefficient and its location
fn best_correlation(buffer: &GrayImage, template: &GrayImage) -> Option<(f32, (u32, u32))> {
    let (tw, th) = template.dimensions();
    let n = (tw * th) as f64;

    let (t_sum, t_sq) = template.pixels().fold((0f64, 0f64), |(s, q), p| {
        let v = p[0] as f64;
        (s + v, q + v * v)
    });
    let t_var = t_sq - t_sum * t_sum / n;
    if t_var < FLAT_EPSILON {
        return None;
    }

    let products = match_template(buffer, template, MatchTemplateMethod::CrossCorrelation);
    let table = SummedArea::new(buffer);

    let mut best: Option<(f32, (u32, u32))> = None;
    for (x, y, cross) in products.enumerate_pixels() {
        let (w_sum, w_sq) = table.window(x, y, tw, th);
        let w_var = w_sq - w_sum * w_sum / n;
        if w_var < FLAT_EPSILON {
            continue;
        }

        let numerator = cross[0] as f64 - w_sum * t_sum / n;
        let score = (numerator / (w_var * t_var).sqrt()).clamp(0.0, 1.0) as f32;
        if best.map_or(true, |(b, _)| score > b) {
            best = Some((score, (x, y)));
        }
    }

    best.or(Some((0.0, (0, 0))))
}

/// Summed-area tables of pixel values and squared pixel values
struct SummedArea {
    width: usize,
    sums: Vec<u64>,
    squares: Vec<u64>,
}

impl SummedArea {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sums = vec![0u64; stride * (h + 1)];
        let mut squares = vec![0u64; stride * (h + 1)];

        for y in 0..h {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w {
                let v = image.get_pixel(x as u32, y as u32)[0] as u64;
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + (x + 1);
                sums[idx] = sums[idx - stride] + row_sum;
                squares[idx] = squares[idx - stride] + row_sq;
            }
        }

        Self {
            width: stride,
            sums,
            squares,
        }
    }

    /// (sum, sum of squares) over the window at (x, y) of size w x h
    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (f64, f64) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let at = |table: &[u64], x: usize, y: usize| table[y * self.width + x];
        let area = |table: &[u64]| {
            (at(table, x1, y1) + at(table, x0, y0)) - (at(table, x1, y0) + at(table, x0, y1))
        };
        (area(&self.sums) as f64, area(&self.squares) as f64)
    }
}
