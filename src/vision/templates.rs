//! Reference template loading and caching
//!
//! Templates are grayscale PNGs named `<name>_grayscale.png`. They are
//! resized once per scale bucket and shared between all classifiers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use image::imageops::FilterType;
use image::GrayImage;

use super::VisionError;

/// Names of every template the classifiers use
pub const STATE_TEMPLATES: [&str; 5] = ["star", "F1", "F2", "shangyu", "chang"];

/// Where unscaled templates come from
pub trait TemplateSource: Send + Sync {
    /// Load the unscaled template, `Ok(None)` when the asset does not exist
    fn load(&self, name: &str) -> Result<Option<GrayImage>, VisionError>;
}

/// Templates stored as `<dir>/<name>_grayscale.png`
pub struct DirectoryTemplates {
    dir: PathBuf,
}

impl DirectoryTemplates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}_grayscale.png"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TemplateSource for DirectoryTemplates {
    fn load(&self, name: &str) -> Result<Option<GrayImage>, VisionError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }

        let img = image::open(&path)
            .map_err(|e| VisionError::TemplateLoadError(format!("{}: {}", path.display(), e)))?;
        Ok(Some(img.to_luma8()))
    }
}

impl TemplateSource for HashMap<String, GrayImage> {
    fn load(&self, name: &str) -> Result<Option<GrayImage>, VisionError> {
        Ok(self.get(name).cloned())
    }
}

/// Cache key: template name plus the scale quantized to 2 decimals
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    name: String,
    scale_x: i64,
    scale_y: i64,
}

impl CacheKey {
    fn new(name: &str, scale_x: f64, scale_y: f64) -> Self {
        Self {
            name: name.to_string(),
            scale_x: (scale_x * 100.0).round() as i64,
            scale_y: (scale_y * 100.0).round() as i64,
        }
    }
}

/// Lazily loaded, scale-bucketed template cache
pub struct TemplateCache {
    source: Box<dyn TemplateSource>,
    entries: Mutex<HashMap<CacheKey, Arc<GrayImage>>>,
}

impl TemplateCache {
    pub fn new(source: impl TemplateSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache reading templates from a resource directory
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(DirectoryTemplates::new(dir))
    }

    /// Get `name` resized by (`scale_x`, `scale_y`)
    ///
    /// Missing or unreadable assets yield `None`; the caller treats that as
    /// the classifier being unavailable. Misses are not cached.
    pub fn get(&self, name: &str, scale_x: f64, scale_y: f64) -> Option<Arc<GrayImage>> {
        let key = CacheKey::new(name, scale_x, scale_y);

        if let Some(hit) = self.lock().get(&key) {
            return Some(Arc::clone(hit));
        }

        let template = match self.source.load(name) {
            Ok(Some(img)) => img,
            Ok(None) => {
                log::debug!("Template '{}' not found", name);
                return None;
            }
            Err(e) => {
                log::warn!("Failed to load template '{}': {}", name, e);
                return None;
            }
        };

        let template = Arc::new(resize_template(template, scale_x, scale_y));
        self.lock().insert(key, Arc::clone(&template));
        Some(template)
    }

    /// Evict every entry; called whenever the global scale changes
    pub fn clear(&self) {
        let mut entries = self.lock();
        if !entries.is_empty() {
            log::info!("Clearing {} cached templates", entries.len());
        }
        entries.clear();
    }

    /// Number of cached (name, scale) entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Load the digit and state templates for `scale` up front
    pub fn preload(&self, scale: f64) -> usize {
        (0..10)
            .map(|d| d.to_string())
            .chain(STATE_TEMPLATES.iter().map(|s| s.to_string()))
            .filter(|name| self.get(name, scale, scale).is_some())
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Arc<GrayImage>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Linear resize, skipped entirely at unit scale
fn resize_template(template: GrayImage, scale_x: f64, scale_y: f64) -> GrayImage {
    if scale_x == 1.0 && scale_y == 1.0 {
        return template;
    }

    let (w, h) = template.dimensions();
    let new_w = ((w as f64 * scale_x) as u32).max(1);
    let new_h = ((h as f64 * scale_y) as u32).max(1);
    image::imageops::resize(&template, new_w, new_h, FilterType::Triangle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        loads: Arc<AtomicUsize>,
    }

    impl TemplateSource for CountingSource {
        fn load(&self, name: &str) -> Result<Option<GrayImage>, VisionError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if name == "missing" {
                return Ok(None);
            }
            Ok(Some(GrayImage::from_fn(20, 10, |x, _| Luma([(x * 10) as u8]))))
        }
    }

    fn counting_cache() -> (TemplateCache, Arc<AtomicUsize>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = TemplateCache::new(CountingSource {
            loads: Arc::clone(&loads),
        });
        (cache, loads)
    }

    #[test]
    fn test_missing_asset_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TemplateCache::from_dir(dir.path());
        assert!(cache.get("star", 1.0, 1.0).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_loads_png_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let img = GrayImage::from_fn(8, 6, |x, y| Luma([(x + y) as u8 * 20]));
        img.save(dir.path().join("star_grayscale.png")).unwrap();

        let cache = TemplateCache::from_dir(dir.path());
        let loaded = cache.get("star", 1.0, 1.0).unwrap();
        assert_eq!(loaded.dimensions(), (8, 6));
        assert_eq!(loaded.get_pixel(3, 2)[0], 100);
    }

    #[test]
    fn test_resizes_and_memoizes_per_bucket() {
        let (cache, loads) = counting_cache();

        let half = cache.get("7", 0.5, 0.5).unwrap();
        assert_eq!(half.dimensions(), (10, 5));

        // 0.501 rounds into the same bucket
        cache.get("7", 0.501, 0.499).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        let large = cache.get("7", 1.5, 1.5).unwrap();
        assert_eq!(large.dimensions(), (30, 15));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_clear_forces_reload() {
        let (cache, loads) = counting_cache();

        cache.get("star", 1.0, 1.0).unwrap();
        cache.clear();
        assert!(cache.is_empty());

        cache.get("star", 1.0, 1.0).unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_misses_are_not_cached() {
        let (cache, loads) = counting_cache();
        assert!(cache.get("missing", 1.0, 1.0).is_none());
        assert!(cache.get("missing", 1.0, 1.0).is_none());
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }
}
