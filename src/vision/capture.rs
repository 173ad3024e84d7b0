//! Screen capture handling
//!
//! Capture is session based: a provider opens a [`CaptureSession`] for one
//! polling tick and the session is released when it is dropped, on every
//! exit path. Regions are clamped to the display before grabbing.

use std::sync::{Arc, Mutex, PoisonError};

use image::{GrayImage, RgbaImage};

use super::scaling::Region;
use super::VisionError;

/// Source of screen pixels
pub trait CaptureProvider: Send + Sync {
    /// Open a capture session; dropping it releases the OS handle
    fn open(&self) -> Result<Box<dyn CaptureSession + '_>, VisionError>;

    /// Current display size in pixels
    fn display_size(&self) -> Result<(u32, u32), VisionError>;
}

/// One live capture handle
pub trait CaptureSession {
    /// Display bounds used for clamping
    fn bounds(&self) -> (u32, u32);

    /// Grab a region that is already inside [`bounds`](Self::bounds)
    fn grab(&mut self, region: Region) -> Result<RgbaImage, VisionError>;
}

/// Capture `region` as grayscale, or `None` if nothing usable came back
pub fn capture_gray(session: &mut dyn CaptureSession, region: Region) -> Option<GrayImage> {
    capture_rgba(session, region).map(|img| image::imageops::grayscale(&img))
}

/// Capture `region` in color, or `None` if nothing usable came back
pub fn capture_rgba(session: &mut dyn CaptureSession, region: Region) -> Option<RgbaImage> {
    let (w, h) = session.bounds();
    let clamped = region.clamp_to(w, h)?;

    match session.grab(clamped) {
        Ok(img) if img.width() > 0 && img.height() > 0 => Some(img),
        Ok(_) => None,
        Err(e) => {
            log::debug!("Capture of {:?} failed: {}", clamped, e);
            None
        }
    }
}

/// Capture the whole display
pub fn capture_full(session: &mut dyn CaptureSession) -> Option<RgbaImage> {
    let (w, h) = session.bounds();
    capture_rgba(session, Region::new(0, 0, w as i32, h as i32))
}

/// Provider backed by frames pushed from elsewhere
///
/// Useful when another component owns the real capture pipeline, and for
/// replaying recorded screenshots. Open sessions always read the latest
/// frame.
#[derive(Default)]
pub struct FrameCapture {
    frame: Mutex<Option<Arc<RgbaImage>>>,
}

impl FrameCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `image` as the current frame
    pub fn with_frame(image: RgbaImage) -> Self {
        let capture = Self::new();
        capture.set_frame(image);
        capture
    }

    /// Replace the current frame
    pub fn set_frame(&self, image: RgbaImage) {
        *self.frame.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(image));
    }

    fn current(&self) -> Option<Arc<RgbaImage>> {
        self.frame
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CaptureProvider for FrameCapture {
    fn open(&self) -> Result<Box<dyn CaptureSession + '_>, VisionError> {
        if self.current().is_none() {
            return Err(VisionError::NoFrame);
        }
        Ok(Box::new(FrameSession { capture: self }))
    }

    fn display_size(&self) -> Result<(u32, u32), VisionError> {
        self.current()
            .map(|f| f.dimensions())
            .ok_or(VisionError::NoFrame)
    }
}

struct FrameSession<'a> {
    capture: &'a FrameCapture,
}

impl CaptureSession for FrameSession<'_> {
    fn bounds(&self) -> (u32, u32) {
        self.capture
            .current()
            .map_or((0, 0), |f| f.dimensions())
    }

    fn grab(&mut self, region: Region) -> Result<RgbaImage, VisionError> {
        let frame = self.capture.current().ok_or(VisionError::NoFrame)?;
        let (w, h) = frame.dimensions();
        if region.x < 0
            || region.y < 0
            || region.width <= 0
            || region.height <= 0
            || (region.x + region.width) as u32 > w
            || (region.y + region.height) as u32 > h
        {
            return Err(VisionError::RegionOutOfBounds(region));
        }

        let sub = image::imageops::crop_imm(
            frame.as_ref(),
            region.x as u32,
            region.y as u32,
            region.width as u32,
            region.height as u32,
        );
        Ok(sub.to_image())
    }
}

#[cfg(feature = "desktop")]
pub use desktop::MonitorCapture;

#[cfg(feature = "desktop")]
mod desktop {
    use image::RgbaImage;
    use xcap::Monitor;

    use super::{CaptureProvider, CaptureSession};
    use crate::vision::scaling::Region;
    use crate::vision::VisionError;

    /// Primary-monitor capture through `xcap`
    pub struct MonitorCapture;

    impl MonitorCapture {
        pub fn new() -> Self {
            Self
        }

        fn primary() -> Result<Monitor, VisionError> {
            let monitors =
                Monitor::all().map_err(|e| VisionError::CaptureError(e.to_string()))?;
            let mut fallback = None;
            for monitor in monitors {
                if monitor.is_primary().unwrap_or(false) {
                    return Ok(monitor);
                }
                fallback.get_or_insert(monitor);
            }
            fallback.ok_or_else(|| VisionError::CaptureError("No monitor found".into()))
        }
    }

    impl Default for MonitorCapture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CaptureProvider for MonitorCapture {
        fn open(&self) -> Result<Box<dyn CaptureSession + '_>, VisionError> {
            let monitor = Self::primary()?;
            let width = monitor
                .width()
                .map_err(|e| VisionError::CaptureError(e.to_string()))?;
            let height = monitor
                .height()
                .map_err(|e| VisionError::CaptureError(e.to_string()))?;
            Ok(Box::new(MonitorSession {
                monitor,
                bounds: (width, height),
            }))
        }

        fn display_size(&self) -> Result<(u32, u32), VisionError> {
            let session = self.open()?;
            Ok(session.bounds())
        }
    }

    struct MonitorSession {
        monitor: Monitor,
        bounds: (u32, u32),
    }

    impl CaptureSession for MonitorSession {
        fn bounds(&self) -> (u32, u32) {
            self.bounds
        }

        fn grab(&mut self, region: Region) -> Result<RgbaImage, VisionError> {
            self.monitor
                .capture_region(
                    region.x as u32,
                    region.y as u32,
                    region.width as u32,
                    region.height as u32,
                )
                .map_err(|e| VisionError::CaptureError(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 0, 255]))
    }

    #[test]
    fn test_open_without_frame_fails() {
        let capture = FrameCapture::new();
        assert!(matches!(capture.open(), Err(VisionError::NoFrame)));
        assert!(capture.display_size().is_err());

        capture.set_frame(gradient(10, 10));
        assert_eq!(capture.display_size().unwrap(), (10, 10));
    }

    #[test]
    fn test_capture_clamps_region() {
        let capture = FrameCapture::with_frame(gradient(50, 40));
        let mut session = capture.open().unwrap();

        // Hangs off the right edge: shifted back inside
        let img = capture_rgba(session.as_mut(), Region::new(45, 10, 10, 5)).unwrap();
        assert_eq!(img.dimensions(), (10, 5));
        assert_eq!(img.get_pixel(0, 0)[0], 40);
        assert_eq!(img.get_pixel(0, 0)[1], 10);
    }

    #[test]
    fn test_zero_area_capture_is_none() {
        let capture = FrameCapture::with_frame(gradient(50, 40));
        let mut session = capture.open().unwrap();
        assert!(capture_gray(session.as_mut(), Region::new(5, 5, 0, 10)).is_none());
    }

    #[test]
    fn test_grayscale_and_full_capture() {
        let capture = FrameCapture::with_frame(RgbaImage::from_pixel(8, 6, Rgba([90, 90, 90, 255])));
        let mut session = capture.open().unwrap();

        let gray = capture_gray(session.as_mut(), Region::new(1, 1, 3, 3)).unwrap();
        assert_eq!(gray.get_pixel(1, 1)[0], 90);

        let full = capture_full(session.as_mut()).unwrap();
        assert_eq!(full.dimensions(), (8, 6));
    }

    #[test]
    fn test_open_session_sees_new_frames() {
        let capture = FrameCapture::with_frame(RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 255])));
        let mut session = capture.open().unwrap();
        capture.set_frame(RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 255])));

        let img = session.grab(Region::new(2, 2, 4, 4)).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));

        capture.set_frame(gradient(5, 5));
        assert_eq!(session.bounds(), (5, 5));
        assert!(session.grab(Region::new(10, 10, 5, 5)).is_err());
    }
}
