//! Angler - screen-driven fishing automation
//!
//! This library watches the game screen through template matching, casts and
//! reels with humanized mouse input, and records each catch read from the
//! catch banner.
//!
//! The core never talks to a display or input device directly: screen
//! capture, input injection, OCR and record persistence are providers passed
//! in through [`Providers`]. The `desktop` feature adds native providers.
//!
//! ## Humanized timing
//!
//! Every press duration goes through the [`timing`] module, which adds a
//! bounded random variation to the configured nominal value.

pub mod automation;
pub mod config;
pub mod game;
pub mod input;
pub mod timing;
pub mod vision;

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use crate::automation::{CatchRecorder, LoopEvent, RunControl, Shared, Workers};
use crate::config::{ConfigError, Settings};
use crate::game::records::{FishRecord, QualityCounts, RecordStore, Scope, SessionSummary};
use crate::input::{Actuate, Hotkey};
use crate::timing::Jitter;
use crate::vision::scaling::{REFERENCE_HEIGHT, REFERENCE_WIDTH};
use crate::vision::{CaptureProvider, OcrAdapter, RegionLayout, TemplateCache};

/// Everything the core consumes from the outside
pub struct Providers {
    pub capture: Arc<dyn CaptureProvider>,
    pub actuator: Arc<dyn Actuate>,
    pub templates: Arc<TemplateCache>,
    pub ocr: OcrAdapter,
    pub records: Arc<RecordStore>,
}

/// Automation facade used by the binary or any other front end
pub struct Angler {
    run: Arc<RunControl>,
    recorder: Arc<CatchRecorder>,
    capture: Arc<dyn CaptureProvider>,
    templates: Arc<TemplateCache>,
    hotkey: Arc<Mutex<Hotkey>>,
}

impl Angler {
    /// Create a new Angler instance with the given settings
    pub fn new(settings: Settings, providers: Providers) -> Result<Self, ConfigError> {
        let settings = settings.validated()?;
        let layout = layout_for(&settings, providers.capture.as_ref())?;

        providers
            .actuator
            .set_jitter(Jitter::new(settings.jitter_percent));
        let loaded = providers.templates.preload(layout.scale.scale_uniform);
        log::info!(
            "Layout for {}x{} ready, {} templates loaded",
            layout.scale.target_width,
            layout.scale.target_height,
            loaded
        );

        let hotkey = Arc::new(Mutex::new(settings.hotkey.clone()));
        let shared = Arc::new(Shared::new(settings, layout));
        let run = Arc::new(RunControl::new(
            shared,
            providers.actuator,
            Arc::clone(&providers.records),
        ));
        let recorder = Arc::new(CatchRecorder::new(providers.ocr, providers.records));

        Ok(Self {
            run,
            recorder,
            capture: providers.capture,
            templates: providers.templates,
            hotkey,
        })
    }

    pub fn start(&self) -> bool {
        self.run.start()
    }

    pub fn stop(&self) -> Option<SessionSummary> {
        self.run.stop()
    }

    pub fn toggle(&self) -> bool {
        self.run.toggle()
    }

    pub fn is_running(&self) -> bool {
        self.run.is_running()
    }

    pub fn settings(&self) -> Settings {
        self.run.shared().settings()
    }

    pub fn layout(&self) -> RegionLayout {
        self.run.shared().layout()
    }

    /// Apply new settings to both loops at once
    ///
    /// Invalid settings are rejected and the active ones stay in place. A
    /// resolution change recomputes every region and drops the cached
    /// templates.
    pub fn update_config(&self, settings: Settings) -> Result<(), ConfigError> {
        let settings = settings.validated()?;
        let layout = layout_for(&settings, self.capture.as_ref())?;

        let previous = self.run.shared().layout();
        if !previous.scale.same_scale(&layout.scale) {
            log::info!(
                "Resolution changed to {}x{}",
                layout.scale.target_width,
                layout.scale.target_height
            );
            self.templates.clear();
        }

        self.run
            .actuator()
            .set_jitter(Jitter::new(settings.jitter_percent));
        *self.hotkey.lock().unwrap_or_else(PoisonError::into_inner) = settings.hotkey.clone();
        self.run.shared().replace(settings, layout);
        log::info!("Parameters updated");
        Ok(())
    }

    pub fn session_records(&self, scope: Scope) -> Vec<FishRecord> {
        self.run.store().records(scope)
    }

    pub fn quality_counts(&self, scope: Scope) -> QualityCounts {
        self.run.store().count_by_quality(scope)
    }

    /// Call `callback` after every stored catch
    pub fn on_catch_recorded(&self, callback: impl Fn(&FishRecord) + Send + Sync + 'static) {
        self.run.store().on_catch_recorded(callback);
    }

    pub fn on_event(&self, observer: impl Fn(&LoopEvent) + Send + Sync + 'static) {
        self.run.shared().on_event(observer);
    }

    pub fn ocr_available(&self) -> bool {
        self.recorder.is_available()
    }

    /// Hotkey shared with the input listener, updated with the settings
    pub fn hotkey(&self) -> Arc<Mutex<Hotkey>> {
        Arc::clone(&self.hotkey)
    }

    pub fn run_control(&self) -> Arc<RunControl> {
        Arc::clone(&self.run)
    }

    /// Start the control and overtime threads
    pub fn spawn_workers(&self) -> io::Result<Workers> {
        Workers::spawn(
            Arc::clone(&self.run),
            Arc::clone(&self.recorder),
            Arc::clone(&self.capture),
            Arc::clone(&self.templates),
        )
    }

    /// Stop automation and ask every loop thread to exit
    pub fn shutdown(&self) -> Option<SessionSummary> {
        let summary = self.run.stop();
        self.run.shared().request_shutdown();
        summary
    }
}

fn layout_for(settings: &Settings, capture: &dyn CaptureProvider) -> Result<RegionLayout, ConfigError> {
    let display = capture.display_size().unwrap_or_else(|e| {
        log::warn!("Display size unknown ({}), assuming {}x{}", e, REFERENCE_WIDTH, REFERENCE_HEIGHT);
        (REFERENCE_WIDTH, REFERENCE_HEIGHT)
    });
    let (width, height) = settings.resolve_resolution(display)?;
    Ok(RegionLayout::for_resolution(width, height))
}
