//! State shared by the loop threads
//!
//! One parameter lock guards the settings, the region layout and the bait
//! baseline together, so a configuration update and a baseline change are
//! each seen whole by both loops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::Settings;
use crate::game::records::FishRecord;
use crate::game::state::{BaitChange, LoopState};
use crate::vision::RegionLayout;

/// Everything behind the parameter lock
#[derive(Debug, Clone)]
pub struct Params {
    pub settings: Settings,
    pub layout: RegionLayout,
    /// Last bait count accepted as the reference for bite detection
    pub baseline: Option<u32>,
}

/// Notifications from the loops
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    StateChanged { from: LoopState, to: LoopState },
    Cast,
    Hooked { from: u32, to: u32 },
    /// Reel cap reached with the fish still on
    ReelAborted { attempts: u32 },
    Caught(FishRecord),
    /// Casts are being refused: bucket full or out of bait
    BucketFull,
    OvertimeHandled,
}

type Observer = Arc<dyn Fn(&LoopEvent) + Send + Sync>;

/// Parameter lock, run flags and event observers
pub struct Shared {
    params: Mutex<Params>,
    running: AtomicBool,
    shutdown: AtomicBool,
    observers: Mutex<Vec<Observer>>,
}

impl Shared {
    pub fn new(settings: Settings, layout: RegionLayout) -> Self {
        Self {
            params: Mutex::new(Params {
                settings,
                layout,
                baseline: None,
            }),
            running: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Copy of the parameters, taken once per tick
    pub fn snapshot(&self) -> Params {
        self.lock().clone()
    }

    pub fn settings(&self) -> Settings {
        self.lock().settings.clone()
    }

    pub fn layout(&self) -> RegionLayout {
        self.lock().layout
    }

    /// Swap in new settings and layout in one step
    pub fn replace(&self, settings: Settings, layout: RegionLayout) {
        let mut params = self.lock();
        params.settings = settings;
        params.layout = layout;
    }

    pub fn baseline(&self) -> Option<u32> {
        self.lock().baseline
    }

    pub fn set_baseline(&self, baseline: Option<u32>) {
        self.lock().baseline = baseline;
    }

    /// Compare `reading` with the baseline and update it, atomically
    pub fn observe_bait(&self, reading: Option<u32>) -> BaitChange {
        let mut params = self.lock();
        let change = BaitChange::classify(params.baseline, reading);
        params.baseline = change.baseline(params.baseline);
        change
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) -> bool {
        self.running.swap(running, Ordering::SeqCst)
    }

    /// Ask every loop thread to exit
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn on_event(&self, observer: impl Fn(&LoopEvent) + Send + Sync + 'static) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(observer));
    }

    /// Notify the observers registered so far
    ///
    /// The list is copied first, so an observer may register others.
    pub fn emit(&self, event: LoopEvent) {
        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer(&event);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Params> {
        self.params.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn shared() -> Shared {
        Shared::new(Settings::default(), RegionLayout::default())
    }

    #[test]
    fn test_observe_bait_updates_baseline() {
        let shared = shared();
        assert_eq!(shared.observe_bait(Some(42)), BaitChange::Initialized(42));
        assert_eq!(shared.observe_bait(None), BaitChange::Unreadable);
        assert_eq!(shared.baseline(), Some(42));
        assert!(shared.observe_bait(Some(41)).is_bite());
        assert_eq!(shared.baseline(), Some(41));
    }

    #[test]
    fn test_replace_is_whole() {
        let shared = shared();
        let settings = Settings { reel_down: 1.0, ..Default::default() };
        let layout = RegionLayout::for_resolution(1920, 1080);
        shared.replace(settings.clone(), layout);

        let params = shared.snapshot();
        assert_eq!(params.settings, settings);
        assert_eq!(params.layout, layout);
    }

    #[test]
    fn test_observers() {
        let shared = shared();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        shared.on_event(move |e| sink.lock().unwrap().push(e.clone()));

        shared.emit(LoopEvent::Cast);
        shared.emit(LoopEvent::BucketFull);
        assert_eq!(*seen.lock().unwrap(), vec![LoopEvent::Cast, LoopEvent::BucketFull]);
    }

    #[test]
    fn test_observer_may_register_observers() {
        let shared = Arc::new(shared());
        let calls = Arc::new(AtomicUsize::new(0));

        let inner = Arc::clone(&shared);
        let counter = Arc::clone(&calls);
        shared.on_event(move |_| {
            let counter = Arc::clone(&counter);
            inner.on_event(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        shared.emit(LoopEvent::Cast);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        shared.emit(LoopEvent::Cast);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
