//! Fishing control loop
//!
//! One [`ControlLoop::tick`] performs one state transition against a fresh
//! [`ScreenProbe`] and returns how long the worker should sleep before the
//! next tick. Prompts are handled before the bait count is compared, so a
//! pending cast always happens even if the count did not move.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::recorder::CatchRecorder;
use super::run::RunControl;
use super::shared::LoopEvent;
use crate::config::Settings;
use crate::game::bucket::CastMonitor;
use crate::game::state::{BaitChange, LoopState};
use crate::vision::{PromptSlot, ScreenProbe};

/// Sleep while automation is stopped
pub const IDLE_POLL: Duration = Duration::from_millis(100);

/// Retry delay when the first bait reading fails
pub const START_RETRY: Duration = Duration::from_millis(500);

/// Retry delay after an unreadable bait count
pub const UNREADABLE_RETRY: Duration = Duration::from_millis(100);

/// Pause after a cast before looking at the screen again
const CAST_SETTLE: Duration = Duration::from_millis(150);

pub struct ControlLoop {
    run: Arc<RunControl>,
    recorder: Arc<CatchRecorder>,
    state: LoopState,
    attempts: u32,
    casts: CastMonitor,
}

impl ControlLoop {
    pub fn new(run: Arc<RunControl>, recorder: Arc<CatchRecorder>) -> Self {
        Self {
            run,
            recorder,
            state: LoopState::Idle,
            attempts: 0,
            casts: CastMonitor::new(),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Reel presses made for the current fish
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Drop any in-flight progress after automation was stopped
    pub fn park(&mut self) {
        if self.state != LoopState::Idle || self.attempts != 0 {
            self.attempts = 0;
            self.casts.reset();
            self.transition(LoopState::Idle);
        }
    }

    /// Run one transition; returns the sleep before the next tick
    pub fn tick(&mut self, settings: &Settings, probe: &mut dyn ScreenProbe) -> Duration {
        if !self.run.is_running() {
            self.park();
            return IDLE_POLL;
        }

        match self.state {
            LoopState::Idle => self.acquire_baseline(probe),
            LoopState::Polling => self.poll(settings, probe),
            LoopState::Hooked | LoopState::Reeling => self.reel(settings, probe),
            LoopState::Recording => self.record(settings, probe),
        }
    }

    fn acquire_baseline(&mut self, probe: &mut dyn ScreenProbe) -> Duration {
        match probe.bait_count() {
            Some(count) => {
                self.run.shared().set_baseline(Some(count));
                log::info!("Initial bait count: {}", count);
                self.casts.reset();
                self.transition(LoopState::Polling);
                Duration::ZERO
            }
            None => {
                log::warn!("Bait count unreadable, retrying");
                START_RETRY
            }
        }
    }

    fn poll(&mut self, settings: &Settings, probe: &mut dyn ScreenProbe) -> Duration {
        if self.handle_prompts(settings, probe) {
            return IDLE_POLL;
        }

        let reading = probe.bait_count();
        match self.run.shared().observe_bait(reading) {
            BaitChange::Unreadable => {
                log::trace!("Bait count unreadable");
                return UNREADABLE_RETRY;
            }
            BaitChange::Initialized(count) => log::debug!("Bait baseline set to {}", count),
            BaitChange::Bite { from, to } => {
                log::info!("Bite detected (bait {} -> {})", from, to);
                self.run.shared().emit(LoopEvent::Hooked { from, to });
                self.transition(LoopState::Hooked);
                return Duration::ZERO;
            }
            BaitChange::Replenished { from, to } => {
                log::debug!("Bait replenished {} -> {}", from, to)
            }
            BaitChange::Unchanged(_) => {}
        }

        Duration::from_secs_f64(settings.loop_interval)
    }

    /// Cast on a prompt or dismiss the landed icon; true if the run stopped
    fn handle_prompts(&mut self, settings: &Settings, probe: &mut dyn ScreenProbe) -> bool {
        let actuator = self.run.actuator();

        let slot = [PromptSlot::F1, PromptSlot::F2]
            .into_iter()
            .find(|slot| probe.prompt(*slot));

        if let Some(slot) = slot {
            let full = self.casts.record_cast(Instant::now());
            match actuator.cast(settings.cast_duration) {
                Ok(waited) => {
                    log::info!("Cast on {} prompt (waited {:.3}s)", slot.template(), waited);
                    self.run.shared().emit(LoopEvent::Cast);
                }
                Err(e) => log::warn!("Cast failed: {}", e),
            }
            thread::sleep(CAST_SETTLE);

            if full {
                return self.on_bucket_full(settings);
            }
        } else if probe.landed() {
            log::debug!("Dismissing landed fish");
            if let Err(e) = actuator.click(None) {
                log::warn!("Click failed: {}", e);
            }
        }
        false
    }

    fn on_bucket_full(&mut self, settings: &Settings) -> bool {
        log::warn!("Casts are being refused: bucket full or out of bait");
        self.casts.reset();
        self.run.shared().emit(LoopEvent::BucketFull);

        if settings.bucket_full_pause {
            self.run.stop();
            self.park();
            return true;
        }
        false
    }

    fn reel(&mut self, settings: &Settings, probe: &mut dyn ScreenProbe) -> Duration {
        self.transition(LoopState::Reeling);
        let actuator = Arc::clone(self.run.actuator());

        let cleared = loop {
            if !self.run.is_running() {
                actuator.ensure_released();
                self.park();
                return IDLE_POLL;
            }
            if !probe.bite() {
                break true;
            }
            if self.attempts >= settings.max_reel_attempts {
                break false;
            }
            if let Err(e) = actuator.press_and_release(settings.reel_down, settings.reel_up) {
                log::warn!("Reel press failed: {}", e);
                break false;
            }
            self.attempts += 1;
        };

        actuator.ensure_released();
        let attempts = std::mem::take(&mut self.attempts);

        if cleared {
            log::info!("Fish landed after {} reel presses", attempts);
            self.transition(LoopState::Recording);
        } else {
            log::warn!("Gave up reeling after {} presses", attempts);
            self.run.shared().emit(LoopEvent::ReelAborted { attempts });
            self.transition(LoopState::Polling);
        }
        Duration::ZERO
    }

    fn record(&mut self, settings: &Settings, probe: &mut dyn ScreenProbe) -> Duration {
        if settings.record_enabled {
            if let Some(record) = self.recorder.record(probe, settings.screenshot_on_rare) {
                self.run.shared().emit(LoopEvent::Caught(record));
            }
        }
        self.transition(LoopState::Polling);
        Duration::from_secs_f64(settings.loop_interval)
    }

    fn transition(&mut self, to: LoopState) {
        let from = self.state;
        if from == to {
            return;
        }
        log::debug!("Loop state {} -> {}", from, to);
        self.state = to;
        self.run.shared().emit(LoopEvent::StateChanged { from, to });
    }
}
