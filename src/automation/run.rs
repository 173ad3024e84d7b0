//! Start/stop transitions
//!
//! Hotkeys, the facade and the control loop itself (on a full bucket) all
//! start and stop automation through [`RunControl`], so every stop releases
//! the button and closes the session the same way.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread;
use std::time::Duration;

use super::shared::Shared;
use crate::game::records::{RecordStore, SessionSummary};
use crate::game::state::RunState;
use crate::input::Actuate;

/// Lets an in-flight press finish before the button is force-released
const STOP_SETTLE: Duration = Duration::from_millis(100);

pub struct RunControl {
    shared: Arc<Shared>,
    actuator: Arc<dyn Actuate>,
    store: Arc<RecordStore>,
    /// Held for the whole of a start, stop or toggle
    lifecycle: Mutex<RunState>,
}

impl RunControl {
    pub fn new(shared: Arc<Shared>, actuator: Arc<dyn Actuate>, store: Arc<RecordStore>) -> Self {
        Self {
            shared,
            actuator,
            store,
            lifecycle: Mutex::new(RunState::Stopped),
        }
    }

    pub fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub fn actuator(&self) -> &Arc<dyn Actuate> {
        &self.actuator
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Begin fishing; the loop takes its first bait reading on its own
    ///
    /// Returns false if already running.
    pub fn start(&self) -> bool {
        let mut state = self.lifecycle();
        self.start_locked(&mut state)
    }

    /// Stop fishing, release the button and close the session
    pub fn stop(&self) -> Option<SessionSummary> {
        let mut state = self.lifecycle();
        self.stop_locked(&mut state)
    }

    /// Flip between running and stopped
    ///
    /// A toggle arriving while a start, stop or another toggle is in
    /// progress is dropped. Returns whether automation is running afterwards.
    pub fn toggle(&self) -> bool {
        let mut state = match self.lifecycle.try_lock() {
            Ok(state) => state,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => {
                log::debug!("Toggle already in progress, ignored");
                return self.is_running();
            }
        };

        match state.toggled() {
            RunState::Running => {
                self.start_locked(&mut state);
            }
            RunState::Stopped => {
                self.stop_locked(&mut state);
            }
        }
        state.is_running()
    }

    fn start_locked(&self, state: &mut RunState) -> bool {
        if state.is_running() {
            return false;
        }
        self.actuator.ensure_released();
        self.shared.set_baseline(None);
        self.store.start_session();
        self.shared.set_running(true);
        *state = RunState::Running;
        log::info!("Automation started");
        true
    }

    fn stop_locked(&self, state: &mut RunState) -> Option<SessionSummary> {
        let was_running = state.is_running();
        self.shared.set_running(false);
        *state = RunState::Stopped;
        if was_running {
            thread::sleep(STOP_SETTLE);
        }
        self.actuator.ensure_released();
        self.shared.set_baseline(None);

        if !was_running {
            return None;
        }
        log::info!("Automation stopped");
        self.store.end_session()
    }

    fn lifecycle(&self) -> MutexGuard<'_, RunState> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
