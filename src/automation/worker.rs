//! Loop threads
//!
//! Each loop runs on a named thread that survives a failing iteration: a
//! panic is caught at the iteration boundary, logged, the button released
//! and the next tick proceeds.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::control::{ControlLoop, IDLE_POLL, UNREADABLE_RETRY};
use super::overtime::{OvertimeLoop, OVERTIME_INTERVAL};
use super::recorder::CatchRecorder;
use super::run::RunControl;
use crate::input::InputEvent;
use crate::vision::{self, CaptureProvider, TemplateCache};

/// Sleep after an iteration that panicked
const PANIC_BACKOFF: Duration = Duration::from_millis(500);

/// Run `body` until shutdown, sleeping for whatever each iteration returns
pub fn run_worker(name: &str, run: &RunControl, mut body: impl FnMut() -> Duration) {
    log::debug!("{} loop started", name);
    while !run.shared().is_shutdown() {
        let sleep = match panic::catch_unwind(AssertUnwindSafe(&mut body)) {
            Ok(sleep) => sleep,
            Err(payload) => {
                log::error!("{} loop iteration panicked: {}", name, panic_message(&*payload));
                run.actuator().ensure_released();
                PANIC_BACKOFF
            }
        };
        if !sleep.is_zero() {
            thread::sleep(sleep);
        }
    }
    log::debug!("{} loop exited", name);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Handles of the spawned loop threads
pub struct Workers {
    handles: Vec<JoinHandle<()>>,
}

impl Workers {
    /// Spawn the control and overtime loops
    pub fn spawn(
        run: Arc<RunControl>,
        recorder: Arc<CatchRecorder>,
        capture: Arc<dyn CaptureProvider>,
        templates: Arc<TemplateCache>,
    ) -> io::Result<Self> {
        let control = {
            let run = Arc::clone(&run);
            let capture = Arc::clone(&capture);
            let templates = Arc::clone(&templates);
            thread::Builder::new()
                .name("control".into())
                .spawn(move || control_thread(run, recorder, capture, templates))?
        };

        let overtime = thread::Builder::new()
            .name("overtime".into())
            .spawn(move || overtime_thread(run, capture, templates))?;

        Ok(Self {
            handles: vec![control, overtime],
        })
    }

    /// Wait for every loop to exit
    pub fn join(self) {
        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if let Err(e) = handle.join() {
                log::error!("{} thread panicked: {}", name, panic_message(&*e));
            }
        }
    }
}

fn control_thread(
    run: Arc<RunControl>,
    recorder: Arc<CatchRecorder>,
    capture: Arc<dyn CaptureProvider>,
    templates: Arc<TemplateCache>,
) {
    let mut control = ControlLoop::new(Arc::clone(&run), recorder);

    run_worker("Control", &run, || {
        if !run.is_running() {
            control.park();
            return IDLE_POLL;
        }

        let params = run.shared().snapshot();
        let delay = match vision::open_probe(capture.as_ref(), &params.layout, &templates) {
            Ok(mut probe) => control.tick(&params.settings, &mut probe),
            Err(e) => {
                log::debug!("Capture unavailable: {}", e);
                UNREADABLE_RETRY
            }
        };
        delay
    });
}

fn overtime_thread(
    run: Arc<RunControl>,
    capture: Arc<dyn CaptureProvider>,
    templates: Arc<TemplateCache>,
) {
    let overtime = OvertimeLoop::new(Arc::clone(&run));

    run_worker("Overtime", &run, || {
        let params = run.shared().snapshot();
        if run.is_running() && params.settings.overtime.is_enabled() {
            match vision::open_probe(capture.as_ref(), &params.layout, &templates) {
                Ok(mut probe) => {
                    overtime.tick(&params, &mut probe);
                }
                Err(e) => log::trace!("Capture unavailable: {}", e),
            }
        }
        OVERTIME_INTERVAL
    });
}

/// Consume input events until shutdown
///
/// Toggles are funneled through [`RunControl::toggle`], which drops any that
/// arrive while another is being applied.
pub fn run_coordinator(run: &RunControl, events: Receiver<InputEvent>) {
    loop {
        if run.shared().is_shutdown() {
            break;
        }
        match events.recv_timeout(IDLE_POLL) {
            Ok(InputEvent::Toggle) => {
                let running = run.toggle();
                log::info!("Automation {}", if running { "running" } else { "paused" });
            }
            Ok(InputEvent::Shutdown) => {
                run.stop();
                run.shared().request_shutdown();
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::debug!("Input channel closed");
                break;
            }
        }
    }
}
