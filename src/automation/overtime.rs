//! Overtime dialog handling
//!
//! Runs on its own thread next to the control loop. The only state it shares
//! with it is the bait baseline, written under the parameter lock.

use std::sync::Arc;
use std::time::Duration;

use super::run::RunControl;
use super::shared::{LoopEvent, Params};
use crate::config::OvertimeChoice;
use crate::vision::ScreenProbe;

/// Poll period of the overtime loop
pub const OVERTIME_INTERVAL: Duration = Duration::from_millis(50);

pub struct OvertimeLoop {
    run: Arc<RunControl>,
}

impl OvertimeLoop {
    pub fn new(run: Arc<RunControl>) -> Self {
        Self { run }
    }

    /// Answer the dialog if it is showing; returns true if it was handled
    pub fn tick(&self, params: &Params, probe: &mut dyn ScreenProbe) -> bool {
        if !self.run.is_running() {
            return false;
        }

        let target = match params.settings.overtime {
            OvertimeChoice::Off => return false,
            OvertimeChoice::Decline => params.layout.overtime_decline,
            OvertimeChoice::Accept => params.layout.overtime_accept,
        };

        if !probe.overtime_dialog() {
            return false;
        }

        log::info!("Overtime dialog: {:?}", params.settings.overtime);
        if let Err(e) = self.run.actuator().click(Some(target)) {
            log::warn!("Failed to answer overtime dialog: {}", e);
            return false;
        }

        if let Some(count) = probe.bait_count() {
            self.run.shared().set_baseline(Some(count));
            log::debug!("Bait baseline reset to {} after overtime", count);
        }
        self.run.shared().emit(LoopEvent::OvertimeHandled);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::shared::Shared;
    use crate::config::Settings;
    use crate::game::records::RecordStore;
    use crate::input::{Actuate, InputError};
    use crate::timing::Jitter;
    use crate::vision::{Point, PromptSlot, RegionLayout};
    use image::RgbaImage;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Clicks(Mutex<Vec<Option<Point>>>);

    impl Actuate for Clicks {
        fn press_and_release(&self, _down: f64, _up: f64) -> Result<Duration, InputError> {
            Ok(Duration::ZERO)
        }
        fn click(&self, at: Option<Point>) -> Result<(), InputError> {
            self.0.lock().unwrap().push(at);
            Ok(())
        }
        fn cast(&self, base: f64) -> Result<f64, InputError> {
            Ok(base)
        }
        fn ensure_released(&self) {}
        fn set_jitter(&self, _jitter: Jitter) {}
    }

    struct Dialog {
        showing: bool,
        bait: Option<u32>,
    }

    impl ScreenProbe for Dialog {
        fn bite(&mut self) -> bool {
            false
        }
        fn prompt(&mut self, _slot: PromptSlot) -> bool {
            false
        }
        fn landed(&mut self) -> bool {
            false
        }
        fn bait_count(&mut self) -> Option<u32> {
            self.bait
        }
        fn overtime_dialog(&mut self) -> bool {
            self.showing
        }
        fn fish_info(&mut self) -> Option<RgbaImage> {
            None
        }
        fn full_screen(&mut self) -> Option<RgbaImage> {
            None
        }
    }

    fn setup(choice: OvertimeChoice) -> (OvertimeLoop, Arc<RunControl>, Arc<Clicks>, Params) {
        let settings = Settings { overtime: choice, ..Default::default() };
        let shared = Arc::new(Shared::new(settings, RegionLayout::default()));
        let clicks = Arc::new(Clicks::default());
        let run = Arc::new(RunControl::new(
            shared,
            Arc::clone(&clicks) as Arc<dyn Actuate>,
            Arc::new(RecordStore::in_memory()),
        ));
        run.start();
        let params = run.shared().snapshot();
        (OvertimeLoop::new(Arc::clone(&run)), run, clicks, params)
    }

    #[test]
    fn test_decline_clicks_and_resets_baseline() {
        let (overtime, run, clicks, params) = setup(OvertimeChoice::Decline);
        run.shared().set_baseline(Some(30));

        let mut probe = Dialog { showing: true, bait: Some(28) };
        assert!(overtime.tick(&params, &mut probe));
        assert_eq!(*clicks.0.lock().unwrap(), vec![Some(params.layout.overtime_decline)]);
        assert_eq!(run.shared().baseline(), Some(28));
    }

    #[test]
    fn test_accept_uses_accept_button() {
        let (overtime, run, clicks, params) = setup(OvertimeChoice::Accept);
        run.shared().set_baseline(Some(30));

        let mut probe = Dialog { showing: true, bait: None };
        assert!(overtime.tick(&params, &mut probe));
        assert_eq!(*clicks.0.lock().unwrap(), vec![Some(params.layout.overtime_accept)]);
        assert_eq!(run.shared().baseline(), Some(30));
    }

    #[test]
    fn test_nothing_to_do() {
        let (overtime, run, clicks, params) = setup(OvertimeChoice::Decline);
        assert!(!overtime.tick(&params, &mut Dialog { showing: false, bait: Some(1) }));

        let (off, _, off_clicks, off_params) = setup(OvertimeChoice::Off);
        assert!(!off.tick(&off_params, &mut Dialog { showing: true, bait: Some(1) }));

        run.stop();
        assert!(!overtime.tick(&params, &mut Dialog { showing: true, bait: Some(1) }));

        assert!(clicks.0.lock().unwrap().is_empty());
        assert!(off_clicks.0.lock().unwrap().is_empty());
    }
}
