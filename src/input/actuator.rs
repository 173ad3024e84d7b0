//! Mouse actuation
//!
//! All presses go through one [`Actuator`], which owns the injected button
//! state behind a single lock. Whoever stops or recovers the loop calls
//! [`Actuate::ensure_released`] so no synthetic press is left hanging.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::timing::{Jitter, Operation, TimingReporter};
use crate::vision::Point;

/// Hold time of a plain click
const CLICK_HOLD: Duration = Duration::from_millis(100);

/// Pause after a click and after a cursor move
const CLICK_SETTLE: Duration = Duration::from_millis(50);

/// Low-level input injection
pub trait InputProvider: Send {
    /// Press the primary button
    fn press(&mut self) -> Result<(), InputError>;

    /// Release the primary button
    fn release(&mut self) -> Result<(), InputError>;

    /// Move the cursor to an absolute screen position
    fn move_to(&mut self, point: Point) -> Result<(), InputError>;
}

/// Actions the control loops perform
pub trait Actuate: Send + Sync {
    /// Hold for a jittered `down`, then wait a jittered `up`; returns wall time
    fn press_and_release(&self, down: f64, up: f64) -> Result<Duration, InputError>;

    /// Click, optionally moving the cursor first
    fn click(&self, at: Option<Point>) -> Result<(), InputError>;

    /// Click to cast, then wait a jittered `base`; returns the wait used
    fn cast(&self, base: f64) -> Result<f64, InputError>;

    /// Release the button if it is down. Idempotent.
    fn ensure_released(&self);

    /// Change the jitter used by later actions
    fn set_jitter(&self, jitter: Jitter);
}

struct Button {
    input: Box<dyn InputProvider>,
    down: bool,
}

impl Button {
    fn press(&mut self) -> Result<(), InputError> {
        self.input.press()?;
        self.down = true;
        Ok(())
    }

    fn release(&mut self) -> Result<(), InputError> {
        self.input.release()?;
        self.down = false;
        Ok(())
    }

    /// Release a press left over from an earlier failure
    fn reset(&mut self) -> Result<(), InputError> {
        if self.down {
            self.release()?;
        }
        Ok(())
    }
}

/// Thread-safe mouse actuator with jittered timing
pub struct Actuator {
    button: Mutex<Button>,
    jitter_percent: AtomicU8,
    reporter: TimingReporter,
}

impl Actuator {
    pub fn new(input: impl InputProvider + 'static) -> Self {
        Self {
            button: Mutex::new(Button {
                input: Box::new(input),
                down: false,
            }),
            jitter_percent: AtomicU8::new(Jitter::default().percent()),
            reporter: TimingReporter::new(),
        }
    }

    pub fn jitter(&self) -> Jitter {
        Jitter::new(self.jitter_percent.load(Ordering::Relaxed))
    }

    /// Whether the button is currently held
    pub fn is_down(&self) -> bool {
        self.lock().down
    }

    fn lock(&self) -> MutexGuard<'_, Button> {
        self.button.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Actuate for Actuator {
    fn press_and_release(&self, down: f64, up: f64) -> Result<Duration, InputError> {
        let jitter = self.jitter();
        let actual_down = jitter.sample(down);
        let actual_up = jitter.sample(up);

        let mut button = self.lock();
        let start = Instant::now();

        button.reset()?;
        button.press()?;
        thread::sleep(Duration::from_secs_f64(actual_down));
        button.release()?;
        thread::sleep(Duration::from_secs_f64(actual_up));

        let elapsed = start.elapsed();
        self.reporter
            .report(Operation::Reel, down + up, elapsed.as_secs_f64());
        Ok(elapsed)
    }

    fn click(&self, at: Option<Point>) -> Result<(), InputError> {
        let mut button = self.lock();

        if let Some(point) = at {
            button.input.move_to(point)?;
            thread::sleep(CLICK_SETTLE);
        }

        button.reset()?;
        button.press()?;
        thread::sleep(CLICK_HOLD);
        button.release()?;
        thread::sleep(CLICK_SETTLE);
        Ok(())
    }

    fn cast(&self, base: f64) -> Result<f64, InputError> {
        let actual = self.jitter().sample(base);

        self.click(None)?;
        thread::sleep(Duration::from_secs_f64(actual));

        self.reporter.report(Operation::Cast, base, actual);
        Ok(actual)
    }

    fn ensure_released(&self) {
        let mut button = self.lock();
        if button.down {
            if let Err(e) = button.release() {
                log::warn!("Failed to release mouse button: {}", e);
            } else {
                log::debug!("Released stuck mouse button");
            }
        }
    }

    fn set_jitter(&self, jitter: Jitter) {
        self.jitter_percent.store(jitter.percent(), Ordering::Relaxed);
    }
}

#[cfg(feature = "desktop")]
pub use desktop::EnigoInput;

#[cfg(feature = "desktop")]
mod desktop {
    use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};

    use super::{InputError, InputProvider};
    use crate::vision::Point;

    /// Mouse injection through `enigo`
    pub struct EnigoInput {
        enigo: Enigo,
    }

    impl EnigoInput {
        pub fn new() -> Result<Self, InputError> {
            let enigo = Enigo::new(&Settings::default())
                .map_err(|e| InputError::Unavailable(e.to_string()))?;
            Ok(Self { enigo })
        }
    }

    impl InputProvider for EnigoInput {
        fn press(&mut self) -> Result<(), InputError> {
            self.enigo
                .button(Button::Left, Direction::Press)
                .map_err(|e| InputError::Injection(e.to_string()))
        }

        fn release(&mut self) -> Result<(), InputError> {
            self.enigo
                .button(Button::Left, Direction::Release)
                .map_err(|e| InputError::Injection(e.to_string()))
        }

        fn move_to(&mut self, point: Point) -> Result<(), InputError> {
            self.enigo
                .move_mouse(point.x, point.y, Coordinate::Abs)
                .map_err(|e| InputError::Injection(e.to_string()))
        }
    }
}

/// Input errors
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Input injection failed: {0}")]
    Injection(String),
    #[error("Input device unavailable: {0}")]
    Unavailable(String),
}
