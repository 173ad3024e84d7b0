//! Input injection and hotkeys

pub mod actuator;
pub mod hotkey;

pub use actuator::{Actuate, Actuator, InputError, InputProvider};
pub use hotkey::{Hotkey, HotkeyError, MainKey, Modifiers, MouseButton};

#[cfg(feature = "desktop")]
pub use actuator::EnigoInput;
#[cfg(feature = "desktop")]
pub use hotkey::spawn_listener;

/// Events fed to the automation coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Start if stopped, stop if running
    Toggle,
    /// Stop and exit the coordinator
    Shutdown,
}
