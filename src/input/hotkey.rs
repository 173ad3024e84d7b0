//! Toggle hotkey descriptors
//!
//! A descriptor is `"Modifier+...+MainKey"`, e.g. `"Ctrl+F2"` or
//! `"Shift+Mouse4"`. Modifiers are Ctrl, Alt and Shift; the main key is a
//! keyboard key name or one of the extra mouse buttons.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Set of held modifier keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        shift: false,
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

/// Extra mouse buttons usable as a main key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Back button, shown as `Mouse4`
    X1,
    /// Forward button, shown as `Mouse5`
    X2,
}

/// The non-modifier part of a hotkey
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MainKey {
    /// Keyboard key by display name (`"F2"`, `"A"`, `"Space"`)
    Key(String),
    Mouse(MouseButton),
}

impl MainKey {
    /// Normalize a key name: single characters are upper-cased
    pub fn key(name: &str) -> Self {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => MainKey::Key(c.to_uppercase().collect()),
            _ => MainKey::Key(name.to_string()),
        }
    }

    fn same_key(&self, other: &MainKey) -> bool {
        match (self, other) {
            (MainKey::Key(a), MainKey::Key(b)) => a.eq_ignore_ascii_case(b),
            (MainKey::Mouse(a), MainKey::Mouse(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for MainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MainKey::Key(name) => f.write_str(name),
            MainKey::Mouse(MouseButton::X1) => f.write_str("Mouse4"),
            MainKey::Mouse(MouseButton::X2) => f.write_str("Mouse5"),
        }
    }
}

/// A parsed hotkey descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hotkey {
    pub modifiers: Modifiers,
    pub main: MainKey,
}

impl Hotkey {
    pub fn new(modifiers: Modifiers, main: MainKey) -> Self {
        Self { modifiers, main }
    }

    /// Whether `key` pressed with exactly `held` triggers this hotkey
    pub fn matches(&self, held: Modifiers, key: &MainKey) -> bool {
        self.modifiers == held && self.main.same_key(key)
    }
}

impl Default for Hotkey {
    fn default() -> Self {
        Self::new(Modifiers::NONE, MainKey::key("F2"))
    }
}

impl FromStr for Hotkey {
    type Err = HotkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut modifiers = Modifiers::NONE;
        let mut main: Option<MainKey> = None;

        for part in s.split('+').map(str::trim) {
            if part.is_empty() {
                return Err(HotkeyError::Malformed(s.to_string()));
            }
            match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "alt" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                lower => {
                    if main.is_some() {
                        return Err(HotkeyError::MultipleMainKeys(s.to_string()));
                    }
                    main = Some(match lower {
                        "mouse4" => MainKey::Mouse(MouseButton::X1),
                        "mouse5" => MainKey::Mouse(MouseButton::X2),
                        _ => MainKey::key(part),
                    });
                }
            }
        }

        let main = main.ok_or_else(|| HotkeyError::MissingMainKey(s.to_string()))?;
        Ok(Self { modifiers, main })
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.modifiers.alt {
            f.write_str("Alt+")?;
        }
        if self.modifiers.shift {
            f.write_str("Shift+")?;
        }
        write!(f, "{}", self.main)
    }
}

impl TryFrom<String> for Hotkey {
    type Error = HotkeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Hotkey> for String {
    fn from(hotkey: Hotkey) -> Self {
        hotkey.to_string()
    }
}

/// Hotkey parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HotkeyError {
    #[error("Malformed hotkey: {0:?}")]
    Malformed(String),
    #[error("Hotkey has no main key: {0:?}")]
    MissingMainKey(String),
    #[error("Hotkey has more than one main key: {0:?}")]
    MultipleMainKeys(String),
}

#[cfg(feature = "desktop")]
pub use listener::spawn_listener;

#[cfg(feature = "desktop")]
mod listener {
    use std::sync::mpsc::Sender;
    use std::sync::{Arc, Mutex, PoisonError};
    use std::thread::{self, JoinHandle};

    use rdev::{Button, Event, EventType, Key};

    use super::{Hotkey, MainKey, Modifiers, MouseButton};
    use crate::input::InputEvent;

    /// Listen for the global hotkey and forward toggles to `events`
    ///
    /// The listener only sends events; it never touches automation state.
    /// A key held down fires once until it is released.
    pub fn spawn_listener(
        hotkey: Arc<Mutex<Hotkey>>,
        events: Sender<InputEvent>,
    ) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let mut held = Modifiers::NONE;
                let mut latched: Option<MainKey> = None;

                let callback = move |event: Event| match event.event_type {
                    EventType::KeyPress(key) => {
                        if set_modifier(&mut held, key, true) {
                            return;
                        }
                        let pressed = main_key(key);
                        if latched.as_ref() == Some(&pressed) {
                            return;
                        }
                        let fire = hotkey
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .matches(held, &pressed);
                        latched = Some(pressed);
                        if fire && events.send(InputEvent::Toggle).is_err() {
                            log::debug!("Coordinator gone, hotkey ignored");
                        }
                    }
                    EventType::KeyRelease(key) => {
                        if !set_modifier(&mut held, key, false) {
                            latched = None;
                        }
                    }
                    EventType::ButtonPress(button) => {
                        let Some(pressed) = mouse_button(button) else {
                            return;
                        };
                        let fire = hotkey
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .matches(held, &MainKey::Mouse(pressed));
                        if fire && events.send(InputEvent::Toggle).is_err() {
                            log::debug!("Coordinator gone, hotkey ignored");
                        }
                    }
                    _ => {}
                };

                if let Err(e) = rdev::listen(callback) {
                    log::error!("Hotkey listener stopped: {:?}", e);
                }
            })
    }

    fn set_modifier(held: &mut Modifiers, key: Key, down: bool) -> bool {
        match key {
            Key::ControlLeft | Key::ControlRight => held.ctrl = down,
            Key::Alt | Key::AltGr => held.alt = down,
            Key::ShiftLeft | Key::ShiftRight => held.shift = down,
            _ => return false,
        }
        true
    }

    fn main_key(key: Key) -> MainKey {
        let name = format!("{key:?}");
        let name = match name.strip_prefix("Key") {
            Some(letter) if letter.len() == 1 => letter.to_string(),
            _ => match name.strip_prefix("Num") {
                Some(digit) if digit.len() == 1 => digit.to_string(),
                _ => name,
            },
        };
        MainKey::key(&name)
    }

    fn mouse_button(button: Button) -> Option<MouseButton> {
        match button {
            Button::Unknown(1) | Button::Unknown(8) => Some(MouseButton::X1),
            Button::Unknown(2) | Button::Unknown(9) => Some(MouseButton::X2),
            _ => None,
        }
    }
}
