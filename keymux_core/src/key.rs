//! Key codes and key actions.
//!
//! `Key` is a thin newtype over the Linux kernel's `KEY_*`/`BTN_*` event
//! codes (`include/uapi/linux/input-event-codes.h`), so a host embedding
//! this crate on evdev/uinput can convert losslessly with `Key::code`/
//! `Key::from_code` without the engine depending on the `evdev` crate
//! itself. A small set of named constants covers every key this crate's
//! logic needs to reason about by name (modifiers, the letters/digits used
//! in device detection, diagnostic keys); any other code still round-trips
//! as an opaque `Key`.

use core::fmt;

/// A kernel key code (`KEY_*` or the mouse/touchpad `BTN_*` codes this
/// engine passes through on the virtual device).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Key(pub u16);

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match name_of(*self) {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "Key({})", self.0),
        }
    }
}

impl Key {
    /// Returns the raw kernel key code.
    pub const fn code(self) -> u16 {
        self.0
    }

    /// Builds a `Key` from a raw kernel key code.
    pub const fn from_code(code: u16) -> Self {
        Key(code)
    }

    /// Looks up a named key constant by its symbolic name (e.g.
    /// `"LEFTCTRL"`), case-insensitively. Used by the daemon's
    /// configuration loader to translate a human-written key name into a
    /// code; this crate itself never needs the reverse of `Debug`.
    pub fn from_name(name: &str) -> Option<Key> {
        from_name(name)
    }
}

macro_rules! keys {
    ($($name:ident = $code:expr),* $(,)?) => {
        impl Key {
            $(pub const $name: Key = Key($code);)*
        }

        fn name_of(key: Key) -> Option<&'static str> {
            match key.0 {
                $($code => Some(stringify!($name)),)*
                _ => None,
            }
        }

        fn from_name(name: &str) -> Option<Key> {
            let upper = name.to_ascii_uppercase();
            match upper.as_str() {
                $(stringify!($name) => Some(Key($code)),)*
                _ => None,
            }
        }
    };
}

// Codes match linux/input-event-codes.h exactly, so daemon-side evdev
// interop is a straight cast.
keys! {
    ESC = 1,
    KEY_1 = 2, KEY_2 = 3, KEY_3 = 4, KEY_4 = 5, KEY_5 = 6,
    KEY_6 = 7, KEY_7 = 8, KEY_8 = 9, KEY_9 = 10, KEY_0 = 11,
    MINUS = 12, EQUAL = 13, BACKSPACE = 14, TAB = 15,
    Q = 16, W = 17, E = 18, R = 19, T = 20, Y = 21, U = 22, I = 23,
    O = 24, P = 25, LEFTBRACE = 26, RIGHTBRACE = 27, ENTER = 28,
    LEFTCTRL = 29,
    A = 30, S = 31, D = 32, F = 33, G = 34, H = 35, J = 36, K = 37,
    L = 38, SEMICOLON = 39, APOSTROPHE = 40, GRAVE = 41,
    LEFTSHIFT = 42, BACKSLASH = 43,
    Z = 44, X = 45, C = 46, V = 47, B = 48, N = 49, M = 50,
    COMMA = 51, DOT = 52, SLASH = 53,
    RIGHTSHIFT = 54, KPASTERISK = 55, LEFTALT = 56, SPACE = 57,
    CAPSLOCK = 58,
    F1 = 59, F2 = 60, F3 = 61, F4 = 62, F5 = 63, F6 = 64,
    F7 = 65, F8 = 66, F9 = 67, F10 = 68,
    NUMLOCK = 69, SCROLLLOCK = 70,
    F11 = 87, F12 = 88, F13 = 183, F14 = 184, F15 = 185, F16 = 186,
    F17 = 187, F18 = 188, F19 = 189, F20 = 190, F21 = 191, F22 = 192,
    F23 = 193, F24 = 194,
    RIGHTCTRL = 97, RIGHTALT = 100,
    HOME = 102, UP = 103, PAGEUP = 104, LEFT = 105, RIGHT = 106,
    END = 107, DOWN = 108, PAGEDOWN = 109, INSERT = 110, DELETE = 111,
    LEFTMETA = 125, RIGHTMETA = 126,
    COMPOSE = 127,
    FN = 464,

    // Mouse buttons passed through on the virtual device (xwaykeyz's
    // _MOUSE_BUTTONS set), named so device detection and capability
    // declaration can reference them without magic numbers.
    BTN_LEFT = 272, BTN_RIGHT = 273, BTN_MIDDLE = 274,
    BTN_SIDE = 275, BTN_EXTRA = 276,
    BTN_0 = 256, BTN_1 = 257, BTN_2 = 258, BTN_3 = 259, BTN_4 = 260,
    BTN_5 = 261, BTN_6 = 262, BTN_7 = 263, BTN_8 = 264, BTN_9 = 265,

    // Touchpad gesture buttons xwaykeyz's _TOUCHPAD_BUTTONS also forwards,
    // so udev still classifies the virtual device as a keyboard+touchpad.
    BTN_TOOL_FINGER = 325, BTN_TOUCH = 330,
    BTN_TOOL_DOUBLETAP = 333, BTN_TOOL_TRIPLETAP = 334,
    BTN_TOOL_QUADTAP = 335, BTN_TOOL_QUINTTAP = 336,
}

/// Action a key-event carries: press, release, or kernel autorepeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    Press,
    Release,
    Repeat,
}

impl Action {
    /// `PRESS` or `REPEAT`: the key is currently down.
    pub const fn is_pressed(self) -> bool {
        matches!(self, Action::Press | Action::Repeat)
    }

    /// `PRESS` only: the leading edge of a new keystroke.
    pub const fn just_pressed(self) -> bool {
        matches!(self, Action::Press)
    }

    pub const fn is_released(self) -> bool {
        matches!(self, Action::Release)
    }

    pub const fn is_repeat(self) -> bool {
        matches!(self, Action::Repeat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_raw_code() {
        assert_eq!(Key::from_code(Key::A.code()), Key::A);
    }

    #[test]
    fn from_name_is_case_insensitive_and_rejects_unknown() {
        assert_eq!(Key::from_name("leftctrl"), Some(Key::LEFTCTRL));
        assert_eq!(Key::from_name("LEFTCTRL"), Some(Key::LEFTCTRL));
        assert_eq!(Key::from_name("not_a_key"), None);
    }

    #[test]
    fn action_predicates() {
        assert!(Action::Press.is_pressed());
        assert!(Action::Repeat.is_pressed());
        assert!(!Action::Release.is_pressed());
        assert!(Action::Press.just_pressed());
        assert!(!Action::Repeat.just_pressed());
        assert!(Action::Release.is_released());
        assert!(Action::Repeat.is_repeat());
    }

    #[test]
    fn debug_uses_symbolic_name_when_known() {
        assert_eq!(format!("{:?}", Key::A), "A");
        assert_eq!(format!("{:?}", Key::from_code(9999)), "Key(9999)");
    }
}
