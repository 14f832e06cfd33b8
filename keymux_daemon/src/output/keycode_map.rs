//! Translates `keymux_core::Key` (a raw kernel key code) to the `uinput`
//! crate's typed `Keyboard` enum, the way `keycode_map.rs` in a sibling
//! remapper's platform layer does it, but driven off a raw-code match
//! rather than a closed internal `KeyCode` enum: any kernel code that
//! is not among our ~95 named constants has no typed `uinput` variant to
//! hand back, so it returns `None` and the caller drops the write at
//! debug level, symmetric with how unknown input codes are skipped on
//! the capture side.

use uinput::event::keyboard::{Key as UKey, Keyboard};

use keymux_core::Key;

pub fn keycode_to_uinput_key(key: Key) -> Option<Keyboard> {
    let k = match key {
        Key::ESC => UKey::Esc,
        Key::KEY_1 => UKey::_1,
        Key::KEY_2 => UKey::_2,
        Key::KEY_3 => UKey::_3,
        Key::KEY_4 => UKey::_4,
        Key::KEY_5 => UKey::_5,
        Key::KEY_6 => UKey::_6,
        Key::KEY_7 => UKey::_7,
        Key::KEY_8 => UKey::_8,
        Key::KEY_9 => UKey::_9,
        Key::KEY_0 => UKey::_0,
        Key::MINUS => UKey::Minus,
        Key::EQUAL => UKey::Equal,
        Key::BACKSPACE => UKey::BackSpace,
        Key::TAB => UKey::Tab,
        Key::Q => UKey::Q,
        Key::W => UKey::W,
        Key::E => UKey::E,
        Key::R => UKey::R,
        Key::T => UKey::T,
        Key::Y => UKey::Y,
        Key::U => UKey::U,
        Key::I => UKey::I,
        Key::O => UKey::O,
        Key::P => UKey::P,
        Key::LEFTBRACE => UKey::LeftBrace,
        Key::RIGHTBRACE => UKey::RightBrace,
        Key::ENTER => UKey::Enter,
        Key::LEFTCTRL => UKey::LeftControl,
        Key::A => UKey::A,
        Key::S => UKey::S,
        Key::D => UKey::D,
        Key::F => UKey::F,
        Key::G => UKey::G,
        Key::H => UKey::H,
        Key::J => UKey::J,
        Key::K => UKey::K,
        Key::L => UKey::L,
        Key::SEMICOLON => UKey::SemiColon,
        Key::APOSTROPHE => UKey::Apostrophe,
        Key::GRAVE => UKey::Grave,
        Key::LEFTSHIFT => UKey::LeftShift,
        Key::BACKSLASH => UKey::BackSlash,
        Key::Z => UKey::Z,
        Key::X => UKey::X,
        Key::C => UKey::C,
        Key::V => UKey::V,
        Key::B => UKey::B,
        Key::N => UKey::N,
        Key::M => UKey::M,
        Key::COMMA => UKey::Comma,
        Key::DOT => UKey::Dot,
        Key::SLASH => UKey::Slash,
        Key::RIGHTSHIFT => UKey::RightShift,
        Key::KPASTERISK => UKey::KPAsterisk,
        Key::LEFTALT => UKey::LeftAlt,
        Key::SPACE => UKey::Space,
        Key::CAPSLOCK => UKey::CapsLock,
        Key::F1 => UKey::F1,
        Key::F2 => UKey::F2,
        Key::F3 => UKey::F3,
        Key::F4 => UKey::F4,
        Key::F5 => UKey::F5,
        Key::F6 => UKey::F6,
        Key::F7 => UKey::F7,
        Key::F8 => UKey::F8,
        Key::F9 => UKey::F9,
        Key::F10 => UKey::F10,
        Key::NUMLOCK => UKey::NumLock,
        Key::SCROLLLOCK => UKey::ScrollLock,
        Key::F11 => UKey::F11,
        Key::F12 => UKey::F12,
        Key::F13 => UKey::F13,
        Key::F14 => UKey::F14,
        Key::F15 => UKey::F15,
        Key::F16 => UKey::F16,
        Key::F17 => UKey::F17,
        Key::F18 => UKey::F18,
        Key::F19 => UKey::F19,
        Key::F20 => UKey::F20,
        Key::F21 => UKey::F21,
        Key::F22 => UKey::F22,
        Key::F23 => UKey::F23,
        Key::F24 => UKey::F24,
        Key::RIGHTCTRL => UKey::RightControl,
        Key::RIGHTALT => UKey::RightAlt,
        Key::HOME => UKey::Home,
        Key::UP => UKey::Up,
        Key::PAGEUP => UKey::PageUp,
        Key::LEFT => UKey::Left,
        Key::RIGHT => UKey::Right,
        Key::END => UKey::End,
        Key::DOWN => UKey::Down,
        Key::PAGEDOWN => UKey::PageDown,
        Key::INSERT => UKey::Insert,
        Key::DELETE => UKey::Delete,
        Key::LEFTMETA => UKey::LeftMeta,
        Key::RIGHTMETA => UKey::RightMeta,
        Key::COMPOSE => UKey::Compose,
        _ => return None,
    };
    Some(Keyboard::Key(k))
}

/// The kernel code for `key` is always a valid `uinput` event code even
/// when it has no typed `Keyboard` variant above (e.g. the `BTN_*` mouse
/// and touchpad codes we pass through verbatim); those go out through
/// `uinput`'s raw `write` rather than the typed keyboard API.
pub fn is_declared_as_keyboard_event(key: Key) -> bool {
    keycode_to_uinput_key(key).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_letter_and_digit() {
        assert!(keycode_to_uinput_key(Key::A).is_some());
        assert!(keycode_to_uinput_key(Key::KEY_0).is_some());
    }

    #[test]
    fn unknown_code_maps_to_none() {
        assert!(keycode_to_uinput_key(Key::from_code(9999)).is_none());
    }

    #[test]
    fn mouse_buttons_have_no_typed_keyboard_variant() {
        assert!(keycode_to_uinput_key(Key::BTN_LEFT).is_none());
    }
}
