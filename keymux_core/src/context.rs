//! Per-event context: the originating device and the (lazily captured)
//! focused-window triple.

use std::sync::Arc;

/// The `(wm_class, wm_name, error?)` triple spec.md §6 describes as the
/// engine's single external capability. `error` means the provider could
/// not determine the focused window right now; the pipeline treats that as
/// "context error" and skips predicate evaluation entirely for this event
/// (spec.md §4.3 step 6, §7).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowContext {
    pub wm_class: String,
    pub wm_name: String,
    pub error: bool,
}

impl WindowContext {
    pub fn error() -> Self {
        Self {
            wm_class: String::new(),
            wm_name: String::new(),
            error: true,
        }
    }
}

/// Capability the engine needs from its host: "given the current moment,
/// return the focused window's context." Implementations (X11, Sway,
/// Hyprland, GNOME, KDE, ...) live outside `keymux_core` entirely; they must
/// never panic or propagate an error into the engine, only report it via
/// `WindowContext::error`.
pub trait WindowContextProvider {
    fn get_window_context(&mut self) -> WindowContext;
}

impl<T: WindowContextProvider + ?Sized> WindowContextProvider for Box<T> {
    fn get_window_context(&mut self) -> WindowContext {
        (**self).get_window_context()
    }
}

/// A provider that always reports a context error; useful for pipelines
/// that run with no window-context source configured, and in tests.
#[derive(Default)]
pub struct NullWindowContextProvider;

impl WindowContextProvider for NullWindowContextProvider {
    fn get_window_context(&mut self) -> WindowContext {
        WindowContext::error()
    }
}

/// LED state a device reports (num-lock, caps-lock, scroll-lock); informational.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedState {
    pub num_lock: bool,
    pub caps_lock: bool,
    pub scroll_lock: bool,
}

/// Identity of the originating input device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: Arc<str>,
    pub leds: LedState,
}

impl DeviceInfo {
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            leds: LedState::default(),
        }
    }
}

/// Full per-event context: captured once per logical keystroke (on PRESS)
/// and replayed for its REPEATs and RELEASE, per spec.md §3/§4.3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyContext {
    pub device: Option<DeviceInfo>,
    pub window: WindowContext,
}

impl KeyContext {
    pub fn new(device: Option<DeviceInfo>, window: WindowContext) -> Self {
        Self { device, window }
    }

    pub fn is_error(&self) -> bool {
        self.window.error
    }
}
