//! `keymux_daemon`: the Linux binary that wires `keymux_core`'s engine to
//! real evdev input devices, a uinput virtual output, and one of several
//! window-context providers (X11, Sway, Hyprland, GNOME, KDE).
//!
//! `keymux_core` has no knowledge of any of this; this crate exists purely
//! to satisfy its two traits (`KeySink`, `WindowContextProvider`) with
//! real implementations and to drive `Engine::on_event` from a poll loop.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod devices;
pub mod error;
pub mod ipc;
pub mod output;
pub mod window_context;

pub use error::{DaemonError, DaemonResult, ExitCode};
