//! `keymux_core`: the platform-agnostic context-sensitive keyboard
//! remapping engine.
//!
//! This crate holds the input transformation engine only — the
//! event-driven state machine that consumes raw key events and produces
//! a rewritten event stream, plus its two tightly coupled collaborators
//! (the output synthesizer and the keystate/suspension machinery). It has
//! no dependency on evdev, uinput, X11, or D-Bus: a host drives it through
//! [`engine::KeySink`] and [`context::WindowContextProvider`], two small
//! traits that make the engine unit-testable with fakes. `keymux_daemon`
//! is the binary that wires those traits to real Linux devices.

pub mod clock;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod key;

pub use config::Configuration;
pub use context::{KeyContext, WindowContext, WindowContextProvider};
pub use engine::{Engine, InputEvent, KeySink};
pub use error::{CoreError, CoreResult};
pub use key::{Action, Key};
