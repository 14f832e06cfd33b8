//! Declarative configuration types the engine is built from.
//!
//! Everything here is inert data (or, for [`Condition::Func`] and
//! [`UserFunction`], opaque callables) produced by a configuration
//! loader/DSL that lives outside this crate, per spec.md §1.

pub mod combo;
pub mod command;
pub mod modifier;
pub mod modmap;
pub mod predicate;
pub mod snapshot;

pub use combo::Combo;
pub use command::{Command, Hint, Keymap, UserFunction};
pub use modifier::{Modifier, ModifierId, ModifierKeys, ModifierTable};
pub use modmap::{Modmap, MultiModmap, TapHold};
pub use predicate::{Condition, Literal, MatchPattern, Pattern};
pub use snapshot::{
    CompatFlags, Configuration, DeviceFilter, Environ, RepeatPolicy, Throttles, Timeouts,
};
