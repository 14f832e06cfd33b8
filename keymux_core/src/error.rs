//! Error types for `keymux_core`.
//!
//! Only *fatal* conditions live here: validating a [`Configuration`]
//! snapshot before it is handed to an [`Engine`](crate::engine::Engine).
//! Everything recoverable (a window-context provider failure, an unknown
//! executor command, a refused sticky bind) is logged at the point it
//! happens and never surfaces as a `Result::Err` to the caller — per
//! spec.md §7, recoverable errors never escape the event callback.

use thiserror::Error;

/// Fatal configuration errors, detected before the engine starts
/// processing events.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("more than one unconditional modmap is defined (only the first may be unconditional)")]
    MultipleUnconditionalModmaps,

    #[error(
        "more than one unconditional multi-modmap is defined (only the first may be unconditional)"
    )]
    MultipleUnconditionalMultiModmaps,

    #[error("unknown environment tuple: session_type={session_type:?}, compositor={compositor:?}")]
    UnknownEnvironment {
        session_type: String,
        compositor: String,
    },

    #[error("invalid identifier for user-defined modifier: {0:?}")]
    InvalidModifierName(String),

    #[error("modifier {name:?} claims key {key:?} already claimed by modifier {existing:?}")]
    DuplicateModifierKey {
        name: String,
        existing: String,
        key: u16,
    },
}

pub type CoreResult<T> = Result<T, CoreError>;
