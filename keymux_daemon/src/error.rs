//! `keymux_daemon`'s error hierarchy: one `#[non_exhaustive]` enum per
//! concern, aggregated into [`DaemonError`] via `#[from]`, matching how
//! `keymux_core::error` separates "fatal before the loop starts" from
//! "recoverable, logged and swallowed." Everything here is fatal enough
//! to abort a subcommand; recoverable failures (a grab retry, a window
//! context provider hiccup) are logged at their call site and never
//! reach this type.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid regular expression {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("config validation failed: {0}")]
    Invalid(#[from] keymux_core::CoreError),

    #[error("unknown modifier name {0:?} referenced in a binding")]
    UnknownModifier(String),

    #[error("unknown keymap name {0:?} referenced in a binding")]
    UnknownKeymap(String),

    #[error("unknown key name {0:?}")]
    UnknownKey(String),

    #[error("unknown hint name {0:?}")]
    UnknownHint(String),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlatformError {
    #[error("failed to enumerate /dev/input: {0}")]
    Enumerate(#[source] std::io::Error),

    #[error("no input device matched the configured device filter")]
    NoMatchingDevice,

    #[error("failed to grab device {name:?} after {attempts} attempts: {source}")]
    GrabFailed {
        name: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create virtual output device: {0}")]
    OutputCreate(#[source] std::io::Error),

    #[error("poll() on device file descriptors failed: {0}")]
    Poll(#[source] nix::Error),

    #[error("no window-context provider is available for session_type={session_type:?} compositor={compositor:?}")]
    UnsupportedEnviron {
        session_type: String,
        compositor: String,
    },
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IpcError {
    #[error("failed to bind control socket at {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to connect to running daemon at {path}: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed IPC message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("IPC stream closed before a response arrived")]
    ClosedEarly,

    #[error("IPC transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("daemon reported an error: {0}")]
    Remote(String),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Ipc(#[from] IpcError),

    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type DaemonResult<T> = Result<T, DaemonError>;

/// Process exit codes spec.md §6 asks for: zero on a clean run, non-zero
/// (and distinguishable by class) on a fatal startup failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    ConfigError = 1,
    PermissionError = 2,
    RuntimeError = 3,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Classifies a fatal [`DaemonError`] into the exit code a subcommand
    /// should terminate with.
    pub fn for_error(err: &DaemonError) -> Self {
        match err {
            DaemonError::Config(_) => ExitCode::ConfigError,
            DaemonError::Platform(PlatformError::GrabFailed { source, .. }) |
            DaemonError::Platform(PlatformError::OutputCreate(source))
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                ExitCode::PermissionError
            }
            DaemonError::Platform(_) | DaemonError::Ipc(_) | DaemonError::Signal(_) | DaemonError::Other(_) => {
                ExitCode::RuntimeError
            }
        }
    }
}
