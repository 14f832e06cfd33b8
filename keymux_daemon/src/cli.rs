//! Command-line surface (SPEC_FULL.md §4.13), grounded in the same
//! `clap::Parser`/`Subcommand` shape a sibling remapper's `main.rs` uses,
//! trimmed to the four subcommands this daemon actually needs: `run`,
//! `list-devices`, `validate`, and `dump`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "keymuxd")]
#[command(version, about = "Context-sensitive keyboard remapping daemon for Linux")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug-level logging regardless of `RUST_LOG`.
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the daemon: grab matching devices, watch for hotplug, and
    /// apply the configuration's remapping rules until a signal arrives.
    Run {
        /// Path to the YAML configuration file.
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Unix-socket path the `dump` subcommand connects to.
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },

    /// List every `/dev/input/event*` device and whether it looks like a
    /// keyboard, without grabbing anything.
    ListDevices,

    /// Load and validate a configuration file without grabbing devices or
    /// creating the virtual output device.
    Validate {
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },

    /// Ask a running daemon for its current diagnostics snapshot over the
    /// control socket.
    Dump {
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,
    },
}
