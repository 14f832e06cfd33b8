//! `keymuxd`: binary entry point. Parses the CLI surface (SPEC_FULL.md
//! §4.13), dispatches to the matching subcommand, and turns a fatal
//! `DaemonError` into the exit code a shell script can branch on, grounded
//! on a sibling remapper's `main()`/`exit_codes` module shape but trimmed to
//! the four subcommands this daemon has.

use std::path::Path;
use std::process::ExitCode as ProcessExitCode;

use clap::Parser;
use colored::Colorize;
use log::LevelFilter;

use keymux_daemon::cli::{Cli, Commands};
use keymux_daemon::error::{DaemonError, DaemonResult, ExitCode};
use keymux_daemon::{config, daemon, devices, ipc};

const DEFAULT_INPUT_DIR: &str = "/dev/input";

fn main() -> ProcessExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match run(cli.command) {
        Ok(()) => ProcessExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("{} {e}", "error:".red().bold());
            ProcessExitCode::from(ExitCode::for_error(&e) as u8)
        }
    }
}

fn run(command: Commands) -> DaemonResult<()> {
    match command {
        Commands::Run { config, socket } => cmd_run(&config, socket),
        Commands::ListDevices => cmd_list_devices(),
        Commands::Validate { config } => cmd_validate(&config),
        Commands::Dump { socket } => cmd_dump(socket),
    }
}

fn cmd_run(config_path: &Path, socket: Option<std::path::PathBuf>) -> DaemonResult<()> {
    let cfg = config::load(config_path)?;
    log::info!("loaded configuration from {}", config_path.display());
    let daemon = daemon::Daemon::start(cfg, socket)?;
    daemon.run()
}

fn cmd_list_devices() -> DaemonResult<()> {
    let summaries = devices::enumerate(Path::new(DEFAULT_INPUT_DIR))
        .map_err(DaemonError::Platform)?;

    if summaries.is_empty() {
        println!("No input devices found under {DEFAULT_INPUT_DIR}.");
        return Ok(());
    }

    println!("{:<24} {:<30} {:<10} SERIAL", "PATH", "NAME", "KEYBOARD?");
    println!("{}", "-".repeat(80));
    for summary in &summaries {
        let keyboard = if summary.is_keyboard_like {
            "yes".green().to_string()
        } else {
            "no".yellow().to_string()
        };
        println!(
            "{:<24} {:<30} {:<10} {}",
            summary.path.display(),
            summary.name,
            keyboard,
            summary.serial.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

fn cmd_validate(config_path: &Path) -> DaemonResult<()> {
    let cfg = config::load(config_path)?;
    cfg.validate()
        .map_err(|e| DaemonError::Config(keymux_daemon::error::ConfigError::Invalid(e)))?;
    println!("{} {}", config_path.display(), "is valid.".green().bold());
    println!(
        "  modmaps: {}  multi-modmaps: {}  keymaps: {}",
        cfg.modmaps.len(),
        cfg.multi_modmaps.len(),
        cfg.keymaps.len(),
    );
    println!(
        "  environ: session_type={:?} compositor={:?}",
        cfg.environ.session_type, cfg.environ.compositor,
    );
    Ok(())
}

fn cmd_dump(socket: Option<std::path::PathBuf>) -> DaemonResult<()> {
    let path = socket.unwrap_or_else(ipc::default_socket_path);
    let dto = ipc::request_dump(&path)?;
    println!("{dto:#?}");
    Ok(())
}

fn init_logging(debug: bool) {
    let level = if debug { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .init();
}
