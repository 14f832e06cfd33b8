//! The event loop (spec.md §4.1 "hotplug"/"shutdown", §5's concurrency
//! model): one `nix::poll` reactor multiplexing grabbed-device fds, an
//! inotify watcher on `/dev/input`, and the diagnostics IPC socket, driving
//! `keymux_core::Engine::on_event` in arrival order. Grounded on a sibling
//! remapper's `signal_hook`-driven `main.rs` loop, but single-threaded per
//! spec.md §5 rather than that remapper's per-device-thread model — every fd
//! this daemon cares about is reachable from one `poll()` call.

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag::register_conditional_default;

use keymux_core::clock::SystemClock;
use keymux_core::config::Configuration;
use keymux_core::engine::Engine;
use keymux_core::WindowContextProvider;

use crate::devices::{self, DeviceRegistry};
use crate::error::{DaemonError, DaemonResult, PlatformError};
use crate::ipc::{DiagnosticsDto, IpcRequest, IpcResponse, IpcServer};
use crate::output::UinputSink;
use crate::window_context;

const HOTPLUG_DEBOUNCE: Duration = Duration::from_millis(500);
const POLL_TIMEOUT_MS: u8 = 100;
const INPUT_DIR: &str = "/dev/input";

/// Owns every live resource the daemon needs for its lifetime and runs the
/// single poll loop spec.md §5 describes.
pub struct Daemon {
    engine: Engine<SystemClock>,
    devices: DeviceRegistry,
    sink: UinputSink,
    window: Box<dyn WindowContextProvider>,
    ipc: Option<IpcServer>,
    inotify: Inotify,
    hotplug_pending_since: Option<Instant>,
    running: Arc<AtomicBool>,
    config: Arc<Configuration>,
}

impl Daemon {
    pub fn start(config: Configuration, socket_path: Option<PathBuf>) -> DaemonResult<Self> {
        config.validate().map_err(|e| {
            DaemonError::Config(crate::error::ConfigError::Invalid(e))
        })?;
        let config = Arc::new(config);

        let mut window = window_context::select(&config.environ)?;
        let mut sink = UinputSink::create("daemon")?;

        let mut registry = DeviceRegistry::new();
        grab_matching_devices(&mut registry, &config.devices);

        let inotify = Inotify::init(InitFlags::IN_NONBLOCK).map_err(PlatformError::Poll)?;
        inotify
            .add_watch(
                Path::new(INPUT_DIR),
                AddWatchFlags::IN_CREATE | AddWatchFlags::IN_DELETE | AddWatchFlags::IN_ATTRIB,
            )
            .map_err(PlatformError::Poll)?;

        let socket_path = socket_path.unwrap_or_else(crate::ipc::default_socket_path);
        let ipc = Some(IpcServer::bind(&socket_path)?);

        let running = Arc::new(AtomicBool::new(true));
        register_conditional_default(SIGTERM, Arc::clone(&running)).map_err(DaemonError::Signal)?;
        register_conditional_default(SIGINT, Arc::clone(&running)).map_err(DaemonError::Signal)?;

        let mut engine = Engine::new(Arc::clone(&config), SystemClock::new());
        bootstrap_clean_modifier_state(&mut engine, &config, &mut window, &mut sink);

        Ok(Self {
            engine,
            devices: registry,
            sink,
            window,
            ipc,
            inotify,
            hotplug_pending_since: None,
            running,
            config,
        })
    }

    /// Exposed for tests and for a future "stop after N ticks" harness;
    /// production code only ever flips this via the installed signal
    /// handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Runs until a SIGINT/SIGTERM flips the running flag, then performs
    /// the shutdown sequence of spec.md §4.8/§4.1.
    pub fn run(mut self) -> DaemonResult<()> {
        while self.running.load(Ordering::SeqCst) {
            self.tick()?;
        }
        self.shutdown();
        Ok(())
    }

    fn tick(&mut self) -> DaemonResult<()> {
        let device_fds = self.devices.fds();
        let inotify_fd = self.inotify.as_fd();
        let ipc_fd = self.ipc.as_ref().map(IpcServer::as_raw_fd);

        let mut targets: Vec<PollFd> = Vec::with_capacity(device_fds.len() + 2);
        for fd in &device_fds {
            targets.push(PollFd::new(borrow(*fd), PollFlags::POLLIN));
        }
        let inotify_index = targets.len();
        targets.push(PollFd::new(inotify_fd, PollFlags::POLLIN));
        let ipc_index = ipc_fd.map(|fd| {
            let idx = targets.len();
            targets.push(PollFd::new(borrow(fd), PollFlags::POLLIN));
            idx
        });

        poll(&mut targets, PollTimeout::from(POLL_TIMEOUT_MS)).map_err(PlatformError::Poll)?;

        let readable_devices: Vec<RawFd> = device_fds
            .iter()
            .enumerate()
            .filter(|(i, _)| is_readable(&targets[*i]))
            .map(|(_, fd)| *fd)
            .collect();
        let inotify_ready = is_readable(&targets[inotify_index]);
        let ipc_ready = ipc_index.is_some_and(|i| is_readable(&targets[i]));
        drop(targets);

        for fd in readable_devices {
            match self.devices.read_events(fd) {
                Ok(events) => {
                    for event in events {
                        self.engine.on_event(event, &mut self.window, &mut self.sink);
                    }
                }
                Err(e) => log::warn!("error reading input device events: {e}"),
            }
        }

        if inotify_ready {
            self.note_hotplug_activity();
        }

        if ipc_ready {
            self.answer_ipc();
        }

        self.engine.poll_timers(&mut self.sink);

        if let Some(since) = self.hotplug_pending_since {
            if since.elapsed() >= HOTPLUG_DEBOUNCE {
                self.reconcile_hotplug();
                self.hotplug_pending_since = None;
            }
        }

        Ok(())
    }

    /// Drains the inotify queue (so the fd is no longer marked readable)
    /// and arms the debounce window; the actual reconciliation happens
    /// once `HOTPLUG_DEBOUNCE` has passed with no further activity.
    fn note_hotplug_activity(&mut self) {
        match self.inotify.read_events() {
            Ok(events) => {
                if !events.is_empty() {
                    self.hotplug_pending_since = Some(Instant::now());
                }
            }
            Err(e) if e == nix::Error::EAGAIN => {}
            Err(e) => log::warn!("inotify read failed: {e}"),
        }
    }

    /// Re-scans `/dev/input` after the debounce window: grabs anything new
    /// that matches the device filter, ungrabs anything that vanished.
    /// Matching a specific `DELETE` name against the raw inotify mask would
    /// work too, but a plain existence check captures the same rule spec.md
    /// §4.1 describes with less bookkeeping.
    fn reconcile_hotplug(&mut self) {
        grab_matching_devices(&mut self.devices, &self.config.devices);

        let gone: Vec<PathBuf> = self
            .devices
            .paths()
            .filter(|p| !p.exists())
            .map(Path::to_path_buf)
            .collect();
        for path in gone {
            self.devices.ungrab(&path);
        }
    }

    fn answer_ipc(&self) {
        let Some(ipc) = &self.ipc else { return };
        let dto = DiagnosticsDto::from(&self.engine.diagnostics());
        ipc.handle_pending(move |req| match req {
            IpcRequest::Dump => IpcResponse::Dump(dto.clone()),
        });
    }

    /// spec.md §4.8/§4.1: release every still-asserted output key, ungrab
    /// every device, close the virtual device. `UinputSink::drop` performs
    /// the last step once `self` goes out of scope.
    fn shutdown(&mut self) {
        log::info!("shutting down");
        self.engine.shutdown(&mut self.sink);
        self.devices.ungrab_all();
    }
}

fn borrow(fd: RawFd) -> BorrowedFd<'static> {
    // Safety: every fd handed in here is owned by a value (`Device`,
    // `UnixListener`) that outlives this single `tick()` call; the
    // `PollFd` built from it is dropped before that owner could be mutated
    // or dropped.
    unsafe { BorrowedFd::borrow_raw(fd) }
}

fn is_readable(fd: &PollFd) -> bool {
    fd.revents().is_some_and(|r| r.contains(PollFlags::POLLIN))
}

/// The "typical typing keys" spec.md §4.3 step 1 bootstraps alongside every
/// configured modifier: the letter row, digit row, and the handful of
/// whitespace/editing keys a stuck kernel-level modifier most often leaks
/// onto.
const BOOTSTRAP_TYPING_KEYS: &[keymux_core::Key] = &[
    keymux_core::Key::Q,
    keymux_core::Key::W,
    keymux_core::Key::E,
    keymux_core::Key::R,
    keymux_core::Key::T,
    keymux_core::Key::Y,
    keymux_core::Key::U,
    keymux_core::Key::I,
    keymux_core::Key::O,
    keymux_core::Key::P,
    keymux_core::Key::A,
    keymux_core::Key::S,
    keymux_core::Key::D,
    keymux_core::Key::F,
    keymux_core::Key::G,
    keymux_core::Key::H,
    keymux_core::Key::J,
    keymux_core::Key::K,
    keymux_core::Key::L,
    keymux_core::Key::Z,
    keymux_core::Key::X,
    keymux_core::Key::C,
    keymux_core::Key::V,
    keymux_core::Key::B,
    keymux_core::Key::N,
    keymux_core::Key::M,
    keymux_core::Key::KEY_1,
    keymux_core::Key::KEY_2,
    keymux_core::Key::KEY_3,
    keymux_core::Key::KEY_4,
    keymux_core::Key::KEY_5,
    keymux_core::Key::KEY_6,
    keymux_core::Key::KEY_7,
    keymux_core::Key::KEY_8,
    keymux_core::Key::KEY_9,
    keymux_core::Key::KEY_0,
    keymux_core::Key::SPACE,
    keymux_core::Key::ENTER,
    keymux_core::Key::TAB,
    keymux_core::Key::BACKSPACE,
    keymux_core::Key::ESC,
];

/// spec.md §4.3 step 1: before the poll loop ever sees a real device event,
/// inject one RELEASE for every modifier key and every typical typing key
/// through a dummy (`device_present: false`) event, so a downstream app
/// never inherits a modifier the kernel thinks is still down from before
/// this daemon started. Grounded on a Python predecessor's own dummy-device
/// bootstrap pass over its input layer.
fn bootstrap_clean_modifier_state<S: keymux_core::KeySink, W: keymux_core::WindowContextProvider>(
    engine: &mut Engine<SystemClock>,
    config: &Configuration,
    window: &mut W,
    sink: &mut S,
) {
    let modifier_keys = config.modifiers.iter().flat_map(|m| m.keys.keys());
    for key in modifier_keys.chain(BOOTSTRAP_TYPING_KEYS.iter().copied()) {
        let event = keymux_core::InputEvent::bootstrap(key, keymux_core::Action::Release);
        engine.on_event(event, window, sink);
    }
}

/// Runs the initial device scan (spec.md §4.1) and is reused verbatim by
/// hotplug reconciliation: enumerate `/dev/input`, apply `devices.{only,
/// ignore, add}`, grab whatever matches and is not grabbed already.
fn grab_matching_devices(registry: &mut DeviceRegistry, filter: &keymux_core::config::DeviceFilter) {
    let summaries = match devices::enumerate(Path::new(INPUT_DIR)) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("failed to enumerate {INPUT_DIR}: {e}");
            return;
        }
    };

    for summary in summaries {
        if !summary.is_keyboard_like {
            if devices::in_add_list(filter, &summary.path, &summary.name) {
                if let Err(e) = registry.grab_forced(&summary.path) {
                    log::warn!("failed to grab added device {}: {e}", summary.path.display());
                }
            }
            continue;
        }
        if devices::matches_filter(filter, &summary.path, &summary.name) {
            if let Err(e) = registry.grab(&summary.path) {
                log::warn!("failed to grab {}: {e}", summary.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borrowed_fd_round_trips_a_raw_fd() {
        let fd = std::io::stdin().as_raw_fd();
        let borrowed = borrow(fd);
        assert_eq!(borrowed.as_raw_fd(), fd);
    }
}
