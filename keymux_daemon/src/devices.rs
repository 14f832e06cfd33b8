//! The device registry (spec.md §4.1): discovers keyboard-like evdev
//! devices, grabs them exclusively, watches `/dev/input` for hotplug, and
//! turns raw evdev reads into `keymux_core::InputEvent`s. Grounded on a
//! sibling remapper's `EvdevInput`/`DeviceManager` pair, but event
//! semantics differ in one important way: that remapper drops kernel
//! autorepeat (`value == 2`) at this layer, while spec.md's repeat cache
//! (§4.9) and repeat-passthrough policy (§4.3 step 3) both need REPEAT to
//! reach the engine, so this registry forwards it as `Action::Repeat`.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::time::Duration;

use evdev::{Device, InputEventKind, Key as EvdevKey};

use keymux_core::{Action, InputEvent, Key};

use crate::error::PlatformError;
use crate::output::VIRT_DEVICE_PREFIX;

const INITIAL_BACKOFF: Duration = Duration::from_millis(200);
const MAX_GRAB_ATTEMPTS: u32 = 9;

/// The Q/W/E/R/T/Y + A/Z/SPACE keyboard-likeness test spec.md §4.1 spells
/// out literally: a device that exposes key events and supports this
/// specific set of codes is treated as a keyboard, full stop. No letter
/// count threshold, no "20 of 26" heuristic.
const LIKENESS_PROBE: &[EvdevKey] = &[
    EvdevKey::KEY_Q,
    EvdevKey::KEY_W,
    EvdevKey::KEY_E,
    EvdevKey::KEY_R,
    EvdevKey::KEY_T,
    EvdevKey::KEY_Y,
    EvdevKey::KEY_A,
    EvdevKey::KEY_Z,
    EvdevKey::KEY_SPACE,
];

pub fn is_keyboard_like(device: &Device) -> bool {
    let Some(keys) = device.supported_keys() else {
        return false;
    };
    LIKENESS_PROBE.iter().all(|k| keys.contains(*k))
}

fn is_own_virtual_device(device: &Device) -> bool {
    device
        .name()
        .is_some_and(|name| name.starts_with(VIRT_DEVICE_PREFIX))
}

/// Device selection rule from `keymux_core::config::DeviceFilter`, applied
/// against a path and the device's reported name.
pub fn matches_filter(filter: &keymux_core::config::DeviceFilter, path: &Path, name: &str) -> bool {
    let path_str = path.to_string_lossy();
    if !filter.only.is_empty() {
        return filter.only.iter().any(|s| s == path_str.as_ref() || s == name);
    }
    if filter.ignore.iter().any(|s| s == path_str.as_ref() || s == name) {
        return false;
    }
    true
}

/// Whether `devices.add` names `path`/`name` explicitly: a forced-include
/// device that `matches_filter` would otherwise reject on likeness grounds.
pub fn in_add_list(filter: &keymux_core::config::DeviceFilter, path: &Path, name: &str) -> bool {
    let path_str = path.to_string_lossy();
    filter.add.iter().any(|s| s == path_str.as_ref() || s == name)
}

/// One keyboard-like device, as reported to `list-devices`/`validate`.
pub struct DeviceSummary {
    pub path: PathBuf,
    pub name: String,
    pub serial: Option<String>,
    pub is_keyboard_like: bool,
}

/// Enumerates every node under `/dev/input`, openable or not, for
/// diagnostic subcommands. Devices this process cannot open are still
/// listed, with `is_keyboard_like` left `false`.
pub fn enumerate(input_dir: &Path) -> Result<Vec<DeviceSummary>, PlatformError> {
    let mut summaries = Vec::new();
    let entries = std::fs::read_dir(input_dir).map_err(PlatformError::Enumerate)?;
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !path
            .file_name()
            .and_then(OsStr::to_str)
            .is_some_and(|n| n.starts_with("event"))
        {
            continue;
        }
        match Device::open(&path) {
            Ok(device) => {
                if is_own_virtual_device(&device) {
                    continue;
                }
                summaries.push(DeviceSummary {
                    path,
                    name: device.name().unwrap_or("unknown").to_string(),
                    serial: device.unique_name().map(|s| s.to_string()),
                    is_keyboard_like: is_keyboard_like(&device),
                });
            }
            Err(_) => summaries.push(DeviceSummary {
                path,
                name: "<unreadable>".to_string(),
                serial: None,
                is_keyboard_like: false,
            }),
        }
    }
    summaries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(summaries)
}

/// A single grabbed device: the open handle plus the identity used to
/// address it from the poll loop and the hotplug watcher.
struct Grabbed {
    device: Device,
    path: PathBuf,
    name: String,
}

/// Owns every currently-grabbed device. Lives for the daemon's lifetime;
/// the event loop polls each device's raw fd directly.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: HashMap<PathBuf, Grabbed>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.devices.keys().map(PathBuf::as_path)
    }

    pub fn fds(&self) -> Vec<RawFd> {
        self.devices.values().map(|g| g.device.as_raw_fd()).collect()
    }

    fn fd_for_path(&self, path: &Path) -> Option<RawFd> {
        self.devices.get(path).map(|g| g.device.as_raw_fd())
    }

    pub fn path_for_fd(&self, fd: RawFd) -> Option<PathBuf> {
        self.devices
            .iter()
            .find(|(_, g)| g.device.as_raw_fd() == fd)
            .map(|(p, _)| p.clone())
    }

    /// Attempts to open and exclusively grab `path`, retrying transient
    /// failures with the exponential backoff spec.md §4.1 specifies
    /// (200ms, ×2, up to 9 attempts). Blocking by design: the event loop
    /// has nothing else to do while a device is settling after a hotplug
    /// event, and the delay must be observable the same way it would be
    /// in a single-threaded reactor.
    ///
    /// Rejects a device that fails the keyboard-likeness test; callers that
    /// need to honor `devices.add` (force-grabbing a device that wouldn't
    /// otherwise qualify, e.g. a numeric-only remote) should use
    /// [`Self::grab_forced`] instead.
    pub fn grab(&mut self, path: &Path) -> Result<(), PlatformError> {
        self.grab_inner(path, false)
    }

    /// As [`Self::grab`], but skips the keyboard-likeness test. For devices
    /// named in the configuration's `devices.add` list.
    pub fn grab_forced(&mut self, path: &Path) -> Result<(), PlatformError> {
        self.grab_inner(path, true)
    }

    fn grab_inner(&mut self, path: &Path, force: bool) -> Result<(), PlatformError> {
        if self.devices.contains_key(path) {
            return Ok(());
        }

        let mut device = match Device::open(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(PlatformError::Enumerate(e)),
        };

        if is_own_virtual_device(&device) || (!force && !is_keyboard_like(&device)) {
            return Ok(());
        }

        let name = device.name().unwrap_or("unknown input device").to_string();
        let mut attempt = 0;
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match device.grab() {
                Ok(()) => break,
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::WouldBlock
                    ) && attempt < MAX_GRAB_ATTEMPTS =>
                {
                    attempt += 1;
                    log::debug!("grab of {name:?} failed ({e}), retrying in {backoff:?}");
                    std::thread::sleep(backoff);
                    backoff *= 2;
                }
                Err(e) => {
                    log::warn!("giving up grabbing {name:?}: {e}");
                    return Err(PlatformError::GrabFailed {
                        name,
                        attempts: attempt + 1,
                        source: e,
                    });
                }
            }
        }

        log::info!("grabbed {name:?} at {}", path.display());
        self.devices.insert(
            path.to_path_buf(),
            Grabbed {
                device,
                path: path.to_path_buf(),
                name,
            },
        );
        Ok(())
    }

    pub fn ungrab(&mut self, path: &Path) {
        if let Some(mut grabbed) = self.devices.remove(path) {
            let _ = grabbed.device.ungrab();
            log::info!("ungrabbed {:?} at {}", grabbed.name, path.display());
        }
    }

    pub fn ungrab_all(&mut self) {
        let paths: Vec<PathBuf> = self.devices.keys().cloned().collect();
        for path in paths {
            self.ungrab(&path);
        }
    }

    /// Reads every currently-available event from the device registered at
    /// `fd`, translating each to an `InputEvent`. `errno=19` (ENODEV,
    /// read racing an unplug) is swallowed: the caller should follow up
    /// by ungrabbing the path once the hotplug watcher reports the
    /// corresponding DELETE.
    pub fn read_events(&mut self, fd: RawFd) -> Result<Vec<InputEvent>, PlatformError> {
        let Some(path) = self.path_for_fd(fd) else {
            return Ok(Vec::new());
        };
        let Some(grabbed) = self.devices.get_mut(&path) else {
            return Ok(Vec::new());
        };

        let events = match grabbed.device.fetch_events() {
            Ok(events) => events,
            Err(e) if e.raw_os_error() == Some(19) => return Ok(Vec::new()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(Vec::new()),
            Err(e) => return Err(PlatformError::Enumerate(e)),
        };

        let mut out = Vec::new();
        for event in events {
            if let InputEventKind::Key(key) = event.kind() {
                let action = match event.value() {
                    0 => Action::Release,
                    1 => Action::Press,
                    _ => Action::Repeat,
                };
                out.push(InputEvent::key(Key::from_code(key.code()), action));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_with_only_list_excludes_everything_else() {
        let filter = keymux_core::config::DeviceFilter {
            only: vec!["my-keyboard".into()],
            add: Vec::new(),
            ignore: Vec::new(),
        };
        assert!(matches_filter(&filter, Path::new("/dev/input/event3"), "my-keyboard"));
        assert!(!matches_filter(&filter, Path::new("/dev/input/event3"), "other"));
    }

    #[test]
    fn add_list_matches_by_name_or_path() {
        let filter = keymux_core::config::DeviceFilter {
            only: Vec::new(),
            add: vec!["numpad-remote".into()],
            ignore: Vec::new(),
        };
        assert!(in_add_list(&filter, Path::new("/dev/input/event9"), "numpad-remote"));
        assert!(!in_add_list(&filter, Path::new("/dev/input/event9"), "other"));
    }

    #[test]
    fn ignore_list_excludes_by_name_or_path() {
        let filter = keymux_core::config::DeviceFilter {
            only: Vec::new(),
            add: Vec::new(),
            ignore: vec!["/dev/input/event5".into()],
        };
        assert!(!matches_filter(&filter, Path::new("/dev/input/event5"), "anything"));
        assert!(matches_filter(&filter, Path::new("/dev/input/event6"), "anything"));
    }
}
