//! The `KeySink` implementation over `/dev/uinput`: the single point of
//! contact between the engine and the virtual keyboard it drives (spec.md
//! §4.2), grounded on a sibling remapper's `UinputOutput`/`keycode_map.rs`
//! pair but trimmed to the key space `keymux_core::Key` actually covers.

pub mod keycode_map;

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use keymux_core::{Action, Key, KeySink};

use crate::error::{DaemonError, PlatformError};
use keycode_map::keycode_to_uinput_key;

pub const VIRT_DEVICE_PREFIX: &str = "keymux";

/// Virtual keyboard the daemon injects into, implementing
/// `keymux_core::KeySink`. Every key the engine presses is tracked in
/// `held` so a `Drop` (clean shutdown or an unexpected panic) can release
/// anything still asserted before the kernel device disappears.
pub struct UinputSink {
    device: Option<uinput::Device>,
    held: HashSet<Key>,
}

impl UinputSink {
    pub fn create(name: &str) -> Result<Self, DaemonError> {
        let full_name = format!("{VIRT_DEVICE_PREFIX}-{name}");
        let device = uinput::default()
            .map_err(|e| PlatformError::OutputCreate(std::io::Error::other(e.to_string())))?
            .name(&full_name)
            .map_err(|e| PlatformError::OutputCreate(std::io::Error::other(e.to_string())))?
            .event(uinput::event::Keyboard::All)
            .map_err(|e| PlatformError::OutputCreate(std::io::Error::other(e.to_string())))?
            .create()
            .map_err(|e| PlatformError::OutputCreate(std::io::Error::other(e.to_string())))?;

        Ok(Self {
            device: Some(device),
            held: HashSet::new(),
        })
    }

    /// Releases every key this sink believes is still held, best-effort:
    /// logged, never propagated (this runs from both ordinary shutdown
    /// and `Drop`, where there is nowhere to send an error).
    fn release_all_held(&mut self) {
        let Some(device) = self.device.as_mut() else {
            return;
        };
        let keys: Vec<Key> = self.held.drain().collect();
        for key in keys {
            let Some(ukey) = keycode_to_uinput_key(key) else {
                continue;
            };
            if let Err(e) = device.release(&ukey) {
                log::warn!("failed to release {key:?} during cleanup: {e}");
            }
            let _ = device.synchronize();
        }
    }
}

impl KeySink for UinputSink {
    fn write_key(&mut self, key: Key, action: Action) {
        let Some(device) = self.device.as_mut() else {
            return;
        };
        let Some(ukey) = keycode_to_uinput_key(key) else {
            log::debug!("no uinput mapping for {key:?}, dropping write");
            return;
        };

        let result = match action {
            Action::Press | Action::Repeat => {
                self.held.insert(key);
                device.press(&ukey)
            }
            Action::Release => {
                self.held.remove(&key);
                device.release(&ukey)
            }
        };
        if let Err(e) = result {
            log::warn!("failed to write {key:?} {action:?} to uinput device: {e}");
        }
    }

    fn sync(&mut self) {
        if let Some(device) = self.device.as_mut() {
            if let Err(e) = device.synchronize() {
                log::warn!("failed to synchronize uinput device: {e}");
            }
        }
    }

    fn sleep_ms(&mut self, ms: u64) {
        if ms > 0 {
            thread::sleep(Duration::from_millis(ms));
        }
    }
}

impl Drop for UinputSink {
    fn drop(&mut self) {
        self.release_all_held();
        // Dropping `self.device` itself issues UI_DEV_DESTROY.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virt_device_prefix_is_stable() {
        assert_eq!(VIRT_DEVICE_PREFIX, "keymux");
    }
}
