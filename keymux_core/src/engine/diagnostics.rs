//! Engine state snapshot dumped to the log on the diagnostic key, and the
//! shutdown sequence run on the emergency-eject key or a host-level signal
//! (spec.md §4.8).

use crate::engine::keystate::KeystateTable;
use crate::engine::output::OutputSynthesizer;
use crate::engine::sticky::StickyTable;

/// A point-in-time summary of every table the engine owns. Intentionally
/// flat and `Display`-free beyond `Debug`: this exists to be logged, not
/// parsed.
#[derive(Debug)]
pub struct DiagnosticsReport {
    pub suspended: bool,
    pub suspended_until_ms: Option<u64>,
    pub sticky_binding: Option<String>,
    pub tracked_keystates: usize,
    pub pressed_keys: usize,
    pub pressed_modifier_keys: usize,
    pub suspended_mod_keys_queued: usize,
}

impl DiagnosticsReport {
    pub fn capture(
        keystates: &KeystateTable,
        output: &OutputSynthesizer,
        sticky: &StickyTable,
        suspended_until_ms: Option<u64>,
    ) -> Self {
        Self {
            suspended: suspended_until_ms.is_some(),
            suspended_until_ms,
            sticky_binding: sticky.active().map(|b| format!("{:?} -> {:?}", b.inkey, b.outkey)),
            tracked_keystates: keystates.iter().count(),
            pressed_keys: output.pressed_keys().len(),
            pressed_modifier_keys: output.pressed_modifier_keys().len(),
            suspended_mod_keys_queued: output.suspended_mod_keys_queued(),
        }
    }

    /// Logs this report at `info` level, the way F15 dumps state to the
    /// daemon's log rather than to any out-of-band channel.
    pub fn log(&self) {
        log::info!(
            "diagnostic dump: suspended={} tracked_keystates={} pressed_keys={} pressed_modifiers={} sticky={:?}",
            self.suspended,
            self.tracked_keystates,
            self.pressed_keys,
            self.pressed_modifier_keys,
            self.sticky_binding,
        );
    }
}
