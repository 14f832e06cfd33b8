//! The immutable configuration snapshot an [`Engine`](crate::engine::Engine)
//! is built from.

use crate::config::command::Keymap;
use crate::config::modifier::ModifierTable;
use crate::config::modmap::{Modmap, MultiModmap};
use crate::error::{CoreError, CoreResult};
use crate::key::Key;

/// How long a dual-role key may be held before it resolves as hold purely
/// by timeout, and how long the whole keystate table may stay suspended
/// waiting to see whether more keys come down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub multipurpose_ms: u64,
    pub suspend_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            multipurpose_ms: 1000,
            suspend_ms: 1000,
        }
    }
}

/// Device selection rules (spec.md §4.1): if `only` is non-empty, nothing
/// else matches; otherwise every keyboard-like device matches except those
/// named in `ignore`. `add` extends the detected set with devices that
/// would not otherwise pass the keyboard-likeness test (e.g. a
/// numeric-only remote control).
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub only: Vec<String>,
    pub add: Vec<String>,
    pub ignore: Vec<String>,
}

/// Session/compositor tuple used to select a window-context provider at
/// boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environ {
    pub session_type: String,
    pub compositor: String,
}

/// Whether kernel REPEAT events bypass the pipeline entirely (spec.md
/// §4.3 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatPolicy {
    pub passthrough: bool,
}

impl Default for RepeatPolicy {
    fn default() -> Self {
        Self { passthrough: false }
    }
}

/// Minimum throttle delays the output synthesizer guarantees regardless of
/// configuration (spec.md §4.2): 1ms before, 2ms after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Throttles {
    pub pre_ms: u64,
    pub post_ms: u64,
}

impl Throttles {
    pub const MIN_PRE_MS: u64 = 1;
    pub const MIN_POST_MS: u64 = 2;

    pub fn new(pre_ms: u64, post_ms: u64) -> Self {
        Self {
            pre_ms: pre_ms.max(Self::MIN_PRE_MS),
            post_ms: post_ms.max(Self::MIN_POST_MS),
        }
    }
}

impl Default for Throttles {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// Whether the historical "shift+shift stays momentary" carve-out
/// (spec.md §4.4, §9 open question) is honored. Exposed as a flag rather
/// than silently always-on or always-off, per spec.md's open question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompatFlags {
    pub shift_shift_momentary_carve_out: bool,
}

impl Default for CompatFlags {
    fn default() -> Self {
        Self {
            shift_shift_momentary_carve_out: true,
        }
    }
}

/// The complete, immutable snapshot the engine is built from. Produced by
/// an external configuration loader (out of scope for this crate, per
/// spec.md §1); the engine only ever reads it.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub modifiers: ModifierTable,
    pub modmaps: Vec<Modmap>,
    pub multi_modmaps: Vec<MultiModmap>,
    pub keymaps: Vec<Keymap>,
    pub timeouts: Timeouts,
    pub devices: DeviceFilter,
    pub environ: Environ,
    pub repeat_policy: RepeatPolicy,
    pub throttles: Throttles,
    pub diagnostic_key: Key,
    pub emergency_eject_key: Key,
    pub compat: CompatFlags,
}

impl Configuration {
    /// Validates the fatal invariants spec.md §7 requires to be caught
    /// before the event loop starts: at most one unconditional modmap, at
    /// most one unconditional multi-modmap.
    pub fn validate(&self) -> CoreResult<()> {
        if self.modmaps.iter().filter(|m| m.when.is_none()).count() > 1 {
            return Err(CoreError::MultipleUnconditionalModmaps);
        }
        if self.multi_modmaps.iter().filter(|m| m.when.is_none()).count() > 1 {
            return Err(CoreError::MultipleUnconditionalMultiModmaps);
        }
        Ok(())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            modifiers: ModifierTable::with_defaults(),
            modmaps: Vec::new(),
            multi_modmaps: Vec::new(),
            keymaps: Vec::new(),
            timeouts: Timeouts::default(),
            devices: DeviceFilter::default(),
            environ: Environ {
                session_type: "unknown".into(),
                compositor: "unknown".into(),
            },
            repeat_policy: RepeatPolicy::default(),
            throttles: Throttles::default(),
            diagnostic_key: Key::F15,
            emergency_eject_key: Key::F16,
            compat: CompatFlags::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::modmap::Modmap;
    use std::collections::HashMap;

    #[test]
    fn rejects_two_unconditional_modmaps() {
        let mut config = Configuration::default();
        config
            .modmaps
            .push(Modmap::unconditional("a", HashMap::new()));
        config
            .modmaps
            .push(Modmap::unconditional("b", HashMap::new()));
        assert_eq!(
            config.validate(),
            Err(CoreError::MultipleUnconditionalModmaps)
        );
    }

    #[test]
    fn throttles_never_go_below_the_minimum() {
        let t = Throttles::new(0, 0);
        assert_eq!(t.pre_ms, Throttles::MIN_PRE_MS);
        assert_eq!(t.post_ms, Throttles::MIN_POST_MS);
    }
}
