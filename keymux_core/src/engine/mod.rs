//! The `Engine`: the single owning value that holds every mutable table
//! the remapper needs (spec.md §9's "no process-wide globals" note) and
//! drives them from one `on_event` entry point per incoming key event.

mod diagnostics;
mod executor;
mod keystate;
mod matcher;
mod output;
mod pipeline;
mod repeat_cache;
mod sticky;

pub use diagnostics::DiagnosticsReport;
pub use executor::{Executor, ExecutorState};
pub use keystate::{Keystate, KeystateSnapshot, KeystateTable};
pub use matcher::{
    find_command, resolve_modmap, resolve_modmap_from, resolve_multi_modmap,
    resolve_multi_modmap_from, ActiveKeymaps,
};
pub use output::{CachedOutput, KeySink, OutputSynthesizer};
pub use repeat_cache::{CacheEntry, ModifierSnapshot, RepeatCache};
pub use sticky::StickyTable;

use std::collections::HashSet;
use std::sync::Arc;

use crate::clock::{Clock, Millis};
use crate::config::Configuration;
use crate::context::{KeyContext, WindowContextProvider};
use crate::key::Key;

/// Raw input event shape the host hands to [`Engine::on_event`]. `device`
/// is `None` for startup bootstrap injection (spec.md §4.3 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub key: Key,
    pub action: crate::key::Action,
    pub is_key_event: bool,
    pub device_present: bool,
}

impl InputEvent {
    pub fn key(key: Key, action: crate::key::Action) -> Self {
        Self {
            key,
            action,
            is_key_event: true,
            device_present: true,
        }
    }

    pub fn non_key_passthrough(key: Key, action: crate::key::Action) -> Self {
        Self {
            key,
            action,
            is_key_event: false,
            device_present: true,
        }
    }

    pub fn bootstrap(key: Key, action: crate::key::Action) -> Self {
        Self {
            key,
            action,
            is_key_event: true,
            device_present: false,
        }
    }
}

/// The single owning value for all engine state. Generic over a [`Clock`]
/// so tests can drive timers with a [`crate::clock::VirtualClock`] instead
/// of racing wall time.
pub struct Engine<C: Clock> {
    config: Arc<Configuration>,
    clock: C,
    keystates: KeystateTable,
    output: OutputSynthesizer,
    sticky: StickyTable,
    repeat_cache: RepeatCache,
    active_keymaps: ActiveKeymaps,
    executor_state: ExecutorState,
    suspend_deadline: Option<Millis>,
    awaiting_first_repeat: Option<Key>,
    last_context: Option<KeyContext>,
    spent_modifiers: HashSet<Key>,
    last_pressed_key: Option<Key>,
}

impl<C: Clock> Engine<C> {
    pub fn new(config: Arc<Configuration>, clock: C) -> Self {
        let modifiers = Arc::new(config.modifiers.clone());
        Self {
            config,
            clock,
            keystates: KeystateTable::new(),
            output: OutputSynthesizer::new(modifiers),
            sticky: StickyTable::new(),
            repeat_cache: RepeatCache::new(),
            active_keymaps: ActiveKeymaps::new(),
            executor_state: ExecutorState::default(),
            suspend_deadline: None,
            awaiting_first_repeat: None,
            last_context: None,
            spent_modifiers: HashSet::new(),
            last_pressed_key: None,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// The engine's clock, e.g. for a test to advance a [`crate::clock::VirtualClock`]
    /// past a timer deadline before calling [`Engine::poll_timers`].
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Whether the suspend timer is currently armed.
    pub fn is_suspending(&self) -> bool {
        self.suspend_deadline.is_some()
    }

    /// Arms or re-arms the suspend timer. A shorter requested deadline
    /// than the one already armed is ignored (spec.md §4.4, §8 invariant
    /// 3): timers only lengthen.
    fn arm_suspend(&mut self, timeout_ms: Millis) {
        let deadline = self.clock.now_ms() + timeout_ms;
        match self.suspend_deadline {
            Some(existing) if existing >= deadline => {}
            _ => self.suspend_deadline = Some(deadline),
        }
    }

    fn cancel_suspend(&mut self) {
        self.suspend_deadline = None;
    }

    /// Checks the armed suspend timer against the clock and resumes if it
    /// has fired. Hosts should call this on every loop tick in addition to
    /// after every event, so a held key resolves even with no further
    /// input.
    pub fn poll_timers<S: KeySink>(&mut self, sink: &mut S) {
        if let Some(deadline) = self.suspend_deadline {
            if self.clock.now_ms() >= deadline {
                self.resume_keys(sink);
            }
        }
    }

    /// Materializes every suspended keystate: unsets `spent`/`suspended`,
    /// resolves multi-keys via the timeout tap-vs-hold fallback, and emits
    /// a PRESS for any not already asserted (spec.md §4.4).
    fn resume_keys<S: KeySink>(&mut self, sink: &mut S) {
        self.cancel_suspend();
        let throttles = self.config.throttles;
        let carve_out = self.config.compat.shift_shift_momentary_carve_out;
        let sticky_inkey = self.sticky.active().map(|b| b.inkey);
        let last_pressed_key = self.last_pressed_key;
        // A snapshot of every other currently-pressed key, taken before the
        // mutable pass below so each multi-key can ask "besides me, is
        // exactly one other key down, and is it Shift" (spec.md §4.4's
        // "historical fallback" carve-out) without borrowing the table
        // mutably and immutably at once.
        let pressed_snapshot: Vec<(Key, Key)> = self
            .keystates
            .pressed()
            .map(|ks| (ks.inkey, ks.key))
            .collect();
        let mut to_press = Vec::new();

        for ks in self.keystates.pressed_mut() {
            if !ks.suspended {
                continue;
            }
            ks.spent = false;
            ks.suspended = false;
            if ks.is_multi {
                let is_last_pressed = last_pressed_key == Some(ks.inkey);
                let only_other_is_shift = {
                    let mut others = pressed_snapshot
                        .iter()
                        .filter(|&&(other_inkey, _)| other_inkey != ks.inkey);
                    matches!(
                        (others.next(), others.next()),
                        (Some(&(_, key)), None)
                            if key == Key::LEFTSHIFT || key == Key::RIGHTSHIFT
                    )
                };
                let shift_shift_carve_out = carve_out && is_last_pressed && only_other_is_shift;
                if ks.other_key_pressed_while_held {
                    ks.resolve_as_modifier();
                } else if shift_shift_carve_out {
                    ks.resolve_as_momentary();
                } else {
                    ks.resolve_as_modifier();
                }
            }
            // A sticky-bound input key stays silently held: it is only
            // ever lifted when the input itself releases it (spec.md
            // §4.7), never asserted on the output under its own identity.
            if Some(ks.inkey) == sticky_inkey {
                continue;
            }
            if !ks.exerted_on_output {
                to_press.push(ks.key);
                ks.exerted_on_output = true;
            }
        }

        for key in to_press {
            self.output.send_key_action(sink, throttles, key, crate::key::Action::Press);
        }
    }

    /// Releases every key the output believes is asserted, in output order
    /// (spec.md §4.2 `shutdown`, §4.8).
    pub fn shutdown<S: KeySink>(&mut self, sink: &mut S) {
        self.output.shutdown(sink, self.config.throttles);
        self.keystates = KeystateTable::new();
        self.active_keymaps.reset();
        self.sticky.clear();
        self.cancel_suspend();
    }

    pub fn diagnostics(&self) -> DiagnosticsReport {
        DiagnosticsReport::capture(&self.keystates, &self.output, &self.sticky, self.suspend_deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::config::Configuration;
    use crate::engine::output::test_support::RecordingSink;
    use crate::key::Action;

    fn engine() -> Engine<VirtualClock> {
        Engine::new(Arc::new(Configuration::default()), VirtualClock::new())
    }

    #[test]
    fn shutdown_releases_every_asserted_key_and_resets_tables() {
        let mut e = engine();
        let mut sink = RecordingSink::default();
        e.output.send_key_action(&mut sink, e.config.throttles, Key::A, Action::Press);
        e.shutdown(&mut sink);
        assert!(e.output.pressed_keys().is_empty());
        assert!(!e.is_suspending());
    }

    #[test]
    fn arming_a_shorter_timeout_does_not_shorten_the_deadline() {
        let mut e = engine();
        e.arm_suspend(1000);
        let first = e.suspend_deadline;
        e.arm_suspend(10);
        assert_eq!(e.suspend_deadline, first);
        e.arm_suspend(5000);
        assert!(e.suspend_deadline.unwrap() > first.unwrap());
    }
}
