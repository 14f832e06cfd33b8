//! The output synthesizer: the single point of contact with the virtual
//! keyboard (spec.md §4.2).

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::config::{Combo, ModifierTable, Throttles};
use crate::key::{Action, Key};

/// The sink a host wires the synthesizer to: a thin abstraction over
/// "write this key event to the kernel uinput device and flush it."
/// `keymux_core` never talks to `/dev/uinput` itself so the synthesizer's
/// sequencing logic can be unit-tested against a recording fake.
pub trait KeySink {
    fn write_key(&mut self, key: Key, action: Action);
    fn sync(&mut self);
    /// Blocks the calling thread for `ms` milliseconds. Implementations
    /// backed by real hardware use this to guarantee the minimum temporal
    /// separation spec.md §4.2 requires between synthetic events; fakes
    /// used in tests typically no-op.
    fn sleep_ms(&mut self, ms: u64);
}

/// The cached outcome of the first output produced for an input event,
/// consumed by the repeat cache (spec.md §4.9). First-write-wins within one
/// input event: the internal `send_key_action` calls `send_combo` makes
/// while lifting/re-pressing surrounding modifiers must not overwrite the
/// slot `send_combo` itself claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedOutput {
    Passthrough(Key, Action),
    Combo(Combo),
    Key(Key),
}

/// Owns the virtual keyboard's view of what is currently "pressed."
pub struct OutputSynthesizer {
    modifiers: Arc<ModifierTable>,
    pressed_keys: HashSet<Key>,
    pressed_modifier_keys: HashSet<Key>,
    suspended_mod_keys: VecDeque<Key>,
    suspend_depth: u32,
    last_output_for_cache: Option<CachedOutput>,
}

impl OutputSynthesizer {
    pub fn new(modifiers: Arc<ModifierTable>) -> Self {
        Self {
            modifiers,
            pressed_keys: HashSet::new(),
            pressed_modifier_keys: HashSet::new(),
            suspended_mod_keys: VecDeque::new(),
            suspend_depth: 0,
            last_output_for_cache: None,
        }
    }

    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn is_mod_pressed(&self, key: Key) -> bool {
        self.pressed_modifier_keys.contains(&key)
    }

    pub fn pressed_modifier_keys(&self) -> &HashSet<Key> {
        &self.pressed_modifier_keys
    }

    pub fn pressed_keys(&self) -> &HashSet<Key> {
        &self.pressed_keys
    }

    pub fn suspended_mod_keys_queued(&self) -> usize {
        self.suspended_mod_keys.len()
    }

    pub fn modifiers(&self) -> &ModifierTable {
        &self.modifiers
    }

    /// Claims (or clears) the one-slot cache-hint for the event currently
    /// being processed. Called by the pipeline before dispatching each
    /// event (spec.md §4.3 step 2).
    pub fn clear_cache_slot(&mut self) {
        self.last_output_for_cache = None;
    }

    pub fn take_cache_slot(&mut self) -> Option<CachedOutput> {
        self.last_output_for_cache.take()
    }

    fn record_cache(&mut self, output: CachedOutput) {
        if self.last_output_for_cache.is_none() {
            self.last_output_for_cache = Some(output);
        }
    }

    fn update_pressed(&mut self, key: Key, action: Action) {
        if action.is_pressed() {
            self.pressed_keys.insert(key);
            if self.modifiers.is_modifier_key(key) {
                self.pressed_modifier_keys.insert(key);
            }
        } else {
            self.pressed_keys.remove(&key);
            self.pressed_modifier_keys.remove(&key);
        }
    }

    /// Writes one key event at the configured throttle delays, recording
    /// it as a cacheable passthrough output if nothing has claimed the
    /// slot yet for this input event.
    pub fn send_key_action<S: KeySink>(
        &mut self,
        sink: &mut S,
        throttles: Throttles,
        key: Key,
        action: Action,
    ) {
        sink.sleep_ms(throttles.pre_ms);
        self.update_pressed(key, action);
        sink.write_key(key, action);
        sink.sync();
        sink.sleep_ms(throttles.post_ms);
        if action.just_pressed() {
            self.record_cache(CachedOutput::Passthrough(key, action));
        }
    }

    /// Identical to [`Self::send_key_action`] but always at the minimum
    /// delays; used for pure passthrough of keys that hit no binding.
    pub fn send_key_action_fast<S: KeySink>(&mut self, sink: &mut S, key: Key, action: Action) {
        self.send_key_action(
            sink,
            Throttles::new(Throttles::MIN_PRE_MS, Throttles::MIN_POST_MS),
            key,
            action,
        )
    }

    fn is_suspending(&self) -> bool {
        self.suspend_depth > 0
    }

    /// Emits a combo: lifts modifiers not needed by it, presses the ones
    /// it needs, taps the ordinary key, then unwinds — spec.md §4.2's
    /// `send_combo` steps 1-6.
    pub fn send_combo<S: KeySink>(&mut self, sink: &mut S, throttles: Throttles, combo: &Combo) {
        let needed_keys: HashSet<Key> = combo
            .modifiers
            .iter()
            .filter_map(|id| self.modifiers.keys_for(id))
            .flat_map(|keys| keys.keys())
            .collect();

        let mut to_lift: Vec<Key> = self
            .pressed_modifier_keys
            .iter()
            .filter(|k| !needed_keys.contains(k))
            .copied()
            .collect();
        to_lift.sort_by_key(|k| k.code());

        // combo.modifiers not already (fully) covered by an already-pressed
        // specific/generic key.
        let mut to_press: Vec<_> = combo
            .modifiers
            .iter()
            .filter(|id| {
                self.modifiers
                    .keys_for(id)
                    .map(|keys| !keys.keys().iter().any(|k| self.pressed_modifier_keys.contains(k)))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        // If both a specific and its generic counterpart ended up in
        // to_press, drop the generic one: the specific key already covers
        // it (spec.md §4.2 step 1, §9's documented defensive resolution).
        let specifics_present: HashSet<_> = to_press
            .iter()
            .filter_map(|id| id.generic_counterpart())
            .collect();
        to_press.retain(|id| !(id.is_generic() && specifics_present.contains(id)));

        self.record_cache(CachedOutput::Combo(combo.clone()));

        let mut released_mod_keys = Vec::new();
        for key in to_lift.into_iter().rev() {
            self.send_key_action(sink, throttles, key, Action::Release);
            released_mod_keys.push(key);
        }

        let mut pressed_mod_keys = Vec::new();
        for id in &to_press {
            if let Some(keys) = self.modifiers.keys_for(id) {
                let key = keys.representative();
                self.send_key_action(sink, throttles, key, Action::Press);
                pressed_mod_keys.push(key);
            }
        }

        self.send_key_action(sink, throttles, combo.key, Action::Press);
        self.send_key_action(sink, throttles, combo.key, Action::Release);

        for key in pressed_mod_keys.into_iter().rev() {
            self.send_key_action(sink, throttles, key, Action::Release);
        }

        if self.is_suspending() {
            self.suspended_mod_keys.extend(released_mod_keys);
        } else {
            for key in released_mod_keys.into_iter().rev() {
                self.send_key_action(sink, throttles, key, Action::Press);
            }
        }
    }

    /// A bare key, emitted as a no-modifier combo.
    pub fn send_key<S: KeySink>(&mut self, sink: &mut S, throttles: Throttles, key: Key) {
        self.record_cache(CachedOutput::Key(key));
        self.send_combo(sink, throttles, &Combo::bare(key));
    }

    /// Forwards a non-key event (sync, misc, ...) verbatim without
    /// touching any tracked state.
    pub fn send_event<S: KeySink>(&mut self, sink: &mut S, key: Key, action: Action) {
        sink.write_key(key, action);
        sink.sync();
    }

    /// Increments the suspend refcount: modifiers this synthesizer lifts
    /// while the count is non-zero are queued instead of immediately
    /// re-pressed.
    pub fn allow_suspend(&mut self) {
        self.suspend_depth += 1;
    }

    /// Decrements the suspend refcount; on the outermost close, re-presses
    /// every queued modifier and clears the queue.
    pub fn disallow_suspend<S: KeySink>(&mut self, sink: &mut S, throttles: Throttles) {
        self.suspend_depth = self.suspend_depth.saturating_sub(1);
        if !self.is_suspending() {
            let queued: Vec<Key> = self.suspended_mod_keys.drain(..).collect();
            for key in queued {
                self.send_key_action(sink, throttles, key, Action::Press);
            }
        }
    }

    /// Releases every key the synthesizer believes is still asserted on
    /// the virtual device, in the order spec.md §4.2 specifies: all
    /// ordinary keys, then all modifier keys.
    pub fn shutdown<S: KeySink>(&mut self, sink: &mut S, throttles: Throttles) {
        let keys: Vec<Key> = self.pressed_keys.iter().copied().collect();
        for key in keys {
            self.send_key_action(sink, throttles, key, Action::Release);
        }
        let mods: Vec<Key> = self.pressed_modifier_keys.iter().copied().collect();
        for key in mods {
            self.send_key_action(sink, throttles, key, Action::Release);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Vec<(Key, Action)>,
        pub syncs: usize,
    }

    impl KeySink for RecordingSink {
        fn write_key(&mut self, key: Key, action: Action) {
            self.events.push((key, action));
        }

        fn sync(&mut self) {
            self.syncs += 1;
        }

        fn sleep_ms(&mut self, _ms: u64) {}
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::RecordingSink;
    use super::*;
    use crate::config::ModifierId;

    fn synth() -> OutputSynthesizer {
        OutputSynthesizer::new(Arc::new(ModifierTable::with_defaults()))
    }

    #[test]
    fn send_key_action_updates_pressed_sets() {
        let mut out = synth();
        let mut sink = RecordingSink::default();
        out.send_key_action(&mut sink, Throttles::default(), Key::LEFTSHIFT, Action::Press);
        assert!(out.is_key_pressed(Key::LEFTSHIFT));
        assert!(out.is_mod_pressed(Key::LEFTSHIFT));
        out.send_key_action(&mut sink, Throttles::default(), Key::LEFTSHIFT, Action::Release);
        assert!(!out.is_key_pressed(Key::LEFTSHIFT));
    }

    #[test]
    fn send_combo_presses_modifiers_then_key_then_releases_in_reverse() {
        let mut out = synth();
        let mut sink = RecordingSink::default();
        let combo = Combo::new([ModifierId::Control], Key::TAB);
        out.send_combo(&mut sink, Throttles::default(), &combo);
        assert_eq!(
            sink.events,
            vec![
                (Key::LEFTCTRL, Action::Press),
                (Key::TAB, Action::Press),
                (Key::TAB, Action::Release),
                (Key::LEFTCTRL, Action::Release),
            ]
        );
        assert!(!out.is_mod_pressed(Key::LEFTCTRL));
    }

    #[test]
    fn send_combo_does_not_relift_an_already_pressed_modifier() {
        let mut out = synth();
        let mut sink = RecordingSink::default();
        out.send_key_action(&mut sink, Throttles::default(), Key::LEFTCTRL, Action::Press);
        sink.events.clear();
        let combo = Combo::new([ModifierId::Control], Key::TAB);
        out.send_combo(&mut sink, Throttles::default(), &combo);
        assert_eq!(sink.events, vec![(Key::TAB, Action::Press), (Key::TAB, Action::Release)]);
        assert!(out.is_mod_pressed(Key::LEFTCTRL));
    }

    #[test]
    fn generic_dropped_when_specific_already_pressed() {
        let mut out = synth();
        let mut sink = RecordingSink::default();
        out.send_key_action(&mut sink, Throttles::default(), Key::LEFTSHIFT, Action::Press);
        sink.events.clear();
        // Combo requests the generic Shift; the specific LShift already
        // covers it, so nothing extra gets pressed/released for it.
        let combo = Combo::new([ModifierId::Shift], Key::TAB);
        out.send_combo(&mut sink, Throttles::default(), &combo);
        assert_eq!(sink.events, vec![(Key::TAB, Action::Press), (Key::TAB, Action::Release)]);
    }

    #[test]
    fn suspend_defers_relift_of_lifted_modifiers() {
        let mut out = synth();
        let mut sink = RecordingSink::default();
        out.send_key_action(&mut sink, Throttles::default(), Key::LEFTCTRL, Action::Press);
        out.allow_suspend();
        sink.events.clear();
        let combo = Combo::bare(Key::TAB);
        out.send_combo(&mut sink, Throttles::default(), &combo);
        // LCTRL lifted but not re-pressed while suspended.
        assert_eq!(
            sink.events,
            vec![
                (Key::LEFTCTRL, Action::Release),
                (Key::TAB, Action::Press),
                (Key::TAB, Action::Release),
            ]
        );
        out.disallow_suspend(&mut sink, Throttles::default());
        assert_eq!(sink.events.last(), Some(&(Key::LEFTCTRL, Action::Press)));
    }

    #[test]
    fn shutdown_releases_every_asserted_key() {
        let mut out = synth();
        let mut sink = RecordingSink::default();
        out.send_key_action(&mut sink, Throttles::default(), Key::A, Action::Press);
        out.send_key_action(&mut sink, Throttles::default(), Key::LEFTCTRL, Action::Press);
        out.shutdown(&mut sink, Throttles::default());
        assert!(out.pressed_keys().is_empty());
        assert!(out.pressed_modifier_keys().is_empty());
    }
}
