//! The key-event pipeline: `on_event` is the front door every input event
//! enters through (spec.md §4.3); `on_key`/`on_mod_key`/`transform_key`
//! are its internal stages (§4.4, §4.5).

use std::collections::BTreeSet;

use crate::clock::Clock;
use crate::config::{Combo, Command, ModifierId};
use crate::context::{KeyContext, WindowContext, WindowContextProvider};
use crate::engine::matcher::{find_command, resolve_modmap_from, resolve_multi_modmap_from};
use crate::engine::output::{CachedOutput, KeySink};
use crate::engine::{Engine, Executor, ExecutorState, InputEvent};
use crate::key::{Action, Key};

impl<C: Clock> Engine<C> {
    /// Entry point for every event the host's device registry delivers,
    /// in arrival order (spec.md §4.3).
    pub fn on_event<S: KeySink, W: WindowContextProvider>(
        &mut self,
        event: InputEvent,
        window: &mut W,
        sink: &mut S,
    ) {
        // Step 1: non-key events and startup bootstrap injection bypass
        // all further logic.
        if !event.is_key_event || !event.device_present {
            self.output.send_event(sink, event.key, event.action);
            return;
        }

        // Reserved diagnostic/eject keys never reach modmaps or the
        // executor (spec.md §4.8).
        if event.key == self.config.diagnostic_key {
            if event.action.just_pressed() {
                self.diagnostics().log();
            }
            return;
        }
        if event.key == self.config.emergency_eject_key {
            self.shutdown(sink);
            return;
        }

        // Step 2: preserve the cache-tracking slot only while awaiting
        // the first REPEAT of this same key.
        let preserve_cache_slot =
            self.awaiting_first_repeat == Some(event.key) && event.action.is_repeat();
        if !preserve_cache_slot {
            self.output.clear_cache_slot();
        }

        // Step 3: repeat-passthrough shortcut.
        if self.config.repeat_policy.passthrough && event.action.is_repeat() {
            self.output.send_event(sink, event.key, event.action);
            return;
        }

        // Step 4: build or refresh this physical key's Keystate. Track the
        // most recently pressed physical key regardless of modifier-ness,
        // for the dual-role "shift+shift" timeout carve-out (spec.md
        // §4.4's "last key pressed" condition).
        if event.action.just_pressed() {
            self.last_pressed_key = Some(event.key);
        }
        let now = self.clock.now_ms();
        let first_time_resolving = {
            let ks = self.keystates.find_or_new(event.key, event.action, now);
            !ks.is_resolved()
        };

        // Step 5: capture context on PRESS, replay the cached one for
        // REPEAT/RELEASE (spec.md §8 invariant 6: no re-query).
        let ctx = if event.action.just_pressed() {
            let kctx = KeyContext::new(None, window.get_window_context());
            self.last_context = Some(kctx.clone());
            kctx
        } else {
            self.last_context
                .clone()
                .unwrap_or_else(|| KeyContext::new(None, WindowContext::error()))
        };

        // Steps 6-7: modmap / multi-modmap application, first time only.
        if first_time_resolving {
            if ctx.is_error() {
                let ks = self.keystates.get_mut(event.key).expect("just inserted");
                ks.key = ks.inkey;
            } else {
                let mapped = resolve_modmap_from(&self.config, &ctx.window, event.key);
                let multi = resolve_multi_modmap_from(&self.config, &ctx.window, event.key);
                let ks = self.keystates.get_mut(event.key).expect("just inserted");
                match multi {
                    Some(tap_hold) => {
                        ks.key = tap_hold.tap;
                        ks.multikey = Some(tap_hold.hold);
                        ks.is_multi = true;
                    }
                    None => ks.key = mapped,
                }
            }
        }

        // Step 8.
        self.on_key(event.key, &ctx, sink);

        if event.action.just_pressed() && !self.config.modifiers.is_modifier_key(event.key) {
            self.awaiting_first_repeat = Some(event.key);
        } else if self.awaiting_first_repeat == Some(event.key)
            && !event.action.just_pressed()
        {
            self.awaiting_first_repeat = None;
        }

        if event.action.is_released() {
            self.keystates.remove(event.key);
            self.repeat_cache.forget(event.key);
        }
    }

    /// spec.md §4.4's `on_key`.
    fn on_key<S: KeySink>(&mut self, inkey: Key, ctx: &KeyContext, sink: &mut S) {
        if ctx.is_error() {
            self.resume_keys(sink);
            let key = self.keystates.get(inkey).map(|ks| ks.key).unwrap_or(inkey);
            let action = self.keystates.get(inkey).map(|ks| ks.action).unwrap_or(Action::Release);
            self.output.send_key_action_fast(sink, key, action);
            return;
        }

        let (action, resolved_key, is_multi) = {
            let ks = self.keystates.get(inkey).expect("keystate just built");
            (ks.action, ks.key, ks.is_multi)
        };
        let is_modifier = self.config.modifiers.is_modifier_key(resolved_key);

        if !is_modifier {
            if action.is_repeat() {
                if self.try_replay_from_cache(inkey, action, sink) {
                    return;
                }
            }

            if is_multi {
                if action.just_pressed() {
                    self.suspend_multi_key(inkey, sink);
                    return;
                }
                if action.is_repeat() {
                    let still_suspended = self.keystates.get(inkey).is_some_and(|ks| ks.suspended);
                    if !still_suspended {
                        self.transform_key(inkey, action, ctx, sink);
                    }
                    return;
                }
                if action.is_released() {
                    self.resolve_multi_key_release(inkey, sink);
                    return;
                }
            }

            // An ordinary key's own RELEASE never re-enters the combo
            // matcher: whatever it triggered on PRESS already ran to
            // completion, and a matched command taps its own output key
            // itself. We only mirror a release the output is still
            // holding for this physical key (the passthrough case).
            if action.is_released() {
                if self.output.is_key_pressed(resolved_key) {
                    self.output.send_key_action_fast(sink, resolved_key, action);
                }
                return;
            }

            // An ordinary, non-multi PRESS resolves every still-suspended
            // dual-role key as its hold role immediately, ahead of its own
            // timeout (spec.md §4.4's event-based resolution, preferred
            // over the timeout fallback).
            if action.just_pressed() {
                self.resolve_suspended_multi_keys_on_other_press(sink);
            }

            self.transform_key(inkey, action, ctx, sink);
            return;
        }

        self.on_mod_key(inkey, action, ctx, sink);
    }

    /// Resolves every currently-suspended dual-role keystate as its
    /// hold-role modifier, in press order, and emits its PRESS if not
    /// already asserted (spec.md §4.4).
    fn resolve_suspended_multi_keys_on_other_press<S: KeySink>(&mut self, sink: &mut S) {
        let throttles = self.config.throttles;
        let mut suspended: Vec<(crate::clock::Millis, Key)> = self
            .keystates
            .iter()
            .filter(|ks| ks.is_multi && ks.suspended)
            .map(|ks| (ks.time_ms, ks.inkey))
            .collect();
        suspended.sort_by_key(|&(time_ms, key)| (time_ms, key.code()));

        for (_, inkey) in suspended {
            let (key, already_exerted) = {
                let ks = self.keystates.get_mut(inkey).expect("just filtered");
                ks.suspended = false;
                ks.other_key_pressed_while_held = true;
                ks.resolve_as_modifier();
                let already_exerted = ks.exerted_on_output;
                ks.exerted_on_output = true;
                (ks.key, already_exerted)
            };
            if !already_exerted {
                self.output.send_key_action(sink, throttles, key, Action::Press);
            }
        }
    }

    /// Populates/replays the repeat cache for a non-modifier REPEAT
    /// (spec.md §4.9). Returns `true` if a cached output was replayed.
    fn try_replay_from_cache<S: KeySink>(&mut self, inkey: Key, action: Action, sink: &mut S) -> bool {
        let snapshot = self.modifier_snapshot();

        if self.repeat_cache.get(inkey).is_none() {
            if let Some(captured) = self.output.take_cache_slot() {
                self.repeat_cache.record(inkey, captured, snapshot.clone());
            }
        }

        if !self.repeat_cache.is_valid(inkey, &snapshot) {
            return false;
        }

        let throttles = self.config.throttles;
        let output = self.repeat_cache.get(inkey).expect("checked valid above").output.clone();
        match output {
            CachedOutput::Passthrough(key, _) => {
                self.output.send_key_action(sink, throttles, key, action);
            }
            CachedOutput::Combo(combo) => {
                self.output.send_combo(sink, throttles, &combo);
            }
            CachedOutput::Key(key) => {
                self.output.send_key(sink, throttles, key);
            }
        }
        true
    }

    fn modifier_snapshot(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self
            .keystates
            .pressed()
            .filter(|ks| self.config.modifiers.is_modifier_key(ks.key))
            .map(|ks| ks.key)
            .collect();
        keys.sort_by_key(|k| k.code());
        keys
    }

    fn suspend_multi_key<S: KeySink>(&mut self, inkey: Key, _sink: &mut S) {
        if let Some(ks) = self.keystates.get_mut(inkey) {
            ks.suspended = true;
        }
        self.arm_suspend(self.config.timeouts.multipurpose_ms);
    }

    /// A multi-key's own RELEASE arriving before timeout: resolve tap vs
    /// hold from `other_key_pressed_while_held` and emit exactly once
    /// (spec.md §4.4's tap-vs-hold resolution).
    fn resolve_multi_key_release<S: KeySink>(&mut self, inkey: Key, sink: &mut S) {
        let throttles = self.config.throttles;
        let (resolved_hold, other_pressed, exerted) = {
            let ks = self.keystates.get_mut(inkey).expect("multi keystate present");
            let other_pressed = ks.other_key_pressed_while_held;
            if other_pressed {
                ks.resolve_as_modifier();
            } else {
                ks.resolve_as_momentary();
            }
            (ks.key, other_pressed, ks.exerted_on_output)
        };

        self.resume_keys(sink);

        if other_pressed {
            if exerted {
                self.output.send_key_action(sink, throttles, resolved_hold, Action::Release);
            }
        } else {
            self.output.send_key_action(sink, throttles, resolved_hold, Action::Press);
            self.output.send_key_action(sink, throttles, resolved_hold, Action::Release);
        }
    }

    /// spec.md §4.4's `on_mod_key`.
    fn on_mod_key<S: KeySink>(&mut self, inkey: Key, action: Action, ctx: &KeyContext, sink: &mut S) {
        if action.just_pressed() {
            let nothing_else_held = self.keystates.pressed().count() <= 1;
            if nothing_else_held {
                self.arm_suspend(self.config.timeouts.suspend_ms);
            }
            if self.is_suspending() {
                if let Some(ks) = self.keystates.get_mut(inkey) {
                    ks.suspended = true;
                }
                return;
            }
            self.transform_key(inkey, action, ctx, sink);
            return;
        }

        if action.is_released() {
            if let Some(outkey) = self.sticky.release(inkey) {
                self.output.send_key_action(sink, self.config.throttles, outkey, Action::Release);
                return;
            }

            let spent = self.keystates.get(inkey).is_some_and(|ks| ks.spent);
            if spent {
                return;
            }

            self.resume_keys(sink);
            self.transform_key(inkey, action, ctx, sink);
            return;
        }

        // Modifier REPEAT: nothing to do beyond keeping the keystate
        // fresh, which `find_or_new` already did.
    }

    /// spec.md §4.5's `transform_key`: resolves the currently-pressed
    /// combo against the active keymap list, executes a match, or falls
    /// through to passthrough.
    fn transform_key<S: KeySink>(&mut self, inkey: Key, action: Action, ctx: &KeyContext, sink: &mut S) {
        if ctx.is_error() {
            self.resume_keys(sink);
            let key = self.keystates.get(inkey).map(|ks| ks.key).unwrap_or(inkey);
            self.output.send_key_action_fast(sink, key, action);
            return;
        }

        let key = self.keystates.get(inkey).map(|ks| ks.key).unwrap_or(inkey);

        if self.executor_state.take_escape_next_key() {
            self.output.send_key_action_fast(sink, key, action);
            return;
        }

        if self.executor_state.escape_next_combo {
            let is_modifier = self.config.modifiers.is_modifier_key(key);
            if is_modifier || action.is_released() {
                return;
            }
            self.executor_state.escape_next_combo = false;
            self.resume_keys(sink);
            self.output.send_key_action_fast(sink, key, action);
            return;
        }

        let modifiers = self.pressed_modifier_ids();
        let combo = Combo::new(modifiers.clone(), key);

        let command = find_command(&combo, &self.active_keymaps, &self.config.keymaps, &ctx.window).cloned();

        if let Some(command) = command {
            self.mark_modifiers_spent(&modifiers);
            self.repeat_cache.invalidate_all();

            let mut executor = Executor::new(
                &mut self.output,
                sink,
                self.config.throttles,
                &mut self.active_keymaps,
                &mut self.sticky,
                &mut self.keystates,
            );
            let mut state = self.executor_state;
            self.output.allow_suspend();
            let reset = executor.execute(&command, ctx, &combo, &mut state);
            self.output.disallow_suspend(sink, self.config.throttles);
            self.executor_state = state;

            if reset {
                self.active_keymaps.reset();
                self.executor_state = ExecutorState::default();
            }
            return;
        }

        // Fall-through: no rule matched. A different non-modifier PRESS
        // invalidates the repeat cache unconditionally (spec.md §4.9's
        // "Invalidations" list), not only a PRESS that happened to match a
        // keymap rule.
        if action.just_pressed() && !self.config.modifiers.is_modifier_key(key) {
            self.repeat_cache.invalidate_all();
        }
        if !self.active_keymaps.is_nested() {
            self.resume_keys(sink);
            self.output.send_key_action_fast(sink, key, action);
        }
        self.active_keymaps.reset();
    }

    /// The modifier ids "currently pressed," one per held modifier key.
    ///
    /// Each physical key is claimed by exactly one *specific* modifier
    /// (there is no ambiguity in which key was actually pressed), so the
    /// live combo is always built from specific ids — never the generic
    /// role. Keymap bindings written with a generic role are expanded at
    /// construction time into their specific variants (see
    /// [`Combo::expand_generic_variants`]) so they still match here.
    fn pressed_modifier_ids(&self) -> BTreeSet<ModifierId> {
        let mut ids = BTreeSet::new();
        for ks in self.keystates.pressed() {
            let candidates = self.config.modifiers.modifiers_for_key(ks.key);
            if candidates.is_empty() {
                continue;
            }
            match candidates.iter().find(|id| !id.is_generic()) {
                Some(specific) => {
                    ids.insert(specific.clone());
                }
                None => {
                    ids.insert(candidates.into_iter().next().expect("non-empty"));
                }
            }
        }
        ids
    }

    /// Marks every currently-held modifier keystate `spent` unless the
    /// output already had it pressed independently of this combo (spec.md
    /// §4.5): its eventual RELEASE must still propagate in that case.
    fn mark_modifiers_spent(&mut self, modifiers: &BTreeSet<ModifierId>) {
        let pressed_independently: Vec<Key> = modifiers
            .iter()
            .filter_map(|id| self.config.modifiers.keys_for(id))
            .flat_map(|keys| keys.keys())
            .filter(|key| self.output.is_mod_pressed(*key))
            .collect();

        for ks in self.keystates.pressed_mut() {
            if self.config.modifiers.is_modifier_key(ks.key) && !pressed_independently.contains(&ks.key) {
                ks.spent = true;
            }
        }
    }
}
