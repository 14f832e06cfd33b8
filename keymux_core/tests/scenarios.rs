//! End-to-end coverage for the six worked scenarios and the quantified
//! invariants: modmap round-trips, conditional keymap dispatch, event-based
//! dual-role resolution, sticky auto-bind, and repeat-cache fidelity.
//!
//! Every scenario drives a fresh [`Engine`] through [`Engine::on_event`]
//! with a recording [`KeySink`] and a fixed window-context fake, then
//! compares the recorded key/action stream against the exact sequence the
//! scenario calls for. No assertion here depends on timers firing; where a
//! scenario's resolution is timeout-driven elsewhere, these tests exercise
//! only the event-based paths.

use std::collections::HashMap;
use std::sync::Arc;

use keymux_core::clock::VirtualClock;
use keymux_core::config::{
    Combo, Command, Condition, Configuration, Hint, Keymap, Modmap, ModifierId, MultiModmap,
    Pattern, TapHold, Throttles,
};
use keymux_core::{Action, Engine, InputEvent, Key, KeySink, WindowContext, WindowContextProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recorded {
    Key(Key, Action),
    Sync,
}

#[derive(Default)]
struct RecordingSink {
    events: Vec<Recorded>,
    sleeps_ms: Vec<u64>,
}

impl KeySink for RecordingSink {
    fn write_key(&mut self, key: Key, action: Action) {
        self.events.push(Recorded::Key(key, action));
    }

    fn sync(&mut self) {
        self.events.push(Recorded::Sync);
    }

    fn sleep_ms(&mut self, ms: u64) {
        self.sleeps_ms.push(ms);
    }
}

impl RecordingSink {
    /// The key/action pairs written, with `sync()` markers dropped: what
    /// the scenarios describe as "output".
    fn stream(&self) -> Vec<(Key, Action)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Recorded::Key(k, a) => Some((*k, *a)),
                Recorded::Sync => None,
            })
            .collect()
    }

    /// Sums and clears the recorded `sleep_ms` calls, so a test can tell a
    /// replayed-from-cache output (configured throttles) apart from a
    /// freshly reprocessed one (always the minimum throttles) by how long
    /// the sink was asked to sleep for the events since the last drain.
    fn drain_sleep_total_ms(&mut self) -> u64 {
        self.sleeps_ms.drain(..).sum()
    }
}

/// A window-context fake that always reports the same fixed, non-error
/// context — unlike [`keymux_core::context::NullWindowContextProvider`],
/// which always reports an error and so is useless for exercising
/// conditional modmaps/keymaps.
struct FixedWindow(WindowContext);

impl FixedWindow {
    fn class(wm_class: &str) -> Self {
        Self(WindowContext {
            wm_class: wm_class.to_string(),
            wm_name: String::new(),
            error: false,
        })
    }
}

impl WindowContextProvider for FixedWindow {
    fn get_window_context(&mut self) -> WindowContext {
        self.0.clone()
    }
}

fn press(key: Key) -> InputEvent {
    InputEvent::key(key, Action::Press)
}
fn release(key: Key) -> InputEvent {
    InputEvent::key(key, Action::Release)
}
fn repeat(key: Key) -> InputEvent {
    InputEvent::key(key, Action::Repeat)
}

fn run(config: Configuration, window: &mut FixedWindow, events: &[InputEvent]) -> Vec<(Key, Action)> {
    let mut engine = Engine::new(Arc::new(config), VirtualClock::new());
    let mut sink = RecordingSink::default();
    for event in events {
        engine.on_event(*event, window, &mut sink);
    }
    sink.stream()
}

/// S1: a plain modmap round-trips a held key under its new identity.
#[test]
fn s1_modmap_round_trips_lmeta_as_lctrl() {
    let mut config = Configuration::default();
    config.modmaps.push(Modmap::unconditional(
        "lmeta_as_ctrl",
        HashMap::from([(Key::LEFTMETA, Key::LEFTCTRL)]),
    ));
    let mut window = FixedWindow::class("Anything");

    let out = run(
        config,
        &mut window,
        &[
            press(Key::LEFTMETA),
            press(Key::F),
            release(Key::F),
            release(Key::LEFTMETA),
        ],
    );

    assert_eq!(
        out,
        vec![
            (Key::LEFTCTRL, Action::Press),
            (Key::F, Action::Press),
            (Key::F, Action::Release),
            (Key::LEFTCTRL, Action::Release),
        ]
    );
}

fn firefox_chord_keymap() -> Keymap {
    Keymap::conditional(
        "firefox_chords",
        Condition::WmClassMatches(Pattern::literal("Firefox")),
        HashMap::from([
            (
                Combo::new([ModifierId::Control, ModifierId::Alt], Key::J),
                Command::combo([ModifierId::Control], Key::TAB),
            ),
            (
                Combo::new([ModifierId::Control, ModifierId::Alt], Key::K),
                Command::combo([ModifierId::Control, ModifierId::Shift], Key::TAB),
            ),
        ]),
    )
}

/// S2: a conditional keymap rewrites Ctrl+Alt+J to Ctrl+Tab in Firefox,
/// consuming the modifiers entirely (their own releases emit nothing).
#[test]
fn s2_conditional_keymap_rewrites_ctrl_alt_j_to_ctrl_tab() {
    let mut config = Configuration::default();
    config.keymaps.push(firefox_chord_keymap());
    let mut window = FixedWindow::class("Firefox");

    let out = run(
        config,
        &mut window,
        &[
            press(Key::LEFTCTRL),
            press(Key::LEFTALT),
            press(Key::J),
            release(Key::J),
            release(Key::LEFTALT),
            release(Key::LEFTCTRL),
        ],
    );

    assert_eq!(
        out,
        vec![
            (Key::LEFTCTRL, Action::Press),
            (Key::TAB, Action::Press),
            (Key::TAB, Action::Release),
            (Key::LEFTCTRL, Action::Release),
        ]
    );
}

/// S3: with the chord modifiers still held from a prior match, a second
/// chord (Ctrl+Alt+K) resolves independently and lifts only what it added.
#[test]
fn s3_second_chord_under_the_same_held_modifiers_resolves_independently() {
    let mut config = Configuration::default();
    config.keymaps.push(firefox_chord_keymap());
    let mut window = FixedWindow::class("Firefox");

    let out = run(
        config,
        &mut window,
        &[
            press(Key::LEFTCTRL),
            press(Key::LEFTALT),
            press(Key::J),
            release(Key::J),
            press(Key::K),
            release(Key::K),
            release(Key::LEFTALT),
            release(Key::LEFTCTRL),
        ],
    );

    assert_eq!(
        out,
        vec![
            // J's chord.
            (Key::LEFTCTRL, Action::Press),
            (Key::TAB, Action::Press),
            (Key::TAB, Action::Release),
            (Key::LEFTCTRL, Action::Release),
            // K's chord: only the modifiers it actually needs.
            (Key::LEFTCTRL, Action::Press),
            (Key::LEFTSHIFT, Action::Press),
            (Key::TAB, Action::Press),
            (Key::TAB, Action::Release),
            (Key::LEFTSHIFT, Action::Release),
            (Key::LEFTCTRL, Action::Release),
        ]
    );
}

fn conditional_dual_role_multimap() -> MultiModmap {
    MultiModmap::conditional(
        "firefox_dual_role",
        Condition::WmClassMatches(Pattern::literal("Firefox")),
        HashMap::from([
            (
                Key::A,
                TapHold {
                    tap: Key::A,
                    hold: Key::LEFTCTRL,
                },
            ),
            (
                Key::B,
                TapHold {
                    tap: Key::B,
                    hold: Key::LEFTALT,
                },
            ),
        ]),
    )
}

fn s4_config() -> Configuration {
    let mut config = Configuration::default();
    config.multi_modmaps.push(conditional_dual_role_multimap());
    config
        .modmaps
        .push(Modmap::unconditional("c_as_delete", HashMap::from([(Key::C, Key::DELETE)])));
    config
}

fn s4_events() -> Vec<InputEvent> {
    vec![
        press(Key::A),
        press(Key::B),
        press(Key::C),
        release(Key::C),
        release(Key::B),
        release(Key::A),
    ]
}

/// S4, Firefox branch: A and B resolve to their hold role the instant C's
/// ordinary PRESS arrives, ahead of any timeout (spec.md §4.4's
/// event-based dual-role resolution).
#[test]
fn s4_dual_role_keys_resolve_as_modifiers_on_other_key_press_in_firefox() {
    let mut window = FixedWindow::class("Firefox");
    let out = run(s4_config(), &mut window, &s4_events());

    assert_eq!(
        out,
        vec![
            (Key::LEFTCTRL, Action::Press),
            (Key::LEFTALT, Action::Press),
            (Key::DELETE, Action::Press),
            (Key::DELETE, Action::Release),
            (Key::LEFTALT, Action::Release),
            (Key::LEFTCTRL, Action::Release),
        ]
    );
}

/// S4, non-matching window: the conditional multi-modmap never applies, so
/// A and B pass through under their own identity while C still remaps
/// (its modmap is unconditional).
#[test]
fn s4_dual_role_multimap_does_not_apply_outside_firefox() {
    let mut window = FixedWindow::class("Terminal");
    let out = run(s4_config(), &mut window, &s4_events());

    assert_eq!(
        out,
        vec![
            (Key::A, Action::Press),
            (Key::B, Action::Press),
            (Key::DELETE, Action::Press),
            (Key::DELETE, Action::Release),
            (Key::B, Action::Release),
            (Key::A, Action::Release),
        ]
    );
}

/// S5: LEFTMETA auto-binds Ctrl+Space as a sticky chord. The sticky input
/// key stays silently held afterwards — resumed by a later key press, but
/// never re-asserted under its own identity — and is only ever lifted by
/// its own release, which instead lifts the sticky output key.
#[test]
fn s5_sticky_bind_keeps_a_single_ctrl_press_across_the_whole_gesture() {
    let mut config = Configuration::default();
    config.keymaps.push(Keymap::new(
        "meta_space_bind",
        HashMap::from([(
            Combo::new([ModifierId::Meta], Key::SPACE),
            Command::list([Command::Hint(Hint::Bind), Command::combo([ModifierId::Control], Key::SPACE)]),
        )]),
    ));
    let mut window = FixedWindow::class("Anything");

    let out = run(
        config,
        &mut window,
        &[
            press(Key::LEFTMETA),
            press(Key::SPACE),
            release(Key::SPACE),
            press(Key::F),
            release(Key::F),
            release(Key::LEFTMETA),
        ],
    );

    assert_eq!(
        out,
        vec![
            (Key::LEFTCTRL, Action::Press),
            (Key::SPACE, Action::Press),
            (Key::SPACE, Action::Release),
            (Key::F, Action::Press),
            (Key::F, Action::Release),
            (Key::LEFTCTRL, Action::Release),
        ]
    );
}

/// S6: a plain modmap's repeat traffic replays from the cache — no
/// modifier is ever pressed twice, and the physical CapsLock release lifts
/// its mapped identity exactly once.
#[test]
fn s6_repeat_cache_replays_plain_modmap_output_without_rematching() {
    let mut config = Configuration::default();
    config.modmaps.push(Modmap::unconditional(
        "caps_as_ctrl",
        HashMap::from([(Key::CAPSLOCK, Key::LEFTCTRL)]),
    ));
    let mut window = FixedWindow::class("Anything");

    let out = run(
        config,
        &mut window,
        &[
            press(Key::CAPSLOCK),
            press(Key::F),
            repeat(Key::F),
            repeat(Key::F),
            release(Key::F),
            release(Key::CAPSLOCK),
        ],
    );

    assert_eq!(
        out,
        vec![
            (Key::LEFTCTRL, Action::Press),
            (Key::F, Action::Press),
            (Key::F, Action::Repeat),
            (Key::F, Action::Repeat),
            (Key::F, Action::Release),
            (Key::LEFTCTRL, Action::Release),
        ]
    );
}

/// §4.5: resolving a nested keymap's leaf combo clears the active keymap
/// list back to top-level, so the very next keystroke is matched against
/// the top-level keymaps again rather than staying trapped in the
/// sequence (a prior build of this engine never cleared it on a match).
#[test]
fn nested_keymap_sequence_returns_to_top_level_after_its_leaf_combo() {
    let mut inner_bindings = HashMap::new();
    inner_bindings.insert(Combo::bare(Key::J), Command::key(Key::DOWN));
    let inner = Keymap::new("inner", inner_bindings);

    let mut leader_bindings = HashMap::new();
    leader_bindings.insert(Combo::bare(Key::G), Command::Keymap(Arc::new(inner)));

    let mut config = Configuration::default();
    config.keymaps.push(Keymap::new("leader", leader_bindings));
    let mut window = FixedWindow::class("Anything");

    let out = run(
        config,
        &mut window,
        &[
            press(Key::G),
            release(Key::G),
            press(Key::J),
            release(Key::J),
            // Q matches no top-level keymap; if the engine were still
            // stuck in the "inner" nested list it would be silently
            // discarded (spec.md §4.5's nested fall-through) instead of
            // passing through.
            press(Key::Q),
            release(Key::Q),
        ],
    );

    assert_eq!(
        out,
        vec![
            (Key::DOWN, Action::Press),
            (Key::DOWN, Action::Release),
            (Key::Q, Action::Press),
            (Key::Q, Action::Release),
        ]
    );
}

/// §8 invariant: shutdown always releases every key the output believes is
/// asserted, even mid-gesture with a sticky binding and held modifiers.
#[test]
fn shutdown_mid_gesture_releases_every_asserted_key() {
    let mut config = Configuration::default();
    config.keymaps.push(Keymap::new(
        "meta_space_bind",
        HashMap::from([(
            Combo::new([ModifierId::Meta], Key::SPACE),
            Command::list([Command::Hint(Hint::Bind), Command::combo([ModifierId::Control], Key::SPACE)]),
        )]),
    ));
    let mut window = FixedWindow::class("Anything");
    let mut engine = Engine::new(Arc::new(config), VirtualClock::new());
    let mut sink = RecordingSink::default();

    for event in [press(Key::LEFTMETA), press(Key::SPACE), release(Key::SPACE), press(Key::F)] {
        engine.on_event(event, &mut window, &mut sink);
    }
    sink.events.clear();

    engine.shutdown(&mut sink);

    let released: Vec<Key> = sink
        .stream()
        .into_iter()
        .filter(|(_, action)| *action == Action::Release)
        .map(|(key, _)| key)
        .collect();
    assert!(released.contains(&Key::LEFTCTRL));
    assert!(released.contains(&Key::F));

    let d = engine.diagnostics();
    assert_eq!(d.pressed_keys, 0);
    assert_eq!(d.pressed_modifier_keys, 0);
    assert!(d.sticky_binding.is_none());
    assert!(!d.suspended);
}

/// §8 invariant: a plain passthrough key (no modmap, no keymap match)
/// crosses the engine untouched.
#[test]
fn unmapped_key_passes_through_untouched() {
    let mut config = Configuration::default();
    let mut window = FixedWindow::class("Anything");

    let out = run(config.clone(), &mut window, &[press(Key::Q), release(Key::Q)]);
    assert_eq!(out, vec![(Key::Q, Action::Press), (Key::Q, Action::Release)]);
    config.validate().expect("default config has no conflicting modmaps");
}

/// A dual-role key physically bound to LEFTSHIFT itself (e.g. "tap for
/// Escape, hold for Shift") — the exact shape that exposes the carve-out's
/// "is this key itself Shift" vs. "is some *other* held key Shift" mixup.
fn dual_role_shift() -> MultiModmap {
    MultiModmap::unconditional(
        "dual_role_shift",
        HashMap::from([(
            Key::LEFTSHIFT,
            TapHold {
                tap: Key::ESC,
                hold: Key::LEFTSHIFT,
            },
        )]),
    )
}

/// An ordinary dual-role key uninvolved with Shift at all, for the genuine
/// two-key "held alongside Shift" carve-out.
fn dual_role_capslock() -> MultiModmap {
    MultiModmap::unconditional(
        "dual_role_capslock",
        HashMap::from([(
            Key::CAPSLOCK,
            TapHold {
                tap: Key::ESC,
                hold: Key::LEFTCTRL,
            },
        )]),
    )
}

/// spec.md §8's named boundary behavior: holding a dual-role key alone
/// past `timeouts.multipurpose` resolves as hold, even when the key
/// itself happens to be bound on LEFTSHIFT — the carve-out is about a
/// *second*, separate Shift key being held, not this key's own identity.
#[test]
fn dual_role_shift_key_held_alone_past_timeout_resolves_as_hold() {
    let mut config = Configuration::default();
    config.multi_modmaps.push(dual_role_shift());
    let mut window = FixedWindow::class("Anything");
    let mut engine = Engine::new(Arc::new(config), VirtualClock::new());
    let mut sink = RecordingSink::default();

    engine.on_event(press(Key::LEFTSHIFT), &mut window, &mut sink);
    engine.clock().advance(2000);
    engine.poll_timers(&mut sink);

    assert_eq!(sink.stream(), vec![(Key::LEFTSHIFT, Action::Press)]);
}

/// spec.md §4.4/§9's "shift+shift" carve-out: a dual-role key held
/// alongside exactly one other held key, itself Shift, while being the
/// last key physically pressed, stays momentary (tap) instead of
/// resolving to its hold role.
#[test]
fn dual_role_key_with_only_shift_also_held_and_pressed_last_stays_momentary() {
    let mut config = Configuration::default();
    config.multi_modmaps.push(dual_role_capslock());
    let mut window = FixedWindow::class("Anything");
    let mut engine = Engine::new(Arc::new(config), VirtualClock::new());
    let mut sink = RecordingSink::default();

    engine.on_event(press(Key::RIGHTSHIFT), &mut window, &mut sink);
    engine.on_event(press(Key::CAPSLOCK), &mut window, &mut sink);
    engine.clock().advance(2000);
    engine.poll_timers(&mut sink);

    let stream = sink.stream();
    assert!(stream.contains(&(Key::ESC, Action::Press)));
    assert!(!stream.iter().any(|&(key, _)| key == Key::LEFTCTRL));
}

/// Same as above but with a third key also held: "exactly one other key"
/// no longer holds, so the carve-out does not apply and the dual-role key
/// resolves to its hold role as usual.
#[test]
fn dual_role_key_with_shift_and_a_third_key_held_does_not_get_the_carve_out() {
    let mut config = Configuration::default();
    config.multi_modmaps.push(dual_role_capslock());
    let mut window = FixedWindow::class("Anything");
    let mut engine = Engine::new(Arc::new(config), VirtualClock::new());
    let mut sink = RecordingSink::default();

    engine.on_event(press(Key::RIGHTSHIFT), &mut window, &mut sink);
    engine.on_event(press(Key::Q), &mut window, &mut sink);
    engine.on_event(press(Key::CAPSLOCK), &mut window, &mut sink);
    engine.clock().advance(2000);
    engine.poll_timers(&mut sink);

    assert!(sink.stream().contains(&(Key::LEFTCTRL, Action::Press)));
}

/// An unrelated, non-matching non-modifier PRESS must invalidate the
/// repeat cache for every other key (spec.md §4.9's unconditional
/// invalidation rule), not only a PRESS that happens to match a keymap
/// rule. Distinguished here by throttle: a cache replay goes through
/// [`keymux_core::config::Throttles`] as configured, while a freshly
/// reprocessed passthrough repeat always uses the engine's minimum
/// throttles — so a stale cache entry surviving the intervening press
/// shows up as the wrong (larger) total sleep time on the second repeat.
#[test]
fn unrelated_unmatched_press_invalidates_the_repeat_cache() {
    let mut config = Configuration::default();
    config.throttles = Throttles::new(5, 5);
    let mut window = FixedWindow::class("Anything");
    let mut engine = Engine::new(Arc::new(config), VirtualClock::new());
    let mut sink = RecordingSink::default();

    engine.on_event(press(Key::F), &mut window, &mut sink);
    sink.drain_sleep_total_ms();

    // First repeat populates the cache from the PRESS's output and replays
    // it, at the configured (non-minimum) throttle.
    engine.on_event(repeat(Key::F), &mut window, &mut sink);
    let first_repeat_sleep = sink.drain_sleep_total_ms();
    assert_eq!(first_repeat_sleep, 10);

    // G matches no modmap or keymap binding: plain passthrough fallthrough.
    engine.on_event(press(Key::G), &mut window, &mut sink);
    engine.on_event(release(Key::G), &mut window, &mut sink);
    sink.drain_sleep_total_ms();

    // The cache entry for F must have been invalidated by G's press, so
    // this repeat is reprocessed from scratch at the minimum throttle
    // (1ms pre + 2ms post), not replayed at the configured 5ms + 5ms.
    engine.on_event(repeat(Key::F), &mut window, &mut sink);
    let second_repeat_sleep = sink.drain_sleep_total_ms();
    assert_eq!(second_repeat_sleep, 3);

    assert_eq!(sink.stream().last(), Some(&(Key::F, Action::Repeat)));
}
