//! Resolves a physical key to its modmap/multi-modmap translation, and a
//! combo to the [`Command`] bound to it, honoring window-context
//! predicates and nested keymap sequences (spec.md §4.3, §4.4).

use std::sync::Arc;

use crate::config::{Combo, Command, Configuration, Keymap, Modmap, MultiModmap, TapHold};
use crate::context::WindowContext;
use crate::key::Key;

/// Every conditional modmap whose predicate holds on `window`, in
/// declaration order, is tried before the single unconditional default is
/// consulted as a fallback (spec.md §4.3 step 7: "start with the
/// unconditional default, then let a matching conditional override it" —
/// the default is a baseline a conditional overrides, not a shadowing
/// first entry; §7's "at most one unconditional modmap" invariant keeps
/// the fallback unambiguous).
pub fn resolve_modmap(modmaps: &[Modmap], window: &WindowContext, key: Key) -> Key {
    for modmap in modmaps {
        if modmap.when.is_none() || !applies(&modmap.when, window) {
            continue;
        }
        if let Some(&mapped) = modmap.mapping.get(&key) {
            return mapped;
        }
    }
    for modmap in modmaps {
        if modmap.when.is_some() {
            continue;
        }
        if let Some(&mapped) = modmap.mapping.get(&key) {
            return mapped;
        }
    }
    key
}

pub fn resolve_multi_modmap(
    multi_modmaps: &[MultiModmap],
    window: &WindowContext,
    key: Key,
) -> Option<TapHold> {
    for multi in multi_modmaps {
        if multi.when.is_none() || !applies(&multi.when, window) {
            continue;
        }
        if let Some(&tap_hold) = multi.mapping.get(&key) {
            return Some(tap_hold);
        }
    }
    for multi in multi_modmaps {
        if multi.when.is_some() {
            continue;
        }
        if let Some(&tap_hold) = multi.mapping.get(&key) {
            return Some(tap_hold);
        }
    }
    None
}

fn applies(when: &Option<crate::config::Condition>, window: &WindowContext) -> bool {
    match when {
        None => true,
        Some(cond) => cond.evaluate(window),
    }
}

/// The engine's "active keymap list" (spec.md §4.5): either empty
/// (top-level — every top-level keymap whose predicate currently holds is
/// a candidate) or a single nested keymap entered via `Command::Keymap`.
/// Entering a nested keymap *replaces* the active list, it does not stack
/// deeper — a nested keymap's own `Command::Keymap` bindings simply swap
/// in a new singleton list.
#[derive(Debug, Clone, Default)]
pub struct ActiveKeymaps {
    nested: Option<Arc<Keymap>>,
}

impl ActiveKeymaps {
    pub fn new() -> Self {
        Self { nested: None }
    }

    pub fn is_nested(&self) -> bool {
        self.nested.is_some()
    }

    pub fn enter(&mut self, keymap: Arc<Keymap>) {
        self.nested = Some(keymap);
    }

    pub fn reset(&mut self) {
        self.nested = None;
    }
}

/// Looks up the command bound to `combo` against the current active
/// keymap list: the single nested keymap if one is active, otherwise
/// every top-level keymap whose `when` holds on `window`, in declaration
/// order (spec.md §4.5's "first keymap that contains this combo wins").
pub fn find_command<'a>(
    combo: &Combo,
    active: &'a ActiveKeymaps,
    base_keymaps: &'a [Keymap],
    window: &WindowContext,
) -> Option<&'a Command> {
    if let Some(nested) = &active.nested {
        return nested.bindings.get(combo);
    }
    for keymap in base_keymaps {
        if !keymap.applies(window) {
            continue;
        }
        if let Some(cmd) = keymap.bindings.get(combo) {
            return Some(cmd);
        }
    }
    None
}

/// Convenience wrapper pulling modmaps/multi-modmaps/base keymaps out of a
/// [`Configuration`] for the common case of resolving against it directly.
pub fn resolve_modmap_from(config: &Configuration, window: &WindowContext, key: Key) -> Key {
    resolve_modmap(&config.modmaps, window, key)
}

pub fn resolve_multi_modmap_from(
    config: &Configuration,
    window: &WindowContext,
    key: Key,
) -> Option<TapHold> {
    resolve_multi_modmap(&config.multi_modmaps, window, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Condition, Pattern};
    use std::collections::HashMap;

    fn window(class: &str) -> WindowContext {
        WindowContext {
            wm_class: class.to_string(),
            wm_name: String::new(),
            error: false,
        }
    }

    #[test]
    fn conditional_modmap_wins_over_unconditional() {
        let mut cond_map = HashMap::new();
        cond_map.insert(Key::CAPSLOCK, Key::ESC);
        let mut uncond_map = HashMap::new();
        uncond_map.insert(Key::CAPSLOCK, Key::LEFTCTRL);
        let modmaps = vec![
            Modmap::conditional(
                "vim",
                cond_map,
                Condition::WmClassMatches(Pattern::literal("vim")),
            ),
            Modmap::unconditional("default", uncond_map),
        ];
        assert_eq!(resolve_modmap(&modmaps, &window("gvim"), Key::CAPSLOCK), Key::ESC);
        assert_eq!(
            resolve_modmap(&modmaps, &window("firefox"), Key::CAPSLOCK),
            Key::LEFTCTRL
        );
    }

    /// The canonical declaration order per spec.md §3 is default *first*:
    /// the unconditional modmap is a fallback a later conditional overrides,
    /// not a shadowing first-match entry.
    #[test]
    fn conditional_modmap_overrides_a_default_declared_before_it() {
        let mut uncond_map = HashMap::new();
        uncond_map.insert(Key::CAPSLOCK, Key::ESC);
        let mut cond_map = HashMap::new();
        cond_map.insert(Key::CAPSLOCK, Key::LEFTCTRL);
        let modmaps = vec![
            Modmap::unconditional("default", uncond_map),
            Modmap::conditional(
                "vim",
                cond_map,
                Condition::WmClassMatches(Pattern::literal("vim")),
            ),
        ];
        assert_eq!(
            resolve_modmap(&modmaps, &window("gvim"), Key::CAPSLOCK),
            Key::LEFTCTRL
        );
        assert_eq!(
            resolve_modmap(&modmaps, &window("firefox"), Key::CAPSLOCK),
            Key::ESC
        );
    }

    #[test]
    fn unmapped_key_passes_through_unchanged() {
        let modmaps = vec![Modmap::unconditional("default", HashMap::new())];
        assert_eq!(resolve_modmap(&modmaps, &window("x"), Key::A), Key::A);
    }

    #[test]
    fn a_nested_keymap_shadows_the_base_list_entirely() {
        let mut inner_bindings = HashMap::new();
        inner_bindings.insert(Combo::bare(Key::J), Command::key(Key::DOWN));
        let inner = Arc::new(Keymap::new("inner", inner_bindings));

        let mut outer_bindings = HashMap::new();
        outer_bindings.insert(Combo::bare(Key::J), Command::key(Key::LEFT));
        let outer = vec![Keymap::new("outer", outer_bindings)];

        let mut active = ActiveKeymaps::new();
        active.enter(inner);

        let window = window("any");
        let found = find_command(&Combo::bare(Key::J), &active, &outer, &window);
        assert!(matches!(found, Some(Command::Key(k)) if *k == Key::DOWN));
    }

    #[test]
    fn falls_back_to_base_keymaps_when_top_level() {
        let mut bindings = HashMap::new();
        bindings.insert(Combo::bare(Key::J), Command::key(Key::LEFT));
        let base = vec![Keymap::new("outer", bindings)];
        let active = ActiveKeymaps::new();
        let window = window("any");
        let found = find_command(&Combo::bare(Key::J), &active, &base, &window);
        assert!(matches!(found, Some(Command::Key(k)) if *k == Key::LEFT));
    }
}
