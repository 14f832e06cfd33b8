//! Per-physical-key state: created on PRESS, destroyed on RELEASE
//! (spec.md §3).

use std::collections::HashMap;

use crate::clock::Millis;
use crate::key::{Action, Key};

/// A deep-copied, one-level-flat snapshot of a [`Keystate`] taken just
/// before it was updated for a new event. Never itself carries a further
/// `prior`, so there is no chain to walk or alias to worry about (spec.md
/// §9: "Back-references are deep-copied snapshots, never aliases").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeystateSnapshot {
    pub inkey: Key,
    pub key: Key,
    pub multikey: Option<Key>,
    pub action: Action,
    pub time_ms: Millis,
    pub is_multi: bool,
    pub suspended: bool,
    pub exerted_on_output: bool,
    pub spent: bool,
    pub other_key_pressed_while_held: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keystate {
    /// The real key that was physically pressed.
    pub inkey: Key,
    /// The key after modmap resolution (tap-role if `is_multi`).
    pub key: Key,
    /// The hold-role key, if this is a dual-role (multipurpose) key.
    pub multikey: Option<Key>,
    pub action: Action,
    pub time_ms: Millis,
    pub is_multi: bool,
    pub suspended: bool,
    pub exerted_on_output: bool,
    pub spent: bool,
    pub other_key_pressed_while_held: bool,
    pub prior: Option<Box<KeystateSnapshot>>,
}

impl Keystate {
    pub fn new(inkey: Key, action: Action, time_ms: Millis) -> Self {
        Self {
            inkey,
            key: inkey,
            multikey: None,
            action,
            time_ms,
            is_multi: false,
            suspended: false,
            exerted_on_output: false,
            spent: false,
            other_key_pressed_while_held: false,
            prior: None,
        }
    }

    /// Whether `key`/`multikey` has already been resolved for this physical
    /// press (spec.md §4.3 step 7: modmaps only run "the first time seeing
    /// this physical press").
    pub fn is_resolved(&self) -> bool {
        self.key != self.inkey || self.is_multi
    }

    pub fn is_pressed(&self) -> bool {
        self.action.is_pressed()
    }

    fn snapshot(&self) -> KeystateSnapshot {
        KeystateSnapshot {
            inkey: self.inkey,
            key: self.key,
            multikey: self.multikey,
            action: self.action,
            time_ms: self.time_ms,
            is_multi: self.is_multi,
            suspended: self.suspended,
            exerted_on_output: self.exerted_on_output,
            spent: self.spent,
            other_key_pressed_while_held: self.other_key_pressed_while_held,
        }
    }

    /// Refreshes `action`/`time_ms` for a new event on an already-tracked
    /// key, stashing the pre-update state as `prior`.
    fn refresh(&mut self, action: Action, time_ms: Millis) {
        self.prior = Some(Box::new(self.snapshot()));
        self.action = action;
        self.time_ms = time_ms;
    }

    /// A multipurpose key released before timeout with no other key
    /// pressed while held: it was just a tap.
    pub fn resolve_as_momentary(&mut self) {
        self.is_multi = false;
        self.multikey = None;
    }

    /// A multipurpose key resolved as its hold-role modifier.
    pub fn resolve_as_modifier(&mut self) {
        if let Some(hold) = self.multikey {
            self.key = hold;
        }
        self.is_multi = false;
        self.multikey = None;
    }
}

/// The live table of currently-held keys, keyed by `inkey` (spec.md §3: "A
/// Keystate exists iff its `inkey` is currently held").
#[derive(Debug, Clone, Default)]
pub struct KeystateTable {
    states: HashMap<Key, Keystate>,
}

impl KeystateTable {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
        }
    }

    /// Finds the existing keystate for `inkey`, refreshing it for this
    /// event, or creates a fresh one. Mirrors
    /// `xwaykeyz.transform.find_keystate_or_new`.
    pub fn find_or_new(&mut self, inkey: Key, action: Action, time_ms: Millis) -> &mut Keystate {
        self.states
            .entry(inkey)
            .and_modify(|ks| ks.refresh(action, time_ms))
            .or_insert_with(|| Keystate::new(inkey, action, time_ms))
    }

    pub fn get(&self, inkey: Key) -> Option<&Keystate> {
        self.states.get(&inkey)
    }

    pub fn get_mut(&mut self, inkey: Key) -> Option<&mut Keystate> {
        self.states.get_mut(&inkey)
    }

    pub fn remove(&mut self, inkey: Key) -> Option<Keystate> {
        self.states.remove(&inkey)
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keystate> {
        self.states.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Keystate> {
        self.states.values_mut()
    }

    pub fn pressed(&self) -> impl Iterator<Item = &Keystate> {
        self.states.values().filter(|ks| ks.is_pressed())
    }

    pub fn pressed_mut(&mut self) -> impl Iterator<Item = &mut Keystate> {
        self.states.values_mut().filter(|ks| ks.is_pressed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_or_new_creates_then_refreshes() {
        let mut table = KeystateTable::new();
        table.find_or_new(Key::A, Action::Press, 0);
        assert_eq!(table.get(Key::A).unwrap().action, Action::Press);

        let ks = table.find_or_new(Key::A, Action::Repeat, 10);
        assert_eq!(ks.action, Action::Repeat);
        assert_eq!(ks.time_ms, 10);
        assert!(ks.prior.is_some());
        assert_eq!(ks.prior.as_ref().unwrap().action, Action::Press);
    }

    #[test]
    fn remove_destroys_the_record() {
        let mut table = KeystateTable::new();
        table.find_or_new(Key::A, Action::Press, 0);
        assert!(table.remove(Key::A).is_some());
        assert!(table.get(Key::A).is_none());
    }

    #[test]
    fn resolve_as_modifier_swaps_in_the_hold_role() {
        let mut ks = Keystate::new(Key::CAPSLOCK, Action::Press, 0);
        ks.is_multi = true;
        ks.multikey = Some(Key::LEFTCTRL);
        ks.resolve_as_modifier();
        assert_eq!(ks.key, Key::LEFTCTRL);
        assert!(!ks.is_multi);
    }
}
