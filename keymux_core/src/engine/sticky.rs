//! Sticky / auto-bind: installs at most one (input key → output key)
//! binding that survives past the combo/keymap execution that created it,
//! until the bound input key is physically released (spec.md §4.7).

use crate::key::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StickyBinding {
    pub inkey: Key,
    pub outkey: Key,
}

/// At most one binding active at a time (spec.md §8's sticky-uniqueness
/// invariant): a second `install` while one is active is refused and
/// has no effect.
#[derive(Debug, Clone, Default)]
pub struct StickyTable {
    active: Option<StickyBinding>,
}

impl StickyTable {
    pub fn new() -> Self {
        Self { active: None }
    }

    /// Returns `false` (a no-op) if a binding is already active.
    pub fn install(&mut self, inkey: Key, outkey: Key) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.active = Some(StickyBinding { inkey, outkey });
        true
    }

    pub fn active(&self) -> Option<StickyBinding> {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none()
    }

    pub fn clear(&mut self) {
        self.active = None;
    }

    /// Drops the binding for `inkey` if it is the one currently active,
    /// returning the output key that must now be released.
    pub fn release(&mut self, inkey: Key) -> Option<Key> {
        if self.active.map(|b| b.inkey) == Some(inkey) {
            let outkey = self.active.take().unwrap().outkey;
            Some(outkey)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_second_install_while_one_is_active_is_refused() {
        let mut table = StickyTable::new();
        assert!(table.install(Key::LEFTMETA, Key::LEFTCTRL));
        assert!(!table.install(Key::CAPSLOCK, Key::LEFTALT));
        assert_eq!(table.active().unwrap().outkey, Key::LEFTCTRL);
    }

    #[test]
    fn releasing_the_bound_inkey_drops_the_entry_and_reports_outkey() {
        let mut table = StickyTable::new();
        table.install(Key::LEFTMETA, Key::LEFTCTRL);
        assert_eq!(table.release(Key::LEFTMETA), Some(Key::LEFTCTRL));
        assert!(table.is_empty());
        assert_eq!(table.release(Key::LEFTMETA), None);
    }

    #[test]
    fn releasing_an_unrelated_key_is_a_no_op() {
        let mut table = StickyTable::new();
        table.install(Key::LEFTMETA, Key::LEFTCTRL);
        assert_eq!(table.release(Key::CAPSLOCK), None);
        assert!(!table.is_empty());
    }
}
