//! Modifiers: named roles that claim one or two keys.
//!
//! A "generic" modifier (CONTROL, ALT, SHIFT, META) claims both the left
//! and right physical key of a pair; a "specific" modifier (LCTRL, RCTRL,
//! ...) claims exactly one. User-defined modifiers may claim any single key
//! (e.g. binding CapsLock as a custom "HYPER" role). `ModifierTable` is the
//! config-time registry the engine consults to decide whether a key is a
//! modifier at all, and to resolve a [`ModifierId`] back to the key(s) it
//! needs pressed.

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};
use crate::key::Key;

/// Stable identity of a modifier role, used as the hash/sort key inside a
/// [`Combo`](crate::config::combo::Combo).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModifierId {
    Control,
    Alt,
    Shift,
    Meta,
    Fn,
    LeftControl,
    RightControl,
    LeftAlt,
    RightAlt,
    LeftShift,
    RightShift,
    LeftMeta,
    RightMeta,
    /// A user-defined modifier, identified by its configured name.
    Custom(String),
}

impl ModifierId {
    /// The generic role this specific variant belongs to, if any.
    pub fn generic_counterpart(&self) -> Option<ModifierId> {
        use ModifierId::*;
        match self {
            LeftControl | RightControl => Some(Control),
            LeftAlt | RightAlt => Some(Alt),
            LeftShift | RightShift => Some(Shift),
            LeftMeta | RightMeta => Some(Meta),
            _ => None,
        }
    }

    pub fn is_generic(&self) -> bool {
        use ModifierId::*;
        matches!(self, Control | Alt | Shift | Meta)
    }

    /// The `[left, right]` specific ids a generic role expands to, if any.
    pub fn specific_variants(&self) -> Option<[ModifierId; 2]> {
        use ModifierId::*;
        match self {
            Control => Some([LeftControl, RightControl]),
            Alt => Some([LeftAlt, RightAlt]),
            Shift => Some([LeftShift, RightShift]),
            Meta => Some([LeftMeta, RightMeta]),
            _ => None,
        }
    }
}

/// The key(s) a [`Modifier`] claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierKeys {
    /// A generic modifier's left+right pair.
    Generic(Key, Key),
    /// A specific (or user-defined) modifier's single key.
    Specific(Key),
}

impl ModifierKeys {
    pub fn contains(&self, key: Key) -> bool {
        match self {
            ModifierKeys::Generic(l, r) => *l == key || *r == key,
            ModifierKeys::Specific(k) => *k == key,
        }
    }

    pub fn keys(&self) -> Vec<Key> {
        match self {
            ModifierKeys::Generic(l, r) => vec![*l, *r],
            ModifierKeys::Specific(k) => vec![*k],
        }
    }

    /// One representative key to press when this modifier is requested
    /// generically (the left one, by convention).
    pub fn representative(&self) -> Key {
        match self {
            ModifierKeys::Generic(l, _) => *l,
            ModifierKeys::Specific(k) => *k,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modifier {
    pub id: ModifierId,
    pub keys: ModifierKeys,
}

impl Modifier {
    pub fn is_specific(&self) -> bool {
        matches!(self.keys, ModifierKeys::Specific(_))
    }
}

/// Config-time registry of every modifier the engine knows about.
#[derive(Debug, Clone)]
pub struct ModifierTable {
    modifiers: Vec<Modifier>,
    by_key: BTreeMap<Key, Vec<usize>>,
}

impl ModifierTable {
    /// An empty table with no modifiers registered at all.
    pub fn empty() -> Self {
        Self {
            modifiers: Vec::new(),
            by_key: BTreeMap::new(),
        }
    }

    /// The standard CONTROL/ALT/SHIFT/META generic+specific modifiers plus
    /// FN, matching `xwaykeyz.models.modifier`'s built-in registrations.
    pub fn with_defaults() -> Self {
        let mut table = Self::empty();
        table.register_pair(
            ModifierId::Control,
            ModifierId::LeftControl,
            ModifierId::RightControl,
            Key::LEFTCTRL,
            Key::RIGHTCTRL,
        );
        table.register_pair(
            ModifierId::Alt,
            ModifierId::LeftAlt,
            ModifierId::RightAlt,
            Key::LEFTALT,
            Key::RIGHTALT,
        );
        table.register_pair(
            ModifierId::Shift,
            ModifierId::LeftShift,
            ModifierId::RightShift,
            Key::LEFTSHIFT,
            Key::RIGHTSHIFT,
        );
        table.register_pair(
            ModifierId::Meta,
            ModifierId::LeftMeta,
            ModifierId::RightMeta,
            Key::LEFTMETA,
            Key::RIGHTMETA,
        );
        table.push(Modifier {
            id: ModifierId::Fn,
            keys: ModifierKeys::Specific(Key::FN),
        });
        table
    }

    fn register_pair(
        &mut self,
        generic: ModifierId,
        left: ModifierId,
        right: ModifierId,
        left_key: Key,
        right_key: Key,
    ) {
        self.push(Modifier {
            id: left,
            keys: ModifierKeys::Specific(left_key),
        });
        self.push(Modifier {
            id: right,
            keys: ModifierKeys::Specific(right_key),
        });
        self.push(Modifier {
            id: generic,
            keys: ModifierKeys::Generic(left_key, right_key),
        });
    }

    fn push(&mut self, modifier: Modifier) {
        let idx = self.modifiers.len();
        for key in modifier.keys.keys() {
            self.by_key.entry(key).or_default().push(idx);
        }
        self.modifiers.push(modifier);
    }

    /// Registers a user-defined modifier claiming a single key. Rejects
    /// identifiers that are not `UPPER_SNAKE_CASE`, matching the original
    /// DSL's `validate_new_key_name`.
    pub fn register_custom(&mut self, name: &str, key: Key) -> CoreResult<()> {
        if name.is_empty()
            || !name
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_uppercase() || c == '_')
            || !name
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(CoreError::InvalidModifierName(name.to_string()));
        }
        self.push(Modifier {
            id: ModifierId::Custom(name.to_string()),
            keys: ModifierKeys::Specific(key),
        });
        Ok(())
    }

    /// True iff at least one modifier claims `key`.
    pub fn is_modifier_key(&self, key: Key) -> bool {
        self.by_key.contains_key(&key)
    }

    /// Every modifier id that claims `key`, in registration order.
    pub fn modifiers_for_key(&self, key: Key) -> Vec<ModifierId> {
        self.by_key
            .get(&key)
            .map(|idxs| idxs.iter().map(|&i| self.modifiers[i].id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn keys_for(&self, id: &ModifierId) -> Option<ModifierKeys> {
        self.modifiers
            .iter()
            .find(|m| &m.id == id)
            .map(|m| m.keys)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Modifier> {
        self.modifiers.iter()
    }
}

impl Default for ModifierTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_claims_both_shift_keys_as_modifiers() {
        let table = ModifierTable::with_defaults();
        assert!(table.is_modifier_key(Key::LEFTSHIFT));
        assert!(table.is_modifier_key(Key::RIGHTSHIFT));
        assert!(!table.is_modifier_key(Key::A));
    }

    #[test]
    fn left_shift_is_claimed_by_both_specific_and_generic_ids() {
        let table = ModifierTable::with_defaults();
        let ids = table.modifiers_for_key(Key::LEFTSHIFT);
        assert!(ids.contains(&ModifierId::LeftShift));
        assert!(ids.contains(&ModifierId::Shift));
    }

    #[test]
    fn custom_modifier_rejects_lowercase_names() {
        let mut table = ModifierTable::empty();
        assert!(table.register_custom("hyper", Key::CAPSLOCK).is_err());
        assert!(table.register_custom("HYPER", Key::CAPSLOCK).is_ok());
    }

    #[test]
    fn generic_reports_its_specific_variants() {
        assert_eq!(
            ModifierId::Shift.specific_variants(),
            Some([ModifierId::LeftShift, ModifierId::RightShift])
        );
        assert_eq!(ModifierId::LeftShift.specific_variants(), None);
        assert_eq!(ModifierId::Fn.specific_variants(), None);
    }

    #[test]
    fn specific_reports_generic_counterpart() {
        assert_eq!(
            ModifierId::LeftControl.generic_counterpart(),
            Some(ModifierId::Control)
        );
        assert_eq!(ModifierId::Control.generic_counterpart(), None);
    }
}
