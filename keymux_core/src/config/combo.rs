//! Combos: the left-hand side of a binding and the atom the output
//! synthesizer emits.

use std::collections::BTreeSet;

use crate::config::modifier::ModifierId;
use crate::key::Key;

/// An unordered set of modifiers plus one ordinary key.
///
/// `BTreeSet`'s `Eq`/`Hash`/`Ord` impls already compare sets by their
/// (sorted) contents rather than by insertion order, which is exactly the
/// "hashable by (sorted-modifier-ids, key)" rule spec.md §3 calls for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Combo {
    pub modifiers: BTreeSet<ModifierId>,
    pub key: Key,
}

impl Combo {
    pub fn new(modifiers: impl IntoIterator<Item = ModifierId>, key: Key) -> Self {
        Self {
            modifiers: modifiers.into_iter().collect(),
            key,
        }
    }

    /// A combo with no modifiers at all — a bare key.
    pub fn bare(key: Key) -> Self {
        Self {
            modifiers: BTreeSet::new(),
            key,
        }
    }

    /// Expands a generic modifier (`CONTROL`) into the Cartesian product of
    /// its left/right specific variants, leaving already-specific and
    /// specific-only modifiers (`FN`, custom roles) untouched.
    ///
    /// A live "currently pressed" combo is always built from the specific
    /// key that was actually held (there is no ambiguity there: exactly one
    /// physical key was pressed), so a binding written with the generic
    /// role would otherwise never match anything. Keymaps expand their
    /// bindings through this once at construction time instead, the same
    /// way a Python predecessor's config loader did before compiling its
    /// keymap dict.
    pub fn expand_generic_variants(&self) -> Vec<Combo> {
        let mut variant_sets: Vec<Vec<ModifierId>> = vec![vec![]];
        for id in &self.modifiers {
            let branches = match id.specific_variants() {
                Some([left, right]) => vec![left, right],
                None => vec![id.clone()],
            };
            variant_sets = variant_sets
                .into_iter()
                .flat_map(|prefix| {
                    branches.iter().map(move |branch| {
                        let mut next = prefix.clone();
                        next.push(branch.clone());
                        next
                    })
                })
                .collect();
        }
        variant_sets
            .into_iter()
            .map(|mods| Combo::new(mods, self.key))
            .collect()
    }
}
