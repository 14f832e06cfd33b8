//! Caches the first output produced for a physical key so its kernel
//! REPEAT events can be replayed without re-running the matcher/executor
//! (spec.md §4.9).

use std::collections::HashMap;

use crate::engine::output::CachedOutput;
use crate::key::Key;

/// The sorted-by-code tuple of currently-pressed modifier keys at the
/// moment an entry was cached; replay is only valid while this still
/// matches, which is what makes repeats of bare keys (no modifiers held)
/// essentially free to validate.
pub type ModifierSnapshot = Vec<Key>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub output: CachedOutput,
    pub modifier_snapshot: ModifierSnapshot,
}

/// Keyed by the physical `inkey` that produced the cached output.
#[derive(Debug, Clone, Default)]
pub struct RepeatCache {
    entries: HashMap<Key, CacheEntry>,
}

impl RepeatCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn record(&mut self, inkey: Key, output: CachedOutput, modifier_snapshot: ModifierSnapshot) {
        self.entries.insert(
            inkey,
            CacheEntry {
                output,
                modifier_snapshot,
            },
        );
    }

    pub fn get(&self, inkey: Key) -> Option<&CacheEntry> {
        self.entries.get(&inkey)
    }

    /// Valid iff an entry exists for `inkey` and, when `modifier_snapshot`
    /// is supplied (the modifier-changed flag was raised since the last
    /// check), the snapshot still matches (spec.md §4.9).
    pub fn is_valid(&self, inkey: Key, current_snapshot: &[Key]) -> bool {
        self.entries
            .get(&inkey)
            .is_some_and(|entry| entry.modifier_snapshot == current_snapshot)
    }

    /// Evicted once the physical key is released (spec.md §4.9: the cache
    /// entry's lifetime matches the keystate's).
    pub fn forget(&mut self, inkey: Key) {
        self.entries.remove(&inkey);
    }

    /// Any different non-modifier PRESS, or entering a nested keymap,
    /// invalidates every entry (spec.md §4.9).
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }
}
