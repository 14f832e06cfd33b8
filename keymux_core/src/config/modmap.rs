//! Modmaps and multi-modmaps: single-layer key→key(s) translation,
//! optionally conditional on window context.

use std::collections::HashMap;

use crate::config::predicate::Condition;
use crate::key::Key;

#[derive(Debug, Clone)]
pub struct Modmap {
    pub name: String,
    pub mapping: HashMap<Key, Key>,
    pub when: Option<Condition>,
}

impl Modmap {
    pub fn unconditional(name: impl Into<String>, mapping: HashMap<Key, Key>) -> Self {
        Self {
            name: name.into(),
            mapping,
            when: None,
        }
    }

    pub fn conditional(
        name: impl Into<String>,
        mapping: HashMap<Key, Key>,
        when: Condition,
    ) -> Self {
        Self {
            name: name.into(),
            mapping,
            when: Some(when),
        }
    }
}

/// Tap-key / hold-key pair a dual-role key resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapHold {
    pub tap: Key,
    pub hold: Key,
}

#[derive(Debug, Clone)]
pub struct MultiModmap {
    pub name: String,
    pub mapping: HashMap<Key, TapHold>,
    pub when: Option<Condition>,
}

impl MultiModmap {
    pub fn unconditional(name: impl Into<String>, mapping: HashMap<Key, TapHold>) -> Self {
        Self {
            name: name.into(),
            mapping,
            when: None,
        }
    }

    pub fn conditional(
        name: impl Into<String>,
        mapping: HashMap<Key, TapHold>,
        when: Condition,
    ) -> Self {
        Self {
            name: name.into(),
            mapping,
            when: Some(when),
        }
    }
}
