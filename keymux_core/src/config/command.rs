//! Commands (the right-hand side of a binding) and keymaps.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::combo::Combo;
use crate::config::predicate::Condition;
use crate::context::KeyContext;
use crate::key::Key;

/// Hint sentinels a command can carry, consumed by the executor (spec.md
/// §4.6) rather than emitted to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    EscapeNextKey,
    EscapeNextCombo,
    IgnoreKey,
    Bind,
}

/// An opaque user-supplied function. Config authors choose the `Unit` form
/// when they don't need the window context and the `Context` form when
/// they do, matching spec.md §3's "invoked with or without a context
/// argument."
#[derive(Clone)]
pub enum UserFunction {
    Unit(Arc<dyn Fn() -> Command + Send + Sync>),
    Context(Arc<dyn Fn(&KeyContext) -> Command + Send + Sync>),
}

impl UserFunction {
    pub fn call(&self, ctx: &KeyContext) -> Command {
        match self {
            UserFunction::Unit(f) => f(),
            UserFunction::Context(f) => f(ctx),
        }
    }
}

impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserFunction(..)")
    }
}

/// The right-hand side of a binding: a combo to emit, a bare key, a
/// user function, a nested keymap, a hint, a list of any of these, or a
/// no-op.
#[derive(Debug, Clone)]
pub enum Command {
    Combo(Combo),
    Key(Key),
    Func(UserFunction),
    Keymap(Arc<Keymap>),
    Hint(Hint),
    List(Vec<Command>),
    /// Explicit "do nothing" sentinel a user function may return.
    Noop,
}

impl Command {
    pub fn key(key: Key) -> Self {
        Command::Key(key)
    }

    pub fn combo(modifiers: impl IntoIterator<Item = crate::config::modifier::ModifierId>, key: Key) -> Self {
        Command::Combo(Combo::new(modifiers, key))
    }

    pub fn list(cmds: impl IntoIterator<Item = Command>) -> Self {
        Command::List(cmds.into_iter().collect())
    }
}

/// A named, optionally-conditional set of combo bindings. Nested keymaps
/// (reachable as `Command::Keymap`) model multi-key combo sequences: press
/// the leading combo, and the engine waits for the next combo within the
/// sub-keymap (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct Keymap {
    pub name: String,
    pub when: Option<Condition>,
    pub bindings: HashMap<Combo, Command>,
    /// A command to run immediately upon entering this keymap as a nested
    /// sequence, before waiting for the next combo (spec.md §4.6).
    pub immediate: Option<Box<Command>>,
}

impl Keymap {
    pub fn new(name: impl Into<String>, bindings: HashMap<Combo, Command>) -> Self {
        Self {
            name: name.into(),
            when: None,
            bindings: expand_generic_bindings(bindings),
            immediate: None,
        }
    }

    pub fn conditional(
        name: impl Into<String>,
        when: Condition,
        bindings: HashMap<Combo, Command>,
    ) -> Self {
        Self {
            name: name.into(),
            when: Some(when),
            bindings: expand_generic_bindings(bindings),
            immediate: None,
        }
    }

    pub fn with_immediate(mut self, command: Command) -> Self {
        self.immediate = Some(Box::new(command));
        self
    }

    pub fn applies(&self, ctx: &crate::context::WindowContext) -> bool {
        match &self.when {
            None => true,
            Some(cond) => cond.evaluate(ctx),
        }
    }
}

/// Expands every binding whose combo names a generic modifier role into
/// one entry per left/right specific variant (see
/// [`Combo::expand_generic_variants`]), so lookups against a live combo —
/// which always carries the specific key that was actually pressed — find
/// it regardless of which hand pressed the modifier.
fn expand_generic_bindings(bindings: HashMap<Combo, Command>) -> HashMap<Combo, Command> {
    let mut expanded = HashMap::with_capacity(bindings.len());
    for (combo, command) in bindings {
        for variant in combo.expand_generic_variants() {
            expanded.insert(variant, command.clone());
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::modifier::ModifierId;

    #[test]
    fn a_generic_modifier_binding_matches_either_specific_key() {
        let keymap = Keymap::new(
            "ctrl_j",
            HashMap::from([(Combo::new([ModifierId::Control], Key::J), Command::key(Key::DOWN))]),
        );
        assert!(matches!(
            keymap.bindings.get(&Combo::new([ModifierId::LeftControl], Key::J)),
            Some(Command::Key(k)) if *k == Key::DOWN
        ));
        assert!(matches!(
            keymap.bindings.get(&Combo::new([ModifierId::RightControl], Key::J)),
            Some(Command::Key(k)) if *k == Key::DOWN
        ));
        assert!(keymap.bindings.get(&Combo::new([ModifierId::Control], Key::J)).is_none());
    }

    #[test]
    fn a_specific_only_binding_is_left_unexpanded() {
        let keymap = Keymap::new(
            "lctrl_j",
            HashMap::from([(Combo::new([ModifierId::LeftControl], Key::J), Command::key(Key::DOWN))]),
        );
        assert_eq!(keymap.bindings.len(), 1);
        assert!(keymap.bindings.get(&Combo::new([ModifierId::RightControl], Key::J)).is_none());
    }
}
