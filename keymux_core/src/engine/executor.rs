//! Runs a resolved [`Command`] against the output synthesizer, the nested
//! keymap stack, and the sticky-modifier table (spec.md §4.6).

use crate::config::{Combo, Command, Hint, Throttles};
use crate::context::KeyContext;
use crate::engine::keystate::KeystateTable;
use crate::engine::matcher::ActiveKeymaps;
use crate::engine::output::{KeySink, OutputSynthesizer};
use crate::engine::sticky::StickyTable;
use crate::key::Action;

/// Hint flags an executor run leaves behind for the pipeline to consume
/// on the *next* event. Cleared by the pipeline once acted on; never
/// carried past the event they were raised for, except `escape_next_*`
/// which by definition apply to the very next key/combo (spec.md §4.6).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorState {
    pub escape_next_key: bool,
    pub escape_next_combo: bool,
    pub ignore_next: bool,
    /// Set by `Hint::Bind`; consumed by the very next `Command::Combo` in
    /// the same command list (spec.md §4.6/§4.7).
    pub pending_sticky_bind: bool,
}

impl ExecutorState {
    pub fn take_escape_next_key(&mut self) -> bool {
        std::mem::take(&mut self.escape_next_key)
    }

    pub fn take_escape_next_combo(&mut self) -> bool {
        std::mem::take(&mut self.escape_next_combo)
    }

    pub fn take_ignore_next(&mut self) -> bool {
        std::mem::take(&mut self.ignore_next)
    }
}

pub struct Executor<'a, S: KeySink> {
    pub output: &'a mut OutputSynthesizer,
    pub sink: &'a mut S,
    pub throttles: Throttles,
    pub active_keymaps: &'a mut ActiveKeymaps,
    pub sticky: &'a mut StickyTable,
    pub keystates: &'a mut KeystateTable,
}

impl<'a, S: KeySink> Executor<'a, S> {
    pub fn new(
        output: &'a mut OutputSynthesizer,
        sink: &'a mut S,
        throttles: Throttles,
        active_keymaps: &'a mut ActiveKeymaps,
        sticky: &'a mut StickyTable,
        keystates: &'a mut KeystateTable,
    ) -> Self {
        Self {
            output,
            sink,
            throttles,
            active_keymaps,
            sticky,
            keystates,
        }
    }

    /// Executes `command` as the resolution of `source_combo`. `source_combo`
    /// is what `Hint::Bind` installs a sticky binding from, and what a
    /// `Func`'s resolved command is re-executed against.
    ///
    /// Returns whether the active keymap list should reset to top-level
    /// (spec.md §4.5/§4.6): ordinary `Combo`/`Key` commands and
    /// `Hint::IgnoreKey` signal reset; entering a nested `Keymap` and the
    /// escape-next hints signal "do not reset" so the engine keeps waiting
    /// within the sequence/escape mode. A `List` takes its signal from the
    /// last command executed, matching the common "[BIND, Combo]" idiom
    /// where the terminal command decides.
    pub fn execute(&mut self, command: &Command, ctx: &KeyContext, source_combo: &Combo, state: &mut ExecutorState) -> bool {
        match command {
            Command::Combo(combo) => {
                if state.pending_sticky_bind {
                    self.install_sticky(source_combo, combo);
                    state.pending_sticky_bind = false;
                }
                self.output.send_combo(self.sink, self.throttles, combo);
                true
            }
            Command::Key(key) => {
                self.output.send_key(self.sink, self.throttles, *key);
                true
            }
            Command::Func(f) => {
                let resolved = f.call(ctx);
                self.execute(&resolved, ctx, source_combo, state)
            }
            Command::Keymap(keymap) => {
                if let Some(immediate) = &keymap.immediate {
                    self.execute(immediate, ctx, source_combo, state);
                }
                self.active_keymaps.enter(keymap.clone());
                false
            }
            Command::Hint(hint) => self.execute_hint(*hint, source_combo, state),
            Command::List(commands) => {
                let mut reset = true;
                for command in commands {
                    reset = self.execute(command, ctx, source_combo, state);
                }
                reset
            }
            Command::Noop => true,
        }
    }

    fn execute_hint(&mut self, hint: Hint, _source_combo: &Combo, state: &mut ExecutorState) -> bool {
        match hint {
            Hint::EscapeNextKey => {
                state.escape_next_key = true;
                false
            }
            Hint::EscapeNextCombo => {
                state.escape_next_combo = true;
                false
            }
            Hint::IgnoreKey => {
                state.ignore_next = true;
                true
            }
            Hint::Bind => {
                state.pending_sticky_bind = true;
                true
            }
        }
    }

    /// Installs a sticky (input key → output key) binding per spec.md
    /// §4.7: `inkey` is the first modifier of the combo that triggered this
    /// command, `outkey` the first modifier of the combo being bound to.
    fn install_sticky(&mut self, source_combo: &Combo, target_combo: &Combo) {
        let Some(in_id) = source_combo.modifiers.iter().next() else {
            return;
        };
        let Some(out_id) = target_combo.modifiers.iter().next() else {
            return;
        };
        let Some(in_keys) = self.output.modifiers().keys_for(in_id) else {
            return;
        };
        let Some(out_keys) = self.output.modifiers().keys_for(out_id) else {
            return;
        };
        let inkey = in_keys.representative();
        let outkey = out_keys.representative();

        if let Some(ks) = self.keystates.get_mut(inkey) {
            if ks.exerted_on_output && !out_keys.contains(inkey) {
                self.output.send_key_action(self.sink, self.throttles, inkey, Action::Release);
                ks.exerted_on_output = false;
            }
        }

        if self.sticky.install(inkey, outkey) {
            if !self.output.is_mod_pressed(outkey) {
                self.output.send_key_action(self.sink, self.throttles, outkey, Action::Press);
            }
        } else {
            log::warn!("sticky bind for {inkey:?} refused: a binding is already active");
        }
    }
}
