//! YAML configuration loading (SPEC_FULL.md §3a): translates a
//! declarative config file into a `keymux_core::Configuration` snapshot.
//!
//! The YAML shape intentionally covers only the declarative subset of the
//! engine's data model — modmaps, multi-modmaps, keymaps built from
//! combos/keys/hints/lists, and conditions built from wm_class/wm_name
//! regex predicates. `Command::Func` (arbitrary user code) has no YAML
//! form; a host embedding `keymux_core` directly can still build one in
//! Rust and hand the daemon a `Configuration` without going through this
//! loader at all.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use keymux_core::config::{
    Combo, Command, Condition, Hint, Keymap, MatchPattern, Modmap, MultiModmap, Pattern, TapHold,
};
use keymux_core::config::{CompatFlags, Configuration, DeviceFilter, Environ, RepeatPolicy, Throttles, Timeouts};
use keymux_core::config::{ModifierId, ModifierTable};
use keymux_core::Key;

use crate::error::ConfigError;

/// Loads and validates a configuration file, matching spec.md §7's
/// requirement that every fatal problem surface before the event loop
/// starts.
pub fn load(path: &Path) -> Result<Configuration, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load_str(&text).map_err(|e| match e {
        ConfigError::Parse { source, .. } => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Builds a `Configuration` from YAML text directly, without touching the
/// filesystem. Used by `load` and by tests.
pub fn load_str(text: &str) -> Result<Configuration, ConfigError> {
    let raw: RawConfig = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
        path: "<string>".into(),
        source,
    })?;
    build(raw)
}

fn build(raw: RawConfig) -> Result<Configuration, ConfigError> {
    let mut modifiers = ModifierTable::with_defaults();
    for m in &raw.modifiers {
        let key = resolve_key(&m.key)?;
        modifiers.register_custom(&m.name, key)?;
    }

    let modmaps = raw
        .modmaps
        .iter()
        .map(build_modmap)
        .collect::<Result<Vec<_>, _>>()?;

    let multi_modmaps = raw
        .multi_modmaps
        .iter()
        .map(build_multi_modmap)
        .collect::<Result<Vec<_>, _>>()?;

    let mut keymaps_by_name: HashMap<String, Arc<Keymap>> = HashMap::new();
    let mut keymaps = Vec::with_capacity(raw.keymaps.len());
    for raw_keymap in &raw.keymaps {
        let keymap = build_keymap(raw_keymap, &modifiers, &keymaps_by_name)?;
        let keymap = Arc::new(keymap);
        keymaps_by_name.insert(raw_keymap.name.clone(), Arc::clone(&keymap));
        keymaps.push((*keymap).clone());
    }

    let diagnostic_key = match &raw.diagnostic_key {
        Some(name) => resolve_key(name)?,
        None => Key::F15,
    };
    let emergency_eject_key = match &raw.emergency_eject_key {
        Some(name) => resolve_key(name)?,
        None => Key::F16,
    };

    let configuration = Configuration {
        modifiers,
        modmaps,
        multi_modmaps,
        keymaps,
        timeouts: Timeouts {
            multipurpose_ms: raw.timeouts.multipurpose_ms.unwrap_or(1000),
            suspend_ms: raw.timeouts.suspend_ms.unwrap_or(1000),
        },
        devices: DeviceFilter {
            only: raw.devices.only,
            add: raw.devices.add,
            ignore: raw.devices.ignore,
        },
        environ: Environ {
            session_type: raw.environ.session_type.unwrap_or_else(|| "x11".into()),
            compositor: raw.environ.compositor.unwrap_or_default(),
        },
        repeat_policy: RepeatPolicy {
            passthrough: raw.repeat_policy.passthrough,
        },
        throttles: Throttles::new(raw.throttles.pre_ms, raw.throttles.post_ms),
        diagnostic_key,
        emergency_eject_key,
        compat: CompatFlags {
            shift_shift_momentary_carve_out: raw.compat.shift_shift_momentary_carve_out,
        },
    };

    configuration.validate()?;
    Ok(configuration)
}

fn build_modmap(raw: &RawModmap) -> Result<Modmap, ConfigError> {
    let mut mapping = HashMap::with_capacity(raw.mapping.len());
    for (from, to) in &raw.mapping {
        mapping.insert(resolve_key(from)?, resolve_key(to)?);
    }
    Ok(match &raw.when {
        Some(cond) => Modmap::conditional(&raw.name, mapping, compile_condition(cond)?),
        None => Modmap::unconditional(&raw.name, mapping),
    })
}

fn build_multi_modmap(raw: &RawMultiModmap) -> Result<MultiModmap, ConfigError> {
    let mut mapping = HashMap::with_capacity(raw.mapping.len());
    for (from, taphold) in &raw.mapping {
        let tap = resolve_key(&taphold.tap)?;
        let hold = resolve_key(&taphold.hold)?;
        mapping.insert(resolve_key(from)?, TapHold { tap, hold });
    }
    Ok(match &raw.when {
        Some(cond) => MultiModmap::conditional(&raw.name, mapping, compile_condition(cond)?),
        None => MultiModmap::unconditional(&raw.name, mapping),
    })
}

fn build_keymap(
    raw: &RawKeymap,
    modifiers: &ModifierTable,
    keymaps_by_name: &HashMap<String, Arc<Keymap>>,
) -> Result<Keymap, ConfigError> {
    let mut bindings = HashMap::with_capacity(raw.bindings.len());
    for binding in &raw.bindings {
        let combo = build_combo(&binding.combo, modifiers)?;
        let command = build_command(&binding.command, modifiers, keymaps_by_name)?;
        bindings.insert(combo, command);
    }

    let mut keymap = match &raw.when {
        Some(cond) => Keymap::conditional(&raw.name, compile_condition(cond)?, bindings),
        None => Keymap::new(&raw.name, bindings),
    };

    if let Some(immediate) = &raw.immediate {
        keymap = keymap.with_immediate(build_command(immediate, modifiers, keymaps_by_name)?);
    }

    Ok(keymap)
}

fn build_combo(raw: &RawCombo, modifiers: &ModifierTable) -> Result<Combo, ConfigError> {
    let mods = raw
        .mods
        .iter()
        .map(|m| resolve_modifier_id(m, modifiers))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Combo::new(mods, resolve_key(&raw.key)?))
}

fn build_command(
    raw: &RawCommand,
    modifiers: &ModifierTable,
    keymaps_by_name: &HashMap<String, Arc<Keymap>>,
) -> Result<Command, ConfigError> {
    match raw {
        RawCommand::Bare(name) | RawCommand::KeyField { key: name } => {
            Ok(Command::Key(resolve_key(name)?))
        }
        RawCommand::Combo { combo } => Ok(Command::Combo(build_combo(combo, modifiers)?)),
        RawCommand::Keymap { keymap } => keymaps_by_name
            .get(keymap)
            .cloned()
            .map(Command::Keymap)
            .ok_or_else(|| ConfigError::UnknownKeymap(keymap.clone())),
        RawCommand::Hint { hint } => Ok(Command::Hint(resolve_hint(hint)?)),
        RawCommand::List { list } => {
            let commands = list
                .iter()
                .map(|c| build_command(c, modifiers, keymaps_by_name))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Command::List(commands))
        }
        RawCommand::Noop { .. } => Ok(Command::Noop),
    }
}

fn resolve_hint(name: &str) -> Result<Hint, ConfigError> {
    match name {
        "escape_next_key" => Ok(Hint::EscapeNextKey),
        "escape_next_combo" => Ok(Hint::EscapeNextCombo),
        "ignore_key" => Ok(Hint::IgnoreKey),
        "bind" => Ok(Hint::Bind),
        other => Err(ConfigError::UnknownHint(other.to_string())),
    }
}

fn resolve_key(name: &str) -> Result<Key, ConfigError> {
    Key::from_name(name).ok_or_else(|| ConfigError::UnknownKey(name.to_string()))
}

fn resolve_modifier_id(name: &str, modifiers: &ModifierTable) -> Result<ModifierId, ConfigError> {
    let upper = name.to_ascii_uppercase();
    let known = match upper.as_str() {
        "CONTROL" | "CTRL" => Some(ModifierId::Control),
        "ALT" => Some(ModifierId::Alt),
        "SHIFT" => Some(ModifierId::Shift),
        "META" | "SUPER" | "WIN" => Some(ModifierId::Meta),
        "FN" => Some(ModifierId::Fn),
        "LEFT_CONTROL" | "LEFTCTRL" | "LCTRL" => Some(ModifierId::LeftControl),
        "RIGHT_CONTROL" | "RIGHTCTRL" | "RCTRL" => Some(ModifierId::RightControl),
        "LEFT_ALT" | "LEFTALT" | "LALT" => Some(ModifierId::LeftAlt),
        "RIGHT_ALT" | "RIGHTALT" | "RALT" => Some(ModifierId::RightAlt),
        "LEFT_SHIFT" | "LEFTSHIFT" | "LSHIFT" => Some(ModifierId::LeftShift),
        "RIGHT_SHIFT" | "RIGHTSHIFT" | "RSHIFT" => Some(ModifierId::RightShift),
        "LEFT_META" | "LEFTMETA" | "LMETA" => Some(ModifierId::LeftMeta),
        "RIGHT_META" | "RIGHTMETA" | "RMETA" => Some(ModifierId::RightMeta),
        _ => None,
    };
    if let Some(id) = known {
        return Ok(id);
    }
    if modifiers
        .iter()
        .any(|m| matches!(&m.id, ModifierId::Custom(n) if n == &upper))
    {
        return Ok(ModifierId::Custom(upper));
    }
    Err(ConfigError::UnknownModifier(name.to_string()))
}

struct RegexPattern(regex::Regex);

impl MatchPattern for RegexPattern {
    fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }

    fn source(&self) -> &str {
        self.0.as_str()
    }
}

fn compile_pattern(source: &str) -> Result<Pattern, ConfigError> {
    let regex = regex::Regex::new(source).map_err(|source_err| ConfigError::InvalidPattern {
        pattern: source.to_string(),
        source: source_err,
    })?;
    Ok(Pattern(Arc::new(RegexPattern(regex))))
}

/// Compiles a `when` block into a `Condition`. Every leaf present (class
/// match, class non-match, name match, name non-match, nested `all`/`any`/
/// `not`) is ANDed together; an empty block compiles to a vacuously true
/// `And([])`, so an omitted `when` and an empty one behave identically.
fn compile_condition(raw: &RawCondition) -> Result<Condition, ConfigError> {
    let mut leaves = Vec::new();

    if let Some(p) = &raw.wm_class_matches {
        leaves.push(Condition::WmClassMatches(compile_pattern(p)?));
    }
    if let Some(p) = &raw.wm_class_not_matches {
        leaves.push(Condition::WmClassNotMatches(compile_pattern(p)?));
    }
    if let Some(p) = &raw.wm_name_matches {
        leaves.push(Condition::WmNameMatches(compile_pattern(p)?));
    }
    if let Some(p) = &raw.wm_name_not_matches {
        leaves.push(Condition::WmNameNotMatches(compile_pattern(p)?));
    }
    for nested in &raw.all {
        leaves.push(compile_condition(nested)?);
    }
    if !raw.any.is_empty() {
        let mut ors = Vec::with_capacity(raw.any.len());
        for nested in &raw.any {
            ors.push(compile_condition(nested)?);
        }
        leaves.push(Condition::Or(ors));
    }
    if let Some(nested) = &raw.not {
        leaves.push(Condition::Not(Box::new(compile_condition(nested)?)));
    }

    let mut iter = leaves.into_iter();
    Ok(match iter.next() {
        None => Condition::And(Vec::new()),
        Some(first) => match iter.next() {
            None => first,
            Some(second) => {
                let mut rest = vec![first, second];
                rest.extend(iter);
                Condition::And(rest)
            }
        },
    })
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    modifiers: Vec<RawModifier>,
    modmaps: Vec<RawModmap>,
    multi_modmaps: Vec<RawMultiModmap>,
    keymaps: Vec<RawKeymap>,
    timeouts: RawTimeouts,
    devices: RawDeviceFilter,
    environ: RawEnviron,
    repeat_policy: RawRepeatPolicy,
    throttles: RawThrottles,
    diagnostic_key: Option<String>,
    emergency_eject_key: Option<String>,
    compat: RawCompatFlags,
}

#[derive(Debug, Deserialize)]
struct RawModifier {
    name: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct RawModmap {
    name: String,
    #[serde(default)]
    when: Option<RawCondition>,
    mapping: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawTapHold {
    tap: String,
    hold: String,
}

#[derive(Debug, Deserialize)]
struct RawMultiModmap {
    name: String,
    #[serde(default)]
    when: Option<RawCondition>,
    mapping: HashMap<String, RawTapHold>,
}

#[derive(Debug, Deserialize)]
struct RawKeymap {
    name: String,
    #[serde(default)]
    when: Option<RawCondition>,
    #[serde(default)]
    bindings: Vec<RawBinding>,
    #[serde(default)]
    immediate: Option<RawCommand>,
}

#[derive(Debug, Deserialize)]
struct RawBinding {
    combo: RawCombo,
    command: RawCommand,
}

#[derive(Debug, Deserialize)]
struct RawCombo {
    #[serde(default)]
    mods: Vec<String>,
    key: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCommand {
    Combo { combo: RawCombo },
    Keymap { keymap: String },
    Hint { hint: String },
    List { list: Vec<RawCommand> },
    Noop { noop: bool },
    KeyField { key: String },
    Bare(String),
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct RawCondition {
    wm_class_matches: Option<String>,
    wm_class_not_matches: Option<String>,
    wm_name_matches: Option<String>,
    wm_name_not_matches: Option<String>,
    all: Vec<RawCondition>,
    any: Vec<RawCondition>,
    not: Option<Box<RawCondition>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawTimeouts {
    multipurpose_ms: Option<u64>,
    suspend_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawDeviceFilter {
    only: Vec<String>,
    add: Vec<String>,
    ignore: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawEnviron {
    session_type: Option<String>,
    compositor: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawRepeatPolicy {
    passthrough: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawThrottles {
    pre_ms: u64,
    post_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
struct RawCompatFlags {
    shift_shift_momentary_carve_out: bool,
}

impl Default for RawCompatFlags {
    fn default() -> Self {
        Self {
            shift_shift_momentary_carve_out: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_loads_to_defaults() {
        let config = load_str("").expect("empty config should still be valid");
        assert_eq!(config.environ.session_type, "x11");
        assert_eq!(config.diagnostic_key, Key::F15);
    }

    #[test]
    fn unconditional_modmap_round_trips() {
        let yaml = r#"
modmaps:
  - name: capslock-to-ctrl
    mapping:
      CAPSLOCK: LEFTCTRL
"#;
        let config = load_str(yaml).expect("valid modmap config");
        assert_eq!(config.modmaps.len(), 1);
        assert_eq!(config.modmaps[0].mapping.get(&Key::CAPSLOCK), Some(&Key::LEFTCTRL));
    }

    #[test]
    fn unknown_key_name_is_rejected() {
        let yaml = r#"
modmaps:
  - name: bad
    mapping:
      NOT_A_REAL_KEY: LEFTCTRL
"#;
        assert!(matches!(load_str(yaml), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn two_unconditional_modmaps_fail_validation() {
        let yaml = r#"
modmaps:
  - name: a
    mapping: { CAPSLOCK: LEFTCTRL }
  - name: b
    mapping: { TAB: ESC }
"#;
        assert!(matches!(load_str(yaml), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn keymap_with_conditional_combo_binding() {
        let yaml = r#"
keymaps:
  - name: firefox
    when:
      wm_class_matches: "Firefox"
    bindings:
      - combo: { mods: [CONTROL], key: J }
        command: { combo: { mods: [CONTROL, SHIFT], key: K } }
"#;
        let config = load_str(yaml).expect("valid keymap config");
        assert_eq!(config.keymaps.len(), 1);
        assert_eq!(config.keymaps[0].bindings.len(), 1);
    }

    #[test]
    fn custom_modifier_usable_in_a_binding() {
        let yaml = r#"
modifiers:
  - name: HYPER
    key: CAPSLOCK
keymaps:
  - name: global
    bindings:
      - combo: { mods: [HYPER], key: J }
        command: { key: DOWN }
"#;
        let config = load_str(yaml).expect("valid custom-modifier config");
        assert_eq!(config.keymaps.len(), 1);
    }

    #[test]
    fn nested_keymap_reference_must_be_already_defined() {
        let yaml = r#"
keymaps:
  - name: leader
    bindings:
      - combo: { key: A }
        command: { keymap: undefined-later }
"#;
        assert!(matches!(load_str(yaml), Err(ConfigError::UnknownKeymap(_))));
    }
}
