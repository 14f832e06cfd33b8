//! Predicates over window context, used to make modmaps and keymaps
//! conditional.
//!
//! Per spec.md §9's design note, predicates are represented as a small enum
//! with a single evaluation entry point rather than as opaque closures
//! everywhere, so a configuration snapshot stays inspectable (and, with the
//! `Func` escape hatch, still extensible). Regex matching itself is not
//! this crate's concern — it depends only on the tiny [`MatchPattern`]
//! trait, which a host (the daemon's config loader) implements over
//! whatever regex engine it likes.

use std::fmt;
use std::sync::Arc;

use crate::context::WindowContext;

/// A compiled string pattern, e.g. a regex. Implemented outside this crate
/// so `keymux_core` does not need to depend on a regex engine itself.
pub trait MatchPattern: Send + Sync {
    fn is_match(&self, text: &str) -> bool;
    fn source(&self) -> &str;
}

/// A literal substring pattern, used by tests and as a dependency-free
/// fallback.
pub struct Literal(pub String);

impl MatchPattern for Literal {
    fn is_match(&self, text: &str) -> bool {
        text.contains(&self.0)
    }

    fn source(&self) -> &str {
        &self.0
    }
}

#[derive(Clone)]
pub struct Pattern(pub Arc<dyn MatchPattern>);

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.0.source())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.0.source() == other.0.source()
    }
}
impl Eq for Pattern {}

impl Pattern {
    pub fn literal(s: impl Into<String>) -> Self {
        Pattern(Arc::new(Literal(s.into())))
    }
}

/// A predicate over the focused window's context.
#[derive(Clone)]
pub enum Condition {
    WmClassMatches(Pattern),
    WmClassNotMatches(Pattern),
    WmNameMatches(Pattern),
    WmNameNotMatches(Pattern),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    /// Escape hatch for predicates that cannot be expressed declaratively.
    Func(Arc<dyn Fn(&WindowContext) -> bool + Send + Sync>),
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::WmClassMatches(p) => write!(f, "WmClassMatches({:?})", p),
            Condition::WmClassNotMatches(p) => write!(f, "WmClassNotMatches({:?})", p),
            Condition::WmNameMatches(p) => write!(f, "WmNameMatches({:?})", p),
            Condition::WmNameNotMatches(p) => write!(f, "WmNameNotMatches({:?})", p),
            Condition::And(cs) => f.debug_tuple("And").field(cs).finish(),
            Condition::Or(cs) => f.debug_tuple("Or").field(cs).finish(),
            Condition::Not(c) => f.debug_tuple("Not").field(c).finish(),
            Condition::Func(_) => write!(f, "Func(..)"),
        }
    }
}

impl Condition {
    /// Single evaluation entry point. The pipeline never calls this for an
    /// event whose context is already an error (spec.md §4.3 step 6).
    pub fn evaluate(&self, window: &WindowContext) -> bool {
        match self {
            Condition::WmClassMatches(p) => p.0.is_match(&window.wm_class),
            Condition::WmClassNotMatches(p) => !p.0.is_match(&window.wm_class),
            Condition::WmNameMatches(p) => p.0.is_match(&window.wm_name),
            Condition::WmNameNotMatches(p) => !p.0.is_match(&window.wm_name),
            Condition::And(cs) => cs.iter().all(|c| c.evaluate(window)),
            Condition::Or(cs) => cs.iter().any(|c| c.evaluate(window)),
            Condition::Not(c) => !c.evaluate(window),
            Condition::Func(f) => f(window),
        }
    }
}
