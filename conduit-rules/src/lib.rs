//! # conduit-rules — Declarative rule/DSL engine
//!
//! Implements the gateway's inbound/outbound request-pipeline rules:
//! a small line-oriented DSL compiles to a tagged-variant
//! AST ([`ast`]), is produced by a hand-rolled lexer/parser ([`lexer`],
//! [`parser`]), and runs through a tree-walking evaluator ([`eval`])
//! against a host-supplied [`eval::ActionSink`] for DB/event-log side
//! effects. Deliberately not a general-purpose scripting engine — see
//! the module docs on [`ast::Expr`] for the safe subset this supports.
//!
//! [`RuleEngine`] wraps a compiled [`ast::RuleSet`] behind an
//! [`arc_swap::ArcSwap`] so that a config-reload swaps the active ruleset
//! atomically: in-flight requests keep evaluating against the ruleset
//! they started with, and no request ever observes a half-loaded set.

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod registry;

use std::sync::Arc;

use arc_swap::ArcSwap;

pub use ast::{Action, BinOp, Direction, Expr, Literal, Method, Rule, RuleSet};
pub use error::RuleError;
pub use eval::{ActionSink, Evaluator, Scope};
pub use registry::ActionRegistry;

/// Hot-reloadable handle to the compiled ruleset. Call [`RuleEngine::reload`]
/// with freshly parsed DSL source; on a parse error the previously active
/// `RuleSet` is left in place and the error is returned to the caller
/// (typically the admin `configReload` command or startup loader).
pub struct RuleEngine {
    active: ArcSwap<RuleSet>,
}

impl RuleEngine {
    pub fn empty() -> Self {
        Self { active: ArcSwap::from_pointee(RuleSet::default()) }
    }

    pub fn from_source(src: &str) -> Result<Self, RuleError> {
        let set = parser::parse(src)?;
        Ok(Self { active: ArcSwap::from_pointee(set) })
    }

    /// Compile `src` and atomically swap it in. On a parse error, the
    /// engine keeps serving the previous ruleset.
    pub fn reload(&self, src: &str) -> Result<(), RuleError> {
        let set = parser::parse(src)?;
        self.active.store(Arc::new(set));
        Ok(())
    }

    pub fn current(&self) -> Arc<RuleSet> {
        self.active.load_full()
    }
}
