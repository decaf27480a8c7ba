//! Rule-engine error taxonomy.
//!
//! Parse errors are fatal to *loading* a ruleset (the previous compiled
//! `RuleSet` stays live, per §4.C's "parse errors abort rule loading and
//! keep the previous ruleset live"); evaluation errors are logged and
//! non-fatal by default — they never abort the request, only the single
//! rule.

use std::fmt;

/// Errors produced while compiling or evaluating DSL rule files.
#[derive(Debug, Clone)]
pub enum RuleError {
    /// A lexical or syntax error while parsing a DSL file.
    Parse { line: usize, message: String },
    /// An expression or action failed during evaluation. Non-fatal —
    /// logged and the engine moves on to the next rule.
    Eval { message: String },
    /// An action invoked a registry entry that doesn't exist.
    UnknownAction(String),
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::Parse { line, message } => write!(f, "parse error at line {line}: {message}"),
            RuleError::Eval { message } => write!(f, "rule evaluation error: {message}"),
            RuleError::UnknownAction(name) => write!(f, "no action registered under {name:?}"),
        }
    }
}

impl std::error::Error for RuleError {}
