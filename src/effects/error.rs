//! Error trees for the effect system.
//!
//! Unification and simplification failures are reported as trees rather
//! than flat messages: each layer records the operation that was in
//! flight ("Trying to unify ..."), and the leaves carry the actionable
//! message. Consumers render a tree depth-first, indenting children.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The leaf-level failures the effect system can produce.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectErrorKind {
    /// Arrow effects with different parameter counts.
    #[error("Expected {expected} arguments, got {found}")]
    ArityMismatch { expected: usize, found: usize },

    /// Mismatched effect constructors, e.g. an arrow against a concrete.
    #[error("Can't unify different types of effects")]
    ShapeMismatch,

    /// Two concrete variable bags with different contents.
    #[error("Expected variables [{left}] and [{right}] to be the same")]
    VarsMismatch { left: String, right: String },

    /// Occurs-check rejection: a name bound to a value that mentions it.
    #[error("Can't bind {name} to {value}: cyclical binding")]
    CyclicalBinding { name: String, value: String },

    /// Declared limitation: unions resolve before a union/union
    /// confrontation can arise, so no unification is attempted for them.
    #[error("Unification for unions of variables is not implemented")]
    UnionUnification,

    /// The same state variable updated more than once.
    #[error("Multiple updates of variable(s): {vars}")]
    MultipleUpdates { vars: String },

    /// A name with no signature and no binding in scope.
    #[error("Signature not found for name: {name}")]
    MissingSignature { name: String },
}

/// A nested record of where and why an effect computation failed.
///
/// `location` gives the context of the failing operation; `message` is
/// present on leaves and is the actionable line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorTree {
    /// Context for the operation that failed.
    pub location: String,
    /// The actionable message, present on leaves.
    pub message: Option<String>,
    /// Inner failures this one wraps.
    pub children: Vec<ErrorTree>,
}

impl ErrorTree {
    /// A terminal error at `location`.
    pub fn leaf(location: impl Into<String>, kind: EffectErrorKind) -> Self {
        Self {
            location: location.into(),
            message: Some(kind.to_string()),
            children: Vec::new(),
        }
    }

    /// Wrap `child` under `location`.
    ///
    /// When the child already carries the same location the outer layer
    /// is dropped, so repeated wrapping does not produce redundant
    /// stack-like chains.
    pub fn wrap(location: impl Into<String>, child: ErrorTree) -> Self {
        let location = location.into();
        if child.location == location {
            return child;
        }
        Self {
            location,
            message: None,
            children: vec![child],
        }
    }

    /// All messages found at the leaves of this tree, depth-first.
    pub fn leaf_messages(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_messages(&mut out);
        out
    }

    fn collect_messages<'a>(&'a self, out: &mut Vec<&'a str>) {
        for child in &self.children {
            child.collect_messages(out);
        }
        if let Some(message) = &self.message {
            out.push(message);
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        writeln!(f, "{pad}{}", self.location)?;
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        if let Some(message) = &self.message {
            writeln!(f, "{pad}  {message}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ErrorTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
