//! The intermediate representation consumed by the effect core.
//!
//! The IR builder lives in the surrounding toolchain; this module defines
//! only the shapes the effect core reads. Every node carries a stable
//! [`NodeId`] so inferred effects and failures can be range-mapped back
//! to source positions by downstream consumers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier for an IR node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct NodeId(pub u128);

impl NodeId {
    pub fn new(id: u128) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A module: declared state variables and an ordered list of definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    /// State variables, readable and updatable from any definition.
    pub state_vars: Vec<String>,
    pub defs: Vec<Def>,
}

/// A named top-level definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Def {
    pub id: NodeId,
    pub name: String,
    pub expr: Expr,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
}

/// The shapes an expression can take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// A literal constant; always pure.
    Lit(Literal),
    /// Reference to a state variable, operator, or bound name.
    Name(String),
    /// Operator application.
    App { opcode: String, args: Vec<Expr> },
    /// Anonymous operator.
    Lambda { params: Vec<String>, body: Box<Expr> },
    /// Local binding scoped to `body`.
    Let {
        name: String,
        value: Box<Expr>,
        body: Box<Expr>,
    },
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Expr {
    pub fn new(id: NodeId, kind: ExprKind) -> Self {
        Self { id, kind }
    }

    pub fn bool(id: NodeId, value: bool) -> Self {
        Self::new(id, ExprKind::Lit(Literal::Bool(value)))
    }

    pub fn int(id: NodeId, value: i64) -> Self {
        Self::new(id, ExprKind::Lit(Literal::Int(value)))
    }

    pub fn name(id: NodeId, name: impl Into<String>) -> Self {
        Self::new(id, ExprKind::Name(name.into()))
    }

    pub fn app(id: NodeId, opcode: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(
            id,
            ExprKind::App {
                opcode: opcode.into(),
                args,
            },
        )
    }

    pub fn lambda(id: NodeId, params: Vec<String>, body: Expr) -> Self {
        Self::new(
            id,
            ExprKind::Lambda {
                params,
                body: Box::new(body),
            },
        )
    }

    pub fn let_in(id: NodeId, name: impl Into<String>, value: Expr, body: Expr) -> Self {
        Self::new(
            id,
            ExprKind::Let {
                name: name.into(),
                value: Box::new(value),
                body: Box::new(body),
            },
        )
    }
}
