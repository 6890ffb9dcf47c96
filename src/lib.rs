//! # creedc
//!
//! Effect-analysis core for the Creed specification language.
//!
//! Creed specifications declare state variables and describe transitions
//! over them. This crate computes, for every expression in a module, a
//! symbolic description of which state variables the expression *reads*
//! and which it *updates*, and rejects ill-formed expressions such as
//! double updates of the same variable.
//!
//! The analysis is a Hindley-Milner-style inference: operator signatures
//! are schemes over quantified effect and bag metavariables, freshened at
//! every call site and resolved by unification.
//!
//! ```
//! use creedc::{Effect, Vars, unify};
//!
//! let unknown = Effect::read(Vars::quantified("v1"));
//! let ground = Effect::read(Vars::of(["x", "y"]));
//! let subst = unify(&unknown, &ground).unwrap();
//! assert_eq!(subst.apply(&unknown).unwrap(), ground);
//! ```
//!
//! The core is a pure function from IR and signatures to an effect map
//! (or error trees); parsing, the REPL, and the language server live in
//! the surrounding toolchain and consume the [`ir`] and [`effects`]
//! surfaces defined here.

pub mod effects;
pub mod ir;

pub use effects::{
    unify, unify_vars, Binding, Effect, EffectErrorKind, EffectInferencer, EffectMap, ErrorTree,
    InferenceOutput, Signature, SignatureTable, Substitution, Vars,
};
pub use ir::{Def, Expr, ExprKind, Literal, Module, NodeId};
