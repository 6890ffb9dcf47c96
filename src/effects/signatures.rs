//! Operator effect signatures.
//!
//! Every operator carries a scheme: a function from arity to an effect.
//! Schemes mention quantified names freely; the inferencer freshens those
//! names on each instantiation so call sites never share metavariables.

use std::collections::HashMap;
use std::fmt;

use super::{Effect, Vars};

/// An arity-indexed effect scheme.
pub struct Signature(Box<dyn Fn(usize) -> Effect + Send + Sync>);

impl Signature {
    /// A scheme computed from the arity.
    pub fn new(scheme: impl Fn(usize) -> Effect + Send + Sync + 'static) -> Self {
        Self(Box::new(scheme))
    }

    /// A scheme that ignores the arity.
    pub fn fixed(effect: Effect) -> Self {
        Self::new(move |_| effect.clone())
    }

    /// The effect of this operator at the given arity. The caller is
    /// responsible for freshening quantified names.
    pub fn instantiate(&self, arity: usize) -> Effect {
        (self.0)(arity)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Signature(..)")
    }
}

/// Effect signatures keyed by opcode.
#[derive(Debug, Default)]
pub struct SignatureTable {
    signatures: HashMap<String, Signature>,
}

impl SignatureTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table pre-loaded with the builtin operators.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.register_builtins();
        table
    }

    /// Register or replace the signature for an opcode.
    pub fn insert(&mut self, opcode: impl Into<String>, signature: Signature) {
        self.signatures.insert(opcode.into(), signature);
    }

    /// Look up the signature for an opcode.
    pub fn get(&self, opcode: &str) -> Option<&Signature> {
        self.signatures.get(opcode)
    }

    pub fn contains(&self, opcode: &str) -> bool {
        self.signatures.contains_key(opcode)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Register the builtin operators.
    fn register_builtins(&mut self) {
        // === Boolean connectives ===

        for op in ["and", "or", "implies", "iff", "not"] {
            self.insert(op, Signature::new(propagation));
        }

        // === Control flow ===

        // ite(cond, then, else)
        self.insert("ite", Signature::new(propagation));

        // === Equality and ordering ===

        for op in ["eq", "neq", "lt", "gt", "lte", "gte"] {
            self.insert(op, Signature::new(propagation));
        }

        // === Arithmetic ===

        for op in ["iadd", "isub", "imul", "idiv", "imod", "ipow", "iuminus"] {
            self.insert(op, Signature::new(propagation));
        }

        // === Collections ===

        for op in [
            "set", "list", "tuple", "contains", "in", "union", "intersect", "exclude", "append",
            "concat", "size", "item", "field",
        ] {
            self.insert(op, Signature::new(propagation));
        }

        // === State ===

        // next(e): reading a variable in the next state updates it.
        self.insert(
            "next",
            Signature::fixed(Effect::arrow(
                vec![Effect::read(Vars::quantified("r1"))],
                Effect::update(Vars::quantified("r1")),
            )),
        );

        // assign(lhs, rhs): the read of the left-hand variable becomes an
        // update; the right-hand reads flow through.
        self.insert(
            "assign",
            Signature::fixed(Effect::arrow(
                vec![
                    Effect::read(Vars::quantified("r1")),
                    Effect::read(Vars::quantified("r2")),
                ],
                Effect::read_update(Vars::quantified("r2"), Vars::quantified("r1")),
            )),
        );
    }
}

/// The shared scheme for effect-propagating operators: each argument
/// position gets its own quantified read and update bags, and the result
/// unions them. Double updates across arguments surface when the unions
/// are simplified after substitution.
fn propagation(arity: usize) -> Effect {
    let mut params = Vec::with_capacity(arity);
    let mut reads = Vec::with_capacity(arity);
    let mut updates = Vec::with_capacity(arity);
    for i in 1..=arity {
        let read = Vars::quantified(format!("r{i}"));
        let update = Vars::quantified(format!("u{i}"));
        params.push(Effect::read_update(read.clone(), update.clone()));
        reads.push(read);
        updates.push(update);
    }
    Effect::arrow(
        params,
        Effect::read_update(Vars::union(reads), Vars::union(updates)),
    )
}
