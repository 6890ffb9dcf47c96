//! Read/update effects and their canonical forms.
//!
//! An effect is a symbolic description of which state variables an
//! expression reads and updates. Effects form a small language of their
//! own:
//!
//! ```text
//! Effect ::= name                      quantified (an unknown effect)
//!          | (Effect, ...) => Effect   arrow (operator effect)
//!          | Read[Vars] & Update[Vars] concrete
//!
//! Vars   ::= 'x', 'y', ...             a bag of state-variable names
//!          | name                      quantified (an unknown bag)
//!          | Vars, Vars, ...           union, resolved by flattening
//! ```
//!
//! Concrete effects are kept in simplified form: read bags are
//! union-flattened and duplicate-free, update bags are union-flattened
//! and reject duplicates. A duplicated name in an update bag is the
//! canonical ill-formedness signal ("Multiple updates of variable(s)")
//! and surfaces here, in [`Effect::simplify`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod error;
pub mod infer;
pub mod signatures;
pub mod subst;
pub mod unify;

pub use error::{EffectErrorKind, ErrorTree};
pub use infer::{EffectInferencer, EffectMap, InferenceOutput};
pub use signatures::{Signature, SignatureTable};
pub use subst::{Binding, Substitution};
pub use unify::{unify, unify_vars};

/// The effect of an expression: what it reads and what it updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// A metavariable standing for an unknown effect.
    Quantified(String),
    /// The effect of an operator taking `params.len()` arguments.
    Arrow {
        params: Vec<Effect>,
        result: Box<Effect>,
    },
    /// A ground effect: the variables read and the variables updated.
    Concrete { read: Vars, update: Vars },
}

/// A bag of state-variable names, possibly unknown or an unresolved union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vars {
    /// A finite bag of names. Duplicates are meaningful only in update
    /// position, where they signal an error.
    Concrete(Vec<String>),
    /// A metavariable standing for an unknown bag.
    Quantified(String),
    /// An unresolved union of bags. Never directly nests another union
    /// once flattened.
    Union(Vec<Vars>),
}

impl Effect {
    /// An effect that reads and updates nothing.
    pub fn pure() -> Self {
        Effect::Concrete {
            read: Vars::none(),
            update: Vars::none(),
        }
    }

    /// A concrete effect that only reads.
    pub fn read(vars: Vars) -> Self {
        Effect::Concrete {
            read: vars,
            update: Vars::none(),
        }
    }

    /// A concrete effect that only updates.
    pub fn update(vars: Vars) -> Self {
        Effect::Concrete {
            read: Vars::none(),
            update: vars,
        }
    }

    /// A concrete effect with both components.
    pub fn read_update(read: Vars, update: Vars) -> Self {
        Effect::Concrete { read, update }
    }

    /// An unknown effect named `name`.
    pub fn quantified(name: impl Into<String>) -> Self {
        Effect::Quantified(name.into())
    }

    /// The effect of an operator with the given parameter effects.
    pub fn arrow(params: Vec<Effect>, result: Effect) -> Self {
        Effect::Arrow {
            params,
            result: Box::new(result),
        }
    }

    /// Canonicalize a concrete effect; other effects pass through.
    ///
    /// The read bag is flattened and deduplicated; the update bag is
    /// flattened and checked for duplicated names, which are rejected.
    pub fn simplify(self) -> Result<Effect, ErrorTree> {
        match self {
            Effect::Concrete { read, update } => {
                let (read, update) = simplify_parts(read, update)?;
                Ok(Effect::Concrete { read, update })
            }
            other => Ok(other),
        }
    }

    /// Names of effect-kind metavariables in this effect.
    pub fn quantified_effect_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_effect_names(&mut names);
        names
    }

    /// Names of bag-kind metavariables in this effect.
    pub fn quantified_vars_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_vars_names(&mut names);
        names
    }

    /// Every quantified name reachable from this effect, of either kind.
    /// This is the set the occurs-check consults.
    pub fn quantified_names(&self) -> BTreeSet<String> {
        let mut names = self.quantified_effect_names();
        names.extend(self.quantified_vars_names());
        names
    }

    fn collect_effect_names(&self, names: &mut BTreeSet<String>) {
        match self {
            Effect::Quantified(name) => {
                names.insert(name.clone());
            }
            Effect::Arrow { params, result } => {
                for param in params {
                    param.collect_effect_names(names);
                }
                result.collect_effect_names(names);
            }
            Effect::Concrete { .. } => {}
        }
    }

    fn collect_vars_names(&self, names: &mut BTreeSet<String>) {
        match self {
            Effect::Quantified(_) => {}
            Effect::Arrow { params, result } => {
                for param in params {
                    param.collect_vars_names(names);
                }
                result.collect_vars_names(names);
            }
            Effect::Concrete { read, update } => {
                names.extend(read.quantified_names());
                names.extend(update.quantified_names());
            }
        }
    }
}

impl Vars {
    /// The empty bag.
    pub fn none() -> Self {
        Vars::Concrete(Vec::new())
    }

    /// A bag holding the given names.
    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Vars::Concrete(names.into_iter().map(Into::into).collect())
    }

    /// An unknown bag named `name`.
    pub fn quantified(name: impl Into<String>) -> Self {
        Vars::Quantified(name.into())
    }

    /// An unresolved union of the given bags.
    pub fn union(children: Vec<Vars>) -> Self {
        Vars::Union(children)
    }

    /// Whether this bag is known to hold no names.
    pub fn is_none(&self) -> bool {
        matches!(self, Vars::Concrete(names) if names.is_empty())
    }

    /// Collapse nested unions, merging all concrete members into a single
    /// bag. A union with a single remaining member unwraps to it.
    pub fn flatten_unions(self) -> Vars {
        let Vars::Union(children) = self else {
            return self;
        };

        let mut collected: Vec<String> = Vec::new();
        let mut symbolic: Vec<Vars> = Vec::new();
        for child in children {
            match child.flatten_unions() {
                Vars::Concrete(names) => collected.extend(names),
                Vars::Union(members) => {
                    // Members of an already-flat union are never unions
                    // themselves, but concrete leaves still merge.
                    for member in members {
                        match member {
                            Vars::Concrete(names) => collected.extend(names),
                            other => symbolic.push(other),
                        }
                    }
                }
                other => symbolic.push(other),
            }
        }

        if symbolic.is_empty() {
            return Vars::Concrete(collected);
        }
        if !collected.is_empty() {
            symbolic.push(Vars::Concrete(collected));
        }
        if symbolic.len() == 1 {
            symbolic.pop().expect("non-empty")
        } else {
            Vars::Union(symbolic)
        }
    }

    /// Deduplicate names inside each concrete leaf. Unions are not merged.
    pub fn unique_vars(self) -> Vars {
        match self {
            Vars::Concrete(names) => {
                let mut seen = BTreeSet::new();
                let unique = names
                    .into_iter()
                    .filter(|name| seen.insert(name.clone()))
                    .collect();
                Vars::Concrete(unique)
            }
            Vars::Union(children) => {
                Vars::Union(children.into_iter().map(Vars::unique_vars).collect())
            }
            quantified => quantified,
        }
    }

    /// The concrete names reachable in this bag, recursing into unions.
    pub fn concrete_names(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_concrete_names(&mut out);
        out
    }

    /// Names of bag-kind metavariables in this bag.
    pub fn quantified_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_quantified_names(&mut names);
        names
    }

    fn collect_concrete_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Vars::Concrete(names) => out.extend(names.iter().map(String::as_str)),
            Vars::Quantified(_) => {}
            Vars::Union(children) => {
                for child in children {
                    child.collect_concrete_names(out);
                }
            }
        }
    }

    fn collect_quantified_names(&self, names: &mut BTreeSet<String>) {
        match self {
            Vars::Concrete(_) => {}
            Vars::Quantified(name) => {
                names.insert(name.clone());
            }
            Vars::Union(children) => {
                for child in children {
                    child.collect_quantified_names(names);
                }
            }
        }
    }
}

/// Canonicalize the two components of a concrete effect.
///
/// Exposed at bag granularity so the unifier can refresh components
/// without reassembling and destructuring an [`Effect`].
pub(crate) fn simplify_parts(read: Vars, update: Vars) -> Result<(Vars, Vars), ErrorTree> {
    let read = read.flatten_unions().unique_vars();
    let update = update.flatten_unions();

    let names = update.concrete_names();
    let mut seen = BTreeSet::new();
    let mut duplicated = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            duplicated.insert(name);
        }
    }
    if !duplicated.is_empty() {
        let vars = duplicated.into_iter().collect::<Vec<_>>().join(", ");
        let effect = Effect::Concrete { read, update };
        return Err(ErrorTree::leaf(
            format!("Trying to simplify effect {effect}"),
            EffectErrorKind::MultipleUpdates { vars },
        ));
    }
    Ok((read, update))
}

impl fmt::Display for Vars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vars::Concrete(names) => {
                let quoted: Vec<String> = names.iter().map(|name| format!("'{name}'")).collect();
                write!(f, "{}", quoted.join(", "))
            }
            Vars::Quantified(name) => write!(f, "{name}"),
            Vars::Union(children) => {
                let rendered: Vec<String> = children
                    .iter()
                    .filter(|child| !child.is_none())
                    .map(Vars::to_string)
                    .collect();
                write!(f, "{}", rendered.join(", "))
            }
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Quantified(name) => write!(f, "{name}"),
            Effect::Arrow { params, result } => {
                let rendered: Vec<String> = params.iter().map(Effect::to_string).collect();
                write!(f, "({}) => {result}", rendered.join(", "))
            }
            Effect::Concrete { read, update } => match (read.is_none(), update.is_none()) {
                (true, true) => write!(f, "Pure"),
                (false, true) => write!(f, "Read[{read}]"),
                (true, false) => write!(f, "Update[{update}]"),
                (false, false) => write!(f, "Read[{read}] & Update[{update}]"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_merges_concrete_members() {
        let vars = Vars::union(vec![
            Vars::of(["x"]),
            Vars::union(vec![Vars::of(["y"]), Vars::of(["z"])]),
        ]);
        assert_eq!(vars.flatten_unions(), Vars::of(["x", "y", "z"]));
    }

    #[test]
    fn test_flatten_keeps_symbolic_members() {
        let vars = Vars::union(vec![
            Vars::quantified("v1"),
            Vars::of(["x"]),
            Vars::quantified("v2"),
        ]);
        let flat = vars.flatten_unions();
        assert_eq!(
            flat,
            Vars::Union(vec![
                Vars::quantified("v1"),
                Vars::quantified("v2"),
                Vars::of(["x"]),
            ])
        );
    }

    #[test]
    fn test_flatten_unwraps_single_member() {
        let vars = Vars::union(vec![Vars::quantified("v1")]);
        assert_eq!(vars.flatten_unions(), Vars::quantified("v1"));

        let empty = Vars::union(vec![]);
        assert_eq!(empty.flatten_unions(), Vars::none());
    }

    #[test]
    fn test_flatten_leaves_no_nested_union() {
        let vars = Vars::union(vec![
            Vars::union(vec![Vars::quantified("a"), Vars::quantified("b")]),
            Vars::union(vec![Vars::of(["x"]), Vars::quantified("c")]),
        ]);
        let flat = vars.flatten_unions();
        if let Vars::Union(children) = &flat {
            assert!(children.iter().all(|c| !matches!(c, Vars::Union(_))));
        } else {
            panic!("expected a union, got {flat:?}");
        }
    }

    #[test]
    fn test_unique_vars_deduplicates_leaves() {
        let vars = Vars::of(["x", "y", "x"]);
        assert_eq!(vars.unique_vars(), Vars::of(["x", "y"]));
    }

    #[test]
    fn test_simplify_deduplicates_read() {
        let effect = Effect::read(Vars::union(vec![Vars::of(["x"]), Vars::of(["x", "y"])]));
        let simplified = effect.simplify().unwrap();
        assert_eq!(simplified, Effect::read(Vars::of(["x", "y"])));
    }

    #[test]
    fn test_simplify_rejects_double_update() {
        let effect = Effect::update(Vars::of(["x", "x"]));
        let err = effect.simplify().unwrap_err();
        assert_eq!(
            err.leaf_messages(),
            vec!["Multiple updates of variable(s): x"]
        );
    }

    #[test]
    fn test_simplify_rejects_double_update_across_union() {
        let effect = Effect::update(Vars::union(vec![Vars::of(["x"]), Vars::of(["y", "x"])]));
        let err = effect.simplify().unwrap_err();
        assert_eq!(
            err.leaf_messages(),
            vec!["Multiple updates of variable(s): x"]
        );
    }

    #[test]
    fn test_simplify_is_idempotent() {
        let effects = vec![
            Effect::pure(),
            Effect::read(Vars::of(["x", "y"])),
            Effect::read_update(Vars::of(["x"]), Vars::of(["y"])),
            Effect::read(Vars::union(vec![Vars::quantified("v1"), Vars::of(["x"])])),
            Effect::update(Vars::quantified("u1")),
        ];
        for effect in effects {
            let once = effect.clone().simplify().unwrap();
            let twice = once.clone().simplify().unwrap();
            assert_eq!(once, twice, "simplify not idempotent for {effect}");
        }
    }

    #[test]
    fn test_display_grammar() {
        assert_eq!(Effect::pure().to_string(), "Pure");
        assert_eq!(Effect::read(Vars::of(["x", "y"])).to_string(), "Read['x', 'y']");
        assert_eq!(
            Effect::read_update(Vars::of(["x"]), Vars::of(["y"])).to_string(),
            "Read['x'] & Update['y']"
        );
        assert_eq!(Effect::quantified("e").to_string(), "e");
        assert_eq!(
            Effect::arrow(
                vec![Effect::quantified("e1"), Effect::quantified("e2")],
                Effect::quantified("e3"),
            )
            .to_string(),
            "(e1, e2) => e3"
        );
        assert_eq!(
            Effect::read(Vars::union(vec![Vars::of(["x"]), Vars::quantified("v1")]))
                .to_string(),
            "Read['x', v1]"
        );
    }

    #[test]
    fn test_quantified_names_cover_both_kinds() {
        let effect = Effect::arrow(
            vec![Effect::quantified("e1")],
            Effect::read_update(Vars::quantified("r1"), Vars::quantified("u1")),
        );
        let names: Vec<String> = effect.quantified_names().into_iter().collect();
        assert_eq!(names, vec!["e1", "r1", "u1"]);
    }
}
