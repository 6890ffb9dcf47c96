//! Substitutions over effects and variable bags.
//!
//! A substitution is an ordered list of bindings, applied left to right.
//! Applying a binding rewrites every occurrence of its name and
//! re-canonicalizes any concrete effect it touched, which is where
//! duplicate updates hidden behind metavariables surface.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::error::ErrorTree;
use super::{simplify_parts, Effect, Vars};

/// A single resolved binding for a metavariable of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Binding {
    /// An effect-kind metavariable resolved to an effect.
    Effect { name: String, value: Effect },
    /// A bag-kind metavariable resolved to a bag.
    Vars { name: String, value: Vars },
}

impl Binding {
    /// Rewrite one effect under this binding, re-simplifying concretes.
    fn apply(&self, effect: Effect) -> Result<Effect, ErrorTree> {
        match effect {
            Effect::Quantified(name) => match self {
                Binding::Effect { name: bound, value } if *bound == name => Ok(value.clone()),
                _ => Ok(Effect::Quantified(name)),
            },
            Effect::Arrow { params, result } => {
                let params = params
                    .into_iter()
                    .map(|param| self.apply(param))
                    .collect::<Result<Vec<_>, _>>()?;
                let result = self.apply(*result)?;
                Ok(Effect::arrow(params, result))
            }
            Effect::Concrete { read, update } => {
                let (read, update) =
                    simplify_parts(self.apply_vars(read), self.apply_vars(update))?;
                Ok(Effect::Concrete { read, update })
            }
        }
    }

    /// Rewrite one bag under this binding. Flattening is deferred to the
    /// next simplification of the surrounding effect.
    fn apply_vars(&self, vars: Vars) -> Vars {
        match vars {
            Vars::Quantified(name) => match self {
                Binding::Vars { name: bound, value } if *bound == name => value.clone(),
                _ => Vars::Quantified(name),
            },
            concrete @ Vars::Concrete(_) => concrete,
            Vars::Union(children) => Vars::Union(
                children
                    .into_iter()
                    .map(|child| self.apply_vars(child))
                    .collect(),
            ),
        }
    }

    fn name(&self) -> &str {
        match self {
            Binding::Effect { name, .. } | Binding::Vars { name, .. } => name,
        }
    }

    fn same_slot(&self, other: &Binding) -> bool {
        match (self, other) {
            (Binding::Effect { .. }, Binding::Effect { .. })
            | (Binding::Vars { .. }, Binding::Vars { .. }) => self.name() == other.name(),
            _ => false,
        }
    }
}

/// A finite ordered list of bindings.
///
/// Each name is bound at most once per kind; [`Substitution::compose`]
/// enforces this when chaining substitutions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    bindings: Vec<Binding>,
}

impl Substitution {
    /// The identity substitution.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A substitution holding a single binding.
    pub fn single(binding: Binding) -> Self {
        Self {
            bindings: vec![binding],
        }
    }

    /// A single effect-kind binding.
    pub fn of_effect(name: impl Into<String>, value: Effect) -> Self {
        Self::single(Binding::Effect {
            name: name.into(),
            value,
        })
    }

    /// A single bag-kind binding.
    pub fn of_vars(name: impl Into<String>, value: Vars) -> Self {
        Self::single(Binding::Vars {
            name: name.into(),
            value,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// The value bound to an effect-kind name, if any.
    pub fn effect_value(&self, name: &str) -> Option<&Effect> {
        self.bindings.iter().find_map(|binding| match binding {
            Binding::Effect { name: bound, value } if bound == name => Some(value),
            _ => None,
        })
    }

    /// The value bound to a bag-kind name, if any.
    pub fn vars_value(&self, name: &str) -> Option<&Vars> {
        self.bindings.iter().find_map(|binding| match binding {
            Binding::Vars { name: bound, value } if bound == name => Some(value),
            _ => None,
        })
    }

    /// Append `other`'s bindings after this substitution's, unchanged.
    pub fn concat(mut self, other: Substitution) -> Substitution {
        self.bindings.extend(other.bindings);
        self
    }

    /// Apply the bindings to an effect, left to right.
    ///
    /// Every concrete effect the rewrite touches is re-simplified, so a
    /// duplicate update revealed by the substitution is reported here,
    /// under the location `Applying substitution to ...`.
    pub fn apply(&self, effect: &Effect) -> Result<Effect, ErrorTree> {
        let mut current = effect.clone();
        for binding in &self.bindings {
            current = binding.apply(current).map_err(|err| {
                ErrorTree::wrap(format!("Applying substitution to {effect}"), err)
            })?;
        }
        Ok(current)
    }

    /// Apply the bindings to a bag, left to right. Infallible: flattening
    /// is deferred to whoever next simplifies the surrounding effect.
    pub fn apply_vars(&self, vars: &Vars) -> Vars {
        let mut current = vars.clone();
        for binding in &self.bindings {
            current = binding.apply_vars(current);
        }
        current
    }

    /// Chain `other` after this substitution.
    ///
    /// `other`'s values are rewritten under `self` so the result applies
    /// in one pass: `apply(compose(s1, s2), e)` behaves as applying `s1`
    /// and then the rewritten `s2`. Bindings for names this substitution
    /// already covers are dropped, keeping each name bound at most once
    /// per kind.
    pub fn compose(self, other: Substitution) -> Result<Substitution, ErrorTree> {
        trace!("composing {} with {}", self, other);
        let mut bindings = self.bindings.clone();
        for binding in other.bindings {
            if bindings.iter().any(|existing| existing.same_slot(&binding)) {
                continue;
            }
            let rewritten = match binding {
                Binding::Effect { name, value } => {
                    let value = self
                        .apply(&value)
                        .map_err(|err| ErrorTree::wrap("Composing substitutions", err))?;
                    Binding::Effect { name, value }
                }
                Binding::Vars { name, value } => Binding::Vars {
                    name,
                    value: self.apply_vars(&value),
                },
            };
            bindings.push(rewritten);
        }
        Ok(Substitution { bindings })
    }
}

impl From<Binding> for Substitution {
    fn from(binding: Binding) -> Self {
        Substitution::single(binding)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Effect { name, value } => write!(f, "{name} |-> {value}"),
            Binding::Vars { name, value } => write!(f, "{name} |-> {value}"),
        }
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.bindings.iter().map(Binding::to_string).collect();
        write!(f, "[{}]", rendered.join(", "))
    }
}
