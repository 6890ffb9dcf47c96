//! Effect unification.
//!
//! Unification finds a minimal substitution that makes two effects equal:
//!
//! ```text
//! unify(e1, Read['x'])                 => e1 |-> Read['x']
//! unify(Read[v1], Read['x', 'y'])      => v1 |-> 'x', 'y'
//! unify(Read['x'], Update['x'])        => ERROR
//! ```
//!
//! Failures are reported as [`ErrorTree`]s whose locations trace the
//! unification steps in flight. Binding a metavariable performs an
//! occurs-check so no name is ever bound to a value that mentions it.
//!
//! Unions of bags only appear in intermediate states and resolve before
//! two unions ever confront each other; when that assumption is violated
//! the unifier reports it instead of guessing.

use tracing::debug;

use super::error::{EffectErrorKind, ErrorTree};
use super::subst::{Binding, Substitution};
use super::{Effect, Vars};

/// Compute a substitution that makes `e1` and `e2` equal, or explain why
/// none exists.
pub fn unify(e1: &Effect, e2: &Effect) -> Result<Substitution, ErrorTree> {
    let location = format!("Trying to unify {e1} and {e2}");
    debug!("unifying {} and {}", e1, e2);

    let e1 = simplified(e1, &location)?;
    let e2 = simplified(e2, &location)?;

    match (e1, e2) {
        (
            Effect::Arrow {
                params: params1,
                result: result1,
            },
            Effect::Arrow {
                params: params2,
                result: result2,
            },
        ) => {
            if params1.len() != params2.len() {
                return Err(ErrorTree::leaf(
                    location,
                    EffectErrorKind::ArityMismatch {
                        expected: params1.len(),
                        found: params2.len(),
                    },
                ));
            }
            let mut subst = Substitution::empty();
            let positions = params1
                .into_iter()
                .zip(params2)
                .chain(std::iter::once((*result1, *result2)));
            for (left, right) in positions {
                let left = subst
                    .apply(&left)
                    .map_err(|err| ErrorTree::wrap(&location, err))?;
                let right = subst
                    .apply(&right)
                    .map_err(|err| ErrorTree::wrap(&location, err))?;
                let step = unify(&left, &right).map_err(|err| ErrorTree::wrap(&location, err))?;
                subst = subst
                    .compose(step)
                    .map_err(|err| ErrorTree::wrap(&location, err))?;
            }
            Ok(subst)
        }

        (
            Effect::Concrete {
                read: read1,
                update: update1,
            },
            Effect::Concrete {
                read: read2,
                update: update2,
            },
        ) => {
            let read_subst =
                unify_vars(&read1, &read2).map_err(|err| ErrorTree::wrap(&location, err))?;

            // The read bindings can reveal structure in the update bags,
            // so refresh both effects before unifying those.
            let (_, update1) = super::simplify_parts(
                read_subst.apply_vars(&read1),
                read_subst.apply_vars(&update1),
            )
            .map_err(|err| ErrorTree::wrap(&location, err))?;
            let (_, update2) = super::simplify_parts(
                read_subst.apply_vars(&read2),
                read_subst.apply_vars(&update2),
            )
            .map_err(|err| ErrorTree::wrap(&location, err))?;

            let update_subst =
                unify_vars(&update1, &update2).map_err(|err| ErrorTree::wrap(&location, err))?;
            Ok(read_subst.concat(update_subst))
        }

        (Effect::Quantified(name1), Effect::Quantified(name2)) if name1 == name2 => {
            Ok(Substitution::empty())
        }

        (Effect::Quantified(name), other) | (other, Effect::Quantified(name)) => {
            bind_effect(&name, &other)
                .map(Substitution::single)
                .map_err(|kind| ErrorTree::leaf(location, kind))
        }

        _ => Err(ErrorTree::leaf(location, EffectErrorKind::ShapeMismatch)),
    }
}

/// Unify two variable bags.
pub fn unify_vars(v1: &Vars, v2: &Vars) -> Result<Substitution, ErrorTree> {
    let v1 = v1.clone().flatten_unions();
    let v2 = v2.clone().flatten_unions();
    let location = format!("Trying to unify variables [{v1}] and [{v2}]");

    match (&v1, &v2) {
        (Vars::Concrete(names1), Vars::Concrete(names2)) => {
            let mut sorted1: Vec<&str> = names1.iter().map(String::as_str).collect();
            let mut sorted2: Vec<&str> = names2.iter().map(String::as_str).collect();
            sorted1.sort_unstable();
            sorted2.sort_unstable();
            if sorted1 == sorted2 {
                Ok(Substitution::empty())
            } else {
                Err(ErrorTree::leaf(
                    location,
                    EffectErrorKind::VarsMismatch {
                        left: v1.to_string(),
                        right: v2.to_string(),
                    },
                ))
            }
        }

        (Vars::Quantified(name1), Vars::Quantified(name2)) if name1 == name2 => {
            Ok(Substitution::empty())
        }

        (Vars::Quantified(name), other) | (other, Vars::Quantified(name)) => {
            bind_vars(name, other)
                .map(Substitution::single)
                .map_err(|kind| ErrorTree::leaf(location, kind))
        }

        _ if v1 == v2 => Ok(Substitution::empty()),

        _ => Err(ErrorTree::leaf(location, EffectErrorKind::UnionUnification)),
    }
}

/// Bind an effect-kind name, rejecting cyclical bindings.
pub fn bind_effect(name: &str, effect: &Effect) -> Result<Binding, EffectErrorKind> {
    if effect.quantified_names().contains(name) {
        return Err(EffectErrorKind::CyclicalBinding {
            name: name.to_string(),
            value: effect.to_string(),
        });
    }
    Ok(Binding::Effect {
        name: name.to_string(),
        value: effect.clone(),
    })
}

/// Bind a bag-kind name, rejecting cyclical bindings.
pub fn bind_vars(name: &str, vars: &Vars) -> Result<Binding, EffectErrorKind> {
    if vars.quantified_names().contains(name) {
        return Err(EffectErrorKind::CyclicalBinding {
            name: name.to_string(),
            value: vars.to_string(),
        });
    }
    Ok(Binding::Vars {
        name: name.to_string(),
        value: vars.clone(),
    })
}

/// Simplify concrete inputs up front; other effects pass through.
fn simplified(effect: &Effect, location: &str) -> Result<Effect, ErrorTree> {
    effect
        .clone()
        .simplify()
        .map_err(|err| ErrorTree::wrap(location, err))
}
