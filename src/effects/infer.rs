//! Bottom-up effect inference over the IR.
//!
//! The inferencer walks each definition of a module, computing an effect
//! for every expression node. Operator applications look up a signature,
//! freshen its quantified names, and unify it against the effects of the
//! actual arguments; the resulting substitutions compose into a running
//! substitution carried through the traversal.
//!
//! Failures never abort the walk: a failed node is recorded in the error
//! map and its ancestors see a fresh metavariable in its place, so one
//! bad expression does not cascade into spurious mismatches elsewhere.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::ir::{Expr, ExprKind, Module, NodeId};

use super::error::{EffectErrorKind, ErrorTree};
use super::signatures::SignatureTable;
use super::subst::{Binding, Substitution};
use super::unify::unify;
use super::{Effect, Vars};

/// Inferred effects keyed by IR node.
pub type EffectMap = BTreeMap<NodeId, Effect>;

/// The result of inferring a module: effects for the nodes that
/// succeeded and an error tree for each node that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutput {
    pub effects: EffectMap,
    pub errors: BTreeMap<NodeId, ErrorTree>,
}

impl InferenceOutput {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Walks a module bottom-up, assigning an effect to every node.
///
/// Fresh names are drawn from a counter owned by the inferencer and
/// starting at zero, so two runs over the same module with the same
/// signature table print identically.
pub struct EffectInferencer<'a> {
    table: &'a SignatureTable,
    /// Effects inferred for user-defined operators, stored as schemes.
    defined: HashMap<String, Effect>,
    /// Declared state variables of the module being inferred.
    state_vars: HashSet<String>,
    /// Environments for let- and lambda-bound names, innermost last.
    scopes: Vec<HashMap<String, Effect>>,
    effects: EffectMap,
    errors: BTreeMap<NodeId, ErrorTree>,
    /// Substitution accumulated across call sites.
    subst: Substitution,
    fresh_counter: u64,
}

impl<'a> EffectInferencer<'a> {
    pub fn new(table: &'a SignatureTable) -> Self {
        Self {
            table,
            defined: HashMap::new(),
            state_vars: HashSet::new(),
            scopes: Vec::new(),
            effects: EffectMap::new(),
            errors: BTreeMap::new(),
            subst: Substitution::empty(),
            fresh_counter: 0,
        }
    }

    /// Infer effects for every definition in the module.
    pub fn infer_module(mut self, module: &Module) -> InferenceOutput {
        self.state_vars = module.state_vars.iter().cloned().collect();
        for def in &module.defs {
            debug!("inferring effect of definition {}", def.name);
            let effect = self.infer_expr(&def.expr);
            self.resolve_recorded();
            let effect = match self.subst.apply(&effect) {
                Ok(resolved) => resolved,
                Err(err) => {
                    self.errors.entry(def.id).or_insert(err);
                    self.fresh_effect()
                }
            };
            self.effects.insert(def.id, effect.clone());
            // Later definitions instantiate this one like any builtin.
            self.defined.insert(def.name.clone(), effect);
        }
        InferenceOutput {
            effects: self.effects,
            errors: self.errors,
        }
    }

    fn infer_expr(&mut self, expr: &Expr) -> Effect {
        let inferred = match &expr.kind {
            ExprKind::Lit(_) => Ok(Effect::pure()),
            ExprKind::Name(name) => self.infer_name(name),
            ExprKind::App { opcode, args } => self.infer_app(opcode, args),
            ExprKind::Lambda { params, body } => self.infer_lambda(params, body),
            ExprKind::Let { name, value, body } => Ok(self.infer_let(name, value, body)),
        };
        match inferred {
            Ok(effect) => {
                self.effects.insert(expr.id, effect.clone());
                effect
            }
            Err(err) => {
                // The failed node becomes an unknown so its ancestors
                // keep producing diagnostics.
                self.errors.insert(expr.id, err);
                self.fresh_effect()
            }
        }
    }

    fn infer_name(&mut self, name: &str) -> Result<Effect, ErrorTree> {
        if let Some(effect) = self.lookup_scope(name) {
            return Ok(effect);
        }
        if self.state_vars.contains(name) {
            return Ok(Effect::read(Vars::of([name])));
        }
        if let Some(scheme) = self.defined.get(name).cloned() {
            return self.freshen(&scheme);
        }
        if let Some(signature) = self.table.get(name) {
            let scheme = signature.instantiate(0);
            return self.freshen(&scheme);
        }
        Err(ErrorTree::leaf(
            format!("Inferring effect for name: {name}"),
            EffectErrorKind::MissingSignature {
                name: name.to_string(),
            },
        ))
    }

    fn infer_app(&mut self, opcode: &str, args: &[Expr]) -> Result<Effect, ErrorTree> {
        let location = format!("Inferring effect for operator application: {opcode}");

        let arg_effects: Vec<Effect> = args.iter().map(|arg| self.infer_expr(arg)).collect();

        let scheme = if let Some(scheme) = self.defined.get(opcode).cloned() {
            scheme
        } else if let Some(signature) = self.table.get(opcode) {
            signature.instantiate(args.len())
        } else {
            return Err(ErrorTree::leaf(
                location,
                EffectErrorKind::MissingSignature {
                    name: opcode.to_string(),
                },
            ));
        };
        let signature = self.freshen(&scheme)?;

        // Unify the signature against an arrow built from the (resolved)
        // argument effects and a fresh result metavariable.
        let result = self.fresh_effect();
        let params = arg_effects
            .iter()
            .map(|effect| self.subst.apply(effect))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| ErrorTree::wrap(&location, err))?;
        let call = Effect::arrow(params, result.clone());

        let step = unify(&signature, &call).map_err(|err| ErrorTree::wrap(&location, err))?;
        self.subst = std::mem::take(&mut self.subst)
            .compose(step)
            .map_err(|err| ErrorTree::wrap(&location, err))?;

        self.subst
            .apply(&result)
            .map_err(|err| ErrorTree::wrap(&location, err))
    }

    fn infer_lambda(&mut self, params: &[String], body: &Expr) -> Result<Effect, ErrorTree> {
        let mut scope = HashMap::new();
        let mut param_effects = Vec::with_capacity(params.len());
        for param in params {
            let effect = self.fresh_effect();
            scope.insert(param.clone(), effect.clone());
            param_effects.push(effect);
        }
        self.scopes.push(scope);
        let body_effect = self.infer_expr(body);
        self.scopes.pop();

        // Unification of the body may have resolved the parameters.
        let params = param_effects
            .iter()
            .map(|effect| self.subst.apply(effect))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Effect::arrow(params, body_effect))
    }

    fn infer_let(&mut self, name: &str, value: &Expr, body: &Expr) -> Effect {
        let value_effect = self.infer_expr(value);
        let mut scope = HashMap::new();
        scope.insert(name.to_string(), value_effect);
        self.scopes.push(scope);
        let body_effect = self.infer_expr(body);
        self.scopes.pop();
        body_effect
    }

    fn lookup_scope(&self, name: &str) -> Option<Effect> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).cloned())
    }

    /// Rename every quantified name in an instantiated scheme so call
    /// sites never share metavariables.
    fn freshen(&mut self, effect: &Effect) -> Result<Effect, ErrorTree> {
        let effect_names = effect.quantified_effect_names();
        let vars_names = effect.quantified_vars_names();
        if effect_names.is_empty() && vars_names.is_empty() {
            return Ok(effect.clone());
        }
        let mut renaming = Substitution::empty();
        for name in effect_names {
            let fresh = self.fresh_name(&name);
            renaming = renaming.concat(Substitution::single(Binding::Effect {
                name,
                value: Effect::Quantified(fresh),
            }));
        }
        for name in vars_names {
            let fresh = self.fresh_name(&name);
            renaming = renaming.concat(Substitution::single(Binding::Vars {
                name,
                value: Vars::Quantified(fresh),
            }));
        }
        renaming.apply(effect)
    }

    fn fresh_name(&mut self, base: &str) -> String {
        let name = format!("{base}_{}", self.fresh_counter);
        self.fresh_counter += 1;
        name
    }

    fn fresh_effect(&mut self) -> Effect {
        let name = format!("_e{}", self.fresh_counter);
        self.fresh_counter += 1;
        Effect::Quantified(name)
    }

    /// Apply the running substitution to every recorded effect, so the
    /// published map holds resolved forms. A node whose resolution fails
    /// moves to the error map.
    fn resolve_recorded(&mut self) {
        let ids: Vec<NodeId> = self.effects.keys().copied().collect();
        for id in ids {
            let Some(current) = self.effects.get(&id).cloned() else {
                continue;
            };
            match self.subst.apply(&current) {
                Ok(resolved) => {
                    self.effects.insert(id, resolved);
                }
                Err(err) => {
                    self.effects.remove(&id);
                    self.errors.entry(id).or_insert(err);
                }
            }
        }
    }
}
