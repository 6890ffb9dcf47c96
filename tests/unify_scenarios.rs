//! End-to-end unification scenarios and algebraic properties.
//!
//! The scenario tests assert on the literal pretty-printed forms, which
//! are part of the stable contract. The property tests use a simple
//! deterministic pseudo-random generator (LCG) to produce varied effect
//! trees; proptest is not a dev dependency, and determinism keeps the
//! oracles stable.

use creedc::{unify, Effect, EffectErrorKind, ErrorTree, Substitution, Vars};

fn read(names: &[&str]) -> Effect {
    Effect::read(Vars::of(names.iter().copied()))
}

fn update(names: &[&str]) -> Effect {
    Effect::update(Vars::of(names.iter().copied()))
}

/// Panic with the rendered tree when unification unexpectedly fails.
fn unify_ok(a: &Effect, b: &Effect) -> Substitution {
    unify(a, b).unwrap_or_else(|err| panic!("expected {a} and {b} to unify:\n{err}"))
}

fn unify_err(a: &Effect, b: &Effect) -> ErrorTree {
    match unify(a, b) {
        Ok(subst) => panic!("expected {a} and {b} to fail, got {subst}"),
        Err(err) => err,
    }
}

// ============================================================
// Scenario Tests
// ============================================================

#[test]
fn test_identical_concrete_effects_need_no_substitution() {
    let effect = Effect::read_update(Vars::of(["x"]), Vars::of(["y"]));
    let subst = unify_ok(&effect, &effect.clone());
    assert_eq!(subst.to_string(), "[]");
}

#[test]
fn test_quantified_bag_resolves_to_concrete_names() {
    let unknown = Effect::read(Vars::quantified("e"));
    let ground = read(&["x", "y"]);
    let subst = unify_ok(&unknown, &ground);
    assert_eq!(subst.vars_value("e"), Some(&Vars::of(["x", "y"])));
    let applied = subst.apply(&unknown).unwrap();
    assert_eq!(applied.to_string(), "Read['x', 'y']");
}

#[test]
fn test_arrow_positions_bind_quantified_effects() {
    let schematic = Effect::arrow(vec![Effect::quantified("e1")], Effect::quantified("e2"));
    let ground = Effect::arrow(vec![read(&["x"])], update(&["x"]));
    let subst = unify_ok(&schematic, &ground);
    assert_eq!(subst.effect_value("e1"), Some(&read(&["x"])));
    assert_eq!(subst.effect_value("e2"), Some(&update(&["x"])));
    assert_eq!(
        subst.apply(&schematic).unwrap().to_string(),
        "(Read['x']) => Update['x']"
    );
}

#[test]
fn test_double_update_is_rejected_by_simplification() {
    let effect = update(&["x", "x"]);
    let err = effect.simplify().unwrap_err();
    assert_eq!(
        err.leaf_messages(),
        vec!["Multiple updates of variable(s): x"]
    );
}

#[test]
fn test_binding_an_effect_inside_itself_is_cyclical() {
    let quantified = Effect::quantified("e");
    let arrow = Effect::arrow(vec![Effect::quantified("e")], Effect::pure());
    let err = unify_err(&quantified, &arrow);
    assert_eq!(
        err.leaf_messages(),
        vec!["Can't bind e to (e) => Pure: cyclical binding"]
    );
}

#[test]
fn test_arrows_of_different_arity_do_not_unify() {
    let two = Effect::arrow(
        vec![Effect::quantified("e1"), Effect::quantified("e2")],
        Effect::pure(),
    );
    let one = Effect::arrow(vec![Effect::quantified("e1")], Effect::pure());
    let err = unify_err(&two, &one);
    assert_eq!(err.leaf_messages(), vec!["Expected 2 arguments, got 1"]);
}

#[test]
fn test_read_does_not_unify_with_update() {
    let err = unify_err(&read(&["x"]), &update(&["x"]));
    assert_eq!(
        err.leaf_messages(),
        vec!["Expected variables ['x'] and [] to be the same"]
    );
    assert_eq!(err.location, "Trying to unify Read['x'] and Update['x']");
}

// ============================================================
// Deterministic Effect Generator
// ============================================================

/// Simple deterministic LCG pseudo-random number generator.
struct Rng {
    state: u64,
}

impl Rng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        // LCG parameters from Numerical Recipes
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    fn next_usize(&mut self, bound: usize) -> usize {
        (self.next() % bound as u64) as usize
    }
}

const STATE_VARS: [&str; 4] = ["w", "x", "y", "z"];
const BAG_VARS: [&str; 3] = ["v1", "v2", "v3"];
const EFFECT_VARS: [&str; 3] = ["e1", "e2", "e3"];

fn random_bag(rng: &mut Rng) -> Vars {
    if rng.next_usize(4) == 0 {
        return Vars::quantified(BAG_VARS[rng.next_usize(BAG_VARS.len())]);
    }
    let count = rng.next_usize(3);
    // Distinct names keep generated update bags well-formed; sorted bags
    // make structural equality coincide with bag equality.
    let mut names: Vec<&str> = STATE_VARS.to_vec();
    let mut picked = Vec::with_capacity(count);
    for _ in 0..count {
        picked.push(names.remove(rng.next_usize(names.len())));
    }
    picked.sort_unstable();
    Vars::of(picked)
}

fn random_effect(rng: &mut Rng, depth: usize) -> Effect {
    let roll = rng.next_usize(if depth == 0 { 3 } else { 4 });
    match roll {
        0 => Effect::quantified(EFFECT_VARS[rng.next_usize(EFFECT_VARS.len())]),
        1 | 2 => Effect::read_update(random_bag(rng), random_bag(rng)),
        _ => {
            let arity = 1 + rng.next_usize(2);
            let params = (0..arity).map(|_| random_effect(rng, depth - 1)).collect();
            Effect::arrow(params, random_effect(rng, depth - 1))
        }
    }
}

// ============================================================
// Property-Based Style Tests
// ============================================================

#[test]
fn test_simplification_is_idempotent() {
    let mut rng = Rng::new(7);
    for _ in 0..200 {
        let effect = random_effect(&mut rng, 2);
        let Ok(once) = effect.clone().simplify() else {
            continue;
        };
        let twice = once.clone().simplify().unwrap();
        assert_eq!(once, twice, "simplify not idempotent for {effect}");
    }
}

#[test]
fn test_unifier_is_sound() {
    // Whenever unification succeeds, the substitution equalizes both
    // sides up to simplification.
    let mut rng = Rng::new(11);
    let mut successes = 0;
    for _ in 0..400 {
        let a = random_effect(&mut rng, 2);
        let b = random_effect(&mut rng, 2);
        let Ok(subst) = unify(&a, &b) else {
            continue;
        };
        let (Ok(left), Ok(right)) = (subst.apply(&a), subst.apply(&b)) else {
            continue;
        };
        assert_eq!(
            left.simplify().unwrap(),
            right.simplify().unwrap(),
            "substitution {subst} does not equalize {a} and {b}"
        );
        successes += 1;
    }
    assert!(successes > 20, "generator produced too few unifiable pairs");
}

#[test]
fn test_unification_is_symmetric() {
    let mut rng = Rng::new(13);
    for _ in 0..400 {
        let a = random_effect(&mut rng, 2);
        let b = random_effect(&mut rng, 2);
        let forward = unify(&a, &b);
        let backward = unify(&b, &a);
        assert_eq!(
            forward.is_ok(),
            backward.is_ok(),
            "symmetry violated for {a} and {b}"
        );
        // Either direction's substitution must equalize both sides.
        for subst in [forward, backward].into_iter().flatten() {
            if let (Ok(left), Ok(right)) = (subst.apply(&a), subst.apply(&b)) {
                assert_eq!(
                    left.simplify().unwrap(),
                    right.simplify().unwrap(),
                    "substitution {subst} does not equalize {a} and {b}"
                );
            }
        }
    }
}

#[test]
fn test_occurs_check_is_complete() {
    // Binding a name to any effect that mentions it must fail.
    let mut rng = Rng::new(17);
    for _ in 0..400 {
        let effect = random_effect(&mut rng, 2);
        for name in effect.quantified_names() {
            let result = unify(&Effect::quantified(name.clone()), &effect);
            // The only escape is the same-name reflexive case.
            if effect == Effect::quantified(name.clone()) {
                assert!(result.is_ok());
                continue;
            }
            assert!(result.is_err(), "binding {name} inside {effect} must fail");
        }
    }
}

#[test]
fn test_flattening_leaves_no_nested_unions() {
    fn has_direct_nesting(vars: &Vars) -> bool {
        match vars {
            Vars::Union(children) => children
                .iter()
                .any(|child| matches!(child, Vars::Union(_)) || has_direct_nesting(child)),
            _ => false,
        }
    }

    let mut rng = Rng::new(19);
    for _ in 0..200 {
        let depth3 = Vars::union(vec![
            random_bag(&mut rng),
            Vars::union(vec![random_bag(&mut rng), random_bag(&mut rng)]),
            Vars::union(vec![
                random_bag(&mut rng),
                Vars::union(vec![random_bag(&mut rng)]),
            ]),
        ]);
        let flat = depth3.flatten_unions();
        assert!(!has_direct_nesting(&flat), "nested union survived: {flat:?}");
    }
}

#[test]
fn test_composition_law() {
    // apply(compose(s1, s2), e) == apply(s2', apply(s1, e)) where s2' is
    // s2 with s1 applied through its values.
    let mut rng = Rng::new(23);
    for _ in 0..200 {
        let s1 = Substitution::of_effect("e1", random_effect(&mut rng, 1));
        let s2 = Substitution::of_vars("v1", random_bag(&mut rng));
        let effect = random_effect(&mut rng, 2);

        let Ok(composed) = s1.clone().compose(s2.clone()) else {
            continue;
        };
        let lhs = composed.apply(&effect);

        let rhs = s1
            .apply(&effect)
            .and_then(|staged| s2.apply(&staged));

        match (lhs, rhs) {
            (Ok(l), Ok(r)) => assert_eq!(l, r, "composition law violated for {effect}"),
            (Err(_), Err(_)) => {}
            (l, r) => panic!("composition law fallibility mismatch for {effect}: {l:?} vs {r:?}"),
        }
    }
}

#[test]
fn test_error_kinds_render_the_contract_messages() {
    let kind = EffectErrorKind::ArityMismatch {
        expected: 2,
        found: 1,
    };
    assert_eq!(kind.to_string(), "Expected 2 arguments, got 1");
    assert_eq!(
        EffectErrorKind::UnionUnification.to_string(),
        "Unification for unions of variables is not implemented"
    );
}
