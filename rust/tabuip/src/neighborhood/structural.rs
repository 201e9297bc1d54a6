use super::basic::merged_related;
use super::AcceptancePolicy;
use crate::{
    Alteration, Constraint, ConstraintKind, ConstraintSense, Model, Move, MoveSense, VariableID,
};

fn is_integral(value: f64) -> bool {
    value.fract() == 0.0
}

/// Moves over two-variable equalities `a x + b y + c0 = 0` that step one
/// variable and re-derive the other so the constraint stays satisfied.
fn two_variable_equality_moves(
    model: &Model,
    c: &Constraint,
    sense: MoveSense,
    policy: &AcceptancePolicy,
    out: &mut Vec<Move>,
) {
    let terms = c.expression().sorted_terms();
    let [(x, a), (y, b)] = [terms[0], terms[1]];
    if model.variable(x).is_fixed() || model.variable(y).is_fixed() {
        return;
    }
    if !policy.accepts(model, [x, y]) {
        return;
    }
    let constant = c.expression().constant();
    let related = merged_related(model, &[x, y]);

    let mut emit = |driver: VariableID,
                    driver_coefficient: f64,
                    follower: VariableID,
                    follower_coefficient: f64| {
        let driver_value = model.variable(driver).value();
        for step in [1i64, -1] {
            let driver_target = driver_value + step;
            if !model.variable(driver).bound().contains(driver_target) {
                continue;
            }
            let follower_target =
                -(driver_coefficient * driver_target as f64 + constant) / follower_coefficient;
            if !is_integral(follower_target) {
                continue;
            }
            let follower_target = follower_target as i64;
            if !model.variable(follower).bound().contains(follower_target) {
                continue;
            }
            // Canonical alteration order, so duplicates from the two driver
            // directions compare equal.
            let mut alterations = [
                Alteration::new(driver, driver_target),
                Alteration::new(follower, follower_target),
            ];
            alterations.sort_unstable_by_key(|a| a.variable);
            let mv = Move::new(sense, alterations, related.clone());
            if !out.iter().any(|existing| {
                existing.hash() == mv.hash() && existing.alterations() == mv.alterations()
            }) {
                out.push(mv);
            }
        }
    };
    emit(x, a, y, b);
    emit(y, b, x, a);
}

/// Paired moves for the dependency-shaped equalities that survived
/// preprocessing: exclusive-or/nor, inverted/balanced integers, constant
/// sum/difference/ratio, and the trinomial exclusive-nor.
pub fn exclusive_moves(model: &Model, policy: &AcceptancePolicy) -> Vec<Move> {
    const PAIR_KINDS: [(ConstraintKind, MoveSense); 7] = [
        (ConstraintKind::ExclusiveOr, MoveSense::ExclusiveOr),
        (ConstraintKind::ExclusiveNor, MoveSense::ExclusiveNor),
        (ConstraintKind::InvertedIntegers, MoveSense::InvertedIntegers),
        (ConstraintKind::BalancedIntegers, MoveSense::BalancedIntegers),
        (
            ConstraintKind::ConstantSumIntegers,
            MoveSense::ConstantSumIntegers,
        ),
        (
            ConstraintKind::ConstantDifferenceIntegers,
            MoveSense::ConstantDifferenceIntegers,
        ),
        (
            ConstraintKind::ConstantRatioIntegers,
            MoveSense::ConstantRatioIntegers,
        ),
    ];

    let mut moves = Vec::new();
    for (kind, sense) in PAIR_KINDS {
        for &id in model.constraint_reference().of_kind(kind) {
            two_variable_equality_moves(model, model.constraint(id), sense, policy, &mut moves);
        }
    }
    for &id in model
        .constraint_reference()
        .of_kind(ConstraintKind::TrinomialExclusiveNor)
    {
        trinomial_moves(model, model.constraint(id), policy, &mut moves);
    }
    moves
}

/// Flip all three members of `x + y - 2 z = 0` together; the only two
/// satisfying states are all-zero and all-one.
fn trinomial_moves(
    model: &Model,
    c: &Constraint,
    policy: &AcceptancePolicy,
    out: &mut Vec<Move>,
) {
    let ids: Vec<VariableID> = c.expression().sorted_terms().iter().map(|&(id, _)| id).collect();
    if ids.iter().any(|&id| model.variable(id).is_fixed()) {
        return;
    }
    if !policy.accepts(model, ids.iter().copied()) {
        return;
    }
    let alterations: Vec<Alteration> = ids
        .iter()
        .map(|&id| Alteration::new(id, 1 - model.variable(id).value()))
        .collect();
    out.push(Move::new(
        MoveSense::TrinomialExclusiveNor,
        alterations,
        merged_related(model, &ids),
    ));
}

/// Two-variable general equalities: step either variable and re-derive the
/// other.
pub fn aggregation_moves(model: &Model, policy: &AcceptancePolicy) -> Vec<Move> {
    let mut moves = Vec::new();
    for &id in model
        .constraint_reference()
        .of_kind(ConstraintKind::Aggregation)
    {
        two_variable_equality_moves(
            model,
            model.constraint(id),
            MoveSense::Aggregation,
            policy,
            &mut moves,
        );
    }
    moves
}

/// Shift both sides of `a x - a y <= 0` by the same step, preserving the
/// difference and hence feasibility of the precedence row.
pub fn precedence_moves(model: &Model, policy: &AcceptancePolicy) -> Vec<Move> {
    let mut moves = Vec::new();
    for &id in model
        .constraint_reference()
        .of_kind(ConstraintKind::Precedence)
    {
        let c = model.constraint(id);
        let terms = c.expression().sorted_terms();
        let [(x, _), (y, _)] = [terms[0], terms[1]];
        if model.variable(x).is_fixed() || model.variable(y).is_fixed() {
            continue;
        }
        if !policy.accepts(model, [x, y]) {
            continue;
        }
        let related = merged_related(model, &[x, y]);
        for step in [1i64, -1] {
            let x_target = model.variable(x).value() + step;
            let y_target = model.variable(y).value() + step;
            if model.variable(x).bound().contains(x_target)
                && model.variable(y).bound().contains(y_target)
            {
                moves.push(Move::new(
                    MoveSense::Precedence,
                    [Alteration::new(x, x_target), Alteration::new(y, y_target)],
                    related.clone(),
                ));
            }
        }
    }
    moves
}

/// Toggle the binary member of a variable-bound row and park the integer
/// member at the feasible edge the toggle leaves open.
pub fn variable_bound_moves(model: &Model, policy: &AcceptancePolicy) -> Vec<Move> {
    let mut moves = Vec::new();
    for &id in model
        .constraint_reference()
        .of_kind(ConstraintKind::VariableBound)
    {
        let c = model.constraint(id);
        let Some(binary) = c.key_variable() else {
            continue;
        };
        let terms = c.expression().sorted_terms();
        let Some(&(other, other_coefficient)) =
            terms.iter().find(|&&(id, _)| id != binary)
        else {
            continue;
        };
        let binary_coefficient = c.expression().coefficient(binary);
        if model.variable(binary).is_fixed() || model.variable(other).is_fixed() {
            continue;
        }
        if !policy.accepts(model, [binary, other]) {
            continue;
        }

        let binary_target = 1 - model.variable(binary).value();
        // Solve a_b * b_t + a_o * z + c0 (<=|>=) 0 for the extreme z.
        let rhs = -(c.expression().constant() + binary_coefficient * binary_target as f64);
        let edge = rhs / other_coefficient;
        let wants_maximum = match c.sense() {
            ConstraintSense::Less => other_coefficient > 0.0,
            ConstraintSense::Greater => other_coefficient < 0.0,
            ConstraintSense::Equal => continue,
        };
        let target = if wants_maximum {
            edge.floor() as i64
        } else {
            edge.ceil() as i64
        };
        let target = model.variable(other).bound().clamp(target);
        moves.push(Move::new(
            MoveSense::VariableBound,
            [
                Alteration::new(binary, binary_target),
                Alteration::new(other, target),
            ],
            merged_related(model, &[binary, other]),
        ));
    }
    moves
}

/// Toggle one member of `sum x_i - y = 0` and carry the count variable
/// along.
pub fn soft_selection_moves(model: &Model, policy: &AcceptancePolicy) -> Vec<Move> {
    let mut moves = Vec::new();
    for &id in model
        .constraint_reference()
        .of_kind(ConstraintKind::SoftSelection)
    {
        let c = model.constraint(id);
        let Some(key) = c.key_variable() else {
            continue;
        };
        if model.variable(key).is_fixed() {
            continue;
        }
        for (member, _) in c.expression().sorted_terms() {
            if member == key || model.variable(member).is_fixed() {
                continue;
            }
            if !policy.accepts(model, [member, key]) {
                continue;
            }
            let member_value = model.variable(member).value();
            let key_target = model.variable(key).value() + (1 - 2 * member_value);
            if !model.variable(key).bound().contains(key_target) {
                continue;
            }
            moves.push(Move::new(
                MoveSense::SoftSelection,
                [
                    Alteration::new(member, 1 - member_value),
                    Alteration::new(key, key_target),
                ],
                merged_related(model, &[member, key]),
            ));
        }
    }
    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bound, ObjectiveSense};

    #[test]
    fn exclusive_or_moves_swap_the_pair() {
        let mut model = Model::new("m");
        let x = model.binary_variable("x");
        let y = model.binary_variable("y");
        let objective = model.expression().term(x, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        let lhs = model
            .expression()
            .term(x, 1.0)
            .term(y, 1.0)
            .constant(-1.0)
            .build();
        model.add_constraint("xor", lhs, ConstraintSense::Equal).unwrap();
        model.variable_mut(x).set_value(1).unwrap();
        model.setup();

        let moves = exclusive_moves(&model, &AcceptancePolicy::all());
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].sense(), MoveSense::ExclusiveOr);
        assert_eq!(moves[0].target_of(x), Some(0));
        assert_eq!(moves[0].target_of(y), Some(1));
    }

    #[test]
    fn aggregation_moves_stay_on_the_line() {
        let mut model = Model::new("m");
        let x = model.integer_variable("x", Bound::new(0, 10).unwrap());
        let y = model.integer_variable("y", Bound::new(0, 10).unwrap());
        let objective = model.expression().term(x, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        // 2x + y - 8 = 0
        let lhs = model
            .expression()
            .term(x, 2.0)
            .term(y, 1.0)
            .constant(-8.0)
            .build();
        model.add_constraint("agg", lhs, ConstraintSense::Equal).unwrap();
        model.variable_mut(x).set_value(3).unwrap();
        model.variable_mut(y).set_value(2).unwrap();
        model.setup();

        let moves = aggregation_moves(&model, &AcceptancePolicy::all());
        assert!(!moves.is_empty());
        for mv in &moves {
            let x_after = mv.target_of(x).unwrap_or(3);
            let y_after = mv.target_of(y).unwrap_or(2);
            assert_eq!(2 * x_after + y_after, 8);
        }
        // Stepping y by 1 never lands on an integral x, so only x-driven
        // moves appear.
        assert_eq!(moves.len(), 2);
    }

    #[test]
    fn precedence_moves_shift_both() {
        let mut model = Model::new("m");
        let x = model.integer_variable("x", Bound::new(0, 10).unwrap());
        let y = model.integer_variable("y", Bound::new(0, 10).unwrap());
        let objective = model.expression().term(x, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        let lhs = model.expression().term(x, 1.0).term(y, -1.0).build();
        model.add_constraint("prec", lhs, ConstraintSense::Less).unwrap();
        model.variable_mut(x).set_value(2).unwrap();
        model.variable_mut(y).set_value(5).unwrap();
        model.setup();

        let moves = precedence_moves(&model, &AcceptancePolicy::all());
        assert_eq!(moves.len(), 2);
        for mv in &moves {
            let dx = mv.target_of(x).unwrap() - 2;
            let dy = mv.target_of(y).unwrap() - 5;
            assert_eq!(dx, dy);
        }
    }

    #[test]
    fn soft_selection_moves_track_the_count() {
        let mut model = Model::new("m");
        let xs = model.binary_variable_vector("x", 3);
        let y = model.integer_variable("y", Bound::new(0, 3).unwrap());
        let objective = model.expression().term(y, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        let mut builder = model.expression().term(y, -1.0);
        for &x in &xs {
            builder = builder.term(x, 1.0);
        }
        let lhs = builder.build();
        model.add_constraint("soft", lhs, ConstraintSense::Equal).unwrap();
        model.variable_mut(xs[0]).set_value(1).unwrap();
        model.variable_mut(y).set_value(1).unwrap();
        model.setup();

        let moves = soft_selection_moves(&model, &AcceptancePolicy::all());
        assert_eq!(moves.len(), 3);
        for mv in &moves {
            let toggled = xs
                .iter()
                .find(|&&x| mv.alters(x))
                .copied()
                .unwrap();
            let delta = if model.variable(toggled).value() == 1 { -1 } else { 1 };
            assert_eq!(mv.target_of(y), Some(1 + delta));
        }
    }
}
