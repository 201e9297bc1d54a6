use super::PreprocessError;
use crate::{
    ATol, Bound, ConstraintID, ConstraintKind, ConstraintSense, Model, VariableID, VariableKind,
};
use fnv::FnvHashMap;
use itertools::Itertools;
use ordered_float::NotNan;

/// Fix every mutable variable whose bound admits a single value.
pub fn fix_implicit_fixed_variables(model: &mut Model) -> usize {
    let ids: Vec<VariableID> = model
        .variable_reference()
        .mutable
        .iter()
        .copied()
        .filter(|&id| model.variable(id).bound().is_fixed_point())
        .collect();
    for &id in &ids {
        let value = model.variable(id).bound().lower();
        tracing::debug!(variable = model.variable(id).name(), value, "implicit fix");
        model.variable_mut(id).fix_to(value);
    }
    ids.len()
}

/// Fix mutable variables that appear in no enabled constraint to the bound
/// that minimizes their objective contribution. Variables with a zero
/// sensitivity freeze at their current value; variables whose preferred
/// side is unbounded are left alone.
pub fn fix_independent_variables(model: &mut Model) -> usize {
    let ids: Vec<VariableID> = model
        .variable_reference()
        .mutable
        .iter()
        .copied()
        .filter(|&id| {
            let v = model.variable(id);
            v.related_constraints().is_empty()
                && v.kind() != VariableKind::Selection
                && !v.kind().is_dependent()
        })
        .collect();
    let mut fixed = 0;
    for id in ids {
        let v = model.variable(id);
        let sensitivity = v.objective_sensitivity();
        let target = if sensitivity > 0.0 {
            if !v.bound().has_lower() {
                continue;
            }
            v.bound().lower()
        } else if sensitivity < 0.0 {
            if !v.bound().has_upper() {
                continue;
            }
            v.bound().upper()
        } else {
            v.value()
        };
        tracing::debug!(variable = v.name(), target, "independent fix");
        model.variable_mut(id).fix_to(target);
        fixed += 1;
    }
    fixed
}

/// Fold fixed variables into the constant terms of the objective and
/// every enabled constraint. Returns the number of removed terms.
pub fn substitute_fixed_variables(model: &mut Model) -> usize {
    let fixed: Vec<(VariableID, i64)> = model
        .variable_reference()
        .fixed
        .iter()
        .map(|&id| (id, model.variable(id).value()))
        .collect();
    if fixed.is_empty() {
        return 0;
    }
    let mut removed = 0;
    let enabled = model.constraint_reference().enabled.clone();
    for id in enabled {
        let expression = model.constraint_mut(id).expression_mut();
        for &(variable, value) in &fixed {
            let coefficient = expression.remove_term(variable);
            if coefficient != 0.0 {
                expression.add_constant(coefficient * value as f64);
                removed += 1;
            }
        }
    }
    let objective = model.objective_mut().expression_mut();
    for &(variable, value) in &fixed {
        let coefficient = objective.remove_term(variable);
        if coefficient != 0.0 {
            objective.add_constant(coefficient * value as f64);
            removed += 1;
        }
    }
    removed
}

/// Per-constraint bound reasoning: tighten single-free-variable rows (and
/// fix on equality), disable rows that cannot change feasibility, force
/// corner assignments on tight equalities, and fail on contradictions.
pub fn reduce_constraints_with_bounds(
    model: &mut Model,
    atol: ATol,
) -> Result<(usize, usize), PreprocessError> {
    const PASS: &str = "bound tightening";
    let mut fixed = 0;
    let mut disabled = 0;

    let ids: Vec<ConstraintID> = model.constraint_reference().enabled.clone();
    for id in ids {
        let (terms, constant, sense, constraint_name) = {
            let c = model.constraint(id);
            (
                c.expression().sorted_terms(),
                c.expression().constant(),
                c.sense(),
                c.name().to_string(),
            )
        };

        let mut fixed_sum = 0.0;
        let mut unfixed: Vec<(VariableID, f64)> = Vec::new();
        for (variable, coefficient) in terms {
            let v = model.variable(variable);
            if v.is_fixed() {
                fixed_sum += coefficient * v.value() as f64;
            } else {
                unfixed.push((variable, coefficient));
            }
        }
        let offset = constant + fixed_sum;

        match unfixed.len() {
            0 => {
                let satisfied = match sense {
                    ConstraintSense::Less => offset <= *atol,
                    ConstraintSense::Equal => offset.abs() <= *atol,
                    ConstraintSense::Greater => offset >= -*atol,
                };
                if !satisfied {
                    return Err(PreprocessError::UnsatisfiableConstraint {
                        pass: PASS,
                        constraint: constraint_name,
                    });
                }
                tracing::debug!(constraint = %constraint_name, "disable satisfied empty row");
                model.constraint_mut(id).disable();
                disabled += 1;
            }
            1 => {
                let (variable, coefficient) = unfixed[0];
                fixed += tighten_single_variable(
                    model,
                    id,
                    variable,
                    coefficient,
                    offset,
                    sense,
                    atol,
                )?;
                model.constraint_mut(id).disable();
                disabled += 1;
            }
            _ => {
                let (reduced_fixed, reduced_disabled) =
                    reduce_by_range(model, id, &unfixed, offset, sense, atol, &constraint_name)?;
                fixed += reduced_fixed;
                disabled += reduced_disabled;
            }
        }
    }
    Ok((fixed, disabled))
}

/// `coefficient * x + offset (sense) 0` with `x` the only free variable.
/// Returns the number of newly fixed variables (0 or 1).
fn tighten_single_variable(
    model: &mut Model,
    constraint: ConstraintID,
    variable: VariableID,
    coefficient: f64,
    offset: f64,
    sense: ConstraintSense,
    atol: ATol,
) -> Result<usize, PreprocessError> {
    const PASS: &str = "bound tightening";
    let rhs = -offset / coefficient;
    let bound = model.variable(variable).bound();
    let name = model.variable(variable).name().to_string();

    let tightened = match (sense, coefficient > 0.0) {
        (ConstraintSense::Equal, _) => {
            let value = rhs.round();
            if (value - rhs).abs() > *atol {
                return Err(PreprocessError::NonIntegralFixing {
                    pass: PASS,
                    variable: name,
                    constraint: model.constraint(constraint).name().to_string(),
                    value: rhs,
                });
            }
            Bound::new(value as i64, value as i64).unwrap()
        }
        // x <= rhs or x >= rhs depending on the coefficient sign
        (ConstraintSense::Less, true) | (ConstraintSense::Greater, false) => {
            let upper = (rhs + *atol).floor() as i64;
            Bound::new(bound.lower(), upper.min(bound.upper())).map_err(|_| {
                PreprocessError::BoundContradiction {
                    pass: PASS,
                    variable: name.clone(),
                    lower: bound.lower(),
                    upper,
                }
            })?
        }
        (ConstraintSense::Less, false) | (ConstraintSense::Greater, true) => {
            let lower = (rhs - *atol).ceil() as i64;
            Bound::new(lower.max(bound.lower()), bound.upper()).map_err(|_| {
                PreprocessError::BoundContradiction {
                    pass: PASS,
                    variable: name.clone(),
                    lower,
                    upper: bound.upper(),
                }
            })?
        }
    };

    let tightened = bound.intersection(&tightened).ok_or_else(|| {
        PreprocessError::BoundContradiction {
            pass: PASS,
            variable: name.clone(),
            lower: tightened.lower(),
            upper: tightened.upper(),
        }
    })?;

    tracing::debug!(variable = %name, bound = %tightened, "tighten");
    if tightened.is_fixed_point() {
        model.variable_mut(variable).fix_to(tightened.lower());
        Ok(1)
    } else {
        model.variable_mut(variable).set_bound(tightened);
        Ok(0)
    }
}

/// Range analysis over the free variables of a row.
fn reduce_by_range(
    model: &mut Model,
    id: ConstraintID,
    unfixed: &[(VariableID, f64)],
    offset: f64,
    sense: ConstraintSense,
    atol: ATol,
    constraint_name: &str,
) -> Result<(usize, usize), PreprocessError> {
    const PASS: &str = "redundancy removal";
    let mut minimum = offset;
    let mut maximum = offset;
    let mut all_finite = true;
    for &(variable, coefficient) in unfixed {
        let bound = model.variable(variable).bound();
        if !bound.is_finite() {
            all_finite = false;
            break;
        }
        let a = coefficient * bound.lower() as f64;
        let b = coefficient * bound.upper() as f64;
        minimum += a.min(b);
        maximum += a.max(b);
    }
    if !all_finite {
        return Ok((0, 0));
    }

    let infeasible = match sense {
        ConstraintSense::Less => minimum > *atol,
        ConstraintSense::Equal => minimum > *atol || maximum < -*atol,
        ConstraintSense::Greater => maximum < -*atol,
    };
    if infeasible {
        return Err(PreprocessError::UnsatisfiableConstraint {
            pass: PASS,
            constraint: constraint_name.to_string(),
        });
    }

    let redundant = match sense {
        ConstraintSense::Less => maximum <= *atol,
        ConstraintSense::Greater => minimum >= -*atol,
        ConstraintSense::Equal => minimum.abs() <= *atol && maximum.abs() <= *atol,
    };
    if redundant {
        tracing::debug!(constraint = %constraint_name, "disable redundant row");
        model.constraint_mut(id).disable();
        return Ok((0, 1));
    }

    // A tight equality is only achievable at the extreme corner: every free
    // variable snaps to the bound that attains it.
    if sense == ConstraintSense::Equal {
        let corner = if minimum.abs() <= *atol {
            Some(true)
        } else if maximum.abs() <= *atol {
            Some(false)
        } else {
            None
        };
        if let Some(at_minimum) = corner {
            let mut fixed = 0;
            for &(variable, coefficient) in unfixed {
                let bound = model.variable(variable).bound();
                let target = if (coefficient > 0.0) == at_minimum {
                    bound.lower()
                } else {
                    bound.upper()
                };
                tracing::debug!(
                    variable = model.variable(variable).name(),
                    target,
                    "corner fix"
                );
                model.variable_mut(variable).fix_to(target);
                fixed += 1;
            }
            model.constraint_mut(id).disable();
            return Ok((fixed, 1));
        }
    }
    Ok((0, 0))
}

type CanonicalKey = (Vec<(VariableID, NotNan<f64>)>, NotNan<f64>);

/// Disable duplicate rows: identical canonical form and sense keeps one
/// copy; opposite-sense copies of the same form combine into one equality;
/// inequalities implied by a kept equality are disabled.
pub fn remove_duplicate_constraints(model: &mut Model) -> usize {
    let groups: std::collections::HashMap<CanonicalKey, Vec<(ConstraintID, ConstraintSense)>> = model
        .constraint_reference()
        .enabled
        .iter()
        .map(|&id| {
            let c = model.constraint(id);
            let mut terms = c.expression().sorted_terms();
            let mut constant = c.expression().constant();
            let mut sense = c.sense();
            // Normalize the sign so that the leading coefficient is positive.
            if let Some(&(_, first)) = terms.first() {
                if first < 0.0 {
                    for term in &mut terms {
                        term.1 = -term.1;
                    }
                    constant = -constant;
                    sense = sense.flipped();
                }
            }
            let key: CanonicalKey = (
                terms
                    .into_iter()
                    .map(|(id, coefficient)| (id, NotNan::new(coefficient).unwrap()))
                    .collect(),
                NotNan::new(constant).unwrap(),
            );
            (key, (id, sense))
        })
        .into_group_map();

    let mut disabled = 0;
    for (_, group) in groups {
        if group.len() < 2 {
            continue;
        }
        let kept = group
            .iter()
            .find(|(_, sense)| *sense == ConstraintSense::Equal)
            .copied()
            .unwrap_or(group[0]);
        let has_less = group.iter().any(|(_, s)| *s == ConstraintSense::Less);
        let has_greater = group.iter().any(|(_, s)| *s == ConstraintSense::Greater);
        if kept.1 != ConstraintSense::Equal && has_less && has_greater {
            // f <= 0 and f >= 0 together mean f = 0.
            model.constraint_mut(kept.0).set_sense(ConstraintSense::Equal);
            tracing::debug!(
                constraint = model.constraint(kept.0).name(),
                "combine opposite inequalities into equality"
            );
        }
        for (id, _) in group {
            if id == kept.0 {
                continue;
            }
            tracing::debug!(constraint = model.constraint(id).name(), "disable duplicate");
            model.constraint_mut(id).disable();
            disabled += 1;
        }
    }
    disabled
}

const SET_KINDS: [ConstraintKind; 3] = [
    ConstraintKind::SetPartitioning,
    ConstraintKind::SetPacking,
    ConstraintKind::SetCovering,
];

/// Dominance fixing over set-type rows, two arguments:
///
/// 1. Nested rows: when row A forces at least one of its members to 1
///    (partitioning or covering) and row B allows at most one of its
///    members (partitioning or packing) with A's members a subset of B's,
///    every member of B outside A is 0 in any feasible solution.
/// 2. Interchangeable variables: among variables that appear in exactly
///    the same set rows (one or more, with unit coefficients), only the
///    one with the smallest objective sensitivity needs to stay free.
///    A single shared row already suffices: within one
///    partitioning/packing/covering row its members are interchangeable.
///    This preserves at least one optimal solution.
pub fn fix_redundant_set_variables(model: &mut Model) -> usize {
    let mut rows: Vec<(ConstraintKind, Vec<VariableID>)> = Vec::new();
    for &id in &model.constraint_reference().enabled {
        let c = model.constraint(id);
        if SET_KINDS.contains(&c.kind()) {
            let mut members: Vec<VariableID> = c
                .expression()
                .sensitivities()
                .keys()
                .copied()
                .collect();
            members.sort_unstable();
            rows.push((c.kind(), members));
        }
    }

    let mut fixed = 0;

    // Argument 1: nested rows.
    let forces_one = |kind: ConstraintKind| {
        matches!(
            kind,
            ConstraintKind::SetPartitioning | ConstraintKind::SetCovering
        )
    };
    let allows_at_most_one = |kind: ConstraintKind| {
        matches!(
            kind,
            ConstraintKind::SetPartitioning | ConstraintKind::SetPacking
        )
    };
    for (inner_kind, inner) in &rows {
        if !forces_one(*inner_kind) {
            continue;
        }
        for (outer_kind, outer) in &rows {
            if !allows_at_most_one(*outer_kind)
                || inner.len() >= outer.len()
                || !is_subset(inner, outer)
            {
                continue;
            }
            for &dominated in outer.iter().filter(|m| !inner.contains(m)) {
                if model.variable(dominated).is_mutable() {
                    tracing::debug!(
                        variable = model.variable(dominated).name(),
                        "fix variable outside a nested set row"
                    );
                    model.variable_mut(dominated).fix_to(0);
                    fixed += 1;
                }
            }
        }
    }

    // Argument 2: identical signatures over set rows.
    let mut groups: FnvHashMap<Vec<ConstraintID>, Vec<VariableID>> = FnvHashMap::default();
    for &id in &model.variable_reference().binary {
        let v = model.variable(id);
        if v.related_constraints().is_empty() {
            continue;
        }
        let all_set_rows = v.constraint_sensitivities().iter().all(|&(c, coefficient)| {
            coefficient == 1.0 && SET_KINDS.contains(&model.constraint(c).kind())
        });
        if all_set_rows && model.variable(id).is_mutable() {
            groups
                .entry(v.related_constraints().to_vec())
                .or_default()
                .push(id);
        }
    }
    for (_, mut members) in groups {
        if members.len() < 2 {
            continue;
        }
        members.sort_by(|&a, &b| {
            model
                .variable(a)
                .objective_sensitivity()
                .partial_cmp(&model.variable(b).objective_sensitivity())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        for &dominated in &members[1..] {
            tracing::debug!(
                variable = model.variable(dominated).name(),
                "fix dominated set variable"
            );
            model.variable_mut(dominated).fix_to(0);
            fixed += 1;
        }
    }
    fixed
}

fn is_subset(inner: &[VariableID], outer: &[VariableID]) -> bool {
    let mut iter = outer.iter();
    inner
        .iter()
        .all(|m| iter.by_ref().any(|candidate| candidate == m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObjectiveSense;

    #[test]
    fn implicit_fixing() {
        let mut model = Model::new("m");
        let x = model.integer_variable("x", Bound::new(3, 3).unwrap());
        let objective = model.expression().term(x, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        model.setup();
        assert_eq!(fix_implicit_fixed_variables(&mut model), 1);
        assert!(model.variable(x).is_fixed());
        assert_eq!(model.variable(x).value(), 3);
    }

    #[test]
    fn independent_fixing_prefers_objective_bound() {
        let mut model = Model::new("m");
        let x = model.integer_variable("x", Bound::new(-5, 5).unwrap());
        let y = model.integer_variable("y", Bound::new(-5, 5).unwrap());
        let objective = model.expression().term(x, 1.0).term(y, -1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        model.setup();
        assert_eq!(fix_independent_variables(&mut model), 2);
        assert_eq!(model.variable(x).value(), -5);
        assert_eq!(model.variable(y).value(), 5);
    }

    #[test]
    fn singleton_inequality_tightens() {
        let mut model = Model::new("m");
        let x = model.integer_variable("x", Bound::new(0, 10).unwrap());
        let objective = model.expression().term(x, -1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        // 3x - 7 <= 0  =>  x <= 2
        let lhs = model.expression().term(x, 3.0).constant(-7.0).build();
        let c = model.add_constraint("c", lhs, ConstraintSense::Less).unwrap();
        model.setup();

        let (fixed, disabled) =
            reduce_constraints_with_bounds(&mut model, ATol::default()).unwrap();
        assert_eq!((fixed, disabled), (0, 1));
        assert_eq!(model.variable(x).bound(), Bound::new(0, 2).unwrap());
        assert!(!model.constraint(c).is_enabled());
    }

    #[test]
    fn redundant_row_is_disabled() {
        let mut model = Model::new("m");
        let x = model.integer_variable("x", Bound::new(0, 2).unwrap());
        let y = model.integer_variable("y", Bound::new(0, 2).unwrap());
        let objective = model.expression().term(x, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        // x + y <= 10 can never bind for x, y in [0, 2]
        let lhs = model
            .expression()
            .term(x, 1.0)
            .term(y, 1.0)
            .constant(-10.0)
            .build();
        let c = model.add_constraint("slack", lhs, ConstraintSense::Less).unwrap();
        model.setup();

        let (_, disabled) = reduce_constraints_with_bounds(&mut model, ATol::default()).unwrap();
        assert_eq!(disabled, 1);
        assert!(!model.constraint(c).is_enabled());
    }

    #[test]
    fn tight_equality_forces_the_corner() {
        let mut model = Model::new("m");
        let x = model.integer_variable("x", Bound::new(0, 2).unwrap());
        let y = model.integer_variable("y", Bound::new(0, 2).unwrap());
        let objective = model.expression().term(x, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        // x + y = 4 is only reachable at (2, 2)
        let lhs = model
            .expression()
            .term(x, 1.0)
            .term(y, 1.0)
            .constant(-4.0)
            .build();
        model.add_constraint("tight", lhs, ConstraintSense::Equal).unwrap();
        model.setup();

        let (fixed, disabled) =
            reduce_constraints_with_bounds(&mut model, ATol::default()).unwrap();
        assert_eq!((fixed, disabled), (2, 1));
        assert_eq!(model.variable(x).value(), 2);
        assert_eq!(model.variable(y).value(), 2);
    }

    #[test]
    fn opposite_inequalities_combine() {
        let mut model = Model::new("m");
        let x = model.integer_variable("x", Bound::new(0, 10).unwrap());
        let y = model.integer_variable("y", Bound::new(0, 10).unwrap());
        let objective = model.expression().term(x, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        // x + y - 5 <= 0 and -x - y + 5 <= 0 combine into x + y = 5
        let le = model
            .expression()
            .term(x, 1.0)
            .term(y, 1.0)
            .constant(-5.0)
            .build();
        let le = model.add_constraint("le", le, ConstraintSense::Less).unwrap();
        let flipped = model
            .expression()
            .term(x, -1.0)
            .term(y, -1.0)
            .constant(5.0)
            .build();
        let flipped = model
            .add_constraint("ge", flipped, ConstraintSense::Less)
            .unwrap();
        model.setup();

        assert_eq!(remove_duplicate_constraints(&mut model), 1);
        assert_eq!(model.constraint(le).sense(), ConstraintSense::Equal);
        assert!(!model.constraint(flipped).is_enabled());
    }

    #[test]
    fn nested_set_rows_fix_the_outside() {
        // x0 + x1 + x2 = 1 nested inside x0 + .. + x4 <= 1: x3 and x4
        // can never be 1. The members of the inner row then share a
        // signature, so all but one of them fix as well.
        let mut model = Model::new("m");
        let ids = model.binary_variable_vector("x", 5);
        let objective = model.expression().term(ids[3], 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        let mut part = model.expression().constant(-1.0);
        for &id in &ids[..3] {
            part = part.term(id, 1.0);
        }
        model
            .add_constraint("part", part.build(), ConstraintSense::Equal)
            .unwrap();
        let mut pack = model.expression().constant(-1.0);
        for &id in &ids {
            pack = pack.term(id, 1.0);
        }
        model
            .add_constraint("pack", pack.build(), ConstraintSense::Less)
            .unwrap();
        model.setup();

        let fixed = fix_redundant_set_variables(&mut model);
        assert_eq!(fixed, 4);
        assert!(model.variable(ids[3]).is_fixed());
        assert!(model.variable(ids[4]).is_fixed());
        assert_eq!(model.variable(ids[3]).value(), 0);
        assert!(model.variable(ids[1]).is_fixed());
        assert!(model.variable(ids[2]).is_fixed());
        assert!(!model.variable(ids[0]).is_fixed());
    }

    #[test]
    fn single_row_dominance_keeps_the_cheapest() {
        // Nine binaries in three disjoint partitioning triples: within
        // each triple only the cheapest member needs to stay free.
        let mut model = Model::new("m");
        let ids = model.binary_variable_vector("x", 9);
        let mut objective = model.expression();
        for (i, &id) in ids.iter().enumerate() {
            objective = objective.term(id, 1.0 + i as f64);
        }
        model.set_objective(objective.build(), ObjectiveSense::Minimize);
        for triple in 0..3 {
            let mut lhs = model.expression().constant(-1.0);
            for k in 0..3 {
                lhs = lhs.term(ids[triple * 3 + k], 1.0);
            }
            model
                .add_constraint(&format!("part{triple}"), lhs.build(), ConstraintSense::Equal)
                .unwrap();
        }
        model.setup();

        let fixed = fix_redundant_set_variables(&mut model);
        assert_eq!(fixed, 6);
        for triple in 0..3 {
            assert!(!model.variable(ids[triple * 3]).is_fixed());
            assert!(model.variable(ids[triple * 3 + 1]).is_fixed());
            assert!(model.variable(ids[triple * 3 + 2]).is_fixed());
            assert_eq!(model.variable(ids[triple * 3 + 1]).value(), 0);
        }
    }

    #[test]
    fn interchangeable_set_variables_fix_to_zero() {
        // x0 and x1 appear in exactly the same two packing rows; only the
        // cheaper one needs to stay free.
        let mut model = Model::new("m");
        let ids = model.binary_variable_vector("x", 4);
        let objective = model
            .expression()
            .term(ids[0], 1.0)
            .term(ids[1], 2.0)
            .build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        let a = model
            .expression()
            .term(ids[0], 1.0)
            .term(ids[1], 1.0)
            .term(ids[2], 1.0)
            .constant(-1.0)
            .build();
        model.add_constraint("a", a, ConstraintSense::Less).unwrap();
        let b = model
            .expression()
            .term(ids[0], 1.0)
            .term(ids[1], 1.0)
            .term(ids[3], 1.0)
            .constant(-1.0)
            .build();
        model.add_constraint("b", b, ConstraintSense::Less).unwrap();
        model.setup();

        let fixed = fix_redundant_set_variables(&mut model);
        assert_eq!(fixed, 1);
        assert!(model.variable(ids[1]).is_fixed());
        assert!(!model.variable(ids[0]).is_fixed());
    }
}
