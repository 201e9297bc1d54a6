use crate::{ConstraintID, Expression, Model, VariableID, VariableKind};
use std::collections::BTreeSet;

/// Extract dependent variables from the dependency-shaped equalities left
/// after reduction (exclusive-or/nor, inverted/balanced integers, constant
/// sum/difference/ratio, general intermediate rows).
///
/// For each accepted row, the key variable receives its defining
/// expression, is substituted out of the objective and every enabled
/// constraint, and the defining row is disabled. Chains are broken on
/// detection: a variable already feeding an extracted definition can no
/// longer become dependent itself, and keys never appear in later
/// definitions because substitution removed them from every enabled row.
pub fn extract_dependent_variables(model: &mut Model) -> usize {
    let candidates: Vec<ConstraintID> = model
        .constraint_reference()
        .enabled
        .iter()
        .copied()
        .filter(|&id| model.constraint(id).kind().is_dependency_defining())
        .collect();

    // Variables referenced by some defining expression; extracting one of
    // these as a key would create a chain.
    let mut sources: BTreeSet<VariableID> = BTreeSet::new();

    let mut extracted = 0;
    for id in candidates {
        let c = model.constraint(id);
        if !c.is_enabled() {
            continue;
        }
        let Some(key) = c.key_variable() else {
            continue;
        };
        let key_variable = model.variable(key);
        if key_variable.is_fixed()
            || key_variable.kind() == VariableKind::Selection
            || key_variable.kind().is_dependent()
            || sources.contains(&key)
        {
            continue;
        }

        let Some(defining) = defining_expression(model, id, key) else {
            continue;
        };

        // The defining value must stay within the key's bound for every
        // admissible assignment of the sources.
        if !bound_covers(model, key, &defining) {
            continue;
        }

        tracing::debug!(
            constraint = model.constraint(id).name(),
            key = model.variable(key).name(),
            "extract dependent variable"
        );
        sources.extend(defining.sensitivities().keys().copied());
        model.add_dependency(key, defining, id);
        extracted += 1;
    }
    extracted
}

/// `a_key * key + rest + c0 = 0` solved for the key:
/// `key = -(rest + c0) / a_key`. The key coefficient is +-1 for every
/// dependency-defining kind, so the division preserves integrality.
fn defining_expression(
    model: &Model,
    constraint: ConstraintID,
    key: VariableID,
) -> Option<Expression> {
    let expression = model.constraint(constraint).expression();
    let key_coefficient = expression.coefficient(key);
    if key_coefficient.abs() != 1.0 {
        return None;
    }
    let mut defining = Expression::default();
    for (&variable, &coefficient) in expression.sensitivities() {
        if variable == key {
            continue;
        }
        defining.add_term(variable, -coefficient / key_coefficient);
    }
    defining.set_constant(-expression.constant() / key_coefficient);
    Some(defining)
}

fn bound_covers(model: &Model, key: VariableID, defining: &Expression) -> bool {
    let mut minimum = defining.constant();
    let mut maximum = defining.constant();
    for (&variable, &coefficient) in defining.sensitivities() {
        let bound = model.variable(variable).bound();
        if !bound.is_finite() {
            return false;
        }
        let a = coefficient * bound.lower() as f64;
        let b = coefficient * bound.upper() as f64;
        minimum += a.min(b);
        maximum += a.max(b);
    }
    let bound = model.variable(key).bound();
    bound.lower() as f64 <= minimum && maximum <= bound.upper() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bound, ConstraintSense, ObjectiveSense};
    use approx::assert_abs_diff_eq;

    #[test]
    fn exclusive_or_yields_complement() {
        let mut model = Model::new("m");
        let x = model.binary_variable("x");
        let y = model.binary_variable("y");
        let objective = model.expression().term(x, 1.0).term(y, 2.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        let lhs = model
            .expression()
            .term(x, 1.0)
            .term(y, 1.0)
            .constant(-1.0)
            .build();
        let c = model.add_constraint("xor", lhs, ConstraintSense::Equal).unwrap();
        model.setup();

        assert_eq!(extract_dependent_variables(&mut model), 1);
        model.setup();

        assert_eq!(model.variable(y).kind(), VariableKind::DependentBinary);
        assert!(!model.constraint(c).is_enabled());
        // y = 1 - x, so the objective became 2 - x
        assert_abs_diff_eq!(model.objective().expression().coefficient(x), -1.0);
        assert_abs_diff_eq!(model.objective().expression().constant(), 2.0);

        model.variable_mut(x).set_value(1).unwrap();
        model.update();
        assert_eq!(model.variable(y).value(), 0);
    }

    #[test]
    fn ratio_key_follows_the_driver() {
        let mut model = Model::new("m");
        let x = model.integer_variable("x", Bound::new(0, 3).unwrap());
        let y = model.integer_variable("y", Bound::new(0, 9).unwrap());
        let objective = model.expression().term(y, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        // 3x - y = 0
        let lhs = model.expression().term(x, 3.0).term(y, -1.0).build();
        model.add_constraint("ratio", lhs, ConstraintSense::Equal).unwrap();
        model.setup();

        assert_eq!(extract_dependent_variables(&mut model), 1);
        model.setup();
        model.variable_mut(x).set_value(2).unwrap();
        model.update();
        assert_eq!(model.variable(y).value(), 6);
    }

    #[test]
    fn chain_is_broken_on_detection() {
        let mut model = Model::new("m");
        let x = model.integer_variable("x", Bound::new(-4, 4).unwrap());
        let y = model.integer_variable("y", Bound::new(-4, 4).unwrap());
        let z = model.integer_variable("z", Bound::new(-4, 4).unwrap());
        let objective = model.expression().term(z, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        // y = x and then x = z would chain through x
        let first = model.expression().term(x, 1.0).term(y, -1.0).build();
        model.add_constraint("yx", first, ConstraintSense::Equal).unwrap();
        let second = model.expression().term(z, 1.0).term(x, -1.0).build();
        model.add_constraint("xz", second, ConstraintSense::Equal).unwrap();
        model.setup();

        // Only one of the two rows can be extracted
        assert_eq!(extract_dependent_variables(&mut model), 1);
    }

    #[test]
    fn narrow_key_bound_blocks_extraction() {
        let mut model = Model::new("m");
        let x = model.integer_variable("x", Bound::new(0, 9).unwrap());
        let y = model.integer_variable("y", Bound::new(0, 3).unwrap());
        let objective = model.expression().term(y, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        // x - y = 0, but y cannot represent all of x's values
        let lhs = model.expression().term(x, 1.0).term(y, -1.0).build();
        model.add_constraint("bal", lhs, ConstraintSense::Equal).unwrap();
        model.setup();

        assert_eq!(extract_dependent_variables(&mut model), 0);
    }
}
