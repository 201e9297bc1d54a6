use super::PreprocessError;
use crate::Model;

/// Verify the initial assignment against bounds and selection
/// multiplicities, correcting in place when allowed.
///
/// With correction disabled, any violation is a fatal model-validity
/// error; with correction enabled, out-of-bound values clamp to the bound
/// and each selection is repaired to exactly one selected member.
pub fn verify_and_correct_initial_values(
    model: &mut Model,
    is_enabled_correction: bool,
) -> Result<(), PreprocessError> {
    // Bounds.
    let out_of_bound: Vec<_> = model
        .variable_reference()
        .mutable
        .iter()
        .copied()
        .filter(|&id| {
            let v = model.variable(id);
            !v.bound().contains(v.value())
        })
        .collect();
    for id in out_of_bound {
        let v = model.variable(id);
        if !is_enabled_correction {
            return Err(PreprocessError::InvalidInitialValue {
                variable: v.name().to_string(),
                reason: format!("bound {}", v.bound()),
            });
        }
        let clamped = v.bound().clamp(v.value());
        tracing::warn!(
            variable = model.variable(id).name(),
            clamped,
            "initial value corrected to bound"
        );
        model.variable_mut(id).set_value_if_mutable(clamped);
    }

    // Selections: exactly one member at 1.
    for index in 0..model.selections().len() {
        let members = model.selections()[index].members().to_vec();
        let ones: Vec<_> = members
            .iter()
            .copied()
            .filter(|&m| model.variable(m).value() == 1)
            .collect();
        if ones.len() == 1 {
            continue;
        }
        if !is_enabled_correction {
            let selection = &model.selections()[index];
            return Err(PreprocessError::InvalidInitialValue {
                variable: model
                    .constraint(selection.constraint())
                    .name()
                    .to_string(),
                reason: format!("selection multiplicity {}", ones.len()),
            });
        }
        // Keep the first selected member, or promote the first member when
        // none is selected.
        let keep = ones.first().copied().unwrap_or(members[0]);
        for m in members {
            let target = if m == keep { 1 } else { 0 };
            model.variable_mut(m).set_value_if_mutable(target);
        }
        tracing::warn!(
            selection = model.variable(keep).name(),
            "selection initial values corrected"
        );
    }

    model.update();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bound, ConstraintSense, ObjectiveSense};

    fn selection_model() -> (Model, Vec<crate::VariableID>) {
        let mut model = Model::new("verify");
        let ids = model.binary_variable_vector("x", 3);
        let objective = model.expression().term(ids[0], 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        let mut lhs = model.expression().constant(-1.0);
        for &id in &ids {
            lhs = lhs.term(id, 1.0);
        }
        let c = model
            .add_constraint("one", lhs.build(), ConstraintSense::Equal)
            .unwrap();
        model.add_selection(ids.clone(), c);
        model.setup();
        (model, ids)
    }

    #[test]
    fn empty_selection_is_repaired() {
        let (mut model, ids) = selection_model();
        verify_and_correct_initial_values(&mut model, true).unwrap();
        let ones = ids
            .iter()
            .filter(|&&id| model.variable(id).value() == 1)
            .count();
        assert_eq!(ones, 1);
    }

    #[test]
    fn double_selection_is_repaired_to_the_first() {
        let (mut model, ids) = selection_model();
        model.variable_mut(ids[1]).set_value(1).unwrap();
        model.variable_mut(ids[2]).set_value(1).unwrap();
        model.update();
        verify_and_correct_initial_values(&mut model, true).unwrap();
        assert_eq!(model.variable(ids[1]).value(), 1);
        assert_eq!(model.variable(ids[2]).value(), 0);
    }

    #[test]
    fn violation_with_correction_disabled_is_fatal() {
        let (mut model, _) = selection_model();
        let result = verify_and_correct_initial_values(&mut model, false);
        assert!(matches!(
            result,
            Err(PreprocessError::InvalidInitialValue { .. })
        ));
    }

    #[test]
    fn out_of_bound_value_is_clamped() {
        let mut model = Model::new("clamp");
        let x = model.integer_variable("x", Bound::new(0, 10).unwrap());
        let objective = model.expression().term(x, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        model.setup();
        model.variable_mut(x).set_value_unchecked(12);
        model.update();
        verify_and_correct_initial_values(&mut model, true).unwrap();
        assert_eq!(model.variable(x).value(), 10);
    }
}
