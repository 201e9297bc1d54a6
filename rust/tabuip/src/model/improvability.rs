use crate::{ATol, Model, VariableID};

impl Model {
    pub fn reset_variable_objective_improvabilities(&mut self) {
        for v in &mut self.variables {
            v.set_is_objective_improvable(false);
        }
    }

    pub fn reset_variable_feasibility_improvabilities(&mut self) {
        for v in &mut self.variables {
            v.set_is_feasibility_improvable(false);
        }
    }

    /// Refresh `is_objective_improvable` for `targets` (all mutable
    /// variables when `None`). A variable is objective-improvable iff
    /// stepping it toward the favorable bound strictly decreases the
    /// internal (minimization) objective and the margin allows the step.
    pub fn update_variable_objective_improvabilities(&mut self, targets: Option<&[VariableID]>) {
        let ids: Vec<VariableID> = match targets {
            Some(targets) => targets.to_vec(),
            None => self.variable_reference.mutable.clone(),
        };
        for id in ids {
            let v = &self.variables[*id];
            if v.is_fixed() {
                continue;
            }
            let sensitivity = v.objective_sensitivity();
            let improvable = (sensitivity > 0.0 && v.has_lower_bound_margin())
                || (sensitivity < 0.0 && v.has_upper_bound_margin());
            self.variables[*id].set_is_objective_improvable(improvable);
        }
    }

    /// Refresh `is_feasibility_improvable` for `targets` (all mutable
    /// variables when `None`). A variable is feasibility-improvable iff it
    /// participates in some violated enabled constraint and can step in the
    /// direction that reduces that violation.
    pub fn update_variable_feasibility_improvabilities(
        &mut self,
        targets: Option<&[VariableID]>,
        atol: ATol,
    ) {
        let ids: Vec<VariableID> = match targets {
            Some(targets) => targets.to_vec(),
            None => self.variable_reference.mutable.clone(),
        };
        for id in ids {
            if self.variables[*id].is_fixed() {
                continue;
            }
            let improvable = self.is_feasibility_improvable_now(id, atol);
            self.variables[*id].set_is_feasibility_improvable(improvable);
        }
    }

    fn is_feasibility_improvable_now(&self, id: VariableID, atol: ATol) -> bool {
        let v = &self.variables[*id];
        for &(constraint, coefficient) in v.constraint_sensitivities() {
            let c = &self.constraints[*constraint];
            if !c.is_enabled() {
                continue;
            }
            // Violated from above: decreasing f(x) helps.
            if c.is_less_or_equal() && c.positive_part() > *atol {
                if (coefficient > 0.0 && v.has_lower_bound_margin())
                    || (coefficient < 0.0 && v.has_upper_bound_margin())
                {
                    return true;
                }
            }
            // Violated from below: increasing f(x) helps.
            if c.is_greater_or_equal() && c.negative_part() > *atol {
                if (coefficient > 0.0 && v.has_upper_bound_margin())
                    || (coefficient < 0.0 && v.has_lower_bound_margin())
                {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bound, ConstraintSense, ObjectiveSense};

    fn model() -> Model {
        let mut model = Model::new("improvability");
        let x = model.integer_variable("x", Bound::new(0, 10).unwrap());
        let y = model.integer_variable("y", Bound::new(0, 10).unwrap());
        let objective = model.expression().term(x, 1.0).term(y, -1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        let lhs = model
            .expression()
            .term(x, 1.0)
            .term(y, 1.0)
            .constant(-10.0)
            .build();
        model.add_constraint("cap", lhs, ConstraintSense::Less).unwrap();
        model.setup();
        model
    }

    #[test]
    fn objective_improvability_follows_sensitivity_and_margin() {
        let mut model = model();
        let x = model.variable_by_name("x").unwrap();
        let y = model.variable_by_name("y").unwrap();
        model.import_variable_values(&[5, 5]);
        model.update_variable_objective_improvabilities(None);
        // x has positive sensitivity and lower margin
        assert!(model.variable(x).is_objective_improvable());
        // y has negative sensitivity and upper margin
        assert!(model.variable(y).is_objective_improvable());

        // At its favorable bound, x stops being improvable
        model.import_variable_values(&[0, 5]);
        model.update_variable_objective_improvabilities(None);
        assert!(!model.variable(x).is_objective_improvable());
    }

    #[test]
    fn feasibility_improvability_requires_violation() {
        let mut model = model();
        let x = model.variable_by_name("x").unwrap();
        let y = model.variable_by_name("y").unwrap();

        model.import_variable_values(&[3, 3]);
        model.update_variable_feasibility_improvabilities(None, ATol::default());
        assert!(!model.variable(x).is_feasibility_improvable());

        // x + y = 16 > 10: both can step down
        model.import_variable_values(&[8, 8]);
        model.update_variable_feasibility_improvabilities(None, ATol::default());
        assert!(model.variable(x).is_feasibility_improvable());
        assert!(model.variable(y).is_feasibility_improvable());

        // x at lower bound cannot step down
        model.import_variable_values(&[0, 10]);
        model.update_variable_feasibility_improvabilities(None, ATol::default());
        assert!(!model.variable(x).is_feasibility_improvable());
    }

    #[test]
    fn restricted_update_touches_only_targets() {
        let mut model = model();
        let x = model.variable_by_name("x").unwrap();
        let y = model.variable_by_name("y").unwrap();
        model.import_variable_values(&[8, 8]);
        model.reset_variable_feasibility_improvabilities();
        model.update_variable_feasibility_improvabilities(Some(&[x]), ATol::default());
        assert!(model.variable(x).is_feasibility_improvable());
        // y was not in the target set, so its stale flag remains
        assert!(!model.variable(y).is_feasibility_improvable());
    }
}
