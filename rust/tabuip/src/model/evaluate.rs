use crate::{ATol, Model, Move, SolutionScore};

impl Model {
    /// Score the current state from scratch: every enabled constraint is
    /// visited. Used for the very first evaluation and for verification of
    /// the incremental path.
    pub fn evaluate_scratch(&self, atol: ATol) -> SolutionScore {
        let mut total_violation = 0.0;
        let mut local_penalty = 0.0;
        let mut global_penalty = 0.0;
        for &id in &self.constraint_reference().enabled {
            let c = self.constraint(id);
            let value = c.constraint_value();
            let violation = c.violation_of(value);
            total_violation += violation;
            local_penalty += c.local_penalty_of(value);
            global_penalty += c.global_penalty_coefficient() * violation;
        }
        let objective = self.objective().expression().value();
        SolutionScore {
            objective,
            total_violation,
            local_penalty,
            global_penalty,
            local_augmented_objective: objective + local_penalty,
            global_augmented_objective: objective + global_penalty,
            is_feasible: total_violation < *atol,
            is_objective_improvable: false,
            is_feasibility_improvable: false,
            ..Default::default()
        }
    }

    /// Score the state `mv` would produce, starting from `previous`. Only
    /// the move's related constraints are touched: O(variables moved).
    ///
    /// Agrees with [`Self::evaluate_scratch`] applied after the move, to
    /// floating-point tolerance.
    pub fn evaluate_move(
        &self,
        mv: &Move,
        previous: &SolutionScore,
        atol: ATol,
    ) -> SolutionScore {
        let variables = self.variables();
        let objective = self
            .objective()
            .expression()
            .evaluate_move(variables, mv);

        let mut total_violation = previous.total_violation;
        let mut local_penalty = previous.local_penalty;
        let mut global_penalty = previous.global_penalty;
        for &id in mv.related_constraints() {
            let c = self.constraint(id);
            if !c.is_enabled() {
                continue;
            }
            let before = c.constraint_value();
            let after = c.expression().evaluate_move(variables, mv);
            let violation_delta = c.violation_of(after) - c.violation_of(before);
            total_violation += violation_delta;
            local_penalty += c.local_penalty_of(after) - c.local_penalty_of(before);
            global_penalty += c.global_penalty_coefficient() * violation_delta;
        }

        SolutionScore {
            objective,
            total_violation,
            local_penalty,
            global_penalty,
            local_augmented_objective: objective + local_penalty,
            global_augmented_objective: objective + global_penalty,
            is_feasible: total_violation < *atol,
            is_objective_improvable: objective < previous.objective - *atol,
            is_feasibility_improvable: total_violation < previous.total_violation - *atol,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Alteration, Bound, ConstraintSense, MoveSense, ObjectiveSense, VariableID,
    };
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    fn model() -> Model {
        let mut model = Model::new("eval");
        let x = model.integer_variable("x", Bound::new(0, 10).unwrap());
        let y = model.integer_variable("y", Bound::new(0, 10).unwrap());
        let z = model.integer_variable("z", Bound::new(0, 10).unwrap());
        let objective = model
            .expression()
            .term(x, 1.0)
            .term(y, -2.0)
            .term(z, 3.0)
            .build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        let c0 = model
            .expression()
            .term(x, 1.0)
            .term(y, 1.0)
            .constant(-10.0)
            .build();
        model.add_constraint("c0", c0, ConstraintSense::Less).unwrap();
        let c1 = model
            .expression()
            .term(y, 1.0)
            .term(z, -1.0)
            .constant(-2.0)
            .build();
        model.add_constraint("c1", c1, ConstraintSense::Equal).unwrap();
        model.setup();
        for c in model.constraints_mut() {
            c.set_global_penalty_coefficient(100.0);
            c.reset_local_penalty_coefficient();
        }
        model
    }

    #[test]
    fn scratch_scores_violations() {
        let mut model = model();
        let x = model.variable_by_name("x").unwrap();
        let y = model.variable_by_name("y").unwrap();
        model.variable_mut(x).set_value(8).unwrap();
        model.variable_mut(y).set_value(8).unwrap();
        model.update();
        let score = model.evaluate_scratch(ATol::default());
        // c0: 8 + 8 - 10 = 6 violated; c1: 8 - 0 - 2 = 6 violated
        assert_abs_diff_eq!(score.total_violation, 12.0);
        assert!(!score.is_feasible);
        assert_abs_diff_eq!(score.local_penalty, 1200.0);
        assert_abs_diff_eq!(
            score.local_augmented_objective,
            score.objective + 1200.0
        );
    }

    fn arbitrary_values() -> impl Strategy<Value = (Vec<i64>, Vec<i64>)> {
        (
            proptest::collection::vec(0i64..=10, 3),
            proptest::collection::vec(0i64..=10, 3),
        )
    }

    proptest! {
        /// The incremental path agrees with the scratch path for every
        /// start state and every move.
        #[test]
        fn fast_and_slow_evaluation_agree((start, target) in arbitrary_values()) {
            let mut model = model();
            model.import_variable_values(&start);
            let previous = model.evaluate_scratch(ATol::default());

            let alterations: Vec<Alteration> = target
                .iter()
                .enumerate()
                .map(|(i, &v)| Alteration::new(VariableID::from(i), v))
                .collect();
            let mut related: Vec<_> = alterations
                .iter()
                .flat_map(|a| model.variable(a.variable).related_constraints().iter().copied())
                .collect();
            related.sort_unstable();
            related.dedup();
            let mv = Move::new(MoveSense::General, alterations, related);

            let fast = model.evaluate_move(&mv, &previous, ATol::default());

            model.update_with_move(&mv).unwrap();
            let slow = model.evaluate_scratch(ATol::default());

            prop_assert!((fast.objective - slow.objective).abs() < 1e-9);
            prop_assert!((fast.total_violation - slow.total_violation).abs() < 1e-9);
            prop_assert!((fast.local_penalty - slow.local_penalty).abs() < 1e-9);
            prop_assert!((fast.global_penalty - slow.global_penalty).abs() < 1e-9);
            prop_assert_eq!(fast.is_feasible, slow.is_feasible);
        }
    }

    #[test]
    fn move_inverse_restores_caches() {
        let mut model = model();
        model.import_variable_values(&[1, 2, 3]);
        let before: Vec<f64> = model
            .constraints()
            .iter()
            .map(|c| c.constraint_value())
            .collect();

        let x = model.variable_by_name("x").unwrap();
        let mv = Move::new(
            MoveSense::Integer,
            [Alteration::new(x, 9)],
            model.variable(x).related_constraints().to_vec(),
        );
        let inverse = mv.inverse(&[model.variable(x).value()]);
        model.update_with_move(&mv).unwrap();
        model.update_with_move(&inverse).unwrap();

        let after: Vec<f64> = model
            .constraints()
            .iter()
            .map(|c| c.constraint_value())
            .collect();
        for (b, a) in before.iter().zip(&after) {
            assert_abs_diff_eq!(b, a, epsilon = 1e-9);
        }
    }
}
