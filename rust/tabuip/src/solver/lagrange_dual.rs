use super::option::SolverOption;
use crate::{
    ATol, ConstraintSense, FeasibleSolutionArchive, FixedSizeQueue, IncumbentHolder, Model,
    TimeKeeper,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LagrangeDualTerminationStatus {
    TimeOver,
    IterationOver,
    Converge,
    ReachTarget,
}

#[derive(Debug, Clone)]
pub struct LagrangeDualResult {
    pub termination_status: LagrangeDualTerminationStatus,
    pub number_of_iterations: usize,
    /// Best Lagrangian found (a heuristic dual bound, not a certificate).
    pub lagrangian: f64,
    /// Primal values at the best Lagrangian, usable as a starting point.
    pub primal_values: Vec<i64>,
    /// Final multipliers, indexed by constraint arena order.
    pub dual_values: Vec<f64>,
}

/// Clamp each multiplier to the sign its constraint sense admits:
/// `f <= 0` needs `lambda >= 0`, `f >= 0` needs `lambda <= 0`, equalities
/// are unrestricted.
fn bound_duals(model: &Model, duals: &mut [f64]) {
    for &id in &model.constraint_reference().enabled {
        let dual = &mut duals[*id];
        match model.constraint(id).sense() {
            ConstraintSense::Less => *dual = dual.max(0.0),
            ConstraintSense::Greater => *dual = dual.min(0.0),
            ConstraintSense::Equal => {}
        }
    }
}

/// Projected subgradient on the dual multipliers: bound the duals, set each
/// free variable to the bound minimizing its reduced cost, step the duals
/// along the constraint values, and adapt the step size against a window
/// of recent Lagrangians.
pub fn solve(
    model: &mut Model,
    incumbent_holder: &mut IncumbentHolder,
    archive: &mut FeasibleSolutionArchive,
    option: &SolverOption,
    initial_values: &[i64],
    global_time_keeper: &TimeKeeper,
    atol: ATol,
) -> LagrangeDualResult {
    let time_keeper = TimeKeeper::new();
    let lagrange = &option.lagrange_dual;

    incumbent_holder.reset_local_augmented_incumbent();
    model.import_variable_values(initial_values);
    let score = model.evaluate_scratch(atol);
    incumbent_holder.try_update_incumbent(&model.export_plain_solution(atol), &score);

    let mut duals = vec![0.0; model.constraints().len()];
    bound_duals(model, &mut duals);

    let mut step_size = 1.0 / model.number_of_variables().max(1) as f64;
    let mut queue = FixedSizeQueue::new(lagrange.queue_size);

    let mut lagrangian_incumbent = f64::NEG_INFINITY;
    let mut primal_incumbent = model.export_variable_values();
    let mut dual_incumbent = duals.clone();

    let mut termination_status = LagrangeDualTerminationStatus::IterationOver;
    let mut iteration = 0usize;
    while iteration < lagrange.iteration_max {
        if time_keeper.clock() > lagrange.time_max
            || global_time_keeper.clock() + lagrange.time_offset > option.general.time_max
        {
            termination_status = LagrangeDualTerminationStatus::TimeOver;
            break;
        }
        if super::tabu_search::target_reached(
            model,
            incumbent_holder,
            option.general.target_objective_value,
        ) {
            termination_status = LagrangeDualTerminationStatus::ReachTarget;
            break;
        }

        // Dual step along the subgradient (the constraint values).
        for &id in &model.constraint_reference().enabled {
            duals[*id] += step_size * model.constraint(id).constraint_value();
        }
        bound_duals(model, &mut duals);

        // Primal: each free variable goes to the bound minimizing its
        // reduced cost.
        for &id in &model.variable_reference().mutable.clone() {
            let v = model.variable(id);
            let mut coefficient = v.objective_sensitivity();
            for &(constraint, sensitivity) in v.constraint_sensitivities() {
                coefficient += duals[*constraint] * sensitivity;
            }
            let bound = v.bound();
            let target = if coefficient > 0.0 {
                if !bound.has_lower() {
                    continue;
                }
                bound.lower()
            } else {
                if !bound.has_upper() {
                    continue;
                }
                bound.upper()
            };
            model.variable_mut(id).set_value_if_mutable(target);
        }
        model.update();
        let score = model.evaluate_scratch(atol);
        incumbent_holder.try_update_incumbent(&model.export_plain_solution(atol), &score);
        if score.is_feasible && option.output.is_enabled_store_feasible_solutions {
            archive.push(model.export_plain_solution(atol));
        }

        let lagrangian = model.compute_lagrangian(&duals);
        if lagrangian > lagrangian_incumbent {
            lagrangian_incumbent = lagrangian;
            primal_incumbent = model.export_variable_values();
            dual_incumbent = duals.clone();
        }

        queue.push(lagrangian);
        let queue_average = queue.average();
        if !queue.is_empty() {
            if lagrangian > queue_average {
                step_size *= lagrange.step_size_extend_rate;
            }
            if lagrangian < queue.max() {
                step_size *= lagrange.step_size_reduce_rate;
            }
        }

        if lagrange.log_interval > 0 && iteration % lagrange.log_interval == 0 {
            tracing::debug!(iteration, lagrangian, step_size, "lagrange dual");
        }

        if queue.is_full()
            && (lagrangian - queue_average).abs()
                < queue_average.abs().max(1.0) * lagrange.tolerance
        {
            termination_status = LagrangeDualTerminationStatus::Converge;
            break;
        }
        iteration += 1;
    }

    LagrangeDualResult {
        termination_status,
        number_of_iterations: iteration,
        lagrangian: lagrangian_incumbent,
        primal_values: primal_incumbent,
        dual_values: dual_incumbent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bound, ObjectiveSense};

    #[test]
    fn converges_on_a_simple_cover() {
        // min x + y subject to x + y >= 4, x, y in [0, 5]
        let mut model = Model::new("ld");
        let x = model.integer_variable("x", Bound::new(0, 5).unwrap());
        let y = model.integer_variable("y", Bound::new(0, 5).unwrap());
        let objective = model.expression().term(x, 1.0).term(y, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        let lhs = model
            .expression()
            .term(x, 1.0)
            .term(y, 1.0)
            .constant(-4.0)
            .build();
        model.add_constraint("cover", lhs, ConstraintSense::Greater).unwrap();
        model.setup();

        let mut option = SolverOption::default();
        option.lagrange_dual.is_enabled = true;
        option.lagrange_dual.iteration_max = 2000;
        let mut holder = IncumbentHolder::default();
        let mut archive = FeasibleSolutionArchive::new(10);
        let keeper = TimeKeeper::new();
        let initial = model.export_variable_values();

        let result = solve(
            &mut model,
            &mut holder,
            &mut archive,
            &option,
            &initial,
            &keeper,
            ATol::default(),
        );

        // The dual bound of the LP relaxation is 4
        assert!(result.lagrangian <= 4.0 + 1e-6);
        assert!(result.lagrangian > 0.0);
        // The multiplier for the >= row stays non-positive
        assert!(result.dual_values[0] <= 0.0);
        assert!(matches!(
            result.termination_status,
            LagrangeDualTerminationStatus::Converge
                | LagrangeDualTerminationStatus::IterationOver
        ));
    }
}
