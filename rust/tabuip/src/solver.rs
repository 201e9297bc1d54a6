//! The outer solver: penalty/tabu orchestration with tenure adaptation,
//! penalty updating, initial-state modification, and restart logic.

pub mod lagrange_dual;
pub mod local_search;
mod option;
pub mod tabu_search;

pub use option::*;

use crate::preprocess;
use crate::{
    update_status, ATol, FeasibleSolutionArchive, IncumbentHolder, Memory, Model, NamedSolution,
    Neighborhood, TimeKeeper, VariableKind,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tabu_search::{TabuSearchControl, TabuSearchTerminationStatus};

/// Top-level reason the solver stopped. Budget exhaustion is an expected
/// outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TerminationStatus {
    TimeOver,
    IterationOver,
    NoMove,
    ReachTarget,
}

/// Counters and histories exported to `status.json`.
#[derive(Debug, Clone, Serialize)]
pub struct SolveStatus {
    pub name: String,
    pub termination_status: TerminationStatus,
    pub is_found_feasible_solution: bool,
    pub objective: f64,
    pub total_violation: f64,
    pub elapsed_time: f64,
    pub number_of_outer_iterations: usize,
    pub number_of_tabu_search_iterations: usize,
    pub number_of_lagrange_dual_iterations: usize,
    pub number_of_local_search_iterations: usize,
    pub number_of_newly_fixed_variables: usize,
    pub number_of_newly_disabled_constraints: usize,
    pub number_of_extracted_selections: usize,
    pub number_of_extracted_dependencies: usize,
    /// Largest global penalty coefficient after each outer round.
    pub penalty_coefficient_history: Vec<f64>,
    /// Displayed feasible incumbent objective after each outer round
    /// (`None` until one exists).
    pub feasible_incumbent_history: Vec<Option<f64>>,
}

#[derive(Debug, Clone)]
pub struct SolveResult {
    pub solution: NamedSolution,
    pub status: SolveStatus,
    pub feasible_solutions: Vec<NamedSolution>,
}

/// Solve `model` with the given options. The model must be fully built;
/// `setup` and preprocessing run inside.
pub fn solve(model: &mut Model, option: SolverOption) -> anyhow::Result<SolveResult> {
    let neighborhood = Neighborhood::new(option.neighborhood_config());
    solve_with_neighborhood(model, option, neighborhood)
}

/// Variant taking a prepared [`Neighborhood`], for callers that registered
/// a user-defined move generator.
pub fn solve_with_neighborhood(
    model: &mut Model,
    option: SolverOption,
    mut neighborhood: Neighborhood,
) -> anyhow::Result<SolveResult> {
    let time_keeper = TimeKeeper::new();
    let atol = ATol::default();
    option.validate()?;
    model.validate()?;
    model.setup();

    let summary = preprocess::run(model, &option.preprocess_config(), atol)?;
    preprocess::verify_and_correct_initial_values(
        model,
        option.preprocess.is_enabled_initial_value_correction,
    )?;

    for c in model.constraints_mut() {
        c.set_global_penalty_coefficient(option.penalty.initial_penalty_coefficient);
        c.reset_local_penalty_coefficient();
        c.reset_violation_count();
    }

    let mut rng = StdRng::seed_from_u64(option.general.seed);
    let mut incumbent_holder = IncumbentHolder::default();
    let mut memory = Memory::new(model.number_of_variables());
    let mut archive = FeasibleSolutionArchive::new(option.output.feasible_solutions_capacity);

    let mut current_values = model.export_variable_values();
    let mut number_of_lagrange_dual_iterations = 0;
    let mut number_of_local_search_iterations = 0;

    if option.lagrange_dual.is_enabled {
        let result = lagrange_dual::solve(
            model,
            &mut incumbent_holder,
            &mut archive,
            &option,
            &current_values,
            &time_keeper,
            atol,
        );
        number_of_lagrange_dual_iterations = result.number_of_iterations;
        current_values = result.primal_values.clone();
        // The multipliers seed the penalty coefficients, capped at the
        // configured initial value.
        for (index, &dual) in result.dual_values.iter().enumerate() {
            let coefficient = dual
                .abs()
                .max(1.0)
                .min(option.penalty.initial_penalty_coefficient);
            let id = crate::ConstraintID::from(index);
            model.constraint_mut(id).set_global_penalty_coefficient(coefficient);
            model.constraint_mut(id).reset_local_penalty_coefficient();
        }
        tracing::info!(
            lagrangian = result.lagrangian,
            iterations = result.number_of_iterations,
            "lagrange dual finished"
        );
    }

    if option.local_search.is_enabled {
        let mut local_rng = StdRng::seed_from_u64(option.local_search.seed);
        let result = local_search::solve(
            model,
            &mut neighborhood,
            &mut incumbent_holder,
            &mut memory,
            &mut archive,
            &option,
            &current_values,
            &time_keeper,
            &mut local_rng,
            atol,
        )?;
        number_of_local_search_iterations = result.number_of_iterations;
        if result.total_update_status != update_status::NO_UPDATE {
            current_values = incumbent_holder
                .global_augmented_incumbent_solution()
                .variable_values
                .clone();
        }
        tracing::info!(
            iterations = result.number_of_iterations,
            status = ?result.termination_status,
            "local search finished"
        );
    }

    let mut termination_status = TerminationStatus::IterationOver;
    let mut number_of_tabu_search_iterations = 0;
    let mut penalty_coefficient_history = Vec::new();
    let mut feasible_incumbent_history = Vec::new();

    let mut tenure = option.tabu_search.initial_tabu_tenure;
    let mut iteration_budget = option.tabu_search.iteration_max as f64;
    let mut stagnant_rounds = 0usize;

    let mut outer_iteration = 0usize;
    while outer_iteration < option.general.iteration_max {
        if time_keeper.clock() > option.general.time_max {
            termination_status = TerminationStatus::TimeOver;
            break;
        }
        if tabu_search::target_reached(
            model,
            &incumbent_holder,
            option.general.target_objective_value,
        ) {
            termination_status = TerminationStatus::ReachTarget;
            break;
        }

        incumbent_holder.reset_local_augmented_incumbent();
        let control = TabuSearchControl {
            iteration_max: (iteration_budget.round() as usize).max(1),
            initial_tabu_tenure: tenure,
        };
        let result = tabu_search::solve(
            model,
            &mut neighborhood,
            &mut incumbent_holder,
            &mut memory,
            &mut archive,
            &option,
            &control,
            &current_values,
            &time_keeper,
            &mut rng,
            atol,
        )?;
        number_of_tabu_search_iterations += result.number_of_iterations;
        tenure = result.tabu_tenure;

        match result.termination_status {
            TabuSearchTerminationStatus::ReachTarget => {
                termination_status = TerminationStatus::ReachTarget;
                break;
            }
            TabuSearchTerminationStatus::TimeOver => {
                termination_status = TerminationStatus::TimeOver;
                break;
            }
            TabuSearchTerminationStatus::NoMove => {
                // No admissible move exists; perturbing the state cannot
                // create one, so the search is over.
                termination_status = TerminationStatus::NoMove;
                break;
            }
            TabuSearchTerminationStatus::IterationOver
            | TabuSearchTerminationStatus::LocalOptimal => {}
        }

        let improved_global = result.total_update_status & update_status::GLOBAL != 0;
        let improved_feasible = result.total_update_status & update_status::FEASIBLE != 0;
        if improved_feasible {
            stagnant_rounds = 0;
        } else {
            stagnant_rounds += 1;
        }

        // Tabu saturation: improving moves existed but were all tabu.
        // Give the next round more freedom by raising the tenure ceiling.
        if result.termination_status == TabuSearchTerminationStatus::LocalOptimal
            && result.number_of_improving_moves_rejected_by_tabu > 0
        {
            tenure = (tenure + 1).min(model.number_of_mutable_variables().max(1));
        }

        update_penalty_coefficients(model, &incumbent_holder, &option, atol);
        if option.penalty.penalty_coefficient_reset_count_threshold > 0
            && stagnant_rounds > option.penalty.penalty_coefficient_reset_count_threshold
        {
            for c in model.constraints_mut() {
                c.set_global_penalty_coefficient(option.penalty.initial_penalty_coefficient);
                c.reset_local_penalty_coefficient();
            }
            stagnant_rounds = 0;
            tracing::debug!("penalty coefficients reset to the initial value");
        }

        if option.tabu_search.is_enabled_automatic_iteration_adjustment {
            let budget = control.iteration_max as f64;
            let finished_early = result.number_of_iterations < control.iteration_max;
            let improved_late = improved_global
                && result.last_global_augmented_incumbent_update_iteration as f64
                    > 0.9 * budget;
            if improved_late {
                iteration_budget = (iteration_budget
                    * option.tabu_search.iteration_increase_rate)
                    .min(option.tabu_search.iteration_max as f64);
            } else if finished_early {
                iteration_budget =
                    (iteration_budget * option.tabu_search.iteration_decrease_rate).max(10.0);
            }
        }

        current_values = incumbent_holder
            .global_augmented_incumbent_solution()
            .variable_values
            .clone();
        modify_initial_values(model, &mut current_values, &option, &mut rng);

        let max_penalty = model
            .constraint_reference()
            .enabled
            .iter()
            .map(|&id| model.constraint(id).global_penalty_coefficient())
            .fold(0.0, f64::max);
        penalty_coefficient_history.push(max_penalty);
        feasible_incumbent_history.push(if incumbent_holder.has_feasible_incumbent() {
            Some(
                model
                    .objective()
                    .displayed_value(incumbent_holder.feasible_incumbent_objective()),
            )
        } else {
            None
        });

        tracing::info!(
            outer_iteration,
            improved_global,
            improved_feasible,
            tenure,
            status = ?result.termination_status,
            "outer loop"
        );
        outer_iteration += 1;
    }

    // Export the best solution: feasible incumbent when one exists, the
    // global-augmented incumbent otherwise.
    let best = if incumbent_holder.has_feasible_incumbent() {
        incumbent_holder.feasible_incumbent_solution().clone()
    } else {
        incumbent_holder.global_augmented_incumbent_solution().clone()
    };
    model.import_variable_values(&best.variable_values);
    let solution = model.export_named_solution(&model.export_plain_solution(atol));

    let status = SolveStatus {
        name: model.name().to_string(),
        termination_status,
        is_found_feasible_solution: incumbent_holder.has_feasible_incumbent(),
        objective: solution.objective,
        total_violation: solution.total_violation,
        elapsed_time: time_keeper.clock(),
        number_of_outer_iterations: outer_iteration,
        number_of_tabu_search_iterations,
        number_of_lagrange_dual_iterations,
        number_of_local_search_iterations,
        number_of_newly_fixed_variables: summary.number_of_newly_fixed_variables,
        number_of_newly_disabled_constraints: summary.number_of_newly_disabled_constraints,
        number_of_extracted_selections: summary.number_of_extracted_selections,
        number_of_extracted_dependencies: summary.number_of_extracted_dependencies,
        penalty_coefficient_history,
        feasible_incumbent_history,
    };

    let feasible_solutions = archive
        .solutions()
        .iter()
        .map(|plain| model.export_named_solution(plain))
        .collect();

    Ok(SolveResult {
        solution,
        status,
        feasible_solutions,
    })
}

/// Relax every penalty while the augmented search is already feasible;
/// otherwise tighten the violated rows, biased by their violation counts.
/// The balance term applies to tightening only. Local coefficients reset
/// to the global ones afterwards.
fn update_penalty_coefficients(
    model: &mut Model,
    incumbent_holder: &IncumbentHolder,
    option: &SolverOption,
    atol: ATol,
) {
    let penalty = &option.penalty;
    let relax = incumbent_holder.has_feasible_incumbent()
        && incumbent_holder.global_augmented_incumbent_score().is_feasible;

    let enabled = model.constraint_reference().enabled.clone();
    if relax {
        for &id in &enabled {
            let coefficient = model.constraint(id).global_penalty_coefficient()
                * penalty.penalty_coefficient_relaxing_rate;
            model
                .constraint_mut(id)
                .set_global_penalty_coefficient(coefficient.max(1.0));
        }
    } else {
        // Violations are read from the global-augmented incumbent state.
        model.import_variable_values(
            &incumbent_holder
                .global_augmented_incumbent_solution()
                .variable_values,
        );
        let max_count = enabled
            .iter()
            .map(|&id| model.constraint(id).violation_count())
            .max()
            .unwrap_or(0)
            .max(1);
        let balance = penalty.penalty_coefficient_updating_balance;
        let mut tightened_max: f64 = 0.0;
        let mut tightened: Vec<crate::ConstraintID> = Vec::new();
        for &id in &enabled {
            let violation = model.constraint(id).violation_value();
            if violation <= *atol {
                continue;
            }
            let balance_term = (1.0 - balance)
                + balance * model.constraint(id).violation_count() as f64 / max_count as f64;
            let coefficient = model.constraint(id).global_penalty_coefficient()
                * (1.0
                    + penalty.penalty_coefficient_tightening_rate
                        * violation.max(1.0)
                        * balance_term);
            model
                .constraint_mut(id)
                .set_global_penalty_coefficient(coefficient);
            tightened_max = tightened_max.max(coefficient);
            tightened.push(id);
        }
        if penalty.is_enabled_grouping_penalty_coefficient {
            for id in tightened {
                model
                    .constraint_mut(id)
                    .set_global_penalty_coefficient(tightened_max);
            }
        }
    }
    for &id in &enabled {
        model.constraint_mut(id).reset_local_penalty_coefficient();
    }
}

/// Build the next round's starting point from the incumbent: keep
/// `move_preserve_rate` of the assignment, randomize the remainder with
/// `initial_modification_randomize_rate`, then apply the configured number
/// of random flips (or `initial_modification_fixed_rate` of the mutable
/// variables when no explicit count is set).
fn modify_initial_values(
    model: &Model,
    values: &mut [i64],
    option: &SolverOption,
    rng: &mut StdRng,
) {
    let tabu = &option.tabu_search;
    if !tabu.is_enabled_initial_modification {
        return;
    }

    // Selection members and dependent variables are perturbed through
    // their structure, never flipped in isolation.
    let standalone: Vec<crate::VariableID> = model
        .variable_reference()
        .mutable
        .iter()
        .copied()
        .filter(|&id| {
            let kind = model.variable(id).kind();
            kind != VariableKind::Selection && !kind.is_dependent()
        })
        .collect();

    for &id in &standalone {
        if rng.gen::<f64>() < tabu.move_preserve_rate {
            continue;
        }
        if rng.gen::<f64>() < tabu.initial_modification_randomize_rate {
            if let Some(value) = random_value_in_bound(model, id, rng) {
                values[*id] = value;
            }
        }
    }

    let count = if tabu.number_of_initial_modification > 0 {
        tabu.number_of_initial_modification
    } else {
        (tabu.initial_modification_fixed_rate * model.number_of_mutable_variables() as f64)
            .ceil() as usize
    };
    for _ in 0..count {
        if !standalone.is_empty() && (model.selections().is_empty() || rng.gen::<bool>()) {
            let id = standalone[rng.gen_range(0..standalone.len())];
            values[*id] = match model.variable(id).kind() {
                VariableKind::Binary => 1 - values[*id],
                _ => match random_value_in_bound(model, id, rng) {
                    Some(value) => value,
                    None => values[*id],
                },
            };
        } else if !model.selections().is_empty() {
            // Switch a random selection to a random member.
            let selection =
                &model.selections()[rng.gen_range(0..model.selections().len())];
            let members = selection.members();
            let chosen = members[rng.gen_range(0..members.len())];
            for &member in members {
                if !model.variable(member).is_fixed() {
                    values[*member] = i64::from(member == chosen);
                }
            }
        }
    }
}

fn random_value_in_bound(
    model: &Model,
    id: crate::VariableID,
    rng: &mut StdRng,
) -> Option<i64> {
    let bound = model.variable(id).bound();
    if bound.is_finite() {
        Some(rng.gen_range(bound.lower()..=bound.upper()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bound, ConstraintSense, ObjectiveSense};

    fn quick_option() -> SolverOption {
        let mut option = SolverOption::default();
        option.general.iteration_max = 10;
        option.general.time_max = 10.0;
        option.tabu_search.iteration_max = 100;
        option.local_search.is_enabled = false;
        option
    }

    #[test]
    fn trivial_bound_fix_reports_feasible_incumbent() {
        // min x s.t. 2x = 4: preprocessing fixes everything.
        let mut model = Model::new("trivial");
        let x = model.integer_variable("x", Bound::new(0, 10).unwrap());
        let objective = model.expression().term(x, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        let lhs = model.expression().term(x, 2.0).constant(-4.0).build();
        model.add_constraint("c", lhs, ConstraintSense::Equal).unwrap();

        let result = solve(&mut model, quick_option()).unwrap();
        assert!(result.status.is_found_feasible_solution);
        assert_eq!(result.solution.objective, 2.0);
        assert_eq!(result.solution.value_of("x"), Some(2));
    }

    #[test]
    fn binary_selection_finds_the_cheapest_member() {
        // min sum i * x_i with sum x_i = 1 over ten binaries: the members
        // live in a single set row, so dominance and the singleton pass
        // settle the whole model in preprocessing.
        let mut model = Model::new("selection");
        let ids = model.binary_variable_vector("x", 10);
        let mut objective = model.expression();
        for (i, &id) in ids.iter().enumerate() {
            objective = objective.term(id, i as f64);
        }
        model.set_objective(objective.build(), ObjectiveSense::Minimize);
        let mut lhs = model.expression().constant(-1.0);
        for &id in &ids {
            lhs = lhs.term(id, 1.0);
        }
        model
            .add_constraint("one", lhs.build(), ConstraintSense::Equal)
            .unwrap();

        let result = solve(&mut model, quick_option()).unwrap();
        assert!(result.status.is_found_feasible_solution);
        assert_eq!(result.solution.objective, 0.0);
        assert_eq!(result.solution.value_of("x[ 0]"), Some(1));
        assert!(result.status.number_of_newly_fixed_variables >= 9);
    }

    #[test]
    fn triangle_requires_composed_moves() {
        // max x + y + z with pairwise x + y <= 10: optimum 15.
        let mut model = Model::new("triangle");
        let x = model.integer_variable("x", Bound::new(0, 10).unwrap());
        let y = model.integer_variable("y", Bound::new(0, 10).unwrap());
        let z = model.integer_variable("z", Bound::new(0, 10).unwrap());
        let objective = model
            .expression()
            .term(x, 1.0)
            .term(y, 1.0)
            .term(z, 1.0)
            .build();
        model.set_objective(objective, ObjectiveSense::Maximize);
        for (name, a, b) in [("xy", x, y), ("yz", y, z), ("xz", x, z)] {
            let lhs = model
                .expression()
                .term(a, 1.0)
                .term(b, 1.0)
                .constant(-10.0)
                .build();
            model.add_constraint(name, lhs, ConstraintSense::Less).unwrap();
        }

        let mut option = quick_option();
        option.general.iteration_max = 300;
        option.general.time_max = 30.0;
        let result = solve(&mut model, option).unwrap();
        assert!(result.status.is_found_feasible_solution);
        assert_eq!(result.solution.objective, 15.0);
        assert_eq!(result.solution.total_violation, 0.0);
    }

    #[test]
    fn redundant_set_fixing_solves_in_zero_tabu_iterations() {
        // Nine binaries, three partitioning triples, a unique minimizer:
        // dominance keeps the cheapest member per triple, the singleton
        // pass finishes the rest, and the tabu search never iterates.
        let mut model = Model::new("sets");
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

        let result = solve(&mut model, quick_option()).unwrap();
        assert!(result.status.number_of_newly_fixed_variables >= 3);
        assert_eq!(result.status.number_of_tabu_search_iterations, 0);
        assert!(result.status.is_found_feasible_solution);
        // Cheapest member of each triple: 1 + 4 + 7
        assert_eq!(result.solution.objective, 12.0);
        assert_eq!(result.solution.value_of("x[ 0]"), Some(1));
        assert_eq!(result.solution.value_of("x[ 3]"), Some(1));
        assert_eq!(result.solution.value_of("x[ 6]"), Some(1));
    }
}
