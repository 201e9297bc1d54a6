use super::option::{ImprovabilityScreeningMode, SolverOption};
use crate::{
    AcceptancePolicy, ATol, FeasibleSolutionArchive, IncumbentHolder, Memory, Model,
    Neighborhood, TimeKeeper, VariableError, VariableID,
};
use rand::rngs::StdRng;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocalSearchTerminationStatus {
    TimeOver,
    IterationOver,
    NoMove,
    ReachTarget,
    LocalOptimal,
}

#[derive(Debug, Clone)]
pub struct LocalSearchResult {
    pub termination_status: LocalSearchTerminationStatus,
    pub number_of_iterations: usize,
    pub total_update_status: u8,
}

/// Deterministic steepest-descent warm-up: the tabu-search loop with zero
/// tenure and no adaptation, stopped at the first local optimum.
#[allow(clippy::too_many_arguments)]
pub fn solve(
    model: &mut Model,
    neighborhood: &mut Neighborhood,
    incumbent_holder: &mut IncumbentHolder,
    memory: &mut Memory,
    archive: &mut FeasibleSolutionArchive,
    option: &SolverOption,
    initial_values: &[i64],
    global_time_keeper: &TimeKeeper,
    rng: &mut StdRng,
    atol: ATol,
) -> Result<LocalSearchResult, VariableError> {
    let time_keeper = TimeKeeper::new();
    let local = &option.local_search;
    let screening = option.neighborhood.improvability_screening_mode;

    incumbent_holder.reset_local_augmented_incumbent();
    memory.reset_last_update_iterations();

    model.import_variable_values(initial_values);
    let mut score = model.evaluate_scratch(atol);
    let mut total_update_status =
        incumbent_holder.try_update_incumbent(&model.export_plain_solution(atol), &score);

    model.reset_variable_objective_improvabilities();
    model.reset_variable_feasibility_improvabilities();

    let mut changed_for_objective: Vec<VariableID> = Vec::new();
    let mut changed_for_feasibility: Vec<VariableID> = Vec::new();

    let mut termination_status = LocalSearchTerminationStatus::IterationOver;
    let mut iteration = 0usize;
    while iteration < local.iteration_max {
        if time_keeper.clock() > local.time_max
            || global_time_keeper.clock() + local.time_offset > option.general.time_max
        {
            termination_status = LocalSearchTerminationStatus::TimeOver;
            break;
        }
        if super::tabu_search::target_reached(
            model,
            incumbent_holder,
            option.general.target_objective_value,
        ) {
            termination_status = LocalSearchTerminationStatus::ReachTarget;
            break;
        }

        if screening != ImprovabilityScreeningMode::Off {
            if iteration == 0 {
                model.update_variable_objective_improvabilities(None);
                model.update_variable_feasibility_improvabilities(None, atol);
            } else {
                model.update_variable_objective_improvabilities(Some(&changed_for_objective));
                model.update_variable_feasibility_improvabilities(
                    Some(&changed_for_feasibility),
                    atol,
                );
            }
        }

        let policy = if screening == ImprovabilityScreeningMode::Off || !model.is_linear() {
            AcceptancePolicy::all()
        } else if score.is_feasible {
            AcceptancePolicy::objective_improvable_only()
        } else {
            AcceptancePolicy::feasibility_improvable_only()
        };

        neighborhood.update_moves(
            model,
            policy,
            option.parallel.is_enabled_parallel_neighborhood_update,
        );
        neighborhood.shuffle_moves(rng);

        if neighborhood.moves().is_empty() {
            termination_status = LocalSearchTerminationStatus::NoMove;
            break;
        }

        let selected = {
            let moves = neighborhood.moves();
            let mut selected = None;
            for (index, mv) in moves.iter().enumerate() {
                if !mv.is_available() {
                    continue;
                }
                let trial = model.evaluate_move(mv, &score, atol);
                if trial.local_augmented_objective
                    < incumbent_holder.local_augmented_incumbent_objective() - *atol
                {
                    selected = Some((index, trial));
                    break;
                }
            }
            selected.map(|(index, trial)| (moves[index].clone(), trial))
        };

        let Some((mv, trial)) = selected else {
            termination_status = LocalSearchTerminationStatus::LocalOptimal;
            break;
        };

        model.update_with_move(&mv)?;
        score = trial;

        let plain = model.export_plain_solution(atol);
        total_update_status |= incumbent_holder.try_update_incumbent(&plain, &score);
        if score.is_feasible && option.output.is_enabled_store_feasible_solutions {
            archive.push(plain);
        }
        memory.update(&mv, iteration as i64);

        changed_for_objective = mv.variable_ids().collect();
        changed_for_feasibility = changed_for_objective.clone();
        for &constraint in mv.related_constraints() {
            let c = model.constraint(constraint);
            changed_for_feasibility.extend_from_slice(c.positive_mutable_variables());
            changed_for_feasibility.extend_from_slice(c.negative_mutable_variables());
        }
        changed_for_feasibility.sort_unstable();
        changed_for_feasibility.dedup();

        if local.log_interval > 0 && iteration % local.log_interval == 0 {
            tracing::debug!(
                iteration,
                objective = score.objective,
                violation = score.total_violation,
                "local search"
            );
        }
        iteration += 1;
    }

    Ok(LocalSearchResult {
        termination_status,
        number_of_iterations: iteration,
        total_update_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bound, ConstraintSense, NeighborhoodConfig, ObjectiveSense};
    use rand::SeedableRng;

    #[test]
    fn descends_to_a_local_optimum() {
        // min x subject to x >= 2, started from x = 5
        let mut model = Model::new("ls");
        let x = model.integer_variable("x", Bound::new(0, 5).unwrap());
        let objective = model.expression().term(x, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        let lhs = model.expression().term(x, 1.0).constant(-2.0).build();
        model.add_constraint("lb", lhs, ConstraintSense::Greater).unwrap();
        model.variable_mut(x).set_value(5).unwrap();
        model.setup();
        for c in model.constraints_mut() {
            c.set_global_penalty_coefficient(100.0);
            c.reset_local_penalty_coefficient();
        }

        let option = SolverOption::default();
        let mut neighborhood = Neighborhood::new(NeighborhoodConfig::default());
        let mut holder = IncumbentHolder::default();
        let mut memory = Memory::new(model.number_of_variables());
        let mut archive = FeasibleSolutionArchive::new(10);
        let mut rng = StdRng::seed_from_u64(1);
        let keeper = TimeKeeper::new();
        let initial = model.export_variable_values();

        let result = solve(
            &mut model,
            &mut neighborhood,
            &mut holder,
            &mut memory,
            &mut archive,
            &option,
            &initial,
            &keeper,
            &mut rng,
            ATol::default(),
        )
        .unwrap();

        assert_eq!(
            result.termination_status,
            LocalSearchTerminationStatus::LocalOptimal
        );
        assert_eq!(holder.feasible_incumbent_objective(), 2.0);
    }
}
