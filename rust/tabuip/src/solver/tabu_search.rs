use super::option::{ImprovabilityScreeningMode, SolverOption, TabuMode};
use crate::{
    update_status, AcceptancePolicy, ATol, FeasibleSolutionArchive, IncumbentHolder, Memory,
    Model, Move, MoveSense, Neighborhood, SolutionScore, TimeKeeper, VariableError, VariableID,
};
use rand::rngs::StdRng;
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TabuSearchTerminationStatus {
    TimeOver,
    IterationOver,
    NoMove,
    ReachTarget,
    LocalOptimal,
}

#[derive(Debug, Clone)]
pub struct TabuSearchResult {
    pub termination_status: TabuSearchTerminationStatus,
    pub number_of_iterations: usize,
    pub total_update_status: u8,
    /// Tenure after in-run adaptation, handed back to the next round.
    pub tabu_tenure: usize,
    pub last_local_augmented_incumbent_update_iteration: i64,
    pub last_global_augmented_incumbent_update_iteration: i64,
    pub last_feasible_incumbent_update_iteration: i64,
    /// Improving moves that were skipped because they were tabu; a signal
    /// of tabu saturation to the outer solver.
    pub number_of_improving_moves_rejected_by_tabu: usize,
}

/// Per-round knobs the outer solver adapts between invocations.
#[derive(Debug, Clone, Copy)]
pub struct TabuSearchControl {
    pub iteration_max: usize,
    pub initial_tabu_tenure: usize,
}

fn is_tabu(mv: &Move, memory: &Memory, iteration: i64, tenure: i64, mode: TabuMode) -> bool {
    match mode {
        TabuMode::All => mv
            .variable_ids()
            .all(|v| memory.is_within_tenure(v, iteration, tenure)),
        TabuMode::Any => mv
            .variable_ids()
            .any(|v| memory.is_within_tenure(v, iteration, tenure)),
    }
}

pub(super) fn target_reached(
    model: &Model,
    holder: &IncumbentHolder,
    target: Option<f64>,
) -> bool {
    let Some(target) = target else {
        return false;
    };
    if !holder.has_feasible_incumbent() {
        return false;
    }
    let displayed = model
        .objective()
        .displayed_value(holder.feasible_incumbent_objective());
    if model.objective().is_minimization() {
        displayed <= target
    } else {
        displayed >= target
    }
}

/// One tabu-search run: first-improvement over the shuffled candidate
/// list, short-term tabu memory with aspiration, adaptive tenure, and
/// optional move curtailing.
#[allow(clippy::too_many_arguments)]
pub fn solve(
    model: &mut Model,
    neighborhood: &mut Neighborhood,
    incumbent_holder: &mut IncumbentHolder,
    memory: &mut Memory,
    archive: &mut FeasibleSolutionArchive,
    option: &SolverOption,
    control: &TabuSearchControl,
    initial_values: &[i64],
    global_time_keeper: &TimeKeeper,
    rng: &mut StdRng,
    atol: ATol,
) -> Result<TabuSearchResult, VariableError> {
    let time_keeper = TimeKeeper::new();
    let tabu = &option.tabu_search;
    let screening = option.neighborhood.improvability_screening_mode;
    let number_of_mutable_variables = model.number_of_mutable_variables().max(1);

    incumbent_holder.reset_local_augmented_incumbent();
    memory.reset_last_update_iterations();

    model.import_variable_values(initial_values);
    let mut score = model.evaluate_scratch(atol);
    let mut total_update_status =
        incumbent_holder.try_update_incumbent(&model.export_plain_solution(atol), &score);

    model.reset_variable_objective_improvabilities();
    model.reset_variable_feasibility_improvabilities();

    let mut tenure = control
        .initial_tabu_tenure
        .clamp(1, number_of_mutable_variables);
    let mut stagnation = 0usize;
    let mut curtail_active = false;

    let mut changed_for_objective: Vec<VariableID> = Vec::new();
    let mut changed_for_feasibility: Vec<VariableID> = Vec::new();

    let mut termination_status = TabuSearchTerminationStatus::IterationOver;
    let mut last_local_update = -1i64;
    let mut last_global_update = -1i64;
    let mut last_feasible_update = -1i64;
    let mut rejected_by_tabu = 0usize;

    let mut iteration = 0i64;
    while (iteration as usize) < control.iteration_max {
        if time_keeper.clock() > tabu.time_max
            || global_time_keeper.clock() + tabu.time_offset > option.general.time_max
        {
            termination_status = TabuSearchTerminationStatus::TimeOver;
            break;
        }
        if target_reached(model, incumbent_holder, option.general.target_objective_value) {
            termination_status = TabuSearchTerminationStatus::ReachTarget;
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

        let policy = match screening {
            ImprovabilityScreeningMode::Off => AcceptancePolicy::all(),
            ImprovabilityScreeningMode::Soft => {
                if score.is_feasible {
                    AcceptancePolicy::all()
                } else {
                    AcceptancePolicy::feasibility_improvable_only()
                }
            }
            ImprovabilityScreeningMode::Aggressive | ImprovabilityScreeningMode::Automatic => {
                if model.is_linear() && score.is_feasible {
                    AcceptancePolicy::objective_improvable_only()
                } else if score.is_feasible {
                    AcceptancePolicy::all()
                } else {
                    AcceptancePolicy::feasibility_improvable_only()
                }
            }
        };

        neighborhood.update_moves(
            model,
            policy,
            option.parallel.is_enabled_parallel_neighborhood_update,
        );
        if tabu.is_enabled_shuffle {
            neighborhood.shuffle_moves(rng);
        }

        let number_of_moves = neighborhood.moves().len();
        if number_of_moves == 0 {
            termination_status = TabuSearchTerminationStatus::NoMove;
            break;
        }

        let scan_limit = if curtail_active {
            (((number_of_moves as f64) * (1.0 - tabu.pruning_rate_threshold)).ceil() as usize)
                .clamp(1, number_of_moves)
        } else {
            number_of_moves
        };

        let tenure_margin = (tenure as f64 * tabu.tabu_tenure_randomize_rate) as i64;
        let tenure_used = tenure as i64
            + if tenure_margin > 0 {
                rng.gen_range(0..=tenure_margin)
            } else {
                0
            };

        let selected = {
            let moves = neighborhood.moves();
            let parallel_scores: Option<Vec<SolutionScore>> =
                if option.parallel.is_enabled_parallel_evaluation {
                    Some(
                        moves[..scan_limit]
                            .par_iter()
                            .map(|mv| model.evaluate_move(mv, &score, atol))
                            .collect(),
                    )
                } else {
                    None
                };

            let mut selected: Option<(usize, SolutionScore)> = None;
            for (index, mv) in moves[..scan_limit].iter().enumerate() {
                if !mv.is_available() {
                    continue;
                }
                let trial = match &parallel_scores {
                    Some(scores) => scores[index],
                    None => model.evaluate_move(mv, &score, atol),
                };
                let frequency_bias = tabu.frequency_penalty_coefficient
                    * mv
                        .variable_ids()
                        .map(|v| memory.update_frequency(v))
                        .sum::<f64>();
                let is_improving = trial.local_augmented_objective + frequency_bias
                    < incumbent_holder.local_augmented_incumbent_objective() - *atol;
                if !is_improving {
                    continue;
                }
                if is_tabu(mv, memory, iteration, tenure_used, tabu.tabu_mode) {
                    let aspirated = tabu.ignore_tabu_if_global_incumbent
                        && trial.global_augmented_objective
                            < incumbent_holder.global_augmented_incumbent_objective() - *atol;
                    if !aspirated {
                        rejected_by_tabu += 1;
                        continue;
                    }
                }
                selected = Some((index, trial));
                break;
            }
            selected.map(|(index, trial)| (moves[index].clone(), index, trial))
        };

        let Some((mv, selected_index, trial)) = selected else {
            termination_status = TabuSearchTerminationStatus::LocalOptimal;
            break;
        };

        model.update_with_move(&mv)?;
        score = trial;

        let plain = model.export_plain_solution(atol);
        let update = incumbent_holder.try_update_incumbent(&plain, &score);
        total_update_status |= update;
        if update & update_status::LOCAL != 0 {
            last_local_update = iteration;
        }
        if update & update_status::FEASIBLE != 0 {
            last_feasible_update = iteration;
        }
        if score.is_feasible && option.output.is_enabled_store_feasible_solutions {
            archive.push(plain);
        }

        memory.update(&mv, iteration);
        for id in model.constraint_reference().enabled.clone() {
            if model.constraint(id).violation_value() > *atol {
                model.constraint_mut(id).increment_violation_count();
            }
        }

        if neighborhood.config().is_enabled_chain_move && mv.sense() != MoveSense::Chain {
            neighborhood.chain_mut().register(&mv, model);
            let capacity = neighborhood.config().chain_move_capacity;
            let mode = neighborhood.config().chain_move_reduce_mode;
            neighborhood.chain_mut().reduce(capacity, mode, rng);
        }

        // Adaptive tenure driven by global-augmented progress.
        if tabu.is_enabled_automatic_tabu_tenure_adjustment {
            if update & update_status::GLOBAL != 0 {
                if iteration - last_global_update <= tabu.bias_decrease_count_threshold as i64 {
                    tenure = (tenure - 1).max(1);
                }
                stagnation = 0;
            } else {
                stagnation += 1;
                if stagnation > tabu.bias_increase_count_threshold {
                    tenure = (tenure + 1).min(number_of_mutable_variables);
                    stagnation = 0;
                }
            }
        }
        if update & update_status::GLOBAL != 0 {
            last_global_update = iteration;
        }

        // The scan tail yielded nothing: curtail the next scan.
        curtail_active = tabu.is_enabled_move_curtail
            && (selected_index as f64)
                < (1.0 - tabu.pruning_rate_threshold) * scan_limit as f64;

        changed_for_objective = mv.variable_ids().collect();
        changed_for_feasibility = changed_for_objective.clone();
        for &constraint in mv.related_constraints() {
            let c = model.constraint(constraint);
            changed_for_feasibility.extend_from_slice(c.positive_mutable_variables());
            changed_for_feasibility.extend_from_slice(c.negative_mutable_variables());
        }
        changed_for_feasibility.sort_unstable();
        changed_for_feasibility.dedup();

        if tabu.log_interval > 0 && iteration % tabu.log_interval as i64 == 0 {
            tracing::debug!(
                iteration,
                objective = score.objective,
                violation = score.total_violation,
                tenure,
                moves = number_of_moves,
                "tabu search"
            );
        }
        iteration += 1;
    }

    Ok(TabuSearchResult {
        termination_status,
        number_of_iterations: iteration as usize,
        total_update_status,
        tabu_tenure: tenure,
        last_local_augmented_incumbent_update_iteration: last_local_update,
        last_global_augmented_incumbent_update_iteration: last_global_update,
        last_feasible_incumbent_update_iteration: last_feasible_update,
        number_of_improving_moves_rejected_by_tabu: rejected_by_tabu,
    })
}
