use crate::{PlainSolution, SolutionScore};

/// Bits returned by [`IncumbentHolder::try_update_incumbent`].
pub mod update_status {
    pub const NO_UPDATE: u8 = 0;
    pub const LOCAL: u8 = 1 << 0;
    pub const GLOBAL: u8 = 1 << 1;
    pub const FEASIBLE: u8 = 1 << 2;
}

/// Tracks the three incumbents of the search: the best local-augmented
/// objective since the last reset, the best global-augmented objective
/// ever, and the best feasible objective ever.
///
/// "No incumbent yet" is represented by `f64::INFINITY` on the stored
/// objectives; every real score compares below it.
#[derive(Debug, Clone)]
pub struct IncumbentHolder {
    local_augmented_objective: f64,
    global_augmented_objective: f64,
    feasible_objective: f64,

    local_augmented_solution: PlainSolution,
    global_augmented_solution: PlainSolution,
    feasible_solution: PlainSolution,

    global_augmented_score: SolutionScore,
}

impl Default for IncumbentHolder {
    fn default() -> Self {
        Self {
            local_augmented_objective: f64::INFINITY,
            global_augmented_objective: f64::INFINITY,
            feasible_objective: f64::INFINITY,
            local_augmented_solution: PlainSolution::default(),
            global_augmented_solution: PlainSolution::default(),
            feasible_solution: PlainSolution::default(),
            global_augmented_score: SolutionScore::default(),
        }
    }
}

impl IncumbentHolder {
    pub fn local_augmented_incumbent_objective(&self) -> f64 {
        self.local_augmented_objective
    }

    pub fn global_augmented_incumbent_objective(&self) -> f64 {
        self.global_augmented_objective
    }

    pub fn feasible_incumbent_objective(&self) -> f64 {
        self.feasible_objective
    }

    pub fn has_feasible_incumbent(&self) -> bool {
        self.feasible_objective.is_finite()
    }

    pub fn local_augmented_incumbent_solution(&self) -> &PlainSolution {
        &self.local_augmented_solution
    }

    pub fn global_augmented_incumbent_solution(&self) -> &PlainSolution {
        &self.global_augmented_solution
    }

    pub fn feasible_incumbent_solution(&self) -> &PlainSolution {
        &self.feasible_solution
    }

    pub fn global_augmented_incumbent_score(&self) -> &SolutionScore {
        &self.global_augmented_score
    }

    /// Called by the outer solver between tabu-search rounds.
    pub fn reset_local_augmented_incumbent(&mut self) {
        self.local_augmented_objective = f64::INFINITY;
    }

    /// Record `solution` if it improves any incumbent; the returned bitmask
    /// names the ones it improved.
    pub fn try_update_incumbent(
        &mut self,
        solution: &PlainSolution,
        score: &SolutionScore,
    ) -> u8 {
        let mut status = update_status::NO_UPDATE;
        if score.local_augmented_objective < self.local_augmented_objective {
            self.local_augmented_objective = score.local_augmented_objective;
            self.local_augmented_solution = solution.clone();
            status |= update_status::LOCAL;
        }
        if score.global_augmented_objective < self.global_augmented_objective {
            self.global_augmented_objective = score.global_augmented_objective;
            self.global_augmented_solution = solution.clone();
            self.global_augmented_score = *score;
            status |= update_status::GLOBAL;
        }
        if score.is_feasible && score.objective < self.feasible_objective {
            self.feasible_objective = score.objective;
            self.feasible_solution = solution.clone();
            status |= update_status::FEASIBLE;
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solution(values: &[i64], objective: f64, violation: f64) -> (PlainSolution, SolutionScore) {
        let score = SolutionScore {
            objective,
            total_violation: violation,
            local_augmented_objective: objective + violation,
            global_augmented_objective: objective + violation,
            is_feasible: violation == 0.0,
            ..Default::default()
        };
        let solution = PlainSolution {
            variable_values: values.to_vec(),
            objective,
            total_violation: violation,
            is_feasible: score.is_feasible,
        };
        (solution, score)
    }

    #[test]
    fn first_update_sets_all_bits() {
        let mut holder = IncumbentHolder::default();
        let (s, score) = solution(&[1], 3.0, 0.0);
        let status = holder.try_update_incumbent(&s, &score);
        assert_eq!(
            status,
            update_status::LOCAL | update_status::GLOBAL | update_status::FEASIBLE
        );
        assert_eq!(holder.feasible_incumbent_objective(), 3.0);
    }

    #[test]
    fn local_bit_iff_strict_decrease() {
        let mut holder = IncumbentHolder::default();
        let (s, score) = solution(&[1], 3.0, 0.0);
        holder.try_update_incumbent(&s, &score);

        // Equal score: no bits
        let (s, score) = solution(&[2], 3.0, 0.0);
        assert_eq!(holder.try_update_incumbent(&s, &score), update_status::NO_UPDATE);

        // Strictly better augmented objective
        let (s, score) = solution(&[3], 2.0, 0.0);
        let status = holder.try_update_incumbent(&s, &score);
        assert_ne!(status & update_status::LOCAL, 0);
    }

    #[test]
    fn infeasible_never_updates_feasible_incumbent() {
        let mut holder = IncumbentHolder::default();
        let (s, score) = solution(&[1], -10.0, 5.0);
        let status = holder.try_update_incumbent(&s, &score);
        assert_eq!(status & update_status::FEASIBLE, 0);
        assert!(!holder.has_feasible_incumbent());
    }

    #[test]
    fn reset_local_only() {
        let mut holder = IncumbentHolder::default();
        let (s, score) = solution(&[1], 3.0, 0.0);
        holder.try_update_incumbent(&s, &score);
        holder.reset_local_augmented_incumbent();
        assert!(holder.local_augmented_incumbent_objective().is_infinite());
        assert_eq!(holder.global_augmented_incumbent_objective(), 3.0);
    }
}
