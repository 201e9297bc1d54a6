use serde::{Deserialize, Serialize};

/// Score of a solution (or of a tentative move) against the objective and
/// the current penalty coefficients.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolutionScore {
    /// Internal objective value (minimization convention).
    pub objective: f64,
    /// Objective improvement against the score this one was derived from.
    pub objective_improvement: f64,
    pub total_violation: f64,
    pub local_penalty: f64,
    pub global_penalty: f64,
    pub local_augmented_objective: f64,
    pub global_augmented_objective: f64,
    pub is_feasible: bool,
    pub is_objective_improvable: bool,
    pub is_feasibility_improvable: bool,
}

/// A snapshot of variable values with the score they achieved.
#[derive(Debug, Clone, Default)]
pub struct PlainSolution {
    pub variable_values: Vec<i64>,
    pub objective: f64,
    pub total_violation: f64,
    pub is_feasible: bool,
}

/// A named, exported solution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamedSolution {
    pub name: String,
    /// Displayed objective value (maximization undone).
    pub objective: f64,
    pub total_violation: f64,
    pub is_feasible: bool,
    pub variables: Vec<(String, i64)>,
}

impl NamedSolution {
    pub fn value_of(&self, name: &str) -> Option<i64> {
        self.variables
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, v)| v)
    }
}

/// Size-bounded archive of feasible solutions found during search. When
/// the capacity is exceeded the worst-objective entries are dropped.
#[derive(Debug, Clone)]
pub struct FeasibleSolutionArchive {
    capacity: usize,
    solutions: Vec<PlainSolution>,
}

impl FeasibleSolutionArchive {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            solutions: Vec::new(),
        }
    }

    pub fn solutions(&self) -> &[PlainSolution] {
        &self.solutions
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    pub fn clear(&mut self) {
        self.solutions.clear();
    }

    pub fn push(&mut self, solution: PlainSolution) {
        if !solution.is_feasible {
            return;
        }
        if self
            .solutions
            .iter()
            .any(|s| s.variable_values == solution.variable_values)
        {
            return;
        }
        self.solutions.push(solution);
        if self.solutions.len() > self.capacity {
            self.solutions.sort_by(|a, b| {
                a.objective
                    .partial_cmp(&b.objective)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            self.solutions.truncate(self.capacity);
        }
    }
}
