mod classify;

pub use classify::*;

use crate::{ATol, Expression, Move, Variable, VariableID};
use derive_more::{Deref, From};
use getset::CopyGetters;
use std::hash::{Hash, Hasher};

/// ID for a constraint. Doubles as the index into the model's constraint
/// arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Deref)]
pub struct ConstraintID(usize);

impl ConstraintID {
    pub fn into_inner(&self) -> usize {
        self.0
    }

    pub fn stable_hash(&self) -> u64 {
        let mut hasher = fnv::FnvHasher::default();
        self.0.hash(&mut hasher);
        hasher.finish()
    }
}

impl std::fmt::Debug for ConstraintID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConstraintID({})", self.0)
    }
}

impl std::fmt::Display for ConstraintID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Sense of a constraint expression `f(x)` against zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConstraintSense {
    /// `f(x) <= 0`
    Less,
    /// `f(x) = 0`
    Equal,
    /// `f(x) >= 0`
    Greater,
}

impl ConstraintSense {
    pub fn label(&self) -> &'static str {
        match self {
            ConstraintSense::Less => "<=",
            ConstraintSense::Equal => "=",
            ConstraintSense::Greater => ">=",
        }
    }

    /// The sense of `-f(x)` compared against zero.
    pub fn flipped(&self) -> Self {
        match self {
            ConstraintSense::Less => ConstraintSense::Greater,
            ConstraintSense::Equal => ConstraintSense::Equal,
            ConstraintSense::Greater => ConstraintSense::Less,
        }
    }
}

/// A linear constraint with incrementally maintained caches and penalty
/// coefficients.
///
/// Invariants
/// ----------
/// - After every `update` / `update_with_move`:
///   `constraint_value == expression.value`,
///   `positive_part == max(constraint_value, 0)`,
///   `negative_part == -min(constraint_value, 0)`, and the violation and
///   margin follow the sense (two-sided sum for `Equal`).
#[derive(Debug, Clone, CopyGetters)]
pub struct Constraint {
    #[getset(get_copy = "pub")]
    id: ConstraintID,
    name: String,
    expression: Expression,
    #[getset(get_copy = "pub")]
    sense: ConstraintSense,

    #[getset(get_copy = "pub")]
    constraint_value: f64,
    #[getset(get_copy = "pub")]
    violation_value: f64,
    #[getset(get_copy = "pub")]
    margin_value: f64,
    #[getset(get_copy = "pub")]
    positive_part: f64,
    #[getset(get_copy = "pub")]
    negative_part: f64,

    #[getset(get_copy = "pub")]
    local_penalty_coefficient_less: f64,
    #[getset(get_copy = "pub")]
    local_penalty_coefficient_greater: f64,
    #[getset(get_copy = "pub")]
    global_penalty_coefficient: f64,

    #[getset(get_copy = "pub")]
    violation_count: u64,

    #[getset(get_copy = "pub")]
    is_enabled: bool,
    #[getset(get_copy = "pub")]
    is_less_or_equal: bool,
    #[getset(get_copy = "pub")]
    is_greater_or_equal: bool,
    #[getset(get_copy = "pub")]
    is_selection: bool,
    #[getset(get_copy = "pub")]
    has_margin: bool,
    #[getset(get_copy = "pub")]
    is_user_defined_selection: bool,

    #[getset(get_copy = "pub")]
    kind: ConstraintKind,
    /// The determined variable when this constraint defines a dependency.
    #[getset(get_copy = "pub")]
    key_variable: Option<VariableID>,

    /// Mutable member variables with positive coefficient, set by the model
    /// builder; consumed by improvability screening.
    positive_mutable_variables: Vec<VariableID>,
    /// Mutable member variables with negative coefficient.
    negative_mutable_variables: Vec<VariableID>,
}

impl Constraint {
    pub fn new(
        id: ConstraintID,
        name: &str,
        expression: Expression,
        sense: ConstraintSense,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            expression,
            sense,
            constraint_value: 0.0,
            violation_value: 0.0,
            margin_value: 0.0,
            positive_part: 0.0,
            negative_part: 0.0,
            local_penalty_coefficient_less: 1.0,
            local_penalty_coefficient_greater: 1.0,
            global_penalty_coefficient: 1.0,
            violation_count: 0,
            is_enabled: true,
            is_less_or_equal: sense != ConstraintSense::Greater,
            is_greater_or_equal: sense != ConstraintSense::Less,
            is_selection: false,
            has_margin: false,
            is_user_defined_selection: false,
            kind: ConstraintKind::Unknown,
            key_variable: None,
            positive_mutable_variables: Vec::new(),
            negative_mutable_variables: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }

    pub fn expression_mut(&mut self) -> &mut Expression {
        &mut self.expression
    }

    pub fn positive_mutable_variables(&self) -> &[VariableID] {
        &self.positive_mutable_variables
    }

    pub fn negative_mutable_variables(&self) -> &[VariableID] {
        &self.negative_mutable_variables
    }

    pub(crate) fn set_mutable_variable_partitions(
        &mut self,
        positive: Vec<VariableID>,
        negative: Vec<VariableID>,
    ) {
        self.positive_mutable_variables = positive;
        self.negative_mutable_variables = negative;
    }

    /// Full cache refresh from the current variable values.
    pub fn update(&mut self, variables: &[Variable]) {
        self.expression.update(variables);
        self.refresh_caches(self.expression.value());
    }

    /// Cache refresh from `mv`, assuming the caller applies the move to the
    /// underlying variables afterwards.
    pub fn update_with_move(&mut self, variables: &[Variable], mv: &Move) {
        self.expression.update_with_move(variables, mv);
        self.refresh_caches(self.expression.value());
    }

    fn refresh_caches(&mut self, constraint_value: f64) {
        self.constraint_value = constraint_value;
        self.positive_part = constraint_value.max(0.0);
        self.negative_part = -constraint_value.min(0.0);
        match self.sense {
            ConstraintSense::Less => {
                self.violation_value = self.positive_part;
                self.margin_value = self.negative_part;
            }
            ConstraintSense::Equal => {
                self.violation_value = self.positive_part + self.negative_part;
                self.margin_value = 0.0;
            }
            ConstraintSense::Greater => {
                self.violation_value = self.negative_part;
                self.margin_value = self.positive_part;
            }
        }
        let structure = self.expression.structure();
        self.has_margin = structure.has_only_binary_or_selection_variable
            && self.margin_value >= structure.max_abs_coefficient - 1e-10;
    }

    /// Violation value a candidate `constraint_value` would produce, per
    /// sense. Used by the incremental evaluator without mutating caches.
    pub fn violation_of(&self, constraint_value: f64) -> f64 {
        match self.sense {
            ConstraintSense::Less => constraint_value.max(0.0),
            ConstraintSense::Equal => constraint_value.abs(),
            ConstraintSense::Greater => (-constraint_value).max(0.0),
        }
    }

    /// Local penalty a candidate `constraint_value` would incur, with the
    /// less-side coefficient on the positive part and the greater-side
    /// coefficient on the negative part.
    pub fn local_penalty_of(&self, constraint_value: f64) -> f64 {
        let positive = constraint_value.max(0.0);
        let negative = -constraint_value.min(0.0);
        let mut penalty = 0.0;
        if self.is_less_or_equal {
            penalty += self.local_penalty_coefficient_less * positive;
        }
        if self.is_greater_or_equal {
            penalty += self.local_penalty_coefficient_greater * negative;
        }
        penalty
    }

    pub fn is_feasible(&self, atol: ATol) -> bool {
        self.violation_value < *atol
    }

    /// Disabled constraints and satisfied binary constraints with full
    /// margin cannot change feasibility under any single move.
    pub fn is_evaluation_ignorable(&self) -> bool {
        !self.is_enabled || self.has_margin
    }

    /// Rewrite the sense in place; used when two opposite inequalities
    /// combine into one equality.
    pub fn set_sense(&mut self, sense: ConstraintSense) {
        self.sense = sense;
        self.is_less_or_equal = sense != ConstraintSense::Greater;
        self.is_greater_or_equal = sense != ConstraintSense::Less;
    }

    pub fn enable(&mut self) {
        self.is_enabled = true;
    }

    pub fn disable(&mut self) {
        self.is_enabled = false;
    }

    pub fn set_is_selection(&mut self, flag: bool) {
        self.is_selection = flag;
    }

    pub fn set_is_user_defined_selection(&mut self, flag: bool) {
        self.is_user_defined_selection = flag;
    }

    pub fn set_global_penalty_coefficient(&mut self, coefficient: f64) {
        self.global_penalty_coefficient = coefficient;
    }

    pub fn set_local_penalty_coefficients(&mut self, less: f64, greater: f64) {
        self.local_penalty_coefficient_less = less;
        self.local_penalty_coefficient_greater = greater;
    }

    /// Reset both local coefficients to the global one.
    pub fn reset_local_penalty_coefficient(&mut self) {
        self.local_penalty_coefficient_less = self.global_penalty_coefficient;
        self.local_penalty_coefficient_greater = self.global_penalty_coefficient;
    }

    /// Cap local coefficients at the global one.
    pub fn limit_local_penalty_coefficient(&mut self) {
        self.local_penalty_coefficient_less = self
            .local_penalty_coefficient_less
            .min(self.global_penalty_coefficient);
        self.local_penalty_coefficient_greater = self
            .local_penalty_coefficient_greater
            .min(self.global_penalty_coefficient);
    }

    pub fn increment_violation_count(&mut self) {
        self.violation_count += 1;
    }

    pub fn reset_violation_count(&mut self) {
        self.violation_count = 0;
    }

    /// Re-classify from the current expression, variables, and sense.
    /// Skipped once the constraint has been consumed as a
    /// dependency-defining row.
    pub fn update_kind(&mut self, variables: &[Variable]) {
        if let Some(key) = self.key_variable {
            if !self.is_enabled && variables[*key].kind().is_dependent() {
                return;
            }
        }
        let (kind, key_variable) = classify(&self.expression, self.sense, variables);
        self.kind = kind;
        self.key_variable = key_variable;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Alteration, Bound, MoveSense};
    use approx::assert_abs_diff_eq;

    fn variables(values: &[i64]) -> Vec<Variable> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let mut v = Variable::integer(
                    VariableID::from(i),
                    &format!("x{i}"),
                    Bound::new(-100, 100).unwrap(),
                );
                v.set_value(value).unwrap();
                v
            })
            .collect()
    }

    fn constraint(sense: ConstraintSense, values: &[i64]) -> (Constraint, Vec<Variable>) {
        let variables = variables(values);
        // x0 + x1 - 4
        let expression = Expression::with_terms(
            [(VariableID::from(0), 1.0), (VariableID::from(1), 1.0)],
            -4.0,
        );
        let mut c = Constraint::new(ConstraintID::from(0), "c", expression, sense);
        c.update(&variables);
        (c, variables)
    }

    #[test]
    fn violation_per_sense() {
        // x0 + x1 = 6 > 4
        let (less, _) = constraint(ConstraintSense::Less, &[3, 3]);
        assert_abs_diff_eq!(less.violation_value(), 2.0);
        assert_abs_diff_eq!(less.margin_value(), 0.0);

        let (equal, _) = constraint(ConstraintSense::Equal, &[3, 3]);
        assert_abs_diff_eq!(equal.violation_value(), 2.0);

        let (greater, _) = constraint(ConstraintSense::Greater, &[3, 3]);
        assert_abs_diff_eq!(greater.violation_value(), 0.0);
        assert_abs_diff_eq!(greater.margin_value(), 2.0);

        // x0 + x1 = 2 < 4
        let (less, _) = constraint(ConstraintSense::Less, &[1, 1]);
        assert_abs_diff_eq!(less.violation_value(), 0.0);
        assert_abs_diff_eq!(less.margin_value(), 2.0);

        let (greater, _) = constraint(ConstraintSense::Greater, &[1, 1]);
        assert_abs_diff_eq!(greater.violation_value(), 2.0);
    }

    #[test]
    fn update_with_move_matches_update() {
        let (mut c, mut variables) = constraint(ConstraintSense::Less, &[1, 1]);
        let mv = Move::new(
            MoveSense::Integer,
            [Alteration::new(VariableID::from(0), 5)],
            vec![ConstraintID::from(0)],
        );
        c.update_with_move(&variables, &mv);
        // Now apply the move for real and compare with a scratch update
        variables[0].set_value(5).unwrap();
        let (mut scratch, _) = constraint(ConstraintSense::Less, &[5, 1]);
        scratch.update(&variables);
        assert_abs_diff_eq!(c.constraint_value(), scratch.constraint_value());
        assert_abs_diff_eq!(c.violation_value(), scratch.violation_value());
    }

    #[test]
    fn local_penalty_sides() {
        let (mut c, _) = constraint(ConstraintSense::Equal, &[3, 3]);
        c.set_local_penalty_coefficients(10.0, 100.0);
        // positive violation uses the less-side coefficient
        assert_abs_diff_eq!(c.local_penalty_of(2.0), 20.0);
        // negative violation uses the greater-side coefficient
        assert_abs_diff_eq!(c.local_penalty_of(-2.0), 200.0);

        let (mut less, _) = constraint(ConstraintSense::Less, &[3, 3]);
        less.set_local_penalty_coefficients(10.0, 100.0);
        assert_abs_diff_eq!(less.local_penalty_of(-2.0), 0.0);
    }

    #[test]
    fn penalty_reset_and_limit() {
        let (mut c, _) = constraint(ConstraintSense::Less, &[0, 0]);
        c.set_global_penalty_coefficient(5.0);
        c.set_local_penalty_coefficients(50.0, 1.0);
        c.limit_local_penalty_coefficient();
        assert_abs_diff_eq!(c.local_penalty_coefficient_less(), 5.0);
        assert_abs_diff_eq!(c.local_penalty_coefficient_greater(), 1.0);
        c.reset_local_penalty_coefficient();
        assert_abs_diff_eq!(c.local_penalty_coefficient_greater(), 5.0);
    }
}
