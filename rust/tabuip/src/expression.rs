use crate::{Move, Variable, VariableID};
use fnv::FnvHashMap;
use getset::CopyGetters;

/// Structure descriptor of a linear form, refreshed by the model builder.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExpressionStructure {
    pub max_abs_coefficient: f64,
    pub has_only_binary_or_selection_variable: bool,
    pub has_only_unit_coefficient: bool,
}

/// A linear form `sum c_i x_i + c0` with a cached current value.
///
/// The coefficient map is keyed by variable identity; zero coefficients are
/// never stored. `evaluate_move` touches only the move's alterations, which
/// keeps every candidate move evaluable in O(variables moved).
#[derive(Debug, Clone, Default, CopyGetters)]
pub struct Expression {
    sensitivities: FnvHashMap<VariableID, f64>,
    #[getset(get_copy = "pub")]
    constant: f64,
    #[getset(get_copy = "pub")]
    value: f64,
    #[getset(get_copy = "pub")]
    structure: ExpressionStructure,
}

impl Expression {
    pub fn with_terms(
        terms: impl IntoIterator<Item = (VariableID, f64)>,
        constant: f64,
    ) -> Self {
        let mut expression = Self {
            constant,
            ..Default::default()
        };
        for (id, coefficient) in terms {
            expression.add_term(id, coefficient);
        }
        expression
    }

    pub fn sensitivities(&self) -> &FnvHashMap<VariableID, f64> {
        &self.sensitivities
    }

    pub fn coefficient(&self, id: VariableID) -> f64 {
        self.sensitivities.get(&id).copied().unwrap_or(0.0)
    }

    pub fn number_of_terms(&self) -> usize {
        self.sensitivities.len()
    }

    pub fn is_constant(&self) -> bool {
        self.sensitivities.is_empty()
    }

    /// Accumulate `coefficient` onto the term for `id`, dropping the term
    /// on exact cancellation.
    pub fn add_term(&mut self, id: VariableID, coefficient: f64) {
        let entry = self.sensitivities.entry(id).or_insert(0.0);
        *entry += coefficient;
        if *entry == 0.0 {
            self.sensitivities.remove(&id);
        }
    }

    pub fn set_constant(&mut self, constant: f64) {
        self.constant = constant;
    }

    pub fn add_constant(&mut self, constant: f64) {
        self.constant += constant;
    }

    /// In-place `self += factor * other` including the constant.
    pub fn add_scaled(&mut self, other: &Expression, factor: f64) {
        for (&id, &coefficient) in &other.sensitivities {
            self.add_term(id, factor * coefficient);
        }
        self.constant += factor * other.constant;
    }

    pub fn scale(&mut self, factor: f64) {
        for coefficient in self.sensitivities.values_mut() {
            *coefficient *= factor;
        }
        self.constant *= factor;
    }

    /// Remove the term for `id`, returning its coefficient.
    pub fn remove_term(&mut self, id: VariableID) -> f64 {
        self.sensitivities.remove(&id).unwrap_or(0.0)
    }

    /// Terms sorted by variable identity, for canonical comparison and
    /// display.
    pub fn sorted_terms(&self) -> Vec<(VariableID, f64)> {
        let mut terms: Vec<_> = self
            .sensitivities
            .iter()
            .map(|(&id, &coefficient)| (id, coefficient))
            .collect();
        terms.sort_unstable_by_key(|(id, _)| *id);
        terms
    }

    /// Full evaluation against the current variable values.
    pub fn evaluate(&self, variables: &[Variable]) -> f64 {
        self.sensitivities
            .iter()
            .map(|(&id, &coefficient)| coefficient * variables[*id].value() as f64)
            .sum::<f64>()
            + self.constant
    }

    /// The value this expression *would* take if `mv` were applied,
    /// starting from the cached value: O(|mv|).
    pub fn evaluate_move(&self, variables: &[Variable], mv: &Move) -> f64 {
        let mut value = self.value;
        for alteration in mv.alterations() {
            if let Some(&coefficient) = self.sensitivities.get(&alteration.variable) {
                let current = variables[*alteration.variable].value();
                value += coefficient * (alteration.target - current) as f64;
            }
        }
        value
    }

    /// Refresh the cached value from scratch.
    pub fn update(&mut self, variables: &[Variable]) {
        self.value = self.evaluate(variables);
    }

    /// Refresh the cached value from `mv`, assuming the caller applies the
    /// move to the underlying variables afterwards.
    pub fn update_with_move(&mut self, variables: &[Variable], mv: &Move) {
        self.value = self.evaluate_move(variables, mv);
    }

    /// Recompute the structure descriptor. `is_binary_or_selection` reports
    /// whether a variable is binary-valued (the model knows; the expression
    /// does not).
    pub fn update_structure(&mut self, is_binary_or_selection: impl Fn(VariableID) -> bool) {
        let max_abs_coefficient = self
            .sensitivities
            .values()
            .map(|c| c.abs())
            .fold(0.0, f64::max);
        self.structure = ExpressionStructure {
            max_abs_coefficient,
            has_only_binary_or_selection_variable: self
                .sensitivities
                .keys()
                .all(|&id| is_binary_or_selection(id)),
            has_only_unit_coefficient: self.sensitivities.values().all(|c| c.abs() == 1.0),
        };
    }
}
