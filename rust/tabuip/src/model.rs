mod evaluate;
mod improvability;
mod setup;

pub use setup::{ConstraintReference, VariableReference};

use crate::{
    ATol, Bound, Constraint, ConstraintID, ConstraintSense, Expression, Move, MultiArray,
    NamedSolution, Objective, ObjectiveSense, PlainSolution, Selection, SelectionID, Variable,
    VariableError, VariableID, VariableKind,
};
use fnv::FnvHashMap;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Variable name {0} is already defined")]
    DuplicateVariableName(String),

    #[error("Constraint name {0} is already defined")]
    DuplicateConstraintName(String),

    #[error("Variable {0} is not defined")]
    UnknownVariable(String),

    #[error("Bound of variable {name} is empty: [{lower}, {upper}]")]
    InvalidBound {
        name: String,
        lower: i64,
        upper: i64,
    },

    #[error("The model has no decision variable")]
    NoDecisionVariables,

    #[error("The model has neither an objective nor a constraint")]
    NoObjectiveOrConstraint,

    #[error(transparent)]
    Variable(#[from] VariableError),
}

/// Builds a linear expression term by term.
#[derive(Debug, Clone, Default)]
pub struct ExpressionBuilder {
    terms: Vec<(VariableID, f64)>,
    constant: f64,
}

impl ExpressionBuilder {
    pub fn term(mut self, variable: VariableID, coefficient: f64) -> Self {
        self.terms.push((variable, coefficient));
        self
    }

    pub fn constant(mut self, constant: f64) -> Self {
        self.constant += constant;
        self
    }

    pub fn build(self) -> Expression {
        Expression::with_terms(self.terms, self.constant)
    }
}

/// The model container: exclusive owner of all variables, constraints, and
/// selections, plus the derived reference tables the search consumes.
///
/// Entities live in typed arenas indexed by their IDs; cross-references are
/// IDs, never pointers, so no reference cycle can form. [`Model::setup`]
/// recomputes every derived index and is re-run after each structural
/// change (extraction, disabling, fixing); it is idempotent.
#[derive(Debug, Clone, Default)]
pub struct Model {
    name: String,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    selections: Vec<Selection>,
    objective: Objective,

    variable_names: FnvHashMap<String, VariableID>,
    constraint_names: FnvHashMap<String, ConstraintID>,
    variable_groups: Vec<MultiArray<VariableID>>,

    variable_reference: VariableReference,
    constraint_reference: ConstraintReference,
    /// independent variable -> dependent variables whose defining
    /// expression references it.
    dependency_consumers: FnvHashMap<VariableID, Vec<VariableID>>,

    flippable_pairs: Vec<(VariableID, VariableID)>,
}

impl Model {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    // ------------------------------------------------------------------
    // Builder surface
    // ------------------------------------------------------------------

    pub fn binary_variable(&mut self, name: &str) -> VariableID {
        let id = VariableID::from(self.variables.len());
        self.variables.push(Variable::binary(id, name));
        self.variable_names.insert(name.to_string(), id);
        id
    }

    pub fn integer_variable(&mut self, name: &str, bound: Bound) -> VariableID {
        let id = VariableID::from(self.variables.len());
        self.variables.push(Variable::integer(id, name, bound));
        self.variable_names.insert(name.to_string(), id);
        id
    }

    /// A one-dimensional group of integer variables named `name[ i]`.
    pub fn integer_variable_vector(
        &mut self,
        name: &str,
        size: usize,
        bound: Bound,
    ) -> Vec<VariableID> {
        self.integer_variable_array(name, &[size], bound)
    }

    /// An N-dimensional group of integer variables named via the row-major
    /// flat order of [`MultiArray`].
    pub fn integer_variable_array(
        &mut self,
        name: &str,
        shape: &[usize],
        bound: Bound,
    ) -> Vec<VariableID> {
        let mut group = MultiArray::new(name, shape, VariableID::from(0));
        let mut ids = Vec::with_capacity(group.len());
        for flat in 0..group.len() {
            let id = self.integer_variable(&group.element_name(flat), bound);
            *group.flat_mut(flat) = id;
            ids.push(id);
        }
        self.variable_groups.push(group);
        ids
    }

    pub fn binary_variable_vector(&mut self, name: &str, size: usize) -> Vec<VariableID> {
        let mut group = MultiArray::new(name, &[size], VariableID::from(0));
        let mut ids = Vec::with_capacity(size);
        for flat in 0..size {
            let id = self.binary_variable(&group.element_name(flat));
            *group.flat_mut(flat) = id;
            ids.push(id);
        }
        self.variable_groups.push(group);
        ids
    }

    pub fn expression(&self) -> ExpressionBuilder {
        ExpressionBuilder::default()
    }

    pub fn add_constraint(
        &mut self,
        name: &str,
        expression: Expression,
        sense: ConstraintSense,
    ) -> Result<ConstraintID, ModelError> {
        if self.constraint_names.contains_key(name) {
            return Err(ModelError::DuplicateConstraintName(name.to_string()));
        }
        let id = ConstraintID::from(self.constraints.len());
        self.constraints
            .push(Constraint::new(id, name, expression, sense));
        self.constraint_names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn set_objective(&mut self, expression: Expression, sense: ObjectiveSense) {
        self.objective = match sense {
            ObjectiveSense::Minimize => Objective::minimize(expression),
            ObjectiveSense::Maximize => Objective::maximize(expression),
        };
    }

    pub fn register_flippable_pairs(&mut self, pairs: &[(VariableID, VariableID)]) {
        self.flippable_pairs.extend_from_slice(pairs);
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, id: VariableID) -> &Variable {
        &self.variables[*id]
    }

    pub fn variable_mut(&mut self, id: VariableID) -> &mut Variable {
        &mut self.variables[*id]
    }

    pub fn variable_by_name(&self, name: &str) -> Option<VariableID> {
        self.variable_names.get(name).copied()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraint(&self, id: ConstraintID) -> &Constraint {
        &self.constraints[*id]
    }

    pub fn constraint_mut(&mut self, id: ConstraintID) -> &mut Constraint {
        &mut self.constraints[*id]
    }

    pub fn constraint_by_name(&self, name: &str) -> Option<ConstraintID> {
        self.constraint_names.get(name).copied()
    }

    pub fn constraints_mut(&mut self) -> &mut [Constraint] {
        &mut self.constraints
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    pub fn selection(&self, id: SelectionID) -> &Selection {
        &self.selections[*id]
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn objective_mut(&mut self) -> &mut Objective {
        &mut self.objective
    }

    pub fn variable_reference(&self) -> &VariableReference {
        &self.variable_reference
    }

    pub fn constraint_reference(&self) -> &ConstraintReference {
        &self.constraint_reference
    }

    pub fn flippable_pairs(&self) -> &[(VariableID, VariableID)] {
        &self.flippable_pairs
    }

    /// The named variable groups, in creation order; their element names
    /// are the display names of the member variables.
    pub fn variable_groups(&self) -> &[MultiArray<VariableID>] {
        &self.variable_groups
    }

    pub fn number_of_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn number_of_mutable_variables(&self) -> usize {
        self.variable_reference.mutable.len()
    }

    pub fn number_of_enabled_constraints(&self) -> usize {
        self.constraint_reference.enabled.len()
    }

    /// Every constraint and objective in this solver is linear; kept as a
    /// query so call sites read like the policy they implement.
    pub fn is_linear(&self) -> bool {
        true
    }

    pub fn is_feasible(&self, atol: ATol) -> bool {
        self.constraint_reference
            .enabled
            .iter()
            .all(|&id| self.constraints[*id].is_feasible(atol))
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.variables.is_empty() {
            return Err(ModelError::NoDecisionVariables);
        }
        if self.objective.expression().is_constant() && self.constraints.is_empty() {
            return Err(ModelError::NoObjectiveOrConstraint);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Structural operations used by the preprocessor
    // ------------------------------------------------------------------

    /// Register an extracted selection: members take kind Selection and the
    /// defining constraint is disabled.
    pub fn add_selection(
        &mut self,
        members: Vec<VariableID>,
        constraint: ConstraintID,
    ) -> SelectionID {
        let id = SelectionID::from(self.selections.len());
        for &member in &members {
            self.variables[*member].set_selection(id);
        }
        self.constraints[*constraint].set_is_selection(true);
        self.constraints[*constraint].disable();
        self.selections.push(Selection::new(id, members, constraint));
        id
    }

    /// Register an extracted dependent variable: `key` takes its defining
    /// expression, the defining constraint is disabled, and `key` is
    /// substituted out of the objective and every enabled constraint.
    pub fn add_dependency(
        &mut self,
        key: VariableID,
        defining: Expression,
        constraint: ConstraintID,
    ) {
        self.constraints[*constraint].disable();
        for c in &mut self.constraints {
            if !c.is_enabled() {
                continue;
            }
            let coefficient = c.expression_mut().remove_term(key);
            if coefficient != 0.0 {
                c.expression_mut().add_scaled(&defining, coefficient);
            }
        }
        let coefficient = self.objective.expression_mut().remove_term(key);
        if coefficient != 0.0 {
            self.objective
                .expression_mut()
                .add_scaled(&defining, coefficient);
        }
        self.variables[*key].set_dependency(defining);
    }

    // ------------------------------------------------------------------
    // State update
    // ------------------------------------------------------------------

    /// Full refresh of every cached quantity from the current variable
    /// values.
    pub fn update(&mut self) {
        self.update_dependent_variables_and_disabled_constraints();
        let variables = &self.variables;
        for c in &mut self.constraints {
            if c.is_enabled() {
                c.update(variables);
            }
        }
        self.objective.expression_mut().update(variables);
        self.update_selections();
    }

    /// Apply `mv` and incrementally refresh exactly the touched caches.
    pub fn update_with_move(&mut self, mv: &Move) -> Result<(), VariableError> {
        {
            let variables = &self.variables;
            let constraints = &mut self.constraints;
            for &id in mv.related_constraints() {
                if constraints[*id].is_enabled() {
                    constraints[*id].update_with_move(variables, mv);
                }
            }
            self.objective
                .expression_mut()
                .update_with_move(variables, mv);
        }
        for alteration in mv.alterations() {
            self.variables[*alteration.variable].set_value(alteration.target)?;
            if self.variables[*alteration.variable].kind() == VariableKind::Selection
                && alteration.target == 1
            {
                if let Some(selection) = self.variables[*alteration.variable].selection() {
                    self.selections[*selection].select(alteration.variable);
                }
            }
        }
        // Only dependents whose defining expression saw an altered variable
        // can change, which keeps this path O(variables moved).
        let touched: Vec<VariableID> = mv
            .variable_ids()
            .filter_map(|id| self.dependency_consumers.get(&id))
            .flatten()
            .copied()
            .collect();
        self.update_dependent_variables(touched);
        Ok(())
    }

    /// Recompute every dependent variable from its defining expression and
    /// refresh the cached values of disabled constraints so that exported
    /// solutions and debug output stay consistent.
    pub fn update_dependent_variables_and_disabled_constraints(&mut self) {
        let dependent: Vec<VariableID> = self
            .variable_reference
            .dependent_binary
            .iter()
            .chain(self.variable_reference.dependent_integer.iter())
            .copied()
            .collect();
        self.update_dependent_variables(dependent);
        let variables = &self.variables;
        for &id in &self.constraint_reference.disabled {
            self.constraints[*id].update(variables);
        }
    }

    fn update_dependent_variables(&mut self, mut dependent: Vec<VariableID>) {
        dependent.sort_unstable();
        dependent.dedup();
        for id in dependent {
            let value = match self.variables[*id].dependency() {
                Some(expression) => expression.evaluate(&self.variables).round() as i64,
                None => continue,
            };
            self.variables[*id].set_value_unchecked(value);
        }
    }

    fn update_selections(&mut self) {
        for selection in &mut self.selections {
            let selected = selection
                .members()
                .iter()
                .find(|&&m| self.variables[*m].value() == 1)
                .copied();
            if let Some(selected) = selected {
                selection.select(selected);
            }
        }
    }

    // ------------------------------------------------------------------
    // Solution import / export
    // ------------------------------------------------------------------

    /// Overwrite every mutable variable from `values` (indexed by variable
    /// arena order), then refresh all caches.
    pub fn import_variable_values(&mut self, values: &[i64]) {
        for (variable, &value) in self.variables.iter_mut().zip(values) {
            variable.set_value_if_mutable(value);
        }
        self.update();
    }

    pub fn export_variable_values(&self) -> Vec<i64> {
        self.variables.iter().map(|v| v.value()).collect()
    }

    pub fn export_plain_solution(&self, atol: ATol) -> PlainSolution {
        let total_violation: f64 = self
            .constraint_reference
            .enabled
            .iter()
            .map(|&id| self.constraints[*id].violation_value())
            .sum();
        PlainSolution {
            variable_values: self.export_variable_values(),
            objective: self.objective.expression().value(),
            total_violation,
            is_feasible: total_violation < *atol,
        }
    }

    pub fn export_named_solution(&self, plain: &PlainSolution) -> NamedSolution {
        NamedSolution {
            name: self.name.clone(),
            objective: self.objective.displayed_value(plain.objective),
            total_violation: plain.total_violation,
            is_feasible: plain.is_feasible,
            variables: self
                .variables
                .iter()
                .zip(&plain.variable_values)
                .map(|(v, &value)| (v.name().to_string(), value))
                .collect(),
        }
    }

    /// The Lagrangian `f(x) + sum_c lambda_c g_c(x)` for the given dual
    /// values, indexed by constraint arena order.
    pub fn compute_lagrangian(&self, duals: &[f64]) -> f64 {
        let penalty: f64 = self
            .constraint_reference
            .enabled
            .iter()
            .map(|&id| duals[*id] * self.constraints[*id].constraint_value())
            .sum();
        self.objective.expression().value() + penalty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Alteration, MoveSense};
    use approx::assert_abs_diff_eq;

    fn two_variable_model() -> (Model, VariableID, VariableID, ConstraintID) {
        let mut model = Model::new("test");
        let x = model.integer_variable("x", Bound::new(0, 10).unwrap());
        let y = model.integer_variable("y", Bound::new(0, 10).unwrap());
        let objective = model.expression().term(x, 1.0).term(y, 2.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        let lhs = model
            .expression()
            .term(x, 1.0)
            .term(y, 1.0)
            .constant(-10.0)
            .build();
        let c = model.add_constraint("c", lhs, ConstraintSense::Less).unwrap();
        model.setup();
        (model, x, y, c)
    }

    #[test]
    fn update_with_move_matches_full_update() {
        let (mut model, x, y, c) = two_variable_model();
        let mv = Move::new(
            MoveSense::Integer,
            [Alteration::new(x, 7), Alteration::new(y, 6)],
            vec![c],
        );
        model.update_with_move(&mv).unwrap();
        let incremental = model.constraint(c).violation_value();

        let mut scratch = two_variable_model().0;
        scratch.variable_mut(x).set_value(7).unwrap();
        scratch.variable_mut(y).set_value(6).unwrap();
        scratch.update();
        assert_abs_diff_eq!(incremental, scratch.constraint(c).violation_value());
        assert_abs_diff_eq!(incremental, 3.0);
    }

    #[test]
    fn duplicate_constraint_name_is_rejected() {
        let (mut model, x, _, _) = two_variable_model();
        let lhs = model.expression().term(x, 1.0).build();
        assert!(matches!(
            model.add_constraint("c", lhs, ConstraintSense::Less),
            Err(ModelError::DuplicateConstraintName(_))
        ));
    }

    #[test]
    fn validate_requires_content() {
        let model = Model::new("empty");
        assert!(matches!(
            model.validate(),
            Err(ModelError::NoDecisionVariables)
        ));

        let mut no_objective = Model::new("vars-only");
        no_objective.binary_variable("x");
        assert!(matches!(
            no_objective.validate(),
            Err(ModelError::NoObjectiveOrConstraint)
        ));
    }

    #[test]
    fn dependency_substitutes_and_tracks() {
        let mut model = Model::new("dep");
        let x = model.integer_variable("x", Bound::new(0, 5).unwrap());
        let y = model.integer_variable("y", Bound::new(0, 5).unwrap());
        let objective = model.expression().term(x, 1.0).term(y, 1.0).build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        // y = x  (x - y = 0)
        let defining = model.expression().term(x, 1.0).term(y, -1.0).build();
        let c = model
            .add_constraint("bal", defining, ConstraintSense::Equal)
            .unwrap();
        model.setup();

        let dependency = model.expression().term(x, 1.0).build();
        model.add_dependency(y, dependency, c);
        model.setup();

        // y is gone from the objective: coefficient folded into x
        assert_abs_diff_eq!(model.objective().expression().coefficient(x), 2.0);
        assert_abs_diff_eq!(model.objective().expression().coefficient(y), 0.0);

        model.variable_mut(x).set_value(4).unwrap();
        model.update();
        assert_eq!(model.variable(y).value(), 4);
    }

    #[test]
    fn named_export_round_trip() {
        let (mut model, x, y, _) = two_variable_model();
        model.variable_mut(x).set_value(2).unwrap();
        model.variable_mut(y).set_value(3).unwrap();
        model.update();
        let plain = model.export_plain_solution(ATol::default());
        let named = model.export_named_solution(&plain);
        assert_eq!(named.value_of("x"), Some(2));
        assert_eq!(named.value_of("y"), Some(3));
        assert_abs_diff_eq!(named.objective, 8.0);
        assert!(named.is_feasible);
    }
}
