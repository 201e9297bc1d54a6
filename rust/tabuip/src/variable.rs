use crate::{Bound, ConstraintID, Expression, Move, SelectionID};
use derive_more::{Deref, From};
use getset::{CopyGetters, Getters};
use std::hash::{Hash, Hasher};

/// ID for a decision variable. Doubles as the index into the model's
/// variable arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Deref)]
pub struct VariableID(usize);

impl VariableID {
    pub fn into_inner(&self) -> usize {
        self.0
    }

    /// A stable single-variable hash, XOR-combined over move alterations
    /// and constraint memberships.
    pub fn stable_hash(&self) -> u64 {
        let mut hasher = fnv::FnvHasher::default();
        self.0.hash(&mut hasher);
        hasher.finish()
    }
}

impl std::fmt::Debug for VariableID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VariableID({})", self.0)
    }
}

impl std::fmt::Display for VariableID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VariableKind {
    Binary,
    Integer,
    /// Member of an extracted selection (`sum = 1` over binaries).
    Selection,
    /// Binary variable determined by a defining expression.
    DependentBinary,
    /// Integer variable determined by a defining expression.
    DependentInteger,
}

impl VariableKind {
    pub fn is_binary_or_selection(&self) -> bool {
        matches!(
            self,
            VariableKind::Binary | VariableKind::Selection | VariableKind::DependentBinary
        )
    }

    pub fn is_dependent(&self) -> bool {
        matches!(
            self,
            VariableKind::DependentBinary | VariableKind::DependentInteger
        )
    }
}

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum VariableError {
    #[error("Variable {name} is fixed and cannot take value {value}")]
    FixedVariableMutation { name: String, value: i64 },

    #[error("Value {value} for variable {name} is out of bound {bound}")]
    ValueOutOfBound {
        name: String,
        value: i64,
        bound: Bound,
    },
}

/// An integer decision variable with incrementally maintained caches.
///
/// Invariants
/// ----------
/// - `value` lies in `bound` except while a move is being evaluated
///   tentatively (evaluation never mutates the variable).
/// - `constraint_sensitivities` is sorted by constraint ID and unique.
/// - `has_lower_bound_margin == (value > bound.lower())` and
///   `has_upper_bound_margin == (value < bound.upper())` after every value
///   or bound change.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct Variable {
    #[getset(get_copy = "pub")]
    id: VariableID,
    name: String,
    #[getset(get_copy = "pub")]
    value: i64,
    #[getset(get_copy = "pub")]
    bound: Bound,
    #[getset(get_copy = "pub")]
    kind: VariableKind,
    #[getset(get_copy = "pub")]
    is_fixed: bool,

    /// The selection this variable belongs to, when `kind == Selection`.
    #[getset(get_copy = "pub")]
    selection: Option<SelectionID>,
    /// The defining expression, when the kind is dependent.
    dependency: Option<Expression>,

    /// Enabled constraints this variable appears in, sorted and unique.
    #[getset(get = "pub")]
    related_constraints: Vec<ConstraintID>,
    /// `(constraint, coefficient)` for every related constraint, sorted by
    /// constraint ID.
    #[getset(get = "pub")]
    constraint_sensitivities: Vec<(ConstraintID, f64)>,
    /// Subset of `related_constraints` whose members are all binary or
    /// selection variables with coefficients of +-1.
    #[getset(get = "pub")]
    binary_unit_constraints: Vec<ConstraintID>,

    #[getset(get_copy = "pub")]
    objective_sensitivity: f64,

    #[getset(get_copy = "pub")]
    is_objective_improvable: bool,
    #[getset(get_copy = "pub")]
    is_feasibility_improvable: bool,
    #[getset(get_copy = "pub")]
    has_lower_bound_margin: bool,
    #[getset(get_copy = "pub")]
    has_upper_bound_margin: bool,

    /// XOR of the stable hashes of all related constraints.
    #[getset(get_copy = "pub")]
    related_hash: u64,
}

impl Variable {
    pub fn new(id: VariableID, name: &str, kind: VariableKind, bound: Bound) -> Self {
        let value = bound.clamp(0);
        let mut new = Self {
            id,
            name: name.to_string(),
            value,
            bound,
            kind,
            is_fixed: false,
            selection: None,
            dependency: None,
            related_constraints: Vec::new(),
            constraint_sensitivities: Vec::new(),
            binary_unit_constraints: Vec::new(),
            objective_sensitivity: 0.0,
            is_objective_improvable: false,
            is_feasibility_improvable: false,
            has_lower_bound_margin: false,
            has_upper_bound_margin: false,
            related_hash: 0,
        };
        new.update_margins();
        new
    }

    pub fn binary(id: VariableID, name: &str) -> Self {
        Self::new(id, name, VariableKind::Binary, Bound::of_binary())
    }

    pub fn integer(id: VariableID, name: &str, bound: Bound) -> Self {
        Self::new(id, name, VariableKind::Integer, bound)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_mutable(&self) -> bool {
        !self.is_fixed
    }

    /// Set the value, rejecting mutation of fixed variables and values
    /// outside the bound.
    pub fn set_value(&mut self, value: i64) -> Result<(), VariableError> {
        if self.is_fixed && value != self.value {
            return Err(VariableError::FixedVariableMutation {
                name: self.name.clone(),
                value,
            });
        }
        if !self.bound.contains(value) {
            return Err(VariableError::ValueOutOfBound {
                name: self.name.clone(),
                value,
                bound: self.bound,
            });
        }
        self.value = value;
        self.update_margins();
        Ok(())
    }

    /// Set the value, silently skipping fixed variables. Used by the
    /// Lagrange-dual primal update and initial-state modification.
    pub fn set_value_if_mutable(&mut self, value: i64) {
        if !self.is_fixed {
            self.value = self.bound.clamp(value);
            self.update_margins();
        }
    }

    /// Overwrite the value without a bound check. Reserved for dependent
    /// variables, whose defining expression may momentarily leave the bound
    /// while the model converges.
    pub(crate) fn set_value_unchecked(&mut self, value: i64) {
        self.value = value;
        self.update_margins();
    }

    pub fn fix_to(&mut self, value: i64) {
        self.value = value;
        self.bound = Bound::new(value, value).unwrap();
        self.is_fixed = true;
        self.update_margins();
    }

    pub fn unfix(&mut self) {
        self.is_fixed = false;
    }

    pub fn set_bound(&mut self, bound: Bound) {
        self.bound = bound;
        self.value = bound.clamp(self.value);
        self.update_margins();
    }

    pub fn set_kind(&mut self, kind: VariableKind) {
        self.kind = kind;
    }

    pub fn set_selection(&mut self, selection: SelectionID) {
        self.selection = Some(selection);
        self.kind = VariableKind::Selection;
    }

    pub fn set_dependency(&mut self, expression: Expression) {
        self.kind = if self.kind.is_binary_or_selection() {
            VariableKind::DependentBinary
        } else {
            VariableKind::DependentInteger
        };
        self.dependency = Some(expression);
    }

    pub fn dependency(&self) -> Option<&Expression> {
        self.dependency.as_ref()
    }

    /// The value this variable would take under `mv`: the move's target
    /// value if the move alters it, the current value otherwise. Never
    /// mutates.
    pub fn evaluate_move(&self, mv: &Move) -> i64 {
        mv.target_of(self.id).unwrap_or(self.value)
    }

    fn update_margins(&mut self) {
        self.has_lower_bound_margin = self.value > self.bound.lower();
        self.has_upper_bound_margin = self.value < self.bound.upper();
    }

    pub fn set_objective_sensitivity(&mut self, sensitivity: f64) {
        self.objective_sensitivity = sensitivity;
    }

    pub fn set_is_objective_improvable(&mut self, flag: bool) {
        self.is_objective_improvable = flag;
    }

    pub fn set_is_feasibility_improvable(&mut self, flag: bool) {
        self.is_feasibility_improvable = flag;
    }

    /// Install the reference tables computed by the model builder. The
    /// sensitivity list must arrive sorted by constraint ID and unique.
    pub(crate) fn set_references(
        &mut self,
        related_constraints: Vec<ConstraintID>,
        constraint_sensitivities: Vec<(ConstraintID, f64)>,
        binary_unit_constraints: Vec<ConstraintID>,
    ) {
        self.related_hash = related_constraints
            .iter()
            .fold(0u64, |hash, c| hash ^ c.stable_hash());
        self.related_constraints = related_constraints;
        self.constraint_sensitivities = constraint_sensitivities;
        self.binary_unit_constraints = binary_unit_constraints;
    }

    /// Coefficient of this variable in `constraint`, 0 when absent.
    pub fn constraint_sensitivity(&self, constraint: ConstraintID) -> f64 {
        self.constraint_sensitivities
            .binary_search_by_key(&constraint, |(id, _)| *id)
            .map(|index| self.constraint_sensitivities[index].1)
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable() -> Variable {
        Variable::integer(VariableID::from(0), "x", Bound::new(0, 10).unwrap())
    }

    #[test]
    fn margins_track_value_and_bound() {
        let mut x = variable();
        x.set_value(0).unwrap();
        assert!(!x.has_lower_bound_margin());
        assert!(x.has_upper_bound_margin());

        x.set_value(10).unwrap();
        assert!(x.has_lower_bound_margin());
        assert!(!x.has_upper_bound_margin());

        x.set_bound(Bound::new(10, 10).unwrap());
        assert!(!x.has_lower_bound_margin());
        assert!(!x.has_upper_bound_margin());
    }

    #[test]
    fn set_value_rejects_out_of_bound() {
        let mut x = variable();
        assert!(matches!(
            x.set_value(11),
            Err(VariableError::ValueOutOfBound { .. })
        ));
    }

    #[test]
    fn fixed_variable_rejects_mutation() {
        let mut x = variable();
        x.fix_to(3);
        assert!(x.set_value(3).is_ok());
        assert!(matches!(
            x.set_value(4),
            Err(VariableError::FixedVariableMutation { .. })
        ));
        x.set_value_if_mutable(7);
        assert_eq!(x.value(), 3);
    }

    #[test]
    fn dependency_promotes_kind() {
        let mut y = Variable::binary(VariableID::from(1), "y");
        y.set_dependency(Expression::default());
        assert_eq!(y.kind(), VariableKind::DependentBinary);

        let mut z = variable();
        z.set_dependency(Expression::default());
        assert_eq!(z.kind(), VariableKind::DependentInteger);
    }
}
