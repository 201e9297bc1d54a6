use crate::{ConstraintID, VariableID};
use derive_more::{Deref, From};
use getset::CopyGetters;

/// ID for a selection. Doubles as the index into the model's selection
/// arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, From, Deref)]
pub struct SelectionID(usize);

impl SelectionID {
    pub fn into_inner(&self) -> usize {
        self.0
    }
}

impl std::fmt::Debug for SelectionID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SelectionID({})", self.0)
    }
}

/// A group of binary variables constrained to sum to one, extracted from a
/// set-partitioning constraint. Exactly one member holds value 1 at any
/// time outside of move evaluation; the defining constraint stays disabled
/// for the lifetime of the selection.
#[derive(Debug, Clone, CopyGetters)]
pub struct Selection {
    #[getset(get_copy = "pub")]
    id: SelectionID,
    members: Vec<VariableID>,
    #[getset(get_copy = "pub")]
    selected: Option<VariableID>,
    #[getset(get_copy = "pub")]
    constraint: ConstraintID,
}

impl Selection {
    pub fn new(id: SelectionID, members: Vec<VariableID>, constraint: ConstraintID) -> Self {
        Self {
            id,
            members,
            selected: None,
            constraint,
        }
    }

    pub fn members(&self) -> &[VariableID] {
        &self.members
    }

    pub fn contains(&self, variable: VariableID) -> bool {
        self.members.contains(&variable)
    }

    pub fn select(&mut self, variable: VariableID) {
        self.selected = Some(variable);
    }
}
