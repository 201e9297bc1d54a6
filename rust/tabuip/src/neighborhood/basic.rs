use super::AcceptancePolicy;
use crate::{Alteration, Model, Move, MoveSense, VariableID};

/// One toggling move per unfixed binary variable.
pub fn binary_moves(model: &Model, policy: &AcceptancePolicy) -> Vec<Move> {
    let mut moves = Vec::new();
    for &id in &model.variable_reference().binary {
        if !policy.accepts(model, [id]) {
            continue;
        }
        let v = model.variable(id);
        moves.push(Move::new(
            MoveSense::Binary,
            [Alteration::new(id, 1 - v.value())],
            v.related_constraints().to_vec(),
        ));
    }
    moves
}

/// Steps of +-1 per unfixed integer variable with margin, widened to a
/// tenth of the bound range when the range allows a larger stride.
pub fn integer_moves(model: &Model, policy: &AcceptancePolicy) -> Vec<Move> {
    let mut moves = Vec::new();
    for &id in &model.variable_reference().integer {
        if !policy.accepts(model, [id]) {
            continue;
        }
        let v = model.variable(id);
        let related = v.related_constraints().to_vec();
        let mut push = |target: i64| {
            moves.push(Move::new(
                MoveSense::Integer,
                [Alteration::new(id, target)],
                related.clone(),
            ));
        };
        if v.has_upper_bound_margin() {
            push(v.value() + 1);
        }
        if v.has_lower_bound_margin() {
            push(v.value() - 1);
        }
        let bound = v.bound();
        if bound.is_finite() {
            let stride = (bound.upper() - bound.lower()) / 10;
            if stride >= 2 {
                if v.value() + stride <= bound.upper() {
                    push(v.value() + stride);
                }
                if v.value() - stride >= bound.lower() {
                    push(v.value() - stride);
                }
            }
        }
    }
    moves
}

/// For every selection, switch the selected member to each other mutable
/// member.
pub fn selection_moves(model: &Model, policy: &AcceptancePolicy) -> Vec<Move> {
    let mut moves = Vec::new();
    for selection in model.selections() {
        let Some(selected) = selection.selected() else {
            continue;
        };
        if model.variable(selected).is_fixed() {
            continue;
        }
        for &member in selection.members() {
            if member == selected || model.variable(member).is_fixed() {
                continue;
            }
            if !policy.accepts(model, [selected, member]) {
                continue;
            }
            moves.push(Move::new(
                MoveSense::Selection,
                [Alteration::new(selected, 0), Alteration::new(member, 1)],
                merged_related(model, &[selected, member]),
            ));
        }
    }
    moves
}

/// Sorted-unique union of the related constraint sets of `ids`.
pub(super) fn merged_related(model: &Model, ids: &[VariableID]) -> Vec<crate::ConstraintID> {
    let mut related: Vec<crate::ConstraintID> = ids
        .iter()
        .flat_map(|&id| model.variable(id).related_constraints().iter().copied())
        .collect();
    related.sort_unstable();
    related.dedup();
    related
}
