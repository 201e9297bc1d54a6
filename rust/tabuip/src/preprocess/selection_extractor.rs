use crate::{ConstraintID, Model, VariableID, VariableKind};
use std::collections::BTreeSet;

/// Order in which candidate selection constraints are extracted. Since a
/// variable can belong to at most one selection, the order decides which
/// overlapping candidates win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionExtractionMode {
    Off,
    /// Definition order.
    Defined,
    /// Fewest member variables first.
    Smaller,
    /// Most member variables first.
    #[default]
    Larger,
    /// Only candidates that overlap no other candidate.
    Independent,
}

/// Identify enabled `sum x_i = 1` rows over mutable binaries (and rows
/// flagged as user-defined selections) and extract them as [`Selection`]s:
/// members take kind Selection and the defining row is disabled.
///
/// [`Selection`]: crate::Selection
pub fn extract_selections(model: &mut Model, mode: SelectionExtractionMode) -> usize {
    if mode == SelectionExtractionMode::Off {
        return 0;
    }

    let mut candidates: Vec<(ConstraintID, Vec<VariableID>)> = Vec::new();
    for &id in &model.constraint_reference().enabled {
        let c = model.constraint(id);
        if !(c.kind() == crate::ConstraintKind::SetPartitioning || c.is_user_defined_selection()) {
            continue;
        }
        // Members fixed at 0 simply drop out of the selection; a member
        // fixed at 1 leaves the reducer to finish the row off instead.
        let mut members: Vec<VariableID> = Vec::new();
        let mut extractable = true;
        for (member, _) in c.expression().sorted_terms() {
            let v = model.variable(member);
            if v.is_fixed() {
                if v.value() != 0 {
                    extractable = false;
                    break;
                }
                continue;
            }
            if v.kind() != VariableKind::Binary {
                extractable = false;
                break;
            }
            members.push(member);
        }
        if extractable && members.len() >= 2 {
            candidates.push((id, members));
        }
    }

    match mode {
        SelectionExtractionMode::Off | SelectionExtractionMode::Defined => {}
        SelectionExtractionMode::Smaller => {
            candidates.sort_by_key(|(id, members)| (members.len(), *id));
        }
        SelectionExtractionMode::Larger => {
            candidates.sort_by_key(|(id, members)| (std::cmp::Reverse(members.len()), *id));
        }
        SelectionExtractionMode::Independent => {
            let mut seen: BTreeSet<VariableID> = BTreeSet::new();
            let mut shared: BTreeSet<VariableID> = BTreeSet::new();
            for (_, members) in &candidates {
                for &m in members {
                    if !seen.insert(m) {
                        shared.insert(m);
                    }
                }
            }
            candidates.retain(|(_, members)| members.iter().all(|m| !shared.contains(m)));
        }
    }

    let mut claimed: BTreeSet<VariableID> = BTreeSet::new();
    let mut extracted = 0;
    for (constraint, members) in candidates {
        if members.iter().any(|m| claimed.contains(m)) {
            continue;
        }
        claimed.extend(members.iter().copied());
        tracing::debug!(
            constraint = model.constraint(constraint).name(),
            size = members.len(),
            "extract selection"
        );
        model.add_selection(members, constraint);
        extracted += 1;
    }
    extracted
}
