use super::basic::merged_related;
use super::AcceptancePolicy;
use crate::{Alteration, Model, Move, MoveSense};

/// An externally registered move source for bespoke problems (e.g. QAP
/// swap neighborhoods). The callback sees the read-only model and returns
/// fully formed moves; the policy filter is applied on its output.
pub struct UserDefinedGenerator {
    generate: Box<dyn Fn(&Model) -> Vec<Move> + Send + Sync>,
}

impl UserDefinedGenerator {
    pub fn new(generate: impl Fn(&Model) -> Vec<Move> + Send + Sync + 'static) -> Self {
        Self {
            generate: Box::new(generate),
        }
    }
}

impl std::fmt::Debug for UserDefinedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDefinedGenerator").finish()
    }
}

pub(super) fn user_defined_moves(
    generator: &UserDefinedGenerator,
    model: &Model,
    policy: &AcceptancePolicy,
) -> Vec<Move> {
    (generator.generate)(model)
        .into_iter()
        .map(|mut mv| {
            if mv.sense() != MoveSense::UserDefined {
                mv = Move::new(
                    MoveSense::UserDefined,
                    mv.alterations().to_vec(),
                    mv.related_constraints().to_vec(),
                );
            }
            mv
        })
        .filter(|mv| policy.accepts(model, mv.variable_ids()))
        .filter(|mv| {
            mv.alterations()
                .iter()
                .all(|a| !model.variable(a.variable).is_fixed())
        })
        .collect()
}

/// Flip both members of every registered flippable pair.
pub(super) fn two_flip_moves(model: &Model, policy: &AcceptancePolicy) -> Vec<Move> {
    let mut moves = Vec::new();
    for &(x, y) in model.flippable_pairs() {
        if model.variable(x).is_fixed() || model.variable(y).is_fixed() {
            continue;
        }
        if !policy.accepts(model, [x, y]) {
            continue;
        }
        moves.push(Move::new(
            MoveSense::TwoFlip,
            [
                Alteration::new(x, 1 - model.variable(x).value()),
                Alteration::new(y, 1 - model.variable(y).value()),
            ],
            merged_related(model, &[x, y]),
        ));
    }
    moves
}
