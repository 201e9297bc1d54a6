use super::AcceptancePolicy;
use crate::{compute_overlap_rate, Model, Move, MoveSense};
use fnv::FnvHashSet;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::VecDeque;

/// How the chain store is pruned once it exceeds its capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainMoveReduceMode {
    /// Keep the chains with the smallest overlap rate (the most independent
    /// compositions).
    #[default]
    OverlapRate,
    /// Keep a uniform sample without replacement, drawn by shuffling with
    /// the solver RNG and truncating.
    Shuffle,
}

/// Composes chains out of recently applied improving moves.
///
/// The generator keeps a bounded FIFO of recent improving moves; each new
/// registration is composed with every queued move, and compositions whose
/// overlap rate is positive but below the threshold are stored as chain
/// moves. Stored chains persist across iterations and are pruned back to
/// `chain_move_capacity` by the configured reduce mode.
#[derive(Debug, Clone)]
pub struct ChainMoveGenerator {
    queue: VecDeque<Move>,
    queue_capacity: usize,
    overlap_rate_threshold: f64,
    moves: Vec<Move>,
    seen: FnvHashSet<u64>,
}

impl ChainMoveGenerator {
    pub fn new(queue_capacity: usize, overlap_rate_threshold: f64) -> Self {
        Self {
            queue: VecDeque::with_capacity(queue_capacity.max(1)),
            queue_capacity: queue_capacity.max(1),
            overlap_rate_threshold,
            moves: Vec::new(),
            seen: FnvHashSet::default(),
        }
    }

    pub fn number_of_stored_moves(&self) -> usize {
        self.moves.len()
    }

    /// Register an applied improving move and synthesize chain candidates
    /// against the queued history.
    pub fn register(&mut self, mv: &Move, model: &Model) {
        if mv.sense() != MoveSense::Chain {
            for previous in &self.queue {
                if previous.hash() == mv.hash() {
                    continue;
                }
                let mut composed = previous.chain(mv);
                let rate = compute_overlap_rate(composed.alterations(), |id| {
                    model.variable(id).related_constraints().as_slice()
                });
                if rate <= 0.0 || rate >= self.overlap_rate_threshold {
                    continue;
                }
                composed.set_overlap_rate(rate);
                if self.seen.insert(composed.hash()) {
                    self.moves.push(composed);
                }
            }
        }
        self.queue.push_back(mv.clone());
        if self.queue.len() > self.queue_capacity {
            self.queue.pop_front();
        }
    }

    /// Prune the store back to `capacity` under `mode`.
    pub fn reduce(&mut self, capacity: usize, mode: ChainMoveReduceMode, rng: &mut StdRng) {
        if self.moves.len() <= capacity {
            return;
        }
        match mode {
            ChainMoveReduceMode::OverlapRate => {
                self.moves.sort_by(|a, b| {
                    a.overlap_rate()
                        .partial_cmp(&b.overlap_rate())
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
            ChainMoveReduceMode::Shuffle => {
                self.moves.shuffle(rng);
            }
        }
        self.moves.truncate(capacity);
        self.seen = self.moves.iter().map(|m| m.hash()).collect();
    }

    /// Forget everything; used when the outer solver restarts the state.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.moves.clear();
        self.seen.clear();
    }

    /// Emit the stored chains that are still applicable: no fixed variable,
    /// at least one target differing from the current value, and the
    /// policy's improvability condition.
    pub(super) fn emit(&self, model: &Model, policy: &AcceptancePolicy) -> Vec<Move> {
        self.moves
            .iter()
            .filter(|mv| mv.is_available())
            .filter(|mv| {
                mv.alterations()
                    .iter()
                    .all(|a| !model.variable(a.variable).is_fixed())
            })
            .filter(|mv| {
                mv.alterations()
                    .iter()
                    .any(|a| model.variable(a.variable).value() != a.target)
            })
            .filter(|mv| policy.accepts(model, mv.variable_ids()))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Alteration, Bound, ConstraintSense, ObjectiveSense, VariableID};
    use rand::SeedableRng;

    /// Three variables pairwise sharing constraints, as in a triangle of
    /// `x + y <= k` rows.
    fn triangle_model() -> Model {
        let mut model = Model::new("triangle");
        let x = model.integer_variable("x", Bound::new(0, 10).unwrap());
        let y = model.integer_variable("y", Bound::new(0, 10).unwrap());
        let z = model.integer_variable("z", Bound::new(0, 10).unwrap());
        let objective = model
            .expression()
            .term(x, -1.0)
            .term(y, -1.0)
            .term(z, -1.0)
            .build();
        model.set_objective(objective, ObjectiveSense::Minimize);
        for (name, a, b) in [("xy", x, y), ("yz", y, z), ("xz", x, z)] {
            let lhs = model
                .expression()
                .term(a, 1.0)
                .term(b, 1.0)
                .constant(-10.0)
                .build();
            model.add_constraint(name, lhs, ConstraintSense::Less).unwrap();
        }
        model.setup();
        model
    }

    fn single_move(model: &Model, index: usize, target: i64) -> Move {
        let id = VariableID::from(index);
        Move::new(
            crate::MoveSense::Integer,
            [Alteration::new(id, target)],
            model.variable(id).related_constraints().to_vec(),
        )
    }

    #[test]
    fn register_composes_overlapping_pairs() {
        let model = triangle_model();
        let mut generator = ChainMoveGenerator::new(4, 0.9);
        generator.register(&single_move(&model, 0, 1), &model);
        assert_eq!(generator.number_of_stored_moves(), 0);
        generator.register(&single_move(&model, 1, 1), &model);
        // x and y share one of their two constraints: rate 1/3 < 0.9
        assert_eq!(generator.number_of_stored_moves(), 1);
        let chains = generator.emit(&model, &AcceptancePolicy::all());
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].alterations().len(), 2);
        assert_eq!(chains[0].sense(), crate::MoveSense::Chain);
    }

    #[test]
    fn threshold_blocks_tight_overlap() {
        let model = triangle_model();
        let mut generator = ChainMoveGenerator::new(4, 0.2);
        generator.register(&single_move(&model, 0, 1), &model);
        generator.register(&single_move(&model, 1, 1), &model);
        // rate 1/3 is above the 0.2 threshold
        assert_eq!(generator.number_of_stored_moves(), 0);
    }

    #[test]
    fn emit_skips_no_op_chains() {
        let mut model = triangle_model();
        let mut generator = ChainMoveGenerator::new(4, 0.9);
        generator.register(&single_move(&model, 0, 1), &model);
        generator.register(&single_move(&model, 1, 1), &model);

        // Once the state already equals the chain targets, it is a no-op
        model.import_variable_values(&[1, 1, 0]);
        assert!(generator.emit(&model, &AcceptancePolicy::all()).is_empty());
    }

    #[test]
    fn reduce_by_shuffle_truncates() {
        let model = triangle_model();
        let mut generator = ChainMoveGenerator::new(8, 0.9);
        for target in 1..=4 {
            generator.register(&single_move(&model, 0, target), &model);
            generator.register(&single_move(&model, 1, target), &model);
            generator.register(&single_move(&model, 2, target), &model);
        }
        let stored = generator.number_of_stored_moves();
        assert!(stored > 2);
        let mut rng = StdRng::seed_from_u64(1);
        generator.reduce(2, ChainMoveReduceMode::Shuffle, &mut rng);
        assert_eq!(generator.number_of_stored_moves(), 2);
    }
}
