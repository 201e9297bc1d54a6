mod basic;
mod chain;
mod special;
mod structural;

pub use chain::{ChainMoveGenerator, ChainMoveReduceMode};
pub use special::UserDefinedGenerator;

use crate::{Model, Move, VariableID};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;

/// Which generators run and how the chain generator prunes.
#[derive(Debug, Clone)]
pub struct NeighborhoodConfig {
    pub is_enabled_binary_move: bool,
    pub is_enabled_integer_move: bool,
    pub is_enabled_selection_move: bool,
    /// Exclusive-or/nor, inverted/balanced integers, constant
    /// sum/difference/ratio pair moves.
    pub is_enabled_exclusive_move: bool,
    pub is_enabled_aggregation_move: bool,
    pub is_enabled_precedence_move: bool,
    pub is_enabled_variable_bound_move: bool,
    pub is_enabled_soft_selection_move: bool,
    pub is_enabled_two_flip_move: bool,
    pub is_enabled_chain_move: bool,
    pub is_enabled_user_defined_move: bool,
    pub chain_move_capacity: usize,
    pub chain_move_queue_capacity: usize,
    pub chain_move_overlap_rate_threshold: f64,
    pub chain_move_reduce_mode: ChainMoveReduceMode,
}

impl Default for NeighborhoodConfig {
    fn default() -> Self {
        Self {
            is_enabled_binary_move: true,
            is_enabled_integer_move: true,
            is_enabled_selection_move: true,
            is_enabled_exclusive_move: true,
            is_enabled_aggregation_move: true,
            is_enabled_precedence_move: true,
            is_enabled_variable_bound_move: true,
            is_enabled_soft_selection_move: true,
            is_enabled_two_flip_move: false,
            is_enabled_chain_move: true,
            is_enabled_user_defined_move: false,
            chain_move_capacity: 10000,
            chain_move_queue_capacity: 10,
            chain_move_overlap_rate_threshold: 0.2,
            chain_move_reduce_mode: ChainMoveReduceMode::OverlapRate,
        }
    }
}

/// Acceptance policy for a single neighborhood update.
#[derive(Debug, Clone, Copy)]
pub struct AcceptancePolicy {
    pub accept_all: bool,
    pub accept_objective_improvable: bool,
    pub accept_feasibility_improvable: bool,
}

impl AcceptancePolicy {
    pub fn all() -> Self {
        Self {
            accept_all: true,
            accept_objective_improvable: true,
            accept_feasibility_improvable: true,
        }
    }

    pub fn objective_improvable_only() -> Self {
        Self {
            accept_all: false,
            accept_objective_improvable: true,
            accept_feasibility_improvable: false,
        }
    }

    pub fn feasibility_improvable_only() -> Self {
        Self {
            accept_all: false,
            accept_objective_improvable: false,
            accept_feasibility_improvable: true,
        }
    }

    /// A move passes iff some altered variable satisfies the active
    /// improvability condition: a multi-variable move is worth trying as
    /// soon as one of its members can improve.
    pub fn accepts(&self, model: &Model, variables: impl IntoIterator<Item = VariableID>) -> bool {
        if self.accept_all {
            return true;
        }
        variables.into_iter().any(|id| {
            let v = model.variable(id);
            (self.accept_objective_improvable && v.is_objective_improvable())
                || (self.accept_feasibility_improvable && v.is_feasibility_improvable())
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GeneratorKind {
    Binary,
    Integer,
    Selection,
    Exclusive,
    Aggregation,
    Precedence,
    VariableBound,
    SoftSelection,
    TwoFlip,
    Chain,
    UserDefined,
}

/// Generates and holds the concatenated candidate move list for one
/// tabu-search iteration.
///
/// Generators run either sequentially or on the rayon pool; in both cases
/// the concatenation order is the fixed generator order, never thread
/// finish order, so a fixed seed yields identical candidate lists.
pub struct Neighborhood {
    config: NeighborhoodConfig,
    moves: Vec<Move>,
    chain: ChainMoveGenerator,
    user_defined: Option<UserDefinedGenerator>,
}

impl std::fmt::Debug for Neighborhood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neighborhood")
            .field("config", &self.config)
            .field("moves", &self.moves.len())
            .finish()
    }
}

impl Neighborhood {
    pub fn new(config: NeighborhoodConfig) -> Self {
        let chain = ChainMoveGenerator::new(
            config.chain_move_queue_capacity,
            config.chain_move_overlap_rate_threshold,
        );
        Self {
            config,
            moves: Vec::new(),
            chain,
            user_defined: None,
        }
    }

    pub fn config(&self) -> &NeighborhoodConfig {
        &self.config
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn chain_mut(&mut self) -> &mut ChainMoveGenerator {
        &mut self.chain
    }

    pub fn register_user_defined(&mut self, generator: UserDefinedGenerator) {
        self.user_defined = Some(generator);
        self.config.is_enabled_user_defined_move = true;
    }

    fn enabled_generators(&self, model: &Model) -> Vec<GeneratorKind> {
        let c = &self.config;
        let mut kinds = Vec::new();
        if c.is_enabled_binary_move {
            kinds.push(GeneratorKind::Binary);
        }
        if c.is_enabled_integer_move {
            kinds.push(GeneratorKind::Integer);
        }
        if c.is_enabled_selection_move && !model.selections().is_empty() {
            kinds.push(GeneratorKind::Selection);
        }
        if c.is_enabled_exclusive_move {
            kinds.push(GeneratorKind::Exclusive);
        }
        if c.is_enabled_aggregation_move {
            kinds.push(GeneratorKind::Aggregation);
        }
        if c.is_enabled_precedence_move {
            kinds.push(GeneratorKind::Precedence);
        }
        if c.is_enabled_variable_bound_move {
            kinds.push(GeneratorKind::VariableBound);
        }
        if c.is_enabled_soft_selection_move {
            kinds.push(GeneratorKind::SoftSelection);
        }
        if c.is_enabled_two_flip_move && !model.flippable_pairs().is_empty() {
            kinds.push(GeneratorKind::TwoFlip);
        }
        if c.is_enabled_chain_move {
            kinds.push(GeneratorKind::Chain);
        }
        if c.is_enabled_user_defined_move && self.user_defined.is_some() {
            kinds.push(GeneratorKind::UserDefined);
        }
        kinds
    }

    fn generate(
        &self,
        kind: GeneratorKind,
        model: &Model,
        policy: &AcceptancePolicy,
    ) -> Vec<Move> {
        match kind {
            GeneratorKind::Binary => basic::binary_moves(model, policy),
            GeneratorKind::Integer => basic::integer_moves(model, policy),
            GeneratorKind::Selection => basic::selection_moves(model, policy),
            GeneratorKind::Exclusive => structural::exclusive_moves(model, policy),
            GeneratorKind::Aggregation => structural::aggregation_moves(model, policy),
            GeneratorKind::Precedence => structural::precedence_moves(model, policy),
            GeneratorKind::VariableBound => structural::variable_bound_moves(model, policy),
            GeneratorKind::SoftSelection => structural::soft_selection_moves(model, policy),
            GeneratorKind::TwoFlip => special::two_flip_moves(model, policy),
            GeneratorKind::Chain => self.chain.emit(model, policy),
            GeneratorKind::UserDefined => match &self.user_defined {
                Some(generator) => special::user_defined_moves(generator, model, policy),
                None => Vec::new(),
            },
        }
    }

    /// Rebuild the candidate list under `policy`. With `parallel`, the
    /// per-generator fan-out runs on the rayon pool; results are joined in
    /// generator order.
    pub fn update_moves(&mut self, model: &Model, policy: AcceptancePolicy, parallel: bool) {
        let kinds = self.enabled_generators(model);
        let parts: Vec<Vec<Move>> = if parallel {
            kinds
                .par_iter()
                .map(|&kind| self.generate(kind, model, &policy))
                .collect()
        } else {
            kinds
                .iter()
                .map(|&kind| self.generate(kind, model, &policy))
                .collect()
        };
        self.moves.clear();
        for part in parts {
            self.moves.extend(part);
        }
    }

    /// Pseudo-randomly permute the candidate list; required for the
    /// first-improvement semantics of the tabu search.
    pub fn shuffle_moves(&mut self, rng: &mut StdRng) {
        self.moves.shuffle(rng);
    }
}
