use crate::preprocess::{PreprocessConfig, SelectionExtractionMode};
use crate::{ChainMoveReduceMode, NeighborhoodConfig};
use serde::Deserialize;
use std::path::Path;

/// Implements `Deserialize` for an option enum so that the JSON file may
/// carry either the integer ordinal or the variant name, as in
/// `"verbose": 4` or `"verbose": "Full"`.
macro_rules! impl_ordinal_or_name {
    ($type:ty { $($variant:ident = $ordinal:literal),+ $(,)? }) => {
        impl<'de> Deserialize<'de> for $type {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum Raw {
                    Ordinal(i64),
                    Name(String),
                }
                match Raw::deserialize(deserializer)? {
                    Raw::Ordinal(ordinal) => match ordinal {
                        $($ordinal => Ok(<$type>::$variant),)+
                        _ => Err(serde::de::Error::custom(format!(
                            "invalid ordinal {} for {}",
                            ordinal,
                            stringify!($type)
                        ))),
                    },
                    Raw::Name(name) => match name.as_str() {
                        $(stringify!($variant) => Ok(<$type>::$variant),)+
                        _ => Err(serde::de::Error::custom(format!(
                            "invalid name {} for {}",
                            name,
                            stringify!($type)
                        ))),
                    },
                }
            }
        }
    };
}

/// Console verbosity, mapped onto `tracing` levels by the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbose {
    #[default]
    Off,
    Warning,
    Outer,
    Inner,
    Full,
}

/// Which variables must have been updated recently for a move to count as
/// tabu: all of them, or any one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TabuMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImprovabilityScreeningMode {
    Off,
    Soft,
    Aggressive,
    #[default]
    Automatic,
}

impl_ordinal_or_name!(Verbose { Off = 0, Warning = 1, Outer = 2, Inner = 3, Full = 4 });
impl_ordinal_or_name!(TabuMode { All = 0, Any = 1 });
impl_ordinal_or_name!(ImprovabilityScreeningMode {
    Off = 0,
    Soft = 1,
    Aggressive = 2,
    Automatic = 3,
});
impl_ordinal_or_name!(SelectionExtractionMode {
    Off = 0,
    Defined = 1,
    Smaller = 2,
    Larger = 3,
    Independent = 4,
});
impl_ordinal_or_name!(ChainMoveReduceMode { OverlapRate = 0, Shuffle = 1 });

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralOption {
    /// Maximum number of outer (penalty) iterations.
    pub iteration_max: usize,
    pub time_offset: f64,
    pub time_max: f64,
    /// Stop as soon as a feasible solution at least this good exists.
    /// Absent means no target.
    pub target_objective_value: Option<f64>,
    pub seed: u64,
}

impl Default for GeneralOption {
    fn default() -> Self {
        Self {
            iteration_max: 100,
            time_offset: 0.0,
            time_max: 120.0,
            target_objective_value: None,
            seed: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PenaltyOption {
    pub penalty_coefficient_relaxing_rate: f64,
    pub penalty_coefficient_tightening_rate: f64,
    /// Balance between violation magnitude and violation frequency in the
    /// tightening term. Applied to tightening only.
    pub penalty_coefficient_updating_balance: f64,
    /// Reset all penalties to the initial value after this many stagnant
    /// rounds; 0 disables.
    pub penalty_coefficient_reset_count_threshold: usize,
    pub initial_penalty_coefficient: f64,
    pub is_enabled_grouping_penalty_coefficient: bool,
}

impl Default for PenaltyOption {
    fn default() -> Self {
        Self {
            penalty_coefficient_relaxing_rate: 0.9,
            penalty_coefficient_tightening_rate: 1.0,
            penalty_coefficient_updating_balance: 0.0,
            penalty_coefficient_reset_count_threshold: 0,
            initial_penalty_coefficient: 1e7,
            is_enabled_grouping_penalty_coefficient: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ParallelOption {
    pub is_enabled_parallel_evaluation: bool,
    pub is_enabled_parallel_neighborhood_update: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreprocessOption {
    pub is_enabled_presolve: bool,
    pub is_enabled_initial_value_correction: bool,
    pub selection_mode: SelectionExtractionMode,
    pub is_enabled_dependent_variable_extraction: bool,
}

impl Default for PreprocessOption {
    fn default() -> Self {
        Self {
            is_enabled_presolve: true,
            is_enabled_initial_value_correction: true,
            selection_mode: SelectionExtractionMode::Larger,
            is_enabled_dependent_variable_extraction: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NeighborhoodOption {
    pub is_enabled_binary_move: bool,
    pub is_enabled_integer_move: bool,
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
    pub improvability_screening_mode: ImprovabilityScreeningMode,
}

impl Default for NeighborhoodOption {
    fn default() -> Self {
        let config = NeighborhoodConfig::default();
        Self {
            is_enabled_binary_move: config.is_enabled_binary_move,
            is_enabled_integer_move: config.is_enabled_integer_move,
            is_enabled_exclusive_move: config.is_enabled_exclusive_move,
            is_enabled_aggregation_move: config.is_enabled_aggregation_move,
            is_enabled_precedence_move: config.is_enabled_precedence_move,
            is_enabled_variable_bound_move: config.is_enabled_variable_bound_move,
            is_enabled_soft_selection_move: config.is_enabled_soft_selection_move,
            is_enabled_two_flip_move: config.is_enabled_two_flip_move,
            is_enabled_chain_move: config.is_enabled_chain_move,
            is_enabled_user_defined_move: config.is_enabled_user_defined_move,
            chain_move_capacity: config.chain_move_capacity,
            chain_move_queue_capacity: config.chain_move_queue_capacity,
            chain_move_overlap_rate_threshold: config.chain_move_overlap_rate_threshold,
            chain_move_reduce_mode: config.chain_move_reduce_mode,
            improvability_screening_mode: ImprovabilityScreeningMode::Automatic,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputOption {
    pub verbose: Verbose,
    pub is_enabled_store_feasible_solutions: bool,
    pub feasible_solutions_capacity: usize,
}

impl Default for OutputOption {
    fn default() -> Self {
        Self {
            verbose: Verbose::Off,
            is_enabled_store_feasible_solutions: false,
            feasible_solutions_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LagrangeDualOption {
    pub is_enabled: bool,
    pub iteration_max: usize,
    pub time_max: f64,
    pub time_offset: f64,
    pub step_size_extend_rate: f64,
    pub step_size_reduce_rate: f64,
    pub tolerance: f64,
    pub queue_size: usize,
    pub log_interval: usize,
}

impl Default for LagrangeDualOption {
    fn default() -> Self {
        Self {
            is_enabled: false,
            iteration_max: 10000,
            time_max: 120.0,
            time_offset: 0.0,
            step_size_extend_rate: 1.01,
            step_size_reduce_rate: 0.95,
            tolerance: 1e-5,
            queue_size: 20,
            log_interval: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalSearchOption {
    pub is_enabled: bool,
    pub iteration_max: usize,
    pub time_max: f64,
    pub time_offset: f64,
    pub log_interval: usize,
    pub seed: u64,
}

impl Default for LocalSearchOption {
    fn default() -> Self {
        Self {
            is_enabled: true,
            iteration_max: 10000,
            time_max: 120.0,
            time_offset: 0.0,
            log_interval: 10,
            seed: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TabuSearchOption {
    pub iteration_max: usize,
    pub time_max: f64,
    pub time_offset: f64,
    pub log_interval: usize,
    pub initial_tabu_tenure: usize,
    pub tabu_tenure_randomize_rate: f64,
    pub tabu_mode: TabuMode,
    pub move_preserve_rate: f64,
    pub frequency_penalty_coefficient: f64,
    pub pruning_rate_threshold: f64,
    pub is_enabled_shuffle: bool,
    pub is_enabled_move_curtail: bool,
    pub is_enabled_automatic_iteration_adjustment: bool,
    pub is_enabled_automatic_tabu_tenure_adjustment: bool,
    pub ignore_tabu_if_global_incumbent: bool,
    pub number_of_initial_modification: usize,
    pub initial_modification_fixed_rate: f64,
    pub initial_modification_randomize_rate: f64,
    pub is_enabled_initial_modification: bool,
    pub bias_increase_count_threshold: usize,
    pub bias_decrease_count_threshold: usize,
    pub iteration_increase_rate: f64,
    pub iteration_decrease_rate: f64,
    pub seed: u64,
}

impl Default for TabuSearchOption {
    fn default() -> Self {
        Self {
            iteration_max: 200,
            time_max: 120.0,
            time_offset: 0.0,
            log_interval: 10,
            initial_tabu_tenure: 10,
            tabu_tenure_randomize_rate: 0.5,
            tabu_mode: TabuMode::All,
            move_preserve_rate: 1.0,
            frequency_penalty_coefficient: 1e-5,
            pruning_rate_threshold: 0.3,
            is_enabled_shuffle: true,
            is_enabled_move_curtail: false,
            is_enabled_automatic_iteration_adjustment: true,
            is_enabled_automatic_tabu_tenure_adjustment: true,
            ignore_tabu_if_global_incumbent: true,
            number_of_initial_modification: 0,
            initial_modification_fixed_rate: 0.1,
            initial_modification_randomize_rate: 0.5,
            is_enabled_initial_modification: true,
            bias_increase_count_threshold: 100,
            bias_decrease_count_threshold: 10,
            iteration_increase_rate: 1.5,
            iteration_decrease_rate: 0.9,
            seed: 1,
        }
    }
}

/// The full option bundle, read from a JSON file with nested sub-objects.
/// Unknown keys are ignored; missing keys keep their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SolverOption {
    pub general: GeneralOption,
    pub penalty: PenaltyOption,
    pub parallel: ParallelOption,
    pub preprocess: PreprocessOption,
    pub neighborhood: NeighborhoodOption,
    pub output: OutputOption,
    pub lagrange_dual: LagrangeDualOption,
    pub local_search: LocalSearchOption,
    pub tabu_search: TabuSearchOption,
}

impl SolverOption {
    pub fn load_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let option: SolverOption = serde_json::from_str(&content)?;
        option.validate()?;
        Ok(option)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let ranges: [(&str, f64); 4] = [
            (
                "tabu_search.move_preserve_rate",
                self.tabu_search.move_preserve_rate,
            ),
            (
                "tabu_search.initial_modification_randomize_rate",
                self.tabu_search.initial_modification_randomize_rate,
            ),
            (
                "tabu_search.initial_modification_fixed_rate",
                self.tabu_search.initial_modification_fixed_rate,
            ),
            (
                "tabu_search.pruning_rate_threshold",
                self.tabu_search.pruning_rate_threshold,
            ),
        ];
        for (name, value) in ranges {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("Option {name} must lie in [0, 1]: {value}");
            }
        }
        if self.penalty.initial_penalty_coefficient <= 0.0 {
            anyhow::bail!(
                "Option penalty.initial_penalty_coefficient must be positive: {}",
                self.penalty.initial_penalty_coefficient
            );
        }
        Ok(())
    }

    pub fn neighborhood_config(&self) -> NeighborhoodConfig {
        let n = &self.neighborhood;
        NeighborhoodConfig {
            is_enabled_binary_move: n.is_enabled_binary_move,
            is_enabled_integer_move: n.is_enabled_integer_move,
            is_enabled_selection_move: true,
            is_enabled_exclusive_move: n.is_enabled_exclusive_move,
            is_enabled_aggregation_move: n.is_enabled_aggregation_move,
            is_enabled_precedence_move: n.is_enabled_precedence_move,
            is_enabled_variable_bound_move: n.is_enabled_variable_bound_move,
            is_enabled_soft_selection_move: n.is_enabled_soft_selection_move,
            is_enabled_two_flip_move: n.is_enabled_two_flip_move,
            is_enabled_chain_move: n.is_enabled_chain_move,
            is_enabled_user_defined_move: n.is_enabled_user_defined_move,
            chain_move_capacity: n.chain_move_capacity,
            chain_move_queue_capacity: n.chain_move_queue_capacity,
            chain_move_overlap_rate_threshold: n.chain_move_overlap_rate_threshold,
            chain_move_reduce_mode: n.chain_move_reduce_mode,
        }
    }

    pub fn preprocess_config(&self) -> PreprocessConfig {
        let p = &self.preprocess;
        PreprocessConfig {
            is_enabled_presolve: p.is_enabled_presolve,
            is_enabled_initial_value_correction: p.is_enabled_initial_value_correction,
            selection_extraction_mode: p.selection_mode,
            is_enabled_dependent_variable_extraction: p.is_enabled_dependent_variable_extraction,
        }
    }
}
