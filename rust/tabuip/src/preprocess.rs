//! The preprocessing pipeline: problem-size reduction, selection
//! extraction, dependent-variable extraction, and initial-value
//! verification.
//!
//! The driver re-runs the reduction passes while any pass reports work
//! done; each pass preserves the semantics of the model (the redundant
//! set-variable pass preserves at least one optimal solution). Fixings and
//! disablings are logged through `tracing` for debugging.

mod dependent_extractor;
mod reducer;
mod selection_extractor;
mod verifier;

pub use dependent_extractor::extract_dependent_variables;
pub use reducer::*;
pub use selection_extractor::{extract_selections, SelectionExtractionMode};
pub use verifier::verify_and_correct_initial_values;

use crate::{ATol, Model};

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error(
        "Model is infeasible at preprocessing ({pass}): bound of variable {variable} \
         becomes empty ({lower} > {upper})"
    )]
    BoundContradiction {
        pass: &'static str,
        variable: String,
        lower: i64,
        upper: i64,
    },

    #[error(
        "Model is infeasible at preprocessing ({pass}): constraint {constraint} \
         cannot be satisfied"
    )]
    UnsatisfiableConstraint {
        pass: &'static str,
        constraint: String,
    },

    #[error(
        "Model is infeasible at preprocessing ({pass}): variable {variable} must take \
         the non-integral value {value} to satisfy constraint {constraint}"
    )]
    NonIntegralFixing {
        pass: &'static str,
        variable: String,
        constraint: String,
        value: f64,
    },

    #[error("Initial value of {variable} violates {reason} and correction is disabled")]
    InvalidInitialValue { variable: String, reason: String },
}

/// Preprocessing switches; mirrored from the solver option bundle.
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub is_enabled_presolve: bool,
    pub is_enabled_initial_value_correction: bool,
    pub selection_extraction_mode: SelectionExtractionMode,
    pub is_enabled_dependent_variable_extraction: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            is_enabled_presolve: true,
            is_enabled_initial_value_correction: true,
            selection_extraction_mode: SelectionExtractionMode::Larger,
            is_enabled_dependent_variable_extraction: true,
        }
    }
}

/// Counters reported back to the solver and the status file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreprocessSummary {
    pub number_of_newly_fixed_variables: usize,
    pub number_of_newly_disabled_constraints: usize,
    pub number_of_extracted_selections: usize,
    pub number_of_extracted_dependencies: usize,
}

/// Run the full pipeline. The model arrives setup() and leaves setup().
pub fn run(
    model: &mut Model,
    config: &PreprocessConfig,
    atol: ATol,
) -> Result<PreprocessSummary, PreprocessError> {
    let mut summary = PreprocessSummary::default();
    if !config.is_enabled_presolve {
        return Ok(summary);
    }

    loop {
        let mut work = 0;

        let fixed = fix_implicit_fixed_variables(model) + fix_independent_variables(model);
        work += fixed;
        summary.number_of_newly_fixed_variables += fixed;
        work += substitute_fixed_variables(model);
        model.setup();

        let (fixed, disabled) = reduce_constraints_with_bounds(model, atol)?;
        work += fixed + disabled;
        summary.number_of_newly_fixed_variables += fixed;
        summary.number_of_newly_disabled_constraints += disabled;
        model.setup();

        let disabled = remove_duplicate_constraints(model);
        work += disabled;
        summary.number_of_newly_disabled_constraints += disabled;
        model.setup();

        let fixed = fix_redundant_set_variables(model);
        work += fixed;
        summary.number_of_newly_fixed_variables += fixed;
        model.setup();

        if work == 0 {
            break;
        }
    }

    summary.number_of_extracted_selections =
        extract_selections(model, config.selection_extraction_mode);
    model.setup();

    if config.is_enabled_dependent_variable_extraction {
        summary.number_of_extracted_dependencies = extract_dependent_variables(model);
        model.setup();
    }

    tracing::info!(
        fixed = summary.number_of_newly_fixed_variables,
        disabled = summary.number_of_newly_disabled_constraints,
        selections = summary.number_of_extracted_selections,
        dependencies = summary.number_of_extracted_dependencies,
        "preprocessing finished"
    );
    Ok(summary)
}
