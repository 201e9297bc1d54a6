//! # tabuip
//!
//! A metaheuristic solver for pure integer programs. Given a linear
//! objective and linear constraints over bounded integer variables, the
//! solver searches for a high-quality feasible assignment within a time or
//! iteration budget. It is a heuristic: it never proves optimality or
//! infeasibility.
//!
//! ## [`Variable`], [`Expression`], [`Constraint`], and [`Model`]
//!
//! The modeling substrate keeps every cached quantity (constraint values,
//! violations, margins, improvability flags) incrementally maintained so
//! that any candidate [`Move`] is evaluable in time proportional to the
//! number of variables it alters.
//!
//! ```rust
//! use tabuip::{Model, ConstraintSense};
//!
//! let mut model = Model::new("knapsack");
//! let x = model.binary_variable("x");
//! let y = model.binary_variable("y");
//! model.objective_mut().expression_mut().add_term(x, -3.0);
//! model.objective_mut().expression_mut().add_term(y, -5.0);
//! let cap = model
//!     .expression()
//!     .term(x, 2.0)
//!     .term(y, 4.0)
//!     .constant(-5.0)
//!     .build();
//! model.add_constraint("cap", cap, ConstraintSense::Less).unwrap();
//! model.setup();
//! ```
//!
//! ## Solving
//!
//! [`solver::solve`] runs the outer penalty controller: an optional
//! Lagrange-dual warm-up, an optional deterministic local search, then
//! repeated tabu-search rounds with adaptive penalties, tenure, and
//! restarts. MPS instances load through the [`mps`] module.
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! let mut model = tabuip::mps::load_file("instance.mps", false)?;
//! let option = tabuip::solver::SolverOption::default();
//! let result = tabuip::solver::solve(&mut model, option)?;
//! println!("objective = {}", result.solution.objective);
//! # Ok(()) }
//! ```

// Public modules
pub mod mps;
pub mod preprocess;
pub mod solver;

// Internal modules
mod atol;
mod bound;
mod constraint;
mod expression;
mod incumbent;
mod instance_json;
mod memory;
mod model;
mod moves;
mod multi_array;
mod neighborhood;
mod objective;
mod report;
mod selection;
mod sol;
mod solution;
mod util;
mod variable;

pub use atol::*;
pub use bound::*;
pub use constraint::*;
pub use expression::*;
pub use incumbent::*;
pub use instance_json::*;
pub use memory::*;
pub use model::*;
pub use moves::*;
pub use multi_array::*;
pub use neighborhood::*;
pub use objective::*;
pub use report::*;
pub use selection::*;
pub use sol::*;
pub use solution::*;
pub use util::*;
pub use variable::*;
