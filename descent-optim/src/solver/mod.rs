//! The iteration loop shared by line-search methods.

mod driver;
mod state;

pub use driver::{DirectionRule, LineSearchSolver};
pub use state::IterationState;
