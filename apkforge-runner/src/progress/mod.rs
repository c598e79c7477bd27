//! Output-driven progress estimation
//!
//! The external build tool reports nothing structured. Progress is inferred by
//! matching its output lines against an ordered table of markers and scaling
//! the matched checkpoint into the slice of the overall job it is allowed to
//! report into.

mod estimator;
mod rules;

pub use estimator::{EstimatorUpdate, ProgressEstimator};
pub use rules::{ProgressRule, ProgressRules, ProgressWindow, RulesError};
