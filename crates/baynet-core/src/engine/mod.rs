//! The inference engine for discrete Bayesian networks.
//!
//! This module provides:
//! - **errors**: Error kinds and the aggregated validation report
//! - **variable**: Named discrete variables and the registry that owns them
//! - **graph**: Parent/child structure with cycle detection
//! - **cpt**: Conditional probability tables and their validation
//! - **evidence**: Observed states used to condition a query
//! - **factor**: Dense factors and the product/sum-out/reduce/normalize algebra
//! - **model**: The model aggregate and its finalize lifecycle
//! - **elimination**: Exact inference by variable elimination
//! - **distribution**: Posterior distributions returned to callers

pub mod cpt;
pub mod distribution;
pub mod elimination;
pub mod errors;
pub mod evidence;
pub mod factor;
pub mod graph;
pub mod model;
pub mod variable;
