//! # Baynet Core
//!
//! Discrete Bayesian networks with validated conditional probability tables
//! and exact inference by variable elimination.
//!
//! ```
//! use baynet_core::{BayesianModel, Cpt, Evidence};
//!
//! let mut model = BayesianModel::new();
//! model.define_variable("Rain", &["Yes", "No"])?;
//! model.define_variable("Grass", &["Wet", "Dry"])?;
//! model.add_edge("Rain", "Grass")?;
//! model.add_cpd(Cpt::marginal("Rain", vec![0.2, 0.8])?)?;
//! model.add_cpd(Cpt::from_rows(
//!     "Grass",
//!     vec![("Rain", 2)],
//!     vec![vec![0.9, 0.1], vec![0.1, 0.9]],
//! )?)?;
//! model.finalize()?;
//!
//! let posterior = model.infer(&["Rain"], &Evidence::from([("Grass", "Wet")]))?;
//! let p = posterior.probability(&[("Rain", "Yes")])?;
//! assert!((p - 0.18 / 0.26).abs() < 1e-9);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engine;

// Re-export commonly used types
pub use engine::cpt::{Cpt, DEFAULT_TOLERANCE};
pub use engine::distribution::{Distribution, DistributionEntry, MapAssignment};
pub use engine::elimination::{
    EliminationConfig, EliminationDiagnostics, EliminationOrder, OrderingHeuristic,
    VariableElimination,
};
pub use engine::errors::{ErrorKind, NetworkError, ValidationReport};
pub use engine::evidence::Evidence;
pub use engine::factor::Factor;
pub use engine::graph::DependencyGraph;
pub use engine::model::BayesianModel;
pub use engine::variable::{Variable, VariableId, VariableRegistry};
