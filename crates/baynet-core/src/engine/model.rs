//! # Bayesian Model
//!
//! Aggregates the variable registry, the dependency graph, and one CPT per
//! node, and owns the build → finalize → infer lifecycle.
//!
//! ## Lifecycle
//!
//! 1. Define variables, add edges, attach CPTs (any order, single-threaded).
//! 2. Call [`BayesianModel::finalize`]. It checks every invariant and returns
//!    *all* failures at once in a [`ValidationReport`].
//! 3. Run inference. Any mutation clears the finalized flag, and inference on
//!    an unfinalized model fails with `NotFinalized`.
//!
//! A finalized model is only read during inference, so `&BayesianModel` can
//! be shared across threads running concurrent queries.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::engine::cpt::{Cpt, DEFAULT_TOLERANCE};
use crate::engine::distribution::Distribution;
use crate::engine::elimination::VariableElimination;
use crate::engine::errors::{NetworkError, ValidationReport};
use crate::engine::evidence::Evidence;
use crate::engine::graph::DependencyGraph;
use crate::engine::variable::{Variable, VariableId, VariableRegistry};

/// A discrete Bayesian network under construction or ready for inference.
#[derive(Debug, Clone)]
pub struct BayesianModel {
    registry: VariableRegistry,
    graph: DependencyGraph,
    cpds: FxHashMap<VariableId, Cpt>,
    tolerance: f64,
    finalized: bool,
}

impl Default for BayesianModel {
    fn default() -> Self {
        Self {
            registry: VariableRegistry::new(),
            graph: DependencyGraph::new(),
            cpds: FxHashMap::default(),
            tolerance: DEFAULT_TOLERANCE,
            finalized: false,
        }
    }
}

impl BayesianModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a variable and adds it as a graph node.
    pub fn define_variable(
        &mut self,
        name: &str,
        states: &[&str],
    ) -> Result<Variable, NetworkError> {
        let variable = self.registry.define(name, states)?;
        self.graph.add_node(variable.clone())?;
        self.finalized = false;
        Ok(variable)
    }

    /// Adds `parent -> child`, rejecting unknown names, duplicates, and cycles.
    pub fn add_edge(&mut self, parent: &str, child: &str) -> Result<(), NetworkError> {
        let (p, c) = self.resolve_pair(parent, child)?;
        self.graph.add_edge(p, c)?;
        self.finalized = false;
        Ok(())
    }

    /// Adds `parent -> child` without the per-edge cycle check.
    ///
    /// For loaders that insert a whole edge list at once: cycles are then
    /// reported by [`finalize`](Self::finalize) together with every other
    /// validation failure. Unknown names and duplicates still fail here.
    pub fn add_edge_unchecked(&mut self, parent: &str, child: &str) -> Result<(), NetworkError> {
        let (p, c) = self.resolve_pair(parent, child)?;
        self.graph.add_edge_unchecked(p, c)?;
        self.finalized = false;
        Ok(())
    }

    fn resolve_pair(
        &self,
        parent: &str,
        child: &str,
    ) -> Result<(VariableId, VariableId), NetworkError> {
        Ok((
            self.registry.resolve(parent)?.id(),
            self.registry.resolve(child)?.id(),
        ))
    }

    /// Attaches a CPT to its target, returning the CPT it replaced.
    ///
    /// Fails with `UnknownVariable` if the target is not registered. The
    /// table itself is checked by `finalize`.
    pub fn add_cpd(&mut self, cpt: Cpt) -> Result<Option<Cpt>, NetworkError> {
        let target = self.registry.resolve(cpt.target())?.id();
        self.finalized = false;
        Ok(self.cpds.insert(target, cpt))
    }

    /// Attaches several CPTs, stopping at the first unknown target.
    pub fn add_cpds(&mut self, cpts: impl IntoIterator<Item = Cpt>) -> Result<(), NetworkError> {
        for cpt in cpts {
            self.add_cpd(cpt)?;
        }
        Ok(())
    }

    pub fn remove_cpd(&mut self, target: &str) -> Option<Cpt> {
        let id = self.registry.resolve(target).ok()?.id();
        let removed = self.cpds.remove(&id);
        if removed.is_some() {
            self.finalized = false;
        }
        removed
    }

    /// Overrides the column-sum tolerance used by `finalize`.
    pub fn set_tolerance(&mut self, tolerance: f64) -> Result<(), NetworkError> {
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(NetworkError::InvalidConfig(format!(
                "tolerance must be finite and non-negative, got {}",
                tolerance
            )));
        }
        self.tolerance = tolerance;
        self.finalized = false;
        Ok(())
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn variable(&self, name: &str) -> Result<&Variable, NetworkError> {
        self.registry.resolve(name)
    }

    pub fn cpd(&self, name: &str) -> Option<&Cpt> {
        let id = self.registry.resolve(name).ok()?.id();
        self.cpds.get(&id)
    }

    /// CPTs in variable definition order.
    pub fn cpds(&self) -> impl Iterator<Item = &Cpt> {
        self.registry
            .iter()
            .filter_map(move |v| self.cpds.get(&v.id()))
    }

    pub(crate) fn cpd_by_id(&self, id: VariableId) -> Option<&Cpt> {
        self.cpds.get(&id)
    }

    /// Parent names of `name` in edge insertion order.
    pub fn parents_of(&self, name: &str) -> Result<Vec<&str>, NetworkError> {
        let id = self.registry.resolve(name)?.id();
        Ok(self.names(self.graph.parents_of(id)))
    }

    /// Child names of `name` in edge insertion order.
    pub fn children_of(&self, name: &str) -> Result<Vec<&str>, NetworkError> {
        let id = self.registry.resolve(name)?.id();
        Ok(self.names(self.graph.children_of(id)))
    }

    pub fn roots(&self) -> Vec<&str> {
        self.names(&self.graph.roots())
    }

    pub fn leaves(&self) -> Vec<&str> {
        self.names(&self.graph.leaves())
    }

    /// Markov blanket of `name`: parents, children, and co-parents of children.
    pub fn markov_blanket(&self, name: &str) -> Result<Vec<&str>, NetworkError> {
        let id = self.registry.resolve(name)?.id();
        Ok(self.names(&self.graph.markov_blanket(id)))
    }

    /// Variable names in a deterministic topological order.
    pub fn topological_order(&self) -> Result<Vec<&str>, NetworkError> {
        Ok(self.names(&self.graph.topological_order()?))
    }

    fn names(&self, ids: &[VariableId]) -> Vec<&str> {
        ids.iter()
            .filter_map(|id| self.registry.get(*id))
            .map(Variable::name)
            .collect()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Validates the whole model and marks it ready for inference.
    ///
    /// A cyclic graph fails with one `CycleDetected` per cycle and nothing
    /// else. Otherwise every remaining failure is collected:
    /// - every node has a CPT (`MissingCpd` per node);
    /// - each CPT's evidence set equals its node's parent set
    ///   (`EvidenceParentMismatch`) and names registered variables
    ///   (`UnknownVariable`);
    /// - recorded cardinalities match the registry and the table is a
    ///   normalized conditional distribution (CPT errors).
    ///
    /// Idempotent: calling it again on an unchanged model yields the same result.
    pub fn finalize(&mut self) -> Result<(), ValidationReport> {
        let errors = self.validation_errors();
        let result = ValidationReport::from_errors(errors);
        self.finalized = result.is_ok();
        debug!(
            variables = self.registry.len(),
            edges = self.graph.edge_count(),
            cpds = self.cpds.len(),
            finalized = self.finalized,
            "model finalize"
        );
        result
    }

    fn validation_errors(&self) -> Vec<NetworkError> {
        let cycles = self.graph.find_cycles();
        if !cycles.is_empty() {
            return cycles
                .iter()
                .map(|cycle| NetworkError::CycleDetected {
                    cycle: self.graph.names(cycle),
                })
                .collect();
        }

        let mut errors = Vec::new();
        for variable in self.registry.iter() {
            let Some(cpt) = self.cpds.get(&variable.id()) else {
                errors.push(NetworkError::MissingCpd {
                    variable: variable.name().to_string(),
                });
                continue;
            };
            self.check_cpd(variable, cpt, &mut errors);
        }

        errors
    }

    /// Appends every failure of `cpt` against the registry and graph.
    fn check_cpd(&self, variable: &Variable, cpt: &Cpt, errors: &mut Vec<NetworkError>) {
        errors.extend(cpt.validation_errors(self.tolerance));

        if cpt.target_cardinality() != variable.cardinality() {
            errors.push(NetworkError::CptShapeMismatch {
                target: cpt.target().to_string(),
                detail: format!(
                    "table has {} rows but '{}' has {} states",
                    cpt.target_cardinality(),
                    variable.name(),
                    variable.cardinality()
                ),
            });
        }

        let mut evidence_ids = FxHashSet::default();
        let mut unregistered = false;
        for (name, &card) in cpt.evidence().iter().zip(cpt.evidence_cardinalities()) {
            let evidence = match self.registry.resolve(name) {
                Ok(evidence) => evidence,
                Err(err) => {
                    errors.push(err);
                    unregistered = true;
                    continue;
                }
            };
            if evidence.cardinality() != card {
                errors.push(NetworkError::CptShapeMismatch {
                    target: cpt.target().to_string(),
                    detail: format!(
                        "evidence '{}' recorded with {} states but has {}",
                        name,
                        card,
                        evidence.cardinality()
                    ),
                });
            }
            evidence_ids.insert(evidence.id());
        }

        let parents = self.graph.parents_of(variable.id());
        let parent_ids: FxHashSet<VariableId> = parents.iter().copied().collect();
        if unregistered || parent_ids != evidence_ids {
            errors.push(NetworkError::EvidenceParentMismatch {
                target: cpt.target().to_string(),
                evidence: cpt.evidence().to_vec(),
                parents: self.graph.names(parents),
            });
        }
    }

    /// Posterior over `query` given `evidence`, with the default elimination settings.
    pub fn infer<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<Distribution, NetworkError> {
        VariableElimination::new(self).infer(query, evidence)
    }
}
