//! Exact inference by variable elimination.
//!
//! This module answers `P(query | evidence)` on a finalized
//! [`BayesianModel`]:
//!
//! 1. Validate the query and evidence against the model.
//! 2. Instantiate one factor per relevant CPT and reduce it by the evidence.
//!    With barren pruning on, only ancestors of query and evidence variables
//!    are relevant; the CPTs of every other variable sum out to one.
//! 3. Pick an elimination order over the remaining hidden variables, either
//!    caller-supplied or by a greedy heuristic recomputed after each step.
//! 4. For each hidden variable, multiply the factors that mention it and sum
//!    it out.
//! 5. Multiply what is left and normalize.
//!
//! Any valid order yields the same distribution; the order only changes the
//! size of the intermediate factors.

use rustc_hash::FxHashSet;
use tracing::{debug, trace, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::engine::distribution::{Distribution, MapAssignment};
use crate::engine::errors::NetworkError;
use crate::engine::evidence::Evidence;
use crate::engine::factor::Factor;
use crate::engine::model::BayesianModel;
use crate::engine::variable::{Variable, VariableId};

/// Greedy cost used to pick the next variable to eliminate.
///
/// Costs are computed on the interaction graph of the current factors, where
/// two variables are adjacent when some factor mentions both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OrderingHeuristic {
    /// Fewest new edges added between the variable's neighbors.
    #[default]
    MinFill,
    /// Fewest neighbors.
    MinNeighbors,
    /// Smallest product of neighbor cardinalities.
    MinWeight,
    /// Smallest sum of cardinality products over the added edges.
    WeightedMinFill,
}

/// How the elimination order is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EliminationOrder {
    /// Greedy order under a heuristic.
    Heuristic(OrderingHeuristic),
    /// Caller-supplied order by variable name.
    ///
    /// Must contain every hidden variable of the query. Names of pruned
    /// variables are accepted and skipped.
    Explicit(Vec<String>),
}

impl Default for EliminationOrder {
    fn default() -> Self {
        Self::Heuristic(OrderingHeuristic::default())
    }
}

/// Configuration for variable elimination.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EliminationConfig {
    /// Ordering strategy.
    pub order: EliminationOrder,
    /// Above this many hidden variables the greedy heuristic is scored once on
    /// the initial interaction graph instead of after every elimination.
    pub max_greedy_variables: usize,
    /// Drop CPTs of variables that are not ancestors of a query or evidence variable.
    pub prune_barren: bool,
}

impl Default for EliminationConfig {
    fn default() -> Self {
        Self {
            order: EliminationOrder::default(),
            max_greedy_variables: 256,
            prune_barren: true,
        }
    }
}

impl EliminationConfig {
    fn validate(&self) -> Result<(), NetworkError> {
        if let EliminationOrder::Explicit(names) = &self.order {
            let mut seen = FxHashSet::default();
            for name in names {
                if !seen.insert(name.as_str()) {
                    return Err(NetworkError::InvalidConfig(format!(
                        "elimination order lists '{}' more than once",
                        name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Runtime diagnostics emitted by one inference call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EliminationDiagnostics {
    /// Variables summed out, in order.
    pub order: Vec<String>,
    /// Variables whose CPTs were dropped as irrelevant.
    pub pruned: Vec<String>,
    /// Pairwise factor products performed.
    pub products: usize,
    /// Cell count of the largest factor built.
    pub largest_factor: usize,
    /// Whether the order search hit `max_greedy_variables`.
    pub search_bounded: bool,
}

/// Query and evidence checked against the model, with reduced factors.
struct Prepared {
    query: Vec<Variable>,
    factors: Vec<Factor>,
    hidden: Vec<Variable>,
    pruned: Vec<String>,
}

/// Variable elimination over a borrowed, finalized model.
///
/// Holds no mutable state, so one engine can serve concurrent queries.
#[derive(Debug, Clone)]
pub struct VariableElimination<'m> {
    model: &'m BayesianModel,
    config: EliminationConfig,
}

impl<'m> VariableElimination<'m> {
    pub fn new(model: &'m BayesianModel) -> Self {
        Self::with_config(model, EliminationConfig::default())
    }

    pub fn with_config(model: &'m BayesianModel, config: EliminationConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &EliminationConfig {
        &self.config
    }

    /// Joint posterior of `query` given `evidence`.
    pub fn infer<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<Distribution, NetworkError> {
        self.infer_with_diagnostics(query, evidence)
            .map(|(distribution, _)| distribution)
    }

    /// [`infer`](Self::infer) plus diagnostics about the run.
    pub fn infer_with_diagnostics<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<(Distribution, EliminationDiagnostics), NetworkError> {
        let (factor, diagnostics) = self.run(query, evidence)?;
        Ok((Distribution::from_factor(&factor), diagnostics))
    }

    /// Normalized posterior factor over `query`, scope in query order.
    pub fn infer_factor<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<Factor, NetworkError> {
        self.run(query, evidence).map(|(factor, _)| factor)
    }

    /// One posterior per query variable, each computed separately.
    pub fn marginals<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<Vec<Distribution>, NetworkError> {
        if query.is_empty() {
            return Err(NetworkError::InvalidQuery("query is empty".into()));
        }
        self.model.registry().resolve_distinct(query)?;
        query
            .iter()
            .map(|name| self.infer(&[name.as_ref()], evidence))
            .collect()
    }

    /// Most probable joint assignment of `query` given `evidence`.
    pub fn map_query<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<MapAssignment, NetworkError> {
        let factor = self.infer_factor(query, evidence)?;
        MapAssignment::from_factor(&factor)
            .ok_or_else(|| NetworkError::Internal("posterior factor has no cells".into()))
    }

    /// The elimination order `infer` would use for this query.
    pub fn elimination_order<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<Vec<String>, NetworkError> {
        let prepared = self.prepare(query, evidence)?;
        let (order, _) = self.order_for(&prepared)?;
        Ok(order.iter().map(|v| v.name().to_string()).collect())
    }

    fn run<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<(Factor, EliminationDiagnostics), NetworkError> {
        let prepared = self.prepare(query, evidence)?;
        let (order, search_bounded) = self.order_for(&prepared)?;
        debug!(
            query = ?prepared.query.iter().map(Variable::name).collect::<Vec<_>>(),
            evidence = evidence.len(),
            pruned = prepared.pruned.len(),
            order = ?order.iter().map(Variable::name).collect::<Vec<_>>(),
            "variable elimination"
        );

        let mut diagnostics = EliminationDiagnostics {
            order: order.iter().map(|v| v.name().to_string()).collect(),
            pruned: prepared.pruned,
            search_bounded,
            largest_factor: prepared.factors.iter().map(Factor::len).max().unwrap_or(0),
            ..EliminationDiagnostics::default()
        };

        let mut factors = prepared.factors;
        for variable in &order {
            let (touching, rest): (Vec<Factor>, Vec<Factor>) = factors
                .into_iter()
                .partition(|f| f.contains(variable.id()));
            factors = rest;
            if touching.is_empty() {
                continue;
            }

            diagnostics.products += touching.len() - 1;
            let product = Factor::product_all(&touching)?;
            diagnostics.largest_factor = diagnostics.largest_factor.max(product.len());
            let summed = product.sum_out(variable)?;
            trace!(
                variable = variable.name(),
                consumed = touching.len(),
                size = summed.len(),
                "eliminated"
            );
            factors.push(summed);
        }

        diagnostics.products += factors.len().saturating_sub(1);
        let joint = Factor::product_all(&factors)?;
        diagnostics.largest_factor = diagnostics.largest_factor.max(joint.len());

        if let Some(stray) = joint
            .scope()
            .iter()
            .find(|v| !prepared.query.iter().any(|q| q.id() == v.id()))
        {
            return Err(NetworkError::Internal(format!(
                "variable '{}' left in the final factor",
                stray.name()
            )));
        }

        let posterior = joint.reorder(&prepared.query)?.normalize()?;
        Ok((posterior, diagnostics))
    }

    fn prepare<S: AsRef<str>>(
        &self,
        query: &[S],
        evidence: &Evidence,
    ) -> Result<Prepared, NetworkError> {
        if !self.model.is_finalized() {
            return Err(NetworkError::NotFinalized);
        }
        self.config.validate()?;
        if query.is_empty() {
            return Err(NetworkError::InvalidQuery("query is empty".into()));
        }

        let registry = self.model.registry();
        let query = registry.resolve_distinct(query)?;
        let observed = evidence.resolve(registry)?;
        if let Some(q) = query
            .iter()
            .find(|q| observed.iter().any(|(o, _)| o.id() == q.id()))
        {
            return Err(NetworkError::QueryEvidenceOverlap {
                variable: q.name().to_string(),
            });
        }

        let relevant_mask = if self.config.prune_barren {
            let targets: Vec<VariableId> = query
                .iter()
                .chain(observed.iter().map(|(v, _)| v))
                .map(Variable::id)
                .collect();
            self.model.graph().ancestral_set(&targets)
        } else {
            vec![true; registry.len()]
        };

        let mut relevant = Vec::new();
        let mut pruned = Vec::new();
        for variable in registry.iter() {
            if relevant_mask[variable.id().index()] {
                relevant.push(variable.clone());
            } else {
                pruned.push(variable.name().to_string());
            }
        }

        let factors = self.instantiate_factors(&relevant, &observed)?;

        let hidden = relevant
            .into_iter()
            .filter(|v| {
                !query.iter().any(|q| q.id() == v.id())
                    && !observed.iter().any(|(o, _)| o.id() == v.id())
            })
            .collect();

        Ok(Prepared {
            query,
            factors,
            hidden,
            pruned,
        })
    }

    /// Builds and reduces one factor per relevant CPT. Independent per CPT.
    fn instantiate_factors(
        &self,
        relevant: &[Variable],
        observed: &[(Variable, usize)],
    ) -> Result<Vec<Factor>, NetworkError> {
        #[cfg(feature = "parallel")]
        let variables = relevant.par_iter();
        #[cfg(not(feature = "parallel"))]
        let variables = relevant.iter();

        variables
            .map(|variable| {
                let cpt = self.model.cpd_by_id(variable.id()).ok_or_else(|| {
                    NetworkError::Internal(format!(
                        "finalized model has no CPD for '{}'",
                        variable.name()
                    ))
                })?;
                Factor::from_cpt(cpt, self.model.registry())?.reduce_states(observed)
            })
            .collect()
    }

    fn order_for(&self, prepared: &Prepared) -> Result<(Vec<Variable>, bool), NetworkError> {
        match &self.config.order {
            EliminationOrder::Explicit(names) => {
                self.explicit_order(names, prepared).map(|o| (o, false))
            }
            EliminationOrder::Heuristic(heuristic) => Ok(greedy_order(
                *heuristic,
                &prepared.factors,
                &prepared.hidden,
                self.model.registry().len(),
                self.config.max_greedy_variables,
            )),
        }
    }

    fn explicit_order(
        &self,
        names: &[String],
        prepared: &Prepared,
    ) -> Result<Vec<Variable>, NetworkError> {
        let registry = self.model.registry();
        let mut order = Vec::with_capacity(prepared.hidden.len());
        for name in names {
            let variable = registry.resolve(name)?;
            if prepared.hidden.iter().any(|h| h.id() == variable.id()) {
                order.push(variable.clone());
            } else if !prepared.pruned.iter().any(|p| p == name) {
                return Err(NetworkError::InvalidEliminationOrder(format!(
                    "'{}' is a query or evidence variable",
                    name
                )));
            }
        }
        let missing: Vec<&str> = prepared
            .hidden
            .iter()
            .filter(|h| !order.iter().any(|o| o.id() == h.id()))
            .map(Variable::name)
            .collect();
        if !missing.is_empty() {
            return Err(NetworkError::InvalidEliminationOrder(format!(
                "missing [{}]",
                missing.join(", ")
            )));
        }
        Ok(order)
    }
}

/// Interaction graph of a factor set, indexed by variable id.
struct InteractionGraph {
    neighbors: Vec<FxHashSet<VariableId>>,
    cards: Vec<u128>,
}

impl InteractionGraph {
    fn build(factors: &[Factor], variable_count: usize) -> Self {
        let mut neighbors = vec![FxHashSet::default(); variable_count];
        let mut cards = vec![1; variable_count];
        for factor in factors {
            for a in factor.scope() {
                cards[a.id().index()] = a.cardinality() as u128;
                for b in factor.scope() {
                    if a.id() != b.id() {
                        neighbors[a.id().index()].insert(b.id());
                    }
                }
            }
        }
        Self { neighbors, cards }
    }

    fn sorted_neighbors(&self, v: VariableId) -> Vec<VariableId> {
        let mut n: Vec<VariableId> = self.neighbors[v.index()].iter().copied().collect();
        n.sort_unstable();
        n
    }

    fn cost(&self, heuristic: OrderingHeuristic, v: VariableId) -> u128 {
        let n = self.sorted_neighbors(v);
        match heuristic {
            OrderingHeuristic::MinNeighbors => n.len() as u128,
            OrderingHeuristic::MinWeight => n
                .iter()
                .fold(1u128, |acc, u| acc.saturating_mul(self.cards[u.index()])),
            OrderingHeuristic::MinFill | OrderingHeuristic::WeightedMinFill => {
                let mut cost = 0u128;
                for (i, a) in n.iter().enumerate() {
                    for b in &n[i + 1..] {
                        if !self.neighbors[a.index()].contains(b) {
                            cost = cost.saturating_add(match heuristic {
                                OrderingHeuristic::MinFill => 1,
                                _ => self.cards[a.index()].saturating_mul(self.cards[b.index()]),
                            });
                        }
                    }
                }
                cost
            }
        }
    }

    /// Connects the neighbors of `v` pairwise and removes `v`.
    fn eliminate(&mut self, v: VariableId) {
        let n = self.sorted_neighbors(v);
        for a in &n {
            self.neighbors[a.index()].remove(&v);
            for b in &n {
                if a != b {
                    self.neighbors[a.index()].insert(*b);
                }
            }
        }
        self.neighbors[v.index()].clear();
    }
}

/// Greedy elimination order; ties go to the lower variable id.
///
/// Returns the order and whether the search bound forced a static ordering.
fn greedy_order(
    heuristic: OrderingHeuristic,
    factors: &[Factor],
    hidden: &[Variable],
    variable_count: usize,
    max_greedy_variables: usize,
) -> (Vec<Variable>, bool) {
    let mut graph = InteractionGraph::build(factors, variable_count);

    if hidden.len() > max_greedy_variables {
        warn!(
            hidden = hidden.len(),
            bound = max_greedy_variables,
            "elimination order search bounded; scoring once on the initial graph"
        );
        let mut scored: Vec<(u128, VariableId, &Variable)> = hidden
            .iter()
            .map(|v| (graph.cost(heuristic, v.id()), v.id(), v))
            .collect();
        scored.sort_by_key(|(cost, id, _)| (*cost, *id));
        return (scored.into_iter().map(|(_, _, v)| v.clone()).collect(), true);
    }

    let mut remaining: Vec<&Variable> = hidden.iter().collect();
    let mut order = Vec::with_capacity(hidden.len());
    while let Some((pos, _)) = remaining
        .iter()
        .enumerate()
        .map(|(i, v)| (i, (graph.cost(heuristic, v.id()), v.id())))
        .min_by_key(|(_, key)| *key)
    {
        let next = remaining.swap_remove(pos);
        graph.eliminate(next.id());
        order.push(next.clone());
    }
    (order, false)
}
