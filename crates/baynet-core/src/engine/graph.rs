//! # Dependency Graph
//!
//! Directed acyclic graph over the variables of a network. An edge
//! `parent -> child` means the child's CPT is conditioned on the parent.
//!
//! ## Design
//!
//! - Nodes are indexed by [`VariableId`], so adjacency is a pair of dense
//!   vectors rather than a hash map.
//! - Parent and child lists keep insertion order, which makes every query
//!   (and every downstream elimination order) deterministic.
//! - [`DependencyGraph::add_edge`] rejects a cycle before inserting by checking
//!   depth-first reachability from child to parent. O(V + E) per insertion is
//!   fine for the network sizes this engine targets.
//! - Whole-graph validation uses Tarjan's SCC (petgraph) so that edges inserted
//!   without the per-edge check can still be reported, one cycle per component.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::engine::errors::NetworkError;
use crate::engine::variable::{Variable, VariableId};

/// Inline capacity for per-node adjacency lists; most CPTs have few parents.
const INLINE_ADJACENCY: usize = 4;

type Adjacency = SmallVec<[VariableId; INLINE_ADJACENCY]>;

/// Directed acyclic graph of parent→child dependencies.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<Variable>,
    parents: Vec<Adjacency>,
    children: Vec<Adjacency>,
    edges: Vec<(VariableId, VariableId)>,
    edge_set: FxHashSet<(VariableId, VariableId)>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node. Nodes must be added in registry order.
    pub fn add_node(&mut self, variable: Variable) -> Result<(), NetworkError> {
        if variable.id().index() != self.nodes.len() {
            return Err(NetworkError::Internal(format!(
                "graph node '{}' added out of registry order (id {:?}, expected {})",
                variable.name(),
                variable.id(),
                self.nodes.len()
            )));
        }
        self.nodes.push(variable);
        self.parents.push(Adjacency::new());
        self.children.push(Adjacency::new());
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: VariableId) -> Option<&Variable> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> &[Variable] {
        &self.nodes
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[(VariableId, VariableId)] {
        &self.edges
    }

    pub fn contains_edge(&self, parent: VariableId, child: VariableId) -> bool {
        self.edge_set.contains(&(parent, child))
    }

    /// Inserts `parent -> child`.
    ///
    /// Fails with `UnknownVariable` if either endpoint is not a node,
    /// `DuplicateEdge` if the edge exists, and `CycleDetected` if the child
    /// can already reach the parent (self edges included).
    pub fn add_edge(&mut self, parent: VariableId, child: VariableId) -> Result<(), NetworkError> {
        self.check_endpoints(parent, child)?;
        if parent == child {
            return Err(NetworkError::CycleDetected {
                cycle: self.names(&[parent, parent]),
            });
        }
        if let Some(path) = self.find_path(child, parent, |_| true) {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(parent);
            cycle.extend(path);
            return Err(NetworkError::CycleDetected {
                cycle: self.names(&cycle),
            });
        }
        self.insert_edge(parent, child);
        Ok(())
    }

    /// Inserts `parent -> child` without the reachability check.
    ///
    /// Acyclicity must then be established with [`find_cycles`](Self::find_cycles).
    pub fn add_edge_unchecked(
        &mut self,
        parent: VariableId,
        child: VariableId,
    ) -> Result<(), NetworkError> {
        self.check_endpoints(parent, child)?;
        self.insert_edge(parent, child);
        Ok(())
    }

    fn check_endpoints(&self, parent: VariableId, child: VariableId) -> Result<(), NetworkError> {
        for id in [parent, child] {
            if self.node(id).is_none() {
                return Err(NetworkError::unknown_variable(id.to_string()));
            }
        }
        if self.contains_edge(parent, child) {
            return Err(NetworkError::DuplicateEdge {
                parent: self.nodes[parent.index()].name().to_string(),
                child: self.nodes[child.index()].name().to_string(),
            });
        }
        Ok(())
    }

    fn insert_edge(&mut self, parent: VariableId, child: VariableId) {
        self.parents[child.index()].push(parent);
        self.children[parent.index()].push(child);
        self.edges.push((parent, child));
        self.edge_set.insert((parent, child));
    }

    /// Parents of `id` in insertion order.
    pub fn parents_of(&self, id: VariableId) -> &[VariableId] {
        self.parents.get(id.index()).map_or(&[], |p| p.as_slice())
    }

    /// Children of `id` in insertion order.
    pub fn children_of(&self, id: VariableId) -> &[VariableId] {
        self.children.get(id.index()).map_or(&[], |c| c.as_slice())
    }

    /// Nodes without parents, in definition order.
    pub fn roots(&self) -> Vec<VariableId> {
        (0..self.nodes.len())
            .filter(|&i| self.parents[i].is_empty())
            .map(|i| VariableId(i as u32))
            .collect()
    }

    /// Nodes without children, in definition order.
    pub fn leaves(&self) -> Vec<VariableId> {
        (0..self.nodes.len())
            .filter(|&i| self.children[i].is_empty())
            .map(|i| VariableId(i as u32))
            .collect()
    }

    /// Depth-first reachability: can `to` be reached from `from`?
    pub fn has_path(&self, from: VariableId, to: VariableId) -> bool {
        self.find_path(from, to, |_| true).is_some()
    }

    /// Finds a directed path `from ..= to` through nodes accepted by `allow`.
    fn find_path(
        &self,
        from: VariableId,
        to: VariableId,
        allow: impl Fn(VariableId) -> bool,
    ) -> Option<Vec<VariableId>> {
        let mut visited = vec![false; self.nodes.len()];
        let mut predecessor: Vec<Option<VariableId>> = vec![None; self.nodes.len()];
        let mut stack = vec![from];
        visited[from.index()] = true;

        while let Some(node) = stack.pop() {
            if node == to {
                let mut path = vec![to];
                let mut cursor = to;
                while let Some(prev) = predecessor[cursor.index()] {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            for &next in self.children_of(node).iter().rev() {
                if !visited[next.index()] && allow(next) {
                    visited[next.index()] = true;
                    predecessor[next.index()] = Some(node);
                    stack.push(next);
                }
            }
        }
        None
    }

    /// Every directed cycle in the graph, one per strongly connected component.
    ///
    /// Each cycle starts and ends at its lowest-id member. Empty for a DAG.
    pub fn find_cycles(&self) -> Vec<Vec<VariableId>> {
        let mut graph: DiGraph<VariableId, ()> =
            DiGraph::with_capacity(self.nodes.len(), self.edges.len());
        for node in &self.nodes {
            graph.add_node(node.id());
        }
        for &(parent, child) in &self.edges {
            graph.add_edge(
                NodeIndex::new(parent.index()),
                NodeIndex::new(child.index()),
                (),
            );
        }

        let mut cycles = Vec::new();
        for component in tarjan_scc(&graph) {
            let members: FxHashSet<VariableId> = component.iter().map(|ix| graph[*ix]).collect();
            let Some(&start) = members.iter().min() else {
                continue;
            };
            if members.len() == 1 {
                if self.contains_edge(start, start) {
                    cycles.push(vec![start, start]);
                }
                continue;
            }
            let path = self.children_of(start).iter().find_map(|&next| {
                if members.contains(&next) {
                    self.find_path(next, start, |v| members.contains(&v))
                } else {
                    None
                }
            });
            if let Some(path) = path {
                let mut cycle = Vec::with_capacity(path.len() + 1);
                cycle.push(start);
                cycle.extend(path);
                cycles.push(cycle);
            }
        }
        cycles.sort();
        cycles
    }

    /// Topological order with ties broken by definition order.
    ///
    /// Fails with `CycleDetected` naming the first cycle if the graph is not a DAG.
    pub fn topological_order(&self) -> Result<Vec<VariableId>, NetworkError> {
        let mut in_degree: Vec<usize> = self.parents.iter().map(|p| p.len()).collect();
        let mut ready: BinaryHeap<Reverse<VariableId>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| Reverse(VariableId(i as u32)))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);
            for &child in self.children_of(node) {
                in_degree[child.index()] -= 1;
                if in_degree[child.index()] == 0 {
                    ready.push(Reverse(child));
                }
            }
        }

        if order.len() == self.nodes.len() {
            return Ok(order);
        }
        let cycle = self.find_cycles().into_iter().next().unwrap_or_default();
        Err(NetworkError::CycleDetected {
            cycle: self.names(&cycle),
        })
    }

    /// Marks every node that is one of `targets` or an ancestor of one.
    pub fn ancestral_set(&self, targets: &[VariableId]) -> Vec<bool> {
        let mut marked = vec![false; self.nodes.len()];
        let mut stack: Vec<VariableId> = Vec::with_capacity(targets.len());
        for &t in targets {
            if t.index() < marked.len() && !marked[t.index()] {
                marked[t.index()] = true;
                stack.push(t);
            }
        }
        while let Some(node) = stack.pop() {
            for &parent in self.parents_of(node) {
                if !marked[parent.index()] {
                    marked[parent.index()] = true;
                    stack.push(parent);
                }
            }
        }
        marked
    }

    /// Parents, children, and the children's other parents of `id`, sorted by id.
    pub fn markov_blanket(&self, id: VariableId) -> Vec<VariableId> {
        let mut blanket: Vec<VariableId> = self.parents_of(id).to_vec();
        for &child in self.children_of(id) {
            blanket.push(child);
            blanket.extend(self.parents_of(child).iter().copied().filter(|&p| p != id));
        }
        blanket.sort_unstable();
        blanket.dedup();
        blanket
    }

    pub(crate) fn names(&self, ids: &[VariableId]) -> Vec<String> {
        ids.iter()
            .map(|id| {
                self.node(*id)
                    .map_or_else(|| id.to_string(), |v| v.name().to_string())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::errors::ErrorKind;
    use crate::engine::variable::VariableRegistry;

    fn graph_with(names: &[&str]) -> DependencyGraph {
        let mut registry = VariableRegistry::new();
        let mut graph = DependencyGraph::new();
        for name in names {
            let v = registry.define(name, &["T", "F"]).expect("define");
            graph.add_node(v).expect("node");
        }
        graph
    }

    fn id(i: u32) -> VariableId {
        VariableId(i)
    }

    #[test]
    fn adjacency_keeps_insertion_order() {
        let mut graph = graph_with(&["A", "B", "C", "D"]);
        graph.add_edge(id(2), id(3)).unwrap();
        graph.add_edge(id(0), id(3)).unwrap();
        graph.add_edge(id(1), id(3)).unwrap();
        assert_eq!(graph.parents_of(id(3)), &[id(2), id(0), id(1)]);
        assert_eq!(graph.children_of(id(0)), &[id(3)]);
        assert_eq!(graph.roots(), vec![id(0), id(1), id(2)]);
        assert_eq!(graph.leaves(), vec![id(3)]);
    }

    #[test]
    fn unregistered_endpoint_named_by_id() {
        let mut graph = graph_with(&["A"]);
        let err = graph.add_edge(id(0), id(7)).unwrap_err();
        assert_eq!(
            err,
            NetworkError::UnknownVariable {
                name: "id 7".into()
            }
        );
        assert_eq!(err.to_string(), "unknown variable 'id 7'");
    }

    #[test]
    fn cycle_rejected_before_insertion() {
        let mut graph = graph_with(&["A", "B", "C"]);
        graph.add_edge(id(0), id(1)).unwrap();
        graph.add_edge(id(1), id(2)).unwrap();
        let err = graph.add_edge(id(2), id(0)).unwrap_err();
        assert_eq!(
            err,
            NetworkError::CycleDetected {
                cycle: vec!["C".into(), "A".into(), "B".into(), "C".into()],
            }
        );
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.find_cycles().is_empty());
    }

    #[test]
    fn self_and_duplicate_edges_rejected() {
        let mut graph = graph_with(&["A", "B"]);
        assert_eq!(
            graph.add_edge(id(0), id(0)).unwrap_err().kind(),
            ErrorKind::CycleDetected
        );
        graph.add_edge(id(0), id(1)).unwrap();
        assert_eq!(
            graph.add_edge(id(0), id(1)).unwrap_err().kind(),
            ErrorKind::DuplicateEdge
        );
    }

    #[test]
    fn unchecked_edges_surface_in_find_cycles() {
        let mut graph = graph_with(&["A", "B", "C", "D"]);
        graph.add_edge_unchecked(id(0), id(1)).unwrap();
        graph.add_edge_unchecked(id(1), id(0)).unwrap();
        graph.add_edge_unchecked(id(3), id(3)).unwrap();
        graph.add_edge_unchecked(id(1), id(2)).unwrap();

        let cycles = graph.find_cycles();
        assert_eq!(cycles, vec![vec![id(0), id(1), id(0)], vec![id(3), id(3)]]);
        assert_eq!(
            graph.topological_order().unwrap_err().kind(),
            ErrorKind::CycleDetected
        );
    }

    #[test]
    fn topological_order_is_deterministic() {
        let mut graph = graph_with(&["A", "B", "C", "D"]);
        graph.add_edge(id(3), id(0)).unwrap();
        graph.add_edge(id(1), id(2)).unwrap();
        assert_eq!(
            graph.topological_order().unwrap(),
            vec![id(1), id(2), id(3), id(0)]
        );
    }

    #[test]
    fn ancestors_and_blanket() {
        // A -> C <- B, C -> D, E -> D
        let mut graph = graph_with(&["A", "B", "C", "D", "E"]);
        graph.add_edge(id(0), id(2)).unwrap();
        graph.add_edge(id(1), id(2)).unwrap();
        graph.add_edge(id(2), id(3)).unwrap();
        graph.add_edge(id(4), id(3)).unwrap();

        let marked = graph.ancestral_set(&[id(2)]);
        assert_eq!(marked, vec![true, true, true, false, false]);
        assert_eq!(graph.markov_blanket(id(2)), vec![id(0), id(1), id(3), id(4)]);
        assert!(graph.has_path(id(0), id(3)));
        assert!(!graph.has_path(id(3), id(0)));
    }
}
