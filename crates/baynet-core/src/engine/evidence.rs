//! Observed variable states used to condition a query.

use std::collections::BTreeMap;

use crate::engine::errors::NetworkError;
use crate::engine::variable::{Variable, VariableRegistry};

/// A mapping from variable name to its observed state label.
///
/// Iteration is ordered by variable name so that evidence handling is
/// deterministic regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Evidence {
    observations: BTreeMap<String, String>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, variable: impl Into<String>, state: impl Into<String>) -> Self {
        self.insert(variable, state);
        self
    }

    /// Records an observation, returning the state it replaced.
    pub fn insert(
        &mut self,
        variable: impl Into<String>,
        state: impl Into<String>,
    ) -> Option<String> {
        self.observations.insert(variable.into(), state.into())
    }

    pub fn remove(&mut self, variable: &str) -> Option<String> {
        self.observations.remove(variable)
    }

    /// Observed state of `variable`, if any.
    pub fn state_of(&self, variable: &str) -> Option<&str> {
        self.observations.get(variable).map(String::as_str)
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.observations.contains_key(variable)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.observations
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Resolves every observation against the registry.
    ///
    /// Fails with `UnknownVariable` or `UnknownState` on the first bad entry.
    pub fn resolve(
        &self,
        registry: &VariableRegistry,
    ) -> Result<Vec<(Variable, usize)>, NetworkError> {
        self.iter()
            .map(|(name, label)| {
                let variable = registry.resolve(name)?;
                let state = variable.require_state(label)?;
                Ok((variable.clone(), state))
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Evidence {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut evidence = Self::new();
        for (k, v) in iter {
            evidence.insert(k, v);
        }
        evidence
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Evidence {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}
