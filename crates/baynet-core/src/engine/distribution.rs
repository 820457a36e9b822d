//! Posterior distributions returned by inference.

use std::sync::Arc;

use crate::engine::cpt::table_size;
use crate::engine::errors::NetworkError;
use crate::engine::factor::Factor;

/// One joint assignment of the query variables and its probability.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DistributionEntry {
    /// `(variable, state)` pairs in query order.
    pub assignment: Vec<(String, String)>,
    pub probability: f64,
}

/// A normalized joint distribution over an ordered list of variables.
///
/// Entries are in mixed-radix order of the variables' states with the first
/// variable most significant, and sum to one.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "DistributionParts"))]
pub struct Distribution {
    variables: Vec<String>,
    states: Vec<Vec<Arc<str>>>,
    probabilities: Vec<f64>,
}

/// Unchecked wire form of a [`Distribution`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct DistributionParts {
    variables: Vec<String>,
    states: Vec<Vec<Arc<str>>>,
    probabilities: Vec<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<DistributionParts> for Distribution {
    type Error = NetworkError;

    fn try_from(parts: DistributionParts) -> Result<Self, Self::Error> {
        let distribution = Self {
            variables: parts.variables,
            states: parts.states,
            probabilities: parts.probabilities,
        };
        distribution.check_layout()?;
        Ok(distribution)
    }
}

impl Distribution {
    /// Wraps a normalized factor. The factor's scope order becomes the variable order.
    pub(crate) fn from_factor(factor: &Factor) -> Self {
        Self {
            variables: factor
                .scope()
                .iter()
                .map(|v| v.name().to_string())
                .collect(),
            states: factor.scope().iter().map(|v| v.states().to_vec()).collect(),
            probabilities: factor.values().to_vec(),
        }
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// State labels of one variable of the distribution.
    pub fn states(&self, variable: &str) -> Option<&[Arc<str>]> {
        let pos = self.position(variable)?;
        Some(&self.states[pos])
    }

    /// Probabilities in entry order.
    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    /// Sum of all probabilities; one up to rounding.
    pub fn total(&self) -> f64 {
        self.probabilities.iter().sum()
    }

    /// One state list per variable, none empty, and one probability per
    /// joint assignment.
    #[cfg_attr(not(feature = "serde"), allow(dead_code))]
    fn check_layout(&self) -> Result<(), NetworkError> {
        if self.states.len() != self.variables.len() {
            return Err(NetworkError::Internal(format!(
                "{} variables but {} state lists",
                self.variables.len(),
                self.states.len()
            )));
        }
        if let Some(pos) = self.states.iter().position(Vec::is_empty) {
            return Err(NetworkError::Internal(format!(
                "variable '{}' has no states",
                self.variables[pos]
            )));
        }
        let expected = table_size(self.cardinalities())
            .ok_or_else(|| NetworkError::Internal("state lists overflow usize".into()))?;
        if self.probabilities.len() != expected {
            return Err(NetworkError::Internal(format!(
                "expected {} probabilities, got {}",
                expected,
                self.probabilities.len()
            )));
        }
        Ok(())
    }

    fn position(&self, variable: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == variable)
    }

    fn cardinalities(&self) -> Vec<usize> {
        self.states.iter().map(Vec::len).collect()
    }

    fn labels_of(&self, index: usize) -> Vec<(String, String)> {
        let mut states = vec![0; self.states.len()];
        let mut rest = index;
        for (slot, labels) in states.iter_mut().zip(&self.states).rev() {
            *slot = rest % labels.len();
            rest /= labels.len();
        }
        self.variables
            .iter()
            .zip(&self.states)
            .zip(states)
            .map(|((name, labels), s)| (name.clone(), labels[s].to_string()))
            .collect()
    }

    /// All `(assignment, probability)` pairs in order.
    pub fn entries(&self) -> Vec<DistributionEntry> {
        (0..self.probabilities.len())
            .map(|i| DistributionEntry {
                assignment: self.labels_of(i),
                probability: self.probabilities[i],
            })
            .collect()
    }

    /// Probability of a full assignment given as `(variable, state)` labels.
    pub fn probability(&self, assignment: &[(&str, &str)]) -> Result<f64, NetworkError> {
        if assignment.len() != self.variables.len() {
            return Err(NetworkError::InvalidQuery(format!(
                "assignment must give a state for each of [{}]",
                self.variables.join(", ")
            )));
        }
        let mut index = 0;
        for (pos, name) in self.variables.iter().enumerate() {
            let (_, label) = assignment
                .iter()
                .find(|(n, _)| *n == name.as_str())
                .ok_or_else(|| {
                    NetworkError::InvalidQuery(format!("no state given for '{}'", name))
                })?;
            let state = self.states[pos]
                .iter()
                .position(|s| &**s == *label)
                .ok_or_else(|| NetworkError::unknown_state(name.as_str(), *label))?;
            index = index * self.states[pos].len() + state;
        }
        self.probabilities
            .get(index)
            .copied()
            .ok_or_else(|| NetworkError::Internal("distribution index out of bounds".into()))
    }

    /// Marginal distribution of one variable, in state order.
    pub fn marginal(&self, variable: &str) -> Result<Vec<(String, f64)>, NetworkError> {
        let pos = self
            .position(variable)
            .ok_or_else(|| NetworkError::VariableNotInScope {
                variable: variable.to_string(),
            })?;
        let cards = self.cardinalities();
        let inner: usize = cards.iter().skip(pos + 1).product();
        let card = cards.get(pos).copied().unwrap_or(0);
        if card == 0 || inner == 0 {
            return Err(NetworkError::Internal(format!(
                "no states recorded for '{}'",
                variable
            )));
        }
        let mut sums = vec![0.0; card];
        for (i, p) in self.probabilities.iter().enumerate() {
            sums[(i / inner) % card] += p;
        }
        Ok(self.states[pos]
            .iter()
            .map(|s| s.to_string())
            .zip(sums)
            .collect())
    }

    /// The most probable assignment; ties go to the earliest entry.
    pub fn most_probable(&self) -> Option<DistributionEntry> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &p) in self.probabilities.iter().enumerate() {
            if best.map_or(true, |(_, b)| p > b) {
                best = Some((i, p));
            }
        }
        best.map(|(i, p)| DistributionEntry {
            assignment: self.labels_of(i),
            probability: p,
        })
    }

    /// State indices of entry `index`, in variable order.
    pub fn state_indices(&self, index: usize) -> Option<Vec<usize>> {
        if index >= self.probabilities.len() {
            return None;
        }
        let cards = self.cardinalities();
        let mut states = vec![0; cards.len()];
        let mut rest = index;
        for (slot, card) in states.iter_mut().zip(cards).rev() {
            *slot = rest % card;
            rest /= card;
        }
        Some(states)
    }
}

/// Most probable joint assignment of the query variables given the evidence.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapAssignment {
    /// `(variable, state)` pairs in query order.
    pub assignment: Vec<(String, String)>,
    /// Posterior probability of the assignment.
    pub probability: f64,
}

impl MapAssignment {
    pub(crate) fn from_factor(factor: &Factor) -> Option<Self> {
        let (states, probability) = factor.argmax()?;
        Some(Self {
            assignment: factor
                .scope()
                .iter()
                .zip(states)
                .map(|(v, s)| {
                    (
                        v.name().to_string(),
                        v.state_label(s).unwrap_or_default().to_string(),
                    )
                })
                .collect(),
            probability,
        })
    }

    /// State label assigned to `variable`.
    pub fn state_of(&self, variable: &str) -> Option<&str> {
        self.assignment
            .iter()
            .find(|(v, _)| v == variable)
            .map(|(_, s)| s.as_str())
    }
}
