//! Categorical random variables and the registry that owns them.
//!
//! A [`Variable`] carries its canonical state-label ↔ index mapping. CPTs,
//! factors, and evidence resolution all go through it, so label lookup lives
//! in exactly one place.

use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::engine::errors::NetworkError;

/// Index of a variable in its registry, in definition order.
///
/// VariableId implements Ord/PartialOrd for stable, deterministic iteration.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VariableId(pub u32);

impl VariableId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id {}", self.0)
    }
}

#[derive(Debug)]
struct VariableData {
    id: VariableId,
    name: Arc<str>,
    states: Vec<Arc<str>>,
    index: FxHashMap<Arc<str>, usize>,
}

/// A discrete random variable: a unique name and an ordered list of state labels.
///
/// Immutable once defined. Cloning is cheap and yields another handle onto
/// the registry's definition; two handles are equal when they share an id.
#[derive(Clone)]
pub struct Variable {
    inner: Arc<VariableData>,
}

impl Variable {
    fn new(id: VariableId, name: &str, states: &[&str]) -> Result<Self, NetworkError> {
        if states.len() < 2 {
            return Err(NetworkError::InvalidStateList {
                name: name.to_string(),
                reason: format!("expected at least 2 states, got {}", states.len()),
            });
        }

        let mut labels = Vec::with_capacity(states.len());
        let mut index = FxHashMap::default();
        for (i, &state) in states.iter().enumerate() {
            let label: Arc<str> = Arc::from(state);
            if index.insert(label.clone(), i).is_some() {
                return Err(NetworkError::InvalidStateList {
                    name: name.to_string(),
                    reason: format!("duplicate state label '{}'", state),
                });
            }
            labels.push(label);
        }

        Ok(Self {
            inner: Arc::new(VariableData {
                id,
                name: Arc::from(name),
                states: labels,
                index,
            }),
        })
    }

    #[inline]
    pub fn id(&self) -> VariableId {
        self.inner.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// State labels in canonical order.
    pub fn states(&self) -> &[Arc<str>] {
        &self.inner.states
    }

    #[inline]
    pub fn cardinality(&self) -> usize {
        self.inner.states.len()
    }

    /// Position of `label` in the state list.
    pub fn state_index(&self, label: &str) -> Option<usize> {
        self.inner.index.get(label).copied()
    }

    /// Like [`state_index`](Self::state_index) but reports `UnknownState`.
    pub fn require_state(&self, label: &str) -> Result<usize, NetworkError> {
        self.state_index(label)
            .ok_or_else(|| NetworkError::unknown_state(self.name(), label))
    }

    pub fn state_label(&self, index: usize) -> Option<&str> {
        self.inner.states.get(index).map(|s| s.as_ref())
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id && self.inner.name == other.inner.name
    }
}

impl Eq for Variable {}

impl std::hash::Hash for Variable {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("states", &self.inner.states)
            .finish()
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Owns every variable of a network, in definition order.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    variables: Vec<Variable>,
    by_name: FxHashMap<Arc<str>, VariableId>,
}

impl VariableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new variable.
    ///
    /// Fails with `DuplicateVariable` if the name is taken and with
    /// `InvalidStateList` for fewer than two states or repeated labels.
    pub fn define(&mut self, name: &str, states: &[&str]) -> Result<Variable, NetworkError> {
        if self.by_name.contains_key(name) {
            return Err(NetworkError::DuplicateVariable {
                name: name.to_string(),
            });
        }
        let id = VariableId(self.variables.len() as u32);
        let variable = Variable::new(id, name, states)?;
        self.by_name.insert(variable.inner.name.clone(), id);
        self.variables.push(variable.clone());
        Ok(variable)
    }

    /// Looks a variable up by name, failing with `UnknownVariable`.
    pub fn resolve(&self, name: &str) -> Result<&Variable, NetworkError> {
        self.by_name
            .get(name)
            .map(|id| &self.variables[id.index()])
            .ok_or_else(|| NetworkError::unknown_variable(name))
    }

    pub fn get(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(id.index())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variables in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    /// Resolves a list of names, rejecting unknown and repeated entries.
    pub(crate) fn resolve_distinct<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<Variable>, NetworkError> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let variable = self.resolve(name.as_ref())?;
            if !seen.insert(variable.id()) {
                return Err(NetworkError::InvalidQuery(format!(
                    "variable '{}' is listed more than once",
                    variable.name()
                )));
            }
            out.push(variable.clone());
        }
        Ok(out)
    }
}
