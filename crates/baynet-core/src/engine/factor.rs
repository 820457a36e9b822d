//! # Factors
//!
//! A [`Factor`] maps every joint assignment of its scope to a non-negative
//! number. CPTs enter inference as factors, and every intermediate result of
//! variable elimination is one.
//!
//! ## Layout
//!
//! Values are stored densely in row-major order over the scope: the first
//! scope variable is the most significant digit of the mixed-radix index.
//! This matches the CPT layout, so `from_cpt` is a straight copy with the
//! target placed first.
//!
//! All table walks use an odometer over the output scope that carries one
//! running offset per input table, so no operation decodes a linear index
//! into an assignment per cell.

use rustc_hash::FxHashSet;
use smallvec::{smallvec, SmallVec};

use crate::engine::cpt::{table_size, Cpt};
use crate::engine::errors::NetworkError;
use crate::engine::evidence::Evidence;
use crate::engine::variable::{Variable, VariableId, VariableRegistry};

/// Inline capacity for scopes; most intermediate factors are small.
const INLINE_SCOPE: usize = 4;

type Scope = SmallVec<[Variable; INLINE_SCOPE]>;
type Strides = SmallVec<[usize; INLINE_SCOPE]>;

/// A non-negative function over the joint states of an ordered set of variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    scope: Scope,
    values: Vec<f64>,
}

impl Factor {
    /// Builds a factor from a scope and a row-major table.
    ///
    /// Fails with `FactorShapeMismatch` if the scope repeats a variable, the
    /// table length is not the product of the scope cardinalities, or an
    /// entry is negative or not finite.
    pub fn new(scope: Vec<Variable>, values: Vec<f64>) -> Result<Self, NetworkError> {
        let mut seen = FxHashSet::default();
        for v in &scope {
            if !seen.insert(v.id()) {
                return Err(NetworkError::FactorShapeMismatch(format!(
                    "variable '{}' appears twice in the scope",
                    v.name()
                )));
            }
        }
        let expected = table_size(scope.iter().map(Variable::cardinality)).ok_or_else(|| {
            NetworkError::FactorShapeMismatch("scope cardinalities overflow usize".into())
        })?;
        if values.len() != expected {
            return Err(NetworkError::FactorShapeMismatch(format!(
                "scope needs {} entries, got {}",
                expected,
                values.len()
            )));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(NetworkError::FactorShapeMismatch(format!(
                "entry {} is not a finite non-negative number",
                bad
            )));
        }
        Ok(Self {
            scope: scope.into_iter().collect(),
            values,
        })
    }

    /// A factor with empty scope holding a single value.
    pub fn scalar(value: f64) -> Self {
        Self {
            scope: Scope::new(),
            values: vec![value],
        }
    }

    /// Converts a CPT into a factor over `[target, evidence...]`.
    ///
    /// The CPT's recorded cardinalities must match the registered variables.
    pub fn from_cpt(cpt: &Cpt, registry: &VariableRegistry) -> Result<Self, NetworkError> {
        let target = registry.resolve(cpt.target())?;
        let mut scope = Vec::with_capacity(cpt.evidence().len() + 1);
        scope.push(target.clone());
        for name in cpt.evidence() {
            scope.push(registry.resolve(name)?.clone());
        }

        let recorded = std::iter::once(cpt.target_cardinality())
            .chain(cpt.evidence_cardinalities().iter().copied());
        for (variable, card) in scope.iter().zip(recorded) {
            if variable.cardinality() != card {
                return Err(NetworkError::CptShapeMismatch {
                    target: cpt.target().to_string(),
                    detail: format!(
                        "'{}' recorded with {} states but has {}",
                        variable.name(),
                        card,
                        variable.cardinality()
                    ),
                });
            }
        }

        Self::new(scope, cpt.values().to_vec())
    }

    pub fn scope(&self) -> &[Variable] {
        &self.scope
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of cells in the table.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, id: VariableId) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: VariableId) -> Option<usize> {
        self.scope.iter().position(|v| v.id() == id)
    }

    /// Sum of all cells.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    fn strides(&self) -> Strides {
        strides_of(&self.scope)
    }

    /// Value at an assignment given as state indices in scope order.
    pub fn value(&self, states: &[usize]) -> Option<f64> {
        if states.len() != self.scope.len() {
            return None;
        }
        let mut index = 0;
        for (v, &s) in self.scope.iter().zip(states) {
            if s >= v.cardinality() {
                return None;
            }
            index = index * v.cardinality() + s;
        }
        self.values.get(index).copied()
    }

    /// Value at an assignment given as `(variable, state)` labels, in any order.
    pub fn value_of(&self, assignment: &[(&str, &str)]) -> Result<f64, NetworkError> {
        for &(name, _) in assignment {
            if !self.scope.iter().any(|v| v.name() == name) {
                return Err(NetworkError::VariableNotInScope {
                    variable: name.to_string(),
                });
            }
        }
        let mut states = Strides::with_capacity(self.scope.len());
        for v in &self.scope {
            let (_, label) = assignment
                .iter()
                .find(|(name, _)| *name == v.name())
                .ok_or_else(|| {
                    NetworkError::FactorShapeMismatch(format!(
                        "assignment gives no state for '{}'",
                        v.name()
                    ))
                })?;
            states.push(v.require_state(label)?);
        }
        self.value(&states)
            .ok_or_else(|| NetworkError::Internal("factor index out of bounds".into()))
    }

    /// Factor product over the union of both scopes.
    ///
    /// The result scope lists this factor's variables first, then the other
    /// factor's variables not already present. Each cell is the product of
    /// the two inputs restricted to that assignment.
    ///
    /// Fails with `FactorShapeMismatch` if the union scope has more cells
    /// than fit in `usize`.
    pub fn multiply(&self, other: &Factor) -> Result<Factor, NetworkError> {
        let mut scope = self.scope.clone();
        for v in &other.scope {
            if !scope.iter().any(|s| s.id() == v.id()) {
                scope.push(v.clone());
            }
        }

        let self_strides = self.strides();
        let other_strides = other.strides();
        let mut stride_a: Strides = smallvec![0; scope.len()];
        let mut stride_b: Strides = smallvec![0; scope.len()];
        for (j, v) in scope.iter().enumerate() {
            if let Some(p) = self.position(v.id()) {
                stride_a[j] = self_strides[p];
            }
            if let Some(p) = other.position(v.id()) {
                stride_b[j] = other_strides[p];
            }
        }

        let cards: Strides = scope.iter().map(Variable::cardinality).collect();
        let size = table_size(cards.iter().copied()).ok_or_else(|| {
            NetworkError::FactorShapeMismatch(format!(
                "product over {} variables overflows usize",
                scope.len()
            ))
        })?;
        let mut values = Vec::with_capacity(size);
        let mut counter: Strides = smallvec![0; scope.len()];
        let (mut ia, mut ib) = (0usize, 0usize);

        for _ in 0..size {
            values.push(self.values[ia] * other.values[ib]);
            for j in (0..cards.len()).rev() {
                counter[j] += 1;
                ia += stride_a[j];
                ib += stride_b[j];
                if counter[j] < cards[j] {
                    break;
                }
                ia -= stride_a[j] * cards[j];
                ib -= stride_b[j] * cards[j];
                counter[j] = 0;
            }
        }

        Ok(Factor { scope, values })
    }

    /// Product of any number of factors; the scalar `1` for none.
    pub fn product_all<'a>(
        factors: impl IntoIterator<Item = &'a Factor>,
    ) -> Result<Factor, NetworkError> {
        let mut iter = factors.into_iter();
        match iter.next() {
            Some(first) => iter.try_fold(first.clone(), |acc, f| acc.multiply(f)),
            None => Ok(Factor::scalar(1.0)),
        }
    }

    /// Sums `variable` out of the scope.
    ///
    /// Fails with `VariableNotInScope` if the variable is not in the scope.
    pub fn sum_out(&self, variable: &Variable) -> Result<Factor, NetworkError> {
        let pos = self
            .position(variable.id())
            .ok_or_else(|| NetworkError::VariableNotInScope {
                variable: variable.name().to_string(),
            })?;

        let card = self.scope[pos].cardinality();
        let inner: usize = self.scope[pos + 1..]
            .iter()
            .map(Variable::cardinality)
            .product();
        let outer: usize = self.scope[..pos]
            .iter()
            .map(Variable::cardinality)
            .product();

        let mut values = vec![0.0; outer * inner];
        for o in 0..outer {
            let dst = &mut values[o * inner..(o + 1) * inner];
            for s in 0..card {
                let src = &self.values[(o * card + s) * inner..(o * card + s + 1) * inner];
                for (d, x) in dst.iter_mut().zip(src) {
                    *d += x;
                }
            }
        }

        let mut scope = self.scope.clone();
        scope.remove(pos);
        Ok(Factor { scope, values })
    }

    /// Sums out several variables in the given order.
    pub fn sum_out_all(&self, variables: &[Variable]) -> Result<Factor, NetworkError> {
        let mut current = self.clone();
        for v in variables {
            current = current.sum_out(v)?;
        }
        Ok(current)
    }

    /// Fixes every scope variable that appears in `evidence` to its observed
    /// state and drops it from the scope.
    ///
    /// Variables in the evidence but not in the scope are ignored. Fails with
    /// `UnknownState` if an observed label is not a state of its variable.
    pub fn reduce(&self, evidence: &Evidence) -> Result<Factor, NetworkError> {
        let mut fixed = Vec::new();
        for v in &self.scope {
            if let Some(label) = evidence.state_of(v.name()) {
                fixed.push((v.clone(), v.require_state(label)?));
            }
        }
        self.reduce_states(&fixed)
    }

    /// [`reduce`](Self::reduce) with already-resolved state indices.
    pub fn reduce_states(&self, observed: &[(Variable, usize)]) -> Result<Factor, NetworkError> {
        let strides = self.strides();
        let mut base = 0;
        let mut kept = Scope::new();
        let mut kept_strides = Strides::new();
        let mut any = false;

        for (k, v) in self.scope.iter().enumerate() {
            match observed.iter().find(|(o, _)| o.id() == v.id()) {
                Some((_, state)) => {
                    if *state >= v.cardinality() {
                        return Err(NetworkError::unknown_state(v.name(), state.to_string()));
                    }
                    base += strides[k] * state;
                    any = true;
                }
                None => {
                    kept.push(v.clone());
                    kept_strides.push(strides[k]);
                }
            }
        }

        if !any {
            return Ok(self.clone());
        }
        let values = gather(&self.values, &kept, &kept_strides, base);
        Ok(Factor {
            scope: kept,
            values,
        })
    }

    /// Divides every entry by the total.
    ///
    /// Fails with `DegenerateFactor` if the total is zero (or not finite).
    pub fn normalize(&self) -> Result<Factor, NetworkError> {
        let total = self.total();
        if !(total > 0.0 && total.is_finite()) {
            return Err(NetworkError::DegenerateFactor {
                scope: self.scope.iter().map(|v| v.name().to_string()).collect(),
                total,
            });
        }
        Ok(Factor {
            scope: self.scope.clone(),
            values: self.values.iter().map(|v| v / total).collect(),
        })
    }

    /// Returns the same function with its scope permuted into `order`.
    ///
    /// `order` must list exactly the variables of the scope.
    pub fn reorder(&self, order: &[Variable]) -> Result<Factor, NetworkError> {
        if order.len() != self.scope.len() {
            return Err(NetworkError::FactorShapeMismatch(format!(
                "reorder expects {} variables, got {}",
                self.scope.len(),
                order.len()
            )));
        }
        let strides = self.strides();
        let mut source_strides = Strides::with_capacity(order.len());
        let mut seen = FxHashSet::default();
        for v in order {
            let pos = self
                .position(v.id())
                .ok_or_else(|| NetworkError::VariableNotInScope {
                    variable: v.name().to_string(),
                })?;
            if !seen.insert(v.id()) {
                return Err(NetworkError::FactorShapeMismatch(format!(
                    "variable '{}' listed twice in reorder",
                    v.name()
                )));
            }
            source_strides.push(strides[pos]);
        }
        let scope: Scope = order.iter().cloned().collect();
        let values = gather(&self.values, &scope, &source_strides, 0);
        Ok(Factor { scope, values })
    }

    /// Cell-for-cell comparison within `tolerance`, independent of scope order.
    pub fn approx_eq(&self, other: &Factor, tolerance: f64) -> bool {
        let Ok(aligned) = other.reorder(&self.scope) else {
            return false;
        };
        self.values
            .iter()
            .zip(&aligned.values)
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }

    /// Most likely assignment (state indices in scope order) and its value.
    ///
    /// Ties resolve to the assignment with the lowest table index.
    pub fn argmax(&self) -> Option<(Vec<usize>, f64)> {
        let (index, &best) = self
            .values
            .iter()
            .enumerate()
            .fold(None, |acc: Option<(usize, &f64)>, (i, v)| match acc {
                Some((_, b)) if b >= v => acc,
                _ => Some((i, v)),
            })?;
        Some((decode(index, &self.scope), best))
    }
}

/// Row-major strides: the last variable varies fastest.
fn strides_of(scope: &[Variable]) -> Strides {
    let mut strides: Strides = smallvec![1; scope.len()];
    for i in (0..scope.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * scope[i + 1].cardinality();
    }
    strides
}

/// Decodes a row-major index into state indices.
fn decode(mut index: usize, scope: &[Variable]) -> Vec<usize> {
    let mut states = vec![0; scope.len()];
    for (slot, v) in states.iter_mut().zip(scope).rev() {
        *slot = index % v.cardinality();
        index /= v.cardinality();
    }
    states
}

/// Copies `source` cells into a new table laid out over `scope`, where
/// `source_strides[j]` is the step in `source` for scope variable `j`.
fn gather(source: &[f64], scope: &[Variable], source_strides: &[usize], base: usize) -> Vec<f64> {
    let cards: Strides = scope.iter().map(Variable::cardinality).collect();
    let size: usize = cards.iter().product();
    let mut out = Vec::with_capacity(size);
    let mut counter: Strides = smallvec![0; cards.len()];
    let mut index = base;

    for _ in 0..size {
        out.push(source[index]);
        for j in (0..cards.len()).rev() {
            counter[j] += 1;
            index += source_strides[j];
            if counter[j] < cards[j] {
                break;
            }
            index -= source_strides[j] * cards[j];
            counter[j] = 0;
        }
    }
    out
}
