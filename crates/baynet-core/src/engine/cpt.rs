//! Conditional probability tables.
//!
//! A [`Cpt`] stores `P(target | evidence)` as a dense row-major table:
//! one row per target state, one column per joint evidence assignment.
//! Column indices are mixed-radix encodings of the evidence states with the
//! first evidence variable most significant:
//!
//! ```text
//! evidence = [PaymentHistory (3), Age (3)]
//! column(PaymentHistory = i, Age = j) = i * 3 + j
//! ```

use rustc_hash::FxHashSet;

use crate::engine::errors::NetworkError;
use crate::engine::variable::VariableRegistry;

/// Default tolerance when checking that CPT columns sum to one.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Number of cells in a table with the given axis cardinalities, or `None`
/// if it does not fit in `usize`.
pub(crate) fn table_size<I: IntoIterator<Item = usize>>(cards: I) -> Option<usize> {
    cards
        .into_iter()
        .try_fold(1usize, |acc, card| acc.checked_mul(card))
}

/// A conditional probability table for one target variable.
///
/// Variables are referenced by name and recorded with the cardinality the
/// table was built for; the model checks those against the registry when it
/// is finalized.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cpt {
    target: String,
    target_card: usize,
    evidence: Vec<String>,
    evidence_cards: Vec<usize>,
    values: Vec<f64>,
}

impl Cpt {
    /// Builds a CPT from a flat row-major table.
    ///
    /// The table length is checked here; everything else is checked by
    /// [`validate`](Self::validate).
    pub fn new<S: Into<String>>(
        target: impl Into<String>,
        target_card: usize,
        evidence: Vec<(S, usize)>,
        values: Vec<f64>,
    ) -> Result<Self, NetworkError> {
        let (evidence, evidence_cards): (Vec<String>, Vec<usize>) =
            evidence.into_iter().map(|(n, c)| (n.into(), c)).unzip();
        let cpt = Self {
            target: target.into(),
            target_card,
            evidence,
            evidence_cards,
            values,
        };
        cpt.check_shape()?;
        Ok(cpt)
    }

    /// Builds a CPT with no evidence (a marginal distribution).
    pub fn marginal(
        target: impl Into<String>,
        probabilities: Vec<f64>,
    ) -> Result<Self, NetworkError> {
        let card = probabilities.len();
        Self::new(target, card, Vec::<(String, usize)>::new(), probabilities)
    }

    /// Builds a CPT from rows, one per target state.
    ///
    /// Each row has one entry per evidence combination:
    ///
    /// ```rust
    /// use baynet_core::Cpt;
    ///
    /// let cpt = Cpt::from_rows(
    ///     "PaymentHistory",
    ///     vec![("DebtIncomeRatio", 2)],
    ///     vec![vec![0.6, 0.1], vec![0.3, 0.3], vec![0.1, 0.6]],
    /// )
    /// .unwrap();
    /// assert_eq!(cpt.value(2, &[1]), Some(0.6));
    /// ```
    pub fn from_rows<S: Into<String>>(
        target: impl Into<String>,
        evidence: Vec<(S, usize)>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, NetworkError> {
        let target = target.into();
        let width = rows.first().map_or(0, |r| r.len());
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(NetworkError::CptShapeMismatch {
                target,
                detail: format!(
                    "row {} has {} entries, row 0 has {}",
                    i,
                    row.len(),
                    width
                ),
            });
        }
        let target_card = rows.len();
        let values = rows.into_iter().flatten().collect();
        Self::new(target, target_card, evidence, values)
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn target_cardinality(&self) -> usize {
        self.target_card
    }

    /// Evidence variable names in indexing order.
    pub fn evidence(&self) -> &[String] {
        &self.evidence
    }

    pub fn evidence_cardinalities(&self) -> &[usize] {
        &self.evidence_cards
    }

    /// The row-major table.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of columns: the product of the evidence cardinalities.
    ///
    /// Saturates at `usize::MAX`; such a table never passes the shape check.
    pub fn column_count(&self) -> usize {
        table_size(self.evidence_cards.iter().copied()).unwrap_or(usize::MAX)
    }

    fn check_shape(&self) -> Result<(), NetworkError> {
        let expected = table_size(
            std::iter::once(self.target_card).chain(self.evidence_cards.iter().copied()),
        )
        .ok_or_else(|| NetworkError::CptShapeMismatch {
            target: self.target.clone(),
            detail: format!(
                "{} x {:?} entries overflow usize",
                self.target_card, self.evidence_cards
            ),
        })?;
        if self.values.len() != expected {
            return Err(NetworkError::CptShapeMismatch {
                target: self.target.clone(),
                detail: format!(
                    "expected {} x {} = {} entries, got {}",
                    self.target_card,
                    self.column_count(),
                    expected,
                    self.values.len()
                ),
            });
        }
        Ok(())
    }

    /// Structural and numeric validation with [`DEFAULT_TOLERANCE`].
    pub fn validate(&self) -> Result<(), NetworkError> {
        self.validate_with_tolerance(DEFAULT_TOLERANCE)
    }

    /// Checks table shape, that every entry lies in `[0, 1]`, and that every
    /// column sums to one within `tolerance`. Returns the first failure; see
    /// [`validation_errors`](Self::validation_errors) for all of them.
    pub fn validate_with_tolerance(&self, tolerance: f64) -> Result<(), NetworkError> {
        match self.validation_errors(tolerance).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Every validation failure of this table, in a stable order.
    ///
    /// Shape failures come first and suppress the entry checks, which need a
    /// well-formed table. Otherwise each out-of-range entry is reported, then
    /// each remaining column that does not sum to one within `tolerance`.
    pub fn validation_errors(&self, tolerance: f64) -> Vec<NetworkError> {
        let mut errors = Vec::new();
        if self.target_card < 2 {
            errors.push(NetworkError::CptShapeMismatch {
                target: self.target.clone(),
                detail: format!("target cardinality {} is below 2", self.target_card),
            });
        }
        for (name, &card) in self.evidence.iter().zip(&self.evidence_cards) {
            if card < 2 {
                errors.push(NetworkError::CptShapeMismatch {
                    target: self.target.clone(),
                    detail: format!("evidence '{}' has cardinality {}", name, card),
                });
            }
        }
        let mut seen = FxHashSet::default();
        for name in &self.evidence {
            if name == &self.target || !seen.insert(name.as_str()) {
                errors.push(NetworkError::CptShapeMismatch {
                    target: self.target.clone(),
                    detail: format!("evidence variable '{}' is repeated", name),
                });
            }
        }
        if let Err(err) = self.check_shape() {
            errors.push(err);
        }
        if !errors.is_empty() {
            return errors;
        }

        let columns = self.column_count();
        let mut bad_columns = FxHashSet::default();
        for (i, &value) in self.values.iter().enumerate() {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                bad_columns.insert(i % columns);
                errors.push(NetworkError::CptOutOfRange {
                    target: self.target.clone(),
                    row: i / columns,
                    column: i % columns,
                    value,
                });
            }
        }
        for column in (0..columns).filter(|c| !bad_columns.contains(c)) {
            let sum: f64 = self.column(column).sum();
            if (sum - 1.0).abs() > tolerance {
                errors.push(NetworkError::CptNotNormalized {
                    target: self.target.clone(),
                    column,
                    sum,
                });
            }
        }
        errors
    }

    /// Entries of one column, top to bottom.
    pub fn column(&self, column: usize) -> impl Iterator<Item = f64> + '_ {
        let columns = self.column_count();
        self.values
            .iter()
            .skip(column)
            .step_by(columns.max(1))
            .copied()
            .take(if column < columns { self.target_card } else { 0 })
    }

    /// Mixed-radix column index of an evidence assignment, first variable most significant.
    pub fn column_index(&self, evidence_states: &[usize]) -> Option<usize> {
        if evidence_states.len() != self.evidence_cards.len() {
            return None;
        }
        let mut column: usize = 0;
        for (&state, &card) in evidence_states.iter().zip(&self.evidence_cards) {
            if state >= card {
                return None;
            }
            column = column.checked_mul(card)?.checked_add(state)?;
        }
        Some(column)
    }

    /// Looks a cell up by state indices.
    pub fn value(&self, target_state: usize, evidence_states: &[usize]) -> Option<f64> {
        if target_state >= self.target_card {
            return None;
        }
        let column = self.column_index(evidence_states)?;
        let index = target_state
            .checked_mul(self.column_count())?
            .checked_add(column)?;
        self.values.get(index).copied()
    }

    /// Looks up `P(target = target_state | evidence)` by state labels.
    ///
    /// `evidence` must assign every evidence variable exactly once, in any
    /// order. Fails with `UnknownState` for a label the variable does not
    /// have and `UnknownVariable` for a name that is not part of this CPT.
    pub fn probability(
        &self,
        registry: &VariableRegistry,
        target_state: &str,
        evidence: &[(&str, &str)],
    ) -> Result<f64, NetworkError> {
        let target_index = registry.resolve(&self.target)?.require_state(target_state)?;

        let mut states = vec![None; self.evidence.len()];
        for &(name, label) in evidence {
            let pos = self
                .evidence
                .iter()
                .position(|e| e == name)
                .ok_or_else(|| NetworkError::unknown_variable(name))?;
            states[pos] = Some(registry.resolve(name)?.require_state(label)?);
        }
        let states: Vec<usize> = states
            .into_iter()
            .zip(&self.evidence)
            .map(|(s, name)| {
                s.ok_or_else(|| NetworkError::CptShapeMismatch {
                    target: self.target.clone(),
                    detail: format!("no state given for evidence '{}'", name),
                })
            })
            .collect::<Result<_, _>>()?;

        self.value(target_index, &states)
            .ok_or_else(|| NetworkError::CptShapeMismatch {
                target: self.target.clone(),
                detail: "evidence assignment outside the table".into(),
            })
    }
}
