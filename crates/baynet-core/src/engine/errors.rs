//! Error types for network construction, validation, and inference.

use std::fmt;

use thiserror::Error;

/// Errors that can occur while building, validating, or querying a network.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
///
/// Construction errors are returned as soon as the offending call is made.
/// `finalize()` collects every validation failure into a [`ValidationReport`]
/// instead of stopping at the first one. Inference errors abort the single
/// query and never touch the model.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkError {
    /// A variable with this name is already registered.
    #[error("variable '{name}' is already defined")]
    DuplicateVariable { name: String },

    /// A variable was defined with fewer than two states or repeated labels.
    #[error("variable '{name}': invalid state list: {reason}")]
    InvalidStateList { name: String, reason: String },

    /// A name does not resolve to a registered variable.
    #[error("unknown variable '{name}'")]
    UnknownVariable { name: String },

    /// A state label is not part of the variable's state list.
    #[error("variable '{variable}' has no state '{state}'")]
    UnknownState { variable: String, state: String },

    /// An edge (or an existing set of edges) forms a directed cycle.
    ///
    /// `cycle` lists the variables on the cycle in traversal order.
    #[error("cycle detected: {}", .cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    /// The same parent→child edge was added twice.
    #[error("edge '{parent}' -> '{child}' already exists")]
    DuplicateEdge { parent: String, child: String },

    /// A CPT's table dimensions disagree with its target/evidence cardinalities.
    #[error("CPT for '{target}': shape mismatch: {detail}")]
    CptShapeMismatch { target: String, detail: String },

    /// A CPT column does not sum to one within tolerance.
    #[error("CPT for '{target}': column {column} sums to {sum} instead of 1")]
    CptNotNormalized {
        target: String,
        column: usize,
        sum: f64,
    },

    /// A CPT entry is negative, greater than one, or not finite.
    #[error("CPT for '{target}': entry ({row}, {column}) = {value} is outside [0, 1]")]
    CptOutOfRange {
        target: String,
        row: usize,
        column: usize,
        value: f64,
    },

    /// A node of the graph has no CPT attached.
    #[error("variable '{variable}' has no CPD")]
    MissingCpd { variable: String },

    /// A CPT's evidence set differs from the node's parent set.
    #[error(
        "CPT for '{target}': evidence [{}] does not match parents [{}]",
        .evidence.join(", "),
        .parents.join(", ")
    )]
    EvidenceParentMismatch {
        target: String,
        evidence: Vec<String>,
        parents: Vec<String>,
    },

    /// A factor's table does not match its scope, or its scope repeats a variable.
    #[error("factor shape mismatch: {0}")]
    FactorShapeMismatch(String),

    /// A factor operation referenced a variable outside the factor's scope.
    #[error("variable '{variable}' is not in the factor scope")]
    VariableNotInScope { variable: String },

    /// A query variable is also observed as evidence.
    #[error("variable '{variable}' appears both in the query and in the evidence")]
    QueryEvidenceOverlap { variable: String },

    /// A factor sums to zero and cannot be normalized.
    ///
    /// During inference this means the evidence has zero probability under the model.
    #[error("degenerate factor over [{}]: total mass is {total}", .scope.join(", "))]
    DegenerateFactor { scope: Vec<String>, total: f64 },

    /// Inference was requested on a model that has not been finalized.
    #[error("model must be finalized before inference")]
    NotFinalized,

    /// The query itself is malformed (empty or repeated variables).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A caller-supplied elimination order does not cover the variables to eliminate.
    #[error("invalid elimination order: {0}")]
    InvalidEliminationOrder(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal engine error (programmer error, not user error).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Discriminant of [`NetworkError`], handy for matching in reports and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DuplicateVariable,
    InvalidStateList,
    UnknownVariable,
    UnknownState,
    CycleDetected,
    DuplicateEdge,
    CptShapeMismatch,
    CptNotNormalized,
    CptOutOfRange,
    MissingCpd,
    EvidenceParentMismatch,
    FactorShapeMismatch,
    VariableNotInScope,
    QueryEvidenceOverlap,
    DegenerateFactor,
    NotFinalized,
    InvalidQuery,
    InvalidEliminationOrder,
    InvalidConfig,
    Internal,
}

impl NetworkError {
    /// Returns the kind of this error without its context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateVariable { .. } => ErrorKind::DuplicateVariable,
            Self::InvalidStateList { .. } => ErrorKind::InvalidStateList,
            Self::UnknownVariable { .. } => ErrorKind::UnknownVariable,
            Self::UnknownState { .. } => ErrorKind::UnknownState,
            Self::CycleDetected { .. } => ErrorKind::CycleDetected,
            Self::DuplicateEdge { .. } => ErrorKind::DuplicateEdge,
            Self::CptShapeMismatch { .. } => ErrorKind::CptShapeMismatch,
            Self::CptNotNormalized { .. } => ErrorKind::CptNotNormalized,
            Self::CptOutOfRange { .. } => ErrorKind::CptOutOfRange,
            Self::MissingCpd { .. } => ErrorKind::MissingCpd,
            Self::EvidenceParentMismatch { .. } => ErrorKind::EvidenceParentMismatch,
            Self::FactorShapeMismatch(_) => ErrorKind::FactorShapeMismatch,
            Self::VariableNotInScope { .. } => ErrorKind::VariableNotInScope,
            Self::QueryEvidenceOverlap { .. } => ErrorKind::QueryEvidenceOverlap,
            Self::DegenerateFactor { .. } => ErrorKind::DegenerateFactor,
            Self::NotFinalized => ErrorKind::NotFinalized,
            Self::InvalidQuery(_) => ErrorKind::InvalidQuery,
            Self::InvalidEliminationOrder(_) => ErrorKind::InvalidEliminationOrder,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn unknown_variable(name: impl Into<String>) -> Self {
        Self::UnknownVariable { name: name.into() }
    }

    pub(crate) fn unknown_state(variable: impl Into<String>, state: impl Into<String>) -> Self {
        Self::UnknownState {
            variable: variable.into(),
            state: state.into(),
        }
    }
}

/// Every validation failure found by a single `finalize()` pass.
///
/// Never empty: a successful validation returns `Ok(())` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    errors: Vec<NetworkError>,
}

impl ValidationReport {
    pub(crate) fn from_errors(errors: Vec<NetworkError>) -> Result<(), Self> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Self { errors })
        }
    }

    /// The individual failures, in the order they were found.
    pub fn errors(&self) -> &[NetworkError] {
        &self.errors
    }

    pub fn iter(&self) -> impl Iterator<Item = &NetworkError> {
        self.errors.iter()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns `true` if any failure in the report has the given kind.
    pub fn contains_kind(&self, kind: ErrorKind) -> bool {
        self.errors.iter().any(|e| e.kind() == kind)
    }

    pub fn into_errors(self) -> Vec<NetworkError> {
        self.errors
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model validation failed with {} error(s)", self.errors.len())?;
        for err in &self.errors {
            write!(f, "\n  - {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

impl IntoIterator for ValidationReport {
    type Item = NetworkError;
    type IntoIter = std::vec::IntoIter<NetworkError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
