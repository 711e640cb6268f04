//! Error types for traversal, model checking and safety analysis.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::StateIndex;

/// Which fixed-size buffer ran out of space.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CapacityKind {
    States,
    Transitions,
}

impl fmt::Display for CapacityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityKind::States => write!(f, "state"),
            CapacityKind::Transitions => write!(f, "transition"),
        }
    }
}

/// A state or transition buffer is full.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
#[error("unable to store more than {capacity} {kind}s; try increasing the {kind} capacity")]
pub struct CapacityError {
    pub kind: CapacityKind,
    pub capacity: usize,
}

/// Error raised by an executable model while computing successors.
#[derive(Debug, Clone, Error, Eq, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ModelError {
    pub message: String,
}

impl ModelError {
    pub fn new(message: impl Into<String>) -> Self {
        ModelError {
            message: message.into(),
        }
    }
}

/// Where a batch of transitions comes from: the initial step or an explored state.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Origin(pub Option<StateIndex>);

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            None => write!(f, "the initial step"),
            Some(state) => write!(f, "state {}", state),
        }
    }
}

/// Formula construction or compilation errors.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum FormulaError {
    #[error("unknown atomic proposition '{0}'")]
    UnknownProposition(String),

    #[error("'{0}' is not a state formula")]
    NotStateFormula(String),

    #[error("only CTL formulas can be normalized, got '{0}'")]
    NotCtl(String),
}

/// Errors that abort a single traversal run.
#[derive(Debug, Error)]
pub enum TraversalError {
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error("deadlock in {origin}: no valid outgoing transitions")]
    Deadlock { origin: Origin },

    #[error("probabilities leaving {origin} sum to {sum} instead of 1")]
    InvalidDistribution { origin: Origin, sum: f64 },

    #[error("model error in {origin}: {source}")]
    Model {
        origin: Origin,
        /// State vectors from an initial state up to the failing state.
        trace: Vec<Box<[u8]>>,
        #[source]
        source: ModelError,
    },

    #[error("model declares {count} atomic propositions, at most 64 are supported")]
    PropositionLimit { count: usize },

    #[error(transparent)]
    Formula(#[from] FormulaError),
}

/// Errors of the structure-level model checkers.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum CheckError {
    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error("formula '{0}' is not supported by this checker")]
    Unsupported(String),
}

/// Errors of the counterexample persistence and replay layer.
#[derive(Debug, Error)]
pub enum CounterexampleError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed counterexample: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported counterexample version {found}, expected {expected}")]
    Version { found: u32, expected: u32 },

    #[error("replay diverged at step {step}: recorded state is not a successor")]
    NotASuccessor { step: usize },

    #[error("replay failed at step {step}: {source}")]
    Model {
        step: usize,
        #[source]
        source: ModelError,
    },

    #[error("counterexample has no states left to replay")]
    Completed,

    #[error("counterexample refers to unknown fault '{0}'")]
    UnknownFault(String),
}

impl CounterexampleError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CounterexampleError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors that abort a whole safety analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error(transparent)]
    Traversal(#[from] TraversalError),

    #[error("fault sets support at most 64 faults, the model has {0}")]
    TooManyFaults(usize),
}
