//! The executable-model contract consumed by the traversal engine.
//!
//! An [`ExecutableModel`] is an opaque state machine. The engine only ever
//! talks to it through serialized state vectors: it restores a state with
//! [`deserialize`][ExecutableModel::deserialize], asks the model to compute
//! all successors with [`execute_step`][ExecutableModel::execute_step], and
//! drains the resulting [`CandidateTransition`]s. Probabilistic branching,
//! nondeterministic fault activation and everything else about *how* the
//! successors come about stays inside the model.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::types::PropositionSet;

/// How a fault may become active during a run.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Activation {
    /// The fault is active whenever it can be.
    Forced,
    /// The fault never activates.
    Suppressed,
    /// The fault may or may not activate; the model explores both branches.
    #[default]
    Nondeterministic,
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Forced => write!(f, "forced"),
            Activation::Suppressed => write!(f, "suppressed"),
            Activation::Nondeterministic => write!(f, "nondeterministic"),
        }
    }
}

/// A named fault as declared by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    pub name: String,
    /// Activation the model declares before any analysis overrides it.
    pub activation: Activation,
    /// Occurrence probability, for models that branch probabilistically on the fault.
    pub probability: Option<f64>,
}

impl Fault {
    pub fn new(name: impl Into<String>) -> Self {
        Fault {
            name: name.into(),
            activation: Activation::Nondeterministic,
            probability: None,
        }
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = Some(probability);
        self
    }
}

/// One successor computed by [`ExecutableModel::execute_step`].
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateTransition {
    /// Serialized target state, exactly [`ExecutableModel::state_vector_size`] bytes.
    pub target: Vec<u8>,
    pub probability: f64,
    /// Nondeterministic choice this transition belongs to; transitions of one
    /// distribution must sum to 1.
    pub distribution: u32,
    /// Filled in by the traversal engine after the step.
    pub propositions: PropositionSet,
    pub is_valid: bool,
    /// Redirects the transition to the stuttering state.
    pub is_stuttering: bool,
}

impl CandidateTransition {
    pub fn new(target: Vec<u8>, probability: f64) -> Self {
        CandidateTransition {
            target,
            probability,
            distribution: 0,
            propositions: PropositionSet::empty(),
            is_valid: true,
            is_stuttering: false,
        }
    }

    /// A nondeterministic transition with probability 1.
    pub fn nondeterministic(target: Vec<u8>) -> Self {
        Self::new(target, 1.0)
    }

    pub fn in_distribution(mut self, distribution: u32) -> Self {
        self.distribution = distribution;
        self
    }
}

/// A model the traversal engine can explore.
///
/// Every worker thread owns its own instance, created by the model factory,
/// so implementations need `Send` but not `Sync`.
pub trait ExecutableModel: Send {
    /// Size in bytes of a serialized state.
    fn state_vector_size(&self) -> usize;

    /// Writes the current state into `buffer`.
    fn serialize(&self, buffer: &mut [u8]);

    /// Restores the state stored in `buffer`.
    fn deserialize(&mut self, buffer: &[u8]);

    /// Computes the initial states as candidate transitions.
    fn execute_initial_step(&mut self) -> Result<(), ModelError>;

    /// Computes all successors of the current state as candidate transitions.
    fn execute_step(&mut self) -> Result<(), ModelError>;

    /// Drains the candidates computed by the last step.
    fn candidate_transitions(&mut self) -> Vec<CandidateTransition>;

    /// Names of the atomic propositions, in index order.
    fn atomic_propositions(&self) -> Vec<String>;

    /// Evaluates proposition `index` on the current state.
    fn evaluate_atomic_proposition(&self, index: usize) -> bool;

    fn faults(&self) -> Vec<Fault>;

    fn set_fault_activation(&mut self, fault: usize, activation: Activation);

    /// Serializes the current state into a freshly allocated vector.
    fn serialize_to_vec(&self) -> Vec<u8> {
        let mut buffer = vec![0; self.state_vector_size()];
        self.serialize(&mut buffer);
        buffer
    }

    /// Applies one activation per fault, in fault order.
    fn apply_activations(&mut self, activations: &[Activation]) {
        for (fault, &activation) in activations.iter().enumerate() {
            self.set_fault_activation(fault, activation);
        }
    }

    /// Evaluates all atomic propositions on the current state.
    fn label(&self, count: usize) -> PropositionSet {
        (0..count).filter(|&i| self.evaluate_atomic_proposition(i)).collect()
    }
}
