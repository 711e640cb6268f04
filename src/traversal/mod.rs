//! Parallel exhaustive exploration of an executable model's state space.
//!
//! [`traverse`] discovers every reachable state of a model and streams the
//! transitions it finds into pluggable [`TransitionAction`]s (structure
//! builders, invariant checkers). Before deduplication, candidates pass through
//! an ordered pipeline of [`TransitionModifier`]s that may invalidate them or
//! redirect them into the stuttering state.
//!
//! State vectors carry a one-byte header in front of the model's own bytes:
//! [`REGULAR_STATE`] for ordinary states and [`STUTTERING_STATE`] for the single
//! synthetic state that loops on itself and is never handed to the model.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::model::{Activation, CandidateTransition};
use crate::error::TraversalError;
use crate::storage::StateStorage;
use crate::types::{PropositionSet, StateIndex};

mod modifier;
mod worker;

pub use modifier::EarlyTerminationModifier;
pub use worker::traverse;

/// Size of the checker-owned header in front of every state vector.
pub const HEADER_SIZE: usize = 1;
pub const REGULAR_STATE: u8 = 0;
pub const STUTTERING_STATE: u8 = 1;

/// Marker for states without a predecessor.
pub(crate) const NO_PARENT: u32 = u32::MAX;

/// A deduplicated transition handed to [`TransitionAction`]s.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transition {
    pub target: StateIndex,
    pub probability: f64,
    /// Propositions satisfied by the target.
    pub propositions: PropositionSet,
    pub distribution: u32,
}

/// Shared run state visible to actions.
#[derive(Debug, Default)]
pub struct TraversalControl {
    stop: AtomicBool,
}

impl TraversalControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks all workers to stop after their current state.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// Consumer of the transitions found during traversal.
///
/// Each source state is expanded exactly once, so an action sees every
/// outgoing batch once. `source` is `None` for the initial step. Actions run
/// concurrently on all workers.
pub trait TransitionAction: Sync {
    fn process_transitions(
        &self,
        control: &TraversalControl,
        source: Option<StateIndex>,
        transitions: &[Transition],
    ) -> Result<(), TraversalError>;
}

/// Rewrites candidate transitions after labeling and before deduplication.
pub trait TransitionModifier: Sync {
    fn modify(&self, transitions: &mut [CandidateTransition]);
}

/// Everything a single traversal run plugs into the engine.
#[derive(Default)]
pub struct TraversalParameters<'a> {
    pub actions: Vec<&'a dyn TransitionAction>,
    /// Applied in order.
    pub modifiers: Vec<Box<dyn TransitionModifier + 'a>>,
    /// Fault activations for this run; `None` keeps the model's own.
    pub activations: Option<Vec<Activation>>,
}

impl<'a> TraversalParameters<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_action(mut self, action: &'a dyn TransitionAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_modifier(mut self, modifier: impl TransitionModifier + 'a) -> Self {
        self.modifiers.push(Box::new(modifier));
        self
    }

    pub fn with_activations(mut self, activations: Vec<Activation>) -> Self {
        self.activations = Some(activations);
        self
    }
}

/// State and transition counts of a finished traversal.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TraversalSummary {
    pub state_count: usize,
    pub transition_count: usize,
}

/// The state space discovered by a traversal run.
#[derive(Debug)]
pub struct TraversedStateSpace {
    pub(crate) storage: StateStorage,
    pub(crate) parents: Vec<u32>,
    pub(crate) transition_count: usize,
    pub(crate) stopped: bool,
    pub(crate) elapsed: Duration,
    pub(crate) propositions: Vec<String>,
}

impl TraversedStateSpace {
    pub fn state_count(&self) -> usize {
        self.storage.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transition_count
    }

    pub fn summary(&self) -> TraversalSummary {
        TraversalSummary {
            state_count: self.state_count(),
            transition_count: self.transition_count,
        }
    }

    /// True if an action requested an early stop.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Names of the model's atomic propositions, indexing the [`PropositionSet`]s.
    pub fn proposition_names(&self) -> &[String] {
        &self.propositions
    }

    /// Full state vector, header included.
    pub fn state(&self, index: StateIndex) -> &[u8] {
        self.storage.get(index)
    }

    /// The model's part of a state vector, or `None` for the stuttering state.
    pub fn model_state(&self, index: StateIndex) -> Option<&[u8]> {
        let state = self.storage.get(index);
        (state[0] == REGULAR_STATE).then(|| &state[HEADER_SIZE..])
    }

    /// Model states along the discovery path from an initial state to `index`.
    pub fn trace_to(&self, index: StateIndex) -> Vec<Box<[u8]>> {
        trace(&self.storage, |i| self.parents[i as usize], index)
    }
}

pub(crate) fn trace(storage: &StateStorage, parent: impl Fn(StateIndex) -> u32, index: StateIndex) -> Vec<Box<[u8]>> {
    let mut path = Vec::new();
    let mut current = index;
    loop {
        let state = storage.get(current);
        if state[0] == REGULAR_STATE {
            path.push(state[HEADER_SIZE..].into());
        }
        match parent(current) {
            NO_PARENT => break,
            p => current = p,
        }
    }
    path.reverse();
    path
}
