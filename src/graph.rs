//! Plain labeled state graphs for qualitative (CTL) checking.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::{CapacityError, CapacityKind, TraversalError};
use crate::traversal::{Transition, TransitionAction, TraversalControl};
use crate::types::{PropositionSet, StateIndex};

/// An edge of a [`StateGraph`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct GraphTransition {
    pub target: StateIndex,
    /// Propositions satisfied by the target.
    pub propositions: PropositionSet,
}

impl From<&Transition> for GraphTransition {
    fn from(t: &Transition) -> Self {
        GraphTransition {
            target: t.target,
            propositions: t.propositions,
        }
    }
}

/// Collects transitions into a flat, preallocated buffer.
///
/// Each batch reserves a contiguous block with a single atomic fetch-add; the
/// block's `(offset, count)` is stored per source state, packed into a `u64`.
pub struct StateGraphBuilder {
    targets: Box<[AtomicU32]>,
    labels: Box<[AtomicU64]>,
    next_offset: AtomicUsize,
    ranges: Box<[AtomicU64]>,
    initial: Mutex<Vec<GraphTransition>>,
}

impl StateGraphBuilder {
    pub fn new(state_capacity: usize, transition_capacity: usize) -> Self {
        assert!(transition_capacity < u32::MAX as usize, "Transition capacity must fit into u32");
        Self {
            targets: (0..transition_capacity).map(|_| AtomicU32::new(0)).collect(),
            labels: (0..transition_capacity).map(|_| AtomicU64::new(0)).collect(),
            next_offset: AtomicUsize::new(0),
            ranges: (0..state_capacity).map(|_| AtomicU64::new(0)).collect(),
            initial: Mutex::new(Vec::new()),
        }
    }

    /// Freezes the collected transitions of the first `state_count` states.
    pub fn finish(self, state_count: usize, propositions: Vec<String>) -> StateGraph {
        let used = self.next_offset.load(Ordering::Acquire).min(self.targets.len());
        let transitions = (0..used)
            .map(|i| GraphTransition {
                target: self.targets[i].load(Ordering::Relaxed),
                propositions: PropositionSet::from_bits(self.labels[i].load(Ordering::Relaxed)),
            })
            .collect();
        let ranges = self.ranges[..state_count]
            .iter()
            .map(|r| {
                let packed = r.load(Ordering::Relaxed);
                ((packed >> 32) as u32, packed as u32)
            })
            .collect();
        StateGraph {
            transitions,
            ranges,
            initial: self.initial.into_inner(),
            propositions,
        }
    }
}

impl TransitionAction for StateGraphBuilder {
    fn process_transitions(
        &self,
        _control: &TraversalControl,
        source: Option<StateIndex>,
        transitions: &[Transition],
    ) -> Result<(), TraversalError> {
        let Some(source) = source else {
            self.initial.lock().extend(transitions.iter().map(GraphTransition::from));
            return Ok(());
        };

        let count = transitions.len();
        let offset = self.next_offset.fetch_add(count, Ordering::AcqRel);
        if offset + count > self.targets.len() {
            return Err(CapacityError {
                kind: CapacityKind::Transitions,
                capacity: self.targets.len(),
            }
            .into());
        }

        for (i, t) in transitions.iter().enumerate() {
            self.targets[offset + i].store(t.target, Ordering::Relaxed);
            self.labels[offset + i].store(t.propositions.bits(), Ordering::Relaxed);
        }
        self.ranges[source as usize].store(((offset as u64) << 32) | count as u64, Ordering::Release);
        Ok(())
    }
}

/// Explicit state graph: per-state `(offset, count)` ranges into one transition buffer.
#[derive(Debug, Clone)]
pub struct StateGraph {
    transitions: Vec<GraphTransition>,
    ranges: Vec<(u32, u32)>,
    initial: Vec<GraphTransition>,
    propositions: Vec<String>,
}

impl StateGraph {
    pub fn state_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn outgoing(&self, state: StateIndex) -> &[GraphTransition] {
        let (offset, count) = self.ranges[state as usize];
        &self.transitions[offset as usize..(offset + count) as usize]
    }

    pub fn initial(&self) -> &[GraphTransition] {
        &self.initial
    }

    pub fn proposition_names(&self) -> &[String] {
        &self.propositions
    }

    /// Builds a graph from explicit edge lists; `initial` lists the initial transitions.
    pub fn from_edges(propositions: Vec<String>, edges: &[Vec<GraphTransition>], initial: Vec<GraphTransition>) -> Self {
        let mut transitions = Vec::new();
        let mut ranges = Vec::with_capacity(edges.len());
        for out in edges {
            ranges.push((transitions.len() as u32, out.len() as u32));
            transitions.extend_from_slice(out);
        }
        StateGraph {
            transitions,
            ranges,
            initial,
            propositions,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn transition(target: StateIndex, label: u64) -> Transition {
        Transition {
            target,
            probability: 1.0,
            propositions: PropositionSet::from_bits(label),
            distribution: 0,
        }
    }

    #[test]
    fn test_builder_ranges() {
        let builder = StateGraphBuilder::new(3, 8);
        let control = TraversalControl::new();
        builder.process_transitions(&control, None, &[transition(0, 1)]).unwrap();
        builder
            .process_transitions(&control, Some(0), &[transition(1, 0), transition(2, 2)])
            .unwrap();
        builder.process_transitions(&control, Some(2), &[transition(2, 2)]).unwrap();
        builder.process_transitions(&control, Some(1), &[]).unwrap();

        let graph = builder.finish(3, vec!["p".into(), "q".into()]);
        assert_eq!(graph.state_count(), 3);
        assert_eq!(graph.transition_count(), 3);
        assert_eq!(graph.initial().len(), 1);
        assert_eq!(graph.outgoing(0).iter().map(|t| t.target).collect::<Vec<_>>(), vec![1, 2]);
        assert!(graph.outgoing(1).is_empty());
        assert_eq!(graph.outgoing(2)[0].propositions, PropositionSet::from_bits(2));
    }

    #[test]
    fn test_builder_capacity() {
        let builder = StateGraphBuilder::new(2, 1);
        let control = TraversalControl::new();
        let err = builder
            .process_transitions(&control, Some(0), &[transition(0, 0), transition(1, 0)])
            .unwrap_err();
        assert!(matches!(
            err,
            TraversalError::Capacity(CapacityError {
                kind: CapacityKind::Transitions,
                ..
            })
        ));
    }
}
