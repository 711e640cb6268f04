//! Labeled-transition Markov chains and their state-labeled DTMC form.
//!
//! During traversal, [`LtmcBuilder`] records for every source state a chain of
//! outgoing [`ChainElement`]s, merging elements that lead to the same target
//! with the same propositions. The resulting [`Ltmc`] carries labels on
//! transitions; [`Ltmc::to_dtmc`] turns every distinct `(target, propositions)`
//! pair into a state of a [`Dtmc`], which is what the checkers operate on.

use std::collections::HashMap;

use log::debug;
use parking_lot::Mutex;

use crate::bitset::BitSet;
use crate::error::{CapacityError, CapacityKind, Origin, TraversalError};
use crate::formula::StatePredicate;
use crate::sparse::SparseMatrix;
use crate::traversal::{Transition, TransitionAction, TraversalControl};
use crate::types::{PropositionSet, StateIndex};

/// Outgoing probabilities must sum to one within this tolerance.
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// One persisted transition in a per-source chain.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ChainElement {
    pub target: StateIndex,
    pub probability: f64,
    pub propositions: PropositionSet,
    pub distribution: u32,
    next: Option<u32>,
}

/// Arena of per-source transition chains.
pub(crate) struct ChainArena {
    elements: Vec<ChainElement>,
    heads: Vec<Option<u32>>,
    initial: Option<u32>,
    capacity: usize,
}

impl ChainArena {
    pub(crate) fn new(state_capacity: usize, transition_capacity: usize) -> Self {
        Self {
            elements: Vec::new(),
            heads: vec![None; state_capacity],
            initial: None,
            capacity: transition_capacity,
        }
    }

    /// Appends `t` to the chain of `source`, merging with an element that has
    /// the same target and propositions (and distribution, if `by_distribution`).
    pub(crate) fn append(
        &mut self,
        source: Option<StateIndex>,
        t: &Transition,
        by_distribution: bool,
    ) -> Result<(), CapacityError> {
        let head = match source {
            None => &mut self.initial,
            Some(s) => &mut self.heads[s as usize],
        };

        let mut cursor = *head;
        let mut last = None;
        while let Some(i) = cursor {
            let e = &mut self.elements[i as usize];
            if e.target == t.target
                && e.propositions == t.propositions
                && (!by_distribution || e.distribution == t.distribution)
            {
                e.probability += t.probability;
                return Ok(());
            }
            last = Some(i);
            cursor = e.next;
        }

        if self.elements.len() >= self.capacity {
            return Err(CapacityError {
                kind: CapacityKind::Transitions,
                capacity: self.capacity,
            });
        }
        let index = self.elements.len() as u32;
        self.elements.push(ChainElement {
            target: t.target,
            probability: t.probability,
            propositions: t.propositions,
            distribution: t.distribution,
            next: None,
        });
        match last {
            None => *head = Some(index),
            Some(l) => self.elements[l as usize].next = Some(index),
        }
        Ok(())
    }

    pub(crate) fn into_parts(mut self, state_count: usize) -> (Vec<ChainElement>, Vec<Option<u32>>, Option<u32>) {
        self.heads.truncate(state_count);
        (self.elements, self.heads, self.initial)
    }
}

pub(crate) fn chain(elements: &[ChainElement], head: Option<u32>) -> impl Iterator<Item = &ChainElement> + Clone + '_ {
    let mut cursor = head;
    std::iter::from_fn(move || {
        let e = &elements[cursor? as usize];
        cursor = e.next;
        Some(e)
    })
}

/// Checks that a batch is non-empty and its probabilities sum to one.
pub(crate) fn check_distribution<'t>(
    source: Option<StateIndex>,
    transitions: impl IntoIterator<Item = &'t Transition>,
) -> Result<(), TraversalError> {
    let mut count = 0;
    let mut sum = 0.0;
    for t in transitions {
        count += 1;
        sum += t.probability;
    }
    if count == 0 {
        return Err(TraversalError::Deadlock { origin: Origin(source) });
    }
    if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(TraversalError::InvalidDistribution {
            origin: Origin(source),
            sum,
        });
    }
    Ok(())
}

/// Builds an [`Ltmc`] from the traversal's transition stream.
pub struct LtmcBuilder {
    arena: Mutex<ChainArena>,
}

impl LtmcBuilder {
    pub fn new(state_capacity: usize, transition_capacity: usize) -> Self {
        Self {
            arena: Mutex::new(ChainArena::new(state_capacity, transition_capacity)),
        }
    }

    pub fn finish(self, state_count: usize, propositions: Vec<String>) -> Ltmc {
        let (elements, heads, initial) = self.arena.into_inner().into_parts(state_count);
        Ltmc {
            elements,
            heads,
            initial,
            propositions,
        }
    }
}

impl TransitionAction for LtmcBuilder {
    fn process_transitions(
        &self,
        _control: &TraversalControl,
        source: Option<StateIndex>,
        transitions: &[Transition],
    ) -> Result<(), TraversalError> {
        check_distribution(source, transitions)?;
        let mut arena = self.arena.lock();
        for t in transitions {
            arena.append(source, t, false)?;
        }
        Ok(())
    }
}

/// Labeled-transition Markov chain: propositions sit on transitions.
#[derive(Debug, Clone)]
pub struct Ltmc {
    elements: Vec<ChainElement>,
    heads: Vec<Option<u32>>,
    initial: Option<u32>,
    propositions: Vec<String>,
}

impl Ltmc {
    pub fn state_count(&self) -> usize {
        self.heads.len()
    }

    pub fn transition_count(&self) -> usize {
        self.elements.len()
    }

    pub fn proposition_names(&self) -> &[String] {
        &self.propositions
    }

    pub fn outgoing(&self, state: StateIndex) -> impl Iterator<Item = &ChainElement> + '_ {
        chain(&self.elements, self.heads[state as usize])
    }

    pub fn initial(&self) -> impl Iterator<Item = &ChainElement> + '_ {
        chain(&self.elements, self.initial)
    }

    /// Converts to a state-labeled DTMC whose states are the reachable
    /// `(target, propositions)` pairs.
    pub fn to_dtmc(&self) -> Dtmc {
        let mut interner = PairInterner::default();
        let initial: Vec<(StateIndex, f64)> = self
            .initial()
            .map(|e| (interner.intern(e.target, e.propositions), e.probability))
            .collect();

        let mut matrix = SparseMatrix::new();
        let mut next = 0;
        while next < interner.pairs.len() {
            let (state, _) = interner.pairs[next];
            next += 1;
            let row: Vec<(u32, f64)> = self
                .outgoing(state)
                .map(|e| (interner.intern(e.target, e.propositions), e.probability))
                .collect();
            matrix.push_row(row);
        }

        debug!(
            "Converted LTMC with {} states to DTMC with {} states and {} transitions",
            self.state_count(),
            matrix.row_count(),
            matrix.entry_count()
        );

        Dtmc {
            matrix,
            labels: interner.pairs.iter().map(|&(_, labels)| labels).collect(),
            initial,
            propositions: self.propositions.clone(),
        }
    }
}

/// Dense ids for `(target, propositions)` pairs, in discovery order.
#[derive(Default)]
pub(crate) struct PairInterner {
    ids: HashMap<(StateIndex, PropositionSet), u32>,
    pub(crate) pairs: Vec<(StateIndex, PropositionSet)>,
}

impl PairInterner {
    pub(crate) fn intern(&mut self, target: StateIndex, propositions: PropositionSet) -> u32 {
        let pairs = &mut self.pairs;
        *self.ids.entry((target, propositions)).or_insert_with(|| {
            pairs.push((target, propositions));
            pairs.len() as u32 - 1
        })
    }
}

/// Discrete-time Markov chain with labels on states.
#[derive(Debug, Clone)]
pub struct Dtmc {
    matrix: SparseMatrix,
    labels: Vec<PropositionSet>,
    initial: Vec<(StateIndex, f64)>,
    propositions: Vec<String>,
}

impl Dtmc {
    pub fn state_count(&self) -> usize {
        self.labels.len()
    }

    pub fn transition_count(&self) -> usize {
        self.matrix.entry_count()
    }

    pub fn matrix(&self) -> &SparseMatrix {
        &self.matrix
    }

    pub fn label(&self, state: StateIndex) -> PropositionSet {
        self.labels[state as usize]
    }

    pub fn initial_distribution(&self) -> &[(StateIndex, f64)] {
        &self.initial
    }

    pub fn proposition_names(&self) -> &[String] {
        &self.propositions
    }

    /// States whose label satisfies `predicate`.
    pub fn satisfying(&self, predicate: &StatePredicate) -> BitSet {
        BitSet::from_indices(
            self.state_count(),
            (0..self.state_count()).filter(|&s| predicate.evaluate(self.labels[s])),
        )
    }

    /// Checks that every row and the initial distribution sum to one.
    pub fn validate(&self) -> Result<(), TraversalError> {
        let initial_sum: f64 = self.initial.iter().map(|&(_, p)| p).sum();
        if self.initial.is_empty() {
            return Err(TraversalError::Deadlock { origin: Origin(None) });
        }
        if (initial_sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(TraversalError::InvalidDistribution {
                origin: Origin(None),
                sum: initial_sum,
            });
        }
        for state in 0..self.state_count() {
            let origin = Origin(Some(state as StateIndex));
            if self.matrix.row(state).next().is_none() {
                return Err(TraversalError::Deadlock { origin });
            }
            let sum = self.matrix.row_sum(state);
            if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
                return Err(TraversalError::InvalidDistribution { origin, sum });
            }
        }
        Ok(())
    }
}

/// Builds a [`Dtmc`] state by state, for explicitly given chains.
///
/// ```
/// use safety_rs::ltmc::DtmcBuilder;
/// use safety_rs::types::PropositionSet;
///
/// let mut builder = DtmcBuilder::new(["done"]);
/// builder
///     .initial(0, 1.0)
///     .transition(0, 1, 0.6)
///     .transition(0, 0, 0.4)
///     .transition(1, 1, 1.0)
///     .label(1, PropositionSet::empty().with(0));
/// let dtmc = builder.build().unwrap();
/// assert_eq!(dtmc.state_count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct DtmcBuilder {
    propositions: Vec<String>,
    initial: Vec<(StateIndex, f64)>,
    labels: Vec<PropositionSet>,
    rows: Vec<Vec<(StateIndex, f64)>>,
}

impl DtmcBuilder {
    pub fn new<S: Into<String>>(propositions: impl IntoIterator<Item = S>) -> Self {
        Self {
            propositions: propositions.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    fn ensure_state(&mut self, state: StateIndex) {
        let needed = state as usize + 1;
        if self.rows.len() < needed {
            self.rows.resize_with(needed, Vec::new);
            self.labels.resize(needed, PropositionSet::empty());
        }
    }

    pub fn initial(&mut self, state: StateIndex, probability: f64) -> &mut Self {
        self.ensure_state(state);
        self.initial.push((state, probability));
        self
    }

    pub fn label(&mut self, state: StateIndex, propositions: PropositionSet) -> &mut Self {
        self.ensure_state(state);
        self.labels[state as usize] = propositions;
        self
    }

    pub fn transition(&mut self, source: StateIndex, target: StateIndex, probability: f64) -> &mut Self {
        self.ensure_state(source);
        self.ensure_state(target);
        self.rows[source as usize].push((target, probability));
        self
    }

    /// Validates and freezes the chain.
    pub fn build(self) -> Result<Dtmc, TraversalError> {
        let mut matrix = SparseMatrix::new();
        for row in self.rows {
            matrix.push_row(row);
        }
        let dtmc = Dtmc {
            matrix,
            labels: self.labels,
            initial: self.initial,
            propositions: self.propositions,
        };
        dtmc.validate()?;
        Ok(dtmc)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn transition(target: StateIndex, probability: f64, label: u64) -> Transition {
        Transition {
            target,
            probability,
            propositions: PropositionSet::from_bits(label),
            distribution: 0,
        }
    }

    #[test]
    fn test_merges_equal_target_and_label() {
        let builder = LtmcBuilder::new(4, 16);
        let control = TraversalControl::new();
        builder
            .process_transitions(&control, None, &[transition(0, 1.0, 0)])
            .unwrap();
        builder
            .process_transitions(
                &control,
                Some(0),
                &[
                    transition(1, 0.25, 0),
                    transition(1, 0.25, 1),
                    transition(1, 0.25, 0),
                    transition(0, 0.25, 0),
                ],
            )
            .unwrap();
        builder
            .process_transitions(&control, Some(1), &[transition(1, 1.0, 0)])
            .unwrap();

        let ltmc = builder.finish(2, vec!["p".into()]);
        let out: Vec<_> = ltmc.outgoing(0).map(|e| (e.target, e.probability, e.propositions.bits())).collect();
        assert_eq!(out, vec![(1, 0.5, 0), (1, 0.25, 1), (0, 0.25, 0)]);
        assert_eq!(ltmc.transition_count(), 5);

        let dtmc = ltmc.to_dtmc();
        dtmc.validate().unwrap();
        // (0,{}) (1,{}) (1,{p})
        assert_eq!(dtmc.state_count(), 3);
        assert_eq!(dtmc.initial_distribution(), &[(0, 1.0)]);
    }

    #[test]
    fn test_rejects_deadlock_and_bad_sums() {
        let builder = LtmcBuilder::new(2, 8);
        let control = TraversalControl::new();
        let err = builder.process_transitions(&control, Some(1), &[]).unwrap_err();
        assert!(matches!(err, TraversalError::Deadlock { origin: Origin(Some(1)) }));

        let err = builder
            .process_transitions(&control, Some(0), &[transition(1, 0.3, 0), transition(0, 0.3, 0)])
            .unwrap_err();
        assert!(matches!(err, TraversalError::InvalidDistribution { .. }));
    }

    #[test]
    fn test_arena_capacity() {
        let builder = LtmcBuilder::new(2, 1);
        let control = TraversalControl::new();
        let err = builder
            .process_transitions(&control, Some(0), &[transition(0, 0.5, 0), transition(1, 0.5, 0)])
            .unwrap_err();
        assert!(matches!(err, TraversalError::Capacity(_)));
    }

    #[test]
    fn test_dtmc_builder_validation() {
        let mut builder = DtmcBuilder::new(["p"]);
        builder.initial(0, 1.0).transition(0, 1, 0.5).transition(0, 0, 0.4);
        builder.transition(1, 1, 1.0);
        let err = builder.build().unwrap_err();
        assert!(matches!(err, TraversalError::InvalidDistribution { origin: Origin(Some(0)), .. }));

        let mut builder = DtmcBuilder::new(["p"]);
        builder.initial(0, 1.0).transition(0, 1, 1.0);
        let err = builder.build().unwrap_err();
        assert!(matches!(err, TraversalError::Deadlock { origin: Origin(Some(1)) }));
    }
}
