//! Labeled-transition Markov decision processes.
//!
//! Works like [`crate::ltmc`], except that outgoing transitions are grouped by
//! their distribution id: every distribution is one nondeterministic choice
//! and must sum to one on its own.

use log::debug;
use parking_lot::Mutex;

use crate::bitset::BitSet;
use crate::error::{Origin, TraversalError};
use crate::formula::StatePredicate;
use crate::ltmc::{chain, check_distribution, ChainArena, ChainElement, PairInterner, PROBABILITY_TOLERANCE};
use crate::sparse::SparseMatrix;
use crate::traversal::{Transition, TransitionAction, TraversalControl};
use crate::types::{PropositionSet, StateIndex};

/// Builds an [`Ltmdp`] from the traversal's transition stream.
pub struct LtmdpBuilder {
    arena: Mutex<ChainArena>,
}

impl LtmdpBuilder {
    pub fn new(state_capacity: usize, transition_capacity: usize) -> Self {
        Self {
            arena: Mutex::new(ChainArena::new(state_capacity, transition_capacity)),
        }
    }

    pub fn finish(self, state_count: usize, propositions: Vec<String>) -> Ltmdp {
        let (elements, heads, initial) = self.arena.into_inner().into_parts(state_count);
        Ltmdp {
            elements,
            heads,
            initial,
            propositions,
        }
    }
}

impl TransitionAction for LtmdpBuilder {
    fn process_transitions(
        &self,
        _control: &TraversalControl,
        source: Option<StateIndex>,
        transitions: &[Transition],
    ) -> Result<(), TraversalError> {
        if transitions.is_empty() {
            return Err(TraversalError::Deadlock { origin: Origin(source) });
        }
        for distribution in distribution_ids(transitions.iter().map(|t| t.distribution)) {
            check_distribution(source, transitions.iter().filter(|t| t.distribution == distribution))?;
        }
        let mut arena = self.arena.lock();
        for t in transitions {
            arena.append(source, t, true)?;
        }
        Ok(())
    }
}

/// Distinct ids in order of first appearance.
fn distribution_ids(ids: impl Iterator<Item = u32>) -> Vec<u32> {
    let mut seen = Vec::new();
    for id in ids {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

/// Labeled-transition MDP: propositions on transitions, choices by distribution id.
#[derive(Debug, Clone)]
pub struct Ltmdp {
    elements: Vec<ChainElement>,
    heads: Vec<Option<u32>>,
    initial: Option<u32>,
    propositions: Vec<String>,
}

impl Ltmdp {
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

    fn grouped<'e>(
        elements: impl Iterator<Item = &'e ChainElement> + Clone,
        interner: &mut PairInterner,
    ) -> Vec<Vec<(u32, f64)>> {
        distribution_ids(elements.clone().map(|e| e.distribution))
            .into_iter()
            .map(|d| {
                elements
                    .clone()
                    .filter(|e| e.distribution == d)
                    .map(|e| (interner.intern(e.target, e.propositions), e.probability))
                    .collect()
            })
            .collect()
    }

    /// Converts to a state-labeled MDP whose states are the reachable
    /// `(target, propositions)` pairs.
    pub fn to_mdp(&self) -> Mdp {
        let mut interner = PairInterner::default();
        let initial = Self::grouped(chain(&self.elements, self.initial), &mut interner);

        let mut distributions = SparseMatrix::new();
        let mut state_rows = vec![0];
        let mut next = 0;
        while next < interner.pairs.len() {
            let (state, _) = interner.pairs[next];
            next += 1;
            for row in Self::grouped(chain(&self.elements, self.heads[state as usize]), &mut interner) {
                distributions.push_row(row);
            }
            state_rows.push(distributions.row_count());
        }

        debug!(
            "Converted LTMDP with {} states to MDP with {} states and {} distributions",
            self.state_count(),
            state_rows.len() - 1,
            distributions.row_count()
        );

        Mdp {
            distributions,
            state_rows,
            labels: interner.pairs.iter().map(|&(_, labels)| labels).collect(),
            initial,
            propositions: self.propositions.clone(),
        }
    }
}

/// Markov decision process with labels on states.
///
/// Every state owns a contiguous range of rows of `distributions`; each row is
/// one probability distribution over successor states.
#[derive(Debug, Clone)]
pub struct Mdp {
    distributions: SparseMatrix,
    state_rows: Vec<usize>,
    labels: Vec<PropositionSet>,
    initial: Vec<Vec<(StateIndex, f64)>>,
    propositions: Vec<String>,
}

impl Mdp {
    pub fn state_count(&self) -> usize {
        self.labels.len()
    }

    pub fn distribution_count(&self) -> usize {
        self.distributions.row_count()
    }

    pub fn transition_count(&self) -> usize {
        self.distributions.entry_count()
    }

    /// Row indices of the distributions of `state`.
    pub fn distributions(&self, state: StateIndex) -> std::ops::Range<usize> {
        self.state_rows[state as usize]..self.state_rows[state as usize + 1]
    }

    pub fn distribution(&self, row: usize) -> impl Iterator<Item = (StateIndex, f64)> + '_ {
        self.distributions.row(row)
    }

    pub fn label(&self, state: StateIndex) -> PropositionSet {
        self.labels[state as usize]
    }

    pub fn initial_distributions(&self) -> &[Vec<(StateIndex, f64)>] {
        &self.initial
    }

    pub fn proposition_names(&self) -> &[String] {
        &self.propositions
    }

    pub fn satisfying(&self, predicate: &StatePredicate) -> BitSet {
        BitSet::from_indices(
            self.state_count(),
            (0..self.state_count()).filter(|&s| predicate.evaluate(self.labels[s])),
        )
    }

    /// Checks that every state has a choice and every distribution sums to one.
    pub fn validate(&self) -> Result<(), TraversalError> {
        let check = |origin: Option<StateIndex>, sum: f64| {
            if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
                Err(TraversalError::InvalidDistribution {
                    origin: Origin(origin),
                    sum,
                })
            } else {
                Ok(())
            }
        };

        if self.initial.is_empty() {
            return Err(TraversalError::Deadlock { origin: Origin(None) });
        }
        for distribution in &self.initial {
            check(None, distribution.iter().map(|&(_, p)| p).sum())?;
        }
        for state in 0..self.state_count() as StateIndex {
            let rows = self.distributions(state);
            if rows.is_empty() {
                return Err(TraversalError::Deadlock { origin: Origin(Some(state)) });
            }
            for row in rows {
                check(Some(state), self.distributions.row_sum(row))?;
            }
        }
        Ok(())
    }
}

/// Builds an [`Mdp`] from explicitly given distributions.
#[derive(Debug, Default)]
pub struct MdpBuilder {
    propositions: Vec<String>,
    initial: Vec<Vec<(StateIndex, f64)>>,
    labels: Vec<PropositionSet>,
    choices: Vec<Vec<Vec<(StateIndex, f64)>>>,
}

impl MdpBuilder {
    pub fn new<S: Into<String>>(propositions: impl IntoIterator<Item = S>) -> Self {
        Self {
            propositions: propositions.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    fn ensure_state(&mut self, state: StateIndex) {
        let needed = state as usize + 1;
        if self.choices.len() < needed {
            self.choices.resize_with(needed, Vec::new);
            self.labels.resize(needed, PropositionSet::empty());
        }
    }

    /// Adds one initial nondeterministic choice.
    pub fn initial(&mut self, distribution: &[(StateIndex, f64)]) -> &mut Self {
        for &(target, _) in distribution {
            self.ensure_state(target);
        }
        self.initial.push(distribution.to_vec());
        self
    }

    pub fn label(&mut self, state: StateIndex, propositions: PropositionSet) -> &mut Self {
        self.ensure_state(state);
        self.labels[state as usize] = propositions;
        self
    }

    /// Adds one nondeterministic choice of `source`.
    pub fn distribution(&mut self, source: StateIndex, distribution: &[(StateIndex, f64)]) -> &mut Self {
        self.ensure_state(source);
        for &(target, _) in distribution {
            self.ensure_state(target);
        }
        self.choices[source as usize].push(distribution.to_vec());
        self
    }

    pub fn build(self) -> Result<Mdp, TraversalError> {
        let mut distributions = SparseMatrix::new();
        let mut state_rows = vec![0];
        for choices in self.choices {
            for row in choices {
                distributions.push_row(row);
            }
            state_rows.push(distributions.row_count());
        }
        let mdp = Mdp {
            distributions,
            state_rows,
            labels: self.labels,
            initial: self.initial,
            propositions: self.propositions,
        };
        mdp.validate()?;
        Ok(mdp)
    }
}
