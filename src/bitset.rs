//! Dense bit sets over state indices.
//!
//! Model checkers represent satisfaction sets, `Prob0`/`Prob1` classifications
//! and reachability frontiers as [`BitSet`]s sized to the number of states.

const WORD: usize = u64::BITS as usize;

/// A fixed-universe set of state indices, one bit per state.
///
/// Binary operations expect both operands to range over the same states.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitSet {
    words: Vec<u64>,
    /// Number of states the set ranges over
    universe: usize,
}

impl BitSet {
    /// The empty set over `universe` states.
    pub fn new(universe: usize) -> Self {
        Self {
            words: vec![0; universe.div_ceil(WORD)],
            universe,
        }
    }

    /// The set of all `universe` states.
    pub fn full(universe: usize) -> Self {
        Self::new(universe).complement()
    }

    pub fn from_indices(universe: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut set = Self::new(universe);
        set.extend(indices);
        set
    }

    pub fn universe(&self) -> usize {
        self.universe
    }

    /// Number of states in the set.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn contains(&self, state: usize) -> bool {
        self.words
            .get(state / WORD)
            .is_some_and(|w| (w >> (state % WORD)) & 1 == 1)
    }

    /// Adds `state`; returns false if it was already present.
    pub fn insert(&mut self, state: usize) -> bool {
        assert!(
            state < self.universe,
            "State {} is out of range for a set over {} states",
            state,
            self.universe
        );
        let word = &mut self.words[state / WORD];
        let mask = 1 << (state % WORD);
        let fresh = *word & mask == 0;
        *word |= mask;
        fresh
    }

    /// Removes `state`; returns false if it was not present.
    pub fn remove(&mut self, state: usize) -> bool {
        let present = self.contains(state);
        if present {
            self.words[state / WORD] ^= 1 << (state % WORD);
        }
        present
    }

    pub fn extend(&mut self, states: impl IntoIterator<Item = usize>) {
        for state in states {
            self.insert(state);
        }
    }

    /// All states of the universe not in this set.
    pub fn complement(&self) -> Self {
        let mut words: Vec<u64> = self.words.iter().map(|w| !w).collect();
        let tail = self.universe % WORD;
        if let (Some(last), true) = (words.last_mut(), tail != 0) {
            *last &= (1 << tail) - 1;
        }
        Self {
            words,
            universe: self.universe,
        }
    }

    fn zip_with(&self, other: &Self, op: impl Fn(u64, u64) -> u64) -> Self {
        debug_assert_eq!(self.universe, other.universe);
        Self {
            words: self.words.iter().zip(&other.words).map(|(&a, &b)| op(a, b)).collect(),
            universe: self.universe,
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a | b)
    }

    pub fn intersection(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a & b)
    }

    pub fn difference(&self, other: &Self) -> Self {
        self.zip_with(other, |a, b| a & !b)
    }

    /// States in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                (rest != 0).then(|| {
                    let bit = rest.trailing_zeros() as usize;
                    rest &= rest - 1;
                    i * WORD + bit
                })
            })
        })
    }
}
