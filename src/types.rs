//! Small value types shared by the traversal engine and the checkers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Dense index of a stored state vector.
pub type StateIndex = u32;

/// Set of satisfied atomic propositions.
///
/// Bit `i` corresponds to the model's `i`-th atomic proposition, so at most
/// [`PropositionSet::MAX_PROPOSITIONS`] propositions are supported.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct PropositionSet(u64);

impl PropositionSet {
    pub const MAX_PROPOSITIONS: usize = 64;

    pub const fn empty() -> Self {
        PropositionSet(0)
    }

    pub const fn from_bits(bits: u64) -> Self {
        PropositionSet(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    /// Returns true if proposition `index` holds.
    #[inline]
    pub fn contains(self, index: usize) -> bool {
        index < Self::MAX_PROPOSITIONS && self.0 & (1 << index) != 0
    }

    /// Marks proposition `index` as satisfied.
    ///
    /// # Panics
    ///
    /// Panics if `index >= 64`.
    #[inline]
    pub fn insert(&mut self, index: usize) {
        assert!(index < Self::MAX_PROPOSITIONS, "Proposition index {} exceeds the limit of 64", index);
        self.0 |= 1 << index;
    }

    /// Returns a copy with proposition `index` set.
    pub fn with(mut self, index: usize) -> Self {
        self.insert(index);
        self
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns an iterator over the indices of the satisfied propositions.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let index = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Some(index)
        })
    }
}

impl fmt::Display for PropositionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, index) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "p{}", index)?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<usize> for PropositionSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = PropositionSet::empty();
        for index in iter {
            set.insert(index);
        }
        set
    }
}
