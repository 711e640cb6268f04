//! Fault sets: the search domain of the safety analysis.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Activation, Fault};
use crate::utils::join_sorted;

/// An immutable set of fault indices, packed into a `u64`.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct FaultSet(u64);

impl FaultSet {
    pub const MAX_FAULTS: usize = 64;

    pub const fn empty() -> Self {
        FaultSet(0)
    }

    pub const fn from_bits(bits: u64) -> Self {
        FaultSet(bits)
    }

    /// The set of all faults `0..count`.
    pub fn full(count: usize) -> Self {
        assert!(count <= Self::MAX_FAULTS, "At most 64 faults are supported");
        if count == Self::MAX_FAULTS {
            FaultSet(u64::MAX)
        } else {
            FaultSet((1u64 << count) - 1)
        }
    }

    pub fn single(fault: usize) -> Self {
        assert!(fault < Self::MAX_FAULTS, "Fault index {} exceeds the limit of 64", fault);
        FaultSet(1 << fault)
    }

    /// The set of faults whose declared activation equals `activation`.
    pub fn with_activation(faults: &[Fault], activation: Activation) -> Self {
        faults
            .iter()
            .enumerate()
            .filter(|(_, f)| f.activation == activation)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn cardinality(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, fault: usize) -> bool {
        fault < Self::MAX_FAULTS && self.0 & (1 << fault) != 0
    }

    pub fn insert(self, fault: usize) -> Self {
        self.union(FaultSet::single(fault))
    }

    pub fn remove(self, fault: usize) -> Self {
        self.difference(FaultSet::single(fault))
    }

    pub fn union(self, other: Self) -> Self {
        FaultSet(self.0 | other.0)
    }

    pub fn intersection(self, other: Self) -> Self {
        FaultSet(self.0 & other.0)
    }

    pub fn difference(self, other: Self) -> Self {
        FaultSet(self.0 & !other.0)
    }

    /// Complement with respect to the faults `0..count`.
    pub fn complement(self, count: usize) -> Self {
        FaultSet::full(count).difference(self)
    }

    pub fn is_subset_of(self, other: Self) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn is_superset_of(self, other: Self) -> bool {
        other.is_subset_of(self)
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn iter(self) -> impl Iterator<Item = usize> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let fault = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Some(fault)
        })
    }

    /// Names of the faults in this set, in index order.
    pub fn names<'a>(self, faults: &'a [Fault]) -> impl Iterator<Item = &'a str> + 'a {
        self.iter().filter_map(move |i| faults.get(i).map(|f| f.name.as_str()))
    }

    /// Alphabetically sorted, comma-separated fault names.
    pub fn to_names(self, faults: &[Fault]) -> String {
        join_sorted(self.names(faults))
    }

    /// Per-fault activations that enable exactly the faults in this set.
    ///
    /// Faults of the set that are among `candidates` get `mode`; the remaining
    /// candidates are suppressed. Faults outside `candidates` keep their
    /// declared activation.
    pub fn activations(self, faults: &[Fault], candidates: FaultSet, mode: Activation) -> Vec<Activation> {
        faults
            .iter()
            .enumerate()
            .map(|(i, fault)| {
                if !candidates.contains(i) {
                    fault.activation
                } else if self.contains(i) {
                    mode
                } else {
                    Activation::Suppressed
                }
            })
            .collect()
    }
}

impl FromIterator<usize> for FaultSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        iter.into_iter().fold(FaultSet::empty(), FaultSet::insert)
    }
}

impl fmt::Display for FaultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, fault) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", fault)?;
        }
        write!(f, "}}")
    }
}

/// A collection of fault sets answering subset/superset queries.
///
/// Sets are bucketed by cardinality so that a superset query only scans sets
/// that are at least as large as the query.
#[derive(Debug, Clone)]
pub struct FaultSetCollection {
    by_cardinality: Vec<Vec<FaultSet>>,
    len: usize,
}

impl FaultSetCollection {
    pub fn new(fault_count: usize) -> Self {
        Self {
            by_cardinality: vec![Vec::new(); fault_count + 1],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn add(&mut self, set: FaultSet) {
        let bucket = &mut self.by_cardinality[set.cardinality()];
        if !bucket.contains(&set) {
            bucket.push(set);
            self.len += 1;
        }
    }

    /// Returns true if some stored set is a subset of `set`.
    pub fn contains_subset_of(&self, set: FaultSet) -> bool {
        self.by_cardinality
            .iter()
            .take(set.cardinality() + 1)
            .flatten()
            .any(|s| s.is_subset_of(set))
    }

    /// Returns true if some stored set is a superset of `set`.
    pub fn contains_superset_of(&self, set: FaultSet) -> bool {
        self.by_cardinality
            .iter()
            .skip(set.cardinality())
            .flatten()
            .any(|s| s.is_superset_of(set))
    }

    pub fn iter(&self) -> impl Iterator<Item = FaultSet> + '_ {
        self.by_cardinality.iter().flatten().copied()
    }

    /// Sets that have no proper subset in the collection.
    pub fn minimal_sets(&self) -> Vec<FaultSet> {
        let mut minimal: Vec<FaultSet> = Vec::new();
        for set in self.iter() {
            // Smaller sets come first, so only already-accepted sets can be subsets.
            if !minimal.iter().any(|m| m.is_subset_of(set)) {
                minimal.push(set);
            }
        }
        minimal
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_set_operations() {
        let a: FaultSet = [0, 2].into_iter().collect();
        let b = FaultSet::single(2).insert(3);
        assert_eq!(a.union(b).iter().collect::<Vec<_>>(), vec![0, 2, 3]);
        assert_eq!(a.intersection(b), FaultSet::single(2));
        assert_eq!(a.difference(b), FaultSet::single(0));
        assert_eq!(a.complement(4).iter().collect::<Vec<_>>(), vec![1, 3]);
        assert!(FaultSet::single(2).is_subset_of(a));
        assert!(a.is_superset_of(FaultSet::empty()));
        assert!(!a.is_subset_of(b));
        assert_eq!(a.cardinality(), 2);
        assert_eq!(a.to_string(), "{0, 2}");
        assert_eq!(FaultSet::full(64).cardinality(), 64);
    }

    #[test]
    fn test_names_and_activations() {
        let faults = vec![
            Fault::new("B"),
            Fault::new("A").with_activation(Activation::Forced),
            Fault::new("C"),
        ];
        let set: FaultSet = [0, 1].into_iter().collect();
        assert_eq!(set.to_names(&faults), "A, B");
        assert_eq!(FaultSet::with_activation(&faults, Activation::Forced), FaultSet::single(1));

        let candidates = FaultSet::with_activation(&faults, Activation::Nondeterministic);
        assert_eq!(
            set.activations(&faults, candidates, Activation::Nondeterministic),
            vec![Activation::Nondeterministic, Activation::Forced, Activation::Suppressed]
        );
    }

    #[test]
    fn test_collection_queries() {
        let mut collection = FaultSetCollection::new(4);
        collection.add([0, 1].into_iter().collect());
        collection.add(FaultSet::single(2));
        collection.add(FaultSet::single(2));
        assert_eq!(collection.len(), 2);

        assert!(collection.contains_subset_of([0, 1, 3].into_iter().collect()));
        assert!(collection.contains_subset_of([2, 3].into_iter().collect()));
        assert!(!collection.contains_subset_of([0, 3].into_iter().collect()));

        assert!(collection.contains_superset_of(FaultSet::single(1)));
        assert!(collection.contains_superset_of(FaultSet::empty()));
        assert!(!collection.contains_superset_of(FaultSet::single(3)));

        // larger than any set the collection was sized for
        let wide = FaultSet::full(8);
        assert!(collection.contains_subset_of(wide));
        assert!(!collection.contains_superset_of(wide));
    }

    #[test]
    fn test_minimal_sets() {
        let mut collection = FaultSetCollection::new(3);
        collection.add([0, 1, 2].into_iter().collect());
        collection.add([0, 1].into_iter().collect());
        collection.add(FaultSet::single(2));
        collection.add([1, 2].into_iter().collect());
        let minimal = collection.minimal_sets();
        assert_eq!(minimal, vec![FaultSet::single(2), [0, 1].into_iter().collect()]);
    }
}
