use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::fault_set::FaultSet;
use crate::model::{Activation, Fault};

/// Suggests additional fault sets to the safety analysis.
///
/// Suggestions never change the result; they only decide which sets get
/// checked first, so that later sets can be classified trivially.
pub trait FaultSetHeuristic {
    /// Called once per cardinality level before any set of the level is
    /// checked. Suggestions are pushed to the front of `sets_to_check`.
    fn augment(&mut self, cardinality: usize, sets_to_check: &mut VecDeque<FaultSet>);

    /// Called after every checked set, suggested or not. Suggestions that
    /// conflict with the forced or suppressed faults are dropped without an
    /// update.
    fn update(&mut self, sets_to_check: &mut VecDeque<FaultSet>, checked: FaultSet, is_safe: bool);
}

/// A shared heuristic, so that its state can be inspected after the analysis.
impl<H: FaultSetHeuristic + ?Sized> FaultSetHeuristic for Arc<Mutex<H>> {
    fn augment(&mut self, cardinality: usize, sets_to_check: &mut VecDeque<FaultSet>) {
        self.lock().augment(cardinality, sets_to_check)
    }

    fn update(&mut self, sets_to_check: &mut VecDeque<FaultSet>, checked: FaultSet, is_safe: bool) {
        self.lock().update(sets_to_check, checked, is_safe)
    }
}

/// Top-down search for a large safe fault set.
///
/// Starts by suggesting the set of all faults that are not suppressed.
/// Whenever a suggested set turns out to be critical, its direct subsets that
/// still contain every forced fault are suggested next, until a safe set is
/// found or the suggestion budget is exhausted. A safe set found this way makes
/// all its subsets trivially safe.
#[derive(Debug, Clone)]
pub struct MaximalSafeSetHeuristic {
    candidates: FaultSet,
    forced: FaultSet,
    budget: usize,
    pending: HashSet<FaultSet>,
    level: usize,
    started: bool,
    found: Option<FaultSet>,
}

impl MaximalSafeSetHeuristic {
    pub const DEFAULT_BUDGET: usize = 128;

    pub fn new(faults: &[Fault]) -> Self {
        Self::with_budget(faults, Self::DEFAULT_BUDGET)
    }

    pub fn with_budget(faults: &[Fault], budget: usize) -> Self {
        let forced = FaultSet::with_activation(faults, Activation::Forced);
        Self {
            candidates: FaultSet::with_activation(faults, Activation::Nondeterministic).union(forced),
            forced,
            budget,
            pending: HashSet::new(),
            level: 0,
            started: false,
            found: None,
        }
    }

    /// The safe set found by the search, if any.
    pub fn found(&self) -> Option<FaultSet> {
        self.found
    }

    fn suggest(&mut self, set: FaultSet, sets_to_check: &mut VecDeque<FaultSet>) {
        if self.budget == 0 || set.cardinality() <= self.level || !self.pending.insert(set) {
            return;
        }
        self.budget -= 1;
        sets_to_check.push_front(set);
    }
}

impl FaultSetHeuristic for MaximalSafeSetHeuristic {
    fn augment(&mut self, cardinality: usize, sets_to_check: &mut VecDeque<FaultSet>) {
        self.level = cardinality;
        // The empty set is checked on its own; start once it turned out safe.
        if !self.started && cardinality > 0 {
            self.started = true;
            self.suggest(self.candidates, sets_to_check);
        }
    }

    fn update(&mut self, sets_to_check: &mut VecDeque<FaultSet>, checked: FaultSet, is_safe: bool) {
        if !self.pending.remove(&checked) || self.found.is_some() {
            return;
        }
        if is_safe {
            debug!("Maximal safe set heuristic found safe set {}", checked);
            self.found = Some(checked);
            return;
        }
        for fault in checked.difference(self.forced).iter() {
            self.suggest(checked.remove(fault), sets_to_check);
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_descends_on_critical_sets() {
        let faults = vec![
            Fault::new("A"),
            Fault::new("B"),
            Fault::new("C"),
            Fault::new("D").with_activation(Activation::Suppressed),
        ];
        let mut heuristic = MaximalSafeSetHeuristic::new(&faults);
        let mut queue = VecDeque::new();

        heuristic.augment(0, &mut queue);
        assert!(queue.is_empty());

        heuristic.augment(1, &mut queue);
        let all: FaultSet = [0, 1, 2].into_iter().collect();
        assert_eq!(queue, VecDeque::from([all]));

        queue.pop_front();
        heuristic.update(&mut queue, all, false);
        assert_eq!(queue.len(), 3);
        assert!(queue.iter().all(|s| s.cardinality() == 2));

        let ab: FaultSet = [0, 1].into_iter().collect();
        heuristic.update(&mut queue, ab, true);
        assert_eq!(heuristic.found(), Some(ab));

        // sets not suggested by the heuristic are ignored
        let before = queue.len();
        heuristic.update(&mut queue, FaultSet::single(2), false);
        assert_eq!(queue.len(), before);
    }

    #[test]
    fn test_keeps_forced_faults() {
        let faults = vec![
            Fault::new("A").with_activation(Activation::Forced),
            Fault::new("B"),
            Fault::new("C"),
        ];
        let mut heuristic = MaximalSafeSetHeuristic::new(&faults);
        let mut queue = VecDeque::new();

        heuristic.augment(1, &mut queue);
        let all: FaultSet = [0, 1, 2].into_iter().collect();
        assert_eq!(queue, VecDeque::from([all]));

        queue.clear();
        heuristic.update(&mut queue, all, false);
        let mut suggested: Vec<_> = queue.into_iter().collect();
        suggested.sort();
        let ab: FaultSet = [0, 1].into_iter().collect();
        let ac: FaultSet = [0, 2].into_iter().collect();
        assert_eq!(suggested, vec![ab, ac]);
    }

    #[test]
    fn test_respects_budget() {
        let faults: Vec<_> = ["A", "B", "C"].into_iter().map(Fault::new).collect();
        let mut heuristic = MaximalSafeSetHeuristic::with_budget(&faults, 2);
        let mut queue = VecDeque::new();
        heuristic.augment(1, &mut queue);
        let all = queue.pop_front().unwrap();
        heuristic.update(&mut queue, all, false);
        assert_eq!(queue.len(), 1);
    }
}
