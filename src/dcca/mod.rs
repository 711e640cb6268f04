//! Deductive cause-consequence analysis: minimal critical fault sets.
//!
//! A fault set is *critical* if activating (only) its faults can lead to a
//! hazard, and *safe* otherwise. Criticality is monotone: supersets of
//! critical sets are critical and subsets of safe sets are safe. The analysis
//! walks the power set of the model's faults level by level, from the empty
//! set up to the full set, and uses monotonicity to classify as many sets as
//! possible without running the invariant checker:
//!
//! - a level is generated only from the safe sets of the previous level;
//! - a set that is a subset of a known safe set is trivially safe;
//! - a set that is a superset of a known critical set is trivially critical.
//!
//! Everything else is checked by traversing the model with the set's faults
//! activated and all other nondeterministic faults suppressed.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::Instant;

use log::{debug, info, log, Level};

use crate::checker::InvariantChecker;
use crate::config::{FaultActivationBehaviour, SafetyAnalysisConfig};
use crate::counterexample::Counterexample;
use crate::error::{AnalysisError, ModelError, TraversalError};
use crate::fault_set::{FaultSet, FaultSetCollection};
use crate::formula::{Formula, StatePredicate};
use crate::model::{Activation, ExecutableModel, Fault};

mod heuristics;
mod results;

pub use heuristics::{FaultSetHeuristic, MaximalSafeSetHeuristic};
pub use results::{SafetyAnalysisResults, SetOutcome};

/// Computes minimal critical fault sets for a hazard.
///
/// # Examples
///
/// ```no_run
/// # use safety_rs::model::ExecutableModel;
/// # fn run<M: ExecutableModel>(factory: impl Fn() -> M + Sync) -> Result<(), safety_rs::error::AnalysisError> {
/// use safety_rs::config::SafetyAnalysisConfig;
/// use safety_rs::dcca::SafetyAnalysis;
/// use safety_rs::formula::Formula;
///
/// let config = SafetyAnalysisConfig {
///     max_cardinality: Some(3),
///     ..SafetyAnalysisConfig::default()
/// };
/// let mut analysis = SafetyAnalysis::new(config);
/// let results = analysis.compute_minimal_critical_sets(&factory, &Formula::atom("overflow"))?;
/// println!("{}", results);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SafetyAnalysis {
    pub config: SafetyAnalysisConfig,
    pub heuristics: Vec<Box<dyn FaultSetHeuristic>>,
}

impl SafetyAnalysis {
    pub fn new(config: SafetyAnalysisConfig) -> Self {
        Self {
            config,
            heuristics: Vec::new(),
        }
    }

    pub fn with_heuristic(mut self, heuristic: impl FaultSetHeuristic + 'static) -> Self {
        self.heuristics.push(Box::new(heuristic));
        self
    }

    pub fn compute_minimal_critical_sets<M, F>(
        &mut self,
        factory: &F,
        hazard: &Formula,
    ) -> Result<SafetyAnalysisResults, AnalysisError>
    where
        M: ExecutableModel,
        F: Fn() -> M + Sync,
    {
        info!("Running Deductive Cause Consequence Analysis for hazard {}", hazard);
        let start = Instant::now();

        let model = factory();
        let faults = model.faults();
        if faults.len() > FaultSet::MAX_FAULTS {
            return Err(AnalysisError::TooManyFaults(faults.len()));
        }
        let invariant = hazard.clone().not();
        StatePredicate::compile(&invariant, &model.atomic_propositions())?;
        drop(model);

        let forced = FaultSet::with_activation(&faults, Activation::Forced);
        let suppressed = FaultSet::with_activation(&faults, Activation::Suppressed);
        let mut search = Search {
            checker: InvariantChecker::new(factory, self.config.traversal.clone()),
            invariant,
            all: FaultSet::full(faults.len()),
            behaviour: self.config.fault_activation_behaviour,
            nondeterministic: FaultSet::with_activation(&faults, Activation::Nondeterministic),
            forced,
            suppressed,
            safe_sets: FaultSetCollection::new(faults.len()),
            critical_sets: FaultSetCollection::new(faults.len()),
            checked_sets: BTreeSet::new(),
            counterexamples: HashMap::new(),
            exceptions: HashMap::new(),
            results: SafetyAnalysisResults::new(faults.clone(), forced, suppressed, self.heuristics.len()),
            faults,
        };

        let fault_count = search.faults.len();
        let mut current_safe = BTreeSet::new();
        for cardinality in 0..=fault_count {
            let mut sets = generate_power_set_level(cardinality, fault_count, &mut current_safe);
            current_safe.clear();

            sets.retain(|&set| {
                let invalid = search.is_invalid(set);
                if invalid {
                    current_safe.insert(set);
                }
                !invalid
            });
            if sets.is_empty() {
                continue;
            }

            if self.config.max_cardinality.is_some_and(|max| cardinality > max) {
                search.results.is_complete = false;
                break;
            }

            if cardinality == 0 {
                info!("Checking the empty fault set...");
            } else {
                info!("Checking {} sets of cardinality {}...", sets.len(), cardinality);
            }

            let mut sets_to_check: VecDeque<FaultSet> = sets.iter().copied().collect();
            for heuristic in &mut self.heuristics {
                heuristic.augment(cardinality, &mut sets_to_check);
            }

            while let Some(set) = sets_to_check.pop_front() {
                let is_current_level = sets.remove(&set);
                if !is_current_level && search.is_invalid(set) {
                    debug!("    Ignoring suggested set {} that can never be activated", set);
                    continue;
                }

                let is_safe = search.check_set(set, cardinality)?;
                if is_safe && is_current_level {
                    current_safe.insert(set);
                }

                for heuristic in &mut self.heuristics {
                    heuristic.update(&mut sets_to_check, set, is_safe);
                }
            }

            // sets a heuristic removed from the queue
            for set in sets {
                if search.check_set(set, cardinality)? {
                    current_safe.insert(set);
                }
            }
        }

        let mut results = search.finish();
        results.elapsed = start.elapsed();
        info!(
            "Found {} minimal critical sets after checking {} fault sets in {:.2?}",
            results.minimal_critical_sets.len(),
            results.checked_sets.len(),
            results.elapsed
        );
        Ok(results)
    }
}

/// Fault sets of the given cardinality that may still be safe.
///
/// Level `k` extends the safe sets of level `k - 1` by one fault each. A
/// candidate is dropped as soon as one of its direct subsets is not among the
/// previous safe sets; `previous_safe` is consumed in the process.
fn generate_power_set_level(
    cardinality: usize,
    fault_count: usize,
    previous_safe: &mut BTreeSet<FaultSet>,
) -> BTreeSet<FaultSet> {
    let mut result = BTreeSet::new();
    match cardinality {
        0 => {
            result.insert(FaultSet::empty());
        }
        1 => {
            if !previous_safe.is_empty() {
                result.extend((0..fault_count).map(FaultSet::single));
            }
        }
        _ => {
            for fault in 0..fault_count {
                let mut exhausted = Vec::new();
                for &safe in previous_safe.iter() {
                    if safe.contains(fault) {
                        exhausted.push(safe);
                        continue;
                    }
                    let set = safe.insert(fault);
                    let trivially_critical =
                        (fault + 1..fault_count).any(|j| set.contains(j) && !previous_safe.contains(&set.remove(j)));
                    if !trivially_critical {
                        result.insert(set);
                    }
                }
                for set in exhausted {
                    previous_safe.remove(&set);
                }
                if previous_safe.is_empty() {
                    break;
                }
            }
        }
    }
    result
}

/// Verdicts on heuristic suggestions only show up in debug logs.
fn report_level(is_heuristic: bool, level: Level) -> Level {
    if is_heuristic {
        Level::Debug
    } else {
        level
    }
}

/// State of one analysis run.
struct Search<'f, F> {
    checker: InvariantChecker<'f, F>,
    invariant: Formula,
    /// Every fault of the model
    all: FaultSet,
    behaviour: FaultActivationBehaviour,
    faults: Vec<Fault>,
    nondeterministic: FaultSet,
    forced: FaultSet,
    suppressed: FaultSet,
    safe_sets: FaultSetCollection,
    critical_sets: FaultSetCollection,
    checked_sets: BTreeSet<FaultSet>,
    counterexamples: HashMap<FaultSet, Counterexample>,
    exceptions: HashMap<FaultSet, ModelError>,
    results: SafetyAnalysisResults,
}

impl<'f, M, F> Search<'f, F>
where
    M: ExecutableModel,
    F: Fn() -> M + Sync,
{
    /// A set conflicts with the faults the model forces or suppresses, or
    /// names faults the model does not have.
    fn is_invalid(&self, set: FaultSet) -> bool {
        !self.forced.is_subset_of(set) || set.intersects(self.suppressed) || !set.is_subset_of(self.all)
    }

    fn check_set(&mut self, set: FaultSet, cardinality: usize) -> Result<bool, AnalysisError> {
        let is_heuristic = set.cardinality() != cardinality;
        if is_heuristic {
            self.results.heuristic_suggestion_count += 1;
        }

        let trivially_safe = self.safe_sets.contains_superset_of(set);
        if trivially_safe || self.critical_sets.contains_subset_of(set) {
            self.results.trivial_checks_count += 1;
            if is_heuristic {
                self.results.heuristic_trivial_count += 1;
            }
            return Ok(trivially_safe);
        }

        let mut is_safe = true;
        if matches!(
            self.behaviour,
            FaultActivationBehaviour::ForceOnly | FaultActivationBehaviour::ForceThenFallback
        ) {
            is_safe = self.check_with(set, Activation::Forced, is_heuristic)?;
        }
        if is_safe && self.behaviour == FaultActivationBehaviour::ForceThenFallback {
            debug!("    Checking again with nondeterministic activation...");
        }
        if is_safe && self.behaviour != FaultActivationBehaviour::ForceOnly {
            is_safe = self.check_with(set, Activation::Nondeterministic, is_heuristic)?;
        }

        if is_safe {
            self.safe_sets.add(set);
            if is_heuristic {
                self.results.heuristic_non_trivial_safe_count += 1;
            }
        }
        Ok(is_safe)
    }

    fn check_with(&mut self, set: FaultSet, mode: Activation, is_heuristic: bool) -> Result<bool, AnalysisError> {
        let activations = set.activations(&self.faults, self.nondeterministic, mode);
        let names = set.to_names(&self.faults);
        let tag = if is_heuristic { "[heuristic] " } else { "" };

        let set_names = || set.names(&self.faults).map(String::from).collect::<Vec<_>>();
        match self.checker.check(&self.invariant, Some(activations.clone())) {
            Ok(result) => {
                if !result.holds {
                    log!(report_level(is_heuristic, Level::Info), "    {}critical:  {{ {} }}", tag, names);
                    self.critical_sets.add(set);
                } else if is_heuristic {
                    debug!("    {}safe:  {{ {} }}", tag, names);
                }
                self.checked_sets.insert(set);
                if let Some(mut counterexample) = result.counterexample {
                    counterexample.fault_set = set_names();
                    self.counterexamples.insert(set, counterexample);
                }
                Ok(result.holds)
            }
            Err(TraversalError::Model { origin, trace, source }) => {
                log!(
                    report_level(is_heuristic, Level::Warn),
                    "    {}critical:  {{ {} }} [exception thrown in {}: {}]",
                    tag,
                    names,
                    origin,
                    source
                );
                self.checked_sets.insert(set);
                self.critical_sets.add(set);
                if !trace.is_empty() {
                    let counterexample =
                        Counterexample::new(&self.invariant, set_names(), &self.faults, &activations, trace);
                    self.counterexamples.insert(set, counterexample);
                }
                self.exceptions.insert(set, source);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Keeps only the minimal critical sets and their artifacts.
    fn finish(mut self) -> SafetyAnalysisResults {
        let minimal = self.critical_sets.minimal_sets();
        self.counterexamples.retain(|set, _| minimal.contains(set));
        self.exceptions.retain(|set, _| minimal.contains(set));

        let mut results = self.results;
        results.minimal_critical_sets = minimal;
        results.minimal_critical_sets.sort();
        results.checked_sets = self.checked_sets.into_iter().collect();
        results.counterexamples = self.counterexamples;
        results.exceptions = self.exceptions;
        results
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn level(cardinality: usize, fault_count: usize, safe: &[&[usize]]) -> Vec<Vec<usize>> {
        let mut previous: BTreeSet<FaultSet> = safe.iter().map(|s| s.iter().copied().collect()).collect();
        generate_power_set_level(cardinality, fault_count, &mut previous)
            .into_iter()
            .map(|s| s.iter().collect())
            .collect()
    }

    #[test]
    fn test_heuristic_verdicts_are_debug_only() {
        assert_eq!(report_level(false, Level::Info), Level::Info);
        assert_eq!(report_level(false, Level::Warn), Level::Warn);
        assert_eq!(report_level(true, Level::Info), Level::Debug);
        assert_eq!(report_level(true, Level::Warn), Level::Debug);
    }

    #[test]
    fn test_first_levels() {
        assert_eq!(level(0, 3, &[]), vec![Vec::<usize>::new()]);
        assert_eq!(level(1, 3, &[&[]]), vec![vec![0], vec![1], vec![2]]);
        assert!(level(1, 3, &[]).is_empty());
    }

    #[test]
    fn test_requires_all_direct_subsets_safe() {
        // {0}, {1}, {2} safe: all pairs
        assert_eq!(level(2, 3, &[&[0], &[1], &[2]]), vec![vec![0, 1], vec![0, 2], vec![1, 2]]);
        // {1} critical: no pair containing 1
        assert_eq!(level(2, 3, &[&[0], &[2]]), vec![vec![0, 2]]);
        // {0, 1} and {0, 2} safe, {1, 2} critical: {0, 1, 2} is skipped
        assert!(level(3, 3, &[&[0, 1], &[0, 2]]).is_empty());
        assert_eq!(level(3, 3, &[&[0, 1], &[0, 2], &[1, 2]]), vec![vec![0, 1, 2]]);
    }
}
