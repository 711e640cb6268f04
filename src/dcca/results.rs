use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use log::info;
use num_bigint::BigUint;

use crate::counterexample::Counterexample;
use crate::error::{CounterexampleError, ModelError};
use crate::fault_set::FaultSet;
use crate::model::Fault;
use crate::utils::join_sorted;

/// Classification of a fault set by a finished analysis.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SetOutcome {
    /// No minimal critical set is contained in the set.
    Safe,
    /// The set contains a minimal critical set that violated the invariant.
    Critical,
    /// The set contains a minimal critical set whose check raised a model error.
    CriticalByException,
}

/// The outcome of a deductive cause-consequence analysis.
#[derive(Debug, Clone)]
pub struct SafetyAnalysisResults {
    pub faults: Vec<Fault>,
    pub forced_faults: FaultSet,
    pub suppressed_faults: FaultSet,
    /// Critical sets without a critical proper subset, in ascending order.
    pub minimal_critical_sets: Vec<FaultSet>,
    /// Every set whose check required a traversal, in ascending order.
    pub checked_sets: Vec<FaultSet>,
    /// Counterexamples of the minimal critical sets.
    pub counterexamples: HashMap<FaultSet, Counterexample>,
    /// Model errors raised while checking minimal critical sets.
    pub exceptions: HashMap<FaultSet, ModelError>,
    /// False if a maximum cardinality cut the search short.
    pub is_complete: bool,
    pub elapsed: Duration,
    /// Number of heuristics taking part in the analysis.
    pub heuristic_count: usize,
    pub heuristic_suggestion_count: usize,
    pub heuristic_non_trivial_safe_count: usize,
    pub heuristic_trivial_count: usize,
    pub trivial_checks_count: usize,
}

impl SafetyAnalysisResults {
    pub(crate) fn new(faults: Vec<Fault>, forced_faults: FaultSet, suppressed_faults: FaultSet, heuristic_count: usize) -> Self {
        Self {
            faults,
            forced_faults,
            suppressed_faults,
            minimal_critical_sets: Vec::new(),
            checked_sets: Vec::new(),
            counterexamples: HashMap::new(),
            exceptions: HashMap::new(),
            is_complete: true,
            elapsed: Duration::ZERO,
            heuristic_count,
            heuristic_suggestion_count: 0,
            heuristic_non_trivial_safe_count: 0,
            heuristic_trivial_count: 0,
            trivial_checks_count: 0,
        }
    }

    /// Names of the faults in `set`, in fault order.
    pub fn fault_names(&self, set: FaultSet) -> Vec<&str> {
        set.names(&self.faults).collect()
    }

    /// Looks up a fault set by fault names.
    pub fn fault_set<'n>(&self, names: impl IntoIterator<Item = &'n str>) -> Option<FaultSet> {
        names
            .into_iter()
            .map(|name| self.faults.iter().position(|f| f.name == name))
            .collect::<Option<Vec<_>>>()
            .map(|indices| indices.into_iter().collect())
    }

    pub fn outcome(&self, set: FaultSet) -> SetOutcome {
        let mut outcome = SetOutcome::Safe;
        for critical in self.minimal_critical_sets.iter().filter(|c| c.is_subset_of(set)) {
            if !self.exceptions.contains_key(critical) {
                return SetOutcome::Critical;
            }
            outcome = SetOutcome::CriticalByException;
        }
        outcome
    }

    /// Writes every counterexample to `directory` as `<fault names>.json`.
    ///
    /// Files already in the directory are removed first; the counterexample of
    /// the empty set is written to `emptyset.json`.
    pub fn save_counterexamples(&self, directory: impl AsRef<Path>) -> Result<(), CounterexampleError> {
        let directory = directory.as_ref();
        if directory.exists() {
            let entries = fs::read_dir(directory).map_err(|e| CounterexampleError::io(directory, e))?;
            for entry in entries {
                let path = entry.map_err(|e| CounterexampleError::io(directory, e))?.path();
                if path.is_file() {
                    fs::remove_file(&path).map_err(|e| CounterexampleError::io(&path, e))?;
                }
            }
        } else {
            fs::create_dir_all(directory).map_err(|e| CounterexampleError::io(directory, e))?;
        }

        for (set, counterexample) in &self.counterexamples {
            let mut name = self.fault_names(*set).join("_");
            if name.is_empty() {
                name = "emptyset".to_string();
            }
            counterexample.save(directory.join(format!("{}.json", name)))?;
        }
        info!("Saved {} counterexamples to {}", self.counterexamples.len(), directory.display());
        Ok(())
    }
}

fn percentage(part: usize, whole: usize) -> usize {
    (part * 200 + whole) / (whole * 2)
}

impl fmt::Display for SafetyAnalysisResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |set: FaultSet| join_sorted(set.names(&self.faults));

        // 2^N does not fit into a machine word for 64 faults
        let total = BigUint::from(1u8) << self.faults.len();
        let checked_percentage = (BigUint::from(self.checked_sets.len()) * 200u32 + &total) / (&total * 2u32);

        writeln!(f)?;
        writeln!(f, "=======================================================================")?;
        writeln!(f, "=======      Deductive Cause Consequence Analysis: Results      =======")?;
        writeln!(f, "=======================================================================")?;
        writeln!(f)?;

        if !self.exceptions.is_empty() {
            writeln!(f, "*** Warning: Unhandled exceptions have been thrown during the analysis. ***")?;
            writeln!(f)?;
        }
        if !self.is_complete {
            writeln!(f, "*** Warning: Analysis might be incomplete; not all fault sets have been checked. ***")?;
            writeln!(f)?;
        }

        writeln!(f, "Elapsed Time: {:.2?}", self.elapsed)?;
        writeln!(f, "Fault Count: {}", self.faults.len())?;
        writeln!(f, "Faults: {}", names(FaultSet::full(self.faults.len())))?;
        if !self.forced_faults.is_empty() {
            writeln!(f, "Forced Faults: {}", names(self.forced_faults))?;
        }
        if !self.suppressed_faults.is_empty() {
            writeln!(f, "Suppressed Faults: {}", names(self.suppressed_faults))?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "Checked Fault Sets: {} ({}% of all fault sets)",
            self.checked_sets.len(),
            checked_percentage
        )?;
        writeln!(f, "Minimal Critical Sets: {}", self.minimal_critical_sets.len())?;
        writeln!(f)?;

        for (i, set) in self.minimal_critical_sets.iter().enumerate() {
            writeln!(f, "   ({}) {{ {} }}", i + 1, names(*set))?;
            if let Some(error) = self.exceptions.get(set) {
                writeln!(f, "    An unhandled exception was thrown while checking the fault set: {}", error)?;
            }
        }

        if self.heuristic_count > 0 {
            writeln!(f)?;
            let suggested = self.heuristic_suggestion_count;
            if suggested == 0 {
                writeln!(f, "No suggestions were made by the heuristics.")?;
            } else {
                let trivial = self.heuristic_trivial_count;
                let safe = self.heuristic_non_trivial_safe_count;
                let critical = suggested - safe - trivial;
                writeln!(f, "Of {} fault sets suggested by {} heuristics", suggested, self.heuristic_count)?;
                writeln!(
                    f,
                    "    {} ({}%) were trivially safe or trivially critical,",
                    trivial,
                    percentage(trivial, suggested)
                )?;
                writeln!(f, "    {} ({}%) were non-trivially safe, and", safe, percentage(safe, suggested))?;
                writeln!(
                    f,
                    "    {} ({}%) were non-trivially critical.",
                    critical,
                    percentage(critical, suggested)
                )?;
                writeln!(f, "In total, {} trivial checks were performed.", self.trivial_checks_count)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::model::Activation;

    fn results() -> SafetyAnalysisResults {
        let faults = vec![
            Fault::new("Valve"),
            Fault::new("Pump"),
            Fault::new("Sensor").with_activation(Activation::Suppressed),
        ];
        let mut results = SafetyAnalysisResults::new(faults, FaultSet::empty(), FaultSet::single(2), 0);
        results.checked_sets = vec![FaultSet::empty(), FaultSet::single(0), FaultSet::single(1)];
        results.minimal_critical_sets = vec![FaultSet::single(0), FaultSet::single(1)];
        results.exceptions.insert(FaultSet::single(1), ModelError::new("pump exploded"));
        results
    }

    #[test]
    fn test_outcome() {
        let results = results();
        assert_eq!(results.outcome(FaultSet::empty()), SetOutcome::Safe);
        assert_eq!(results.outcome(FaultSet::single(0)), SetOutcome::Critical);
        assert_eq!(results.outcome(FaultSet::single(1)), SetOutcome::CriticalByException);
        assert_eq!(results.outcome(FaultSet::single(0).insert(1)), SetOutcome::Critical);
        assert_eq!(results.fault_set(["Pump", "Valve"]), Some(FaultSet::single(0).insert(1)));
        assert_eq!(results.fault_set(["Pipe"]), None);
    }

    #[test]
    fn test_report() {
        let report = results().to_string();
        assert!(report.contains("Deductive Cause Consequence Analysis: Results"));
        assert!(report.contains("*** Warning: Unhandled exceptions have been thrown during the analysis. ***"));
        assert!(!report.contains("incomplete"));
        assert!(report.contains("Faults: Pump, Sensor, Valve\n"));
        assert!(report.contains("Suppressed Faults: Sensor\n"));
        // 3 of 8
        assert!(report.contains("Checked Fault Sets: 3 (38% of all fault sets)"));
        assert!(report.contains("   (1) { Valve }\n"));
        assert!(report.contains("   (2) { Pump }\n    An unhandled exception was thrown while checking the fault set: pump exploded\n"));
        assert!(!report.contains("heuristics"));
    }

    #[test]
    fn test_heuristic_summary() {
        let mut results = results();
        results.heuristic_count = 1;
        assert!(results.to_string().contains("No suggestions were made by the heuristics."));

        results.heuristic_suggestion_count = 4;
        results.heuristic_trivial_count = 2;
        results.heuristic_non_trivial_safe_count = 1;
        results.trivial_checks_count = 5;
        let report = results.to_string();
        assert!(report.contains("Of 4 fault sets suggested by 1 heuristics\n"));
        assert!(report.contains("    2 (50%) were trivially safe or trivially critical,\n"));
        assert!(report.contains("    1 (25%) were non-trivially safe, and\n"));
        assert!(report.contains("    1 (25%) were non-trivially critical.\n"));
        assert!(report.contains("In total, 5 trivial checks were performed."));
    }

    #[test]
    fn test_save_counterexamples() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stale.json"), "{}").unwrap();

        let mut results = results();
        for set in [FaultSet::empty(), FaultSet::single(0).insert(1)] {
            let ce = Counterexample::new("safe", vec![], &results.faults, &[], vec![]);
            results.counterexamples.insert(set, ce);
        }
        results.save_counterexamples(dir.path()).unwrap();

        let mut files: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        files.sort();
        assert_eq!(files, vec!["Valve_Pump.json", "emptyset.json"]);
    }
}
