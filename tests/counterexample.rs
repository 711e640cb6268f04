mod common;

use test_log::test;

use safety_rs::config::SafetyAnalysisConfig;
use safety_rs::counterexample::{Counterexample, Simulator};
use safety_rs::dcca::SafetyAnalysis;
use safety_rs::error::CounterexampleError;
use safety_rs::formula::Formula;
use safety_rs::model::{Activation, ExecutableModel};

use common::{config, OffsetModel};

fn analyze(factory: &(impl Fn() -> OffsetModel + Sync)) -> safety_rs::dcca::SafetyAnalysisResults {
    let mut analysis = SafetyAnalysis::new(SafetyAnalysisConfig {
        traversal: config(),
        ..SafetyAnalysisConfig::default()
    });
    analysis
        .compute_minimal_critical_sets(factory, &Formula::atom("hazard"))
        .unwrap()
}

#[test]
fn test_saved_counterexamples_replay() {
    let factory = || OffsetModel::new(&[1, 1, 1]);
    let results = analyze(&factory);

    let dir = tempfile::tempdir().unwrap();
    results.save_counterexamples(dir.path()).unwrap();

    let mut names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["F1_F2.json", "F1_F3.json", "F2_F3.json"]);

    let loaded = Counterexample::load(dir.path().join("F1_F3.json")).unwrap();
    let set = results.fault_set(["F1", "F3"]).unwrap();
    assert_eq!(&loaded, &results.counterexamples[&set]);
    assert_eq!(loaded.fault_set, vec!["F1".to_string(), "F3".to_string()]);
    assert_eq!(
        loaded.fault_activations,
        vec![
            ("F1".to_string(), Activation::Nondeterministic),
            ("F2".to_string(), Activation::Suppressed),
            ("F3".to_string(), Activation::Nondeterministic),
        ]
    );

    let mut simulator = Simulator::new(factory(), &loaded).unwrap();
    let first = simulator.simulate_step().unwrap();
    assert_eq!(first, [0, 0]);
    assert_eq!(simulator.replay().unwrap(), loaded.step_count() - 1);
    assert!(simulator.is_completed());
    assert!(simulator.model().evaluate_atomic_proposition(0));
    assert!(matches!(simulator.simulate_step(), Err(CounterexampleError::Completed)));
}

#[test]
fn test_replay_detects_divergence() {
    let factory = || OffsetModel::new(&[1, 1, 1]);
    let results = analyze(&factory);
    let set = results.fault_set(["F1", "F2"]).unwrap();
    let mut counterexample = results.counterexamples[&set].clone();

    // with a different fault set active, the recorded step is impossible
    for (name, activation) in &mut counterexample.fault_activations {
        *activation = if name == "F3" {
            Activation::Forced
        } else {
            Activation::Suppressed
        };
    }
    let mut simulator = Simulator::new(factory(), &counterexample).unwrap();
    let err = simulator.replay().unwrap_err();
    assert!(matches!(err, CounterexampleError::NotASuccessor { step: 1 }), "{}", err);

    counterexample.fault_activations.push(("F9".to_string(), Activation::Forced));
    let err = Simulator::new(factory(), &counterexample).err().unwrap();
    assert!(matches!(err, CounterexampleError::UnknownFault(name) if name == "F9"));
}
