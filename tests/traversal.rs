mod common;

use test_log::test;

use safety_rs::config::TraversalConfig;
use safety_rs::error::{CapacityKind, TraversalError};
use safety_rs::formula::Formula;
use safety_rs::generator::{generate_state_graph, GeneratorOptions};
use safety_rs::model::ExecutableModel;
use safety_rs::traversal::{traverse, TraversalParameters, TraversalSummary};

use common::{config, CounterModel, OffsetModel};

#[test]
fn test_traversal_is_deterministic() {
    let factory = || CounterModel::new(7, true);
    let first = traverse(&factory, &config(), &TraversalParameters::new()).unwrap();
    let second = traverse(&factory, &config(), &TraversalParameters::new()).unwrap();
    assert_eq!(
        first.summary(),
        TraversalSummary {
            state_count: 7,
            transition_count: 8,
        }
    );
    assert_eq!(first.summary(), second.summary());
    assert!(!first.is_stopped());
    assert_eq!(first.proposition_names(), ["zero", "half", "max"]);
}

#[test]
fn test_worker_count_does_not_change_the_state_space() {
    let factory = || OffsetModel::new(&[1, 2, 3]);
    let summaries: Vec<_> = [1, 2, 4]
        .into_iter()
        .map(|cpu_count| {
            let config = TraversalConfig { cpu_count, ..config() };
            traverse(&factory, &config, &TraversalParameters::new()).unwrap().summary()
        })
        .collect();
    assert!(summaries.windows(2).all(|w| w[0] == w[1]));
    // initial state plus one updated state per distinct sum 3..=9
    assert_eq!(summaries[0].state_count, 8);
}

#[test]
fn test_serialization_round_trip() {
    let factory = || OffsetModel::new(&[1, 1]);
    let state_space = traverse(&factory, &config(), &TraversalParameters::new()).unwrap();
    let mut model = factory();
    for index in 0..state_space.state_count() as u32 {
        let state = state_space.model_state(index).unwrap();
        model.deserialize(state);
        assert_eq!(model.serialize_to_vec(), state);
    }
}

#[test]
fn test_state_capacity_exhaustion() {
    let factory = || CounterModel::new(10, true);
    let config = TraversalConfig {
        state_capacity: 4,
        ..config()
    };
    let err = traverse(&factory, &config, &TraversalParameters::new()).unwrap_err();
    match err {
        TraversalError::Capacity(e) => assert_eq!(e.kind, CapacityKind::States),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_transition_capacity_exhaustion() {
    let factory = || CounterModel::new(10, true);
    let config = TraversalConfig {
        transition_capacity: 5,
        ..config()
    };
    let err = traverse(&factory, &config, &TraversalParameters::new()).unwrap_err();
    assert!(matches!(err, TraversalError::Capacity(e) if e.kind == CapacityKind::Transitions));
}

#[test]
fn test_early_termination() {
    let factory = || CounterModel::new(10, true);
    let options = GeneratorOptions {
        terminate_early: Some(Formula::atom("half")),
        ..GeneratorOptions::default()
    };
    let graph = generate_state_graph(&factory, &config(), &options).unwrap();
    // 0..=4, plus the stuttering state that replaces 5
    assert_eq!(graph.state_count(), 6);

    let options = GeneratorOptions {
        terminate_early: Some(Formula::atom("half").finally()),
        ..GeneratorOptions::default()
    };
    let err = generate_state_graph(&factory, &config(), &options).unwrap_err();
    assert!(matches!(err, TraversalError::Formula(_)));
}
