#![allow(dead_code)]

use safety_rs::config::TraversalConfig;
use safety_rs::error::ModelError;
use safety_rs::model::{Activation, CandidateTransition, ExecutableModel, Fault};

pub fn config() -> TraversalConfig {
    TraversalConfig {
        state_capacity: 1 << 10,
        transition_capacity: 1 << 12,
        cpu_count: 2,
        progress_reports: 0,
    }
}

/// Whether a fault may be active in a branch: forced faults always are,
/// suppressed faults never, nondeterministic faults both ways.
fn choices(activation: Activation) -> &'static [bool] {
    match activation {
        Activation::Forced => &[true],
        Activation::Suppressed => &[false],
        Activation::Nondeterministic => &[false, true],
    }
}

/// All combinations of fault activity permitted by `activations`.
fn combinations(activations: &[Activation]) -> Vec<Vec<bool>> {
    let mut result = vec![vec![]];
    for &activation in activations {
        result = result
            .into_iter()
            .flat_map(|prefix| {
                choices(activation).iter().map(move |&active| {
                    let mut next = prefix.clone();
                    next.push(active);
                    next
                })
            })
            .collect();
    }
    result
}

/// A component computing `X = 3 + sum of the offsets of active faults` in a
/// single update; the hazard is `X > 4`.
pub struct OffsetModel {
    faults: Vec<Fault>,
    offsets: Vec<u8>,
    updated: bool,
    x: u8,
    candidates: Vec<CandidateTransition>,
}

impl OffsetModel {
    pub const BASE: u8 = 3;
    pub const THRESHOLD: u8 = 4;

    /// Faults are named `F1`, `F2`, ... in offset order.
    pub fn new(offsets: &[u8]) -> Self {
        Self {
            faults: (1..=offsets.len()).map(|i| Fault::new(format!("F{}", i))).collect(),
            offsets: offsets.to_vec(),
            updated: false,
            x: 0,
            candidates: Vec::new(),
        }
    }

    pub fn with_activation(mut self, name: &str, activation: Activation) -> Self {
        for fault in self.faults.iter_mut().filter(|f| f.name == name) {
            fault.activation = activation;
        }
        self
    }

    fn push(&mut self, updated: bool, x: u8) {
        self.candidates
            .push(CandidateTransition::nondeterministic(vec![updated as u8, x]));
    }
}

impl ExecutableModel for OffsetModel {
    fn state_vector_size(&self) -> usize {
        2
    }

    fn serialize(&self, buffer: &mut [u8]) {
        buffer[0] = self.updated as u8;
        buffer[1] = self.x;
    }

    fn deserialize(&mut self, buffer: &[u8]) {
        self.updated = buffer[0] != 0;
        self.x = buffer[1];
    }

    fn execute_initial_step(&mut self) -> Result<(), ModelError> {
        self.push(false, 0);
        Ok(())
    }

    fn execute_step(&mut self) -> Result<(), ModelError> {
        if self.updated {
            self.push(true, self.x);
            return Ok(());
        }
        let activations: Vec<_> = self.faults.iter().map(|f| f.activation).collect();
        for active in combinations(&activations) {
            let x = Self::BASE
                + active
                    .iter()
                    .zip(&self.offsets)
                    .filter(|(a, _)| **a)
                    .map(|(_, &o)| o)
                    .sum::<u8>();
            self.push(true, x);
        }
        Ok(())
    }

    fn candidate_transitions(&mut self) -> Vec<CandidateTransition> {
        std::mem::take(&mut self.candidates)
    }

    fn atomic_propositions(&self) -> Vec<String> {
        vec!["hazard".to_string()]
    }

    fn evaluate_atomic_proposition(&self, index: usize) -> bool {
        assert_eq!(index, 0);
        self.x > Self::THRESHOLD
    }

    fn faults(&self) -> Vec<Fault> {
        self.faults.clone()
    }

    fn set_fault_activation(&mut self, fault: usize, activation: Activation) {
        self.faults[fault].activation = activation;
    }
}

/// A controller with a `Crash` fault that makes the model itself fail one
/// step later, and a `Drift` fault that leads straight to the hazard.
pub struct CrashModel {
    faults: Vec<Fault>,
    location: u8,
    candidates: Vec<CandidateTransition>,
}

impl CrashModel {
    pub const START: u8 = 0;
    pub const RUNNING: u8 = 1;
    pub const CRASHED: u8 = 2;
    pub const DRIFTED: u8 = 3;

    pub fn new() -> Self {
        Self {
            faults: vec![Fault::new("Crash"), Fault::new("Drift")],
            location: Self::START,
            candidates: Vec::new(),
        }
    }
}

impl ExecutableModel for CrashModel {
    fn state_vector_size(&self) -> usize {
        1
    }

    fn serialize(&self, buffer: &mut [u8]) {
        buffer[0] = self.location;
    }

    fn deserialize(&mut self, buffer: &[u8]) {
        self.location = buffer[0];
    }

    fn execute_initial_step(&mut self) -> Result<(), ModelError> {
        self.candidates
            .push(CandidateTransition::nondeterministic(vec![Self::START]));
        Ok(())
    }

    fn execute_step(&mut self) -> Result<(), ModelError> {
        let targets = match self.location {
            Self::START => {
                let activations: Vec<_> = self.faults.iter().map(|f| f.activation).collect();
                combinations(&activations)
                    .into_iter()
                    .map(|active| match (active[0], active[1]) {
                        (true, _) => Self::CRASHED,
                        (false, true) => Self::DRIFTED,
                        (false, false) => Self::RUNNING,
                    })
                    .collect()
            }
            Self::CRASHED => return Err(ModelError::new("controller crashed")),
            other => vec![other],
        };
        self.candidates
            .extend(targets.into_iter().map(|t| CandidateTransition::nondeterministic(vec![t])));
        Ok(())
    }

    fn candidate_transitions(&mut self) -> Vec<CandidateTransition> {
        std::mem::take(&mut self.candidates)
    }

    fn atomic_propositions(&self) -> Vec<String> {
        vec!["hazard".to_string()]
    }

    fn evaluate_atomic_proposition(&self, _index: usize) -> bool {
        self.location == Self::DRIFTED
    }

    fn faults(&self) -> Vec<Fault> {
        self.faults.clone()
    }

    fn set_fault_activation(&mut self, fault: usize, activation: Activation) {
        self.faults[fault].activation = activation;
    }
}

/// Two probabilistic faults nested into each other:
///
/// - `F2` (0.3) leads to state 100;
/// - otherwise `F1` (0.4) leads to state 200;
/// - otherwise state 100 or 200 follow with 0.8 and 0.2.
pub struct NestedFaultModel {
    faults: Vec<Fault>,
    location: u8,
    candidates: Vec<CandidateTransition>,
}

impl NestedFaultModel {
    pub fn new() -> Self {
        Self {
            faults: vec![
                Fault::new("F1").with_probability(0.4),
                Fault::new("F2").with_probability(0.3),
            ],
            location: 0,
            candidates: Vec::new(),
        }
    }

    fn occurrence(&self, fault: usize) -> f64 {
        let fault = &self.faults[fault];
        match fault.activation {
            Activation::Suppressed => 0.0,
            Activation::Forced => 1.0,
            Activation::Nondeterministic => fault.probability.unwrap_or(0.0),
        }
    }

    fn push(&mut self, target: u8, probability: f64) {
        if probability > 0.0 {
            self.candidates.push(CandidateTransition::new(vec![target], probability));
        }
    }
}

impl ExecutableModel for NestedFaultModel {
    fn state_vector_size(&self) -> usize {
        1
    }

    fn serialize(&self, buffer: &mut [u8]) {
        buffer[0] = self.location;
    }

    fn deserialize(&mut self, buffer: &[u8]) {
        self.location = buffer[0];
    }

    fn execute_initial_step(&mut self) -> Result<(), ModelError> {
        self.push(0, 1.0);
        Ok(())
    }

    fn execute_step(&mut self) -> Result<(), ModelError> {
        if self.location != 0 {
            self.push(self.location, 1.0);
            return Ok(());
        }
        let f1 = self.occurrence(0);
        let f2 = self.occurrence(1);
        self.push(100, f2);
        self.push(200, (1.0 - f2) * f1);
        self.push(100, (1.0 - f2) * (1.0 - f1) * 0.8);
        self.push(200, (1.0 - f2) * (1.0 - f1) * 0.2);
        Ok(())
    }

    fn candidate_transitions(&mut self) -> Vec<CandidateTransition> {
        std::mem::take(&mut self.candidates)
    }

    fn atomic_propositions(&self) -> Vec<String> {
        vec!["state100".to_string(), "state200".to_string()]
    }

    fn evaluate_atomic_proposition(&self, index: usize) -> bool {
        match index {
            0 => self.location == 100,
            1 => self.location == 200,
            _ => panic!("no proposition {}", index),
        }
    }

    fn faults(&self) -> Vec<Fault> {
        self.faults.clone()
    }

    fn set_fault_activation(&mut self, fault: usize, activation: Activation) {
        self.faults[fault].activation = activation;
    }
}

/// A controller choosing between a cheap (0.5) and a reliable (0.9) way of
/// reaching the goal.
pub struct ChoiceModel {
    location: u8,
    candidates: Vec<CandidateTransition>,
}

impl ChoiceModel {
    pub const START: u8 = 0;
    pub const GOAL: u8 = 1;
    pub const FAIL: u8 = 2;

    pub fn new() -> Self {
        Self {
            location: Self::START,
            candidates: Vec::new(),
        }
    }

    fn push(&mut self, target: u8, probability: f64, distribution: u32) {
        self.candidates
            .push(CandidateTransition::new(vec![target], probability).in_distribution(distribution));
    }
}

impl ExecutableModel for ChoiceModel {
    fn state_vector_size(&self) -> usize {
        1
    }

    fn serialize(&self, buffer: &mut [u8]) {
        buffer[0] = self.location;
    }

    fn deserialize(&mut self, buffer: &[u8]) {
        self.location = buffer[0];
    }

    fn execute_initial_step(&mut self) -> Result<(), ModelError> {
        self.push(Self::START, 1.0, 0);
        Ok(())
    }

    fn execute_step(&mut self) -> Result<(), ModelError> {
        if self.location != Self::START {
            self.push(self.location, 1.0, 0);
            return Ok(());
        }
        self.push(Self::GOAL, 0.5, 0);
        self.push(Self::FAIL, 0.5, 0);
        self.push(Self::GOAL, 0.9, 1);
        self.push(Self::FAIL, 0.1, 1);
        Ok(())
    }

    fn candidate_transitions(&mut self) -> Vec<CandidateTransition> {
        std::mem::take(&mut self.candidates)
    }

    fn atomic_propositions(&self) -> Vec<String> {
        vec!["goal".to_string()]
    }

    fn evaluate_atomic_proposition(&self, _index: usize) -> bool {
        self.location == Self::GOAL
    }

    fn faults(&self) -> Vec<Fault> {
        Vec::new()
    }

    fn set_fault_activation(&mut self, fault: usize, _activation: Activation) {
        panic!("model has no fault {}", fault);
    }
}

/// Counts from 0 to `limit - 1`, then wraps around or stops.
pub struct CounterModel {
    limit: u8,
    wrap: bool,
    value: u8,
    candidates: Vec<CandidateTransition>,
}

impl CounterModel {
    pub fn new(limit: u8, wrap: bool) -> Self {
        assert!(limit > 1);
        Self {
            limit,
            wrap,
            value: 0,
            candidates: Vec::new(),
        }
    }
}

impl ExecutableModel for CounterModel {
    fn state_vector_size(&self) -> usize {
        1
    }

    fn serialize(&self, buffer: &mut [u8]) {
        buffer[0] = self.value;
    }

    fn deserialize(&mut self, buffer: &[u8]) {
        self.value = buffer[0];
    }

    fn execute_initial_step(&mut self) -> Result<(), ModelError> {
        self.candidates.push(CandidateTransition::new(vec![0], 1.0));
        Ok(())
    }

    fn execute_step(&mut self) -> Result<(), ModelError> {
        if self.value + 1 < self.limit {
            self.candidates
                .push(CandidateTransition::new(vec![self.value + 1], 1.0));
        } else if self.wrap {
            self.candidates.push(CandidateTransition::new(vec![0], 1.0));
        }
        Ok(())
    }

    fn candidate_transitions(&mut self) -> Vec<CandidateTransition> {
        std::mem::take(&mut self.candidates)
    }

    fn atomic_propositions(&self) -> Vec<String> {
        vec!["zero".to_string(), "half".to_string(), "max".to_string()]
    }

    fn evaluate_atomic_proposition(&self, index: usize) -> bool {
        match index {
            0 => self.value == 0,
            1 => self.value == self.limit / 2,
            2 => self.value == self.limit - 1,
            _ => panic!("no proposition {}", index),
        }
    }

    fn faults(&self) -> Vec<Fault> {
        Vec::new()
    }

    fn set_fault_activation(&mut self, fault: usize, _activation: Activation) {
        panic!("model has no fault {}", fault);
    }
}
