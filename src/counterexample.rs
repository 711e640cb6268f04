//! Persisted counterexamples and their replay.
//!
//! A [`Counterexample`] is self-contained: it records the fault activations
//! of the run that produced it, so a fresh model instance can reproduce the
//! trace step by step with a [`Simulator`].

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::CounterexampleError;
use crate::model::{Activation, ExecutableModel, Fault};

/// Current on-disk format version.
pub const COUNTEREXAMPLE_VERSION: u32 = 1;

/// A trace from an initial state to a state violating `formula`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counterexample {
    pub version: u32,
    /// The violated formula, as displayed.
    pub formula: String,
    /// Names of the faults of the checked fault set.
    pub fault_set: Vec<String>,
    /// Activation of every model fault during the run.
    pub fault_activations: Vec<(String, Activation)>,
    /// Serialized model states along the trace.
    pub states: Vec<Vec<u8>>,
}

impl Counterexample {
    pub fn new(
        formula: impl ToString,
        fault_set: Vec<String>,
        faults: &[Fault],
        activations: &[Activation],
        states: Vec<Box<[u8]>>,
    ) -> Self {
        Counterexample {
            version: COUNTEREXAMPLE_VERSION,
            formula: formula.to_string(),
            fault_set,
            fault_activations: faults
                .iter()
                .zip(activations)
                .map(|(fault, &activation)| (fault.name.clone(), activation))
                .collect(),
            states: states.into_iter().map(Vec::from).collect(),
        }
    }

    /// Number of recorded states.
    pub fn step_count(&self) -> usize {
        self.states.len()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CounterexampleError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| CounterexampleError::io(path, e))?;
        debug!("Saved counterexample with {} states to {}", self.states.len(), path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CounterexampleError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| CounterexampleError::io(path, e))?;
        let counterexample: Counterexample = serde_json::from_str(&json)?;
        if counterexample.version != COUNTEREXAMPLE_VERSION {
            return Err(CounterexampleError::Version {
                found: counterexample.version,
                expected: COUNTEREXAMPLE_VERSION,
            });
        }
        Ok(counterexample)
    }
}

/// Replays a [`Counterexample`] on a model instance.
pub struct Simulator<'c, M> {
    model: M,
    counterexample: &'c Counterexample,
    position: usize,
}

impl<'c, M: ExecutableModel> Simulator<'c, M> {
    /// Applies the recorded fault activations to `model`.
    pub fn new(mut model: M, counterexample: &'c Counterexample) -> Result<Self, CounterexampleError> {
        let faults = model.faults();
        for (name, activation) in &counterexample.fault_activations {
            let index = faults
                .iter()
                .position(|f| &f.name == name)
                .ok_or_else(|| CounterexampleError::UnknownFault(name.clone()))?;
            model.set_fault_activation(index, *activation);
        }
        Ok(Self {
            model,
            counterexample,
            position: 0,
        })
    }

    pub fn is_completed(&self) -> bool {
        self.position >= self.counterexample.states.len()
    }

    /// Number of states replayed so far.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Advances to the next recorded state, checking that the model can
    /// actually reach it from the current one.
    pub fn simulate_step(&mut self) -> Result<&'c [u8], CounterexampleError> {
        if self.is_completed() {
            return Err(CounterexampleError::Completed);
        }
        let step = self.position;
        let counterexample: &'c Counterexample = self.counterexample;
        let states = &counterexample.states;

        let executed = if step == 0 {
            self.model.execute_initial_step()
        } else {
            self.model.deserialize(&states[step - 1]);
            self.model.execute_step()
        };
        executed.map_err(|source| CounterexampleError::Model { step, source })?;

        let recorded = states[step].as_slice();
        let reachable = self
            .model
            .candidate_transitions()
            .iter()
            .any(|c| c.is_valid && c.target == recorded);
        if !reachable {
            return Err(CounterexampleError::NotASuccessor { step });
        }

        self.model.deserialize(recorded);
        self.position += 1;
        Ok(recorded)
    }

    /// Replays all remaining steps; returns the number of replayed states.
    pub fn replay(&mut self) -> Result<usize, CounterexampleError> {
        let start = self.position;
        while !self.is_completed() {
            self.simulate_step()?;
        }
        Ok(self.position - start)
    }
}
