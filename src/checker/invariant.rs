use log::{debug, info};
use parking_lot::Mutex;

use crate::config::TraversalConfig;
use crate::counterexample::Counterexample;
use crate::error::TraversalError;
use crate::formula::{Formula, StatePredicate};
use crate::model::{Activation, ExecutableModel};
use crate::traversal::{traverse, Transition, TransitionAction, TraversalControl, TraversalParameters};
use crate::types::StateIndex;

/// Stops the traversal at the first transition into a state violating the invariant.
pub struct InvariantViolationDetector {
    invariant: StatePredicate,
    violation: Mutex<Option<StateIndex>>,
}

impl InvariantViolationDetector {
    pub fn new(invariant: StatePredicate) -> Self {
        Self {
            invariant,
            violation: Mutex::new(None),
        }
    }

    /// The first violating state found, if any.
    pub fn violation(&self) -> Option<StateIndex> {
        *self.violation.lock()
    }
}

impl TransitionAction for InvariantViolationDetector {
    fn process_transitions(
        &self,
        control: &TraversalControl,
        _source: Option<StateIndex>,
        transitions: &[Transition],
    ) -> Result<(), TraversalError> {
        if let Some(t) = transitions.iter().find(|t| !self.invariant.evaluate(t.propositions)) {
            let mut violation = self.violation.lock();
            if violation.is_none() {
                debug!("Invariant {} violated in state {}", self.invariant, t.target);
                *violation = Some(t.target);
            }
            control.request_stop();
        }
        Ok(())
    }
}

/// Outcome of an invariant check.
#[derive(Debug, Clone)]
pub struct InvariantResult {
    pub holds: bool,
    /// Trace to the violating state, if the invariant does not hold.
    pub counterexample: Option<Counterexample>,
    pub state_count: usize,
    pub transition_count: usize,
}

/// Checks state invariants on the fly while traversing a model.
pub struct InvariantChecker<'f, F> {
    factory: &'f F,
    config: TraversalConfig,
}

impl<'f, M, F> InvariantChecker<'f, F>
where
    M: ExecutableModel,
    F: Fn() -> M + Sync,
{
    pub fn new(factory: &'f F, config: TraversalConfig) -> Self {
        Self { factory, config }
    }

    /// Traverses the model under `activations` (or its declared ones) and
    /// checks that every reachable state satisfies `invariant`.
    pub fn check(&self, invariant: &Formula, activations: Option<Vec<Activation>>) -> Result<InvariantResult, TraversalError> {
        let model = (self.factory)();
        let faults = model.faults();
        let detector = InvariantViolationDetector::new(StatePredicate::compile(invariant, &model.atomic_propositions())?);
        drop(model);

        let effective = activations
            .clone()
            .unwrap_or_else(|| faults.iter().map(|f| f.activation).collect());
        let mut params = TraversalParameters::new().with_action(&detector);
        if let Some(activations) = activations {
            params = params.with_activations(activations);
        }

        let state_space = traverse(self.factory, &self.config, &params)?;
        let counterexample = detector.violation().map(|state| {
            let fault_set = faults
                .iter()
                .zip(&effective)
                .filter(|(_, &a)| a != Activation::Suppressed)
                .map(|(f, _)| f.name.clone())
                .collect();
            Counterexample::new(invariant, fault_set, &faults, &effective, state_space.trace_to(state))
        });

        let result = InvariantResult {
            holds: counterexample.is_none(),
            counterexample,
            state_count: state_space.state_count(),
            transition_count: state_space.transition_count(),
        };
        info!(
            "Invariant {} {} ({} states, {} transitions)",
            invariant,
            if result.holds { "holds" } else { "is violated" },
            result.state_count,
            result.transition_count
        );
        Ok(result)
    }
}
