use crate::error::FormulaError;
use crate::formula::{Formula, StatePredicate};
use crate::model::CandidateTransition;
use crate::traversal::TransitionModifier;

/// Redirects every valid transition whose target satisfies a state formula
/// into the stuttering state, so that nothing beyond it gets explored.
pub struct EarlyTerminationModifier {
    condition: StatePredicate,
}

impl EarlyTerminationModifier {
    pub fn new(condition: StatePredicate) -> Self {
        Self { condition }
    }

    /// Compiles `formula` against the model's proposition names.
    pub fn compile<S: AsRef<str>>(formula: &Formula, propositions: &[S]) -> Result<Self, FormulaError> {
        Ok(Self::new(StatePredicate::compile(formula, propositions)?))
    }
}

impl TransitionModifier for EarlyTerminationModifier {
    fn modify(&self, transitions: &mut [CandidateTransition]) {
        for transition in transitions.iter_mut().filter(|t| t.is_valid) {
            if self.condition.evaluate(transition.propositions) {
                transition.is_stuttering = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::types::PropositionSet;

    #[test]
    fn test_marks_matching_transitions() {
        let modifier = EarlyTerminationModifier::compile(&Formula::atom("done"), &["busy", "done"]).unwrap();

        let mut transitions = vec![
            CandidateTransition::new(vec![0], 0.5),
            CandidateTransition::new(vec![1], 0.5),
            CandidateTransition::new(vec![2], 0.0),
        ];
        transitions[1].propositions = PropositionSet::empty().with(1);
        transitions[2].propositions = PropositionSet::empty().with(1);
        transitions[2].is_valid = false;

        modifier.modify(&mut transitions);
        assert!(!transitions[0].is_stuttering);
        assert!(transitions[1].is_stuttering);
        assert!(!transitions[2].is_stuttering);
    }
}
