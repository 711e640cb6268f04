//! Model checkers over generated transition structures.
//!
//! - [`CtlChecker`]: qualitative CTL over a [`StateGraph`](crate::graph::StateGraph);
//! - [`DtmcChecker`]: reachability probabilities over a [`Dtmc`](crate::ltmc::Dtmc);
//! - [`MdpChecker`]: minimal and maximal reachability probabilities over an [`Mdp`](crate::ltmdp::Mdp);
//! - [`InvariantChecker`]: on-the-fly invariant checking during traversal.

mod ctl;
mod dtmc;
mod invariant;
mod mdp;
mod reachability;

pub use ctl::CtlChecker;
pub use dtmc::DtmcChecker;
pub use invariant::{InvariantChecker, InvariantResult, InvariantViolationDetector};
pub use mdp::{MdpChecker, ProbabilityRange};
pub use reachability::Predecessors;

use crate::bitset::BitSet;
use crate::error::CheckError;
use crate::formula::{Formula, StatePredicate};
use crate::types::PropositionSet;

/// A (bounded) until query `φ U≤k ψ`; `F ψ` is `true U ψ`.
struct UntilQuery {
    hold: Formula,
    goal: Formula,
    bound: Option<u32>,
}

impl UntilQuery {
    fn parse(formula: &Formula) -> Result<Self, CheckError> {
        let path = match formula {
            Formula::Probability(inner) => inner.as_ref(),
            other => other,
        };
        match path {
            Formula::Finally(goal, bound) => Ok(UntilQuery {
                hold: Formula::tt(),
                goal: goal.as_ref().clone(),
                bound: *bound,
            }),
            Formula::Until(hold, goal, bound) => Ok(UntilQuery {
                hold: hold.as_ref().clone(),
                goal: goal.as_ref().clone(),
                bound: *bound,
            }),
            _ => Err(CheckError::Unsupported(formula.to_string())),
        }
    }

    /// Satisfaction sets of the two operands over states labeled by `labels`.
    fn satisfying<S: AsRef<str>>(
        &self,
        propositions: &[S],
        labels: impl Iterator<Item = PropositionSet> + Clone,
    ) -> Result<(BitSet, BitSet), CheckError> {
        let hold = StatePredicate::compile(&self.hold, propositions)?;
        let goal = StatePredicate::compile(&self.goal, propositions)?;
        let count = labels.clone().count();
        let select = |p: &StatePredicate| {
            BitSet::from_indices(
                count,
                labels.clone().enumerate().filter(|(_, l)| p.evaluate(*l)).map(|(s, _)| s),
            )
        };
        Ok((select(&hold), select(&goal)))
    }
}
