use std::fmt;

use log::{debug, info};

use crate::bitset::BitSet;
use crate::checker::reachability::Predecessors;
use crate::checker::UntilQuery;
use crate::config::CheckerConfig;
use crate::error::CheckError;
use crate::formula::Formula;
use crate::ltmdp::Mdp;
use crate::types::StateIndex;

/// Lower and upper bound of a probability over all schedulers.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ProbabilityRange {
    pub min: f64,
    pub max: f64,
}

impl fmt::Display for ProbabilityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.min, self.max)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Objective {
    Minimize,
    Maximize,
}

impl Objective {
    fn pick(self, values: impl Iterator<Item = f64>) -> f64 {
        match self {
            Objective::Minimize => values.fold(f64::INFINITY, f64::min),
            Objective::Maximize => values.fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Computes minimal and maximal reachability probabilities on an [`Mdp`].
pub struct MdpChecker<'a> {
    mdp: &'a Mdp,
    config: CheckerConfig,
    predecessors: Predecessors,
}

impl<'a> MdpChecker<'a> {
    pub fn new(mdp: &'a Mdp) -> Self {
        Self::with_config(mdp, CheckerConfig::default())
    }

    pub fn with_config(mdp: &'a Mdp, config: CheckerConfig) -> Self {
        let mut edges = Vec::new();
        for s in 0..mdp.state_count() as StateIndex {
            for row in mdp.distributions(s) {
                edges.extend(mdp.distribution(row).filter(|&(_, p)| p > 0.0).map(|(t, _)| (s, t)));
            }
        }
        Self {
            mdp,
            config,
            predecessors: Predecessors::new(mdp.state_count(), edges),
        }
    }

    pub fn calculate_minimal_probability(&self, formula: &Formula) -> Result<f64, CheckError> {
        let result = self.calculate(formula, Objective::Minimize)?;
        info!("min {} = {}", formula, result);
        Ok(result)
    }

    pub fn calculate_maximal_probability(&self, formula: &Formula) -> Result<f64, CheckError> {
        let result = self.calculate(formula, Objective::Maximize)?;
        info!("max {} = {}", formula, result);
        Ok(result)
    }

    pub fn calculate_probability_range(&self, formula: &Formula) -> Result<ProbabilityRange, CheckError> {
        Ok(ProbabilityRange {
            min: self.calculate_minimal_probability(formula)?,
            max: self.calculate_maximal_probability(formula)?,
        })
    }

    fn calculate(&self, formula: &Formula, objective: Objective) -> Result<f64, CheckError> {
        let query = UntilQuery::parse(formula)?;
        let labels = (0..self.mdp.state_count()).map(|s| self.mdp.label(s as StateIndex));
        let (hold, goal) = query.satisfying(self.mdp.proposition_names(), labels)?;
        let excluded = hold.union(&goal).complement();

        let values = match query.bound {
            Some(steps) => self.bounded(&goal, &excluded, steps, objective),
            None => self.unbounded(&goal, &excluded, objective),
        };
        Ok(objective.pick(self.mdp.initial_distributions().iter().map(|d| expectation(d, &values))))
    }

    fn choose(&self, state: StateIndex, values: &[f64], objective: Objective) -> f64 {
        objective.pick(
            self.mdp
                .distributions(state)
                .map(|row| self.mdp.distribution(row).map(|(t, p)| p * values[t as usize]).sum::<f64>()),
        )
    }

    fn bounded(&self, goal: &BitSet, excluded: &BitSet, steps: u32, objective: Objective) -> Vec<f64> {
        let n = self.mdp.state_count();
        let mut current: Vec<f64> = (0..n).map(|s| if goal.contains(s) { 1.0 } else { 0.0 }).collect();
        let mut next = vec![0.0; n];
        for _ in 0..steps {
            for s in 0..n {
                next[s] = if goal.contains(s) {
                    1.0
                } else if excluded.contains(s) {
                    0.0
                } else {
                    self.choose(s as StateIndex, &current, objective)
                };
            }
            std::mem::swap(&mut current, &mut next);
        }
        current
    }

    fn unbounded(&self, goal: &BitSet, excluded: &BitSet, objective: Objective) -> Vec<f64> {
        let n = self.mdp.state_count();
        let (prob0, prob1) = match objective {
            Objective::Maximize => {
                let prob0 = self.prob0_all(goal, excluded);
                (prob0, self.prob1_exists(goal, excluded))
            }
            Objective::Minimize => {
                let prob0 = self.prob0_exists(goal, excluded);
                let prob1 = self
                    .predecessors
                    .ancestors(&prob0, &excluded.union(goal))
                    .complement();
                (prob0, prob1)
            }
        };
        debug!(
            "{:?}: {} states, {} with probability 0, {} with probability 1",
            objective,
            n,
            prob0.len(),
            prob1.len()
        );

        let mut x: Vec<f64> = (0..n).map(|s| if prob1.contains(s) { 1.0 } else { 0.0 }).collect();
        let remaining: Vec<usize> = prob0.union(&prob1).complement().iter().collect();
        if remaining.is_empty() {
            return x;
        }

        for sweep in 1..=self.config.iterations {
            let mut max_delta: f64 = 0.0;
            for &s in &remaining {
                let value = self.choose(s as StateIndex, &x, objective);
                max_delta = max_delta.max((value - x[s]).abs());
                x[s] = value;
            }
            if sweep % 10 == 0 {
                debug!("Value iteration sweep {}: max delta {:e}", sweep, max_delta);
            }
            if max_delta < self.config.convergence {
                debug!("Value iteration converged after {} sweeps", sweep);
                break;
            }
        }
        x
    }

    /// States that reach the goal with probability 0 under every scheduler.
    fn prob0_all(&self, goal: &BitSet, excluded: &BitSet) -> BitSet {
        self.predecessors.ancestors(goal, excluded).complement()
    }

    /// States where some scheduler avoids the goal almost surely.
    fn prob0_exists(&self, goal: &BitSet, excluded: &BitSet) -> BitSet {
        // least fixpoint of states from which every choice may hit the goal
        let mut positive = goal.clone();
        loop {
            let mut changed = false;
            for s in 0..self.mdp.state_count() {
                if positive.contains(s) || excluded.contains(s) {
                    continue;
                }
                let forced = self
                    .mdp
                    .distributions(s as StateIndex)
                    .all(|row| self.mdp.distribution(row).any(|(t, p)| p > 0.0 && positive.contains(t as usize)));
                if forced {
                    positive.insert(s);
                    changed = true;
                }
            }
            if !changed {
                return positive.complement();
            }
        }
    }

    /// States where some scheduler reaches the goal almost surely.
    fn prob1_exists(&self, goal: &BitSet, excluded: &BitSet) -> BitSet {
        let n = self.mdp.state_count();
        let mut outer = BitSet::full(n);
        loop {
            let mut inner = goal.clone();
            loop {
                let mut changed = false;
                for s in 0..n {
                    if inner.contains(s) || excluded.contains(s) || !outer.contains(s) {
                        continue;
                    }
                    let good = self.mdp.distributions(s as StateIndex).any(|row| {
                        let mut succ = self.mdp.distribution(row).filter(|&(_, p)| p > 0.0);
                        let mut hits = false;
                        let stays = succ.all(|(t, _)| {
                            hits |= inner.contains(t as usize);
                            outer.contains(t as usize)
                        });
                        stays && hits
                    });
                    if good {
                        inner.insert(s);
                        changed = true;
                    }
                }
                if !changed {
                    break;
                }
            }
            if inner == outer {
                return inner;
            }
            outer = inner;
        }
    }
}

fn expectation(distribution: &[(StateIndex, f64)], values: &[f64]) -> f64 {
    distribution.iter().map(|&(t, p)| p * values[t as usize]).sum()
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::ltmdp::MdpBuilder;
    use crate::types::PropositionSet;

    /// State 0 chooses between a fair coin (goal or sink) and a sure move to the goal.
    fn choice() -> Mdp {
        let mut builder = MdpBuilder::new(["goal"]);
        builder
            .initial(&[(0, 1.0)])
            .distribution(0, &[(1, 0.5), (2, 0.5)])
            .distribution(0, &[(1, 1.0)])
            .distribution(1, &[(1, 1.0)])
            .distribution(2, &[(2, 1.0)])
            .label(1, PropositionSet::empty().with(0));
        builder.build().unwrap()
    }

    #[test]
    fn test_range() {
        let mdp = choice();
        let checker = MdpChecker::new(&mdp);
        let range = checker
            .calculate_probability_range(&Formula::atom("goal").finally().probability())
            .unwrap();
        assert!((range.min - 0.5).abs() < 1e-9);
        assert!((range.max - 1.0).abs() < 1e-9);
        assert_eq!(ProbabilityRange { min: 0.5, max: 1.0 }.to_string(), "[0.5,1]");
    }

    #[test]
    fn test_min_zero_with_avoiding_loop() {
        // state 0 may stay forever or move to the goal
        let mut builder = MdpBuilder::new(["goal"]);
        builder
            .initial(&[(0, 1.0)])
            .distribution(0, &[(0, 1.0)])
            .distribution(0, &[(1, 1.0)])
            .distribution(1, &[(1, 1.0)])
            .label(1, PropositionSet::empty().with(0));
        let mdp = builder.build().unwrap();
        let checker = MdpChecker::new(&mdp);
        let formula = Formula::atom("goal").finally();
        assert_eq!(checker.calculate_minimal_probability(&formula).unwrap(), 0.0);
        assert_eq!(checker.calculate_maximal_probability(&formula).unwrap(), 1.0);
    }

    #[test]
    fn test_bounded_and_initial_choice() {
        let mut builder = MdpBuilder::new(["goal"]);
        builder
            .initial(&[(0, 1.0)])
            .initial(&[(1, 1.0)])
            .distribution(0, &[(1, 0.5), (0, 0.5)])
            .distribution(1, &[(1, 1.0)])
            .label(1, PropositionSet::empty().with(0));
        let mdp = builder.build().unwrap();
        let checker = MdpChecker::new(&mdp);
        let formula = Formula::atom("goal").finally_within(1);
        assert!((checker.calculate_minimal_probability(&formula).unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(checker.calculate_maximal_probability(&formula).unwrap(), 1.0);
    }
}
