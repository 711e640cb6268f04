use log::{debug, info};

use crate::bitset::BitSet;
use crate::checker::reachability::Predecessors;
use crate::checker::UntilQuery;
use crate::config::CheckerConfig;
use crate::error::CheckError;
use crate::formula::Formula;
use crate::ltmc::Dtmc;
use crate::types::StateIndex;

/// Computes reachability probabilities on a [`Dtmc`].
pub struct DtmcChecker<'a> {
    dtmc: &'a Dtmc,
    config: CheckerConfig,
    predecessors: Predecessors,
}

impl<'a> DtmcChecker<'a> {
    pub fn new(dtmc: &'a Dtmc) -> Self {
        Self::with_config(dtmc, CheckerConfig::default())
    }

    pub fn with_config(dtmc: &'a Dtmc, config: CheckerConfig) -> Self {
        let matrix = dtmc.matrix();
        let edges = matrix.entries().filter(|&(_, _, p)| p > 0.0).map(|(s, t, _)| (s as StateIndex, t));
        Self {
            dtmc,
            config,
            predecessors: Predecessors::new(dtmc.state_count(), edges),
        }
    }

    /// Probability of `F ψ`, `φ U ψ` or their bounded variants, optionally
    /// wrapped in `P=?`, from the initial distribution.
    pub fn probability_of(&self, formula: &Formula) -> Result<f64, CheckError> {
        let values = self.state_probabilities(formula)?;
        let result = self
            .dtmc
            .initial_distribution()
            .iter()
            .map(|&(s, p)| p * values[s as usize])
            .sum();
        info!("{} = {}", formula, result);
        Ok(result)
    }

    /// Per-state probabilities of the path formula.
    pub fn state_probabilities(&self, formula: &Formula) -> Result<Vec<f64>, CheckError> {
        let query = UntilQuery::parse(formula)?;
        let labels = (0..self.dtmc.state_count()).map(|s| self.dtmc.label(s as StateIndex));
        let (hold, goal) = query.satisfying(self.dtmc.proposition_names(), labels)?;
        let excluded = hold.union(&goal).complement();

        Ok(match query.bound {
            Some(steps) => self.bounded(&goal, &excluded, steps),
            None => self.unbounded(&goal, &excluded),
        })
    }

    fn bounded(&self, goal: &BitSet, excluded: &BitSet, steps: u32) -> Vec<f64> {
        let n = self.dtmc.state_count();
        let matrix = self.dtmc.matrix();
        let mut current: Vec<f64> = (0..n).map(|s| if goal.contains(s) { 1.0 } else { 0.0 }).collect();
        let mut next = vec![0.0; n];
        for _ in 0..steps {
            for s in 0..n {
                next[s] = if goal.contains(s) {
                    1.0
                } else if excluded.contains(s) {
                    0.0
                } else {
                    matrix.row(s).map(|(t, p)| p * current[t as usize]).sum()
                };
            }
            std::mem::swap(&mut current, &mut next);
        }
        current
    }

    fn unbounded(&self, goal: &BitSet, excluded: &BitSet) -> Vec<f64> {
        let n = self.dtmc.state_count();
        let prob0 = self.predecessors.ancestors(goal, excluded).complement();
        let prob1 = self
            .predecessors
            .ancestors(&prob0, &excluded.union(goal))
            .complement();
        debug!(
            "{} states: {} with probability 0, {} with probability 1",
            n,
            prob0.len(),
            prob1.len()
        );

        let mut x: Vec<f64> = (0..n).map(|s| if prob1.contains(s) { 1.0 } else { 0.0 }).collect();
        let remaining: Vec<usize> = prob0.union(&prob1).complement().iter().collect();
        if remaining.is_empty() {
            return x;
        }

        let matrix = self.dtmc.matrix();
        for sweep in 1..=self.config.iterations {
            let mut max_delta: f64 = 0.0;
            for &s in &remaining {
                let mut sum = 0.0;
                let mut self_loop = 0.0;
                for (t, p) in matrix.row(s) {
                    if t as usize == s {
                        self_loop += p;
                    } else {
                        sum += p * x[t as usize];
                    }
                }
                let value = if self_loop < 1.0 { sum / (1.0 - self_loop) } else { 0.0 };
                max_delta = max_delta.max((value - x[s]).abs());
                x[s] = value;
            }
            if sweep % 10 == 0 {
                debug!("Gauss-Seidel sweep {}: max delta {:e}", sweep, max_delta);
            }
            if max_delta < self.config.convergence {
                debug!("Gauss-Seidel converged after {} sweeps", sweep);
                break;
            }
        }
        x
    }
}
