use std::collections::HashMap;

use log::{debug, info};

use crate::bitset::BitSet;
use crate::checker::reachability::Predecessors;
use crate::error::{CheckError, FormulaError};
use crate::formula::{normalize_ctl, Ctl, Formula};
use crate::graph::StateGraph;
use crate::types::{PropositionSet, StateIndex};

/// Evaluates CTL formulas on a [`StateGraph`].
///
/// Every state is labeled with the propositions of the first transition that
/// discovered it. Satisfaction sets of subformulas are cached, so checking
/// several formulas that share subformulas on one checker is cheap.
pub struct CtlChecker<'a> {
    graph: &'a StateGraph,
    labels: Vec<PropositionSet>,
    predecessors: Predecessors,
    cache: HashMap<Ctl, BitSet>,
}

impl<'a> CtlChecker<'a> {
    pub fn new(graph: &'a StateGraph) -> Self {
        let n = graph.state_count();
        let mut labels = vec![PropositionSet::empty(); n];
        let mut labeled = BitSet::new(n);
        let mut edges = Vec::with_capacity(graph.transition_count());

        for t in graph.initial() {
            if labeled.insert(t.target as usize) {
                labels[t.target as usize] = t.propositions;
            }
        }
        for s in 0..n as StateIndex {
            for t in graph.outgoing(s) {
                if labeled.insert(t.target as usize) {
                    labels[t.target as usize] = t.propositions;
                }
                edges.push((s, t.target));
            }
        }

        Self {
            graph,
            labels,
            predecessors: Predecessors::new(n, edges),
            cache: HashMap::new(),
        }
    }

    /// Returns true if every initial state satisfies `formula`.
    pub fn check(&mut self, formula: &Formula) -> Result<bool, CheckError> {
        let satisfying = self.satisfying_states(formula)?;
        let holds = self
            .graph
            .initial()
            .iter()
            .all(|t| satisfying.contains(t.target as usize));
        info!("{} {}", formula, if holds { "holds" } else { "does not hold" });
        Ok(holds)
    }

    /// States satisfying `formula`.
    pub fn satisfying_states(&mut self, formula: &Formula) -> Result<BitSet, CheckError> {
        let normalized = normalize_ctl(formula)?;
        debug!("Normalized {} to {}", formula, normalized);
        Ok(self.evaluate(&normalized)?.clone())
    }

    fn evaluate(&mut self, ctl: &Ctl) -> Result<&BitSet, FormulaError> {
        if !self.cache.contains_key(ctl) {
            let set = self.compute(ctl)?;
            self.cache.insert(ctl.clone(), set);
        }
        Ok(&self.cache[ctl])
    }

    fn compute(&mut self, ctl: &Ctl) -> Result<BitSet, FormulaError> {
        let n = self.graph.state_count();
        Ok(match ctl {
            Ctl::Atom(name) => {
                let index = self
                    .graph
                    .proposition_names()
                    .iter()
                    .position(|p| p == name)
                    .ok_or_else(|| FormulaError::UnknownProposition(name.clone()))?;
                BitSet::from_indices(n, (0..n).filter(|&s| self.labels[s].contains(index)))
            }
            Ctl::Bool(true) => BitSet::full(n),
            Ctl::Bool(false) => BitSet::new(n),
            Ctl::Not(a) => self.evaluate(a)?.complement(),
            Ctl::And(a, b) => {
                let a = self.evaluate(a)?.clone();
                a.intersection(self.evaluate(b)?)
            }
            Ctl::Or(a, b) => {
                let a = self.evaluate(a)?.clone();
                a.union(self.evaluate(b)?)
            }
            Ctl::ExistsNext(a) => {
                let a = self.evaluate(a)?.clone();
                let mut result = BitSet::new(n);
                for s in a.iter() {
                    result.extend(self.predecessors.of(s as StateIndex).iter().map(|&p| p as usize));
                }
                result
            }
            Ctl::ExistsUntil(a, b) => {
                let hold = self.evaluate(a)?.clone();
                let goal = self.evaluate(b)?.clone();
                self.predecessors.ancestors(&goal, &hold.complement())
            }
            Ctl::ExistsGlobally(a) => {
                let hold = self.evaluate(a)?.clone();
                let cycles = self.nontrivial_components(&hold);
                self.predecessors.ancestors(&cycles, &hold.complement())
            }
        })
    }

    /// States of the `within`-restricted graph lying in a non-trivial strongly
    /// connected component (more than one state, or a self-loop).
    fn nontrivial_components(&self, within: &BitSet) -> BitSet {
        const UNVISITED: u32 = u32::MAX;

        let n = self.graph.state_count();
        let mut index = vec![UNVISITED; n];
        let mut lowlink = vec![0u32; n];
        let mut on_stack = BitSet::new(n);
        let mut stack: Vec<StateIndex> = Vec::new();
        let mut result = BitSet::new(n);
        let mut counter = 0u32;

        // (state, position of the next successor to visit)
        let mut work: Vec<(StateIndex, usize)> = Vec::new();

        for root in within.iter() {
            if index[root] != UNVISITED {
                continue;
            }
            work.push((root as StateIndex, 0));

            while let Some(top) = work.last_mut() {
                let v = top.0;
                let vi = v as usize;
                if top.1 == 0 && index[vi] == UNVISITED {
                    index[vi] = counter;
                    lowlink[vi] = counter;
                    counter += 1;
                    stack.push(v);
                    on_stack.insert(vi);
                }

                let successors = self.graph.outgoing(v);
                if let Some(t) = successors.get(top.1) {
                    top.1 += 1;
                    let w = t.target as usize;
                    if !within.contains(w) {
                        continue;
                    }
                    if index[w] == UNVISITED {
                        work.push((t.target, 0));
                    } else if on_stack.contains(w) {
                        lowlink[vi] = lowlink[vi].min(index[w]);
                    }
                    continue;
                }

                work.pop();
                if let Some(&(parent, _)) = work.last() {
                    let p = parent as usize;
                    lowlink[p] = lowlink[p].min(lowlink[vi]);
                }

                if lowlink[vi] == index[vi] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack.remove(w as usize);
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    let nontrivial = component.len() > 1 || successors.iter().any(|t| t.target == v);
                    if nontrivial {
                        result.extend(component.iter().map(|&w| w as usize));
                    }
                }
            }
        }
        result
    }
}
