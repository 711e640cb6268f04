use crate::bitset::BitSet;
use crate::types::StateIndex;

/// Reverse adjacency of a transition structure, in compressed form.
#[derive(Debug, Clone)]
pub struct Predecessors {
    offsets: Vec<usize>,
    sources: Vec<StateIndex>,
}

impl Predecessors {
    /// Builds the reverse adjacency from `(source, target)` edges.
    pub fn new(state_count: usize, edges: impl IntoIterator<Item = (StateIndex, StateIndex)>) -> Self {
        let edges: Vec<_> = edges.into_iter().collect();
        let mut offsets = vec![0; state_count + 1];
        for &(_, target) in &edges {
            offsets[target as usize + 1] += 1;
        }
        for i in 0..state_count {
            offsets[i + 1] += offsets[i];
        }
        let mut fill = offsets.clone();
        let mut sources = vec![0; offsets[state_count]];
        for (source, target) in edges {
            sources[fill[target as usize]] = source;
            fill[target as usize] += 1;
        }
        Self { offsets, sources }
    }

    pub fn state_count(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn of(&self, state: StateIndex) -> &[StateIndex] {
        &self.sources[self.offsets[state as usize]..self.offsets[state as usize + 1]]
    }

    /// States that can reach `targets` along paths whose intermediate states
    /// avoid `ignore`. The targets themselves are always included.
    pub fn ancestors(&self, targets: &BitSet, ignore: &BitSet) -> BitSet {
        let mut result = targets.clone();
        let mut stack: Vec<StateIndex> = targets.iter().map(|s| s as StateIndex).collect();
        while let Some(state) = stack.pop() {
            for &p in self.of(state) {
                if !ignore.contains(p as usize) && result.insert(p as usize) {
                    stack.push(p);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_ancestors() {
        // 0 -> 1 -> 2, 3 -> 1, 4 isolated
        let edges = [(0, 1), (1, 2), (3, 1)];
        let preds = Predecessors::new(5, edges);
        assert_eq!(preds.of(1), &[0, 3]);
        let targets = BitSet::from_indices(5, [2]);

        let all = preds.ancestors(&targets, &BitSet::new(5));
        assert_eq!(all.iter().collect::<Vec<_>>(), vec![0, 1, 2, 3]);

        let blocked = preds.ancestors(&targets, &BitSet::from_indices(5, [1]));
        assert_eq!(blocked.iter().collect::<Vec<_>>(), vec![2]);
    }
}
