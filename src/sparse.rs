//! Compressed sparse row matrices of transition probabilities.

/// A row-major sparse matrix. Rows are appended in order and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    row_offsets: Vec<usize>,
    columns: Vec<u32>,
    values: Vec<f64>,
}

impl SparseMatrix {
    pub fn new() -> Self {
        Self {
            row_offsets: vec![0],
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_offsets.len() - 1
    }

    pub fn entry_count(&self) -> usize {
        self.values.len()
    }

    /// Appends a row; returns its index.
    pub fn push_row(&mut self, entries: impl IntoIterator<Item = (u32, f64)>) -> usize {
        for (column, value) in entries {
            self.columns.push(column);
            self.values.push(value);
        }
        self.row_offsets.push(self.columns.len());
        self.row_count() - 1
    }

    pub fn row(&self, row: usize) -> impl Iterator<Item = (u32, f64)> + '_ {
        let range = self.row_offsets[row]..self.row_offsets[row + 1];
        self.columns[range.clone()].iter().copied().zip(self.values[range].iter().copied())
    }

    pub fn row_sum(&self, row: usize) -> f64 {
        self.row(row).map(|(_, p)| p).sum()
    }

    /// All non-zero entries as `(row, column, value)`.
    pub fn entries(&self) -> impl Iterator<Item = (usize, u32, f64)> + '_ {
        (0..self.row_count()).flat_map(move |r| self.row(r).map(move |(c, v)| (r, c, v)))
    }
}

impl Default for SparseMatrix {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_rows() {
        let mut m = SparseMatrix::new();
        assert_eq!(m.push_row([(1, 0.6), (0, 0.4)]), 0);
        assert_eq!(m.push_row([]), 1);
        assert_eq!(m.push_row([(1, 1.0)]), 2);
        assert_eq!(m.row_count(), 3);
        assert_eq!(m.entry_count(), 3);
        assert_eq!(m.row(0).collect::<Vec<_>>(), vec![(1, 0.6), (0, 0.4)]);
        assert_eq!(m.row(1).count(), 0);
        assert!((m.row_sum(0) - 1.0).abs() < 1e-12);
        assert_eq!(m.entries().map(|(r, c, _)| (r, c)).collect::<Vec<_>>(), vec![(0, 1), (0, 0), (2, 1)]);
    }
}
