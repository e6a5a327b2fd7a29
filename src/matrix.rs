//! Dense Matrix
//!
//! A row-major dense matrix of real entries. It only exists in full at the coordinating process: once the
//! row blocks are distributed, every process works on its own [`crate::partitioner::RowBlock`].
//!

use super::error::*;
use super::util::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DenseMatrix {
    /// the number of rows
    pub rows: usize,
    /// the number of columns
    pub cols: usize,
    /// row-major entries, `data[i * cols + j]` is the entry at row `i` and column `j`
    pub data: Vec<Entry>,
}

impl DenseMatrix {
    /// all-zero matrix
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.; rows * cols],
        }
    }

    pub fn identity(size: usize) -> Self {
        Self::leading_diagonal(size, size, size)
    }

    /// matrix with `count` ones on the leading diagonal and zeros elsewhere
    pub fn leading_diagonal(rows: usize, cols: usize, count: usize) -> Self {
        assert!(count <= rows.min(cols), "cannot place {count} diagonal ones in a {rows}x{cols} matrix");
        let mut matrix = Self::new(rows, cols);
        for i in 0..count {
            matrix[(i, i)] = 1.;
        }
        matrix
    }

    pub fn from_data(rows: usize, cols: usize, data: Vec<Entry>) -> RankResult<Self> {
        let matrix = Self { rows, cols, data };
        matrix.sanity_check()?;
        Ok(matrix)
    }

    /// build from a list of rows, all of which must have the same length
    pub fn from_rows(rows: Vec<Vec<Entry>>) -> RankResult<Self> {
        let row_num = rows.len();
        let cols = rows.first().map(|row| row.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(row_num * cols);
        for row in rows.into_iter() {
            if row.len() != cols {
                return Err(RankError::InvalidShape {
                    rows: row_num,
                    cols,
                    actual: data.len() + row.len(),
                });
            }
            data.extend(row);
        }
        Self::from_data(row_num, cols, data)
    }

    /// load a matrix from a JSON file of the form `{"rows": 2, "cols": 2, "data": [1, 0, 0, 1]}`
    pub fn from_json_file(filename: &str) -> RankResult<Self> {
        let file = File::open(filename)?;
        let matrix: Self = serde_json::from_reader(BufReader::new(file))?;
        matrix.sanity_check()?;
        Ok(matrix)
    }

    pub fn sanity_check(&self) -> RankResult<()> {
        if self.data.len() != self.rows * self.cols {
            return Err(RankError::InvalidShape {
                rows: self.rows,
                cols: self.cols,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    pub fn row(&self, row_index: RowIndex) -> &[Entry] {
        &self.data[row_index * self.cols..(row_index + 1) * self.cols]
    }

    /// the contiguous entries of a range of rows, in row-major order
    pub fn rows_slice(&self, row_range: RowRange) -> &[Entry] {
        &self.data[row_range.start() * self.cols..row_range.end() * self.cols]
    }

    /// row `target` += `multiplier` * row `source`
    pub fn add_scaled_row(&mut self, target: RowIndex, source: RowIndex, multiplier: Entry) {
        assert_ne!(target, source, "cannot add a row to itself");
        let cols = self.cols;
        for j in 0..cols {
            let value = self.data[source * cols + j];
            self.data[target * cols + j] += multiplier * value;
        }
    }
}

impl std::ops::Index<(RowIndex, ColumnIndex)> for DenseMatrix {
    type Output = Entry;
    fn index(&self, (i, j): (RowIndex, ColumnIndex)) -> &Entry {
        debug_assert!(j < self.cols, "column {j} out of bound {}", self.cols);
        &self.data[i * self.cols + j]
    }
}

impl std::ops::IndexMut<(RowIndex, ColumnIndex)> for DenseMatrix {
    fn index_mut(&mut self, (i, j): (RowIndex, ColumnIndex)) -> &mut Entry {
        debug_assert!(j < self.cols, "column {j} out of bound {}", self.cols);
        &mut self.data[i * self.cols + j]
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn matrix_construction_1() {
        // cargo test matrix_construction_1 -- --nocapture
        let identity = DenseMatrix::identity(3);
        assert_eq!(identity.row(1), &[0., 1., 0.]);
        let diagonal = DenseMatrix::leading_diagonal(4, 2, 2);
        assert_eq!(diagonal.data, vec![1., 0., 0., 1., 0., 0., 0., 0.]);
        let matrix = DenseMatrix::from_rows(vec![vec![1., 2.], vec![3., 4.], vec![5., 6.]]).unwrap();
        assert_eq!((matrix.rows, matrix.cols), (3, 2));
        assert_eq!(matrix[(2, 1)], 6.);
        assert_eq!(matrix.rows_slice(RowRange::new(1, 3)), &[3., 4., 5., 6.]);
    }

    #[test]
    fn matrix_invalid_shape_1() {
        // cargo test matrix_invalid_shape_1 -- --nocapture
        assert!(matches!(
            DenseMatrix::from_rows(vec![vec![1., 2.], vec![3.]]),
            Err(RankError::InvalidShape { .. })
        ));
        assert_eq!(
            DenseMatrix::from_data(2, 2, vec![1., 2., 3.]),
            Err(RankError::InvalidShape { rows: 2, cols: 2, actual: 3 })
        );
        let parsed: DenseMatrix = serde_json::from_str(r#"{"rows": 1, "cols": 2, "data": [1.5, -2]}"#).unwrap();
        assert!(parsed.sanity_check().is_ok());
        assert_eq!(parsed.row(0), &[1.5, -2.]);
    }

    #[test]
    fn matrix_add_scaled_row_1() {
        // cargo test matrix_add_scaled_row_1 -- --nocapture
        let mut matrix = DenseMatrix::identity(2);
        matrix.add_scaled_row(0, 1, -0.5);
        assert_eq!(matrix.data, vec![1., -0.5, 0., 1.]);
    }
}
