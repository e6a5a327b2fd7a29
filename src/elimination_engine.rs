//! Elimination Engine
//!
//! Once a pivot is agreed on, its owner normalizes the pivot row and broadcasts it; then every participant
//! clears the pivot column from all its other rows, above and below the pivot alike.
//! Only the columns from the pivot column onward are touched: the leading columns were already reduced.
//!
//! The sweep over local rows is data parallel: rows are disjoint and the pivot row is read-only.
//! It finishes before the caller takes part in the next collective call.
//!

use super::communicator::*;
use super::error::*;
use super::partitioner::*;
use super::pivot_coordinator::*;
use super::util::*;
use crate::rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// the normalized pivot row, a private copy at every participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRow {
    /// the pivot column
    pub column: ColumnIndex,
    /// entries from `column` to the last column, so `values[0]` is always 1
    pub values: Vec<Entry>,
}

impl PivotRow {
    pub fn empty(column: ColumnIndex) -> Self {
        Self { column, values: vec![] }
    }
}

/// divide the pivot row by its pivot entry and mark it used
pub fn normalize_pivot_row(block: &mut RowBlock, local_index: usize, column: ColumnIndex) -> PivotRow {
    debug_assert!(!block.row_used[local_index], "a row can only be pivot once");
    block.row_used[local_index] = true;
    let row = block.row_mut(local_index);
    let pivot_value = row[column];
    for value in row[column..].iter_mut() {
        *value /= pivot_value;
    }
    PivotRow {
        column,
        values: row[column..].to_vec(),
    }
}

/// the owner normalizes the pivot row and broadcasts it, everyone returns a copy of it
pub fn share_pivot_row<C: Communicator>(
    communicator: &C,
    block: &mut RowBlock,
    pivot: &GlobalPivot,
    column: ColumnIndex,
) -> RankResult<PivotRow> {
    let mut pivot_row = if communicator.is_root(pivot.process) {
        let local_index = block.range.local_index(pivot.row_index).ok_or(RankError::ForeignPivot {
            process: pivot.process,
            row: pivot.row_index,
            block: block.range,
        })?;
        normalize_pivot_row(block, local_index, column)
    } else {
        PivotRow::empty(column)
    };
    communicator.broadcast(&mut pivot_row, pivot.process)?;
    let expected = block.cols - column;
    if pivot_row.column != column || pivot_row.values.len() != expected {
        return Err(RankError::BlockMismatch {
            process: communicator.rank(),
            expected,
            actual: pivot_row.values.len(),
        });
    }
    Ok(pivot_row)
}

/// subtract `factor * pivot_row` from every local row except `skip_local`, where `factor` is the row's entry
/// in the pivot column; rows whose entry is already negligible are left alone
pub fn eliminate(block: &mut RowBlock, pivot_row: &PivotRow, skip_local: Option<usize>, epsilon: Entry) {
    if block.local_rows() == 0 {
        return;
    }
    let column = pivot_row.column;
    debug_assert_eq!(pivot_row.values.len(), block.cols - column);
    block
        .data
        .par_chunks_mut(block.cols)
        .enumerate()
        .filter(|(local_index, _)| Some(*local_index) != skip_local)
        .for_each(|(_, row)| {
            let factor = row[column];
            if factor.abs() > epsilon {
                for (value, pivot_value) in row[column..].iter_mut().zip(pivot_row.values.iter()) {
                    *value -= factor * pivot_value;
                }
            }
        });
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn elimination_engine_normalize_1() {
        // cargo test elimination_engine_normalize_1 -- --nocapture
        let mut block = RowBlock::new(0, RowRange::new(0, 2), 3, vec![1., 2., 4., 5., -2., 8.]).unwrap();
        let pivot_row = normalize_pivot_row(&mut block, 1, 1);
        assert_eq!(pivot_row, PivotRow { column: 1, values: vec![1., -4.] });
        // the leading column is left untouched
        assert_eq!(block.row(1), &[5., 1., -4.]);
        assert_eq!(block.row_used, vec![false, true]);
        assert_eq!(block.used_count(), 1);
    }

    #[test]
    fn elimination_engine_eliminate_1() {
        // cargo test elimination_engine_eliminate_1 -- --nocapture
        let data = vec![
            2., 4., 6., //
            1., 1., 1., //
            0., 3., 3., //
            1e-12, 5., 5., //
        ];
        let mut block = RowBlock::new(0, RowRange::new(0, 4), 3, data).unwrap();
        let pivot_row = normalize_pivot_row(&mut block, 0, 0);
        eliminate(&mut block, &pivot_row, Some(0), DEFAULT_EPSILON);
        assert_eq!(block.row(0), &[1., 2., 3.]);
        assert_eq!(block.row(1), &[0., -1., -2.]);
        assert_eq!(block.row(2), &[0., 3., 3.]);
        // negligible entries are not eliminated
        assert_eq!(block.row(3), &[1e-12, 5., 5.]);
    }

    #[test]
    fn elimination_engine_eliminate_rows_above_pivot_1() {
        // cargo test elimination_engine_eliminate_rows_above_pivot_1 -- --nocapture
        let mut block = RowBlock::new(0, RowRange::new(0, 2), 2, vec![1., 3., 0., 2.]).unwrap();
        block.row_used[0] = true;
        let pivot_row = normalize_pivot_row(&mut block, 1, 1);
        eliminate(&mut block, &pivot_row, Some(1), DEFAULT_EPSILON);
        assert_eq!(block.data, vec![1., 0., 0., 1.]);
    }

    #[test]
    fn elimination_engine_share_pivot_row_1() {
        // cargo test elimination_engine_share_pivot_row_1 -- --nocapture
        let partition = RowPartition::new(4, 2).unwrap();
        let blocks = LocalGroup::run(2, |communicator| {
            let rank = communicator.rank();
            let data = [vec![1., 1., 2., 2.], vec![0., 4., 3., 3.]][rank].clone();
            let mut block = RowBlock::new(rank, partition.block(rank), 2, data)?;
            let pivot = GlobalPivot { row_index: 2, process: 1 };
            let pivot_row = share_pivot_row(&communicator, &mut block, &pivot, 1)?;
            let skip_local = if rank == pivot.process { block.range.local_index(pivot.row_index) } else { None };
            eliminate(&mut block, &pivot_row, skip_local, DEFAULT_EPSILON);
            Ok((pivot_row, block))
        })
        .unwrap();
        for (pivot_row, _) in blocks.iter() {
            assert_eq!(pivot_row, &PivotRow { column: 1, values: vec![1.] });
        }
        assert_eq!(blocks[0].1.data, vec![1., 0., 2., 0.]);
        assert_eq!(blocks[1].1.data, vec![0., 1., 3., 0.]);
        assert_eq!(blocks[1].1.row_used, vec![true, false]);
    }

    #[test]
    fn elimination_engine_malformed_pivot_row_1() {
        // cargo test elimination_engine_malformed_pivot_row_1 -- --nocapture
        // participants disagree on the number of columns, so the broadcast pivot row has the wrong length
        let partition = RowPartition::new(2, 2).unwrap();
        let result = LocalGroup::run(2, |communicator| {
            let rank = communicator.rank();
            let cols = [3, 2][rank];
            let mut block = RowBlock::new(rank, partition.block(rank), cols, vec![2.; cols])?;
            let pivot = GlobalPivot { row_index: 0, process: 0 };
            share_pivot_row(&communicator, &mut block, &pivot, 1)
        });
        assert_eq!(
            result,
            Err(RankError::BlockMismatch {
                process: 1,
                expected: 1,
                actual: 2
            })
        );
    }

    #[test]
    fn elimination_engine_foreign_pivot_1() {
        // cargo test elimination_engine_foreign_pivot_1 -- --nocapture
        // the designated owner does not hold the pivot row
        let partition = RowPartition::new(4, 2).unwrap();
        let result = LocalGroup::run(2, |communicator| {
            let rank = communicator.rank();
            let mut block = RowBlock::new(rank, partition.block(rank), 1, vec![1.; 2])?;
            let pivot = GlobalPivot { row_index: 3, process: 0 };
            share_pivot_row(&communicator, &mut block, &pivot, 0)
        });
        assert_eq!(
            result,
            Err(RankError::ForeignPivot {
                process: 0,
                row: 3,
                block: RowRange::new(0, 2)
            })
        );
    }
}
