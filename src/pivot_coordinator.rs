//! Pivot Coordinator
//!
//! Agrees on the pivot of one column across the whole group. Every participant proposes its best unused
//! local row, the root picks the best proposal and tells everyone which global row won and who owns it.
//!
//! Ties are broken towards the lower index at both levels: inside a block the first row reaching a new
//! maximum wins, across blocks the lowest rank wins. Since blocks are ordered by rank, the chosen row is
//! the one a single process scanning the whole matrix top to bottom would choose.
//!

use super::communicator::*;
use super::error::*;
use super::partitioner::*;
use super::util::*;
use crate::rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// the best unused row of one participant for the current column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotCandidate {
    /// absolute value of the entry in the current column
    pub magnitude: Entry,
    /// global index of the row, `None` if no row qualifies
    pub row_index: Option<RowIndex>,
}

impl PivotCandidate {
    /// the sentinel reported when no local row qualifies
    pub fn none() -> Self {
        Self {
            magnitude: 0.,
            row_index: None,
        }
    }
}

/// the pivot everyone agreed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPivot {
    /// global index of the pivot row
    pub row_index: RowIndex,
    /// the participant owning the pivot row
    pub process: ProcessRank,
}

/// the unused local row with the largest magnitude in `column` strictly above `epsilon`
pub fn local_candidate(block: &RowBlock, column: ColumnIndex, epsilon: Entry) -> PivotCandidate {
    if block.local_rows() == 0 {
        return PivotCandidate::none();
    }
    assert!(column < block.cols, "column {column} out of bound {}", block.cols);
    let best = block
        .data
        .par_chunks(block.cols)
        .zip(block.row_used.par_iter())
        .enumerate()
        .filter(|&(_, (_, used))| !*used)
        .map(|(local_index, (row, _))| (row[column].abs(), local_index))
        .filter(|&(magnitude, _)| magnitude > epsilon)
        .reduce_with(|best, other| {
            // equal magnitude keeps the lower index, whatever order the halves are combined in
            if other.0 > best.0 || (other.0 == best.0 && other.1 < best.1) {
                other
            } else {
                best
            }
        });
    match best {
        Some((magnitude, local_index)) => PivotCandidate {
            magnitude,
            row_index: Some(block.range.start() + local_index),
        },
        None => PivotCandidate::none(),
    }
}

/// scan the reports in increasing rank and keep the first one strictly greater than both `epsilon` and
/// everything before it
pub fn select_global_pivot(reports: &[PivotCandidate], epsilon: Entry) -> Option<GlobalPivot> {
    let mut max_magnitude = epsilon;
    let mut winner = None;
    for (process, candidate) in reports.iter().enumerate() {
        if let Some(row_index) = candidate.row_index {
            if candidate.magnitude > max_magnitude {
                max_magnitude = candidate.magnitude;
                winner = Some(GlobalPivot { row_index, process });
            }
        }
    }
    winner
}

/// gather every participant's candidate at the root, select the winner there and broadcast it;
/// `None` at every participant means the column has no pivot
pub fn coordinate_pivot<C: Communicator>(
    communicator: &C,
    partition: &RowPartition,
    candidate: PivotCandidate,
    epsilon: Entry,
) -> RankResult<Option<GlobalPivot>> {
    let mut winner = match communicator.gather(candidate, ROOT_PROCESS)? {
        Some(reports) => select_global_pivot(&reports, epsilon),
        None => None,
    };
    if let Some(pivot) = winner.as_ref() {
        if partition.owner_of(pivot.row_index) != Some(pivot.process) {
            return Err(RankError::ForeignPivot {
                process: pivot.process,
                row: pivot.row_index,
                block: partition.block(pivot.process),
            });
        }
    }
    communicator.broadcast(&mut winner, ROOT_PROCESS)?;
    Ok(winner)
}
