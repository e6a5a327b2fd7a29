//! Partitioner
//!
//! Splits the rows of the global matrix into contiguous blocks, one per participant, ordered by rank.
//! The first `rows % process_num` participants own one extra row each.
//! The coordinating process then ships every block to its owner exactly once; afterwards each participant
//! only ever touches its own [`RowBlock`].
//!

use super::communicator::*;
use super::error::*;
use super::matrix::*;
use super::util::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowPartition {
    /// the number of rows of the global matrix
    pub rows: usize,
    /// the rows owned by each participant, indexed by rank
    pub blocks: Vec<RowRange>,
}

impl RowPartition {
    pub fn new(rows: usize, process_num: usize) -> RankResult<Self> {
        if process_num == 0 {
            return Err(RankError::EmptyGroup);
        }
        let (base, remainder) = (rows / process_num, rows % process_num);
        let mut blocks = Vec::with_capacity(process_num);
        let mut offset = 0;
        for process in 0..process_num {
            let count = base + usize::from(process < remainder);
            blocks.push(RowRange::new_length(offset, count));
            offset += count;
        }
        debug_assert_eq!(offset, rows, "blocks must cover all rows");
        Ok(Self { rows, blocks })
    }

    pub fn process_num(&self) -> usize {
        self.blocks.len()
    }

    pub fn counts(&self) -> Vec<usize> {
        self.blocks.iter().map(|block| block.len()).collect()
    }

    pub fn offsets(&self) -> Vec<RowIndex> {
        self.blocks.iter().map(|block| block.start()).collect()
    }

    pub fn block(&self, process: ProcessRank) -> RowRange {
        self.blocks[process]
    }

    /// the participant that owns a global row
    pub fn owner_of(&self, row_index: RowIndex) -> Option<ProcessRank> {
        if row_index >= self.rows {
            return None;
        }
        // blocks are sorted and contiguous; empty blocks never contain anything
        let process = self.blocks.partition_point(|block| block.end() <= row_index);
        debug_assert!(self.blocks[process].contains(row_index));
        Some(process)
    }

    /// distribute the global matrix held by the root; `matrix` is ignored at every other participant
    pub fn distribute<C: Communicator>(&self, communicator: &C, matrix: Option<&DenseMatrix>, cols: usize) -> RankResult<RowBlock> {
        assert_eq!(self.process_num(), communicator.size(), "partition built for a different group");
        let process = communicator.rank();
        let block = self.block(process);
        let data = if communicator.is_root(ROOT_PROCESS) {
            let matrix = matrix.ok_or(RankError::MissingMatrix)?;
            tracing::debug!("distributing {} rows, counts {:?}, offsets {:?}", self.rows, self.counts(), self.offsets());
            for dest in (0..self.process_num()).filter(|&dest| dest != ROOT_PROCESS) {
                communicator.send(matrix.rows_slice(self.block(dest)).to_vec(), dest)?;
            }
            matrix.rows_slice(block).to_vec()
        } else {
            communicator.receive::<Vec<Entry>>(ROOT_PROCESS)?
        };
        let row_block = RowBlock::new(process, block, cols, data)?;
        let total_rows = communicator.reduce_sum(row_block.local_rows())?;
        if total_rows != self.rows {
            return Err(RankError::BlockMismatch {
                process,
                expected: self.rows,
                actual: total_rows,
            });
        }
        tracing::debug!("process {process} owns rows {:?}", block);
        Ok(row_block)
    }
}

/// agree on the shape of the global matrix held by the root; fails at every participant if the root has none
pub fn broadcast_shape<C: Communicator>(communicator: &C, matrix: Option<&DenseMatrix>) -> RankResult<(usize, usize)> {
    let mut shape = if communicator.is_root(ROOT_PROCESS) {
        matrix.map(|matrix| (matrix.rows, matrix.cols))
    } else {
        None
    };
    communicator.broadcast(&mut shape, ROOT_PROCESS)?;
    shape.ok_or(RankError::MissingMatrix)
}

/// the rows exclusively owned by one participant, mutated in place by the elimination
#[derive(Debug, Clone, PartialEq)]
pub struct RowBlock {
    /// the owner
    pub process: ProcessRank,
    /// global indices of the owned rows
    pub range: RowRange,
    /// the number of columns
    pub cols: usize,
    /// row-major entries of the owned rows
    pub data: Vec<Entry>,
    /// whether each local row has already been a pivot; set once, never cleared
    pub row_used: Vec<bool>,
}

impl RowBlock {
    pub fn new(process: ProcessRank, range: RowRange, cols: usize, data: Vec<Entry>) -> RankResult<Self> {
        let expected = range.len() * cols;
        if data.len() != expected {
            return Err(RankError::BlockMismatch {
                process,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            process,
            range,
            cols,
            data,
            row_used: vec![false; range.len()],
        })
    }

    pub fn local_rows(&self) -> usize {
        self.range.len()
    }

    pub fn row(&self, local_index: usize) -> &[Entry] {
        &self.data[local_index * self.cols..(local_index + 1) * self.cols]
    }

    pub fn row_mut(&mut self, local_index: usize) -> &mut [Entry] {
        &mut self.data[local_index * self.cols..(local_index + 1) * self.cols]
    }

    /// the number of local rows that have served as pivot
    pub fn used_count(&self) -> usize {
        self.row_used.iter().filter(|&&used| used).count()
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn partitioner_counts_and_offsets_1() {
        // cargo test partitioner_counts_and_offsets_1 -- --nocapture
        let partition = RowPartition::new(10, 3).unwrap();
        assert_eq!(partition.counts(), vec![4, 3, 3]);
        assert_eq!(partition.offsets(), vec![0, 4, 7]);
        let partition = RowPartition::new(2, 5).unwrap();
        assert_eq!(partition.counts(), vec![1, 1, 0, 0, 0]);
        assert_eq!(partition.offsets(), vec![0, 1, 2, 2, 2]);
        assert_eq!(RowPartition::new(5, 0), Err(RankError::EmptyGroup));
    }

    #[test]
    fn partitioner_exact_cover_1() {
        // cargo test partitioner_exact_cover_1 -- --nocapture
        for rows in 0..40 {
            for process_num in 1..10 {
                let partition = RowPartition::new(rows, process_num).unwrap();
                assert_eq!(partition.counts().iter().sum::<usize>(), rows);
                let mut next_row = 0;
                for (process, block) in partition.blocks.iter().enumerate() {
                    assert_eq!(block.start(), next_row, "blocks must be contiguous and ordered");
                    let expected = rows / process_num + usize::from(process < rows % process_num);
                    assert_eq!(block.len(), expected);
                    next_row = block.end();
                }
                for row in 0..rows {
                    let owner = partition.owner_of(row).unwrap();
                    assert!(partition.block(owner).contains(row));
                }
                assert_eq!(partition.owner_of(rows), None);
            }
        }
    }

    #[test]
    fn partitioner_row_block_mismatch_1() {
        // cargo test partitioner_row_block_mismatch_1 -- --nocapture
        assert_eq!(
            RowBlock::new(2, RowRange::new(3, 5), 4, vec![0.; 7]),
            Err(RankError::BlockMismatch { process: 2, expected: 8, actual: 7 })
        );
        let block = RowBlock::new(0, RowRange::new(0, 2), 2, vec![1., 2., 3., 4.]).unwrap();
        assert_eq!(block.row(1), &[3., 4.]);
        assert_eq!(block.used_count(), 0);
    }

    #[test]
    fn partitioner_distribute_1() {
        // cargo test partitioner_distribute_1 -- --nocapture
        let matrix = DenseMatrix::from_data(7, 2, (0..14).map(|value| value as Entry).collect()).unwrap();
        let blocks = LocalGroup::run(3, |communicator| {
            let is_root = communicator.is_root(ROOT_PROCESS);
            let matrix = if is_root { Some(&matrix) } else { None };
            let (rows, cols) = broadcast_shape(&communicator, matrix)?;
            let partition = RowPartition::new(rows, communicator.size())?;
            partition.distribute(&communicator, matrix, cols)
        })
        .unwrap();
        assert_eq!(blocks[0].range, RowRange::new(0, 3));
        assert_eq!(blocks[1].range, RowRange::new(3, 5));
        assert_eq!(blocks[2].range, RowRange::new(5, 7));
        assert_eq!(blocks[1].data, vec![6., 7., 8., 9.]);
        assert_eq!(blocks[2].row(1), matrix.row(6));
    }

    #[test]
    fn partitioner_missing_matrix_1() {
        // cargo test partitioner_missing_matrix_1 -- --nocapture
        let result = LocalGroup::run(4, |communicator| broadcast_shape(&communicator, None));
        assert_eq!(result, Err(RankError::MissingMatrix));
    }

    #[test]
    fn partitioner_malformed_block_1() {
        // cargo test partitioner_malformed_block_1 -- --nocapture
        // the root ships 3 entries to a participant owning 2 rows of 2 columns
        let partition = RowPartition::new(4, 2).unwrap();
        let result = LocalGroup::run(2, |communicator| {
            if communicator.is_root(ROOT_PROCESS) {
                communicator.send(vec![1., 2., 3.], 1)?;
                Ok(None)
            } else {
                partition.distribute(&communicator, None, 2).map(Some)
            }
        });
        assert_eq!(
            result,
            Err(RankError::BlockMismatch {
                process: 1,
                expected: 4,
                actual: 3
            })
        );
    }
}
