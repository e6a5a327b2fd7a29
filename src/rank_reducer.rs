//! Rank Reducer
//!
//! Every accepted pivot marks exactly one row as used, so the rank is the number of used rows summed over
//! all participants.
//!

use super::communicator::*;
use super::error::*;
use super::partitioner::*;

/// the rank of the whole matrix, identical at every participant
pub fn reduce_rank<C: Communicator>(communicator: &C, block: &RowBlock) -> RankResult<usize> {
    let local_pivots = block.used_count();
    let rank = communicator.reduce_sum(local_pivots)?;
    tracing::trace!("process {} used {local_pivots} pivot rows, rank {rank}", communicator.rank());
    Ok(rank)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::util::*;

    #[test]
    fn rank_reducer_sum_1() {
        // cargo test rank_reducer_sum_1 -- --nocapture
        let partition = RowPartition::new(7, 3).unwrap();
        let ranks = LocalGroup::run(3, |communicator| {
            let rank = communicator.rank();
            let block_range = partition.block(rank);
            let mut block = RowBlock::new(rank, block_range, 1, vec![0.; block_range.len()])?;
            // participant p used its first p rows
            for local_index in 0..rank {
                block.row_used[local_index] = true;
            }
            reduce_rank(&communicator, &block)
        })
        .unwrap();
        assert_eq!(ranks, vec![3, 3, 3]);
    }

    #[test]
    fn rank_reducer_single_process_1() {
        // cargo test rank_reducer_single_process_1 -- --nocapture
        let mut block = RowBlock::new(0, RowRange::new(0, 3), 2, vec![0.; 6]).unwrap();
        block.row_used[2] = true;
        assert_eq!(reduce_rank(&SingleProcessCommunicator::new(), &block), Ok(1));
    }
}
