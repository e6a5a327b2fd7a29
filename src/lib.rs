extern crate clap;
extern crate derivative;
#[cfg(feature = "mpi_communicator")]
extern crate mpi;
extern crate parking_lot;
extern crate pbr;
extern crate rand;
extern crate rand_xoshiro;
extern crate rayon;
extern crate serde;
extern crate serde_json;

pub mod analysis;
pub mod communicator;
pub mod elimination_engine;
pub mod error;
pub mod matrix;
pub mod matrix_generator;
pub mod partitioner;
pub mod pivot_coordinator;
pub mod rank_reducer;
pub mod rank_solver;
pub mod util;

use communicator::*;
use error::*;
use matrix::*;
use rank_solver::*;
use util::*;

/// compute the rank on a single process (to optimize speed, consider reuse a [`rank_solver::SolverSerial`] object)
pub fn sequential_rank(matrix: &DenseMatrix) -> usize {
    SolverSerial::default().solve(matrix)
}

/// compute the rank with `process_num` participants running as threads of this process;
/// the result is identical to [`sequential_rank`]
pub fn parallel_rank(matrix: &DenseMatrix, process_num: usize) -> RankResult<usize> {
    matrix.sanity_check()?;
    let solver = SolverDistributed::new(RankSolverConfig::default())?;
    let ranks = LocalGroup::run(process_num, |communicator| {
        let matrix = if communicator.is_root(ROOT_PROCESS) { Some(matrix) } else { None };
        solver.solve(&communicator, matrix)
    })?;
    debug_assert!(ranks.iter().all(|rank| *rank == ranks[0]), "participants disagree on the rank");
    Ok(ranks[ROOT_PROCESS])
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn lib_scenarios_1() {
        // cargo test lib_scenarios_1 -- --nocapture
        assert_eq!(sequential_rank(&DenseMatrix::identity(10)), 10);
        assert_eq!(parallel_rank(&DenseMatrix::identity(10), 4), Ok(10));
        assert_eq!(parallel_rank(&DenseMatrix::new(10, 10), 4), Ok(0));
        assert_eq!(parallel_rank(&DenseMatrix::leading_diagonal(10, 5, 5), 3), Ok(5));
        assert_eq!(parallel_rank(&DenseMatrix::identity(3), 0), Err(RankError::EmptyGroup));
    }
}
