//! Matrix Rank Solver
//!
//! This module ties the partitioner, the pivot coordinator, the elimination engine and the rank reducer
//! together. [`SolverDistributed`] runs at every participant of a process group; [`SolverSerial`] is the
//! single-process reference with the same pivoting rules, used to check the distributed result.
//!

use super::communicator::*;
use super::elimination_engine::*;
use super::error::*;
use super::matrix::*;
use super::partitioner::*;
use super::pivot_coordinator::*;
use super::rank_reducer::*;
use super::util::*;
use crate::derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RankSolverConfig {
    /// entries with magnitude not greater than this are treated as zero
    #[serde(default = "rank_solver_default_configs::epsilon")]
    pub epsilon: Entry,
    /// threads used by each participant to scan and eliminate its rows
    #[serde(default = "rank_solver_default_configs::thread_pool_size")]
    pub thread_pool_size: usize,
}

pub mod rank_solver_default_configs {
    use super::*;
    pub fn epsilon() -> Entry { DEFAULT_EPSILON }
    pub fn thread_pool_size() -> usize { 0 }  // by default share the global rayon pool
}

impl Default for RankSolverConfig {
    fn default() -> Self {
        Self {
            epsilon: rank_solver_default_configs::epsilon(),
            thread_pool_size: rank_solver_default_configs::thread_pool_size(),
        }
    }
}

impl RankSolverConfig {
    pub fn from_json(value: serde_json::Value) -> RankResult<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Gaussian elimination with partial pivoting on a single process
#[derive(Debug, Clone, Default)]
pub struct SolverSerial {
    pub config: RankSolverConfig,
    /// time of the last call to [`SolverSerial::solve`], in seconds
    pub last_execution_time: Option<f64>,
}

impl SolverSerial {
    pub fn new(config: RankSolverConfig) -> Self {
        Self {
            config,
            last_execution_time: None,
        }
    }

    /// the rank of `matrix`, which is left untouched
    pub fn solve(&mut self, matrix: &DenseMatrix) -> usize {
        let begin_time = Instant::now();
        let mut matrix = matrix.clone();
        let rank = Self::eliminate(&mut matrix, self.config.epsilon);
        self.last_execution_time = Some(begin_time.elapsed().as_secs_f64());
        rank
    }

    fn eliminate(matrix: &mut DenseMatrix, epsilon: Entry) -> usize {
        let (rows, cols) = (matrix.rows, matrix.cols);
        let mut rank = 0;
        let mut row_used = vec![false; rows];
        for column in 0..cols {
            let mut pivot = None;
            let mut max_magnitude = epsilon;
            for row in 0..rows {
                if !row_used[row] && matrix[(row, column)].abs() > max_magnitude {
                    max_magnitude = matrix[(row, column)].abs();
                    pivot = Some(row);
                }
            }
            let pivot = match pivot {
                Some(pivot) => pivot,
                None => continue,
            };
            row_used[pivot] = true;
            rank += 1;
            let pivot_value = matrix[(pivot, column)];
            for j in column..cols {
                matrix[(pivot, j)] /= pivot_value;
            }
            for row in 0..rows {
                let factor = matrix[(row, column)];
                if row != pivot && factor.abs() > epsilon {
                    for j in column..cols {
                        let pivot_entry = matrix[(pivot, j)];
                        matrix[(row, j)] -= factor * pivot_entry;
                    }
                }
            }
        }
        rank
    }
}

/// one participant of the distributed elimination
#[derive(Derivative)]
#[derivative(Debug)]
pub struct SolverDistributed {
    pub config: RankSolverConfig,
    /// `None` when using the global rayon pool
    #[derivative(Debug = "ignore")]
    thread_pool: Option<rayon::ThreadPool>,
}

impl SolverDistributed {
    pub fn new(config: RankSolverConfig) -> RankResult<Self> {
        let thread_pool = if config.thread_pool_size != 0 {
            let thread_pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.thread_pool_size)
                .build()
                .map_err(|err| RankError::ThreadPool(err.to_string()))?;
            Some(thread_pool)
        } else {
            None
        };
        Ok(Self { config, thread_pool })
    }

    /// run local computation on this solver's threads; never put communication in here
    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match self.thread_pool.as_ref() {
            Some(thread_pool) => thread_pool.install(op),
            None => op(),
        }
    }

    /// must be called by every participant of the group; `matrix` is only read at the root.
    /// Every participant returns the same rank.
    pub fn solve<C: Communicator>(&self, communicator: &C, matrix: Option<&DenseMatrix>) -> RankResult<usize> {
        let epsilon = self.config.epsilon;
        let (rows, cols) = broadcast_shape(communicator, matrix)?;
        let partition = RowPartition::new(rows, communicator.size())?;
        let mut block = partition.distribute(communicator, matrix, cols)?;
        for column in 0..cols {
            let candidate = self.install(|| local_candidate(&block, column, epsilon));
            let pivot = match coordinate_pivot(communicator, &partition, candidate, epsilon)? {
                Some(pivot) => pivot,
                None => {
                    tracing::debug!("column {column} has no pivot");
                    continue;
                }
            };
            tracing::trace!("column {column} pivot {:?}", pivot);
            let pivot_row = share_pivot_row(communicator, &mut block, &pivot, column)?;
            let skip_local = if communicator.is_root(pivot.process) {
                block.range.local_index(pivot.row_index)
            } else {
                None
            };
            self.install(|| eliminate(&mut block, &pivot_row, skip_local, epsilon));
        }
        reduce_rank(communicator, &block)
    }
}
