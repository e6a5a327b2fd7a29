//! Analysis
//!
//! Closed-form reports computed from measured run times and the size of the process group.
//! None of these feed back into the elimination.
//!

use super::error::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// the estimated parallel fraction is kept within this range
pub const PARALLEL_FRACTION_BOUNDS: (f64, f64) = (0.5, 0.99);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// sequential execution time in seconds
    pub sequential_time: f64,
    /// distributed execution time in seconds
    pub parallel_time: f64,
    /// the number of participants
    pub process_num: usize,
    /// cores available to each participant
    pub cores_per_node: usize,
    /// `sequential_time / parallel_time`
    pub speedup: f64,
    /// speedup per participant
    pub process_efficiency: f64,
    /// speedup per core, also the strong scaling efficiency
    pub efficiency: f64,
    /// fraction of the work that benefits from parallelism, estimated from Amdahl's law
    pub parallel_fraction: f64,
    /// (core count, predicted speedup) for 2, 4, 8 and 16 times the current core count
    pub predicted_speedups: Vec<(usize, f64)>,
}

impl PerformanceReport {
    pub fn new(sequential_time: f64, parallel_time: f64, process_num: usize, cores_per_node: usize) -> RankResult<Self> {
        if process_num == 0 || cores_per_node == 0 {
            return Err(RankError::InvalidArgument(format!(
                "at least one core required, got {process_num} processes with {cores_per_node} cores each"
            )));
        }
        let total_cores = process_num * cores_per_node;
        let speedup = sequential_time / parallel_time;
        let parallel_fraction = estimate_parallel_fraction(speedup, total_cores);
        let predicted_speedups = [2, 4, 8, 16]
            .iter()
            .map(|factor| {
                let cores = total_cores * factor;
                (cores, amdahl_speedup(parallel_fraction, cores))
            })
            .collect();
        Ok(Self {
            sequential_time,
            parallel_time,
            process_num,
            cores_per_node,
            speedup,
            process_efficiency: speedup / process_num as f64,
            efficiency: speedup / total_cores as f64,
            parallel_fraction,
            predicted_speedups,
        })
    }

    pub fn total_cores(&self) -> usize {
        self.process_num * self.cores_per_node
    }
}

/// speedup on `cores` cores when a fraction `parallel_fraction` of the work is parallel
pub fn amdahl_speedup(parallel_fraction: f64, cores: usize) -> f64 {
    1. / ((1. - parallel_fraction) + parallel_fraction / cores as f64)
}

/// invert Amdahl's law: the serial fraction measured by the Karp-Flatt metric is `(N/S - 1) / (N - 1)`.
/// Note that the parallel fraction is its complement; clamping `(N/S - 1) / (N - 1)` itself gives different numbers
pub fn estimate_parallel_fraction(speedup: f64, cores: usize) -> f64 {
    let (lower, upper) = PARALLEL_FRACTION_BOUNDS;
    if cores <= 1 || !speedup.is_finite() || speedup <= 0. {
        return lower;
    }
    let cores = cores as f64;
    let serial_fraction = (cores / speedup - 1.) / (cores - 1.);
    (1. - serial_fraction).clamp(lower, upper)
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Performance Analysis:")?;
        writeln!(f, "Sequential execution time: {:.2} ms", self.sequential_time * 1e3)?;
        writeln!(f, "Parallel execution time: {:.2} ms", self.parallel_time * 1e3)?;
        writeln!(f, "Speedup: {:.2}x", self.speedup)?;
        writeln!(f, "Efficiency per process: {:.2}", self.process_efficiency)?;
        writeln!(f, "Efficiency per core ({} cores): {:.2}", self.total_cores(), self.efficiency)?;
        writeln!(f, "Strong scaling efficiency: {:.2}%", self.efficiency * 100.)?;
        writeln!(f, "Estimated parallel fraction: {:.4}", self.parallel_fraction)?;
        writeln!(f, "Predicted speedup for different core counts:")?;
        for (cores, speedup) in self.predicted_speedups.iter() {
            writeln!(f, "  {cores} cores: {speedup:.2}x speedup")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultToleranceReport {
    pub node_count: usize,
    /// mean time between failures of a single node, in hours
    pub node_mtbf: f64,
    /// duration of the task, in hours
    pub task_duration: f64,
    /// probability that a given node fails during the task, assuming exponentially distributed failures
    pub node_failure_probability: f64,
    /// probability that at least one node fails; any failure aborts the whole computation
    pub system_failure_probability: f64,
}

impl FaultToleranceReport {
    pub fn new(node_count: usize, node_mtbf: f64, task_duration: f64) -> RankResult<Self> {
        if !(node_mtbf > 0.) || !(task_duration >= 0.) {
            return Err(RankError::InvalidArgument(format!(
                "MTBF must be positive and task duration non-negative, got {node_mtbf} and {task_duration}"
            )));
        }
        let node_failure_probability = 1. - (-task_duration / node_mtbf).exp();
        let system_failure_probability = 1. - (1. - node_failure_probability).powi(node_count as i32);
        Ok(Self {
            node_count,
            node_mtbf,
            task_duration,
            node_failure_probability,
            system_failure_probability,
        })
    }
}

impl fmt::Display for FaultToleranceReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Fault Tolerance Analysis:")?;
        writeln!(f, "Node count: {}", self.node_count)?;
        writeln!(f, "Node MTBF (hours): {}", self.node_mtbf)?;
        writeln!(f, "Task duration (hours): {}", self.task_duration)?;
        writeln!(
            f,
            "Probability of node failure during task: {:.4}%",
            self.node_failure_probability * 100.
        )?;
        writeln!(
            f,
            "Probability of at least one node failure: {:.4}%",
            self.system_failure_probability * 100.
        )
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn analysis_performance_1() {
        // cargo test analysis_performance_1 -- --nocapture
        let report = PerformanceReport::new(0.1, 0.025, 2, 4).unwrap();
        assert_close(report.speedup, 4.);
        assert_close(report.process_efficiency, 2.);
        assert_close(report.efficiency, 0.5);
        // serial fraction (8 / 4 - 1) / 7 = 1 / 7
        assert_close(report.parallel_fraction, 6. / 7.);
        assert_eq!(report.predicted_speedups.len(), 4);
        assert_eq!(report.predicted_speedups[0].0, 16);
        assert_close(report.predicted_speedups[0].1, 1. / (1. / 7. + 6. / 7. / 16.));
        println!("{report}");
    }

    #[test]
    fn analysis_parallel_fraction_bounds_1() {
        // cargo test analysis_parallel_fraction_bounds_1 -- --nocapture
        assert_close(estimate_parallel_fraction(0.5, 8), 0.5);
        assert_close(estimate_parallel_fraction(8., 8), 0.99);
        assert_close(estimate_parallel_fraction(3., 1), 0.5);
        assert_close(estimate_parallel_fraction(f64::INFINITY, 8), 0.5);
        assert_close(amdahl_speedup(1., 10), 10.);
        assert_close(amdahl_speedup(0., 10), 1.);
    }

    #[test]
    fn analysis_fault_tolerance_1() {
        // cargo test analysis_fault_tolerance_1 -- --nocapture
        let report = FaultToleranceReport::new(4, 8760., 1.).unwrap();
        let node = 1. - (-1f64 / 8760.).exp();
        assert_close(report.node_failure_probability, node);
        assert_close(report.system_failure_probability, 1. - (1. - node).powi(4));
        assert!(report.system_failure_probability > report.node_failure_probability);
        let single = FaultToleranceReport::new(1, 100., 0.).unwrap();
        assert_close(single.system_failure_probability, 0.);
        println!("{report}");
    }

    #[test]
    fn analysis_invalid_argument_1() {
        // cargo test analysis_invalid_argument_1 -- --nocapture
        assert!(matches!(
            PerformanceReport::new(1., 0.5, 4, 0),
            Err(RankError::InvalidArgument(_))
        ));
        assert!(matches!(
            PerformanceReport::new(1., 0.5, 0, 2),
            Err(RankError::InvalidArgument(_))
        ));
        for (node_mtbf, task_duration) in [(0., 1.), (-5., 1.), (f64::NAN, 1.), (100., -1.)] {
            assert!(matches!(
                FaultToleranceReport::new(4, node_mtbf, task_duration),
                Err(RankError::InvalidArgument(_))
            ));
        }
    }
}
