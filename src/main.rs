extern crate clap;
extern crate pbr;

use clap::{Parser, Subcommand};
use parallel_rank::analysis::*;
use parallel_rank::communicator::*;
use parallel_rank::error::*;
use parallel_rank::matrix::*;
use parallel_rank::matrix_generator::*;
use parallel_rank::rank_solver::*;
use parallel_rank::util::*;
use pbr::ProgressBar;
use rand_xoshiro::rand_core::SeedableRng;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Clone)]
#[clap(author = clap::crate_authors!(", "))]
#[clap(version = env!("CARGO_PKG_VERSION"))]
#[clap(about = "Matrix rank by row-partitioned Gaussian elimination over a group of cooperating processes")]
#[clap(color = clap::ColorChoice::Auto)]
#[clap(propagate_version = true)]
#[clap(subcommand_required = true)]
#[clap(arg_required_else_help = true)]
pub struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// compare the sequential and the distributed solver on random matrices
    Benchmark {
        /// the number of rows
        #[clap(value_parser)]
        size: usize,
        /// the number of columns, default to a square matrix
        #[clap(long, value_parser)]
        cols: Option<usize>,
        /// the number of participants in the process group
        #[clap(short = 'p', long, default_value_t = 4)]
        processes: usize,
        /// the number of random matrices
        #[clap(short = 'r', long, default_value_t = 3)]
        rounds: usize,
        /// the seed of the first matrix, then increased by one each round
        #[clap(long, default_value_t = 42)]
        seed: u64,
        /// cores available to each participant, used in efficiency analysis
        #[clap(long, default_value_t = 1)]
        cores_per_node: usize,
        /// mean time between failures of a single node, in hours
        #[clap(long, default_value_t = 8760.)]
        node_mtbf: f64,
        /// expected duration of the task, in hours
        #[clap(long, default_value_t = 1.)]
        task_duration: f64,
        /// write one JSON line per round to this file
        #[clap(long, value_parser)]
        benchmark_profiler_output: Option<String>,
        /// solver configuration in JSON, e.g. {"epsilon":1e-12,"thread_pool_size":2}
        #[clap(long, default_value_t = ("{}").to_string())]
        solver_config: String,
    },
    /// compute the rank of a matrix with a planted rank
    KnownRank {
        /// the size of the square matrix
        #[clap(value_parser)]
        size: usize,
        /// the planted rank, at most `size`
        #[clap(value_parser)]
        rank: usize,
        /// the number of participants in the process group
        #[clap(short = 'p', long, default_value_t = 4)]
        processes: usize,
        #[clap(long, default_value_t = 42)]
        seed: u64,
    },
    /// run as one of the processes started by `mpirun -n <P>`; the root generates the matrix and reports
    #[cfg(feature = "mpi_communicator")]
    Mpi {
        /// the size of the square matrix
        #[clap(value_parser)]
        size: usize,
        /// plant this rank instead of generating uniformly random entries
        #[clap(long, value_parser)]
        rank: Option<usize>,
        #[clap(long, default_value_t = 42)]
        seed: u64,
        /// cores available to each process, used in efficiency analysis
        #[clap(long, default_value_t = 1)]
        cores_per_node: usize,
        /// solver configuration in JSON
        #[clap(long, default_value_t = ("{}").to_string())]
        solver_config: String,
    },
    /// compute the rank of a matrix loaded from a JSON file
    File {
        /// a JSON file of the form {"rows": 2, "cols": 2, "data": [1, 0, 0, 1]}
        #[clap(value_parser)]
        path: String,
        /// the number of participants in the process group
        #[clap(short = 'p', long, default_value_t = 4)]
        processes: usize,
    },
}

/// run the distributed solver over an in-process group, returning the rank and the elapsed time in seconds
fn distributed_solve(solver: &SolverDistributed, matrix: &DenseMatrix, process_num: usize) -> RankResult<(usize, f64)> {
    let begin_time = Instant::now();
    let ranks = LocalGroup::run(process_num, |communicator| {
        let matrix = if communicator.is_root(ROOT_PROCESS) { Some(matrix) } else { None };
        solver.solve(&communicator, matrix)
    })?;
    let elapsed = begin_time.elapsed().as_secs_f64();
    for (process, rank) in ranks.iter().enumerate() {
        assert_eq!(*rank, ranks[ROOT_PROCESS], "process {process} disagrees on the rank");
    }
    Ok((ranks[ROOT_PROCESS], elapsed))
}

impl Cli {
    pub fn run(self) -> RankResult<()> {
        match self.command {
            Commands::Benchmark {
                size,
                cols,
                processes,
                rounds,
                seed,
                cores_per_node,
                node_mtbf,
                task_duration,
                benchmark_profiler_output,
                solver_config,
            } => {
                let cols = cols.unwrap_or(size);
                if cores_per_node == 0 {
                    return Err(RankError::InvalidArgument("at least one core per node required".to_string()));
                }
                let fault_tolerance = FaultToleranceReport::new(processes, node_mtbf, task_duration)?;
                let config = RankSolverConfig::from_json(serde_json::from_str(&solver_config)?)?;
                let mut serial = SolverSerial::new(config.clone());
                let distributed = SolverDistributed::new(config)?;
                let mut profiler = BenchmarkProfiler::new(processes, benchmark_profiler_output)?;
                tracing::info!("benchmark {rounds} random {size}x{cols} matrices with {processes} processes");
                let mut sequential_time = 0.;
                let mut parallel_time = 0.;
                let mut pb = ProgressBar::on(std::io::stderr(), rounds as u64);
                for round in 0..rounds {
                    pb.set(round as u64);
                    let mut rng = DeterministicRng::seed_from_u64(seed + round as u64);
                    let matrix = generate_random_matrix(&mut rng, size, cols);
                    profiler.begin(size, cols);
                    let sequential = serial.solve(&matrix);
                    profiler.event("sequential".to_string());
                    let (rank, elapsed) = distributed_solve(&distributed, &matrix, processes)?;
                    profiler.end(rank)?;
                    assert_eq!(rank, sequential, "distributed rank differs from the sequential one at round {round}");
                    sequential_time += serial.last_execution_time.unwrap_or(0.);
                    parallel_time += elapsed;
                    tracing::debug!("round {round}: rank {rank}");
                }
                pb.finish();
                eprintln!();
                if let Some(entry) = profiler.records.last() {
                    println!("Matrix rank: {}", entry.rank.unwrap_or(0));
                }
                println!("{}", profiler.brief());
                if rounds > 0 {
                    print!("{}", PerformanceReport::new(sequential_time, parallel_time, processes, cores_per_node)?);
                }
                print!("{fault_tolerance}");
            }
            Commands::KnownRank {
                size,
                rank,
                processes,
                seed,
            } => {
                let mut rng = DeterministicRng::seed_from_u64(seed);
                let matrix = generate_matrix_with_known_rank(&mut rng, size, rank)?;
                let distributed = SolverDistributed::new(RankSolverConfig::default())?;
                let (computed, elapsed) = distributed_solve(&distributed, &matrix, processes)?;
                tracing::info!("planted rank {rank}, computed rank {computed} in {elapsed:.3e}s");
                println!("{computed}");
            }
            #[cfg(feature = "mpi_communicator")]
            Commands::Mpi {
                size,
                rank,
                seed,
                cores_per_node,
                solver_config,
            } => {
                let communicator = MpiCommunicator::initialize()?;
                let config = RankSolverConfig::from_json(serde_json::from_str(&solver_config)?)?;
                let distributed = SolverDistributed::new(config.clone())?;
                // a root that fails to generate the matrix still takes part, so that its peers fail instead of waiting
                let (matrix, generation_error) = if communicator.is_root(ROOT_PROCESS) {
                    let mut rng = DeterministicRng::seed_from_u64(seed);
                    let generated = match rank {
                        Some(rank) => generate_matrix_with_known_rank(&mut rng, size, rank),
                        None => Ok(generate_random_matrix(&mut rng, size, size)),
                    };
                    match generated {
                        Ok(matrix) => (Some(matrix), None),
                        Err(err) => (None, Some(err)),
                    }
                } else {
                    (None, None)
                };
                let begin_time = Instant::now();
                let result = distributed.solve(&communicator, matrix.as_ref());
                let elapsed = begin_time.elapsed().as_secs_f64();
                if let Some(err) = generation_error {
                    return Err(err);
                }
                let computed = result?;
                if let Some(matrix) = matrix.as_ref() {
                    let mut serial = SolverSerial::new(config);
                    let sequential = serial.solve(matrix);
                    assert_eq!(computed, sequential, "distributed rank differs from the sequential one");
                    println!("Matrix rank: {computed}");
                    let sequential_time = serial.last_execution_time.unwrap_or(0.);
                    print!(
                        "{}",
                        PerformanceReport::new(sequential_time, elapsed, communicator.size(), cores_per_node)?
                    );
                }
            }
            Commands::File { path, processes } => {
                let matrix = DenseMatrix::from_json_file(&path)?;
                let distributed = SolverDistributed::new(RankSolverConfig::default())?;
                let (rank, elapsed) = distributed_solve(&distributed, &matrix, processes)?;
                tracing::info!("{}x{} matrix from {path} has rank {rank}, computed in {elapsed:.3e}s", matrix.rows, matrix.cols);
                println!("{rank}");
            }
        }
        Ok(())
    }
}

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    if let Err(err) = Cli::parse().run() {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}
