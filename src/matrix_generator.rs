//! Matrix Generator
//!
//! Random inputs for benchmarking and testing. The pseudo random number generator is always passed in
//! explicitly, so that the same seed gives the same matrix no matter which thread or test builds it.
//!

use super::error::*;
use super::matrix::*;
use super::util::*;
use rand::Rng;

/// entries of a random matrix are uniformly distributed in `[-RANDOM_ENTRY_BOUND, RANDOM_ENTRY_BOUND)`
pub const RANDOM_ENTRY_BOUND: Entry = 10.;

/// uniformly distributed entries in `[-10, 10)`
pub fn generate_random_matrix(rng: &mut DeterministicRng, rows: usize, cols: usize) -> DenseMatrix {
    let mut matrix = DenseMatrix::new(rows, cols);
    for value in matrix.data.iter_mut() {
        *value = rng.next_f64() * 2. * RANDOM_ENTRY_BOUND - RANDOM_ENTRY_BOUND;
    }
    matrix
}

/// a `size` x `size` matrix whose rank is exactly `rank`: `rank` ones are placed on the diagonal, then
/// `2 * size` random row combinations hide the structure without changing the rank
pub fn generate_matrix_with_known_rank(rng: &mut DeterministicRng, size: usize, rank: usize) -> RankResult<DenseMatrix> {
    if rank > size {
        return Err(RankError::InvalidRank { rank, size });
    }
    let mut matrix = DenseMatrix::leading_diagonal(size, size, rank);
    scramble_rows(rng, &mut matrix, size * 2);
    Ok(matrix)
}

/// apply random invertible row operations "row a += multiplier * row b" with `a != b` and multiplier in `[-1, 1)`
pub fn scramble_rows(rng: &mut DeterministicRng, matrix: &mut DenseMatrix, operations: usize) {
    if matrix.rows == 0 {
        return;
    }
    for _ in 0..operations {
        let target = rng.gen_range(0..matrix.rows);
        let source = rng.gen_range(0..matrix.rows);
        if target != source {
            let multiplier = rng.next_f64() * 2. - 1.;
            matrix.add_scaled_row(target, source, multiplier);
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::rand_xoshiro::rand_core::SeedableRng;

    #[test]
    fn matrix_generator_random_1() {
        // cargo test matrix_generator_random_1 -- --nocapture
        let matrix_1 = generate_random_matrix(&mut DeterministicRng::seed_from_u64(42), 7, 5);
        let matrix_2 = generate_random_matrix(&mut DeterministicRng::seed_from_u64(42), 7, 5);
        let matrix_3 = generate_random_matrix(&mut DeterministicRng::seed_from_u64(43), 7, 5);
        assert_eq!(matrix_1, matrix_2);
        assert_ne!(matrix_1, matrix_3);
        assert_eq!(matrix_1.data.len(), 35);
        for &value in matrix_1.data.iter() {
            assert!((-RANDOM_ENTRY_BOUND..RANDOM_ENTRY_BOUND).contains(&value));
        }
    }

    #[test]
    fn matrix_generator_known_rank_1() {
        // cargo test matrix_generator_known_rank_1 -- --nocapture
        let mut rng = DeterministicRng::seed_from_u64(0);
        let matrix = generate_matrix_with_known_rank(&mut rng, 10, 5).unwrap();
        assert_eq!((matrix.rows, matrix.cols), (10, 10));
        // row operations only mix rows, so the trailing columns stay zero
        for i in 0..10 {
            for j in 5..10 {
                assert_eq!(matrix[(i, j)], 0.);
            }
        }
        assert_ne!(matrix, DenseMatrix::leading_diagonal(10, 10, 5), "structure should be scrambled");
    }

    #[test]
    fn matrix_generator_invalid_rank_1() {
        // cargo test matrix_generator_invalid_rank_1 -- --nocapture
        let mut rng = DeterministicRng::seed_from_u64(0);
        assert_eq!(
            generate_matrix_with_known_rank(&mut rng, 3, 4),
            Err(RankError::InvalidRank { rank: 4, size: 3 })
        );
        assert_eq!(generate_matrix_with_known_rank(&mut rng, 0, 0).unwrap().data.len(), 0);
    }
}
