//! The pairwise distance store: a lower-triangular matrix kept as a linear
//! buffer, plus the per-point core distances derived from it.

use rayon::prelude::*;

use serde::{Deserialize, Serialize};

use super::number::Number;

/// Selects the distance function used to fill the matrix. Only the Euclidean
/// metric is implemented; the enum is the seam a future metric would plug
/// into.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum DistanceKind {
    Euclidean,
}

/// Pairwise distances over a dataset, stored as the strict upper triangle of
/// the full matrix linearised row by row. The diagonal is implicitly zero and
/// `get` resolves both orientations of a pair to the same slot.
#[derive(Clone, Debug)]
pub struct DistanceMatrix {
    rows: usize,
    kind: DistanceKind,
    distances: Vec<f64>,
    core_distances: Vec<f64>,
}

fn triangular(n: usize) -> usize {
    (n * n + n) / 2
}

fn pair_distance<T: Number>(kind: DistanceKind, data: &[T], cols: usize, i: usize, j: usize) -> f64 {
    let a = &data[i * cols..(i + 1) * cols];
    let b = &data[j * cols..(j + 1) * cols];
    match kind {
        DistanceKind::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(&x, &y)| {
                let diff = x.as_f64() - y.as_f64();
                diff * diff
            })
            .sum::<f64>()
            .sqrt(),
    }
}

impl DistanceMatrix {
    /// Fills the triangular buffer from a row-major dataset of `rows` points
    /// with `cols` attributes each, then derives the core distances.
    ///
    /// # Arguments
    ///
    /// * `num_neighbors`: the 0-based position of the core distance in each
    ///   point's sorted row, i.e. `min_points - 1`. Must be below `rows`.
    pub fn compute<T: Number>(
        data: &[T],
        rows: usize,
        cols: usize,
        num_neighbors: usize,
        kind: DistanceKind,
    ) -> Self {
        // Row blocks of the strict upper triangle are contiguous, so an
        // order-preserving flat_map lands every pair in its slot.
        let distances: Vec<f64> = (0..rows)
            .into_par_iter()
            .flat_map_iter(|i| (i + 1..rows).map(move |j| pair_distance(kind, data, cols, i, j)))
            .collect();

        let mut matrix = DistanceMatrix {
            rows,
            kind,
            distances,
            core_distances: Vec::new(),
        };
        matrix.refresh_core(num_neighbors);
        matrix
    }

    /// Returns the distance between two points in O(1).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        if row == col {
            return 0.0;
        }
        let (lo, hi) = if row < col { (row, col) } else { (col, row) };
        self.distances[self.rows * lo + hi - triangular(lo + 1)]
    }

    /// Recomputes the core distances from the stored matrix, leaving the
    /// pairwise distances untouched. Used when the density parameter changes
    /// on a rerun.
    pub fn refresh_core(&mut self, num_neighbors: usize) {
        let rows = self.rows;
        let core_distances: Vec<f64> = (0..rows)
            .into_par_iter()
            .map_init(
                || vec![0.0; rows],
                |row, i| {
                    for (j, slot) in row.iter_mut().enumerate() {
                        *slot = self.get(i, j);
                    }
                    row.sort_unstable_by(f64::total_cmp);
                    row[num_neighbors]
                },
            )
            .collect();
        self.core_distances = core_distances;
    }

    /// The number of points the matrix was built over.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// The metric the matrix was filled with.
    pub fn kind(&self) -> DistanceKind {
        self.kind
    }

    /// The core distance of a single point.
    pub fn core_distance(&self, index: usize) -> f64 {
        self.core_distances[index]
    }

    /// The core distances of every point, indexed by point id.
    pub fn core_distances(&self) -> &[f64] {
        &self.core_distances
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;

    use super::{DistanceKind, DistanceMatrix};

    fn line_matrix(num_neighbors: usize) -> DistanceMatrix {
        let data: Vec<f64> = vec![0.0, 1.0, 3.0, 6.0];
        DistanceMatrix::compute(&data, 4, 1, num_neighbors, DistanceKind::Euclidean)
    }

    #[test]
    fn test_diagonal_and_symmetry() {
        let matrix = line_matrix(1);
        for i in 0..4 {
            assert_eq!(matrix.get(i, i), 0.0);
            for j in 0..4 {
                assert_eq!(matrix.get(i, j), matrix.get(j, i));
            }
        }
        assert!(approx_eq!(f64, matrix.get(0, 2), 3.0));
        assert!(approx_eq!(f64, matrix.get(3, 1), 5.0));
    }

    #[test]
    fn test_euclidean_2d() {
        let data: Vec<f64> = vec![0.0, 0.0, 3.0, 4.0];
        let matrix = DistanceMatrix::compute(&data, 2, 2, 1, DistanceKind::Euclidean);
        assert!(approx_eq!(f64, matrix.get(0, 1), 5.0));
    }

    #[test]
    fn test_integer_dataset() {
        let data: Vec<i32> = vec![0, 0, 3, 4];
        let matrix = DistanceMatrix::compute(&data, 2, 2, 1, DistanceKind::Euclidean);
        assert!(approx_eq!(f64, matrix.get(0, 1), 5.0));
    }

    #[test]
    fn test_core_distances() {
        // Sorted rows: [0,1,3,6], [0,1,2,5], [0,2,3,3], [0,3,5,6].
        let matrix = line_matrix(1);
        assert_eq!(matrix.core_distances(), &[1.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_refresh_core() {
        let mut matrix = line_matrix(1);
        matrix.refresh_core(2);
        assert_eq!(matrix.core_distances(), &[3.0, 2.0, 3.0, 5.0]);
        assert_eq!(matrix.core_distance(1), 2.0);

        // The pairwise distances are untouched by a core refresh.
        assert!(approx_eq!(f64, matrix.get(0, 3), 6.0));
    }
}
