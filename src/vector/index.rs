//! Exact flat L2 index over unit-normalized vectors.
//!
//! Vectors live in one contiguous row-major buffer. Insertion order is the
//! permanent position of a vector and the join key with the metadata store.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A search hit: index position and squared L2 distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Append-only flat index of `dimension`-length vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Rebuild an index from raw row-major storage, as read from disk.
    /// Rows are taken as-is; they were normalized when first added.
    pub(crate) fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(Error::InvalidInput(format!(
                "{} values do not form rows of dimension {}",
                data.len(),
                dimension
            )));
        }
        Ok(Self { dimension, data })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Stored (normalized) vector at `position`.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimension.max(1))
    }

    pub(crate) fn raw(&self) -> &[f32] {
        &self.data
    }

    /// L2-normalize every vector in place, then append them in order.
    ///
    /// All vectors are validated before any is scaled or stored, so a failing
    /// batch leaves both the index and `vectors` unchanged. Positions in
    /// `DegenerateVector` are relative to the batch.
    pub fn add(&mut self, vectors: &mut [Vec<f32>]) -> Result<()> {
        let mut norms = Vec::with_capacity(vectors.len());
        for (row, vector) in vectors.iter().enumerate() {
            if vector.len() != self.dimension {
                return Err(Error::InvalidInput(format!(
                    "vector {} has dimension {}, index expects {}",
                    row,
                    vector.len(),
                    self.dimension
                )));
            }
            let norm = scaled_norm(vector).ok_or(Error::DegenerateVector { position: row })?;
            norms.push(norm);
        }

        self.data.reserve(vectors.len() * self.dimension);
        for (vector, norm) in vectors.iter_mut().zip(norms) {
            scale(vector, norm);
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Exact k-nearest-neighbor search.
    ///
    /// The query is normalized, compared to every stored vector by squared
    /// Euclidean distance, and the `k` closest are returned ascending by
    /// distance. Equal distances keep insertion order. Asking for more than
    /// `len()` returns everything.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(Error::InvalidInput(format!(
                "query has dimension {}, index expects {}",
                query.len(),
                self.dimension
            )));
        }

        let mut query = query.to_vec();
        normalize_l2(&mut query)?;

        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        // Max-heap on (distance, position) holding the k best seen so far.
        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
        for (position, stored) in self.vectors().enumerate() {
            let candidate = Candidate {
                distance: squared_l2(&query, stored),
                position,
            };
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate < *worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|candidate| Neighbor {
                position: candidate.position,
                distance: candidate.distance,
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f32,
    position: usize,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.position.cmp(&other.position))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Euclidean length, accumulated in f64 so tiny or huge components neither
/// underflow nor overflow. Saturates to `f32::INFINITY` past the f32 range.
pub fn l2_norm(vector: &[f32]) -> f32 {
    norm_f64(vector) as f32
}

/// Whether `vector` has a finite, non-zero norm and can be normalized.
pub fn is_normalizable(vector: &[f32]) -> bool {
    scaled_norm(vector).is_some()
}

/// Scale `vector` to unit length. A zero (or non-finite) norm is rejected
/// with `DegenerateVector` at position 0 and leaves the vector untouched.
pub fn normalize_l2(vector: &mut [f32]) -> Result<()> {
    let norm = scaled_norm(vector).ok_or(Error::DegenerateVector { position: 0 })?;
    scale(vector, norm);
    Ok(())
}

fn norm_f64(vector: &[f32]) -> f64 {
    vector
        .iter()
        .map(|&value| f64::from(value) * f64::from(value))
        .sum::<f64>()
        .sqrt()
}

fn scaled_norm(vector: &[f32]) -> Option<f64> {
    let norm = norm_f64(vector);
    (norm > 0.0 && norm.is_finite()).then_some(norm)
}

fn scale(vector: &mut [f32], norm: f64) {
    for value in vector.iter_mut() {
        *value = (f64::from(*value) / norm) as f32;
    }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const TOLERANCE: f32 = 1e-6;

    fn random_vectors(count: usize, dimension: usize, seed: u64) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| {
                (0..dimension)
                    .map(|_| rng.random_range(-1.0_f32..1.0))
                    .collect()
            })
            .collect()
    }

    #[test]
    fn normalization_is_idempotent() {
        for mut vector in random_vectors(20, 12, 7) {
            normalize_l2(&mut vector).expect("non-zero");
            let once = vector.clone();
            normalize_l2(&mut vector).expect("still non-zero");
            for (a, b) in once.iter().zip(&vector) {
                assert!((a - b).abs() <= TOLERANCE);
            }
            assert!((l2_norm(&vector) - 1.0).abs() <= TOLERANCE);
        }
    }

    #[test]
    fn zero_vector_is_degenerate() {
        let mut vector = vec![0.0_f32; 4];
        assert!(matches!(
            normalize_l2(&mut vector),
            Err(Error::DegenerateVector { .. })
        ));

        let mut index = VectorIndex::new(2);
        let mut batch = vec![vec![1.0, 1.0], vec![0.0, 0.0]];
        let result = index.add(&mut batch);
        assert!(matches!(result, Err(Error::DegenerateVector { position: 1 })));
        assert!(index.is_empty(), "failed batch leaves index unchanged");
    }

    #[test]
    fn extreme_but_finite_vectors_normalize() {
        let mut tiny = vec![1e-30_f32, 0.0];
        normalize_l2(&mut tiny).expect("tiny is non-zero");
        assert!((tiny[0] - 1.0).abs() <= TOLERANCE);
        assert_eq!(tiny[1], 0.0);

        let mut huge = vec![1e20_f32, 1e19];
        normalize_l2(&mut huge).expect("huge is finite");
        assert!((l2_norm(&huge) - 1.0).abs() <= TOLERANCE);
        assert!((huge[0] / huge[1] - 10.0).abs() <= 1e-4);

        let mut index = VectorIndex::new(2);
        index
            .add(&mut [vec![1e-30, 0.0], vec![1e20, 1e19]])
            .expect("both rows are normalizable");
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn non_finite_vectors_are_degenerate() {
        assert!(!is_normalizable(&[f32::NAN, 1.0]));
        assert!(!is_normalizable(&[f32::INFINITY, 0.0]));
        assert!(!is_normalizable(&[0.0, 0.0]));
        assert!(is_normalizable(&[0.0, 1e-38]));
    }

    #[test]
    fn failed_batch_leaves_caller_rows_untouched() {
        let mut index = VectorIndex::new(2);
        let mut batch = vec![vec![3.0, 4.0], vec![0.0, 0.0]];
        let result = index.add(&mut batch);
        assert!(matches!(result, Err(Error::DegenerateVector { position: 1 })));
        assert_eq!(batch[0], vec![3.0, 4.0]);
        assert!(index.is_empty());
    }

    #[test]
    fn squared_distance_matches_cosine_for_unit_vectors() {
        let vectors = random_vectors(10, 8, 42);
        for pair in vectors.windows(2) {
            let (mut a, mut b) = (pair[0].clone(), pair[1].clone());
            normalize_l2(&mut a).expect("a");
            normalize_l2(&mut b).expect("b");
            let expected = 2.0 - 2.0 * dot(&a, &b);
            assert!((squared_l2(&a, &b) - expected).abs() <= 1e-5);
        }
    }

    #[test]
    fn add_normalizes_and_rejects_wrong_dimension() {
        let mut index = VectorIndex::new(2);
        index.add(&mut [vec![3.0, 4.0]]).expect("add");
        let stored = index.vector(0).expect("stored");
        assert!((stored[0] - 0.6).abs() <= TOLERANCE);
        assert!((stored[1] - 0.8).abs() <= TOLERANCE);

        let result = index.add(&mut [vec![1.0, 2.0, 3.0]]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn search_matches_brute_force() {
        let dimension = 6;
        let mut corpus = random_vectors(100, dimension, 1234);
        let mut index = VectorIndex::new(dimension);
        index.add(&mut corpus).expect("add corpus");

        for query in random_vectors(5, dimension, 99) {
            let mut unit_query = query.clone();
            normalize_l2(&mut unit_query).expect("query");

            let mut expected: Vec<(usize, f32)> = corpus
                .iter()
                .enumerate()
                .map(|(position, stored)| (position, squared_l2(&unit_query, stored)))
                .collect();
            expected.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

            for k in [1, 5, 17] {
                let hits = index.search(&query, k).expect("search");
                assert_eq!(hits.len(), k);
                let positions: Vec<usize> = hits.iter().map(|hit| hit.position).collect();
                let expected_positions: Vec<usize> =
                    expected.iter().take(k).map(|(position, _)| *position).collect();
                assert_eq!(positions, expected_positions);
                assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
            }
        }
    }

    #[test]
    fn ties_keep_insertion_order_and_k_is_clamped() {
        let mut index = VectorIndex::new(2);
        index
            .add(&mut [vec![0.0, 1.0], vec![1.0, 0.0], vec![2.0, 0.0], vec![0.0, 5.0]])
            .expect("add");

        let hits = index.search(&[1.0, 0.0], 10).expect("search");
        let positions: Vec<usize> = hits.iter().map(|hit| hit.position).collect();
        assert_eq!(positions, vec![1, 2, 0, 3]);
        assert_eq!(hits[0].distance, 0.0);

        assert!(index.search(&[1.0, 0.0], 0).expect("k=0").is_empty());
        assert!(VectorIndex::new(2).search(&[1.0, 0.0], 3).expect("empty").is_empty());
    }

    #[test]
    fn search_rejects_bad_queries() {
        let mut index = VectorIndex::new(2);
        index.add(&mut [vec![1.0, 0.0]]).expect("add");
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            index.search(&[0.0, 0.0], 1),
            Err(Error::DegenerateVector { .. })
        ));
    }
}
