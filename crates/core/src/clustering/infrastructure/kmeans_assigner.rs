/// Seeded k-means clustering over face embeddings.
///
/// Lloyd's algorithm with k-means++ initialization and Euclidean
/// distance. The PRNG is seeded explicitly, so repeated runs on
/// identical input produce identical partitions (cluster-id labels
/// included, for a fixed seed). Ties in nearest-centroid selection go
/// to the lowest cluster id; an empty cluster keeps its previous
/// centroid.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clustering::domain::cluster_assigner::{ClusterAssigner, ClusterError};
use crate::clustering::domain::embedding_batch::EmbeddingBatch;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

pub struct KMeansAssigner {
    seed: u64,
    max_iterations: usize,
}

impl KMeansAssigner {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }
}

impl Default for KMeansAssigner {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl ClusterAssigner for KMeansAssigner {
    fn assign(&self, batch: &EmbeddingBatch, k: usize) -> Result<Vec<usize>, ClusterError> {
        if k == 0 {
            return Err(ClusterError::InvalidClusterCount);
        }

        let points = batch.embeddings();
        let n = points.len();
        if n == 0 {
            return Ok(Vec::new());
        }

        // Fewer points than clusters: one point per cluster, the rest
        // stay empty.
        if n <= k {
            return Ok((0..n).collect());
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut centroids = kmeans_pp_init(points, k, &mut rng);
        let mut assignments = vec![0usize; n];

        for _ in 0..self.max_iterations {
            let mut changed = false;
            for (i, point) in points.iter().enumerate() {
                let nearest = nearest_centroid(point, &centroids);
                if nearest != assignments[i] {
                    assignments[i] = nearest;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
            recompute_centroids(points, &assignments, &mut centroids);
        }

        Ok(assignments)
    }
}

/// k-means++ seeding: first centroid uniform, each further centroid
/// drawn with probability proportional to squared distance from the
/// nearest already-chosen centroid.
fn kmeans_pp_init(points: &[Vec<f32>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let first = rng.random_range(0..n);
    let mut centroids = vec![to_f64(&points[first])];

    let mut dist2: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = dist2.iter().sum();
        let idx = if total > 0.0 {
            let mut r = rng.random::<f64>() * total;
            let mut chosen = n - 1;
            for (i, &d) in dist2.iter().enumerate() {
                if r < d {
                    chosen = i;
                    break;
                }
                r -= d;
            }
            chosen
        } else {
            // All remaining points coincide with a centroid
            rng.random_range(0..n)
        };

        let centroid = to_f64(&points[idx]);
        for (i, p) in points.iter().enumerate() {
            let d = squared_distance(p, &centroid);
            if d < dist2[i] {
                dist2[i] = d;
            }
        }
        centroids.push(centroid);
    }

    centroids
}

fn recompute_centroids(points: &[Vec<f32>], assignments: &[usize], centroids: &mut [Vec<f64>]) {
    let dim = centroids[0].len();
    let mut sums = vec![vec![0.0f64; dim]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];

    for (point, &cluster) in points.iter().zip(assignments) {
        counts[cluster] += 1;
        for (s, &v) in sums[cluster].iter_mut().zip(point.iter()) {
            *s += v as f64;
        }
    }

    for (cluster, centroid) in centroids.iter_mut().enumerate() {
        if counts[cluster] == 0 {
            continue;
        }
        for (c, s) in centroid.iter_mut().zip(&sums[cluster]) {
            *c = s / counts[cluster] as f64;
        }
    }
}

fn nearest_centroid(point: &[f32], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

fn squared_distance(a: &[f32], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = *x as f64 - y;
            d * d
        })
        .sum()
}

fn to_f64(v: &[f32]) -> Vec<f64> {
    v.iter().map(|&x| x as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::path::PathBuf;

    fn make_batch(vectors: &[&[f32]]) -> EmbeddingBatch {
        let mut batch = EmbeddingBatch::new();
        for (i, v) in vectors.iter().enumerate() {
            batch
                .push(v.to_vec(), PathBuf::from(format!("{i}.jpg")))
                .unwrap();
        }
        batch
    }

    fn two_group_batch() -> EmbeddingBatch {
        make_batch(&[
            &[0.0, 0.0],
            &[0.2, 0.1],
            &[0.1, 0.2],
            &[10.0, 10.0],
            &[10.1, 9.9],
            &[9.9, 10.2],
        ])
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    #[case(6)]
    fn test_assignment_length_and_range(#[case] k: usize) {
        let batch = two_group_batch();
        let assignments = KMeansAssigner::default().assign(&batch, k).unwrap();
        assert_eq!(assignments.len(), batch.len());
        assert!(assignments.iter().all(|&c| c < k));
    }

    #[test]
    fn test_zero_clusters_is_invalid() {
        let batch = two_group_batch();
        let err = KMeansAssigner::default().assign(&batch, 0).unwrap_err();
        assert_eq!(err, ClusterError::InvalidClusterCount);
    }

    #[test]
    fn test_empty_batch_yields_empty_assignment() {
        let batch = EmbeddingBatch::new();
        let assignments = KMeansAssigner::default().assign(&batch, 3).unwrap();
        assert!(assignments.is_empty());
    }

    #[test]
    fn test_fewer_points_than_clusters() {
        let batch = make_batch(&[&[1.0, 1.0], &[2.0, 2.0]]);
        let assignments = KMeansAssigner::default().assign(&batch, 5).unwrap();
        // One point per cluster, remaining clusters empty
        assert_eq!(assignments, vec![0, 1]);
    }

    #[test]
    fn test_separable_groups_are_split() {
        let batch = two_group_batch();
        let assignments = KMeansAssigner::default().assign(&batch, 2).unwrap();
        assert_eq!(assignments[0], assignments[1]);
        assert_eq!(assignments[1], assignments[2]);
        assert_eq!(assignments[3], assignments[4]);
        assert_eq!(assignments[4], assignments[5]);
        assert_ne!(assignments[0], assignments[3]);
    }

    #[test]
    fn test_same_seed_same_partition() {
        let batch = two_group_batch();
        let a = KMeansAssigner::new(7).assign(&batch, 2).unwrap();
        let b = KMeansAssigner::new(7).assign(&batch, 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_identical_points_stay_together() {
        let batch = make_batch(&[&[5.0, 5.0], &[5.0, 5.0], &[5.0, 5.0], &[5.0, 5.0]]);
        let assignments = KMeansAssigner::default().assign(&batch, 2).unwrap();
        // All points coincide, so they all land in one cluster and the
        // other stays empty — which is permitted.
        assert!(assignments.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_single_point_single_cluster() {
        let batch = make_batch(&[&[1.0]]);
        assert_eq!(KMeansAssigner::default().assign(&batch, 1).unwrap(), vec![0]);
    }

    #[test]
    fn test_k_equals_one_groups_everything() {
        let batch = two_group_batch();
        let assignments = KMeansAssigner::default().assign(&batch, 1).unwrap();
        assert!(assignments.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_squared_distance() {
        assert_relative_eq!(
            squared_distance(&[0.0, 3.0], &[4.0, 0.0]),
            25.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_nearest_centroid_tie_goes_to_lowest_id() {
        let centroids = vec![vec![1.0, 0.0], vec![-1.0, 0.0]];
        // Equidistant from both centroids
        assert_eq!(nearest_centroid(&[0.0, 0.0], &centroids), 0);
    }
}
