//! K-Nearest Neighbors implementation
//!
//! Multi-output KNN regressor with neighbor reporting.

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{GradeError, Result};

/// Distance metric for KNN
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    #[default]
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
    /// Minkowski distance with parameter p
    Minkowski(f64),
}

/// Weighting scheme for neighbors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum WeightScheme {
    /// All neighbors have equal weight
    Uniform,
    /// Closer neighbors have more weight (inverse distance)
    #[default]
    Distance,
}

/// KNN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNConfig {
    /// Number of neighbors
    pub n_neighbors: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Weighting scheme
    pub weights: WeightScheme,
}

impl Default for KNNConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Distance,
        }
    }
}

/// A training example close to a query point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Row of the training matrix
    pub index: usize,
    pub distance: f64,
}

/// K-Nearest Neighbors Regressor
///
/// Targets are a matrix so one fit can predict several subjects at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNNRegressor {
    config: KNNConfig,
    x_train: Option<Array2<f64>>,
    y_train: Option<Array2<f64>>,
}

impl KNNRegressor {
    pub fn new(config: KNNConfig) -> Self {
        Self {
            config,
            x_train: None,
            y_train: None,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KNNConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &KNNConfig {
        &self.config
    }

    /// Fit the regressor (stores training data)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<()> {
        if self.config.n_neighbors == 0 {
            return Err(GradeError::Config("n_neighbors must be at least 1".into()));
        }
        if x.nrows() == 0 {
            return Err(GradeError::Data("cannot fit KNN on zero rows".into()));
        }
        if x.nrows() != y.nrows() {
            return Err(GradeError::Data(format!(
                "feature rows ({}) and target rows ({}) differ",
                x.nrows(),
                y.nrows()
            )));
        }
        if y.ncols() == 0 {
            return Err(GradeError::Data("at least one target is required".into()));
        }
        self.x_train = Some(x.clone());
        self.y_train = Some(y.clone());
        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        self.x_train.is_some()
    }

    /// Input width the model was fitted on
    pub fn n_features(&self) -> Option<usize> {
        self.x_train.as_ref().map(|x| x.ncols())
    }

    pub fn n_targets(&self) -> Option<usize> {
        self.y_train.as_ref().map(|y| y.ncols())
    }

    pub fn n_samples(&self) -> Option<usize> {
        self.x_train.as_ref().map(|x| x.nrows())
    }

    fn fitted(&self) -> Result<(&Array2<f64>, &Array2<f64>)> {
        match (&self.x_train, &self.y_train) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(GradeError::ModelNotFitted),
        }
    }

    /// The k nearest training rows, ascending by distance then index
    pub fn kneighbors(&self, point: &[f64]) -> Result<Vec<Neighbor>> {
        let (x_train, _) = self.fitted()?;
        if point.len() != x_train.ncols() {
            return Err(GradeError::DimensionMismatch {
                expected: x_train.ncols(),
                actual: point.len(),
            });
        }
        Ok(find_k_nearest(point, x_train, self.config.n_neighbors, self.config.metric))
    }

    /// Predict all targets for one point, returning the neighbors used
    pub fn predict_one(&self, point: &[f64]) -> Result<(Vec<f64>, Vec<Neighbor>)> {
        let (_, y_train) = self.fitted()?;
        let neighbors = self.kneighbors(point)?;
        let prediction = weighted_mean_from(&neighbors, y_train, self.config.weights);
        Ok((prediction, neighbors))
    }

    /// Predict target values (parallelized over query rows)
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (x_train, y_train) = self.fitted()?;
        if x.ncols() != x_train.ncols() {
            return Err(GradeError::DimensionMismatch {
                expected: x_train.ncols(),
                actual: x.ncols(),
            });
        }
        let k = self.config.n_neighbors;
        let metric = self.config.metric;
        let weights = self.config.weights;

        let rows: Vec<Vec<f64>> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i).to_vec();
                let neighbors = find_k_nearest(&row, x_train, k, metric);
                weighted_mean_from(&neighbors, y_train, weights)
            })
            .collect();

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Array2::from_shape_vec((x.nrows(), y_train.ncols()), flat)?)
    }
}

// ============================================================================
// Neighbor search helpers
// ============================================================================

/// Max-heap entry ordered by (distance, index)
#[derive(PartialEq)]
struct DistIndex(f64, usize);

impl Eq for DistIndex {}
impl PartialOrd for DistIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then(self.1.cmp(&other.1))
    }
}

/// Find k nearest neighbors using a max-heap, O(n log k)
fn find_k_nearest(
    point: &[f64],
    x_train: &Array2<f64>,
    k: usize,
    metric: DistanceMetric,
) -> Vec<Neighbor> {
    let mut heap = BinaryHeap::with_capacity(k + 1);

    for (i, row) in x_train.rows().into_iter().enumerate() {
        let entry = DistIndex(compute_distance(point, row, metric), i);
        if heap.len() < k {
            heap.push(entry);
        } else if let Some(top) = heap.peek() {
            if entry < *top {
                heap.pop();
                heap.push(entry);
            }
        }
    }

    heap.into_sorted_vec()
        .into_iter()
        .map(|DistIndex(distance, index)| Neighbor { index, distance })
        .collect()
}

/// Compute distance between two points using the specified metric
fn compute_distance(a: &[f64], b: ArrayView1<f64>, metric: DistanceMetric) -> f64 {
    match metric {
        DistanceMetric::Euclidean => a
            .iter()
            .zip(b.iter())
            .map(|(ai, bi)| {
                let d = ai - bi;
                d * d
            })
            .sum::<f64>()
            .sqrt(),
        DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(ai, bi)| (ai - bi).abs()).sum(),
        DistanceMetric::Minkowski(p) => a
            .iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).abs().powf(p))
            .sum::<f64>()
            .powf(1.0 / p),
    }
}

/// Weighted mean of neighbor targets, one value per target column.
///
/// With inverse-distance weights, exact matches (distance 0) take all the
/// weight, shared equally.
fn weighted_mean_from(neighbors: &[Neighbor], y_train: &Array2<f64>, weights: WeightScheme) -> Vec<f64> {
    let n_targets = y_train.ncols();
    if neighbors.is_empty() {
        return vec![f64::NAN; n_targets];
    }

    let exact: Vec<&Neighbor> = neighbors.iter().filter(|n| n.distance == 0.0).collect();
    let weighted: Vec<(usize, f64)> = match weights {
        WeightScheme::Uniform => neighbors.iter().map(|n| (n.index, 1.0)).collect(),
        WeightScheme::Distance if !exact.is_empty() => exact.iter().map(|n| (n.index, 1.0)).collect(),
        WeightScheme::Distance => neighbors.iter().map(|n| (n.index, 1.0 / n.distance)).collect(),
    };

    let total: f64 = weighted.iter().map(|(_, w)| w).sum();
    (0..n_targets)
        .map(|t| weighted.iter().map(|(i, w)| w * y_train[[*i, t]]).sum::<f64>() / total)
        .collect()
}
