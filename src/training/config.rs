//! Training configuration

use serde::{Deserialize, Serialize};

use super::knn::{DistanceMetric, KNNConfig, WeightScheme};
use crate::preprocessing::{FeatureSpec, Profile};

/// Configuration for model training
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Feature pipeline to fit
    pub spec: FeatureSpec,

    /// Number of neighbors
    pub n_neighbors: usize,

    /// Distance metric
    pub metric: DistanceMetric,

    /// Neighbor weighting
    pub weights: WeightScheme,

    /// Held-out fraction used for MAE / R² reporting
    pub test_size: f64,

    /// Random seed for the train/test shuffle
    pub random_state: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            spec: FeatureSpec::fixed(),
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            weights: WeightScheme::Distance,
            test_size: 0.2,
            random_state: 42,
        }
    }
}

impl TrainingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration for a profile
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            spec: FeatureSpec::for_profile(profile),
            ..Self::default()
        }
    }

    /// Builder method to set the feature spec
    pub fn with_spec(mut self, spec: FeatureSpec) -> Self {
        self.spec = spec;
        self
    }

    /// Builder method to set k
    pub fn with_n_neighbors(mut self, k: usize) -> Self {
        self.n_neighbors = k;
        self
    }

    /// Builder method to set the weighting scheme
    pub fn with_weights(mut self, weights: WeightScheme) -> Self {
        self.weights = weights;
        self
    }

    /// Builder method to set the held-out fraction
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    /// Builder method to set the shuffle seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn knn_config(&self) -> KNNConfig {
        KNNConfig {
            n_neighbors: self.n_neighbors,
            metric: self.metric,
            weights: self.weights,
        }
    }
}
