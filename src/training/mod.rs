//! Model training module
//!
//! Turns historical student records into a fitted artifact bundle:
//! - Record cleaning (drop rows missing any required column)
//! - Encoder and scaler fitting
//! - K-Nearest Neighbors regression, one model per head
//! - Held-out MAE / R² reporting

mod config;
mod dataset;
mod engine;
mod metrics;
pub mod knn;

pub use config::TrainingConfig;
pub use dataset::{clean_documents, TrainingRecord};
pub use engine::TrainEngine;
pub use metrics::TargetMetrics;
pub use knn::{DistanceMetric, KNNConfig, KNNRegressor, Neighbor, WeightScheme};
