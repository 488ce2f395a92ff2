//! Grade Predictor - k-NN student grade prediction
//!
//! This crate provides the offline training pipeline and the HTTP service
//! that serves its artifacts:
//! - Categorical encoding, scaling and feature assembly
//! - k-nearest-neighbor regression with held-out evaluation
//! - Checksummed artifact directories
//! - Prediction with letter grades, confidence and recommendations
//! - A small document store for imported grades, users and prediction logs
//!
//! # Modules
//!
//! ## Core ML Modules
//! - [`preprocessing`] - Feature specification, encoders, scaler, assembly
//! - [`training`] - Dataset cleaning, k-NN regressor, training engine
//! - [`inference`] - Request parsing and the shared predictor
//! - [`export`] - Artifact save/load and model serialization
//!
//! ## Infrastructure
//! - [`storage`] - Document store abstraction and repository
//! - [`cache`] - Recent neighbor results per requester
//! - [`utils`] - CSV loading
//!
//! ## Services
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core ML modules
pub mod preprocessing;
pub mod training;
pub mod inference;
pub mod export;

// Infrastructure
pub mod storage;
pub mod cache;
pub mod utils;

// Services
pub mod server;
pub mod cli;

pub use error::{GradeError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{GradeError, Result};

    // Preprocessing
    pub use crate::preprocessing::{EncodingStrategy, FeatureSpec, Profile, StandardScaler};

    // Training
    pub use crate::training::{KNNRegressor, TrainEngine, TrainingConfig, TrainingRecord};

    // Inference
    pub use crate::inference::{LetterGrade, Prediction, PredictionRequest, Predictor};

    // Export
    pub use crate::export::ArtifactBundle;

    // Storage
    pub use crate::storage::{DocumentStore, JsonFileStore, MemoryStore, Repository};

    // Utilities
    pub use crate::utils::DataLoader;
}
