//! Data preprocessing module
//!
//! Provides the feature-side half of the prediction contract:
//! - Feature specification (columns, subject set, encoding strategy)
//! - Categorical encoding (Label, OneHot)
//! - Feature scaling (StandardScaler)
//! - Request field normalization and feature vector assembly

pub mod config;
mod encoder;
mod scaler;
mod assembler;

pub use config::{
    CategoricalColumn, EncodingStrategy, FeatureSpec, HeadSpec, MissingNumeric, Profile,
    CATEGORICAL_COLUMNS, CORE_SUBJECTS, EXTENDED_SUBJECTS,
};
pub use encoder::{CategoricalEncoder, Encoded, EncodedValue, LabelEncoder, OneHotEncoder};
pub use scaler::StandardScaler;
pub use assembler::{AssembledVector, FeatureAssembler, RequestFields};
