//! Error types for the grade predictor

use thiserror::Error;

/// Result type alias for grade predictor operations
pub type Result<T> = std::result::Result<T, GradeError>;

/// Main error type for the grade predictor
#[derive(Error, Debug)]
pub enum GradeError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Unknown target subject: '{target}' (expected one of: {})", .known.join(", "))]
    UnknownTarget { target: String, known: Vec<String> },

    #[error("Encoder was never fitted for column: {0}")]
    UnknownColumn(String),

    #[error("Feature dimension mismatch: model expects {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Document store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Data error: {0}")]
    Data(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GradeError {
    /// True for errors caused by the content of a prediction request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GradeError::MissingField(_)
                | GradeError::InvalidField { .. }
                | GradeError::UnknownTarget { .. }
                | GradeError::UnknownColumn(_)
                | GradeError::DimensionMismatch { .. }
        )
    }
}

impl From<polars::error::PolarsError> for GradeError {
    fn from(err: polars::error::PolarsError) -> Self {
        GradeError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for GradeError {
    fn from(err: serde_json::Error) -> Self {
        GradeError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for GradeError {
    fn from(err: bincode::Error) -> Self {
        GradeError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for GradeError {
    fn from(err: ndarray::ShapeError) -> Self {
        GradeError::Data(format!("invalid shape: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GradeError::MissingField("lunch".to_string());
        assert_eq!(err.to_string(), "Missing required field: lunch");
    }

    #[test]
    fn test_unknown_target_lists_known_subjects() {
        let err = GradeError::UnknownTarget {
            target: "art score".to_string(),
            known: vec!["math score".to_string(), "reading score".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("art score"));
        assert!(msg.contains("math score, reading score"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GradeError = io_err.into();
        assert!(matches!(err, GradeError::Io(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_client_errors() {
        assert!(GradeError::DimensionMismatch { expected: 8, actual: 7 }.is_client_error());
        assert!(!GradeError::StoreUnavailable("down".into()).is_client_error());
    }
}
