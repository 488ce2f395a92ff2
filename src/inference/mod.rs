//! Inference module
//!
//! Serving-side half of the prediction contract: request parsing, the
//! shared [`Predictor`], and the derived letter grade / confidence /
//! recommendation outputs.

mod engine;
mod grading;

pub use engine::{
    FixedPrediction, HeadSummary, ModelSummary, Prediction, PredictionOutcome, PredictionRequest,
    Predictor, SubjectPrediction, REQUESTER_FIELDS, TARGET_FIELD,
};
pub use grading::{
    confidence, confidence_from_mean, recommendation, round_to, LetterGrade, FALLBACK_CONFIDENCE,
};
