//! Prediction engine
//!
//! Owns a validated [`ArtifactBundle`] and turns a request into a response
//! payload: field normalization, encoding, assembly, optional scaling, kNN
//! inference, then grade / confidence / recommendation shaping. The bundle
//! is never mutated after construction, so one `Predictor` is shared by all
//! requests behind an `Arc`.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::grading::{confidence, recommendation, round_to, LetterGrade};
use crate::error::{GradeError, Result};
use crate::export::{ArtifactBundle, PredictionHead};
use crate::preprocessing::config::subject_label;
use crate::preprocessing::{
    EncodingStrategy, FeatureAssembler, FeatureSpec, Profile, RequestFields,
};
use crate::training::{Neighbor, TargetMetrics};

/// Field selecting the subject in the multi-subject profile
pub const TARGET_FIELD: &str = "target_subject";

/// Fields carrying the requester identity, in lookup order
pub const REQUESTER_FIELDS: [&str; 2] = ["user_email", "requester"];

/// A parsed inference request
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub fields: RequestFields,
    pub target: Option<String>,
    pub requester: Option<String>,
}

impl PredictionRequest {
    pub fn from_value(value: Value) -> Result<Self> {
        let fields = RequestFields::from_value(value)?;
        let target = fields.text(TARGET_FIELD);
        let requester = REQUESTER_FIELDS.iter().find_map(|f| fields.text(f));
        Ok(Self { fields, target, requester })
    }

    pub fn from_json(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body).map_err(|e| GradeError::InvalidField {
            field: "body".to_string(),
            reason: format!("invalid JSON: {}", e),
        })?;
        Self::from_value(value)
    }
}

/// Fixed-profile response payload
#[derive(Debug, Clone, Serialize)]
pub struct FixedPrediction {
    pub success: bool,
    /// Letter grade of the average
    pub prediction: LetterGrade,
    /// Short subject label -> score, plus `average`
    pub predicted_scores: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unseen_values: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub neighbors: Vec<Neighbor>,
}

/// Multi-subject response payload
#[derive(Debug, Clone, Serialize)]
pub struct SubjectPrediction {
    pub success: bool,
    pub target_subject: String,
    pub predicted_score: f64,
    pub predicted_grade: LetterGrade,
    /// Training-set mean score for the subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_grade: Option<f64>,
    pub message: String,
    pub recommendation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub neighbors: Vec<Neighbor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unseen_values: Vec<String>,
}

/// Result of one prediction
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PredictionOutcome {
    Fixed(FixedPrediction),
    Subject(SubjectPrediction),
}

impl PredictionOutcome {
    /// Subject name recorded in the prediction log
    pub fn target_label(&self) -> String {
        match self {
            PredictionOutcome::Fixed(_) => "average".to_string(),
            PredictionOutcome::Subject(p) => p.target_subject.clone(),
        }
    }

    /// Headline score: the average for the fixed profile
    pub fn score(&self) -> f64 {
        match self {
            PredictionOutcome::Fixed(p) => p.predicted_scores.get("average").copied().unwrap_or(0.0),
            PredictionOutcome::Subject(p) => p.predicted_score,
        }
    }

    pub fn grade(&self) -> LetterGrade {
        match self {
            PredictionOutcome::Fixed(p) => p.prediction,
            PredictionOutcome::Subject(p) => p.predicted_grade,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            PredictionOutcome::Fixed(p) => &p.message,
            PredictionOutcome::Subject(p) => &p.message,
        }
    }

    pub fn recommendation(&self) -> Option<&str> {
        match self {
            PredictionOutcome::Fixed(_) => None,
            PredictionOutcome::Subject(p) => Some(&p.recommendation),
        }
    }
}

/// A response payload plus the neighbors behind it
#[derive(Debug, Clone)]
pub struct Prediction {
    pub outcome: PredictionOutcome,
    /// Always populated, even when the profile does not report neighbors
    pub neighbors: Vec<Neighbor>,
}

/// Loaded-artifact summary for the debug endpoint and `info` command
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub profile: Profile,
    pub encoding: EncodingStrategy,
    pub scaled: bool,
    pub created_at: DateTime<Utc>,
    pub n_records: usize,
    pub categorical: Vec<String>,
    pub subjects: Vec<String>,
    pub vocabulary: BTreeMap<String, Vec<String>>,
    pub subject_averages: BTreeMap<String, f64>,
    pub heads: Vec<HeadSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeadSummary {
    pub targets: Vec<String>,
    pub n_features: usize,
    pub n_samples: usize,
    pub n_neighbors: usize,
    pub feature_order: Vec<String>,
    pub metrics: Vec<TargetMetrics>,
}

/// Shared, read-only prediction pipeline
#[derive(Debug)]
pub struct Predictor {
    bundle: ArtifactBundle,
}

impl Predictor {
    /// Wrap a bundle after validating it
    pub fn new(bundle: ArtifactBundle) -> Result<Self> {
        bundle.validate()?;
        Ok(Self { bundle })
    }

    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(ArtifactBundle::load(dir)?)
    }

    pub fn spec(&self) -> &FeatureSpec {
        &self.bundle.spec
    }

    pub fn summary(&self) -> ModelSummary {
        let bundle = &self.bundle;
        let vocabulary = bundle
            .encoder
            .columns()
            .into_iter()
            .filter_map(|c| {
                bundle.encoder.vocabulary(c).ok().map(|v| (c.to_string(), v.to_vec()))
            })
            .collect();

        ModelSummary {
            profile: bundle.spec.profile,
            encoding: bundle.spec.encoding,
            scaled: bundle.spec.scale,
            created_at: bundle.created_at,
            n_records: bundle.n_records,
            categorical: bundle.spec.categorical_names().iter().map(|s| s.to_string()).collect(),
            subjects: bundle.spec.subjects.clone(),
            vocabulary,
            subject_averages: bundle.subject_averages.clone(),
            heads: bundle
                .heads
                .iter()
                .map(|h| HeadSummary {
                    targets: h.spec.targets.clone(),
                    n_features: h.model.n_features().unwrap_or(0),
                    n_samples: h.model.n_samples().unwrap_or(0),
                    n_neighbors: h.model.config().n_neighbors,
                    feature_order: h.feature_order.clone(),
                    metrics: h.metrics.clone(),
                })
                .collect(),
        }
    }

    /// Select the head a request is routed to.
    fn select_head(&self, request: &PredictionRequest) -> Result<&PredictionHead> {
        let spec = &self.bundle.spec;
        match spec.profile {
            Profile::Fixed => self
                .bundle
                .heads
                .first()
                .ok_or_else(|| GradeError::Artifact("no model loaded".to_string())),
            Profile::MultiSubject => {
                let requested = request
                    .target
                    .as_deref()
                    .ok_or_else(|| GradeError::MissingField(TARGET_FIELD.to_string()))?;
                let subject = spec.resolve_subject(requested)?;
                self.bundle.head_for(subject).ok_or_else(|| GradeError::UnknownTarget {
                    target: requested.to_string(),
                    known: spec.subjects.clone(),
                })
            }
        }
    }

    /// Run the full pipeline for one request.
    pub fn predict(&self, request: &PredictionRequest) -> Result<Prediction> {
        let spec = &self.bundle.spec;
        let head = self.select_head(request)?;

        let assembler = FeatureAssembler::new(spec, &self.bundle.encoder);
        let vector = assembler.assemble(&request.fields, &head.spec)?;
        if !vector.unseen.is_empty() {
            warn!(columns = ?vector.unseen, "Request contains values unseen at training time");
        }

        let mut values = vector.values;
        if values.len() != head.feature_order.len() {
            return Err(GradeError::DimensionMismatch {
                expected: head.feature_order.len(),
                actual: values.len(),
            });
        }
        if let Some(scaler) = &head.scaler {
            scaler.transform_row(&mut values)?;
        }

        let (predicted, neighbors) = head.model.predict_one(&values)?;
        debug!(head = %head.spec.key(), neighbors = neighbors.len(), "Prediction computed");

        let confidence = spec.report_confidence.then(|| round_to(confidence(&neighbors), 3));
        let reported = if spec.report_neighbors { neighbors.clone() } else { Vec::new() };

        let outcome = match spec.profile {
            Profile::Fixed => {
                let mut scores: BTreeMap<String, f64> = head
                    .spec
                    .targets
                    .iter()
                    .zip(&predicted)
                    .map(|(t, p)| (subject_label(t).to_string(), round_to(*p, 1)))
                    .collect();
                // Letter from the raw mean; rounding is display only.
                let average = predicted.iter().sum::<f64>() / predicted.len().max(1) as f64;
                scores.insert("average".to_string(), round_to(average, 1));

                PredictionOutcome::Fixed(FixedPrediction {
                    success: true,
                    prediction: LetterGrade::from_score(average),
                    predicted_scores: scores,
                    confidence,
                    message: "Prediction generated successfully".to_string(),
                    unseen_values: vector.unseen,
                    neighbors: reported,
                })
            }
            Profile::MultiSubject => {
                let target = head.spec.targets[0].clone();
                let raw = predicted.first().copied().unwrap_or(f64::NAN);
                if !raw.is_finite() {
                    return Err(GradeError::Data(format!("model produced no score for {}", target)));
                }
                let grade = LetterGrade::from_score(raw);
                let score = round_to(raw, 1);
                let label = subject_label(&target);

                PredictionOutcome::Subject(SubjectPrediction {
                    success: true,
                    predicted_score: score,
                    predicted_grade: grade,
                    avg_grade: self.bundle.subject_averages.get(&target).map(|a| round_to(*a, 1)),
                    message: format!("Predicted {} score: {:.1} (grade {})", label, score, grade),
                    recommendation: recommendation(&target, grade),
                    confidence,
                    neighbors: reported,
                    unseen_values: vector.unseen,
                    target_subject: target,
                })
            }
        };
        Ok(Prediction { outcome, neighbors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{FeatureSpec, CATEGORICAL_COLUMNS};
    use crate::training::{TrainEngine, TrainingConfig, TrainingRecord};
    use serde_json::json;

    fn records(spec: &FeatureSpec, n: usize) -> Vec<TrainingRecord> {
        (0..n)
            .map(|i| {
                let values = [
                    ["female", "male"][i % 2],
                    ["group A", "group B", "group C"][i % 3],
                    ["bachelor's degree", "high school"][(i / 2) % 2],
                    ["standard", "free/reduced"][(i / 3) % 2],
                    ["completed", "none"][(i / 5) % 2],
                ];
                TrainingRecord {
                    attributes: CATEGORICAL_COLUMNS
                        .iter()
                        .zip(values)
                        .map(|(c, v)| (c.to_string(), v.to_string()))
                        .collect(),
                    scores: spec
                        .subjects
                        .iter()
                        .enumerate()
                        .map(|(j, s)| (s.clone(), 55.0 + ((i * 11 + j * 5) % 40) as f64))
                        .collect(),
                }
            })
            .collect()
    }

    fn predictor(profile: Profile) -> Predictor {
        let config = TrainingConfig::for_profile(profile);
        let data = records(&config.spec, 40);
        let bundle = TrainEngine::new(config).fit(&data).unwrap();
        Predictor::new(bundle).unwrap()
    }

    /// The grade comes from the unrounded score, which lies within 0.05 of
    /// the reported one.
    fn assert_grade_near(grade: LetterGrade, reported: f64) {
        let low = LetterGrade::from_score(reported - 0.05);
        let high = LetterGrade::from_score(reported + 0.05);
        assert!(grade == low || grade == high, "{} does not fit {}", grade, reported);
    }

    /// Identical rows, so every neighbor is an exact match
    fn identical_records(spec: &FeatureSpec, scores: &[(&str, f64)]) -> Vec<TrainingRecord> {
        let values = ["female", "group B", "bachelor's degree", "standard", "completed"];
        (0..10)
            .map(|_| TrainingRecord {
                attributes: CATEGORICAL_COLUMNS
                    .iter()
                    .zip(values)
                    .map(|(c, v)| (c.to_string(), v.to_string()))
                    .collect(),
                scores: spec
                    .subjects
                    .iter()
                    .map(|s| {
                        let score = scores
                            .iter()
                            .find(|(name, _)| *name == s.as_str())
                            .map_or(70.0, |(_, v)| *v);
                        (s.clone(), score)
                    })
                    .collect(),
            })
            .collect()
    }

    fn fixed_request() -> Value {
        json!({
            "gender": "female",
            "race": "group B",
            "parental_level_of_education": "bachelor's degree",
            "lunch": "standard",
            "test_preparation_course": "completed",
            "math_score": 72,
            "reading_score": 88,
        })
    }

    #[test]
    fn test_fixed_prediction() {
        let predictor = predictor(Profile::Fixed);
        let request = PredictionRequest::from_value(fixed_request()).unwrap();
        let prediction = predictor.predict(&request).unwrap();

        let PredictionOutcome::Fixed(fixed) = &prediction.outcome else {
            panic!("expected fixed outcome");
        };
        assert_eq!(fixed.predicted_scores.len(), 4);
        let mean = (fixed.predicted_scores["math"]
            + fixed.predicted_scores["reading"]
            + fixed.predicted_scores["writing"])
            / 3.0;
        assert!((fixed.predicted_scores["average"] - mean).abs() <= 0.06);
        assert_grade_near(fixed.prediction, fixed.predicted_scores["average"]);
        let confidence = fixed.confidence.unwrap();
        assert!(confidence > 0.0 && confidence <= 1.0);
        assert!(fixed.neighbors.is_empty());
        assert_eq!(prediction.neighbors.len(), 5);
    }

    #[test]
    fn test_fixed_grade_uses_unrounded_average() {
        let config = TrainingConfig::for_profile(Profile::Fixed);
        let data = identical_records(
            &config.spec,
            &[("math score", 89.9), ("reading score", 90.0), ("writing score", 89.98)],
        );
        let predictor = Predictor::new(TrainEngine::new(config).fit(&data).unwrap()).unwrap();

        let mut body = fixed_request();
        body["math_score"] = json!(89.9);
        body["reading_score"] = json!(90.0);
        body["writing_score"] = json!(89.98);
        let prediction = predictor.predict(&PredictionRequest::from_value(body).unwrap()).unwrap();

        let PredictionOutcome::Fixed(fixed) = &prediction.outcome else {
            panic!("expected fixed outcome");
        };
        assert_eq!(fixed.predicted_scores["average"], 90.0);
        assert_eq!(fixed.prediction, LetterGrade::B);
    }

    #[test]
    fn test_subject_grade_uses_unrounded_score() {
        let config = TrainingConfig::for_profile(Profile::MultiSubject);
        let data = identical_records(&config.spec, &[("math score", 89.96)]);
        let predictor = Predictor::new(TrainEngine::new(config).fit(&data).unwrap()).unwrap();

        let mut body = fixed_request();
        body["target_subject"] = json!("math score");
        for subject in [
            "reading_score", "writing_score", "science_score", "history_score",
            "geography_score", "physics_score", "chemistry_score",
        ] {
            body[subject] = json!(70.0);
        }
        let prediction = predictor.predict(&PredictionRequest::from_value(body).unwrap()).unwrap();

        let PredictionOutcome::Subject(subject) = &prediction.outcome else {
            panic!("expected subject outcome");
        };
        assert_eq!(subject.predicted_score, 90.0);
        assert_eq!(subject.predicted_grade, LetterGrade::B);
        assert!(subject.message.contains("grade B"));
    }

    #[test]
    fn test_prediction_is_deterministic() {
        let predictor = predictor(Profile::Fixed);
        let request = PredictionRequest::from_value(fixed_request()).unwrap();
        let a = predictor.predict(&request).unwrap();
        let b = predictor.predict(&request).unwrap();
        assert_eq!(a.outcome.score(), b.outcome.score());
        assert_eq!(a.neighbors, b.neighbors);
    }

    #[test]
    fn test_subject_prediction() {
        let predictor = predictor(Profile::MultiSubject);
        let mut body = fixed_request();
        body["target_subject"] = json!("science score");
        for subject in ["writing score", "history score", "geography score", "physics score", "chemistry score"] {
            body[subject] = json!(75);
        }
        let prediction = predictor.predict(&PredictionRequest::from_value(body).unwrap()).unwrap();

        let PredictionOutcome::Subject(subject) = &prediction.outcome else {
            panic!("expected subject outcome");
        };
        assert_eq!(subject.target_subject, "science score");
        assert_grade_near(subject.predicted_grade, subject.predicted_score);
        assert_eq!(subject.neighbors.len(), 5);
        assert!(subject.avg_grade.is_some());
        assert!(subject.confidence.is_none());
        assert!(!subject.recommendation.is_empty());
    }

    #[test]
    fn test_unknown_and_missing_target() {
        let predictor = predictor(Profile::MultiSubject);
        let mut body = fixed_request();
        let err = predictor
            .predict(&PredictionRequest::from_value(body.clone()).unwrap())
            .unwrap_err();
        assert!(matches!(err, GradeError::MissingField(ref f) if f == TARGET_FIELD));

        body["target_subject"] = json!("art score");
        let err = predictor.predict(&PredictionRequest::from_value(body).unwrap()).unwrap_err();
        assert!(err.to_string().contains("art score"));
    }

    #[test]
    fn test_unseen_values_reported() {
        let predictor = predictor(Profile::Fixed);
        let mut body = fixed_request();
        body["race"] = json!("group Z");
        let prediction = predictor.predict(&PredictionRequest::from_value(body).unwrap()).unwrap();
        let json = serde_json::to_value(&prediction.outcome).unwrap();
        assert_eq!(json["unseen_values"], json!(["race"]));
        assert_eq!(json["success"], json!(true));
    }

    #[test]
    fn test_requester_identity() {
        let mut body = fixed_request();
        body["user_email"] = json!("  student@example.com ");
        let request = PredictionRequest::from_value(body).unwrap();
        assert_eq!(request.requester.as_deref(), Some("student@example.com"));

        assert!(PredictionRequest::from_json(b"{not json").is_err());
    }

    #[test]
    fn test_summary() {
        let summary = predictor(Profile::Fixed).summary();
        assert_eq!(summary.heads.len(), 1);
        assert_eq!(summary.heads[0].n_features, 8);
        assert_eq!(summary.vocabulary["gender"], vec!["female", "male"]);
    }
}
