//! Feature specification
//!
//! A [`FeatureSpec`] is the single description of how raw student records
//! become model inputs: which categorical columns exist, which subjects form
//! the closed target set, how categoricals are encoded and whether the
//! assembled vector is standardized. It is chosen at training time and
//! recorded in the artifact manifest, so the serving side never guesses.

use serde::{Deserialize, Serialize};

use crate::error::{GradeError, Result};

/// Categorical student attributes, in feature order.
pub const CATEGORICAL_COLUMNS: [&str; 5] = [
    "gender",
    "race",
    "parental level of education",
    "lunch",
    "test preparation course",
];

/// Subjects predicted together by the fixed profile.
pub const CORE_SUBJECTS: [&str; 3] = ["math score", "reading score", "writing score"];

/// Closed subject set of the multi-subject profile.
pub const EXTENDED_SUBJECTS: [&str; 8] = [
    "math score",
    "reading score",
    "writing score",
    "science score",
    "history score",
    "geography score",
    "physics score",
    "chemistry score",
];

/// Columns whose raw values are matched case-insensitively.
const LOWERCASED_COLUMNS: [&str; 2] = ["gender", "test preparation course"];

/// Which prediction pipeline the artifacts implement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// One model predicting math, reading and writing together
    Fixed,
    /// One model per subject, selected by the request's `target_subject`
    MultiSubject,
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Profile::Fixed => write!(f, "fixed"),
            Profile::MultiSubject => write!(f, "multi_subject"),
        }
    }
}

impl std::str::FromStr for Profile {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "fixed" | "three" | "3" => Ok(Profile::Fixed),
            "multi" | "multi_subject" | "subject" => Ok(Profile::MultiSubject),
            other => Err(GradeError::Config(format!(
                "unknown profile '{}', expected 'fixed' or 'multi'",
                other
            ))),
        }
    }
}

/// Categorical encoding strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingStrategy {
    /// Per-column integer codes; unseen values alias the first class
    Label,
    /// Shared indicator blocks; unseen values encode as all zeros
    OneHot,
}

impl std::str::FromStr for EncodingStrategy {
    type Err = GradeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "label" => Ok(EncodingStrategy::Label),
            "one_hot" | "onehot" => Ok(EncodingStrategy::OneHot),
            other => Err(GradeError::Config(format!(
                "unknown encoding '{}', expected 'label' or 'one-hot'",
                other
            ))),
        }
    }
}

/// What to do when a numeric feature is absent from a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingNumeric {
    /// Substitute 0.0
    Zero,
    /// Reject with `MissingField`
    Required,
}

/// A categorical input column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    /// Lowercase raw values before lookup
    pub lowercase: bool,
}

impl CategoricalColumn {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let lowercase = LOWERCASED_COLUMNS.contains(&name.as_str());
        Self { name, lowercase }
    }

    /// Canonical form of a raw value for this column.
    pub fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if self.lowercase {
            trimmed.to_lowercase()
        } else {
            trimmed.to_string()
        }
    }
}

/// Inputs and outputs of one fitted model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadSpec {
    /// Predicted subjects, in model output order
    pub targets: Vec<String>,
    /// Numeric features appended after the encoded categoricals
    pub numeric_features: Vec<String>,
}

impl HeadSpec {
    /// Human-readable key, e.g. `math score` or `math score+reading score`
    pub fn key(&self) -> String {
        self.targets.join("+")
    }
}

/// Complete description of the feature pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub profile: Profile,
    pub categorical: Vec<CategoricalColumn>,
    pub subjects: Vec<String>,
    pub encoding: EncodingStrategy,
    /// Standardize the assembled vector before inference
    pub scale: bool,
    pub missing_numeric: MissingNumeric,
    /// Report `1 / (1 + mean distance)` in responses
    pub report_confidence: bool,
    /// Report the neighbor list in responses
    pub report_neighbors: bool,
}

impl FeatureSpec {
    /// Legacy three-target pipeline: label encoding, no scaling.
    pub fn fixed() -> Self {
        Self {
            profile: Profile::Fixed,
            categorical: CATEGORICAL_COLUMNS.iter().map(|c| CategoricalColumn::new(*c)).collect(),
            subjects: CORE_SUBJECTS.iter().map(|s| s.to_string()).collect(),
            encoding: EncodingStrategy::Label,
            scale: false,
            missing_numeric: MissingNumeric::Zero,
            report_confidence: true,
            report_neighbors: false,
        }
    }

    /// Per-subject pipeline: one-hot encoding plus standardization.
    pub fn multi_subject() -> Self {
        Self {
            profile: Profile::MultiSubject,
            categorical: CATEGORICAL_COLUMNS.iter().map(|c| CategoricalColumn::new(*c)).collect(),
            subjects: EXTENDED_SUBJECTS.iter().map(|s| s.to_string()).collect(),
            encoding: EncodingStrategy::OneHot,
            scale: true,
            missing_numeric: MissingNumeric::Required,
            report_confidence: false,
            report_neighbors: true,
        }
    }

    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Fixed => Self::fixed(),
            Profile::MultiSubject => Self::multi_subject(),
        }
    }

    /// Builder method to override the encoding strategy
    pub fn with_encoding(mut self, encoding: EncodingStrategy) -> Self {
        self.encoding = encoding;
        self
    }

    /// Builder method to toggle standardization
    pub fn with_scaling(mut self, scale: bool) -> Self {
        self.scale = scale;
        self
    }

    pub fn categorical_names(&self) -> Vec<&str> {
        self.categorical.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&CategoricalColumn> {
        self.categorical.iter().find(|c| c.name == name)
    }

    /// The models trained for this profile, in a stable order.
    ///
    /// The fixed profile keeps the legacy layout where the three scores are
    /// both inputs and outputs. The multi-subject profile builds one head per
    /// subject and never feeds a subject its own score.
    pub fn heads(&self) -> Vec<HeadSpec> {
        match self.profile {
            Profile::Fixed => vec![HeadSpec {
                targets: self.subjects.clone(),
                numeric_features: self.subjects.clone(),
            }],
            Profile::MultiSubject => self
                .subjects
                .iter()
                .map(|target| HeadSpec {
                    targets: vec![target.clone()],
                    numeric_features: self
                        .subjects
                        .iter()
                        .filter(|s| *s != target)
                        .cloned()
                        .collect(),
                })
                .collect(),
        }
    }

    /// Resolve a requested subject against the closed subject set.
    ///
    /// Accepts spaced or underscored spelling in any case.
    pub fn resolve_subject(&self, requested: &str) -> Result<&str> {
        let wanted = requested.trim().replace('_', " ").to_lowercase();
        self.subjects
            .iter()
            .find(|s| **s == wanted)
            .map(|s| s.as_str())
            .ok_or_else(|| GradeError::UnknownTarget {
                target: requested.to_string(),
                known: self.subjects.clone(),
            })
    }
}

/// Underscored spelling of a field name (`math score` -> `math_score`).
pub fn underscored(name: &str) -> String {
    name.replace(' ', "_")
}

/// Short display label for a subject (`math score` -> `math`).
pub fn subject_label(subject: &str) -> &str {
    subject.strip_suffix(" score").unwrap_or(subject)
}
