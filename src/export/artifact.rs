//! Trained artifact bundle
//!
//! A bundle is a directory holding `manifest.json` (feature spec, fitted
//! encoder, scalers, per-head feature order and metrics) plus one
//! checksummed binary file per fitted model. Bundles are written to a
//! sibling temp directory and swapped into place, so a reader sees either
//! the old bundle or the complete new one.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::serializer::{load_model, save_model};
use crate::error::{GradeError, Result};
use crate::preprocessing::{CategoricalEncoder, FeatureSpec, HeadSpec, Profile, StandardScaler};
use crate::training::{KNNRegressor, TargetMetrics};

/// Manifest layout version understood by this build
pub const SCHEMA_VERSION: u32 = 1;

pub const MANIFEST_FILE: &str = "manifest.json";

/// One fitted model with everything needed to build its input vector
#[derive(Debug, Clone)]
pub struct PredictionHead {
    pub spec: HeadSpec,
    /// Frozen vector layout: encoded categorical names, then numeric features
    pub feature_order: Vec<String>,
    pub scaler: Option<StandardScaler>,
    pub model: KNNRegressor,
    pub metrics: Vec<TargetMetrics>,
}

impl PredictionHead {
    pub fn predicts(&self, target: &str) -> bool {
        self.spec.targets.iter().any(|t| t == target)
    }
}

/// Everything produced by one training run
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub spec: FeatureSpec,
    pub encoder: CategoricalEncoder,
    pub heads: Vec<PredictionHead>,
    /// Mean score per subject over all cleaned training rows
    pub subject_averages: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
    pub n_records: usize,
}

/// Serialized form of [`ArtifactBundle`] minus the model payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub n_records: usize,
    pub spec: FeatureSpec,
    pub encoder: CategoricalEncoder,
    pub subject_averages: BTreeMap<String, f64>,
    pub heads: Vec<HeadManifest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadManifest {
    pub targets: Vec<String>,
    pub numeric_features: Vec<String>,
    pub feature_order: Vec<String>,
    pub n_features: usize,
    pub n_samples: usize,
    pub n_neighbors: usize,
    pub scaler: Option<StandardScaler>,
    pub model_file: String,
    pub checksum: u64,
    pub metrics: Vec<TargetMetrics>,
}

impl ArtifactBundle {
    /// Head that predicts `target`
    pub fn head_for(&self, target: &str) -> Option<&PredictionHead> {
        self.heads.iter().find(|h| h.predicts(target))
    }

    /// Check that the encoder, scalers and models agree with the `FeatureSpec`.
    ///
    /// Every failure is an [`GradeError::Artifact`]; a bundle that passes can
    /// serve any request the `FeatureSpec` accepts without a shape error.
    pub fn validate(&self) -> Result<()> {
        let spec = &self.spec;

        if self.encoder.strategy() != spec.encoding {
            return Err(artifact_err(format!(
                "encoder strategy {:?} does not match spec encoding {:?}",
                self.encoder.strategy(),
                spec.encoding
            )));
        }
        let columns = self.encoder.columns();
        if columns != spec.categorical_names() {
            return Err(artifact_err(format!(
                "encoder columns [{}] do not match categorical columns [{}]",
                columns.join(", "),
                spec.categorical_names().join(", ")
            )));
        }

        let expected_heads = spec.heads();
        if expected_heads.len() != self.heads.len() {
            return Err(artifact_err(format!(
                "expected {} model(s) for the {} profile, found {}",
                expected_heads.len(),
                spec.profile,
                self.heads.len()
            )));
        }

        let encoded_names = self.encoder.feature_names();
        for (expected, head) in expected_heads.iter().zip(&self.heads) {
            let key = head.spec.key();
            if *expected != head.spec {
                return Err(artifact_err(format!(
                    "model '{}' does not match expected head '{}'",
                    key,
                    expected.key()
                )));
            }
            if spec.profile == Profile::MultiSubject
                && head.spec.targets.iter().any(|t| head.spec.numeric_features.contains(t))
            {
                return Err(artifact_err(format!("model '{}' uses its own target as input", key)));
            }

            let mut order = encoded_names.clone();
            order.extend(head.spec.numeric_features.iter().cloned());
            if order != head.feature_order {
                return Err(artifact_err(format!(
                    "model '{}' feature order does not match the fitted encoder",
                    key
                )));
            }

            let n_features = head.model.n_features().ok_or(GradeError::ModelNotFitted)?;
            if n_features != head.feature_order.len() {
                return Err(artifact_err(format!(
                    "model '{}' expects {} features but the feature order has {}",
                    key,
                    n_features,
                    head.feature_order.len()
                )));
            }
            if head.model.n_targets() != Some(head.spec.targets.len()) {
                return Err(artifact_err(format!(
                    "model '{}' predicts {:?} targets, expected {}",
                    key,
                    head.model.n_targets(),
                    head.spec.targets.len()
                )));
            }

            match (&head.scaler, spec.scale) {
                (Some(scaler), true) if scaler.n_features() == n_features => {}
                (Some(scaler), true) => {
                    return Err(artifact_err(format!(
                        "model '{}' scaler has {} features, expected {}",
                        key,
                        scaler.n_features(),
                        n_features
                    )))
                }
                (None, false) => {}
                (None, true) => {
                    return Err(artifact_err(format!("model '{}' is missing its scaler", key)))
                }
                (Some(_), false) => {
                    return Err(artifact_err(format!(
                        "model '{}' has a scaler but scaling is disabled",
                        key
                    )))
                }
            }
        }

        Ok(())
    }

    fn manifest(&self) -> Result<(ArtifactManifest, Vec<(&KNNRegressor, String)>)> {
        let mut heads = Vec::with_capacity(self.heads.len());
        let mut models = Vec::with_capacity(self.heads.len());
        for head in &self.heads {
            let model_file = format!("model-{}.bin", slug(&head.spec.key()));
            heads.push(HeadManifest {
                targets: head.spec.targets.clone(),
                numeric_features: head.spec.numeric_features.clone(),
                feature_order: head.feature_order.clone(),
                n_features: head.model.n_features().ok_or(GradeError::ModelNotFitted)?,
                n_samples: head.model.n_samples().ok_or(GradeError::ModelNotFitted)?,
                n_neighbors: head.model.config().n_neighbors,
                scaler: head.scaler.clone(),
                model_file: model_file.clone(),
                checksum: 0,
                metrics: head.metrics.clone(),
            });
            models.push((&head.model, model_file));
        }

        Ok((
            ArtifactManifest {
                schema_version: SCHEMA_VERSION,
                created_at: self.created_at,
                n_records: self.n_records,
                spec: self.spec.clone(),
                encoder: self.encoder.clone(),
                subject_averages: self.subject_averages.clone(),
                heads,
            },
            models,
        ))
    }

    /// Validate and write the bundle to `dir`, replacing any previous one.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        self.validate()?;
        let dir = dir.as_ref();
        let staging = sibling(dir, "tmp");
        fs::create_dir_all(&staging)?;

        let written = self.write_into(&staging);
        if let Err(e) = written {
            fs::remove_dir_all(&staging).ok();
            return Err(e);
        }

        if dir.exists() {
            let previous = sibling(dir, "old");
            fs::rename(dir, &previous)?;
            if let Err(e) = fs::rename(&staging, dir) {
                fs::rename(&previous, dir).ok();
                fs::remove_dir_all(&staging).ok();
                return Err(e.into());
            }
            fs::remove_dir_all(&previous).ok();
        } else {
            fs::rename(&staging, dir)?;
        }

        info!(
            path = %dir.display(),
            profile = %self.spec.profile,
            models = self.heads.len(),
            "Saved artifacts"
        );
        Ok(())
    }

    fn write_into(&self, staging: &Path) -> Result<()> {
        let (mut manifest, models) = self.manifest()?;
        for (head, (model, file)) in manifest.heads.iter_mut().zip(models) {
            head.checksum = save_model(model, staging.join(&file))?;
            debug!(file = %file, checksum = head.checksum, "Wrote model file");
        }
        let json = serde_json::to_string_pretty(&manifest)?;
        fs::write(staging.join(MANIFEST_FILE), json)?;
        Ok(())
    }

    /// Load and validate a bundle written by [`ArtifactBundle::save`].
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let manifest = read_manifest(dir)?;

        let mut heads = Vec::with_capacity(manifest.heads.len());
        for head in manifest.heads {
            let model = load_model(dir.join(&head.model_file), head.checksum)?;
            heads.push(PredictionHead {
                spec: HeadSpec {
                    targets: head.targets,
                    numeric_features: head.numeric_features,
                },
                feature_order: head.feature_order,
                scaler: head.scaler,
                model,
                metrics: head.metrics,
            });
        }

        let bundle = Self {
            spec: manifest.spec,
            encoder: manifest.encoder,
            heads,
            subject_averages: manifest.subject_averages,
            created_at: manifest.created_at,
            n_records: manifest.n_records,
        };
        bundle.validate()?;
        Ok(bundle)
    }
}

/// Read just the manifest, checking the schema version.
pub fn read_manifest(dir: impl AsRef<Path>) -> Result<ArtifactManifest> {
    let path = dir.as_ref().join(MANIFEST_FILE);
    let json = fs::read_to_string(&path).map_err(|e| {
        artifact_err(format!("cannot read {}: {}", path.display(), e))
    })?;
    let manifest: ArtifactManifest = serde_json::from_str(&json)
        .map_err(|e| artifact_err(format!("invalid manifest {}: {}", path.display(), e)))?;
    if manifest.schema_version != SCHEMA_VERSION {
        return Err(artifact_err(format!(
            "unsupported artifact schema version {} (expected {})",
            manifest.schema_version, SCHEMA_VERSION
        )));
    }
    Ok(manifest)
}

fn artifact_err(msg: String) -> GradeError {
    GradeError::Artifact(msg)
}

fn sibling(dir: &Path, tag: &str) -> PathBuf {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifacts".to_string());
    dir.with_file_name(format!(".{}.{}-{}", name, tag, uuid::Uuid::new_v4().simple()))
}

fn slug(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
