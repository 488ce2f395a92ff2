//! Training engine implementation

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::config::TrainingConfig;
use super::dataset::{clean_documents, TrainingRecord};
use super::knn::KNNRegressor;
use super::metrics::TargetMetrics;
use crate::error::{GradeError, Result};
use crate::export::{ArtifactBundle, PredictionHead};
use crate::preprocessing::{
    CategoricalEncoder, FeatureAssembler, FeatureSpec, HeadSpec, StandardScaler,
};

/// Fits the encoder, scalers and kNN models for one feature spec
#[derive(Debug, Clone)]
pub struct TrainEngine {
    config: TrainingConfig,
}

impl TrainEngine {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Clean raw documents and fit on the complete ones.
    pub fn fit_documents<'a, I>(&self, docs: I) -> Result<ArtifactBundle>
    where
        I: IntoIterator<Item = &'a Map<String, Value>>,
    {
        let (records, dropped) = clean_documents(docs, &self.config.spec);
        info!(kept = records.len(), dropped, "Loaded training rows");
        self.fit(&records)
    }

    /// Fit every head of the feature spec on `records`.
    pub fn fit(&self, records: &[TrainingRecord]) -> Result<ArtifactBundle> {
        let start = Instant::now();
        let spec = &self.config.spec;

        if records.is_empty() {
            return Err(GradeError::Data("no complete training rows".to_string()));
        }
        if !(0.0..1.0).contains(&self.config.test_size) {
            return Err(GradeError::Config(format!(
                "test_size must be in [0, 1), got {}",
                self.config.test_size
            )));
        }

        let encoder = self.fit_encoder(records)?;
        let (train_idx, test_idx) = self.split_indices(records.len());
        if train_idx.len() < self.config.n_neighbors {
            return Err(GradeError::Config(format!(
                "n_neighbors ({}) exceeds the number of training rows ({})",
                self.config.n_neighbors,
                train_idx.len()
            )));
        }
        info!(
            profile = %spec.profile,
            train = train_idx.len(),
            test = test_idx.len(),
            k = self.config.n_neighbors,
            "Fitting models"
        );

        let heads = spec
            .heads()
            .into_iter()
            .map(|head| self.fit_head(head, &encoder, records, &train_idx, &test_idx))
            .collect::<Result<Vec<_>>>()?;

        let bundle = ArtifactBundle {
            spec: spec.clone(),
            encoder,
            heads,
            subject_averages: subject_averages(records, &spec.subjects),
            created_at: Utc::now(),
            n_records: records.len(),
        };
        bundle.validate()?;

        info!(
            models = bundle.heads.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Training complete"
        );
        Ok(bundle)
    }

    fn fit_encoder(&self, records: &[TrainingRecord]) -> Result<CategoricalEncoder> {
        let data: Vec<(String, Vec<String>)> = self
            .config
            .spec
            .categorical
            .iter()
            .map(|column| {
                let values = records
                    .iter()
                    .filter_map(|r| r.attribute(&column.name))
                    .map(str::to_string)
                    .collect();
                (column.name.clone(), values)
            })
            .collect();
        CategoricalEncoder::fit(self.config.spec.encoding, &data)
    }

    /// Seeded shuffle split; the test share is rounded up but always leaves
    /// at least one training row.
    fn split_indices(&self, n: usize) -> (Vec<usize>, Vec<usize>) {
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.config.random_state);
        indices.shuffle(&mut rng);

        let n_test = ((n as f64) * self.config.test_size).ceil() as usize;
        let n_test = n_test.min(n.saturating_sub(1));
        let test = indices.split_off(n - n_test);
        (indices, test)
    }

    fn fit_head(
        &self,
        head: HeadSpec,
        encoder: &CategoricalEncoder,
        records: &[TrainingRecord],
        train_idx: &[usize],
        test_idx: &[usize],
    ) -> Result<PredictionHead> {
        let spec = &self.config.spec;
        let assembler = FeatureAssembler::new(spec, encoder);
        let feature_order = assembler.feature_order(&head);

        let (x, y) = design_matrices(records, &head, encoder, spec, feature_order.len())?;
        let mut x_train = x.select(Axis(0), train_idx);
        let y_train = y.select(Axis(0), train_idx);
        let mut x_test = x.select(Axis(0), test_idx);
        let y_test = y.select(Axis(0), test_idx);

        let scaler = if spec.scale {
            let (scaler, scaled) = StandardScaler::fit_transform(&x_train)?;
            x_train = scaled;
            if !test_idx.is_empty() {
                x_test = scaler.transform(&x_test)?;
            }
            Some(scaler)
        } else {
            None
        };

        let mut model = KNNRegressor::new(self.config.knn_config());
        model.fit(&x_train, &y_train)?;

        let metrics = if test_idx.is_empty() {
            Vec::new()
        } else {
            let y_pred = model.predict(&x_test)?;
            head.targets
                .iter()
                .enumerate()
                .map(|(j, target)| {
                    TargetMetrics::compute(target, y_test.column(j), y_pred.column(j))
                })
                .collect()
        };
        for m in &metrics {
            info!(target = %m.target, mae = m.mae, r2 = m.r2, "Held-out metrics");
        }
        debug!(head = %head.key(), features = feature_order.len(), "Fitted model");

        Ok(PredictionHead {
            spec: head,
            feature_order,
            scaler,
            model,
            metrics,
        })
    }
}

/// Unscaled feature and target matrices for every record
fn design_matrices(
    records: &[TrainingRecord],
    head: &HeadSpec,
    encoder: &CategoricalEncoder,
    spec: &FeatureSpec,
    width: usize,
) -> Result<(Array2<f64>, Array2<f64>)> {
    let n = records.len();
    let mut x = Vec::with_capacity(n * width);
    let mut y = Vec::with_capacity(n * head.targets.len());

    for record in records {
        let start = x.len();
        for column in &spec.categorical {
            let value = record
                .attribute(&column.name)
                .ok_or_else(|| GradeError::MissingField(column.name.clone()))?;
            encoder.encode(value, &column.name)?.encoded.extend_into(&mut x);
        }
        for name in &head.numeric_features {
            x.push(record.score(name).ok_or_else(|| GradeError::MissingField(name.clone()))?);
        }
        if x.len() - start != width {
            return Err(GradeError::DimensionMismatch { expected: width, actual: x.len() - start });
        }
        for target in &head.targets {
            y.push(record.score(target).ok_or_else(|| GradeError::MissingField(target.clone()))?);
        }
    }

    Ok((
        Array2::from_shape_vec((n, width), x)?,
        Array2::from_shape_vec((n, head.targets.len()), y)?,
    ))
}

fn subject_averages(records: &[TrainingRecord], subjects: &[String]) -> BTreeMap<String, f64> {
    subjects
        .iter()
        .filter_map(|subject| {
            let scores: Vec<f64> = records.iter().filter_map(|r| r.score(subject)).collect();
            if scores.is_empty() {
                None
            } else {
                Some((subject.clone(), scores.iter().sum::<f64>() / scores.len() as f64))
            }
        })
        .collect()
}
