//! Held-out evaluation metrics

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Regression metrics for one predicted subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetMetrics {
    pub target: String,
    pub n_samples: usize,
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

impl TargetMetrics {
    pub fn compute(target: &str, y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Self {
        let n = y_true.len() as f64;
        let errors: Vec<f64> = y_true.iter().zip(y_pred.iter()).map(|(t, p)| t - p).collect();

        let mse: f64 = errors.iter().map(|e| e * e).sum::<f64>() / n;
        let mae: f64 = errors.iter().map(|e| e.abs()).sum::<f64>() / n;

        let y_mean: f64 = y_true.iter().sum::<f64>() / n;
        let ss_tot: f64 = y_true.iter().map(|y| (y - y_mean).powi(2)).sum();
        let ss_res: f64 = errors.iter().map(|e| e.powi(2)).sum();
        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Self {
            target: target.to_string(),
            n_samples: y_true.len(),
            mae,
            rmse: mse.sqrt(),
            r2,
        }
    }
}
