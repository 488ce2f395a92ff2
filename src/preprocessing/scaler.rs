//! Feature scaling

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{GradeError, Result};

/// Standard scaling (z-score normalization): (x - mean) / std
///
/// Uses the population standard deviation; constant features get a scale of
/// 1.0 so they pass through centered instead of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit per-column mean and std
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(GradeError::Data("cannot fit scaler on zero rows".into()));
        }
        let mean: Array1<f64> = x
            .mean_axis(Axis(0))
            .ok_or_else(|| GradeError::Data("cannot fit scaler on zero rows".into()))?;
        let std = x.std_axis(Axis(0), 0.0);
        let scale = std.iter().map(|&s| if s == 0.0 || !s.is_finite() { 1.0 } else { s }).collect();

        Ok(Self { mean: mean.to_vec(), scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Scale a single row in place
    pub fn transform_row(&self, row: &mut [f64]) -> Result<()> {
        if row.len() != self.mean.len() {
            return Err(GradeError::DimensionMismatch {
                expected: self.mean.len(),
                actual: row.len(),
            });
        }
        for ((v, m), s) in row.iter_mut().zip(&self.mean).zip(&self.scale) {
            *v = (*v - m) / s;
        }
        Ok(())
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(GradeError::DimensionMismatch {
                expected: self.mean.len(),
                actual: x.ncols(),
            });
        }
        let mean = Array1::from_vec(self.mean.clone());
        let scale = Array1::from_vec(self.scale.clone());
        Ok((x - &mean) / &scale)
    }

    /// Fit and transform in one step
    pub fn fit_transform(x: &Array2<f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(x)?;
        let scaled = scaler.transform(x)?;
        Ok((scaler, scaled))
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let x = array![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0], [4.0, 10.0], [5.0, 10.0]];
        let (scaler, scaled) = StandardScaler::fit_transform(&x).unwrap();

        let col_mean = scaled.column(0).mean().unwrap();
        assert!(col_mean.abs() < 1e-10); // Mean should be ~0
        assert!((scaler.scale()[0] - 2.0_f64.sqrt()).abs() < 1e-10);

        // Constant column: scale 1.0, centered to zero
        assert_eq!(scaler.scale()[1], 1.0);
        assert!(scaled.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_transform_row_matches_batch() {
        let x = array![[1.0, 4.0], [3.0, 8.0]];
        let (scaler, scaled) = StandardScaler::fit_transform(&x).unwrap();

        let mut row = vec![3.0, 8.0];
        scaler.transform_row(&mut row).unwrap();
        assert!((row[0] - scaled[[1, 0]]).abs() < 1e-10);
        assert!((row[1] - scaled[[1, 1]]).abs() < 1e-10);
    }

    #[test]
    fn test_dimension_mismatch() {
        let x = array![[1.0, 4.0], [3.0, 8.0]];
        let scaler = StandardScaler::fit(&x).unwrap();
        let mut row = vec![1.0];
        assert!(matches!(
            scaler.transform_row(&mut row),
            Err(GradeError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }
}
