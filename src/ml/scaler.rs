use crate::error::{AppError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Per-column center and spread of a fitted [`StandardScaler`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParameters {
    pub mean: Vec<f64>,
    /// Population standard deviation
    pub scale: Vec<f64>,
}

/// Standardization `(x - mean) / std` over a fixed column layout
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit column means and population standard deviations.
    ///
    /// A column with zero spread cannot be standardized and fails the fit.
    pub fn fit(data: &Array2<f64>, column_names: &[&str]) -> Result<Self> {
        if data.nrows() == 0 {
            return Err(AppError::Fit("Cannot fit scaler on zero rows".to_string()));
        }
        if data.ncols() != column_names.len() {
            return Err(AppError::Fit(format!(
                "Scaler got {} columns but {} names",
                data.ncols(),
                column_names.len()
            )));
        }

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| AppError::Fit("Cannot compute column means".to_string()))?;
        let scale = data.std_axis(Axis(0), 0.0);

        for (i, s) in scale.iter().enumerate() {
            if !s.is_finite() || *s == 0.0 {
                return Err(AppError::Fit(format!(
                    "Column '{}' has zero spread in the training split",
                    column_names[i]
                )));
            }
        }

        Ok(Self { mean, scale })
    }

    pub fn from_parameters(params: ScalerParameters) -> Result<Self> {
        if params.mean.len() != params.scale.len() {
            return Err(AppError::Artifact(format!(
                "Scaler has {} means but {} scales",
                params.mean.len(),
                params.scale.len()
            )));
        }
        if params.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(AppError::Artifact(
                "Scaler contains a non-positive scale".to_string(),
            ));
        }
        Ok(Self {
            mean: Array1::from(params.mean),
            scale: Array1::from(params.scale),
        })
    }

    pub fn parameters(&self) -> ScalerParameters {
        ScalerParameters {
            mean: self.mean.to_vec(),
            scale: self.scale.to_vec(),
        }
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.n_features() {
            return Err(AppError::Internal(format!(
                "Scaler expects {} columns, got {}",
                self.n_features(),
                width
            )));
        }
        Ok(())
    }

    pub fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(data.ncols())?;
        Ok((data - &self.mean) / &self.scale)
    }

    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>> {
        self.check_width(row.len())?;
        Ok((&row - &self.mean) / &self.scale)
    }

    pub fn inverse_transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(data.ncols())?;
        Ok(data * &self.scale + &self.mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_uses_population_std() {
        let data = array![[1.0, 10.0], [3.0, 10.0], [5.0, 40.0], [7.0, 40.0]];
        let scaler = StandardScaler::fit(&data, &["a", "b"]).unwrap();
        let params = scaler.parameters();
        assert_eq!(params.mean, vec![4.0, 25.0]);
        assert!((params.scale[0] - 5.0_f64.sqrt()).abs() < 1e-12);
        assert!((params.scale[1] - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_transformed_columns_are_standardized() {
        let data = array![[1.0, 2.0], [2.0, 4.0], [3.0, 9.0], [6.0, 1.0]];
        let scaler = StandardScaler::fit(&data, &["a", "b"]).unwrap();
        let scaled = scaler.transform(&data).unwrap();
        for col in scaled.columns() {
            assert!(col.mean().unwrap().abs() < 1e-12);
            assert!((col.std(0.0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_inverse_recovers_input() {
        let data = array![[63.0, 233.0], [41.0, 204.0], [57.0, 354.0]];
        let scaler = StandardScaler::fit(&data, &["age", "chol"]).unwrap();
        let restored = scaler
            .inverse_transform(&scaler.transform(&data).unwrap())
            .unwrap();
        for (a, b) in data.iter().zip(restored.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_spread_column_fails_fit() {
        let data = array![[1.0, 5.0], [2.0, 5.0]];
        match StandardScaler::fit(&data, &["age", "ca"]) {
            Err(AppError::Fit(msg)) => assert!(msg.contains("'ca'")),
            other => panic!("expected fit error, got {:?}", other),
        }
    }

    #[test]
    fn test_width_mismatch_is_rejected() {
        let scaler = StandardScaler::from_parameters(ScalerParameters {
            mean: vec![0.0, 0.0],
            scale: vec![1.0, 1.0],
        })
        .unwrap();
        assert!(scaler.transform(&array![[1.0, 2.0, 3.0]]).is_err());
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(StandardScaler::from_parameters(ScalerParameters {
            mean: vec![0.0],
            scale: vec![0.0],
        })
        .is_err());
        assert!(StandardScaler::from_parameters(ScalerParameters {
            mean: vec![0.0, 1.0],
            scale: vec![1.0],
        })
        .is_err());
    }
}
