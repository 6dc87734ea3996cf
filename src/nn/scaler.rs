use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::features::{FeatureMatrix, CLOSE_COLUMN, FEATURE_NAMES, NUM_FEATURES};

/// Per-column affine map into [0, 1], fitted once and immutable afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: Vec<f64>,
    range: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit on every row of the fitting set. Rows must share the width of `names`.
    pub fn fit<R: AsRef<[f64]>>(rows: &[R], names: &[&str]) -> Result<Self> {
        if rows.is_empty() {
            return Err(ForecastError::InvalidConfig(
                "cannot fit a scaler on an empty set".into(),
            ));
        }
        let width = names.len();
        let mut min = vec![f64::INFINITY; width];
        let mut max = vec![f64::NEG_INFINITY; width];
        for row in rows {
            for (j, &x) in row.as_ref().iter().take(width).enumerate() {
                min[j] = min[j].min(x);
                max[j] = max[j].max(x);
            }
        }

        let mut range = Vec::with_capacity(width);
        for (j, name) in names.iter().enumerate() {
            let r = max[j] - min[j];
            if r == 0.0 || !r.is_finite() {
                return Err(ForecastError::DegenerateScale {
                    column: name.to_string(),
                    value: min[j],
                });
            }
            range.push(r);
        }
        Ok(Self { min, range })
    }

    pub fn transform_value(&self, column: usize, x: f64) -> f64 {
        (x - self.min[column]) / self.range[column]
    }

    pub fn inverse_value(&self, column: usize, scaled: f64) -> f64 {
        scaled * self.range[column] + self.min[column]
    }
}

/// The joint feature scaler and the close-only scaler of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerPair {
    pub features: MinMaxScaler,
    pub close: MinMaxScaler,
}

impl ScalerPair {
    /// Fit both scalers on the whole matrix.
    ///
    /// NOTE: the held-out tail is part of the fitting set, so its min/max leak
    /// into the scaling of the training windows (look-ahead bias). Fitting on
    /// the training segment only would remove it.
    pub fn fit(matrix: &FeatureMatrix) -> Result<Self> {
        let features = MinMaxScaler::fit(&matrix.rows, &FEATURE_NAMES)?;
        let closes: Vec<[f64; 1]> = matrix.rows.iter().map(|r| [r[CLOSE_COLUMN]]).collect();
        let close = MinMaxScaler::fit(&closes, &[FEATURE_NAMES[CLOSE_COLUMN]])?;
        Ok(Self { features, close })
    }

    /// Scale every row with the joint scaler
    pub fn transform(&self, matrix: &FeatureMatrix) -> Vec<[f64; NUM_FEATURES]> {
        matrix
            .rows
            .iter()
            .map(|row| {
                let mut out = [0.0; NUM_FEATURES];
                for (j, &x) in row.iter().enumerate() {
                    out[j] = self.features.transform_value(j, x);
                }
                out
            })
            .collect()
    }

    pub fn scale_close(&self, close: f64) -> f64 {
        self.close.transform_value(0, close)
    }

    /// Map a scaled close back to price units
    pub fn inverse_close(&self, scaled: f64) -> f64 {
        self.close.inverse_value(0, scaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::tests::synthetic_table;
    use crate::features::build_feature_matrix;
    use approx::assert_abs_diff_eq;

    fn matrix() -> FeatureMatrix {
        build_feature_matrix(&synthetic_table("TEST", 150), 10, 1).unwrap()
    }

    #[test]
    fn test_close_round_trip() {
        let m = matrix();
        let scalers = ScalerPair::fit(&m).unwrap();
        for close in m.closes() {
            let back = scalers.inverse_close(scalers.scale_close(close));
            assert_abs_diff_eq!(back, close, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_scaled_values_in_unit_interval() {
        let m = matrix();
        let scalers = ScalerPair::fit(&m).unwrap();
        let scaled = scalers.transform(&m);
        for j in 0..NUM_FEATURES {
            let col: Vec<f64> = scaled.iter().map(|r| r[j]).collect();
            assert!(col.iter().all(|v| (0.0..=1.0).contains(v)));
            let lo = col.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            assert_eq!(lo, 0.0, "column {} min", FEATURE_NAMES[j]);
            assert_eq!(hi, 1.0, "column {} max", FEATURE_NAMES[j]);
        }
    }

    #[test]
    fn test_close_scaler_agrees_with_joint_close_column() {
        let m = matrix();
        let scalers = ScalerPair::fit(&m).unwrap();
        let scaled = scalers.transform(&m);
        for (row, close) in scaled.iter().zip(m.closes()) {
            assert_abs_diff_eq!(row[CLOSE_COLUMN], scalers.scale_close(close), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_degenerate_column() {
        let rows = vec![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let err = MinMaxScaler::fit(&rows, &["a", "b"]).unwrap_err();
        match err {
            ForecastError::DegenerateScale { column, value } => {
                assert_eq!(column, "b");
                assert_eq!(value, 5.0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_per_column_affine_map() {
        let rows = vec![[0.0, 10.0], [4.0, 20.0]];
        let scaler = MinMaxScaler::fit(&rows, &["a", "b"]).unwrap();
        assert_eq!(scaler.transform_value(0, 2.0), 0.5);
        assert_eq!(scaler.transform_value(1, 15.0), 0.5);
        assert_eq!(scaler.inverse_value(1, 0.25), 12.5);
    }
}
