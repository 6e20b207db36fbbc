//! Ordinary least squares with intercept
//!
//! Fitting is delegated to smartcore's ridge regression with column
//! normalization, which keeps the system well conditioned when covariates
//! span very different scales (wind speed cubed next to a 0/1 indicator).
//! The SVD solver drops null directions, and a tiny ridge term keeps exactly
//! collinear indicator sets on a unique solution.

use super::estimator::{
    check_training_data, Estimator, FeatureMatrix, FitBudget, FitError, ModelSummary, Predictor,
};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use smartcore::linear::ridge_regression::{
    RidgeRegression, RidgeRegressionParameters, RidgeRegressionSolverName,
};

/// Column standard deviation below which a covariate is treated as constant.
const MIN_COLUMN_STD: f64 = 1e-12;

/// Linear estimator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearParams {
    /// Ridge penalty on standardized coefficients, relative to row count.
    pub ridge: f64,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self { ridge: 1e-8 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinearEstimator {
    params: LinearParams,
}

impl LinearEstimator {
    pub fn new(params: LinearParams) -> Self {
        Self { params }
    }
}

/// Fitted linear model: `y = intercept + Σ coefficients[j] * x[j]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl Predictor for LinearModel {
    fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }

    fn predict(&self, x: &FeatureMatrix) -> Vec<f64> {
        let coefficients = Array1::from(self.coefficients.clone());
        (x.as_array().dot(&coefficients) + self.intercept).to_vec()
    }

    fn summary(&self) -> ModelSummary {
        ModelSummary::Linear {
            intercept: self.intercept,
            coefficients: self.coefficients.clone(),
        }
    }
}

impl Estimator for LinearEstimator {
    fn name(&self) -> &str {
        "linear"
    }

    fn fit(
        &self,
        x: &FeatureMatrix,
        y: &[f64],
        budget: &FitBudget,
    ) -> Result<Box<dyn Predictor>, FitError> {
        check_training_data(x, y)?;
        if !(self.params.ridge >= 0.0 && self.params.ridge.is_finite()) {
            return Err(FitError::Invalid(format!(
                "ridge must be a non-negative number, got {}",
                self.params.ridge
            )));
        }
        let n = x.n_rows() as f64;
        let targets = Array1::from(y.to_vec());
        let y_mean = targets.sum() / n;

        // Constant columns cannot be normalized; they get a zero coefficient
        let stds = x.as_array().std_axis(Axis(0), 0.0);
        let active: Vec<usize> = stds
            .iter()
            .enumerate()
            .filter(|(_, &s)| s > MIN_COLUMN_STD)
            .map(|(j, _)| j)
            .collect();

        let mut coefficients = vec![0.0; x.n_cols()];
        if active.is_empty() {
            return Ok(Box::new(LinearModel {
                intercept: y_mean,
                coefficients,
            }));
        }

        let design: Array2<f64> = x.select_columns(&active);
        let params = RidgeRegressionParameters::default()
            .with_solver(RidgeRegressionSolverName::SVD)
            .with_normalize(true)
            .with_alpha(self.params.ridge * n);
        budget.check()?;

        let fitted = RidgeRegression::<f64, f64, Array2<f64>, Array1<f64>>::fit(
            &design, &targets, params,
        )?;
        budget.check()?;

        for (&j, &c) in active.iter().zip(fitted.coefficients().iter()) {
            coefficients[j] = c;
        }
        let intercept = *fitted.intercept();
        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(FitError::NonFinite);
        }

        Ok(Box::new(LinearModel {
            intercept,
            coefficients,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[Vec<f64>]) -> FeatureMatrix {
        FeatureMatrix::from_rows(rows, rows.first().map_or(0, Vec::len)).unwrap()
    }

    #[test]
    fn test_recovers_exact_linear_relationship() {
        let rows: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![i as f64 * 0.5, ((i * 7) % 11) as f64 * 30.0])
            .collect();
        let y: Vec<f64> = rows.iter().map(|r| 12.0 + 3.0 * r[0] - 0.25 * r[1]).collect();

        let model = LinearEstimator::default()
            .fit(&matrix(&rows), &y, &FitBudget::unlimited())
            .unwrap();
        match model.summary() {
            ModelSummary::Linear {
                intercept,
                coefficients,
            } => {
                assert!((intercept - 12.0).abs() < 1e-4);
                assert!((coefficients[0] - 3.0).abs() < 1e-6);
                assert!((coefficients[1] + 0.25).abs() < 1e-6);
            }
            other => panic!("unexpected summary {other:?}"),
        }
        assert!((model.predict_row(&[2.0, 10.0]) - 15.5).abs() < 1e-4);
    }

    #[test]
    fn test_batch_and_row_predictions_agree() {
        let rows: Vec<Vec<f64>> = (0..30).map(|i| vec![i as f64, (i % 5) as f64]).collect();
        let y: Vec<f64> = rows.iter().map(|r| 4.0 * r[0] - r[1] + 2.0).collect();
        let x = matrix(&rows);
        let model = LinearEstimator::default()
            .fit(&x, &y, &FitBudget::unlimited())
            .unwrap();
        for (batch, row) in model.predict(&x).iter().zip(&rows) {
            assert!((batch - model.predict_row(row)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_constant_column_gets_zero_coefficient() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 7.0]).collect();
        let y: Vec<f64> = rows.iter().map(|r| 2.0 * r[0] + 1.0).collect();
        let model = LinearEstimator::default()
            .fit(&matrix(&rows), &y, &FitBudget::unlimited())
            .unwrap();
        let ModelSummary::Linear { coefficients, .. } = model.summary() else {
            panic!("expected linear summary");
        };
        assert_eq!(coefficients[1], 0.0);
        assert!((coefficients[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_all_constant_columns_predict_the_mean() {
        let rows: Vec<Vec<f64>> = (0..10).map(|_| vec![1.0, 3.0]).collect();
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let model = LinearEstimator::default()
            .fit(&matrix(&rows), &y, &FitBudget::unlimited())
            .unwrap();
        assert!((model.predict_row(&[1.0, 3.0]) - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_collinear_one_hot_blocks_still_solve() {
        // Four indicators that always sum to one
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| {
                let mut r = vec![0.0; 4];
                r[i % 4] = 1.0;
                r
            })
            .collect();
        let y: Vec<f64> = (0..40).map(|i| (i % 4) as f64 * 10.0).collect();
        let model = LinearEstimator::default()
            .fit(&matrix(&rows), &y, &FitBudget::unlimited())
            .unwrap();
        for i in 0..4 {
            assert!((model.predict_row(&rows[i]) - y[i]).abs() < 1e-3);
        }
    }

    #[test]
    fn test_zero_ridge_is_plain_least_squares() {
        let rows: Vec<Vec<f64>> = (0..25)
            .map(|i| vec![i as f64, ((i * 3) % 7) as f64])
            .collect();
        let y: Vec<f64> = rows.iter().map(|r| -1.5 * r[0] + 0.5 * r[1] + 8.0).collect();
        let model = LinearEstimator::new(LinearParams { ridge: 0.0 })
            .fit(&matrix(&rows), &y, &FitBudget::unlimited())
            .unwrap();
        assert!((model.predict_row(&[10.0, 2.0]) - (-6.0)).abs() < 1e-6);
    }

    #[test]
    fn test_more_columns_than_rows_is_a_backend_error() {
        let rows = vec![vec![1.0, 5.0, 2.0], vec![2.0, 3.0, 9.0]];
        let result =
            LinearEstimator::default().fit(&matrix(&rows), &[1.0, 2.0], &FitBudget::unlimited());
        assert!(matches!(result, Err(FitError::Backend(_))));
    }

    #[test]
    fn test_negative_ridge_rejected() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let result = LinearEstimator::new(LinearParams { ridge: -1.0 }).fit(
            &matrix(&rows),
            &y,
            &FitBudget::unlimited(),
        );
        assert!(matches!(result, Err(FitError::Invalid(_))));
    }
}
