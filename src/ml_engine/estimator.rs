//! Estimator capability contract
//!
//! An [`Estimator`] is an unfitted strategy; fitting it yields an immutable
//! [`Predictor`]. The evaluator only ever talks to these two traits, so a new
//! model family plugs in by implementing them.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Dense design matrix, one row per observation in covariate order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data: Array2<f64>,
}

impl FeatureMatrix {
    /// Build from rows; every row must have `n_cols` values.
    pub fn from_rows(rows: &[Vec<f64>], n_cols: usize) -> Result<Self, FitError> {
        let mut data = Array2::zeros((0, n_cols));
        for (i, row) in rows.iter().enumerate() {
            data.push_row(ArrayView1::from(row.as_slice()))
                .map_err(|_| {
                    FitError::Invalid(format!(
                        "row {i} has {} values, expected {n_cols}",
                        row.len()
                    ))
                })?;
        }
        Ok(Self { data })
    }

    /// Single-row matrix.
    pub fn from_row(row: &[f64]) -> Self {
        Self {
            data: Array1::from(row.to_vec()).insert_axis(Axis(0)),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn row(&self, i: usize) -> ArrayView1<'_, f64> {
        self.data.row(i)
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[[row, col]]
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.data
    }

    /// Copy of the listed columns, in the given order.
    pub fn select_columns(&self, columns: &[usize]) -> Array2<f64> {
        self.data.select(Axis(1), columns)
    }
}

/// Wall-clock budget for a single fit, checked cooperatively by estimators.
#[derive(Debug, Clone, Copy)]
pub struct FitBudget {
    limit: Option<Duration>,
    started: Instant,
}

impl FitBudget {
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            limit,
            started: Instant::now(),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }

    /// Fail with [`FitError::Timeout`] once the budget is spent.
    pub fn check(&self) -> Result<(), FitError> {
        match self.limit {
            Some(limit) if self.started.elapsed() >= limit => Err(FitError::Timeout {
                elapsed: self.started.elapsed(),
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Error)]
pub enum FitError {
    #[error("fit exceeded its time budget after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("estimator backend failed: {0}")]
    Backend(#[from] smartcore::error::Failed),

    #[error("estimator produced non-finite parameters")]
    NonFinite,

    #[error("invalid training data: {0}")]
    Invalid(String),
}

/// Human-readable description of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSummary {
    Linear {
        intercept: f64,
        coefficients: Vec<f64>,
    },
    GradientBoosting {
        base_prediction: f64,
        stages: usize,
        trees: usize,
    },
    Other {
        description: String,
    },
}

/// Immutable fitted model.
pub trait Predictor: Debug + Send + Sync {
    /// Predict one row laid out in covariate order.
    fn predict_row(&self, row: &[f64]) -> f64;

    fn predict(&self, x: &FeatureMatrix) -> Vec<f64> {
        x.as_array()
            .rows()
            .into_iter()
            .map(|r| match r.as_slice() {
                Some(values) => self.predict_row(values),
                None => self.predict_row(&r.to_vec()),
            })
            .collect()
    }

    fn summary(&self) -> ModelSummary;
}

/// Unfitted estimator strategy.
pub trait Estimator: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn fit(
        &self,
        x: &FeatureMatrix,
        y: &[f64],
        budget: &FitBudget,
    ) -> Result<Box<dyn Predictor>, FitError>;
}

/// Shared input checks for estimator implementations.
pub(crate) fn check_training_data(x: &FeatureMatrix, y: &[f64]) -> Result<(), FitError> {
    if x.n_rows() != y.len() {
        return Err(FitError::Invalid(format!(
            "{} rows but {} targets",
            x.n_rows(),
            y.len()
        )));
    }
    if x.n_rows() == 0 {
        return Err(FitError::Invalid("no training rows".to_string()));
    }
    if y.iter().any(|v| !v.is_finite()) || x.as_array().iter().any(|v| !v.is_finite()) {
        return Err(FitError::Invalid("non-finite value in training data".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_matrix_layout() {
        let x = FeatureMatrix::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]], 2).unwrap();
        assert_eq!(x.n_rows(), 2);
        assert_eq!(x.row(1).to_vec(), vec![3.0, 4.0]);
        assert_eq!(x.get(0, 1), 2.0);
        assert_eq!(x.select_columns(&[1]).column(0).to_vec(), vec![2.0, 4.0]);
        assert_eq!(FeatureMatrix::from_row(&[5.0, 6.0]).n_rows(), 1);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(FeatureMatrix::from_rows(&[vec![1.0], vec![1.0, 2.0]], 1).is_err());
    }

    #[test]
    fn test_zero_budget_times_out() {
        let budget = FitBudget::new(Some(Duration::ZERO));
        assert!(matches!(budget.check(), Err(FitError::Timeout { .. })));
        assert!(FitBudget::unlimited().check().is_ok());
    }

    #[test]
    fn test_training_data_checks() {
        let x = FeatureMatrix::from_rows(&[vec![1.0]], 1).unwrap();
        assert!(check_training_data(&x, &[1.0, 2.0]).is_err());
        assert!(check_training_data(&x, &[f64::NAN]).is_err());
        assert!(check_training_data(&x, &[1.0]).is_ok());
    }
}
