//! Gradient-boosted regression trees (squared loss)
//!
//! Thin adapter over smartcore's `XGRegressor`. The ensemble is fitted in
//! stages of `trees_per_stage` trees: the first stage starts from the target
//! mean, every later stage continues from the residuals of the stages before
//! it. For squared loss that is the same ensemble a single long fit would
//! grow, and it gives the fit budget a checkpoint between stages.

use super::estimator::{
    check_training_data, Estimator, FeatureMatrix, FitBudget, FitError, ModelSummary, Predictor,
};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use smartcore::xgboost::{XGRegressor, XGRegressorParameters};
use tracing::{debug, warn};

type Booster = XGRegressor<f64, f64, Array2<f64>, Array1<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientBoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
    /// Minimum rows on each side of a split (unit hessians under squared loss).
    pub min_child_weight: usize,
    /// L2 penalty on leaf values.
    pub lambda: f64,
    /// Fraction of training rows drawn for each tree.
    pub subsample: f64,
    /// Trees fitted between fit budget checks.
    pub trees_per_stage: usize,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_child_weight: 20,
            lambda: 1.0,
            subsample: 1.0,
            trees_per_stage: 10,
        }
    }
}

impl GradientBoostingParams {
    fn check(&self, rows: usize) -> Result<(), FitError> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(FitError::Invalid(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(FitError::Invalid(format!(
                "subsample must lie in (0, 1], got {}",
                self.subsample
            )));
        }
        // Each tree needs at least one sampled row
        if (rows as f64 * self.subsample) < 1.0 {
            return Err(FitError::Invalid(format!(
                "subsample {} leaves no rows out of {rows}",
                self.subsample
            )));
        }
        if !(self.lambda >= 0.0 && self.lambda.is_finite()) {
            return Err(FitError::Invalid(format!(
                "lambda must be non-negative, got {}",
                self.lambda
            )));
        }
        Ok(())
    }

    fn stage(&self, trees: usize, base_score: f64, index: usize) -> XGRegressorParameters {
        XGRegressorParameters::default()
            .with_n_estimators(trees)
            .with_learning_rate(self.learning_rate)
            .with_max_depth(self.max_depth)
            .with_min_child_weight(self.min_child_weight)
            .with_lambda(self.lambda)
            .with_gamma(0.0)
            .with_subsample(self.subsample)
            .with_base_score(base_score)
            .with_seed(index as u64)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GradientBoostingEstimator {
    params: GradientBoostingParams,
}

impl GradientBoostingEstimator {
    pub fn new(params: GradientBoostingParams) -> Self {
        Self { params }
    }
}

/// Fitted boosted ensemble: the sum of its stages' predictions.
#[derive(Debug)]
pub struct GradientBoostingModel {
    base_prediction: f64,
    stages: Vec<Booster>,
    trees: usize,
}

impl Predictor for GradientBoostingModel {
    fn predict_row(&self, row: &[f64]) -> f64 {
        self.predict(&FeatureMatrix::from_row(row))
            .first()
            .copied()
            .unwrap_or(f64::NAN)
    }

    fn predict(&self, x: &FeatureMatrix) -> Vec<f64> {
        let mut total = vec![0.0; x.n_rows()];
        for stage in &self.stages {
            match stage.predict(x.as_array()) {
                Ok(values) => {
                    for (t, v) in total.iter_mut().zip(values) {
                        *t += v;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "boosting stage failed to predict");
                    return vec![f64::NAN; x.n_rows()];
                }
            }
        }
        total
    }

    fn summary(&self) -> ModelSummary {
        ModelSummary::GradientBoosting {
            base_prediction: self.base_prediction,
            stages: self.stages.len(),
            trees: self.trees,
        }
    }
}

impl Estimator for GradientBoostingEstimator {
    fn name(&self) -> &str {
        "gradient_boosting"
    }

    fn fit(
        &self,
        x: &FeatureMatrix,
        y: &[f64],
        budget: &FitBudget,
    ) -> Result<Box<dyn Predictor>, FitError> {
        check_training_data(x, y)?;
        self.params.check(y.len())?;

        let targets = Array1::from(y.to_vec());
        let base_prediction = targets.sum() / y.len() as f64;
        let per_stage = self.params.trees_per_stage.max(1);

        let mut model = GradientBoostingModel {
            base_prediction,
            stages: Vec::new(),
            trees: 0,
        };
        let mut fitted = Array1::from_elem(y.len(), 0.0);

        while model.trees < self.params.n_estimators {
            budget.check()?;

            let trees = per_stage.min(self.params.n_estimators - model.trees);
            let (residuals, base_score) = if model.stages.is_empty() {
                (targets.clone(), base_prediction)
            } else {
                (&targets - &fitted, 0.0)
            };
            let params = self.params.stage(trees, base_score, model.stages.len());
            let stage = Booster::fit(x.as_array(), &residuals, params)?;

            fitted = fitted + Array1::from(stage.predict(x.as_array())?);
            model.stages.push(stage);
            model.trees += trees;
            debug!(trees = model.trees, "boosting stage complete");
        }

        Ok(Box::new(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn step_data() -> (FeatureMatrix, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..200).map(|i| vec![i as f64 / 10.0]).collect();
        let y: Vec<f64> = rows
            .iter()
            .map(|r| if r[0] < 10.0 { 100.0 } else { 500.0 })
            .collect();
        (FeatureMatrix::from_rows(&rows, 1).unwrap(), y)
    }

    #[test]
    fn test_learns_step_function() {
        let (x, y) = step_data();
        let model = GradientBoostingEstimator::default()
            .fit(&x, &y, &FitBudget::unlimited())
            .unwrap();
        assert!((model.predict_row(&[2.0]) - 100.0).abs() < 5.0);
        assert!((model.predict_row(&[15.0]) - 500.0).abs() < 5.0);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = step_data();
        let est = GradientBoostingEstimator::default();
        let a = est.fit(&x, &y, &FitBudget::unlimited()).unwrap();
        let b = est.fit(&x, &y, &FitBudget::unlimited()).unwrap();
        let pa = a.predict(&x);
        let pb = b.predict(&x);
        assert!(pa.iter().zip(&pb).all(|(u, v)| u.to_bits() == v.to_bits()));
    }

    #[test]
    fn test_staging_matches_single_fit() {
        let (x, y) = step_data();
        let staged = GradientBoostingEstimator::new(GradientBoostingParams {
            n_estimators: 30,
            trees_per_stage: 7,
            ..Default::default()
        })
        .fit(&x, &y, &FitBudget::unlimited())
        .unwrap();
        let single = GradientBoostingEstimator::new(GradientBoostingParams {
            n_estimators: 30,
            trees_per_stage: 30,
            ..Default::default()
        })
        .fit(&x, &y, &FitBudget::unlimited())
        .unwrap();

        let ModelSummary::GradientBoosting { stages, trees, .. } = staged.summary() else {
            panic!("expected boosting summary");
        };
        assert_eq!((stages, trees), (5, 30));
        for (a, b) in staged.predict(&x).iter().zip(single.predict(&x)) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
    }

    #[test]
    fn test_batch_and_row_predictions_agree() {
        let (x, y) = step_data();
        let model = GradientBoostingEstimator::default()
            .fit(&x, &y, &FitBudget::unlimited())
            .unwrap();
        let batch = model.predict(&x);
        for i in [0, 57, 199] {
            let row = x.row(i).to_vec();
            assert_eq!(batch[i].to_bits(), model.predict_row(&row).to_bits());
        }
    }

    #[test]
    fn test_min_child_weight_blocks_splits() {
        let (x, y) = step_data();
        let params = GradientBoostingParams {
            min_child_weight: 150,
            ..Default::default()
        };
        let model = GradientBoostingEstimator::new(params)
            .fit(&x, &y, &FitBudget::unlimited())
            .unwrap();
        // Single-leaf trees leave every prediction at the shrunk mean
        let p = model.predict(&x);
        assert!(p.iter().all(|v| (v - p[0]).abs() < 1e-9));
    }

    #[test]
    fn test_exhausted_budget_aborts() {
        let (x, y) = step_data();
        let budget = FitBudget::new(Some(Duration::ZERO));
        let result = GradientBoostingEstimator::default().fit(&x, &y, &budget);
        assert!(matches!(result, Err(FitError::Timeout { .. })));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let (x, y) = step_data();
        for params in [
            GradientBoostingParams {
                learning_rate: 0.0,
                ..Default::default()
            },
            GradientBoostingParams {
                subsample: 1.5,
                ..Default::default()
            },
            GradientBoostingParams {
                subsample: 0.001,
                ..Default::default()
            },
        ] {
            let result = GradientBoostingEstimator::new(params).fit(&x, &y, &FitBudget::unlimited());
            assert!(matches!(result, Err(FitError::Invalid(_))), "{params:?}");
        }
    }
}
