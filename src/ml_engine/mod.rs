//! Model Evaluator: fit and score model families on derived observations
//!
//! ## Architecture
//! - `estimator`: `Estimator` / `Predictor` traits, design matrix, fit budget
//! - `linear`: least squares on standardized covariates (smartcore ridge, SVD)
//! - `gradient_boosting`: staged smartcore `XGRegressor` ensembles
//! - `split`: seeded train/test partitioning
//! - `metrics`: R², MSE and residual statistics
//! - `evaluator`: row selection, fitting, scoring and family comparison (rayon)

pub mod estimator;
pub mod evaluator;
pub mod gradient_boosting;
pub mod linear;
pub mod metrics;
pub mod split;

pub use estimator::{Estimator, FeatureMatrix, FitBudget, FitError, ModelSummary, Predictor};
pub use evaluator::{
    compare, evaluate, fit_family, prepare, Comparison, Evaluation, EvaluationRequest,
    FittedModel, PreparedData,
};
pub use gradient_boosting::{GradientBoostingEstimator, GradientBoostingParams};
pub use linear::{LinearEstimator, LinearParams};
pub use metrics::{Metrics, PartitionMetrics, ResidualStats};
pub use split::{split_indices, Partition, SplitConfig};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Model family names as they appear in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FamilyKind {
    Linear,
    GradientBoosting,
}

impl FamilyKind {
    pub const fn name(self) -> &'static str {
        match self {
            FamilyKind::Linear => "linear",
            FamilyKind::GradientBoosting => "gradient_boosting",
        }
    }
}

impl fmt::Display for FamilyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A model family together with its hyperparameters.
#[derive(Debug, Clone)]
pub enum ModelFamily {
    Linear(LinearParams),
    GradientBoosting(GradientBoostingParams),
    /// Any other estimator, registered under its own name.
    Custom(Arc<dyn Estimator>),
}

impl ModelFamily {
    pub fn name(&self) -> &str {
        match self {
            ModelFamily::Linear(_) => FamilyKind::Linear.name(),
            ModelFamily::GradientBoosting(_) => FamilyKind::GradientBoosting.name(),
            ModelFamily::Custom(est) => est.name(),
        }
    }

    pub fn estimator(&self) -> Arc<dyn Estimator> {
        match self {
            ModelFamily::Linear(p) => Arc::new(LinearEstimator::new(*p)),
            ModelFamily::GradientBoosting(p) => Arc::new(GradientBoostingEstimator::new(*p)),
            ModelFamily::Custom(est) => Arc::clone(est),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_names_match_config_kinds() {
        assert_eq!(
            ModelFamily::Linear(LinearParams::default()).name(),
            FamilyKind::Linear.name()
        );
        assert_eq!(
            ModelFamily::GradientBoosting(GradientBoostingParams::default()).name(),
            "gradient_boosting"
        );
        let kind: FamilyKind = serde_json::from_str("\"gradient_boosting\"").unwrap();
        assert_eq!(kind, FamilyKind::GradientBoosting);
    }

    #[test]
    fn test_custom_family_uses_estimator_name() {
        let family = ModelFamily::Custom(Arc::new(LinearEstimator::default()));
        assert_eq!(family.name(), "linear");
        assert_eq!(family.estimator().name(), "linear");
    }
}
