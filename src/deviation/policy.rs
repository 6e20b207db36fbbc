//! Anomaly threshold policies

use crate::ml_engine::FittedModel;
use crate::types::{Component, PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Default sigma multiplier for residual-based thresholds
pub const DEFAULT_SIGMA_MULTIPLIER: f64 = 3.0;

/// How "anomalous" is defined for a residual.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Fixed residual magnitude, in target units.
    Absolute { cutoff: f64 },
    /// Multiple of the model's held-out residual standard deviation.
    Sigma { multiplier: f64 },
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        ThresholdPolicy::Sigma {
            multiplier: DEFAULT_SIGMA_MULTIPLIER,
        }
    }
}

impl ThresholdPolicy {
    /// Check the policy's own parameters, independent of any model.
    pub fn validate(&self) -> PipelineResult<()> {
        let (name, value) = match *self {
            ThresholdPolicy::Absolute { cutoff } => ("cutoff", cutoff),
            ThresholdPolicy::Sigma { multiplier } => ("multiplier", multiplier),
        };
        if !value.is_finite() || value <= 0.0 {
            return Err(PipelineError::config(
                Component::DeviationAssessor,
                format!("threshold {name} must be a positive finite number, got {value}"),
            ));
        }
        Ok(())
    }

    /// Residual magnitude above which an observation is anomalous for `model`.
    ///
    /// A sigma threshold that cannot be formed from the model's held-out
    /// residuals is a property of that model's data, not of the policy, and
    /// is reported as [`PipelineError::DegenerateResiduals`].
    pub fn resolve(&self, model: &FittedModel) -> PipelineResult<f64> {
        self.validate()?;
        match *self {
            ThresholdPolicy::Absolute { cutoff } => Ok(cutoff),
            ThresholdPolicy::Sigma { multiplier } => {
                let stats = model.residuals();
                if stats.count < 2 {
                    return Err(PipelineError::DegenerateResiduals {
                        family: model.family().to_string(),
                        detail: format!(
                            "sigma threshold needs at least 2 held-out residuals, got {}",
                            stats.count
                        ),
                    });
                }
                let threshold = multiplier * stats.std_dev;
                if !threshold.is_finite() || threshold <= 0.0 {
                    return Err(PipelineError::DegenerateResiduals {
                        family: model.family().to_string(),
                        detail: format!(
                            "held-out residual std {} gives sigma threshold {threshold}",
                            stats.std_dev
                        ),
                    });
                }
                Ok(threshold)
            }
        }
    }
}
