//! Deviation Assessor - Residual-Based Anomaly Verdicts
//!
//! Compares observed target values against a fitted model's predictions and
//! flags observations whose residual magnitude exceeds a threshold. The
//! assessor is a pure function of the fitted model, the observations and the
//! policy; it never refits or mutates anything.
//!
//! ## Usage
//!
//! ```ignore
//! let verdicts = assess(&evaluation.model, table.rows(), &ThresholdPolicy::Absolute { cutoff: 200.0 })?;
//! for summary in summarize(&verdicts) {
//!     println!("{}: {} anomalies", summary.turbine_id, summary.anomalies);
//! }
//! ```

mod policy;

pub use policy::{ThresholdPolicy, DEFAULT_SIGMA_MULTIPLIER};

use crate::ml_engine::FittedModel;
use crate::types::{DerivedObservation, PipelineResult, TurbineId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Verdict for one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub turbine_id: TurbineId,
    pub timestamp: DateTime<Utc>,
    /// Absent when a covariate is missing on this row.
    pub predicted: Option<f64>,
    pub observed: Option<f64>,
    /// Observed minus predicted; absent without both values.
    pub residual: Option<f64>,
    pub is_anomalous: bool,
    pub threshold_used: f64,
}

/// Assess a single observation against an already resolved threshold.
pub fn assess_with_threshold(
    model: &FittedModel,
    row: &DerivedObservation,
    threshold: f64,
) -> Assessment {
    let predicted = model.predict_observation(row);
    let observed = row.value(model.target());
    let residual = match (observed, predicted) {
        (Some(o), Some(p)) => Some(o - p),
        _ => None,
    };

    Assessment {
        turbine_id: row.turbine_id().clone(),
        timestamp: row.timestamp(),
        predicted,
        observed,
        residual,
        is_anomalous: residual.is_some_and(|r| r.abs() > threshold),
        threshold_used: threshold,
    }
}

/// Assess one observation.
pub fn assess_observation(
    model: &FittedModel,
    row: &DerivedObservation,
    policy: &ThresholdPolicy,
) -> PipelineResult<Assessment> {
    let threshold = policy.resolve(model)?;
    Ok(assess_with_threshold(model, row, threshold))
}

/// Assess a batch; the threshold is resolved once for the whole batch.
pub fn assess(
    model: &FittedModel,
    rows: &[DerivedObservation],
    policy: &ThresholdPolicy,
) -> PipelineResult<Vec<Assessment>> {
    let threshold = policy.resolve(model)?;
    let assessments: Vec<Assessment> = rows
        .iter()
        .map(|row| assess_with_threshold(model, row, threshold))
        .collect();

    debug!(
        family = model.family(),
        target = %model.target(),
        threshold,
        assessed = assessments.len(),
        anomalies = assessments.iter().filter(|a| a.is_anomalous).count(),
        "batch assessed"
    );
    Ok(assessments)
}

/// Per-turbine roll-up of assessments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSummary {
    pub turbine_id: TurbineId,
    pub assessed: usize,
    /// Rows that received a prediction.
    pub predicted: usize,
    /// Rows with a residual, i.e. eligible for a verdict.
    pub with_residual: usize,
    pub anomalies: usize,
    /// Anomalies over rows with a residual; 0 when there are none.
    pub anomaly_rate: f64,
    pub max_abs_residual: Option<f64>,
}

pub fn summarize(assessments: &[Assessment]) -> Vec<AssessmentSummary> {
    let mut by_turbine: BTreeMap<&TurbineId, Vec<&Assessment>> = BTreeMap::new();
    for a in assessments {
        by_turbine.entry(&a.turbine_id).or_default().push(a);
    }

    by_turbine
        .into_iter()
        .map(|(turbine_id, items)| {
            let predicted = items.iter().filter(|a| a.predicted.is_some()).count();
            let residuals: Vec<f64> = items.iter().filter_map(|a| a.residual).collect();
            let anomalies = items.iter().filter(|a| a.is_anomalous).count();
            AssessmentSummary {
                turbine_id: turbine_id.clone(),
                assessed: items.len(),
                predicted,
                with_residual: residuals.len(),
                anomalies,
                anomaly_rate: if residuals.is_empty() {
                    0.0
                } else {
                    anomalies as f64 / residuals.len() as f64
                },
                max_abs_residual: residuals.iter().map(|r| r.abs()).reduce(f64::max),
            }
        })
        .collect()
}
