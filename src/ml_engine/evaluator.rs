//! Model Evaluator
//!
//! Selects the complete rows for a target/covariate set, splits them with a
//! seeded shuffle, fits one or more model families on the training side and
//! scores both sides. Families in a comparison share one partition so their
//! metrics are directly comparable.

use super::estimator::{FeatureMatrix, FitBudget, FitError, ModelSummary, Predictor};
use super::metrics::{Metrics, PartitionMetrics, ResidualStats};
use super::split::{split_indices, Partition, SplitConfig};
use super::ModelFamily;
use crate::types::{ColumnId, Component, DerivedObservation, DerivedTable, PipelineError, PipelineResult};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What to model and how to split.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    pub target: ColumnId,
    pub covariates: Vec<ColumnId>,
    pub split: SplitConfig,
    /// Per-family wall-clock limit; `None` means unbounded.
    pub fit_budget: Option<Duration>,
}

impl EvaluationRequest {
    pub fn new(target: ColumnId, covariates: Vec<ColumnId>) -> Self {
        Self {
            target,
            covariates,
            split: SplitConfig::default(),
            fit_budget: None,
        }
    }

    fn validate(&self) -> PipelineResult<()> {
        if self.covariates.is_empty() {
            return Err(PipelineError::config(
                Component::ModelEvaluator,
                format!("no covariates given for target '{}'", self.target),
            ));
        }
        if self.covariates.contains(&self.target) {
            return Err(PipelineError::config(
                Component::ModelEvaluator,
                format!("target '{}' is also listed as a covariate", self.target),
            ));
        }
        let unique: BTreeSet<_> = self.covariates.iter().collect();
        if unique.len() != self.covariates.len() {
            return Err(PipelineError::config(
                Component::ModelEvaluator,
                format!("duplicate covariates for target '{}'", self.target),
            ));
        }
        let fraction = self.split.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(PipelineError::config(
                Component::ModelEvaluator,
                format!("test_fraction must lie in (0, 1), got {fraction}"),
            ));
        }
        Ok(())
    }
}

/// A fitted predictor bound to its column layout and held-out residual spread.
#[derive(Debug, Clone)]
pub struct FittedModel {
    family: String,
    target: ColumnId,
    covariates: Vec<ColumnId>,
    predictor: Arc<dyn Predictor>,
    residuals: ResidualStats,
}

impl FittedModel {
    pub fn new(
        family: impl Into<String>,
        target: ColumnId,
        covariates: Vec<ColumnId>,
        predictor: Arc<dyn Predictor>,
        residuals: ResidualStats,
    ) -> Self {
        Self {
            family: family.into(),
            target,
            covariates,
            predictor,
            residuals,
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn target(&self) -> ColumnId {
        self.target
    }

    pub fn covariates(&self) -> &[ColumnId] {
        &self.covariates
    }

    /// Test-partition residual statistics.
    pub fn residuals(&self) -> &ResidualStats {
        &self.residuals
    }

    pub fn summary(&self) -> ModelSummary {
        self.predictor.summary()
    }

    /// Prediction for one row, or `None` if any covariate is missing there.
    pub fn predict_observation(&self, row: &DerivedObservation) -> Option<f64> {
        row.values(&self.covariates)
            .map(|values| self.predictor.predict_row(&values))
            .filter(|p| p.is_finite())
    }
}

/// Outcome of fitting one family.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub model: FittedModel,
    pub metrics: Metrics,
    /// Table row indices on each side of the split.
    pub partition: Partition,
}

/// Complete rows of one request, already split and laid out as matrices.
#[derive(Debug)]
pub struct PreparedData {
    request: EvaluationRequest,
    partition: Partition,
    x_train: FeatureMatrix,
    y_train: Vec<f64>,
    x_test: FeatureMatrix,
    y_test: Vec<f64>,
}

impl PreparedData {
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn request(&self) -> &EvaluationRequest {
        &self.request
    }
}

/// Select complete rows and split them.
pub fn prepare(table: &DerivedTable, request: &EvaluationRequest) -> PipelineResult<PreparedData> {
    request.validate()?;

    let mut columns = request.covariates.clone();
    columns.push(request.target);

    let mut eligible = Vec::new();
    let mut values = Vec::new();
    for (i, row) in table.rows().iter().enumerate() {
        if let Some(v) = row.values(&columns) {
            eligible.push(i);
            values.push(v);
        }
    }

    let required = request.split.min_rows.max(2);
    if eligible.len() < required {
        return Err(PipelineError::InsufficientData {
            target: request.target.to_string(),
            rows: eligible.len(),
            required,
        });
    }

    let partition = split_indices(&eligible, &request.split);
    // Table index -> position in `values`
    let lookup = |idx: usize| eligible.binary_search(&idx).ok();
    let gather = |indices: &[usize]| -> PipelineResult<(FeatureMatrix, Vec<f64>)> {
        let k = request.covariates.len();
        let mut rows = Vec::with_capacity(indices.len());
        let mut y = Vec::with_capacity(indices.len());
        for &idx in indices {
            let Some(pos) = lookup(idx) else { continue };
            let v = &values[pos];
            rows.push(v[..k].to_vec());
            y.push(v[k]);
        }
        let x = FeatureMatrix::from_rows(&rows, k)
            .map_err(|e| PipelineError::config(Component::ModelEvaluator, e.to_string()))?;
        Ok((x, y))
    };
    let (x_train, y_train) = gather(&partition.train)?;
    let (x_test, y_test) = gather(&partition.test)?;

    debug!(
        target = %request.target,
        eligible = eligible.len(),
        train = y_train.len(),
        test = y_test.len(),
        "prepared evaluation data"
    );

    Ok(PreparedData {
        request: request.clone(),
        partition,
        x_train,
        y_train,
        x_test,
        y_test,
    })
}

/// Fit one family on prepared data and score both partitions.
pub fn fit_family(prepared: &PreparedData, family: &ModelFamily) -> PipelineResult<Evaluation> {
    let name = family.name().to_string();
    let estimator = family.estimator();
    let budget = FitBudget::new(prepared.request.fit_budget);

    let predictor: Arc<dyn Predictor> = estimator
        .fit(&prepared.x_train, &prepared.y_train, &budget)
        .map_err(|e| match e {
            FitError::Timeout { elapsed } => {
                warn!(family = %name, ?elapsed, "model fit exceeded its budget");
                PipelineError::TrainingTimeout {
                    family: name.clone(),
                    budget: budget.limit().unwrap_or(elapsed),
                }
            }
            other => PipelineError::Training {
                family: name.clone(),
                message: other.to_string(),
            },
        })?
        .into();

    let train_pred = predictor.predict(&prepared.x_train);
    let test_pred = predictor.predict(&prepared.x_test);
    if train_pred.iter().chain(&test_pred).any(|p| !p.is_finite()) {
        return Err(PipelineError::Training {
            family: name,
            message: "model produced non-finite predictions".to_string(),
        });
    }

    let metrics = Metrics {
        train: PartitionMetrics::score(&prepared.y_train, &train_pred),
        test: PartitionMetrics::score(&prepared.y_test, &test_pred),
    };
    let test_residuals: Vec<f64> = prepared
        .y_test
        .iter()
        .zip(&test_pred)
        .map(|(y, p)| y - p)
        .collect();

    info!(
        family = %name,
        target = %prepared.request.target,
        train_r2 = metrics.train.r2,
        test_r2 = metrics.test.r2,
        "model evaluated"
    );

    Ok(Evaluation {
        model: FittedModel::new(
            name,
            prepared.request.target,
            prepared.request.covariates.clone(),
            predictor,
            ResidualStats::from_residuals(&test_residuals),
        ),
        metrics,
        partition: prepared.partition.clone(),
    })
}

/// Fit a single family.
pub fn evaluate(
    table: &DerivedTable,
    request: &EvaluationRequest,
    family: &ModelFamily,
) -> PipelineResult<Evaluation> {
    let prepared = prepare(table, request)?;
    fit_family(&prepared, family)
}

/// Per-family results of a comparison, in the order the families were given.
#[derive(Debug)]
pub struct Comparison {
    pub outcomes: Vec<(String, PipelineResult<Evaluation>)>,
}

impl Comparison {
    /// Successful evaluation with the highest test R²; earlier families win ties.
    pub fn best(&self) -> Option<&Evaluation> {
        self.outcomes
            .iter()
            .filter_map(|(_, r)| r.as_ref().ok())
            .fold(None, |best: Option<&Evaluation>, e| match best {
                Some(b) if b.metrics.test.r2 >= e.metrics.test.r2 => Some(b),
                _ => Some(e),
            })
    }

    pub fn get(&self, family: &str) -> Option<&PipelineResult<Evaluation>> {
        self.outcomes
            .iter()
            .find(|(name, _)| name == family)
            .map(|(_, r)| r)
    }
}

/// Fit several families on one shared partition.
///
/// Data preparation errors fail the whole comparison; a family that fails to
/// fit only fails its own entry.
pub fn compare(
    table: &DerivedTable,
    request: &EvaluationRequest,
    families: &[ModelFamily],
    parallel: bool,
) -> PipelineResult<Comparison> {
    let prepared = prepare(table, request)?;
    let run = |family: &ModelFamily| (family.name().to_string(), fit_family(&prepared, family));

    let outcomes: Vec<_> = if parallel {
        families.par_iter().map(run).collect()
    } else {
        families.iter().map(run).collect()
    };
    Ok(Comparison { outcomes })
}
