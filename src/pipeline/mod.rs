//! Processing Pipeline Module
//!
//! ## Stage Sequence
//!
//! ```text
//! STAGE 1: Load     (mechanical rows joined with the weather station)
//! STAGE 2: Bounds   (quantile specs resolved once over the loaded data)
//! STAGE 3: Clean    (out-of-bounds values truncated to missing)
//! STAGE 4: Derive   (per-row and per-turbine windowed physics features)
//! STAGE 5: Compare  (every configured family per experiment, shared split)
//! STAGE 6: Assess   (best family's residuals against the threshold policy)
//! ```
//!
//! Configuration and schema errors abort the run. Insufficient data or a
//! best model whose held-out residuals have no spread only fails its
//! experiment, and a family that fails to train only fails its own entry in
//! the comparison.

use crate::acquisition::{load, LoadReport, ObservationSource};
use crate::config::TwinConfig;
use crate::deviation::{assess, summarize, Assessment, AssessmentSummary};
use crate::ml_engine::{
    compare, Evaluation, EvaluationRequest, ModelFamily, ModelSummary, ResidualStats,
};
use crate::physics_engine::{derive, DerivationReport, DerivationSettings};
use crate::processing::{clean, resolve_bounds, CleaningReport};
use crate::types::{ColumnId, Component, DerivedTable, PipelineError, PipelineResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

// ============================================================================
// Report Types
// ============================================================================

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub load: LoadReport,
    pub cleaning: CleaningReport,
    pub derivation: DerivationReport,
    pub experiments: Vec<ExperimentReport>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn experiment(&self, name: &str) -> Option<&ExperimentReport> {
        self.experiments.iter().find(|e| e.name == name)
    }

    /// Anomalies across all experiments.
    pub fn total_anomalies(&self) -> usize {
        self.experiments.iter().map(|e| e.anomalies.len()).sum()
    }
}

/// Fitted model description for the report.
#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub family: String,
    pub target: ColumnId,
    pub covariates: Vec<ColumnId>,
    pub summary: ModelSummary,
    /// `train.r2`, `test.r2`, `train.mse`, `test.mse`
    pub metrics: BTreeMap<String, f64>,
    pub r2_gap: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub residuals: ResidualStats,
}

impl ModelReport {
    fn from_evaluation(evaluation: &Evaluation) -> Self {
        let model = &evaluation.model;
        Self {
            family: model.family().to_string(),
            target: model.target(),
            covariates: model.covariates().to_vec(),
            summary: model.summary(),
            metrics: evaluation.metrics.as_mapping(),
            r2_gap: evaluation.metrics.r2_gap(),
            train_rows: evaluation.partition.train.len(),
            test_rows: evaluation.partition.test.len(),
            residuals: *model.residuals(),
        }
    }
}

/// Outcome of one family within an experiment.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FamilyOutcome {
    Fitted(ModelReport),
    Failed { family: String, error: String },
}

impl FamilyOutcome {
    pub fn family(&self) -> &str {
        match self {
            FamilyOutcome::Fitted(m) => &m.family,
            FamilyOutcome::Failed { family, .. } => family,
        }
    }

    pub fn metrics(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            FamilyOutcome::Fitted(m) => Some(&m.metrics),
            FamilyOutcome::Failed { .. } => None,
        }
    }
}

/// Result of one configured experiment.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentReport {
    pub name: String,
    pub target: ColumnId,
    pub covariates: Vec<ColumnId>,
    /// Set when the experiment could not run at all (e.g. too few rows).
    pub error: Option<String>,
    pub families: Vec<FamilyOutcome>,
    pub best_family: Option<String>,
    pub threshold: Option<f64>,
    pub turbines: Vec<AssessmentSummary>,
    /// Anomalous observations only.
    pub anomalies: Vec<Assessment>,
}

impl ExperimentReport {
    fn empty(name: &str, request: &EvaluationRequest) -> Self {
        Self {
            name: name.to_string(),
            target: request.target,
            covariates: request.covariates.clone(),
            error: None,
            families: Vec::new(),
            best_family: None,
            threshold: None,
            turbines: Vec::new(),
            anomalies: Vec::new(),
        }
    }

    pub fn family(&self, name: &str) -> Option<&FamilyOutcome> {
        self.families.iter().find(|f| f.family() == name)
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Run the full pipeline over a source.
pub fn run(source: &dyn ObservationSource, config: &TwinConfig) -> PipelineResult<RunReport> {
    let started = Instant::now();
    config
        .validate()
        .map_err(|e| PipelineError::config(Component::Config, e.to_string()))?;

    // STAGE 1
    let (table, load_report) = load(source)?;

    // STAGE 2-3
    let bounds = resolve_bounds(&table, &config.effective_bounds())?;
    let (cleaned, cleaning_report) = clean(&table, &bounds);

    // STAGE 4
    let settings = DerivationSettings::from_config(&config.turbine, &config.features);
    let (derived, derivation_report) = derive(&cleaned, &settings);

    // STAGE 5-6
    let mut experiments = Vec::with_capacity(config.experiments.len());
    for experiment in &config.experiments {
        let request = EvaluationRequest {
            target: experiment.target,
            covariates: experiment.covariates.clone(),
            split: config.evaluation.split(),
            fit_budget: config.evaluation.fit_budget(),
        };
        let families: Vec<ModelFamily> = experiment
            .families
            .iter()
            .map(|&kind| config.models.family(kind))
            .collect();

        let report = run_experiment(&experiment.name, &derived, &request, &families, config)?;
        experiments.push(report);
    }

    let report = RunReport {
        load: load_report,
        cleaning: cleaning_report,
        derivation: derivation_report,
        experiments,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    };
    info!(
        experiments = report.experiments.len(),
        anomalies = report.total_anomalies(),
        elapsed_ms = report.elapsed_ms,
        "Pipeline run complete"
    );
    Ok(report)
}

fn run_experiment(
    name: &str,
    derived: &DerivedTable,
    request: &EvaluationRequest,
    families: &[ModelFamily],
    config: &TwinConfig,
) -> PipelineResult<ExperimentReport> {
    let mut report = ExperimentReport::empty(name, request);

    let comparison = match compare(derived, request, families, config.evaluation.parallel) {
        Ok(c) => c,
        Err(e) if !e.is_fatal() => {
            warn!(experiment = name, error = %e, "Experiment skipped");
            report.error = Some(e.to_string());
            return Ok(report);
        }
        Err(e) => return Err(e),
    };

    for (family, outcome) in &comparison.outcomes {
        report.families.push(match outcome {
            Ok(evaluation) => FamilyOutcome::Fitted(ModelReport::from_evaluation(evaluation)),
            Err(e) => {
                warn!(experiment = name, family = %family, error = %e, "Model family failed");
                FamilyOutcome::Failed {
                    family: family.clone(),
                    error: e.to_string(),
                }
            }
        });
    }

    let Some(best) = comparison.best() else {
        warn!(experiment = name, "No model family fitted, nothing to assess");
        return Ok(report);
    };

    report.best_family = Some(best.model.family().to_string());
    let assessments = match assess(&best.model, derived.rows(), &config.threshold) {
        Ok(a) => a,
        Err(e) if !e.is_fatal() => {
            warn!(experiment = name, error = %e, "Assessment skipped");
            report.error = Some(e.to_string());
            return Ok(report);
        }
        Err(e) => return Err(e),
    };
    report.threshold = assessments.first().map(|a| a.threshold_used);
    report.turbines = summarize(&assessments);
    report.anomalies = assessments.into_iter().filter(|a| a.is_anomalous).collect();

    info!(
        experiment = name,
        best = best.model.family(),
        test_r2 = best.metrics.test.r2,
        threshold = ?report.threshold,
        anomalies = report.anomalies.len(),
        "Experiment assessed"
    );
    Ok(report)
}
