//! Pipeline error kinds
//!
//! Every variant names the component and input at fault. Configuration and
//! schema errors abort a run; insufficient data or a degenerate residual
//! spread aborts one experiment; a training timeout aborts one model family.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Pipeline component an error is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Loader,
    Cleaner,
    FeatureDeriver,
    ModelEvaluator,
    DeviationAssessor,
    Config,
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Component::Loader => "loader",
            Component::Cleaner => "cleaner",
            Component::FeatureDeriver => "feature deriver",
            Component::ModelEvaluator => "model evaluator",
            Component::DeviationAssessor => "deviation assessor",
            Component::Config => "config",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error in {component}: {message}")]
    Configuration {
        component: Component,
        message: String,
    },

    #[error("Schema error in {source_name}: required column '{column}' is absent")]
    Schema { source_name: String, column: String },

    #[error("Insufficient data for target '{target}': {rows} complete rows, need {required}")]
    InsufficientData {
        target: String,
        rows: usize,
        required: usize,
    },

    #[error("Training timeout: model family '{family}' exceeded its budget of {budget:?}")]
    TrainingTimeout { family: String, budget: Duration },

    #[error("Training failed for model family '{family}': {message}")]
    Training { family: String, message: String },

    #[error("Degenerate residuals in deviation assessor for model family '{family}': {detail}")]
    DegenerateResiduals { family: String, detail: String },

    #[error("I/O error reading {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("CSV error in {0}: {1}")]
    Csv(String, #[source] csv::Error),
}

impl PipelineError {
    pub fn config(component: Component, message: impl Into<String>) -> Self {
        PipelineError::Configuration {
            component,
            message: message.into(),
        }
    }

    /// True for errors that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Configuration { .. }
                | PipelineError::Schema { .. }
                | PipelineError::Io(..)
                | PipelineError::Csv(..)
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
