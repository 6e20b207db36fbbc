//! Turbine Twin: Wind Turbine SCADA Digital Twin
//!
//! Batch pipeline that turns raw hourly SCADA and weather series into
//! per-observation anomaly verdicts.
//!
//! ## Architecture
//!
//! - **Acquisition**: loads turbine and weather series and joins them on timestamp
//! - **Processing**: truncates sensor faults and outliers to missing
//! - **Physics Engine**: derives aerodynamic, thermal and electrical features
//! - **ML Engine**: fits and compares model families on a seeded split
//! - **Deviation**: scores residuals of the best model against a threshold policy
//! - **Pipeline**: wires the stages together over the configured experiments

pub mod acquisition;
pub mod config;
pub mod deviation;
pub mod ml_engine;
pub mod physics_engine;
pub mod pipeline;
pub mod processing;
pub mod types;

// Re-export configuration
pub use config::TwinConfig;

// Re-export commonly used types
pub use types::{
    ColumnId, Component, DerivedObservation, DerivedTable, Feature, Field, Observation,
    ObservationTable, PipelineError, PipelineResult, TurbineId,
};

// Re-export stage entry points
pub use acquisition::{load, CsvSource, LoadReport, MemorySource, ObservationSource};
pub use deviation::{assess, assess_observation, Assessment, ThresholdPolicy};
pub use ml_engine::{compare, evaluate, Evaluation, EvaluationRequest, FittedModel, ModelFamily};
pub use physics_engine::{derive, DerivationSettings};
pub use pipeline::{run, RunReport};
pub use processing::{clean, resolve_bounds, CleanedTable};
