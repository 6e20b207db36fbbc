//! Core data types for the turbine twin pipeline
//!
//! - `observation`: measured field schema and the observation table
//! - `features`: derived feature schema and column addressing
//! - `error`: pipeline error kinds
//! - `thresholds`: datasheet limits and defaults

pub mod error;
pub mod features;
pub mod observation;
pub mod thresholds;

pub use error::{Component, PipelineError, PipelineResult};
pub use features::{ColumnId, DerivedFeatures, DerivedObservation, DerivedTable, Feature};
pub use observation::{
    Field, FieldGroup, Observation, ObservationTable, TurbineId, UnknownField, FIELD_COUNT,
};
pub use thresholds::{evaluation_defaults, feature_constants, turbine_limits};
