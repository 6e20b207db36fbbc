//! Observation source capability
//!
//! The loader only depends on [`ObservationSource`]; where the rows come from
//! (CSV files, a database export, a generator) is the source's business.

use crate::types::{Field, PipelineResult, TurbineId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Present readings of one row, keyed by field. Absent keys are missing.
pub type Readings = BTreeMap<Field, f64>;

/// One hourly row of a turbine's SCADA export.
#[derive(Debug, Clone, PartialEq)]
pub struct MechanicalRow {
    pub turbine_id: TurbineId,
    pub timestamp: DateTime<Utc>,
    pub readings: Readings,
}

/// One hourly row of the shared weather station.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRow {
    pub timestamp: DateTime<Utc>,
    pub readings: Readings,
}

/// Rows read from a source plus what had to be discarded on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    pub rows: Vec<T>,
    /// Cells that held something other than a number; loaded as missing.
    pub unparseable_cells: usize,
    /// Rows dropped because their timestamp could not be read.
    pub skipped_rows: usize,
}

impl<T> Batch<T> {
    pub fn clean(rows: Vec<T>) -> Self {
        Self {
            rows,
            unparseable_cells: 0,
            skipped_rows: 0,
        }
    }
}

/// Capability the loader depends on.
pub trait ObservationSource {
    fn mechanical_rows(&self) -> PipelineResult<Batch<MechanicalRow>>;

    fn weather_rows(&self) -> PipelineResult<Batch<WeatherRow>>;

    /// Short human-readable description for logs and reports.
    fn describe(&self) -> String;
}

/// Source backed by rows already in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySource {
    pub mechanical: Vec<MechanicalRow>,
    pub weather: Vec<WeatherRow>,
}

impl MemorySource {
    pub fn new(mechanical: Vec<MechanicalRow>, weather: Vec<WeatherRow>) -> Self {
        Self { mechanical, weather }
    }
}

impl ObservationSource for MemorySource {
    fn mechanical_rows(&self) -> PipelineResult<Batch<MechanicalRow>> {
        Ok(Batch::clean(self.mechanical.clone()))
    }

    fn weather_rows(&self) -> PipelineResult<Batch<WeatherRow>> {
        Ok(Batch::clean(self.weather.clone()))
    }

    fn describe(&self) -> String {
        format!(
            "memory ({} mechanical rows, {} weather rows)",
            self.mechanical.len(),
            self.weather.len()
        )
    }
}
