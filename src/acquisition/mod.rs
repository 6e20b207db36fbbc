//! Sensor data acquisition module
//!
//! Handles ingestion of hourly SCADA and weather series:
//! - `source`: the [`ObservationSource`] capability and an in-memory source
//! - `csv_source`: per-turbine CSV exports plus a shared weather CSV
//! - `loader`: weather join and table construction
//! - `synthetic`: seeded fleet generator for demos and tests

pub mod csv_source;
pub mod loader;
pub mod source;
pub mod synthetic;

pub use csv_source::{parse_timestamp, write_mechanical_csv, write_weather_csv, CsvSource};
pub use loader::{load, LoadReport};
pub use source::{Batch, MechanicalRow, MemorySource, ObservationSource, Readings, WeatherRow};
pub use synthetic::{generate, SyntheticConfig, SyntheticDataset};
