//! Twin Configuration Module
//!
//! Provides the run configuration loaded from TOML files: turbine datasheet
//! constants, cleaning bounds, feature tuning, split settings, estimator
//! hyperparameters, the anomaly threshold policy and the experiment list.
//!
//! ## Loading Order
//!
//! 1. `TWIN_CONFIG` environment variable (path to TOML file)
//! 2. `twin_config.toml` in the current working directory
//! 3. Built-in defaults (turbine datasheet values)
//!
//! ## Usage
//!
//! Load once at startup and pass the config down explicitly:
//!
//! ```ignore
//! let config = TwinConfig::load();
//! let report = pipeline::run(&source, &config)?;
//! ```

mod twin_config;
pub mod defaults;
pub mod validation;

pub use twin_config::*;
