//! Twin Configuration - Turbine constants, cleaning bounds and model settings as TOML
//!
//! Every tunable of the pipeline is a field in this module. Each struct
//! implements `Default` with the turbine datasheet values, so a run without a
//! config file uses the Senvion MM92 fleet settings.

use crate::deviation::ThresholdPolicy;
use crate::ml_engine::{
    FamilyKind, GradientBoostingParams, LinearParams, ModelFamily, SplitConfig,
};
use crate::physics_engine::TemperatureUnit;
use crate::processing::{default_bound_specs, BoundSpec};
use crate::types::{evaluation_defaults, feature_constants, turbine_limits};
use crate::types::feature_constants::MAX_GRADIENT_GAP_HOURS;
use crate::types::{ColumnId, Feature, Field};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults::{CONFIG_ENV_VAR, LOCAL_CONFIG_FILE};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a pipeline run.
///
/// Load with `TwinConfig::load()` which searches:
/// 1. `$TWIN_CONFIG` env var
/// 2. `./twin_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinConfig {
    /// Turbine datasheet constants
    #[serde(default)]
    pub turbine: TurbineConfig,

    /// Cleaner bounds
    #[serde(default)]
    pub cleaning: CleaningConfig,

    /// Feature deriver tuning
    #[serde(default)]
    pub features: FeatureConfig,

    /// Train/test split and fit budget
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Estimator hyperparameters
    #[serde(default)]
    pub models: ModelsConfig,

    /// Deviation assessor threshold policy
    #[serde(default)]
    pub threshold: ThresholdPolicy,

    /// Target/covariate combinations to evaluate
    #[serde(default = "default_experiments")]
    pub experiments: Vec<ExperimentConfig>,
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self {
            turbine: TurbineConfig::default(),
            cleaning: CleaningConfig::default(),
            features: FeatureConfig::default(),
            evaluation: EvaluationConfig::default(),
            models: ModelsConfig::default(),
            threshold: ThresholdPolicy::default(),
            experiments: default_experiments(),
        }
    }
}

impl TwinConfig {
    /// Load configuration using the standard search order:
    /// 1. `$TWIN_CONFIG` environment variable
    /// 2. `./twin_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), turbine = %config.turbine.model, "Loaded twin config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./twin_config.toml
        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(turbine = %config.turbine.model, "Loaded twin config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: check for unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(contents)
            .map_err(|e| ConfigError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Cleaning bounds for this config's turbine.
    pub fn effective_bounds(&self) -> BTreeMap<String, BoundSpec> {
        self.cleaning.effective_bounds(&self.turbine)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all settings for internal consistency.
    ///
    /// Every problem found is reported, not just the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        // Turbine: cut-in below cut-out, rated values positive
        let t = &self.turbine;
        if t.cut_in_wind_speed < 0.0 || t.cut_in_wind_speed >= t.cut_out_wind_speed {
            errors.push(format!(
                "turbine.cut_in_wind_speed ({:.2}) must be >= 0 and < cut_out_wind_speed ({:.2})",
                t.cut_in_wind_speed, t.cut_out_wind_speed
            ));
        }
        if t.rated_rotor_speed <= 0.0 {
            errors.push("turbine.rated_rotor_speed must be > 0 (used as divisor)".to_string());
        }
        if t.rated_power_kw <= 0.0 {
            errors.push("turbine.rated_power_kw must be > 0".to_string());
        }
        if t.near_zero_wind_speed < 0.0 {
            errors.push("turbine.near_zero_wind_speed cannot be negative".to_string());
        }

        // Cleaning bounds: known field names, well-formed intervals
        for (name, spec) in &self.cleaning.bounds {
            if name.parse::<Field>().is_err() {
                errors.push(format!("cleaning.bounds: unknown field '{name}'"));
            }
            if let Err(e) = spec.check(name) {
                errors.push(format!("cleaning.bounds: {e}"));
            }
        }

        // Features
        let f = &self.features;
        if f.rolling_window_hours == 0 {
            errors.push("features.rolling_window_hours must be > 0".to_string());
        }
        if !(1..=MAX_GRADIENT_GAP_HOURS).contains(&f.gradient_max_gap_hours) {
            errors.push(format!(
                "features.gradient_max_gap_hours ({}) must lie in [1, {MAX_GRADIENT_GAP_HOURS}]",
                f.gradient_max_gap_hours
            ));
        }
        if !(-12..=14).contains(&f.local_utc_offset_hours) {
            errors.push(format!(
                "features.local_utc_offset_hours = {} is outside [-12, 14]",
                f.local_utc_offset_hours
            ));
        }

        // Evaluation
        let e = &self.evaluation;
        if !(e.test_fraction > 0.0 && e.test_fraction < 1.0) {
            errors.push(format!(
                "evaluation.test_fraction ({}) must lie strictly between 0 and 1",
                e.test_fraction
            ));
        }
        if e.min_rows < 2 {
            errors.push("evaluation.min_rows must be >= 2".to_string());
        }
        if let Some(secs) = e.fit_budget_secs {
            if !(secs > 0.0 && secs.is_finite()) {
                errors.push(format!("evaluation.fit_budget_secs ({secs}) must be > 0"));
            }
        }

        // Models
        let gb = &self.models.gradient_boosting;
        if gb.n_estimators == 0 {
            errors.push("models.gradient_boosting.n_estimators must be > 0".to_string());
        }
        if !(gb.learning_rate > 0.0 && gb.learning_rate <= 1.0) {
            errors.push(format!(
                "models.gradient_boosting.learning_rate ({}) must lie in (0, 1]",
                gb.learning_rate
            ));
        }
        if gb.max_depth == 0 {
            errors.push("models.gradient_boosting.max_depth must be > 0".to_string());
        }
        if gb.min_child_weight == 0 {
            errors.push("models.gradient_boosting.min_child_weight must be > 0".to_string());
        }
        if !(gb.lambda >= 0.0 && gb.lambda.is_finite()) {
            errors.push(format!(
                "models.gradient_boosting.lambda ({}) cannot be negative",
                gb.lambda
            ));
        }
        if !(gb.subsample > 0.0 && gb.subsample <= 1.0) {
            errors.push(format!(
                "models.gradient_boosting.subsample ({}) must lie in (0, 1]",
                gb.subsample
            ));
        }
        if gb.trees_per_stage == 0 {
            errors.push("models.gradient_boosting.trees_per_stage must be > 0".to_string());
        }
        if self.models.linear.ridge < 0.0 {
            errors.push("models.linear.ridge cannot be negative".to_string());
        }

        // Threshold policy
        if let Err(e) = self.threshold.validate() {
            errors.push(format!("threshold: {e}"));
        }

        // Experiments
        let mut names = HashSet::new();
        for exp in &self.experiments {
            if exp.name.trim().is_empty() {
                errors.push("experiments: name cannot be empty".to_string());
            } else if !names.insert(exp.name.as_str()) {
                errors.push(format!("experiments: duplicate name '{}'", exp.name));
            }
            if exp.covariates.is_empty() {
                errors.push(format!("experiments.{}: no covariates", exp.name));
            }
            if exp.covariates.contains(&exp.target) {
                errors.push(format!(
                    "experiments.{}: target '{}' is also a covariate",
                    exp.name, exp.target
                ));
            }
            if exp.families.is_empty() {
                errors.push(format!("experiments.{}: no model families", exp.name));
            }
        }

        // Physical range validation
        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        // Reject NaN/Inf in any config value (sweep all f64 fields via serialization)
        if let Ok(value) = toml::Value::try_from(self) {
            if has_non_finite(&value) {
                errors.push("Config contains NaN or Inf values; all settings must be finite numbers".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

fn has_non_finite(value: &toml::Value) -> bool {
    match value {
        toml::Value::Float(f) => !f.is_finite(),
        toml::Value::Array(items) => items.iter().any(has_non_finite),
        toml::Value::Table(table) => table.values().any(has_non_finite),
        _ => false,
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Turbine
// ============================================================================

/// Datasheet constants of the turbine model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurbineConfig {
    /// Turbine model name; appears in logs and reports only.
    #[serde(default = "default_turbine_model")]
    pub model: String,

    /// Wind speed below which the turbine produces no power (m/s).
    #[serde(default = "default_cut_in")]
    pub cut_in_wind_speed: f64,

    /// Wind speed above which the turbine shuts down (m/s).
    #[serde(default = "default_cut_out")]
    pub cut_out_wind_speed: f64,

    /// Rated rotor speed (rpm).
    #[serde(default = "default_rated_rotor_speed")]
    pub rated_rotor_speed: f64,

    /// Rated active power (kW).
    #[serde(default = "default_rated_power")]
    pub rated_power_kw: f64,

    /// Wind speed treated as "no wind" for the runaway-rotor flag (m/s).
    #[serde(default = "default_near_zero_wind")]
    pub near_zero_wind_speed: f64,
}

fn default_turbine_model() -> String {
    "Senvion MM92".to_string()
}
fn default_cut_in() -> f64 {
    turbine_limits::CUT_IN_WIND_SPEED
}
fn default_cut_out() -> f64 {
    turbine_limits::CUT_OUT_WIND_SPEED
}
fn default_rated_rotor_speed() -> f64 {
    turbine_limits::RATED_ROTOR_SPEED
}
fn default_rated_power() -> f64 {
    turbine_limits::RATED_POWER_KW
}
fn default_near_zero_wind() -> f64 {
    turbine_limits::NEAR_ZERO_WIND_SPEED
}

impl Default for TurbineConfig {
    fn default() -> Self {
        Self {
            model: default_turbine_model(),
            cut_in_wind_speed: default_cut_in(),
            cut_out_wind_speed: default_cut_out(),
            rated_rotor_speed: default_rated_rotor_speed(),
            rated_power_kw: default_rated_power(),
            near_zero_wind_speed: default_near_zero_wind(),
        }
    }
}

// ============================================================================
// Cleaning
// ============================================================================

/// Per-field admissible intervals.
///
/// ```toml
/// [cleaning.bounds.rotor_speed]
/// kind = "absolute"
/// min = 0.0
/// max = 17.0
///
/// [cleaning.bounds.torque]
/// kind = "quantile"
/// lower = 0.001
/// upper = 0.999
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// Start from the built-in datasheet bounds; entries in `bounds` override
    /// them per field. When false, only `bounds` applies.
    #[serde(default = "default_true")]
    pub extend_defaults: bool,

    #[serde(default)]
    pub bounds: BTreeMap<String, BoundSpec>,
}

fn default_true() -> bool {
    true
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            extend_defaults: true,
            bounds: BTreeMap::new(),
        }
    }
}

impl CleaningConfig {
    /// Bound specs that apply to a run of `turbine`.
    pub fn effective_bounds(&self, turbine: &TurbineConfig) -> BTreeMap<String, BoundSpec> {
        let mut specs = if self.extend_defaults {
            default_bound_specs(turbine)
        } else {
            BTreeMap::new()
        };
        specs.extend(self.bounds.iter().map(|(k, v)| (k.clone(), *v)));
        specs
    }
}

// ============================================================================
// Features
// ============================================================================

/// Feature deriver tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Trailing window of the rolling temperature mean (hourly slots).
    #[serde(default = "default_rolling_window")]
    pub rolling_window_hours: usize,

    /// Largest gap to the previous row for the torque-speed gradient (hours).
    #[serde(default = "default_gradient_gap")]
    pub gradient_max_gap_hours: i64,

    /// Unit of `weather_temp` in the density proxy.
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,

    /// Shift applied to UTC timestamps before assigning time-of-day blocks.
    #[serde(default)]
    pub local_utc_offset_hours: i32,
}

fn default_rolling_window() -> usize {
    feature_constants::ROLLING_WINDOW_HOURS
}
fn default_gradient_gap() -> i64 {
    feature_constants::GRADIENT_MAX_GAP_HOURS
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            rolling_window_hours: default_rolling_window(),
            gradient_max_gap_hours: default_gradient_gap(),
            temperature_unit: TemperatureUnit::default(),
            local_utc_offset_hours: 0,
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Train/test split, minimum data and per-family time budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Minimum complete rows for an experiment to be evaluated.
    #[serde(default = "default_min_rows")]
    pub min_rows: usize,

    /// Wall-clock budget per model family fit (seconds); unset = unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_budget_secs: Option<f64>,

    /// Fit the families of one experiment in parallel.
    #[serde(default = "default_true")]
    pub parallel: bool,
}

fn default_test_fraction() -> f64 {
    evaluation_defaults::TEST_FRACTION
}
fn default_seed() -> u64 {
    evaluation_defaults::SPLIT_SEED
}
fn default_min_rows() -> usize {
    evaluation_defaults::MIN_ROWS
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            test_fraction: default_test_fraction(),
            seed: default_seed(),
            min_rows: default_min_rows(),
            fit_budget_secs: None,
            parallel: true,
        }
    }
}

impl EvaluationConfig {
    pub fn split(&self) -> SplitConfig {
        SplitConfig {
            test_fraction: self.test_fraction,
            seed: self.seed,
            min_rows: self.min_rows,
        }
    }

    pub fn fit_budget(&self) -> Option<Duration> {
        self.fit_budget_secs
            .filter(|s| *s > 0.0 && s.is_finite())
            .map(Duration::from_secs_f64)
    }
}

// ============================================================================
// Models
// ============================================================================

/// Hyperparameters per model family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub linear: LinearParams,

    #[serde(default)]
    pub gradient_boosting: GradientBoostingParams,
}

impl ModelsConfig {
    /// Build the configured family for a kind.
    pub fn family(&self, kind: FamilyKind) -> ModelFamily {
        match kind {
            FamilyKind::Linear => ModelFamily::Linear(self.linear),
            FamilyKind::GradientBoosting => ModelFamily::GradientBoosting(self.gradient_boosting),
        }
    }
}

// ============================================================================
// Experiments
// ============================================================================

/// One target/covariate combination, evaluated with each listed family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub name: String,
    pub target: ColumnId,
    pub covariates: Vec<ColumnId>,
    #[serde(default = "default_families")]
    pub families: Vec<FamilyKind>,
}

fn default_families() -> Vec<FamilyKind> {
    vec![FamilyKind::Linear, FamilyKind::GradientBoosting]
}

/// Default experiments: a wind/reactive baseline and a physics feature set.
pub fn default_experiments() -> Vec<ExperimentConfig> {
    vec![
        ExperimentConfig {
            name: "power_from_wind_and_reactive".to_string(),
            target: ColumnId::Base(Field::ActivePower),
            covariates: vec![
                ColumnId::Base(Field::WindSpeed),
                ColumnId::Base(Field::ReactivePower),
            ],
            families: default_families(),
        },
        ExperimentConfig {
            name: "power_from_physics".to_string(),
            target: ColumnId::Base(Field::ActivePower),
            // Night is the reference level of the time-of-day blocks
            covariates: vec![
                ColumnId::Derived(Feature::WindSpeedCubed),
                ColumnId::Derived(Feature::YawCorrectedWindSpeed),
                ColumnId::Derived(Feature::DensityProxy),
                ColumnId::Derived(Feature::NormalizedRotorSpeed),
                ColumnId::Derived(Feature::Morning),
                ColumnId::Derived(Feature::Afternoon),
                ColumnId::Derived(Feature::Evening),
            ],
            families: default_families(),
        },
    ]
}
