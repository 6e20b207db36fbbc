//! System-wide default constants.
//!
//! Centralises file names and limits that are not part of the TOML schema.

// ============================================================================
// Config Discovery
// ============================================================================

/// Environment variable holding the path of the config file.
pub const CONFIG_ENV_VAR: &str = "TWIN_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "twin_config.toml";

// ============================================================================
// Validation
// ============================================================================

/// Maximum edit distance for a "did you mean" suggestion on an unknown key.
pub const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Rolling windows longer than this (hours) are flagged as suspicious.
pub const ROLLING_WINDOW_WARN_HOURS: usize = 7 * 24;

/// Sigma multipliers below this flag most healthy observations as anomalous.
pub const SIGMA_MULTIPLIER_WARN_MIN: f64 = 1.0;

// ============================================================================
// Synthetic Data
// ============================================================================

/// Default length of a synthetic dataset (hours). 2 160 = 90 days.
pub const SYNTHETIC_HOURS: usize = 2_160;

/// Default seed of the synthetic generator.
pub const SYNTHETIC_SEED: u64 = 2016;
