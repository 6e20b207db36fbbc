//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physical range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use super::defaults::{MAX_SUGGESTION_DISTANCE, ROLLING_WINDOW_WARN_HOURS, SIGMA_MULTIPLIER_WARN_MIN};
use crate::deviation::ThresholdPolicy;
use crate::types::Field;
use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Prefix of the per-field bound tables, whose keys are schema field names.
const BOUNDS_PREFIX: &str = "cleaning.bounds";

/// Keys allowed inside one `[cleaning.bounds.<field>]` table.
const BOUND_SPEC_KEYS: &[&str] = &["kind", "min", "max", "lower", "upper"];

/// Returns the complete set of valid dotted key paths for TwinConfig.
///
/// This is maintained manually to match the struct hierarchy in twin_config.rs.
/// Array-of-table entries (`[[experiments]]`) share their array's prefix.
/// Keys below `cleaning.bounds` are checked against the field schema instead.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [turbine]
        "turbine",
        "turbine.model",
        "turbine.cut_in_wind_speed",
        "turbine.cut_out_wind_speed",
        "turbine.rated_rotor_speed",
        "turbine.rated_power_kw",
        "turbine.near_zero_wind_speed",
        // [cleaning]
        "cleaning",
        "cleaning.extend_defaults",
        "cleaning.bounds",
        // [features]
        "features",
        "features.rolling_window_hours",
        "features.gradient_max_gap_hours",
        "features.temperature_unit",
        "features.local_utc_offset_hours",
        // [evaluation]
        "evaluation",
        "evaluation.test_fraction",
        "evaluation.seed",
        "evaluation.min_rows",
        "evaluation.fit_budget_secs",
        "evaluation.parallel",
        // [models]
        "models",
        "models.linear",
        "models.linear.ridge",
        "models.gradient_boosting",
        "models.gradient_boosting.n_estimators",
        "models.gradient_boosting.learning_rate",
        "models.gradient_boosting.max_depth",
        "models.gradient_boosting.min_child_weight",
        "models.gradient_boosting.lambda",
        "models.gradient_boosting.subsample",
        "models.gradient_boosting.trees_per_stage",
        // [threshold]
        "threshold",
        "threshold.policy",
        "threshold.cutoff",
        "threshold.multiplier",
        // [[experiments]]
        "experiments",
        "experiments.name",
        "experiments.target",
        "experiments.covariates",
        "experiments.families",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`. Tables inside arrays are walked under the array's
/// own path, so `[[e]] x = 1` yields `["e", "e.x"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            match v {
                toml::Value::Table(_) => keys.extend(walk_toml_keys(v, &path)),
                toml::Value::Array(items) => {
                    for item in items.iter().filter(|i| i.is_table()) {
                        keys.extend(walk_toml_keys(item, &path));
                    }
                }
                _ => {}
            }
        }
    }
    keys.sort();
    keys.dedup();
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1)
                .min(curr[j] + 1)
                .min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest candidate for an unknown key, if within edit distance 3.
pub fn suggest_correction<'a>(
    unknown: &str,
    known: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for k in known {
        let dist = levenshtein(unknown, k);
        if dist > MAX_SUGGESTION_DISTANCE {
            continue;
        }
        // Ties go to the lexicographically smaller key so output is stable
        let better = match best {
            None => true,
            Some((best_key, best_dist)) => dist < best_dist || (dist == best_dist && k < best_key),
        };
        if better {
            best = Some((k, dist));
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Check one key below `cleaning.bounds`; `rest` is the part after the prefix.
fn check_bounds_key(key: &str, rest: &str) -> Option<ValidationWarning> {
    let mut parts = rest.splitn(2, '.');
    let field = parts.next().unwrap_or_default();
    let spec_key = parts.next();

    if field.parse::<Field>().is_err() {
        let suggestion = suggest_correction(field, Field::ALL.iter().map(|f| f.name()))
            .map(|s| format!("{BOUNDS_PREFIX}.{s}"));
        return Some(ValidationWarning {
            field: key.to_string(),
            message: format!("Unknown field '{field}' in cleaning bounds"),
            suggestion,
        });
    }

    match spec_key {
        Some(k) if !BOUND_SPEC_KEYS.contains(&k) => Some(ValidationWarning {
            field: key.to_string(),
            message: format!("Unknown config key '{key}'"),
            suggestion: suggest_correction(k, BOUND_SPEC_KEYS.iter().copied())
                .map(|s| format!("{BOUNDS_PREFIX}.{field}.{s}")),
        }),
        _ => None,
    }
}

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys; it only warns. Existing configs
/// always continue to work.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let found = walk_toml_keys(&value, "");
    let mut warnings = Vec::new();

    for key in &found {
        if known.contains(key.as_str()) {
            continue;
        }
        if let Some(rest) = key.strip_prefix(BOUNDS_PREFIX).and_then(|r| r.strip_prefix('.')) {
            warnings.extend(check_bounds_key(key, rest));
            continue;
        }
        let suggestion = suggest_correction(key, known.iter().copied());
        warnings.push(ValidationWarning {
            field: key.clone(),
            message: format!("Unknown config key '{key}'"),
            suggestion,
        });
    }

    warnings
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical ranges on a parsed TwinConfig.
///
/// Returns (errors, warnings): errors are impossible values that must
/// prevent a run; warnings are suspicious but not fatal.
pub fn validate_physical_ranges(
    config: &super::TwinConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let t = &config.turbine;

    // Cut-out: no utility-scale turbine operates above 40 m/s
    if t.cut_out_wind_speed > 40.0 {
        errors.push(format!(
            "turbine.cut_out_wind_speed = {:.1} is outside physical range (<= 40 m/s)",
            t.cut_out_wind_speed
        ));
    }

    // Rated rotor speed: large rotors turn at a few tens of rpm at most
    if t.rated_rotor_speed > 100.0 {
        errors.push(format!(
            "turbine.rated_rotor_speed = {:.1} is outside physical range (<= 100 rpm)",
            t.rated_rotor_speed
        ));
    }

    // Near-zero wind above cut-in would flag normal idling as runaway
    if t.near_zero_wind_speed >= t.cut_in_wind_speed {
        warnings.push(ValidationWarning {
            field: "turbine.near_zero_wind_speed".to_string(),
            message: format!(
                "near_zero_wind_speed = {:.2} is not below cut_in_wind_speed ({:.2})",
                t.near_zero_wind_speed, t.cut_in_wind_speed
            ),
            suggestion: None,
        });
    }

    if config.features.rolling_window_hours > ROLLING_WINDOW_WARN_HOURS {
        warnings.push(ValidationWarning {
            field: "features.rolling_window_hours".to_string(),
            message: format!(
                "rolling_window_hours = {} is longer than a week",
                config.features.rolling_window_hours
            ),
            suggestion: None,
        });
    }

    if config.evaluation.test_fraction > 0.5 && config.evaluation.test_fraction < 1.0 {
        warnings.push(ValidationWarning {
            field: "evaluation.test_fraction".to_string(),
            message: format!(
                "test_fraction = {:.2} holds out more rows than it trains on",
                config.evaluation.test_fraction
            ),
            suggestion: None,
        });
    }

    match config.threshold {
        ThresholdPolicy::Sigma { multiplier } if multiplier > 0.0 && multiplier < SIGMA_MULTIPLIER_WARN_MIN => {
            warnings.push(ValidationWarning {
                field: "threshold.multiplier".to_string(),
                message: format!(
                    "multiplier = {multiplier:.2} will flag most healthy observations"
                ),
                suggestion: None,
            });
        }
        ThresholdPolicy::Absolute { cutoff } if cutoff > t.rated_power_kw => {
            warnings.push(ValidationWarning {
                field: "threshold.cutoff".to_string(),
                message: format!(
                    "cutoff = {cutoff:.1} exceeds rated power ({:.1} kW) and may never trigger",
                    t.rated_power_kw
                ),
                suggestion: None,
            });
        }
        _ => {}
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TwinConfig;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("cut_in_wind_sped", "cut_in_wind_speed"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [models]
            [models.gradient_boosting]
            max_depth = 4
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"models".to_string()));
        assert!(keys.contains(&"models.gradient_boosting".to_string()));
        assert!(keys.contains(&"models.gradient_boosting.max_depth".to_string()));
    }

    #[test]
    fn test_walk_toml_keys_array_of_tables() {
        let toml: toml::Value = r#"
            [[experiments]]
            name = "a"
            [[experiments]]
            name = "b"
            target = "active_power"
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert_eq!(
            keys,
            vec!["experiments", "experiments.name", "experiments.target"]
        );
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let toml_str = r#"
[turbine]
cut_in_wind_sped = 3.5
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].field.contains("cut_in_wind_sped"));
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("turbine.cut_in_wind_speed")
        );
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let toml_str = r#"
[turbine]
model = "MM92"

[cleaning.bounds.rotor_speed]
kind = "absolute"
max = 16.0

[threshold]
policy = "absolute"
cutoff = 200.0

[[experiments]]
name = "basic"
target = "active_power"
covariates = ["wind_speed"]
families = ["linear"]
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(
            warnings.is_empty(),
            "Expected 0 warnings, got: {:?}",
            warnings
        );
    }

    #[test]
    fn test_unknown_bound_field_suggests_schema_name() {
        let toml_str = r#"
[cleaning.bounds.rotor_sped]
kind = "absolute"
max = 16.0
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(!warnings.is_empty());
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("cleaning.bounds.rotor_speed")
        );
    }

    #[test]
    fn test_unknown_bound_spec_key() {
        let toml_str = r#"
[cleaning.bounds.torque]
kind = "quantile"
lowr = 0.01
upper = 0.99
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("cleaning.bounds.torque.lower")
        );
    }

    #[test]
    fn test_unknown_section_produces_warning() {
        let toml_str = r#"
[models.random_forest]
trees = 42
"#;
        let warnings = validate_unknown_keys(toml_str);
        assert!(warnings.iter().any(|w| w.field.contains("random_forest")));
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        let suggestion = suggest_correction("completely_unrelated_garbage_key_xyz", known.iter().copied());
        assert!(suggestion.is_none());
    }

    #[test]
    fn test_physical_range_defaults_clean() {
        let (errors, warnings) = validate_physical_ranges(&TwinConfig::default());
        assert!(errors.is_empty(), "Defaults should produce no errors: {:?}", errors);
        assert!(warnings.is_empty(), "Defaults should produce no warnings: {:?}", warnings);
    }

    #[test]
    fn test_physical_range_cut_out_too_high() {
        let mut config = TwinConfig::default();
        config.turbine.cut_out_wind_speed = 60.0;
        let (errors, _) = validate_physical_ranges(&config);
        assert!(errors.iter().any(|e| e.contains("cut_out_wind_speed")));
    }

    #[test]
    fn test_absolute_cutoff_above_rated_power_warns() {
        let mut config = TwinConfig::default();
        config.threshold = ThresholdPolicy::Absolute { cutoff: 5000.0 };
        let (_, warnings) = validate_physical_ranges(&config);
        assert!(warnings.iter().any(|w| w.field == "threshold.cutoff"));
    }
}
