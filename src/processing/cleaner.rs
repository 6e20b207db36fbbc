//! Parametric truncation of out-of-range sensor values
//!
//! Values outside a field's admissible closed interval are replaced with
//! "missing" for that field only. Rows are never dropped here, and values are
//! never clamped.
//!
//! Bounds come in two flavours:
//! - `Absolute`: physical limits taken from the turbine datasheet
//! - `Quantile`: distributional tail cuts for fields without a hard limit
//!
//! Quantile specs are resolved to absolute intervals once, against the loaded
//! data, before cleaning. `clean` only ever applies absolute bounds, which is
//! what makes re-cleaning a cleaned table a no-op.

use crate::config::TurbineConfig;
use crate::types::{
    Component, Field, Observation, ObservationTable, PipelineError, PipelineResult,
};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

// ============================================================================
// Bound Specifications (configuration side)
// ============================================================================

/// How the admissible interval of a field is specified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoundSpec {
    /// Fixed closed interval; an absent end is unbounded.
    Absolute {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// Tail cut at the given quantiles of the field's observed distribution.
    Quantile { lower: f64, upper: f64 },
}

impl BoundSpec {
    pub const fn range(min: f64, max: f64) -> Self {
        BoundSpec::Absolute {
            min: Some(min),
            max: Some(max),
        }
    }

    pub const fn at_least(min: f64) -> Self {
        BoundSpec::Absolute {
            min: Some(min),
            max: None,
        }
    }

    pub fn check(&self, field: &str) -> Result<(), String> {
        match *self {
            BoundSpec::Absolute { min, max } => {
                for v in [min, max].into_iter().flatten() {
                    if !v.is_finite() {
                        return Err(format!("bound for '{field}' must be finite, got {v}"));
                    }
                }
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        return Err(format!("bound for '{field}': min ({lo}) > max ({hi})"));
                    }
                }
                Ok(())
            }
            BoundSpec::Quantile { lower, upper } => {
                if !(0.0..=1.0).contains(&lower) || !(0.0..=1.0).contains(&upper) {
                    return Err(format!(
                        "quantile bound for '{field}' must lie in [0, 1], got [{lower}, {upper}]"
                    ));
                }
                if lower >= upper {
                    return Err(format!(
                        "quantile bound for '{field}': lower ({lower}) must be < upper ({upper})"
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Default bound specs, keyed by field name.
///
/// Physical fields use datasheet limits (cut-out 25 m/s with headroom for
/// storm gusts). Rotor speed and active power are capped at the configured
/// turbine's rated values. Torque and reactive power have no hard limit and
/// use 0.1% tail cuts.
pub fn default_bound_specs(turbine: &TurbineConfig) -> BTreeMap<String, BoundSpec> {
    let specs = [
        (Field::WindSpeed, BoundSpec::range(0.0, 40.0)),
        (Field::WindSpeed2, BoundSpec::range(0.0, 40.0)),
        (Field::WindDirection, BoundSpec::range(0.0, 360.0)),
        (Field::PitchAngle, BoundSpec::range(-5.0, 95.0)),
        (Field::VanePosition, BoundSpec::range(-180.0, 180.0)),
        (Field::NacelleAngle, BoundSpec::range(0.0, 360.0)),
        (Field::OutdoorTemp, BoundSpec::range(-40.0, 50.0)),
        (Field::NacelleTemp, BoundSpec::range(-40.0, 80.0)),
        (Field::RotorBearingTemp, BoundSpec::range(-40.0, 120.0)),
        (
            Field::Torque,
            BoundSpec::Quantile {
                lower: 0.001,
                upper: 0.999,
            },
        ),
        (
            Field::RotorSpeed,
            BoundSpec::range(0.0, turbine.rated_rotor_speed),
        ),
        (
            Field::ActivePower,
            BoundSpec::range(-50.0, turbine.rated_power_kw),
        ),
        (
            Field::ReactivePower,
            BoundSpec::Quantile {
                lower: 0.001,
                upper: 0.999,
            },
        ),
        (Field::WeatherTemp, BoundSpec::range(-50.0, 50.0)),
        (Field::WeatherPressure, BoundSpec::range(870.0, 1085.0)),
        (Field::WeatherHumidity, BoundSpec::range(0.0, 100.0)),
        (Field::WeatherWindSpeed, BoundSpec::range(0.0, 60.0)),
        (Field::WeatherWindDirection, BoundSpec::range(0.0, 360.0)),
        (Field::Rain1h, BoundSpec::range(0.0, 100.0)),
        (Field::Snow1h, BoundSpec::range(0.0, 100.0)),
    ];
    specs
        .into_iter()
        .map(|(f, s)| (f.name().to_string(), s))
        .collect()
}

// ============================================================================
// Resolved Bounds (what the cleaner applies)
// ============================================================================

/// Closed admissible interval; `None` on either end means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Interval {
    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |lo| value >= lo) && self.max.map_or(true, |hi| value <= hi)
    }
}

/// Absolute bounds per field, ready for [`clean`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    intervals: BTreeMap<Field, Interval>,
}

impl Bounds {
    /// Build absolute bounds from field names.
    ///
    /// Fails with a configuration error for a field name outside the schema
    /// or an inverted / non-finite interval.
    pub fn absolute<'a>(
        entries: impl IntoIterator<Item = (&'a str, Option<f64>, Option<f64>)>,
    ) -> PipelineResult<Self> {
        let mut intervals = BTreeMap::new();
        for (name, min, max) in entries {
            let field = parse_field(name)?;
            BoundSpec::Absolute { min, max }
                .check(name)
                .map_err(|m| PipelineError::config(Component::Cleaner, m))?;
            intervals.insert(field, Interval { min, max });
        }
        Ok(Self { intervals })
    }

    pub fn get(&self, field: Field) -> Option<&Interval> {
        self.intervals.get(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Field, &Interval)> {
        self.intervals.iter()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

fn parse_field(name: &str) -> PipelineResult<Field> {
    name.parse::<Field>().map_err(|_| {
        PipelineError::config(
            Component::Cleaner,
            format!("bound requested for field '{name}' which is not in the schema"),
        )
    })
}

/// Resolve bound specs against a loaded table.
///
/// Quantile specs are evaluated over the present values of their field.
/// A field with no present values is left unbounded.
pub fn resolve_bounds(
    table: &ObservationTable,
    specs: &BTreeMap<String, BoundSpec>,
) -> PipelineResult<Bounds> {
    let mut intervals = BTreeMap::new();

    for (name, spec) in specs {
        let field = parse_field(name)?;
        spec.check(name)
            .map_err(|m| PipelineError::config(Component::Cleaner, m))?;

        let interval = match *spec {
            BoundSpec::Absolute { min, max } => Interval { min, max },
            BoundSpec::Quantile { lower, upper } => {
                let values = table.present_values(field);
                if values.is_empty() {
                    warn!(field = %field, "No values to resolve quantile bound, leaving field unbounded");
                    continue;
                }
                let mut data = Data::new(values);
                let interval = Interval {
                    min: Some(data.quantile(lower)),
                    max: Some(data.quantile(upper)),
                };
                debug!(
                    field = %field,
                    lower_q = lower,
                    upper_q = upper,
                    min = ?interval.min,
                    max = ?interval.max,
                    "Resolved quantile bound"
                );
                interval
            }
        };
        intervals.insert(field, interval);
    }

    Ok(Bounds { intervals })
}

// ============================================================================
// Cleaning
// ============================================================================

/// An observation table whose bounded fields are all within their intervals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanedTable(ObservationTable);

impl CleanedTable {
    pub fn as_table(&self) -> &ObservationTable {
        &self.0
    }

    pub fn into_inner(self) -> ObservationTable {
        self.0
    }

    /// Wrap a table that is already known to be clean (e.g. persisted output
    /// of an earlier run).
    pub fn assume_clean(table: ObservationTable) -> Self {
        Self(table)
    }
}

/// Per-field count of values truncated to missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows: usize,
    pub truncated: BTreeMap<Field, usize>,
}

impl CleaningReport {
    pub fn total_truncated(&self) -> usize {
        self.truncated.values().sum()
    }
}

/// Replace every out-of-bounds value with missing.
pub fn clean(table: &ObservationTable, bounds: &Bounds) -> (CleanedTable, CleaningReport) {
    let mut report = CleaningReport {
        rows: table.len(),
        truncated: BTreeMap::new(),
    };

    let cleaned = table.map_rows(|row| {
        let mut out: Observation = row.clone();
        for (&field, interval) in bounds.iter() {
            if let Some(v) = row.get(field) {
                if !interval.contains(v) {
                    out.set(field, None);
                    *report.truncated.entry(field).or_insert(0) += 1;
                }
            }
        }
        out
    });

    info!(
        rows = report.rows,
        truncated = report.total_truncated(),
        fields = bounds.len(),
        "Cleaning complete"
    );

    (CleanedTable(cleaned), report)
}
