//! Physics Engine Module
//!
//! Deterministic feature derivation for the turbine twin.
//! All math here is pure physics - no ML involved.
//!
//! ## Per-row features
//! - Wind speed powers, yaw-corrected wind speed, operational range flag
//! - Density proxy, normalized rotor speed, tip-speed ratio, runaway flag
//! - Cooling-efficiency proxy, apparent power, power factor, time blocks
//!
//! ## Windowed features (per turbine, chronological)
//! - Rolling outdoor temperature over a trailing hourly window
//! - Torque-speed gradient between consecutive rows
//!
//! Derivation never mixes rows across turbines and never drops rows: a missing
//! input propagates to a missing feature.

pub mod turbine_models;
mod windows;

pub use turbine_models::TemperatureUnit;

use crate::config::{FeatureConfig, TurbineConfig};
use crate::processing::CleanedTable;
use crate::types::{
    feature_constants, turbine_limits, DerivedFeatures, DerivedObservation, DerivedTable,
    Feature, Field, Observation,
};
use chrono::{Duration, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Parameters of the feature derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivationSettings {
    pub cut_in_wind_speed: f64,
    pub cut_out_wind_speed: f64,
    pub rated_rotor_speed: f64,
    pub near_zero_wind_speed: f64,
    pub rolling_window_hours: usize,
    pub gradient_max_gap_hours: i64,
    pub temperature_unit: TemperatureUnit,
    pub local_utc_offset_hours: i32,
}

impl Default for DerivationSettings {
    fn default() -> Self {
        Self {
            cut_in_wind_speed: turbine_limits::CUT_IN_WIND_SPEED,
            cut_out_wind_speed: turbine_limits::CUT_OUT_WIND_SPEED,
            rated_rotor_speed: turbine_limits::RATED_ROTOR_SPEED,
            near_zero_wind_speed: turbine_limits::NEAR_ZERO_WIND_SPEED,
            rolling_window_hours: feature_constants::ROLLING_WINDOW_HOURS,
            gradient_max_gap_hours: feature_constants::GRADIENT_MAX_GAP_HOURS,
            temperature_unit: TemperatureUnit::Celsius,
            local_utc_offset_hours: 0,
        }
    }
}

impl DerivationSettings {
    pub fn from_config(turbine: &TurbineConfig, features: &FeatureConfig) -> Self {
        Self {
            cut_in_wind_speed: turbine.cut_in_wind_speed,
            cut_out_wind_speed: turbine.cut_out_wind_speed,
            rated_rotor_speed: turbine.rated_rotor_speed,
            near_zero_wind_speed: turbine.near_zero_wind_speed,
            rolling_window_hours: features.rolling_window_hours,
            gradient_max_gap_hours: features.gradient_max_gap_hours,
            temperature_unit: features.temperature_unit,
            local_utc_offset_hours: features.local_utc_offset_hours,
        }
    }

    /// Largest gap bridged by the torque-speed gradient.
    ///
    /// A gap too large to represent bridges every pair of rows.
    pub fn gradient_max_gap(&self) -> Duration {
        Duration::try_hours(self.gradient_max_gap_hours).unwrap_or(Duration::MAX)
    }
}

/// Count of defined values per feature after derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationReport {
    pub rows: usize,
    pub turbines: usize,
    pub defined: BTreeMap<Feature, usize>,
}

/// Derive physics features for every row of a cleaned table.
///
/// Computation runs per turbine over chronologically ordered rows.
pub fn derive(
    cleaned: &CleanedTable,
    settings: &DerivationSettings,
) -> (DerivedTable, DerivationReport) {
    let table = cleaned.as_table();
    let mut rows = Vec::with_capacity(table.len());
    let mut turbines = 0;

    for series in table.per_turbine() {
        turbines += 1;
        let rolling = windows::rolling_mean(
            series,
            Field::OutdoorTemp,
            settings.rolling_window_hours,
        );
        let gradients = windows::consecutive_gradient(
            series,
            settings.gradient_max_gap(),
        );

        for (i, obs) in series.iter().enumerate() {
            let mut features = row_features(obs, settings);
            features.rolling_temp = rolling[i];
            features.torque_speed_gradient = gradients[i];
            rows.push(DerivedObservation {
                base: obs.clone(),
                features,
            });
        }

        if let Some(first) = series.first() {
            debug!(turbine = %first.turbine_id, rows = series.len(), "Derived turbine series");
        }
    }

    let derived = DerivedTable::new(rows);
    let report = summarize(&derived, turbines);
    info!(
        rows = report.rows,
        turbines = report.turbines,
        "Feature derivation complete"
    );
    (derived, report)
}

/// Features that depend only on the row itself.
fn row_features(obs: &Observation, s: &DerivationSettings) -> DerivedFeatures {
    use turbine_models as m;

    let ws = obs.get(Field::WindSpeed);
    let rs = obs.get(Field::RotorSpeed);
    let apparent = m::apparent_power(obs.get(Field::ActivePower), obs.get(Field::ReactivePower));
    let local = obs.timestamp + Duration::hours(i64::from(s.local_utc_offset_hours));

    DerivedFeatures {
        wind_speed_sq: m::wind_speed_squared(ws),
        wind_speed_cu: m::wind_speed_cubed(ws),
        yaw_corrected_wind_speed: m::yaw_corrected_wind_speed(ws, obs.get(Field::VanePosition)),
        rolling_temp: None,
        density_proxy: m::density_proxy(
            obs.get(Field::WeatherPressure),
            obs.get(Field::WeatherTemp),
            s.temperature_unit,
        ),
        normalized_rotor_speed: m::normalized_rotor_speed(rs, s.rated_rotor_speed),
        runaway_rotor: m::runaway_rotor(rs, ws, s.near_zero_wind_speed),
        tip_speed_ratio: m::tip_speed_ratio(rs, ws),
        torque_speed_gradient: None,
        operational_range: m::operational_range(ws, s.cut_in_wind_speed, s.cut_out_wind_speed),
        cooling_efficiency: m::cooling_efficiency(
            obs.get(Field::OutdoorTemp),
            obs.get(Field::NacelleTemp),
        ),
        apparent_power: apparent,
        power_factor: m::power_factor(obs.get(Field::ActivePower), apparent),
        time_blocks: m::time_of_day_blocks(local.hour()),
    }
}

fn summarize(table: &DerivedTable, turbines: usize) -> DerivationReport {
    let defined = Feature::ALL
        .into_iter()
        .map(|f| {
            let n = table
                .rows()
                .iter()
                .filter(|r| r.features.value(f).is_some())
                .count();
            (f, n)
        })
        .collect();
    DerivationReport {
        rows: table.len(),
        turbines,
        defined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::CleanedTable;
    use crate::types::{ObservationTable, TurbineId};
    use chrono::{DateTime, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 1, 1, 0, 0, 0).unwrap()
    }

    fn full_row(turbine: &str, hour: i64, ws: f64, temp: f64) -> Observation {
        Observation::empty(TurbineId::new(turbine), start() + Duration::hours(hour))
            .with(Field::WindSpeed, Some(ws))
            .with(Field::VanePosition, Some(5.0))
            .with(Field::RotorSpeed, Some(ws * 1.2))
            .with(Field::Torque, Some(ws * 40.0))
            .with(Field::OutdoorTemp, Some(temp))
            .with(Field::NacelleTemp, Some(temp + 15.0))
            .with(Field::ActivePower, Some(ws * 100.0))
            .with(Field::ReactivePower, Some(ws * 10.0))
            .with(Field::WeatherPressure, Some(1010.0))
            .with(Field::WeatherTemp, Some(temp))
    }

    fn cleaned(rows: Vec<Observation>) -> CleanedTable {
        CleanedTable::assume_clean(ObservationTable::from_rows(rows).0)
    }

    #[test]
    fn test_rolling_window_edge_case() {
        let temps = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let rows = temps
            .iter()
            .enumerate()
            .map(|(i, &t)| full_row("T01", i as i64, 8.0, t))
            .collect();
        let (derived, _) = derive(&cleaned(rows), &DerivationSettings::default());
        let rolling: Vec<Option<f64>> =
            derived.rows().iter().map(|r| r.features.rolling_temp).collect();

        for value in &rolling[..5] {
            assert_eq!(*value, None);
        }
        assert_eq!(rolling[5], Some(3.5));
        assert_eq!(rolling[6], Some(4.5));
        assert_eq!(rolling[7], Some(5.5));
    }

    #[test]
    fn test_derivation_does_not_mix_turbines() {
        // T01 has 3 rows, T02 has 6: only T02 reaches a full window
        let mut rows: Vec<Observation> = (0..3).map(|h| full_row("T01", h, 8.0, 100.0)).collect();
        rows.extend((3..9).map(|h| full_row("T02", h, 8.0, 2.0)));
        let (derived, report) = derive(&cleaned(rows), &DerivationSettings::default());

        assert_eq!(report.turbines, 2);
        let t02 = derived.series(&TurbineId::new("T02"));
        assert_eq!(t02[5].features.rolling_temp, Some(2.0));
        assert!(t02[..5].iter().all(|r| r.features.rolling_temp.is_none()));
        // First row of each turbine has no predecessor
        assert_eq!(t02[0].features.torque_speed_gradient, None);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let rows: Vec<Observation> = (0..48)
            .map(|h| full_row("T01", h, 3.0 + (h % 13) as f64, -5.0 + h as f64 * 0.3))
            .collect();
        let input = cleaned(rows);
        let (a, _) = derive(&input, &DerivationSettings::default());
        let (b, _) = derive(&input, &DerivationSettings::default());
        assert_eq!(a, b);
        for (x, y) in a.rows().iter().zip(b.rows()) {
            for f in Feature::ALL {
                assert_eq!(
                    x.features.value(f).map(f64::to_bits),
                    y.features.value(f).map(f64::to_bits)
                );
            }
        }
    }

    #[test]
    fn test_missing_inputs_propagate_for_every_feature() {
        let base = full_row("T01", 0, 9.0, 10.0);
        for field in Field::ALL {
            let obs = base.clone().with(field, None);
            let rows: Vec<Observation> = (0..6)
                .map(|h| {
                    let mut o = obs.clone();
                    o.timestamp = start() + Duration::hours(h);
                    o
                })
                .collect();
            let (derived, _) = derive(&cleaned(rows), &DerivationSettings::default());
            for row in derived.rows() {
                for feature in Feature::ALL {
                    if feature.dependencies().contains(&field) {
                        assert_eq!(
                            row.features.value(feature),
                            None,
                            "{feature} should be missing when {field} is missing"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_zero_denominators_never_produce_non_finite() {
        let rows = vec![
            full_row("T01", 0, 0.0, 0.0)
                .with(Field::ActivePower, Some(0.0))
                .with(Field::ReactivePower, Some(0.0))
                .with(Field::NacelleTemp, Some(0.0)),
        ];
        let (derived, _) = derive(&cleaned(rows), &DerivationSettings::default());
        let f = &derived.rows()[0].features;
        assert_eq!(f.tip_speed_ratio, None);
        assert_eq!(f.power_factor, None);
        assert_eq!(f.cooling_efficiency, None);
        for feature in Feature::ALL {
            if let Some(v) = f.value(feature) {
                assert!(v.is_finite(), "{feature} = {v}");
            }
        }
    }

    #[test]
    fn test_local_offset_shifts_time_blocks() {
        let rows = vec![full_row("T01", 5, 8.0, 5.0)];
        let settings = DerivationSettings {
            local_utc_offset_hours: 2,
            ..Default::default()
        };
        let (derived, _) = derive(&cleaned(rows.clone()), &DerivationSettings::default());
        assert_eq!(derived.rows()[0].features.time_blocks, [true, false, false, false]);
        let (shifted, _) = derive(&cleaned(rows), &settings);
        assert_eq!(shifted.rows()[0].features.time_blocks, [false, true, false, false]);
    }

    #[test]
    fn test_huge_gradient_gap_does_not_overflow() {
        let rows = vec![full_row("T01", 0, 8.0, 5.0), full_row("T01", 48, 9.0, 5.0)];
        let settings = DerivationSettings {
            gradient_max_gap_hours: i64::MAX,
            ..Default::default()
        };
        assert_eq!(settings.gradient_max_gap(), Duration::MAX);
        let (derived, _) = derive(&cleaned(rows), &settings);
        assert!(derived.rows()[1].features.torque_speed_gradient.is_some());
    }

    #[test]
    fn test_report_counts_defined_values() {
        let rows = vec![
            full_row("T01", 0, 8.0, 5.0),
            full_row("T01", 1, 8.0, 5.0).with(Field::WindSpeed, None),
        ];
        let (_, report) = derive(&cleaned(rows), &DerivationSettings::default());
        assert_eq!(report.rows, 2);
        assert_eq!(report.defined[&Feature::WindSpeedCubed], 1);
        assert_eq!(report.defined[&Feature::Night], 2);
        assert_eq!(report.defined[&Feature::RollingTemp], 0);
    }
}
