//! Derived feature schema and the column addressing used by the ML engine

use super::observation::{Field, Observation, TurbineId, UnknownField};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A physics-derived feature computed from cleaned base fields.
///
/// Serializes as its column name (`wind_speed_sq`, `block_night`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    WindSpeedSquared,
    WindSpeedCubed,
    YawCorrectedWindSpeed,
    RollingTemp,
    DensityProxy,
    NormalizedRotorSpeed,
    RunawayRotor,
    TipSpeedRatio,
    TorqueSpeedGradient,
    OperationalRange,
    CoolingEfficiency,
    ApparentPower,
    PowerFactor,
    Night,
    Morning,
    Afternoon,
    Evening,
}

impl Feature {
    pub const ALL: [Feature; 17] = [
        Feature::WindSpeedSquared,
        Feature::WindSpeedCubed,
        Feature::YawCorrectedWindSpeed,
        Feature::RollingTemp,
        Feature::DensityProxy,
        Feature::NormalizedRotorSpeed,
        Feature::RunawayRotor,
        Feature::TipSpeedRatio,
        Feature::TorqueSpeedGradient,
        Feature::OperationalRange,
        Feature::CoolingEfficiency,
        Feature::ApparentPower,
        Feature::PowerFactor,
        Feature::Night,
        Feature::Morning,
        Feature::Afternoon,
        Feature::Evening,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Feature::WindSpeedSquared => "wind_speed_sq",
            Feature::WindSpeedCubed => "wind_speed_cu",
            Feature::YawCorrectedWindSpeed => "yaw_corrected_wind_speed",
            Feature::RollingTemp => "rolling_temp",
            Feature::DensityProxy => "density_proxy",
            Feature::NormalizedRotorSpeed => "normalized_rotor_speed",
            Feature::RunawayRotor => "runaway_rotor",
            Feature::TipSpeedRatio => "tip_speed_ratio",
            Feature::TorqueSpeedGradient => "torque_speed_gradient",
            Feature::OperationalRange => "operational_range",
            Feature::CoolingEfficiency => "cooling_efficiency",
            Feature::ApparentPower => "apparent_power",
            Feature::PowerFactor => "power_factor",
            Feature::Night => "block_night",
            Feature::Morning => "block_morning",
            Feature::Afternoon => "block_afternoon",
            Feature::Evening => "block_evening",
        }
    }

    /// Base fields this feature reads from the same row (or the same
    /// turbine's preceding rows for windowed features). Time-of-day blocks
    /// depend only on the timestamp and return an empty set.
    pub const fn dependencies(self) -> &'static [Field] {
        match self {
            Feature::WindSpeedSquared | Feature::WindSpeedCubed | Feature::OperationalRange => {
                &[Field::WindSpeed]
            }
            Feature::YawCorrectedWindSpeed => &[Field::WindSpeed, Field::VanePosition],
            Feature::RollingTemp => &[Field::OutdoorTemp],
            Feature::DensityProxy => &[Field::WeatherPressure, Field::WeatherTemp],
            Feature::NormalizedRotorSpeed => &[Field::RotorSpeed],
            Feature::RunawayRotor | Feature::TipSpeedRatio => {
                &[Field::RotorSpeed, Field::WindSpeed]
            }
            Feature::TorqueSpeedGradient => &[Field::Torque, Field::RotorSpeed],
            Feature::CoolingEfficiency => &[Field::OutdoorTemp, Field::NacelleTemp],
            Feature::ApparentPower | Feature::PowerFactor => {
                &[Field::ActivePower, Field::ReactivePower]
            }
            Feature::Night | Feature::Morning | Feature::Afternoon | Feature::Evening => &[],
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

impl Serialize for Feature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Feature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Derived values for one observation. Booleans are `Option<bool>` so that
/// "unknown" is distinct from "false".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    pub wind_speed_sq: Option<f64>,
    pub wind_speed_cu: Option<f64>,
    pub yaw_corrected_wind_speed: Option<f64>,
    pub rolling_temp: Option<f64>,
    pub density_proxy: Option<f64>,
    pub normalized_rotor_speed: Option<f64>,
    pub runaway_rotor: Option<bool>,
    pub tip_speed_ratio: Option<f64>,
    pub torque_speed_gradient: Option<f64>,
    pub operational_range: Option<bool>,
    pub cooling_efficiency: Option<f64>,
    pub apparent_power: Option<f64>,
    pub power_factor: Option<f64>,
    /// Hour-of-day blocks [0,6), [6,12), [12,18), [18,24); exactly one is true.
    pub time_blocks: [bool; 4],
}

impl DerivedFeatures {
    /// Numeric value of a feature; booleans encode as 1.0 / 0.0.
    pub fn value(&self, feature: Feature) -> Option<f64> {
        let flag = |b: Option<bool>| b.map(|v| if v { 1.0 } else { 0.0 });
        let block = |i: usize| Some(if self.time_blocks[i] { 1.0 } else { 0.0 });
        match feature {
            Feature::WindSpeedSquared => self.wind_speed_sq,
            Feature::WindSpeedCubed => self.wind_speed_cu,
            Feature::YawCorrectedWindSpeed => self.yaw_corrected_wind_speed,
            Feature::RollingTemp => self.rolling_temp,
            Feature::DensityProxy => self.density_proxy,
            Feature::NormalizedRotorSpeed => self.normalized_rotor_speed,
            Feature::RunawayRotor => flag(self.runaway_rotor),
            Feature::TipSpeedRatio => self.tip_speed_ratio,
            Feature::TorqueSpeedGradient => self.torque_speed_gradient,
            Feature::OperationalRange => flag(self.operational_range),
            Feature::CoolingEfficiency => self.cooling_efficiency,
            Feature::ApparentPower => self.apparent_power,
            Feature::PowerFactor => self.power_factor,
            Feature::Night => block(0),
            Feature::Morning => block(1),
            Feature::Afternoon => block(2),
            Feature::Evening => block(3),
        }
    }
}

/// Addresses a numeric column of a derived table: a base field or a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnId {
    Base(Field),
    Derived(Feature),
}

impl ColumnId {
    pub const fn name(self) -> &'static str {
        match self {
            ColumnId::Base(f) => f.name(),
            ColumnId::Derived(f) => f.name(),
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColumnId {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(field) = s.parse::<Field>() {
            return Ok(ColumnId::Base(field));
        }
        s.parse::<Feature>().map(ColumnId::Derived)
    }
}

impl Serialize for ColumnId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ColumnId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A cleaned observation extended with its derived features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedObservation {
    pub base: Observation,
    pub features: DerivedFeatures,
}

impl DerivedObservation {
    pub fn turbine_id(&self) -> &TurbineId {
        &self.base.turbine_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.base.timestamp
    }

    pub fn value(&self, column: ColumnId) -> Option<f64> {
        match column {
            ColumnId::Base(field) => self.base.get(field),
            ColumnId::Derived(feature) => self.features.value(feature),
        }
    }

    /// Values for a column set, or `None` if any of them is missing.
    pub fn values(&self, columns: &[ColumnId]) -> Option<Vec<f64>> {
        columns.iter().map(|&c| self.value(c)).collect()
    }
}

/// Immutable table of derived observations, same ordering as its source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedTable {
    rows: Vec<DerivedObservation>,
}

impl DerivedTable {
    pub fn new(rows: Vec<DerivedObservation>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[DerivedObservation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column values in row order, `None` where missing.
    pub fn column(&self, column: ColumnId) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.value(column)).collect()
    }

    /// Rows of one turbine, in chronological order.
    pub fn series(&self, turbine: &TurbineId) -> &[DerivedObservation] {
        let start = self.rows.partition_point(|r| r.turbine_id() < turbine);
        let end = self.rows.partition_point(|r| r.turbine_id() <= turbine);
        &self.rows[start..end]
    }
}
