//! Raw observation schema: one row per (turbine, hour)
//!
//! Missingness is carried in the type: every measured field is an
//! `Option<f64>`, and a row may be partially populated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Number of measured fields per observation (13 mechanical + 7 weather).
pub const FIELD_COUNT: usize = 20;

/// Whether a field comes from the turbine SCADA feed or the weather station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldGroup {
    Mechanical,
    Weather,
}

/// A measured field of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    // === Mechanical (SCADA) ===
    /// Primary anemometer wind speed (m/s)
    WindSpeed,
    /// Secondary anemometer wind speed (m/s)
    WindSpeed2,
    /// Wind direction (degrees)
    WindDirection,
    /// Blade pitch angle (degrees)
    PitchAngle,
    /// Vane position relative to the nacelle axis (degrees)
    VanePosition,
    /// Nacelle orientation (degrees)
    NacelleAngle,
    /// Outdoor temperature at the turbine (°C)
    OutdoorTemp,
    /// Nacelle interior temperature (°C)
    NacelleTemp,
    /// Rotor bearing temperature (°C)
    RotorBearingTemp,
    /// Drive-train torque (kNm)
    Torque,
    /// Rotor speed (rpm)
    RotorSpeed,
    /// Active power (kW)
    ActivePower,
    /// Reactive power (kVAr)
    ReactivePower,

    // === Weather station ===
    /// Air temperature (°C)
    WeatherTemp,
    /// Barometric pressure (hPa)
    WeatherPressure,
    /// Relative humidity (%)
    WeatherHumidity,
    /// Wind speed at the station (m/s)
    WeatherWindSpeed,
    /// Wind direction at the station (degrees)
    WeatherWindDirection,
    /// Rain over the last hour (mm)
    Rain1h,
    /// Snow over the last hour (mm)
    Snow1h,
}

impl Field {
    /// All fields in storage order.
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::WindSpeed,
        Field::WindSpeed2,
        Field::WindDirection,
        Field::PitchAngle,
        Field::VanePosition,
        Field::NacelleAngle,
        Field::OutdoorTemp,
        Field::NacelleTemp,
        Field::RotorBearingTemp,
        Field::Torque,
        Field::RotorSpeed,
        Field::ActivePower,
        Field::ReactivePower,
        Field::WeatherTemp,
        Field::WeatherPressure,
        Field::WeatherHumidity,
        Field::WeatherWindSpeed,
        Field::WeatherWindDirection,
        Field::Rain1h,
        Field::Snow1h,
    ];

    /// Storage slot of this field in [`Observation::values`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Column name used in CSV headers and configuration keys.
    pub const fn name(self) -> &'static str {
        match self {
            Field::WindSpeed => "wind_speed",
            Field::WindSpeed2 => "wind_speed_2",
            Field::WindDirection => "wind_direction",
            Field::PitchAngle => "pitch_angle",
            Field::VanePosition => "vane_position",
            Field::NacelleAngle => "nacelle_angle",
            Field::OutdoorTemp => "outdoor_temp",
            Field::NacelleTemp => "nacelle_temp",
            Field::RotorBearingTemp => "rotor_bearing_temp",
            Field::Torque => "torque",
            Field::RotorSpeed => "rotor_speed",
            Field::ActivePower => "active_power",
            Field::ReactivePower => "reactive_power",
            Field::WeatherTemp => "weather_temp",
            Field::WeatherPressure => "weather_pressure",
            Field::WeatherHumidity => "weather_humidity",
            Field::WeatherWindSpeed => "weather_wind_speed",
            Field::WeatherWindDirection => "weather_wind_direction",
            Field::Rain1h => "rain_1h",
            Field::Snow1h => "snow_1h",
        }
    }

    pub const fn group(self) -> FieldGroup {
        match self {
            Field::WeatherTemp
            | Field::WeatherPressure
            | Field::WeatherHumidity
            | Field::WeatherWindSpeed
            | Field::WeatherWindDirection
            | Field::Rain1h
            | Field::Snow1h => FieldGroup::Weather,
            _ => FieldGroup::Mechanical,
        }
    }

    /// Fields belonging to one source group, in storage order.
    pub fn in_group(group: FieldGroup) -> impl Iterator<Item = Field> {
        Self::ALL.into_iter().filter(move |f| f.group() == group)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a column name is not part of the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown field '{}'", self.0)
    }
}

impl std::error::Error for UnknownField {}

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// Turbine identifier (e.g. "T01").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurbineId(pub String);

impl TurbineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TurbineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One hourly observation of one turbine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub turbine_id: TurbineId,
    pub timestamp: DateTime<Utc>,
    /// Field values indexed by [`Field::index`]; `None` = not recorded.
    pub values: [Option<f64>; FIELD_COUNT],
}

impl Observation {
    /// Create an observation with every field missing.
    pub fn empty(turbine_id: TurbineId, timestamp: DateTime<Utc>) -> Self {
        Self {
            turbine_id,
            timestamp,
            values: [None; FIELD_COUNT],
        }
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.values[field.index()]
    }

    /// Builder-style setter; non-finite values are stored as missing.
    pub fn with(mut self, field: Field, value: Option<f64>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: Field, value: Option<f64>) {
        self.values[field.index()] = value.filter(|v| v.is_finite());
    }

    /// Number of populated fields.
    pub fn populated(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Immutable table of observations sorted by (turbine, timestamp).
///
/// Keys are unique. Turbines are never assumed to be row-aligned; any
/// cross-turbine comparison has to join on timestamp explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationTable {
    rows: Vec<Observation>,
}

impl ObservationTable {
    /// Build a table, sorting rows and dropping duplicate keys (first wins).
    ///
    /// Returns the table and the number of duplicates dropped.
    pub fn from_rows(mut rows: Vec<Observation>) -> (Self, usize) {
        // Stable sort keeps the first occurrence of a duplicate key in front
        rows.sort_by(|a, b| {
            a.turbine_id
                .cmp(&b.turbine_id)
                .then(a.timestamp.cmp(&b.timestamp))
        });
        let before = rows.len();
        rows.dedup_by(|later, earlier| {
            later.turbine_id == earlier.turbine_id && later.timestamp == earlier.timestamp
        });
        let duplicates = before - rows.len();
        (Self { rows }, duplicates)
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct turbines in sorted order.
    pub fn turbines(&self) -> Vec<TurbineId> {
        let mut ids: Vec<TurbineId> = Vec::new();
        for row in &self.rows {
            if ids.last() != Some(&row.turbine_id) {
                ids.push(row.turbine_id.clone());
            }
        }
        ids
    }

    /// Chronologically ordered rows of a single turbine.
    pub fn series(&self, turbine: &TurbineId) -> &[Observation] {
        let start = self.rows.partition_point(|r| r.turbine_id < *turbine);
        let end = self.rows.partition_point(|r| r.turbine_id <= *turbine);
        &self.rows[start..end]
    }

    /// Contiguous per-turbine slices, in turbine order.
    pub fn per_turbine(&self) -> impl Iterator<Item = &[Observation]> {
        self.rows
            .chunk_by(|a, b| a.turbine_id == b.turbine_id)
    }

    /// Row count per turbine.
    pub fn row_counts(&self) -> BTreeMap<TurbineId, usize> {
        self.per_turbine()
            .filter_map(|s| s.first().map(|r| (r.turbine_id.clone(), s.len())))
            .collect()
    }

    /// Present (non-missing) values of one field across the table.
    pub fn present_values(&self, field: Field) -> Vec<f64> {
        self.rows.iter().filter_map(|r| r.get(field)).collect()
    }

    /// Build a new table by mapping each row; ordering and keys are preserved.
    pub fn map_rows(&self, f: impl FnMut(&Observation) -> Observation) -> Self {
        Self {
            rows: self.rows.iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_field_names_roundtrip_through_from_str() {
        for field in Field::ALL {
            assert_eq!(field.name().parse::<Field>().unwrap(), field);
        }
        assert!("rotor_rpm".parse::<Field>().is_err());
    }

    #[test]
    fn test_field_index_matches_storage_order() {
        for (i, field) in Field::ALL.iter().enumerate() {
            assert_eq!(field.index(), i);
        }
        assert_eq!(Field::in_group(FieldGroup::Weather).count(), 7);
        assert_eq!(Field::in_group(FieldGroup::Mechanical).count(), 13);
    }

    #[test]
    fn test_non_finite_values_stored_as_missing() {
        let obs = Observation::empty(TurbineId::new("T01"), ts(0))
            .with(Field::Torque, Some(f64::NAN))
            .with(Field::RotorSpeed, Some(12.0));
        assert_eq!(obs.get(Field::Torque), None);
        assert_eq!(obs.get(Field::RotorSpeed), Some(12.0));
        assert_eq!(obs.populated(), 1);
    }

    #[test]
    fn test_table_sorts_and_drops_duplicate_keys() {
        let rows = vec![
            Observation::empty(TurbineId::new("T02"), ts(1)),
            Observation::empty(TurbineId::new("T01"), ts(2)).with(Field::Torque, Some(1.0)),
            Observation::empty(TurbineId::new("T01"), ts(2)).with(Field::Torque, Some(2.0)),
            Observation::empty(TurbineId::new("T01"), ts(0)),
        ];
        let (table, dups) = ObservationTable::from_rows(rows);
        assert_eq!(dups, 1);
        assert_eq!(table.len(), 3);
        assert_eq!(table.turbines(), vec![TurbineId::new("T01"), TurbineId::new("T02")]);

        let t01 = table.series(&TurbineId::new("T01"));
        assert_eq!(t01.len(), 2);
        assert_eq!(t01[0].timestamp, ts(0));
        // First occurrence wins
        assert_eq!(t01[1].get(Field::Torque), Some(1.0));
        assert_eq!(table.series(&TurbineId::new("T09")).len(), 0);
    }

    #[test]
    fn test_row_counts_per_turbine() {
        let rows = vec![
            Observation::empty(TurbineId::new("T01"), ts(0)),
            Observation::empty(TurbineId::new("T01"), ts(1)),
            Observation::empty(TurbineId::new("T02"), ts(0)),
        ];
        let (table, _) = ObservationTable::from_rows(rows);
        let counts = table.row_counts();
        assert_eq!(counts[&TurbineId::new("T01")], 2);
        assert_eq!(counts[&TurbineId::new("T02")], 1);
    }
}
