//! Raw series loader
//!
//! Joins each turbine's mechanical rows with the shared weather station on
//! exact timestamp and builds the immutable [`ObservationTable`].

use super::source::{ObservationSource, Readings, WeatherRow};
use crate::types::{
    Component, FieldGroup, Observation, ObservationTable, PipelineError, PipelineResult, TurbineId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// What happened while loading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub source: String,
    pub rows_per_turbine: BTreeMap<TurbineId, usize>,
    pub weather_rows: usize,
    /// Rows dropped because their (turbine, timestamp) key was already seen.
    pub duplicates: usize,
    pub unparseable_cells: usize,
    pub skipped_rows: usize,
    /// Mechanical rows without a weather row at the same timestamp.
    pub unmatched_weather: usize,
    /// Readings supplied under the wrong source group and ignored.
    pub misplaced_readings: usize,
}

impl LoadReport {
    pub fn total_rows(&self) -> usize {
        self.rows_per_turbine.values().sum()
    }
}

/// Load the full observation table from a source.
pub fn load(source: &dyn ObservationSource) -> PipelineResult<(ObservationTable, LoadReport)> {
    let mechanical = source.mechanical_rows()?;
    let weather = source.weather_rows()?;

    let mut report = LoadReport {
        source: source.describe(),
        unparseable_cells: mechanical.unparseable_cells + weather.unparseable_cells,
        skipped_rows: mechanical.skipped_rows + weather.skipped_rows,
        ..Default::default()
    };

    let (station, weather_duplicates) = index_weather(&weather.rows);
    report.weather_rows = station.len();
    report.duplicates += weather_duplicates;

    let mut rows = Vec::with_capacity(mechanical.rows.len());
    for row in &mechanical.rows {
        let mut obs = Observation::empty(row.turbine_id.clone(), row.timestamp);
        report.misplaced_readings += apply(&mut obs, &row.readings, FieldGroup::Mechanical);

        match station.get(&row.timestamp) {
            Some(readings) => {
                report.misplaced_readings += apply(&mut obs, readings, FieldGroup::Weather);
            }
            None => report.unmatched_weather += 1,
        }
        rows.push(obs);
    }

    let (table, duplicates) = ObservationTable::from_rows(rows);
    if duplicates > 0 {
        warn!(duplicates, "Duplicate (turbine, timestamp) rows dropped, first occurrence kept");
    }
    report.duplicates += duplicates;
    report.rows_per_turbine = table.row_counts();

    if table.is_empty() {
        return Err(PipelineError::config(
            Component::Loader,
            format!("source '{}' produced no mechanical rows", report.source),
        ));
    }
    if report.misplaced_readings > 0 {
        warn!(
            count = report.misplaced_readings,
            "Readings supplied for a field of the other source group were ignored"
        );
    }
    if report.unparseable_cells > 0 {
        warn!(cells = report.unparseable_cells, "Unparseable cells loaded as missing");
    }

    info!(
        source = %report.source,
        turbines = report.rows_per_turbine.len(),
        rows = table.len(),
        weather_rows = report.weather_rows,
        unmatched_weather = report.unmatched_weather,
        duplicates = report.duplicates,
        "Observations loaded"
    );

    Ok((table, report))
}

/// Index weather rows by timestamp, keeping the first row for a repeated hour.
fn index_weather(rows: &[WeatherRow]) -> (BTreeMap<DateTime<Utc>, &Readings>, usize) {
    let mut station = BTreeMap::new();
    let mut duplicates = 0;
    for row in rows {
        match station.entry(row.timestamp) {
            Entry::Vacant(slot) => {
                slot.insert(&row.readings);
            }
            Entry::Occupied(_) => duplicates += 1,
        }
    }
    if duplicates > 0 {
        warn!(duplicates, "Duplicate weather timestamps dropped, first occurrence kept");
    }
    (station, duplicates)
}

/// Copy readings of one group onto the observation. Returns how many were
/// rejected for belonging to the other group.
fn apply(obs: &mut Observation, readings: &Readings, group: FieldGroup) -> usize {
    let mut misplaced = 0;
    for (&field, &value) in readings {
        if field.group() == group {
            obs.set(field, Some(value));
        } else {
            misplaced += 1;
        }
    }
    misplaced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::source::{MechanicalRow, MemorySource};
    use crate::types::Field;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 3, 1, hour, 0, 0).unwrap()
    }

    fn mech(turbine: &str, hour: u32, power: f64) -> MechanicalRow {
        MechanicalRow {
            turbine_id: TurbineId::new(turbine),
            timestamp: ts(hour),
            readings: Readings::from([(Field::ActivePower, power), (Field::WindSpeed, 8.0)]),
        }
    }

    fn weather(hour: u32, temp: f64) -> WeatherRow {
        WeatherRow {
            timestamp: ts(hour),
            readings: Readings::from([(Field::WeatherTemp, temp), (Field::WeatherPressure, 1010.0)]),
        }
    }

    #[test]
    fn test_weather_joined_by_exact_timestamp() {
        let source = MemorySource::new(
            vec![mech("T02", 1, 900.0), mech("T01", 0, 800.0), mech("T01", 1, 850.0)],
            // Hour 3 has no mechanical rows and must not create any
            vec![weather(1, 4.5), weather(0, 4.0), weather(3, 5.0)],
        );
        let (table, report) = load(&source).unwrap();

        assert_eq!(table.len(), 3);
        let t02 = table.series(&TurbineId::new("T02"));
        assert_eq!(t02[0].get(Field::WeatherTemp), Some(4.5));
        assert_eq!(t02[0].get(Field::ActivePower), Some(900.0));
        let t01 = table.series(&TurbineId::new("T01"));
        assert_eq!(t01[0].get(Field::WeatherTemp), Some(4.0));
        assert_eq!(report.unmatched_weather, 0);
        assert_eq!(report.rows_per_turbine[&TurbineId::new("T01")], 2);
    }

    #[test]
    fn test_missing_weather_hour_leaves_fields_missing() {
        let source = MemorySource::new(vec![mech("T01", 0, 800.0), mech("T01", 1, 850.0)], vec![weather(0, 4.0)]);
        let (table, report) = load(&source).unwrap();
        let t01 = table.series(&TurbineId::new("T01"));
        assert_eq!(t01[1].get(Field::WeatherTemp), None);
        assert_eq!(t01[1].get(Field::ActivePower), Some(850.0));
        assert_eq!(report.unmatched_weather, 1);
    }

    #[test]
    fn test_duplicates_first_wins_and_counted() {
        let source = MemorySource::new(
            vec![mech("T01", 0, 800.0), mech("T01", 0, 1.0)],
            vec![weather(0, 4.0), weather(0, -20.0)],
        );
        let (table, report) = load(&source).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].get(Field::ActivePower), Some(800.0));
        assert_eq!(table.rows()[0].get(Field::WeatherTemp), Some(4.0));
        assert_eq!(report.duplicates, 2);
    }

    #[test]
    fn test_misplaced_readings_ignored() {
        let mut row = mech("T01", 0, 800.0);
        row.readings.insert(Field::WeatherTemp, 99.0);
        let source = MemorySource::new(vec![row], vec![]);
        let (table, report) = load(&source).unwrap();
        assert_eq!(table.rows()[0].get(Field::WeatherTemp), None);
        assert_eq!(report.misplaced_readings, 1);
    }

    #[test]
    fn test_empty_source_is_an_error() {
        let err = load(&MemorySource::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Configuration {
                component: Component::Loader,
                ..
            }
        ));
    }
}
