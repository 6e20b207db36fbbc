//! CSV Loader Integration Tests
//!
//! Writes turbine and weather CSVs into a temporary directory and loads them
//! back through `CsvSource`: schema checks, missing-cell handling, the weather
//! join and an end-to-end pipeline run from disk.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use turbine_twin::acquisition::synthetic::turbine_name;
use turbine_twin::acquisition::{
    generate, load, write_mechanical_csv, write_weather_csv, MechanicalRow, SyntheticConfig,
};
use turbine_twin::{run, CsvSource, Field, PipelineError, TurbineId, TwinConfig};

const WEATHER_HEADER: &str =
    "timestamp,weather_temp,weather_pressure,weather_humidity,weather_wind_speed,weather_wind_direction,rain_1h,snow_1h";
const TURBINE_HEADER: &str = "timestamp,wind_speed,wind_speed_2,wind_direction,pitch_angle,vane_position,nacelle_angle,outdoor_temp,nacelle_temp,rotor_bearing_temp,torque,rotor_speed,active_power,reactive_power";

fn write(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, lines.join("\n")).expect("write fixture");
    path
}

/// Dump a synthetic fleet to CSVs and return the matching source.
fn synthetic_on_disk(dir: &Path, hours: usize) -> (CsvSource, turbine_twin::MemorySource) {
    let config = SyntheticConfig {
        hours,
        ..Default::default()
    };
    let data = generate(&config).unwrap();

    let mut turbines = Vec::new();
    for i in 0..config.turbines {
        let id = turbine_name(i);
        let rows: Vec<MechanicalRow> = data
            .source
            .mechanical
            .iter()
            .filter(|r| r.turbine_id == id)
            .cloned()
            .collect();
        let path = dir.join(format!("{id}.csv"));
        write_mechanical_csv(&path, &rows).unwrap();
        turbines.push((id, path));
    }
    let weather = dir.join("weather.csv");
    write_weather_csv(&weather, &data.source.weather).unwrap();

    (CsvSource::new(weather, turbines), data.source)
}

#[test]
fn csv_roundtrip_matches_in_memory_load() {
    let dir = TempDir::new().unwrap();
    let (csv, memory) = synthetic_on_disk(dir.path(), 96);

    let (from_disk, disk_report) = load(&csv).unwrap();
    let (from_memory, memory_report) = load(&memory).unwrap();

    assert_eq!(from_disk, from_memory);
    assert_eq!(disk_report.rows_per_turbine, memory_report.rows_per_turbine);
    assert_eq!(disk_report.unmatched_weather, memory_report.unmatched_weather);
    assert_eq!(disk_report.unparseable_cells, 0);
}

#[test]
fn missing_required_column_is_a_schema_error() {
    let dir = TempDir::new().unwrap();
    let weather = write(
        dir.path(),
        "weather.csv",
        &[
            // no snow_1h column
            "timestamp,weather_temp,weather_pressure,weather_humidity,weather_wind_speed,weather_wind_direction,rain_1h",
            "2016-01-01 00:00:00,4.0,1010,80,7.5,220,0",
        ],
    );
    let turbine = write(
        dir.path(),
        "T01.csv",
        &[TURBINE_HEADER, "2016-01-01 00:00:00,8,8,220,0,1,219,4,15,20,500,13,900,100"],
    );

    let source = CsvSource::new(weather.clone(), vec![(TurbineId::new("T01"), turbine)]);
    match load(&source) {
        Err(PipelineError::Schema { source_name, column }) => {
            assert_eq!(column, "snow_1h");
            assert!(source_name.ends_with("weather.csv"), "{}", source_name);
        }
        other => panic!("expected schema error, got {:?}", other.map(|(t, _)| t.len())),
    }
}

#[test]
fn bad_cells_load_as_missing_and_are_counted() {
    let dir = TempDir::new().unwrap();
    let weather = write(
        dir.path(),
        "weather.csv",
        &[
            WEATHER_HEADER,
            "2016-01-01 00:00:00,4.0,1010,80,7.5,220,0,0",
            "2016-01-01T01:00:00Z,4.5,1011,79,7.9,221,0,0",
        ],
    );
    let turbine = write(
        dir.path(),
        "T01.csv",
        &[
            TURBINE_HEADER,
            "2016-01-01 00:00:00,8,8,220,0,1,219,4,15,20,500,13,900,100",
            // empty torque, NaN rotor speed, garbage reactive power
            "2016-01-01 01:00:00,8.5,8.4,221,0,1,220,4,15,20,,nan,950,n/a",
            "not a time,9,9,221,0,1,220,4,15,20,500,13,900,100",
            // no weather at 02:00
            "2016-01-01 02:00:00,9,9,221,0,1,220,4,15,20,520,13.5,1000,110",
        ],
    );

    let source = CsvSource::new(weather, vec![(TurbineId::new("T01"), turbine)]);
    let (table, report) = load(&source).unwrap();

    assert_eq!(table.len(), 3);
    assert_eq!(report.skipped_rows, 1);
    assert_eq!(report.unparseable_cells, 1);
    assert_eq!(report.unmatched_weather, 1);

    let rows = table.series(&TurbineId::new("T01"));
    assert_eq!(rows[1].get(Field::Torque), None);
    assert_eq!(rows[1].get(Field::RotorSpeed), None);
    assert_eq!(rows[1].get(Field::ReactivePower), None);
    assert_eq!(rows[1].get(Field::ActivePower), Some(950.0));
    assert_eq!(rows[1].get(Field::WeatherTemp), Some(4.5));
    assert_eq!(rows[2].get(Field::WeatherTemp), None);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let source = CsvSource::new(
        dir.path().join("weather.csv"),
        vec![(TurbineId::new("T01"), dir.path().join("T01.csv"))],
    );
    assert!(matches!(load(&source), Err(PipelineError::Io(..))));
}

#[test]
fn pipeline_runs_from_csv_files() {
    let dir = TempDir::new().unwrap();
    let (csv, _) = synthetic_on_disk(dir.path(), 240);

    let mut config = TwinConfig::default();
    config.models.gradient_boosting.n_estimators = 30;
    let report = run(&csv, &config).unwrap();

    assert_eq!(report.load.rows_per_turbine.len(), 4);
    assert!(report.experiments.iter().all(|e| e.best_family.is_some()));

    let out = dir.path().join("report.json");
    fs::write(&out, serde_json::to_string_pretty(&report).unwrap()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(parsed["experiments"].as_array().unwrap().len(), 2);
}
