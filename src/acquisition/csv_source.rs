//! CSV Observation Source
//!
//! One mechanical CSV per turbine plus one weather CSV shared by all turbines.
//! Every file has a `timestamp` column and one column per schema field of its
//! kind, named exactly as the field (`wind_speed`, `weather_pressure`, ...).
//! Extra columns are ignored.
//!
//! Timestamps are RFC 3339, or naive `YYYY-MM-DD HH:MM:SS` read as UTC.
//! Empty, `nan`, `null` and `-` cells are missing; anything else that does
//! not parse as a number is missing too, and counted.

use super::source::{Batch, MechanicalRow, ObservationSource, Readings, WeatherRow};
use crate::types::{Field, FieldGroup, PipelineError, PipelineResult, TurbineId};
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the key column in every file.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

#[derive(Debug, Clone)]
pub struct CsvSource {
    weather: PathBuf,
    turbines: Vec<(TurbineId, PathBuf)>,
}

impl CsvSource {
    pub fn new(weather: impl Into<PathBuf>, turbines: Vec<(TurbineId, PathBuf)>) -> Self {
        Self {
            weather: weather.into(),
            turbines,
        }
    }
}

impl ObservationSource for CsvSource {
    fn mechanical_rows(&self) -> PipelineResult<Batch<MechanicalRow>> {
        let mut batch = Batch::clean(Vec::new());
        for (turbine_id, path) in &self.turbines {
            let parsed = read_table(path, FieldGroup::Mechanical)?;
            debug!(turbine = %turbine_id, path = %path.display(), rows = parsed.rows.len(), "Read turbine CSV");
            batch.unparseable_cells += parsed.unparseable_cells;
            batch.skipped_rows += parsed.skipped_rows;
            batch.rows.extend(parsed.rows.into_iter().map(|(timestamp, readings)| MechanicalRow {
                turbine_id: turbine_id.clone(),
                timestamp,
                readings,
            }));
        }
        Ok(batch)
    }

    fn weather_rows(&self) -> PipelineResult<Batch<WeatherRow>> {
        let parsed = read_table(&self.weather, FieldGroup::Weather)?;
        debug!(path = %self.weather.display(), rows = parsed.rows.len(), "Read weather CSV");
        Ok(Batch {
            rows: parsed
                .rows
                .into_iter()
                .map(|(timestamp, readings)| WeatherRow { timestamp, readings })
                .collect(),
            unparseable_cells: parsed.unparseable_cells,
            skipped_rows: parsed.skipped_rows,
        })
    }

    fn describe(&self) -> String {
        format!(
            "csv (weather {}, {} turbine files)",
            self.weather.display(),
            self.turbines.len()
        )
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Parse a timestamp cell.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // "2016-01-03 10:00:00+00:00"
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }

    // Without timezone (assume UTC)
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    None
}

enum Cell {
    Value(f64),
    Missing,
    Unparseable,
}

fn parse_cell(s: &str) -> Cell {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") || s == "-" {
        return Cell::Missing;
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Cell::Value(v),
        Ok(_) => Cell::Missing,
        Err(_) => Cell::Unparseable,
    }
}

fn read_table(path: &Path, group: FieldGroup) -> PipelineResult<Batch<(DateTime<Utc>, Readings)>> {
    let source_name = path.display().to_string();
    let file = File::open(path).map_err(|e| PipelineError::Io(path.to_path_buf(), e))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::Csv(source_name.clone(), e))?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h == name);

    let ts_idx = column(TIMESTAMP_COLUMN).ok_or_else(|| PipelineError::Schema {
        source_name: source_name.clone(),
        column: TIMESTAMP_COLUMN.to_string(),
    })?;
    let mut field_idx = Vec::new();
    for field in Field::in_group(group) {
        let idx = column(field.name()).ok_or_else(|| PipelineError::Schema {
            source_name: source_name.clone(),
            column: field.name().to_string(),
        })?;
        field_idx.push((field, idx));
    }

    let mut batch = Batch::clean(Vec::new());
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| PipelineError::Csv(source_name.clone(), e))?;

        let Some(timestamp) = record.get(ts_idx).and_then(parse_timestamp) else {
            warn!(source = %source_name, line = line + 2, "Unreadable timestamp, skipping row");
            batch.skipped_rows += 1;
            continue;
        };

        let mut readings = Readings::new();
        for &(field, idx) in &field_idx {
            match record.get(idx).map(parse_cell) {
                Some(Cell::Value(v)) => {
                    readings.insert(field, v);
                }
                Some(Cell::Unparseable) => batch.unparseable_cells += 1,
                Some(Cell::Missing) | None => {}
            }
        }
        batch.rows.push((timestamp, readings));
    }

    Ok(batch)
}

// ============================================================================
// Writing
// ============================================================================

fn write_table<'a>(
    path: &Path,
    group: FieldGroup,
    rows: impl Iterator<Item = (DateTime<Utc>, &'a Readings)>,
) -> PipelineResult<()> {
    let source_name = path.display().to_string();
    let file = File::create(path).map_err(|e| PipelineError::Io(path.to_path_buf(), e))?;
    let mut writer = WriterBuilder::new().from_writer(file);
    let fields: Vec<Field> = Field::in_group(group).collect();

    let mut header = vec![TIMESTAMP_COLUMN.to_string()];
    header.extend(fields.iter().map(|f| f.name().to_string()));
    writer
        .write_record(&header)
        .map_err(|e| PipelineError::Csv(source_name.clone(), e))?;

    for (timestamp, readings) in rows {
        let mut record = vec![timestamp.format("%Y-%m-%d %H:%M:%S").to_string()];
        record.extend(
            fields
                .iter()
                .map(|f| readings.get(f).map(|v| v.to_string()).unwrap_or_default()),
        );
        writer
            .write_record(&record)
            .map_err(|e| PipelineError::Csv(source_name.clone(), e))?;
    }
    writer
        .flush()
        .map_err(|e| PipelineError::Io(path.to_path_buf(), e))?;
    Ok(())
}

/// Write one turbine's rows in the layout [`CsvSource`] reads.
pub fn write_mechanical_csv(path: &Path, rows: &[MechanicalRow]) -> PipelineResult<()> {
    write_table(
        path,
        FieldGroup::Mechanical,
        rows.iter().map(|r| (r.timestamp, &r.readings)),
    )
}

/// Write weather rows in the layout [`CsvSource`] reads.
pub fn write_weather_csv(path: &Path, rows: &[WeatherRow]) -> PipelineResult<()> {
    write_table(
        path,
        FieldGroup::Weather,
        rows.iter().map(|r| (r.timestamp, &r.readings)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2016, 1, 3, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2016-01-03 10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2016-01-03T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2016-01-03T11:00:00+01:00"), Some(expected));
        assert_eq!(parse_timestamp("2016-01-03 10:00:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_cell_parsing() {
        assert!(matches!(parse_cell(" 12.5 "), Cell::Value(v) if v == 12.5));
        assert!(matches!(parse_cell(""), Cell::Missing));
        assert!(matches!(parse_cell("NaN"), Cell::Missing));
        assert!(matches!(parse_cell("inf"), Cell::Missing));
        assert!(matches!(parse_cell("12,5kW"), Cell::Unparseable));
    }
}
