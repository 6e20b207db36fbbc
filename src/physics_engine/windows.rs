//! Windowed features over one turbine's chronologically ordered rows

use super::turbine_models::torque_speed_gradient;
use crate::types::{Field, Observation};
use chrono::Duration;

/// Trailing mean of `field` over `window` consecutive hourly slots.
///
/// Defined only when the current row and the `window - 1` rows before it are
/// exactly one hour apart and all carry a value. Summation order is fixed, so
/// results are bit-identical across runs.
pub fn rolling_mean(series: &[Observation], field: Field, window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; series.len()];
    if window == 0 {
        return out;
    }

    let hour = Duration::hours(1);
    // Length of the run of consecutive, populated hourly rows ending at i
    let mut run = 0usize;

    for (i, obs) in series.iter().enumerate() {
        let contiguous = i > 0 && obs.timestamp - series[i - 1].timestamp == hour;
        run = match obs.get(field) {
            Some(_) if contiguous && run > 0 => run + 1,
            Some(_) => 1,
            None => 0,
        };

        if run >= window {
            let sum: f64 = series[i + 1 - window..=i]
                .iter()
                .filter_map(|o| o.get(field))
                .sum();
            out[i] = Some(sum / window as f64);
        }
    }

    out
}

/// Torque-speed gradient against the immediately preceding row, if that row
/// is no more than `max_gap` earlier.
pub fn consecutive_gradient(series: &[Observation], max_gap: Duration) -> Vec<Option<f64>> {
    let mut out = vec![None; series.len()];
    for i in 1..series.len() {
        let (prev, cur) = (&series[i - 1], &series[i]);
        if cur.timestamp - prev.timestamp > max_gap {
            continue;
        }
        out[i] = torque_speed_gradient(
            (prev.get(Field::Torque), prev.get(Field::RotorSpeed)),
            (cur.get(Field::Torque), cur.get(Field::RotorSpeed)),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TurbineId;
    use chrono::{TimeZone, Utc};

    fn series(points: &[(i64, Option<f64>)]) -> Vec<Observation> {
        let start = Utc.with_ymd_and_hms(2014, 6, 1, 0, 0, 0).unwrap();
        points
            .iter()
            .map(|&(h, t)| {
                Observation::empty(TurbineId::new("T03"), start + Duration::hours(h))
                    .with(Field::OutdoorTemp, t)
            })
            .collect()
    }

    #[test]
    fn test_gap_in_hours_resets_window() {
        // Hour 3 is absent from the series
        let s = series(&[
            (0, Some(1.0)),
            (1, Some(1.0)),
            (2, Some(1.0)),
            (4, Some(1.0)),
            (5, Some(1.0)),
            (6, Some(1.0)),
            (7, Some(1.0)),
            (8, Some(1.0)),
            (9, Some(1.0)),
        ]);
        let out = rolling_mean(&s, Field::OutdoorTemp, 6);
        assert!(out[..8].iter().all(Option::is_none));
        assert_eq!(out[8], Some(1.0));
    }

    #[test]
    fn test_missing_value_inside_window_yields_missing() {
        let mut points: Vec<(i64, Option<f64>)> = (0..12).map(|h| (h, Some(h as f64))).collect();
        points[7].1 = None;
        let out = rolling_mean(&series(&points), Field::OutdoorTemp, 6);
        assert_eq!(out[5], Some(2.5));
        assert_eq!(out[6], Some(3.5));
        for value in &out[7..=11] {
            assert_eq!(*value, None);
        }
    }

    #[test]
    fn test_gradient_skips_large_gaps() {
        let start = Utc.with_ymd_and_hms(2014, 6, 1, 0, 0, 0).unwrap();
        let row = |h: i64, torque: f64, speed: f64| {
            Observation::empty(TurbineId::new("T03"), start + Duration::hours(h))
                .with(Field::Torque, Some(torque))
                .with(Field::RotorSpeed, Some(speed))
        };
        let s = vec![row(0, 100.0, 10.0), row(1, 120.0, 12.0), row(5, 200.0, 14.0)];
        let out = consecutive_gradient(&s, Duration::hours(1));
        assert_eq!(out, vec![None, Some(10.0), None]);
    }
}
