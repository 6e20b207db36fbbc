//! Per-row turbine physics formulas
//!
//! Every function takes optional inputs and returns an optional output:
//! a missing input gives a missing result, and a zero denominator gives a
//! missing result rather than an infinity or NaN.

use crate::types::feature_constants::CELSIUS_TO_KELVIN;
use serde::{Deserialize, Serialize};

/// Unit of the temperature fed into the density proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Kelvin,
}

/// `num / den`, missing when either is missing or `den == 0`.
pub fn guarded_ratio(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    let (n, d) = (num?, den?);
    if d == 0.0 {
        return None;
    }
    Some(n / d).filter(|v| v.is_finite())
}

pub fn wind_speed_squared(wind_speed: Option<f64>) -> Option<f64> {
    wind_speed.map(|v| v * v)
}

pub fn wind_speed_cubed(wind_speed: Option<f64>) -> Option<f64> {
    wind_speed.map(|v| v * v * v)
}

/// Wind speed component normal to the rotor plane.
///
/// `vane_position_deg` is the vane angle relative to the nacelle axis.
pub fn yaw_corrected_wind_speed(
    wind_speed: Option<f64>,
    vane_position_deg: Option<f64>,
) -> Option<f64> {
    Some(wind_speed? * vane_position_deg?.to_radians().cos())
}

/// Air density proxy: pressure over absolute temperature.
///
/// Missing if the absolute temperature is not strictly positive.
pub fn density_proxy(
    pressure: Option<f64>,
    temperature: Option<f64>,
    unit: TemperatureUnit,
) -> Option<f64> {
    let absolute = match unit {
        TemperatureUnit::Celsius => temperature? + CELSIUS_TO_KELVIN,
        TemperatureUnit::Kelvin => temperature?,
    };
    if absolute <= 0.0 {
        return None;
    }
    guarded_ratio(pressure, Some(absolute))
}

pub fn normalized_rotor_speed(rotor_speed: Option<f64>, rated_rotor_speed: f64) -> Option<f64> {
    guarded_ratio(rotor_speed, Some(rated_rotor_speed))
}

/// Decoupled-rotor fault signature: rotor turning with (near) zero wind.
pub fn runaway_rotor(
    rotor_speed: Option<f64>,
    wind_speed: Option<f64>,
    near_zero_wind_speed: f64,
) -> Option<bool> {
    let (rs, ws) = (rotor_speed?, wind_speed?);
    Some(rs > 0.0 && ws <= near_zero_wind_speed)
}

/// Rotor speed over wind speed; missing when wind speed is zero.
pub fn tip_speed_ratio(rotor_speed: Option<f64>, wind_speed: Option<f64>) -> Option<f64> {
    guarded_ratio(rotor_speed, wind_speed)
}

/// True iff wind speed lies within [cut-in, cut-out].
pub fn operational_range(wind_speed: Option<f64>, cut_in: f64, cut_out: f64) -> Option<bool> {
    let ws = wind_speed?;
    Some(ws >= cut_in && ws <= cut_out)
}

/// Outdoor over nacelle temperature.
pub fn cooling_efficiency(outdoor_temp: Option<f64>, nacelle_temp: Option<f64>) -> Option<f64> {
    guarded_ratio(outdoor_temp, nacelle_temp)
}

pub fn apparent_power(active_power: Option<f64>, reactive_power: Option<f64>) -> Option<f64> {
    Some(active_power?.hypot(reactive_power?))
}

/// Active over apparent power; missing when apparent power is zero.
pub fn power_factor(active_power: Option<f64>, apparent_power: Option<f64>) -> Option<f64> {
    guarded_ratio(active_power, apparent_power)
}

/// Local slope of torque against rotor speed between two consecutive rows.
pub fn torque_speed_gradient(
    previous: (Option<f64>, Option<f64>),
    current: (Option<f64>, Option<f64>),
) -> Option<f64> {
    let (prev_torque, prev_speed) = previous;
    let (torque, speed) = current;
    let d_torque = torque? - prev_torque?;
    let d_speed = speed? - prev_speed?;
    guarded_ratio(Some(d_torque), Some(d_speed))
}

/// One-hot hour-of-day blocks [0,6), [6,12), [12,18), [18,24).
pub fn time_of_day_blocks(hour: u32) -> [bool; 4] {
    let mut blocks = [false; 4];
    blocks[(hour.min(23) / 6) as usize] = true;
    blocks
}
