//! Turbine datasheet limits and feature constants

/// Datasheet limits for the 2 MW class turbines in the fleet
pub mod turbine_limits {
    /// Cut-in wind speed (m/s)
    pub const CUT_IN_WIND_SPEED: f64 = 3.5;
    /// Cut-out wind speed (m/s)
    pub const CUT_OUT_WIND_SPEED: f64 = 25.0;
    /// Rated (maximum) rotor speed (rpm)
    pub const RATED_ROTOR_SPEED: f64 = 17.0;
    /// Rated active power (kW)
    pub const RATED_POWER_KW: f64 = 2050.0;
    /// Wind speed at or below which a spinning rotor counts as runaway (m/s)
    pub const NEAR_ZERO_WIND_SPEED: f64 = 0.5;
}

/// Constants used by the feature deriver
pub mod feature_constants {
    /// Offset from degrees Celsius to kelvin
    pub const CELSIUS_TO_KELVIN: f64 = 273.15;
    /// Trailing window for the rolling outdoor temperature (hours)
    pub const ROLLING_WINDOW_HOURS: usize = 6;
    /// Largest gap to the previous row for the torque-speed gradient (hours)
    pub const GRADIENT_MAX_GAP_HOURS: i64 = 1;
    /// Upper limit accepted for the gradient gap setting (one year of hours)
    pub const MAX_GRADIENT_GAP_HOURS: i64 = 8760;
}

/// Evaluation defaults
pub mod evaluation_defaults {
    /// Held-out fraction for the test partition
    pub const TEST_FRACTION: f64 = 0.2;
    /// Split seed so repeated runs are identical
    pub const SPLIT_SEED: u64 = 42;
    /// Minimum complete rows for a meaningful split/fit
    pub const MIN_ROWS: usize = 100;
}
