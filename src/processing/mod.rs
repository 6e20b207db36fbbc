//! Data cleaning module - parametric truncation of sensor faults and outliers

mod cleaner;

pub use cleaner::{
    clean, default_bound_specs, resolve_bounds, BoundSpec, Bounds, CleanedTable, CleaningReport,
    Interval,
};
