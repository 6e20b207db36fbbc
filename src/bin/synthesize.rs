//! Synthetic SCADA Dataset Writer
//!
//! Writes a seeded four-turbine hourly dataset as CSVs in the layout the
//! `turbine-twin` CLI reads: one `TNN.csv` per turbine plus `weather.csv`.
//! The injected anomalies are listed in `anomalies.csv` for checking reports
//! against ground truth.
//!
//! # Usage
//! ```bash
//! ./synthesize --out data/ --seed 7 --hours 720
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use turbine_twin::acquisition::synthetic::turbine_name;
use turbine_twin::acquisition::{
    generate, write_mechanical_csv, write_weather_csv, MechanicalRow, SyntheticConfig,
};
use turbine_twin::config::defaults::{SYNTHETIC_HOURS, SYNTHETIC_SEED};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "synthesize")]
#[command(about = "Synthetic wind turbine SCADA dataset for turbine-twin demos")]
#[command(version)]
struct Args {
    /// Output directory (created if missing)
    #[arg(long)]
    out: PathBuf,

    /// Random seed for reproducibility
    #[arg(long, default_value_t = SYNTHETIC_SEED)]
    seed: u64,

    /// Number of hourly rows per turbine
    #[arg(long, default_value_t = SYNTHETIC_HOURS)]
    hours: usize,

    /// Number of turbines
    #[arg(long, default_value_t = 4)]
    turbines: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = SyntheticConfig {
        seed: args.seed,
        hours: args.hours,
        turbines: args.turbines,
        ..Default::default()
    };
    let dataset = generate(&config).context("Failed to generate dataset")?;

    fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create {}", args.out.display()))?;

    for i in 0..config.turbines {
        let id = turbine_name(i);
        let rows: Vec<MechanicalRow> = dataset
            .source
            .mechanical
            .iter()
            .filter(|r| r.turbine_id == id)
            .cloned()
            .collect();
        let path = args.out.join(format!("{id}.csv"));
        write_mechanical_csv(&path, &rows)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(turbine = %id, rows = rows.len(), path = %path.display(), "Turbine CSV written");
    }

    let weather_path = args.out.join("weather.csv");
    write_weather_csv(&weather_path, &dataset.source.weather)
        .with_context(|| format!("Failed to write {}", weather_path.display()))?;

    let mut truth = String::from("turbine_id,timestamp\n");
    for (turbine, at) in &dataset.anomalies {
        truth.push_str(&format!("{},{}\n", turbine, at.format("%Y-%m-%d %H:%M:%S")));
    }
    let truth_path = args.out.join("anomalies.csv");
    fs::write(&truth_path, truth)
        .with_context(|| format!("Failed to write {}", truth_path.display()))?;

    info!(
        out = %args.out.display(),
        turbines = config.turbines,
        hours = config.hours,
        anomalies = dataset.anomalies.len(),
        faults = dataset.faults,
        "Synthetic dataset written"
    );
    Ok(())
}
