//! Turbine Twin - Wind turbine SCADA anomaly scoring
//!
//! Loads hourly turbine and weather CSV exports, cleans them, derives physics
//! features, compares model families and reports the observations whose
//! residual exceeds the configured threshold.
//!
//! # Usage
//!
//! ```bash
//! # Generate a demo dataset
//! synthesize --out data/
//!
//! # Run the pipeline and write the JSON report
//! turbine-twin --weather data/weather.csv \
//!     --turbine T01=data/T01.csv --turbine T02=data/T02.csv \
//!     --output report.json
//!
//! # Show the effective configuration
//! turbine-twin print-config
//! ```
//!
//! # Environment Variables
//!
//! - `TWIN_CONFIG`: Path to the TOML config (default: ./twin_config.toml)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};
use turbine_twin::pipeline::FamilyOutcome;
use turbine_twin::{CsvSource, TurbineId, TwinConfig};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "turbine-twin")]
#[command(about = "Wind turbine SCADA cleaning, modelling and residual anomaly scoring")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config (overrides TWIN_CONFIG and ./twin_config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Weather station CSV shared by all turbines
    #[arg(long, value_name = "PATH")]
    weather: Option<PathBuf>,

    /// Turbine CSV as ID=PATH; repeat for each turbine
    #[arg(long = "turbine", value_name = "ID=PATH", value_parser = parse_turbine_arg)]
    turbines: Vec<(TurbineId, PathBuf)>,

    /// Write the JSON report here instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Print the effective configuration as TOML
    PrintConfig,
}

fn parse_turbine_arg(s: &str) -> Result<(TurbineId, PathBuf), String> {
    let (id, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=PATH, got '{s}'"))?;
    let id = id.trim();
    if id.is_empty() || path.trim().is_empty() {
        return Err(format!("expected ID=PATH, got '{s}'"));
    }
    Ok((TurbineId::new(id), PathBuf::from(path.trim())))
}

fn load_config(path: Option<&PathBuf>) -> Result<TwinConfig> {
    match path {
        Some(p) => TwinConfig::load_from_file(p)
            .with_context(|| format!("Failed to load config {}", p.display())),
        None => Ok(TwinConfig::load()),
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let config = load_config(args.config.as_ref())?;

    if let Some(SubCommand::PrintConfig) = args.command {
        print!("{}", config.to_toml().context("Failed to serialize config")?);
        return Ok(());
    }

    let Some(weather) = args.weather else {
        bail!("--weather is required to run the pipeline");
    };
    if args.turbines.is_empty() {
        bail!("at least one --turbine ID=PATH is required");
    }

    info!(
        turbine = %config.turbine.model,
        turbines = args.turbines.len(),
        experiments = config.experiments.len(),
        "Starting turbine twin run"
    );

    let source = CsvSource::new(weather, args.turbines);
    let report = turbine_twin::run(&source, &config).context("Pipeline run failed")?;

    for experiment in &report.experiments {
        if let Some(error) = &experiment.error {
            warn!(experiment = %experiment.name, "Skipped: {}", error);
            continue;
        }
        for outcome in &experiment.families {
            match outcome {
                FamilyOutcome::Fitted(m) => info!(
                    experiment = %experiment.name,
                    family = %m.family,
                    train_r2 = m.metrics.get("train.r2").copied().unwrap_or(f64::NAN),
                    test_r2 = m.metrics.get("test.r2").copied().unwrap_or(f64::NAN),
                    "Model scored"
                ),
                FamilyOutcome::Failed { family, error } => {
                    warn!(experiment = %experiment.name, family = %family, "Failed: {}", error);
                }
            }
        }
        info!(
            experiment = %experiment.name,
            best = experiment.best_family.as_deref().unwrap_or("none"),
            anomalies = experiment.anomalies.len(),
            "Experiment complete"
        );
    }

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    match args.output {
        Some(path) => {
            fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
