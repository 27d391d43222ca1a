use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use transit_core::pipeline::{run_pipeline_reported, PipelineConfig};
use transit_core::target::TargetConfig;

use super::read_config;
use crate::progress::BarReporter;
use crate::summary::{
    print_ensemble_summary, print_light_curve_summary, print_matching_summary,
    print_period_summary, print_pipeline_summary,
};

#[derive(Args)]
pub struct RunArgs {
    /// Photometry table files or directories of them
    pub inputs: Vec<PathBuf>,

    /// Pipeline config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Work directory holding the artifacts
    #[arg(short, long)]
    pub work_dir: Option<PathBuf>,

    /// Target right ascension in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub ra: Option<f64>,

    /// Target declination in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub dec: Option<f64>,

    /// Matching radius in arcseconds
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Shortest trial period in days
    #[arg(long)]
    pub min_period: Option<f64>,

    /// Longest trial period in days
    #[arg(long)]
    pub max_period: Option<f64>,

    /// Comma-separated transit durations as fractions of the period
    #[arg(long, value_delimiter = ',')]
    pub durations: Vec<f64>,

    /// Continue after the last completed stage
    #[arg(long)]
    pub resume: bool,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let mut config = match args.config {
        Some(ref path) => read_config(path)?,
        None => match (args.ra, args.dec) {
            (Some(ra), Some(dec)) => PipelineConfig::new("transit-work", TargetConfig::new(ra, dec)),
            _ => bail!("Target position required: pass --ra and --dec or --config"),
        },
    };
    apply_overrides(&mut config, args);

    print_pipeline_summary(&config);

    let reporter = Arc::new(BarReporter::new()?);
    let output = match run_pipeline_reported(&config, reporter.clone()) {
        Ok(output) => output,
        Err(e) => {
            reporter.abandon();
            return Err(e.into());
        }
    };
    reporter.finish();

    print_matching_summary(&output.matched);
    print_ensemble_summary(&output.ensemble);
    print_light_curve_summary(&output.light_curve);
    print_period_summary(&output.periodogram, 5);
    println!("\nArtifacts saved to {}", config.work_dir.display());
    Ok(())
}

fn apply_overrides(config: &mut PipelineConfig, args: &RunArgs) {
    if !args.inputs.is_empty() {
        config.inputs = args.inputs.clone();
    }
    if let Some(ref dir) = args.work_dir {
        config.work_dir = dir.clone();
    }
    if let Some(ra) = args.ra {
        config.target.ra = ra;
    }
    if let Some(dec) = args.dec {
        config.target.dec = dec;
    }
    if let Some(tolerance) = args.tolerance {
        config.matching.tolerance_arcsec = tolerance;
    }
    if args.min_period.is_some() {
        config.period_search.min_period = args.min_period;
    }
    if args.max_period.is_some() {
        config.period_search.max_period = args.max_period;
    }
    if !args.durations.is_empty() {
        config.period_search.durations = args.durations.clone();
    }
    if args.resume {
        config.resume = true;
    }
}
