use anyhow::{Context, Result};
use clap::Args;
use transit_core::pipeline::config::validate_period_search;
use transit_core::pipeline::run_period_stage;

use super::StageArgs;
use crate::progress::BarReporter;
use crate::summary::print_period_summary;

#[derive(Args)]
pub struct PeriodArgs {
    #[command(flatten)]
    pub stage: StageArgs,

    /// Shortest trial period in days
    #[arg(long)]
    pub min_period: Option<f64>,

    /// Longest trial period in days
    #[arg(long)]
    pub max_period: Option<f64>,

    /// Comma-separated transit durations as fractions of the period
    #[arg(long, value_delimiter = ',')]
    pub durations: Vec<f64>,

    /// Number of phase bins
    #[arg(long)]
    pub phase_bins: Option<usize>,

    /// Print the N strongest periods
    #[arg(long, default_value = "5")]
    pub top: usize,
}

pub fn run(args: &PeriodArgs) -> Result<()> {
    let mut params = args
        .stage
        .load_config()?
        .map(|c| c.period_search)
        .unwrap_or_default();
    if args.min_period.is_some() {
        params.min_period = args.min_period;
    }
    if args.max_period.is_some() {
        params.max_period = args.max_period;
    }
    if !args.durations.is_empty() {
        params.durations = args.durations.clone();
    }
    if let Some(bins) = args.phase_bins {
        params.phase_bins = bins;
    }
    validate_period_search(&params)?;

    let store = args.stage.store()?;
    let curve = store
        .load_light_curve()
        .context("No light curve in the work directory; run `transit photometry` first")?;

    let reporter = BarReporter::new()?;
    let periodogram = match run_period_stage(&store, &curve, &params, &reporter) {
        Ok(periodogram) => periodogram,
        Err(e) => {
            reporter.abandon();
            return Err(e.into());
        }
    };
    reporter.finish();

    print_period_summary(&periodogram, args.top);
    Ok(())
}
