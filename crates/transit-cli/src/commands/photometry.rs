use anyhow::{Context, Result};
use clap::Args;
use transit_core::pipeline::config::validate_photometry;
use transit_core::pipeline::run_photometry_stage;

use super::StageArgs;
use crate::progress::BarReporter;
use crate::summary::print_light_curve_summary;

#[derive(Args)]
pub struct PhotometryArgs {
    #[command(flatten)]
    pub stage: StageArgs,

    /// Centre the light curve on the mean of the first N points
    #[arg(long)]
    pub zero_point_frames: Option<usize>,
}

pub fn run(args: &PhotometryArgs) -> Result<()> {
    let mut params = args
        .stage
        .load_config()?
        .map(|c| c.photometry)
        .unwrap_or_default();
    if args.zero_point_frames.is_some() {
        params.zero_point_frames = args.zero_point_frames;
    }
    validate_photometry(&params)?;

    let store = args.stage.store()?;
    let matched = store
        .load_matched_stars()
        .context("No matched stars in the work directory; run `transit match` first")?;
    let ensemble = store
        .load_ensemble()
        .context("No comparison ensemble in the work directory; run `transit compare` first")?;

    let reporter = BarReporter::new()?;
    let curve = match run_photometry_stage(&store, &matched, &ensemble, &params, &reporter) {
        Ok(curve) => curve,
        Err(e) => {
            reporter.abandon();
            return Err(e.into());
        }
    };
    reporter.finish();

    print_light_curve_summary(&curve);
    Ok(())
}
