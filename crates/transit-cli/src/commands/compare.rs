use anyhow::{Context, Result};
use clap::Args;
use transit_core::frame::SkyPosition;
use transit_core::pipeline::config::{validate_comparison, validate_target};
use transit_core::pipeline::run_comparison_stage;
use transit_core::target::TargetConfig;

use super::{parse_sky_position, StageArgs};
use crate::progress::BarReporter;
use crate::summary::print_ensemble_summary;

#[derive(Args)]
pub struct CompareArgs {
    #[command(flatten)]
    pub stage: StageArgs,

    /// Target right ascension in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub ra: Option<f64>,

    /// Target declination in decimal degrees
    #[arg(long, allow_hyphen_values = true)]
    pub dec: Option<f64>,

    /// Target identification radius in arcseconds
    #[arg(long)]
    pub target_tolerance: Option<f64>,

    /// Use this matched star id as the target instead of RA/Dec
    #[arg(long)]
    pub target_id: Option<usize>,

    /// Minimum fraction of frames a comparison star must appear in (0-1)
    #[arg(long)]
    pub min_presence: Option<f64>,

    /// Maximum number of comparison stars
    #[arg(long)]
    pub max_stars: Option<usize>,

    /// Position (RA,DEC) of a known variable to keep out of the ensemble;
    /// may be repeated
    #[arg(long, value_parser = parse_sky_position)]
    pub exclude: Vec<SkyPosition>,
}

pub fn run(args: &CompareArgs) -> Result<()> {
    let config = args.stage.load_config()?;
    let mut params = config
        .as_ref()
        .map(|c| c.comparison.clone())
        .unwrap_or_default();
    if let Some(presence) = args.min_presence {
        params.min_presence = presence;
    }
    if let Some(max) = args.max_stars {
        params.max_ensemble_size = max;
    }
    params.excluded.extend(args.exclude.iter().copied());

    let mut target = match (args.ra, args.dec, config.map(|c| c.target)) {
        (Some(ra), Some(dec), _) => TargetConfig::new(ra, dec),
        (_, _, Some(target)) => target,
        // Any valid coordinate; the id lookup ignores it.
        _ if args.target_id.is_some() => TargetConfig::new(0.0, 0.0),
        _ => anyhow::bail!("Target required: pass --ra and --dec, --target-id, or --config"),
    };
    if args.target_id.is_some() {
        target.star_id = args.target_id;
    }
    if let Some(tolerance) = args.target_tolerance {
        target.tolerance_arcsec = tolerance;
    }
    validate_target(&target)?;
    validate_comparison(&params)?;

    let store = args.stage.store()?;
    let matched = store
        .load_matched_stars()
        .context("No matched stars in the work directory; run `transit match` first")?;

    let reporter = BarReporter::new()?;
    let ensemble = match run_comparison_stage(&store, &matched, &target, &params, &reporter) {
        Ok(ensemble) => ensemble,
        Err(e) => {
            reporter.abandon();
            return Err(e.into());
        }
    };
    reporter.finish();

    print_ensemble_summary(&ensemble);
    Ok(())
}
