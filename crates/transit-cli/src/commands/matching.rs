use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use transit_core::io::photometry::{load_frames, resolve_inputs};
use transit_core::matching::ReferenceFrame;
use transit_core::pipeline::config::validate_matching;
use transit_core::pipeline::run_matching_stage;

use super::StageArgs;
use crate::progress::BarReporter;
use crate::summary::print_matching_summary;

#[derive(Args)]
pub struct MatchArgs {
    /// Photometry table files or directories of them
    pub inputs: Vec<PathBuf>,

    #[command(flatten)]
    pub stage: StageArgs,

    /// Matching radius in arcseconds
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Discard stars matched in fewer frames
    #[arg(long)]
    pub min_frames: Option<usize>,

    /// Seed the star list from this frame (time order) instead of the
    /// frame with the most detections
    #[arg(long)]
    pub reference: Option<usize>,
}

pub fn run(args: &MatchArgs) -> Result<()> {
    let config = args.stage.load_config()?;
    let mut params = config.as_ref().map(|c| c.matching.clone()).unwrap_or_default();
    if let Some(tolerance) = args.tolerance {
        params.tolerance_arcsec = tolerance;
    }
    if let Some(min_frames) = args.min_frames {
        params.min_frames = min_frames;
    }
    if let Some(index) = args.reference {
        params.reference = ReferenceFrame::Index(index);
    }
    validate_matching(&params)?;

    let inputs = if args.inputs.is_empty() {
        config.map(|c| c.inputs).unwrap_or_default()
    } else {
        args.inputs.clone()
    };
    let paths = resolve_inputs(&inputs).context("Failed to list input tables")?;
    if paths.is_empty() {
        bail!("No photometry tables given");
    }
    println!("Reading {} photometry table(s)", paths.len());
    let (frames, warnings) = load_frames(&paths);

    let store = args.stage.store()?;
    let reporter = BarReporter::new()?;
    let matched = match run_matching_stage(&store, frames, warnings, &params, &reporter) {
        Ok(matched) => matched,
        Err(e) => {
            reporter.abandon();
            return Err(e.into());
        }
    };
    reporter.finish();

    print_matching_summary(&matched);
    println!("\nArtifacts saved to {}", store.dir().display());
    Ok(())
}
