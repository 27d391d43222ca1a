use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use transit_core::io::artifact::{
    COMPARISON_ENSEMBLE_FILE, LIGHT_CURVE_FILE, MATCHED_STARS_FILE, PERIODOGRAM_FILE,
};
use transit_core::io::ArtifactStore;

use crate::summary::{
    print_ensemble_summary, print_light_curve_summary, print_matching_summary,
    print_period_summary,
};

#[derive(Args)]
pub struct InfoArgs {
    /// Work directory
    #[arg(default_value = "transit-work")]
    pub work_dir: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    if !args.work_dir.is_dir() {
        anyhow::bail!("{} is not a directory", args.work_dir.display());
    }
    let store = ArtifactStore::open(&args.work_dir)?;
    let state = store.load_run_state().context("Unreadable run state")?;

    println!("Work dir:    {}", store.dir().display());
    match state.last_completed {
        Some(stage) => println!("Completed:   {}", stage),
        None => println!("Completed:   nothing"),
    }
    if let Some(next) = state.next_stage() {
        println!("Next stage:  {}", next);
    }

    if store.exists(MATCHED_STARS_FILE) {
        print_matching_summary(&store.load_matched_stars()?);
    }
    if store.exists(COMPARISON_ENSEMBLE_FILE) {
        print_ensemble_summary(&store.load_ensemble()?);
    }
    if store.exists(LIGHT_CURVE_FILE) {
        print_light_curve_summary(&store.load_light_curve()?);
    }
    if store.exists(PERIODOGRAM_FILE) {
        print_period_summary(&store.load_periodogram()?, 5);
    }
    Ok(())
}
