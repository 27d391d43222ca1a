use std::sync::Arc;

use tracing::{info, warn};

use crate::catalog::{FrameCatalog, FrameWarning};
use crate::comparison::{select_comparison_stars, ComparisonEnsemble, ComparisonParams};
use crate::error::Result;
use crate::frame::Frame;
use crate::io::artifact::{artifact_file, ArtifactStore};
use crate::io::photometry::{load_frames, resolve_inputs};
use crate::matching::{match_stars_with_progress, MatchedStars, MatchingParams};
use crate::period::{period_grid, search_period_with_progress, PeriodSearchParams, Periodogram};
use crate::photometry::{compute_light_curve, LightCurve, PhotometryParams};
use crate::target::{resolve_target, TargetConfig};

use super::config::PipelineConfig;
use super::types::{NoOpReporter, PipelineOutput, PipelineStage, ProgressReporter, RunState};

/// Record `stage` as the last completed one. Called only after its artifact
/// has been written.
fn mark_complete(store: &ArtifactStore, stage: PipelineStage) -> Result<()> {
    store.save_run_state(&RunState {
        last_completed: Some(stage),
    })?;
    Ok(())
}

/// Catalog and match frames, then write `matched_stars.json`.
///
/// `load_warnings` are problems met while reading the frames; they are
/// carried into the artifact alongside the catalog and matching warnings.
pub fn run_matching_stage(
    store: &ArtifactStore,
    frames: Vec<Frame>,
    load_warnings: Vec<FrameWarning>,
    params: &MatchingParams,
    reporter: &dyn ProgressReporter,
) -> Result<MatchedStars> {
    let stage = PipelineStage::Matching;
    let mut catalog = FrameCatalog::build(frames);
    let mut warnings = load_warnings;
    warnings.append(&mut catalog.warnings);
    catalog.warnings = warnings;

    reporter.begin_stage(stage, Some(catalog.len()));
    let matched = match_stars_with_progress(&catalog, params, |done| reporter.advance(done))
        .map_err(|e| e.in_stage(stage))?;
    store.save_matched_stars(&matched)?;
    mark_complete(store, stage)?;
    reporter.finish_stage();
    Ok(matched)
}

/// Identify the target and choose its comparison ensemble, then write
/// `comparison_ensemble.json`.
pub fn run_comparison_stage(
    store: &ArtifactStore,
    matched: &MatchedStars,
    target: &TargetConfig,
    params: &ComparisonParams,
    reporter: &dyn ProgressReporter,
) -> Result<ComparisonEnsemble> {
    let stage = PipelineStage::ComparisonSelection;
    reporter.begin_stage(stage, None);
    let ensemble = resolve_target(matched, target)
        .and_then(|star| select_comparison_stars(matched, &star, params))
        .map_err(|e| e.in_stage(stage))?;
    store.save_ensemble(&ensemble)?;
    mark_complete(store, stage)?;
    reporter.finish_stage();
    Ok(ensemble)
}

/// Compute the differential light curve, then write `light_curve.json`.
pub fn run_photometry_stage(
    store: &ArtifactStore,
    matched: &MatchedStars,
    ensemble: &ComparisonEnsemble,
    params: &PhotometryParams,
    reporter: &dyn ProgressReporter,
) -> Result<LightCurve> {
    let stage = PipelineStage::Photometry;
    reporter.begin_stage(stage, Some(matched.frame_count()));
    let curve =
        compute_light_curve(matched, ensemble, params).map_err(|e| e.in_stage(stage))?;
    store.save_light_curve(&curve)?;
    mark_complete(store, stage)?;
    reporter.finish_stage();
    Ok(curve)
}

/// Run the box least squares search, then write `periodogram.json`.
pub fn run_period_stage(
    store: &ArtifactStore,
    curve: &LightCurve,
    params: &PeriodSearchParams,
    reporter: &dyn ProgressReporter,
) -> Result<Periodogram> {
    let stage = PipelineStage::PeriodSearch;
    let total = period_grid(&curve.times(), params).ok().map(|g| g.len());
    reporter.begin_stage(stage, total);
    let periodogram = search_period_with_progress(curve, params, |done| reporter.advance(done))
        .map_err(|e| e.in_stage(stage))?;
    store.save_periodogram(&periodogram)?;
    mark_complete(store, stage)?;
    reporter.finish_stage();
    Ok(periodogram)
}

/// Run the full pipeline, reading the configured input tables.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineOutput> {
    run_pipeline_reported(config, Arc::new(NoOpReporter))
}

/// Run the full pipeline with a thread-safe progress reporter.
pub fn run_pipeline_reported(
    config: &PipelineConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<PipelineOutput> {
    run_stages(config, None, reporter)
}

/// Run the full pipeline on frames already in memory. `config.inputs` is
/// ignored.
pub fn run_pipeline_on_frames(
    config: &PipelineConfig,
    frames: Vec<Frame>,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<PipelineOutput> {
    run_stages(config, Some(frames), reporter)
}

/// Whether `stage` can be taken from the work directory instead of rerun.
fn reusable(store: &ArtifactStore, state: &RunState, stage: PipelineStage, resume: bool) -> bool {
    resume && state.is_complete(stage) && store.exists(artifact_file(stage))
}

fn run_stages(
    config: &PipelineConfig,
    frames: Option<Vec<Frame>>,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<PipelineOutput> {
    config.validate()?;
    let store = ArtifactStore::open(&config.work_dir)?;
    let reporter = reporter.as_ref();

    let state = if config.resume {
        store.load_run_state()?
    } else {
        let fresh = RunState::default();
        store.save_run_state(&fresh)?;
        fresh
    };
    info!(
        work_dir = %config.work_dir.display(),
        resume = config.resume,
        next = ?state.next_stage(),
        "Starting pipeline"
    );

    // Once a stage reruns, everything downstream of it reruns too.
    let mut resume = config.resume;

    let matched = if reusable(&store, &state, PipelineStage::Matching, resume) {
        reporter.skip_stage(PipelineStage::Matching);
        store.load_matched_stars()?
    } else {
        resume = false;
        let (frames, load_warnings) = match frames {
            Some(frames) => (frames, Vec::new()),
            None => {
                let paths = resolve_inputs(&config.inputs)?;
                if paths.is_empty() {
                    warn!("No photometry tables found in the configured inputs");
                }
                load_frames(&paths)
            }
        };
        run_matching_stage(&store, frames, load_warnings, &config.matching, reporter)?
    };

    let ensemble = if reusable(&store, &state, PipelineStage::ComparisonSelection, resume) {
        reporter.skip_stage(PipelineStage::ComparisonSelection);
        store.load_ensemble()?
    } else {
        resume = false;
        run_comparison_stage(&store, &matched, &config.target, &config.comparison, reporter)?
    };

    let light_curve = if reusable(&store, &state, PipelineStage::Photometry, resume) {
        reporter.skip_stage(PipelineStage::Photometry);
        store.load_light_curve()?
    } else {
        resume = false;
        run_photometry_stage(&store, &matched, &ensemble, &config.photometry, reporter)?
    };

    let periodogram = if reusable(&store, &state, PipelineStage::PeriodSearch, resume) {
        reporter.skip_stage(PipelineStage::PeriodSearch);
        store.load_periodogram()?
    } else {
        run_period_stage(&store, &light_curve, &config.period_search, reporter)?
    };

    info!(
        stars = matched.stars.len(),
        members = ensemble.members.len(),
        points = light_curve.len(),
        best_period = periodogram.best.period,
        "Pipeline complete"
    );
    Ok(PipelineOutput {
        matched,
        ensemble,
        light_curve,
        periodogram,
    })
}
