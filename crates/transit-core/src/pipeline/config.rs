use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::comparison::ComparisonParams;
use crate::error::{Result, TransitError};
use crate::matching::MatchingParams;
use crate::period::PeriodSearchParams;
use crate::photometry::PhotometryParams;
use crate::target::TargetConfig;

/// Complete configuration of a pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding the artifacts and run state.
    pub work_dir: PathBuf,
    /// Photometry table files, or directories of them.
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    /// Continue after the last completed stage instead of starting over.
    #[serde(default)]
    pub resume: bool,
    pub target: TargetConfig,
    #[serde(default)]
    pub matching: MatchingParams,
    #[serde(default)]
    pub comparison: ComparisonParams,
    #[serde(default)]
    pub photometry: PhotometryParams,
    #[serde(default)]
    pub period_search: PeriodSearchParams,
}

impl PipelineConfig {
    pub fn new(work_dir: impl Into<PathBuf>, target: TargetConfig) -> Self {
        Self {
            work_dir: work_dir.into(),
            inputs: Vec::new(),
            resume: false,
            target,
            matching: MatchingParams::default(),
            comparison: ComparisonParams::default(),
            photometry: PhotometryParams::default(),
            period_search: PeriodSearchParams::default(),
        }
    }

    /// Check every option against its valid range.
    pub fn validate(&self) -> Result<()> {
        validate_target(&self.target)?;
        validate_matching(&self.matching)?;
        validate_comparison(&self.comparison)?;
        validate_photometry(&self.photometry)?;
        validate_period_search(&self.period_search)
    }
}

fn invalid(message: impl Into<String>) -> Result<()> {
    Err(TransitError::InvalidConfig(message.into()))
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

pub fn validate_target(target: &TargetConfig) -> Result<()> {
    if !target.ra.is_finite() || !(0.0..360.0).contains(&target.ra) {
        return invalid(format!("target.ra {} is outside [0, 360)", target.ra));
    }
    if !target.dec.is_finite() || !(-90.0..=90.0).contains(&target.dec) {
        return invalid(format!("target.dec {} is outside [-90, 90]", target.dec));
    }
    if !positive(target.tolerance_arcsec) {
        return invalid("target.tolerance_arcsec must be positive");
    }
    Ok(())
}

pub fn validate_matching(params: &MatchingParams) -> Result<()> {
    if !positive(params.tolerance_arcsec) {
        return invalid("matching.tolerance_arcsec must be positive");
    }
    if params.min_frames == 0 {
        return invalid("matching.min_frames must be at least 1");
    }
    if params.min_stars == 0 {
        return invalid("matching.min_stars must be at least 1");
    }
    Ok(())
}

pub fn validate_comparison(params: &ComparisonParams) -> Result<()> {
    if !params.min_presence.is_finite() || params.min_presence <= 0.0 || params.min_presence > 1.0
    {
        return invalid("comparison.min_presence must be in (0, 1]");
    }
    if params.min_ensemble_size == 0 {
        return invalid("comparison.min_ensemble_size must be at least 1");
    }
    if params.max_ensemble_size < params.min_ensemble_size {
        return invalid("comparison.max_ensemble_size is below min_ensemble_size");
    }
    if !positive(params.reject_sigma) {
        return invalid("comparison.reject_sigma must be positive");
    }
    if !params.variability_multiplier.is_finite() || params.variability_multiplier < 1.0 {
        return invalid("comparison.variability_multiplier must be at least 1");
    }
    if params.target_counts.is_some_and(|c| !positive(c)) {
        return invalid("comparison.target_counts must be positive");
    }
    if !params.target_exclusion_arcsec.is_finite() || params.target_exclusion_arcsec < 0.0 {
        return invalid("comparison.target_exclusion_arcsec must be non-negative");
    }
    if !params.exclusion_radius_arcsec.is_finite() || params.exclusion_radius_arcsec < 0.0 {
        return invalid("comparison.exclusion_radius_arcsec must be non-negative");
    }
    if params.excluded.iter().any(|p| !p.is_finite()) {
        return invalid("comparison.excluded contains a non-finite position");
    }
    Ok(())
}

pub fn validate_photometry(params: &PhotometryParams) -> Result<()> {
    if params.zero_point_frames == Some(0) {
        return invalid("photometry.zero_point_frames must be at least 1");
    }
    Ok(())
}

pub fn validate_period_search(params: &PeriodSearchParams) -> Result<()> {
    if params.min_period.is_some_and(|p| !positive(p)) {
        return invalid("period_search.min_period must be positive");
    }
    if params.max_period.is_some_and(|p| !positive(p)) {
        return invalid("period_search.max_period must be positive");
    }
    if let (Some(min), Some(max)) = (params.min_period, params.max_period) {
        if min >= max {
            return invalid("period_search.min_period must be below max_period");
        }
    }
    if params.durations.is_empty() {
        return invalid("period_search.durations must not be empty");
    }
    if params
        .durations
        .iter()
        .any(|q| !q.is_finite() || *q <= 0.0 || *q >= 1.0)
    {
        return invalid("period_search.durations must be fractions in (0, 1)");
    }
    if params.phase_bins < 2 {
        return invalid("period_search.phase_bins must be at least 2");
    }
    if !positive(params.oversample) {
        return invalid("period_search.oversample must be positive");
    }
    if params.max_periods < 2 {
        return invalid("period_search.max_periods must be at least 2");
    }
    if params.min_in_transit_points == 0 {
        return invalid("period_search.min_in_transit_points must be at least 1");
    }
    Ok(())
}
