use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_MATCH_TOLERANCE_ARCSEC, DEFAULT_MAX_ENSEMBLE_SIZE, DEFAULT_MIN_PRESENCE,
    DEFAULT_REJECT_SIGMA, DEFAULT_VARIABILITY_MULTIPLIER,
};
use crate::frame::SkyPosition;

/// Configuration for comparison-star selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonParams {
    /// Minimum fraction of frames (0..=1) a candidate must be detected in.
    #[serde(default = "default_min_presence")]
    pub min_presence: f64,
    /// Ensemble growth keeps adding stars, improvement or not, until this size.
    #[serde(default = "default_min_ensemble_size")]
    pub min_ensemble_size: usize,
    #[serde(default = "default_max_ensemble_size")]
    pub max_ensemble_size: usize,
    /// Candidates above `median + reject_sigma * std` variability are rejected.
    #[serde(default = "default_reject_sigma")]
    pub reject_sigma: f64,
    /// Candidates above `variability_multiplier * lowest variability` never
    /// join the ensemble.
    #[serde(default = "default_variability_multiplier")]
    pub variability_multiplier: f64,
    /// Stop growing once the members' reference-frame counts reach this.
    #[serde(default)]
    pub target_counts: Option<f64>,
    /// Stars this close to the target are never candidates.
    #[serde(default)]
    pub target_exclusion_arcsec: f64,
    /// Known variables or otherwise unwanted positions.
    #[serde(default)]
    pub excluded: Vec<SkyPosition>,
    /// Radius around each `excluded` position.
    #[serde(default = "default_exclusion_radius")]
    pub exclusion_radius_arcsec: f64,
}

fn default_min_presence() -> f64 {
    DEFAULT_MIN_PRESENCE
}
fn default_min_ensemble_size() -> usize {
    1
}
fn default_max_ensemble_size() -> usize {
    DEFAULT_MAX_ENSEMBLE_SIZE
}
fn default_reject_sigma() -> f64 {
    DEFAULT_REJECT_SIGMA
}
fn default_variability_multiplier() -> f64 {
    DEFAULT_VARIABILITY_MULTIPLIER
}
fn default_exclusion_radius() -> f64 {
    DEFAULT_MATCH_TOLERANCE_ARCSEC
}

impl Default for ComparisonParams {
    fn default() -> Self {
        Self {
            min_presence: DEFAULT_MIN_PRESENCE,
            min_ensemble_size: 1,
            max_ensemble_size: DEFAULT_MAX_ENSEMBLE_SIZE,
            reject_sigma: DEFAULT_REJECT_SIGMA,
            variability_multiplier: DEFAULT_VARIABILITY_MULTIPLIER,
            target_counts: None,
            target_exclusion_arcsec: 0.0,
            excluded: Vec::new(),
            exclusion_radius_arcsec: DEFAULT_MATCH_TOLERANCE_ARCSEC,
        }
    }
}
