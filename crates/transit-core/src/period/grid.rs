use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{
    DEFAULT_DURATION_FRACTIONS, DEFAULT_MAX_PERIODS, DEFAULT_MIN_IN_TRANSIT_POINTS,
    DEFAULT_PERIOD_OVERSAMPLE, DEFAULT_PHASE_BINS,
};
use crate::error::{Result, TransitError};
use crate::stats::median;

/// Configuration for the box least squares period search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeriodSearchParams {
    /// Shortest trial period in days. Defaults to the median spacing
    /// between observations.
    #[serde(default)]
    pub min_period: Option<f64>,
    /// Longest trial period in days. Defaults to half the baseline.
    #[serde(default)]
    pub max_period: Option<f64>,
    /// Transit durations to try, as fractions of the period.
    #[serde(default = "default_durations")]
    pub durations: Vec<f64>,
    #[serde(default = "default_phase_bins")]
    pub phase_bins: usize,
    /// Frequency grid oversampling relative to the shortest duration.
    #[serde(default = "default_oversample")]
    pub oversample: f64,
    /// Upper bound on the number of trial periods.
    #[serde(default = "default_max_periods")]
    pub max_periods: usize,
    #[serde(default = "default_min_in_transit_points")]
    pub min_in_transit_points: usize,
}

fn default_durations() -> Vec<f64> {
    DEFAULT_DURATION_FRACTIONS.to_vec()
}
fn default_phase_bins() -> usize {
    DEFAULT_PHASE_BINS
}
fn default_oversample() -> f64 {
    DEFAULT_PERIOD_OVERSAMPLE
}
fn default_max_periods() -> usize {
    DEFAULT_MAX_PERIODS
}
fn default_min_in_transit_points() -> usize {
    DEFAULT_MIN_IN_TRANSIT_POINTS
}

impl Default for PeriodSearchParams {
    fn default() -> Self {
        Self {
            min_period: None,
            max_period: None,
            durations: default_durations(),
            phase_bins: DEFAULT_PHASE_BINS,
            oversample: DEFAULT_PERIOD_OVERSAMPLE,
            max_periods: DEFAULT_MAX_PERIODS,
            min_in_transit_points: DEFAULT_MIN_IN_TRANSIT_POINTS,
        }
    }
}

/// Median spacing between consecutive distinct times (sorted input).
fn median_spacing(times: &[f64]) -> f64 {
    let gaps: Vec<f64> = times
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|g| *g > 0.0)
        .collect();
    if gaps.is_empty() {
        f64::NAN
    } else {
        median(&gaps)
    }
}

/// Trial periods, uniform in frequency, in ascending order.
///
/// `times` must be sorted. The frequency step is
/// `min(durations) / (baseline * oversample)`, widened when needed so the
/// grid holds at most `max_periods` entries.
pub fn period_grid(times: &[f64], params: &PeriodSearchParams) -> Result<Vec<f64>> {
    let (Some(&first), Some(&last)) = (times.first(), times.last()) else {
        return Err(TransitError::PeriodSearch("no observations".into()));
    };
    let baseline = last - first;
    if !(baseline > 0.0) {
        return Err(TransitError::PeriodSearch(format!(
            "baseline {baseline} days is not positive"
        )));
    }

    let min_period = params.min_period.unwrap_or_else(|| median_spacing(times));
    let max_period = params.max_period.unwrap_or(baseline / 2.0);
    if !min_period.is_finite() || !max_period.is_finite() || min_period <= 0.0 {
        return Err(TransitError::PeriodSearch(format!(
            "invalid period range {min_period}..{max_period}"
        )));
    }
    if min_period >= max_period {
        return Err(TransitError::PeriodSearch(format!(
            "minimum period {min_period} is not below maximum period {max_period}"
        )));
    }

    let shortest = params
        .durations
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    let f_min = 1.0 / max_period;
    let f_max = 1.0 / min_period;
    let span = f_max - f_min;
    let mut step = shortest / (baseline * params.oversample);
    let mut count = (span / step).floor() as usize + 1;
    if count > params.max_periods {
        count = params.max_periods.max(2);
        step = span / (count - 1) as f64;
    }

    debug!(
        min_period,
        max_period,
        periods = count,
        frequency_step = step,
        "Period grid"
    );
    let mut periods: Vec<f64> = (0..count)
        .map(|k| 1.0 / (f_min + k as f64 * step))
        .filter(|p| *p >= min_period && *p <= max_period)
        .collect();
    periods.reverse();
    Ok(periods)
}
