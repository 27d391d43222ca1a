use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::consts::{EPSILON, MIN_PERIOD_SEARCH_POINTS};
use crate::error::{Result, TransitError};
use crate::photometry::LightCurve;
use crate::stats::mean_stddev;

use super::grid::{period_grid, PeriodSearchParams};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeriodogramEntry {
    pub period: f64,
    /// Best box statistic at this period; 0 when no window was valid.
    pub statistic: f64,
}

/// Best box-shaped transit found by the search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitCandidate {
    pub period: f64,
    /// Transit duration in days.
    pub duration: f64,
    /// Transit duration as a fraction of the period.
    pub duration_fraction: f64,
    /// Phase of the window start, in [0, 1).
    pub phase: f64,
    /// Time of mid-transit closest after the first observation.
    pub epoch: f64,
    /// Magnitude difference between in-transit and out-of-transit points.
    pub depth: f64,
    pub statistic: f64,
    /// Standard score of the best statistic against the whole periodogram.
    pub significance: f64,
    pub in_transit_points: usize,
}

/// Periodogram artifact: output of the period search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Periodogram {
    /// Ascending by period.
    pub entries: Vec<PeriodogramEntry>,
    pub best: TransitCandidate,
    pub points: usize,
    pub baseline: f64,
}

impl Periodogram {
    pub fn periods(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.period).collect()
    }

    pub fn statistics(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.statistic).collect()
    }
}

/// Best window at a single trial period.
#[derive(Clone, Copy, Debug)]
struct WindowFit {
    start_bin: usize,
    width_bins: usize,
    depth: f64,
    statistic: f64,
    in_points: usize,
}

/// Folded light curve accumulated into phase bins.
struct PhaseBins {
    counts: Vec<usize>,
    weights: Vec<f64>,
    weighted: Vec<f64>,
}

impl PhaseBins {
    fn fold(times: &[f64], values: &[f64], weights: &[f64], t0: f64, period: f64, n: usize) -> Self {
        let mut bins = Self {
            counts: vec![0; n],
            weights: vec![0.0; n],
            weighted: vec![0.0; n],
        };
        for ((&t, &y), &w) in times.iter().zip(values).zip(weights) {
            let phase = ((t - t0) / period).rem_euclid(1.0);
            let b = ((phase * n as f64) as usize).min(n - 1);
            bins.counts[b] += 1;
            bins.weights[b] += w;
            bins.weighted[b] += w * y;
        }
        bins
    }

    /// Prefix sums over the bins repeated twice, so cyclic windows are a
    /// single subtraction.
    fn cyclic_prefix(&self) -> (Vec<usize>, Vec<f64>, Vec<f64>) {
        let n = self.counts.len();
        let mut counts = vec![0usize; 2 * n + 1];
        let mut weights = vec![0.0; 2 * n + 1];
        let mut weighted = vec![0.0; 2 * n + 1];
        for i in 0..2 * n {
            let b = i % n;
            counts[i + 1] = counts[i] + self.counts[b];
            weights[i + 1] = weights[i] + self.weights[b];
            weighted[i + 1] = weighted[i] + self.weighted[b];
        }
        (counts, weights, weighted)
    }
}

fn best_window(bins: &PhaseBins, widths: &[usize], min_in_points: usize) -> Option<WindowFit> {
    let n = bins.counts.len();
    let (counts, weights, weighted) = bins.cyclic_prefix();
    let total_count = counts[n];
    let total_weight = weights[n];
    let total_weighted = weighted[n];

    let mut best: Option<WindowFit> = None;
    for &width in widths {
        for start in 0..n {
            let end = start + width;
            let in_points = counts[end] - counts[start];
            if in_points < min_in_points || in_points >= total_count {
                continue;
            }
            let w_in = weights[end] - weights[start];
            let w_out = total_weight - w_in;
            if w_in <= 0.0 || w_out <= EPSILON {
                continue;
            }
            let y_in = (weighted[end] - weighted[start]) / w_in;
            let y_out = (total_weighted - (weighted[end] - weighted[start])) / w_out;
            let depth = y_in - y_out;
            if depth <= 0.0 {
                continue;
            }
            let statistic = depth / (1.0 / w_in + 1.0 / w_out).sqrt();
            if best.map_or(true, |b| statistic > b.statistic) {
                best = Some(WindowFit {
                    start_bin: start,
                    width_bins: width,
                    depth,
                    statistic,
                    in_points,
                });
            }
        }
    }
    best
}

/// Inverse-variance weights, or unit weights when any uncertainty is
/// unusable.
fn point_weights(errors: &[f64]) -> Vec<f64> {
    if errors.iter().all(|e| e.is_finite() && *e > 0.0) {
        errors.iter().map(|e| 1.0 / (e * e)).collect()
    } else {
        debug!("Light curve has unusable uncertainties; using unit weights");
        vec![1.0; errors.len()]
    }
}

/// Window widths in bins for the configured duration fractions.
fn window_widths(params: &PeriodSearchParams) -> Vec<usize> {
    let bins = params.phase_bins;
    let mut widths: Vec<usize> = params
        .durations
        .iter()
        .map(|q| ((q * bins as f64).round() as usize).clamp(1, bins.saturating_sub(1).max(1)))
        .collect();
    widths.sort_unstable();
    widths.dedup();
    widths
}

/// Search the light curve for a periodic box-shaped dimming.
pub fn search_period(curve: &LightCurve, params: &PeriodSearchParams) -> Result<Periodogram> {
    search_period_with_progress(curve, params, |_| {})
}

/// Search the light curve for a periodic box-shaped dimming, calling
/// `on_progress(periods_done)` as trial periods are evaluated.
pub fn search_period_with_progress(
    curve: &LightCurve,
    params: &PeriodSearchParams,
    on_progress: impl Fn(usize) + Send + Sync,
) -> Result<Periodogram> {
    let mut points: Vec<(f64, f64, f64)> = curve
        .points
        .iter()
        .filter(|p| p.time.is_finite() && p.magnitude.is_finite())
        .map(|p| (p.time, p.magnitude, p.magnitude_err))
        .collect();
    if points.len() < MIN_PERIOD_SEARCH_POINTS {
        return Err(TransitError::PeriodSearch(format!(
            "{} light-curve points, need at least {MIN_PERIOD_SEARCH_POINTS}",
            points.len()
        )));
    }
    if params.phase_bins < 2 || params.durations.is_empty() {
        return Err(TransitError::InvalidConfig(
            "period search needs at least two phase bins and one duration".into(),
        ));
    }
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    let times: Vec<f64> = points.iter().map(|p| p.0).collect();
    let values: Vec<f64> = points.iter().map(|p| p.1).collect();
    let errors: Vec<f64> = points.iter().map(|p| p.2).collect();
    let weights = point_weights(&errors);

    let periods = period_grid(&times, params)?;
    let widths = window_widths(params);
    let t0 = times[0];
    let baseline = times[times.len() - 1] - t0;
    info!(
        points = times.len(),
        periods = periods.len(),
        baseline,
        "Running box least squares search"
    );

    let done = AtomicUsize::new(0);
    let fits: Vec<Option<WindowFit>> = periods
        .par_iter()
        .map(|&period| {
            let bins = PhaseBins::fold(&times, &values, &weights, t0, period, params.phase_bins);
            let fit = best_window(&bins, &widths, params.min_in_transit_points);
            on_progress(done.fetch_add(1, Ordering::Relaxed) + 1);
            fit
        })
        .collect();

    let entries: Vec<PeriodogramEntry> = periods
        .iter()
        .zip(&fits)
        .map(|(&period, fit)| PeriodogramEntry {
            period,
            statistic: fit.map_or(0.0, |f| f.statistic),
        })
        .collect();

    let mut best: Option<(usize, WindowFit)> = None;
    for (i, fit) in fits.iter().enumerate() {
        if let Some(fit) = fit {
            if best.map_or(true, |(_, b)| fit.statistic > b.statistic) {
                best = Some((i, *fit));
            }
        }
    }
    let Some((index, fit)) = best else {
        return Err(TransitError::PeriodSearch(
            "no trial period produced a valid transit window".into(),
        ));
    };

    let (mean, std) = mean_stddev(&entries.iter().map(|e| e.statistic).collect::<Vec<_>>());
    let significance = if std > EPSILON {
        (fit.statistic - mean) / std
    } else {
        0.0
    };

    let period = periods[index];
    let bins = params.phase_bins as f64;
    let phase = fit.start_bin as f64 / bins;
    let duration_fraction = fit.width_bins as f64 / bins;
    let mid_phase = (phase + duration_fraction / 2.0).rem_euclid(1.0);
    let candidate = TransitCandidate {
        period,
        duration: duration_fraction * period,
        duration_fraction,
        phase,
        epoch: t0 + mid_phase * period,
        depth: fit.depth,
        statistic: fit.statistic,
        significance,
        in_transit_points: fit.in_points,
    };

    info!(
        period = candidate.period,
        depth = candidate.depth,
        epoch = candidate.epoch,
        significance = candidate.significance,
        "Best transit candidate"
    );
    Ok(Periodogram {
        entries,
        best: candidate,
        points: times.len(),
        baseline,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_widths_dedup_and_clamp() {
        let params = PeriodSearchParams {
            durations: vec![0.001, 0.002, 0.1, 0.1],
            phase_bins: 100,
            ..Default::default()
        };
        assert_eq!(window_widths(&params), vec![1, 10]);
    }

    #[test]
    fn test_best_window_wraps_phase() {
        let n = 10;
        let mut bins = PhaseBins {
            counts: vec![4; n],
            weights: vec![4.0; n],
            weighted: vec![0.0; n],
        };
        // Dimming spans the last and first bin.
        bins.weighted[9] = 4.0;
        bins.weighted[0] = 4.0;
        let fit = best_window(&bins, &[2], 3).unwrap();
        assert_eq!(fit.start_bin, 9);
        assert!((fit.depth - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_point_weights_fallback() {
        assert_eq!(point_weights(&[0.5, 0.0]), vec![1.0, 1.0]);
        assert_eq!(point_weights(&[0.5, 1.0]), vec![4.0, 1.0]);
    }
}
