use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use tracing::debug;

use crate::consts::{MAX_REJECTION_PASSES, MIN_REJECTION_VARIABILITY};
use crate::stats::{coefficient_of_variation, mean_stddev, median};

/// Mean of the positive, finite fluxes in a row.
fn row_mean(row: ArrayView1<f64>) -> f64 {
    let (sum, count) = row
        .iter()
        .filter(|v| v.is_finite() && **v > 0.0)
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Relative transparency of each frame, estimated from the stars in `rows`.
///
/// `s_f = sum(flux present in f) / sum(mean flux of those stars)`, so stars
/// missing from a frame do not bias its scale. Scales are rescaled to unit
/// mean; frames with no contributing star get NaN.
pub fn frame_scales(flux: &Array2<f64>, rows: &[usize]) -> Vec<f64> {
    let means: Vec<f64> = rows.iter().map(|&r| row_mean(flux.row(r))).collect();
    let mut scales: Vec<f64> = (0..flux.ncols())
        .map(|frame| {
            let (mut total, mut expected) = (0.0, 0.0);
            for (&r, &mean) in rows.iter().zip(&means) {
                let v = flux[[r, frame]];
                if v.is_finite() && v > 0.0 && mean.is_finite() {
                    total += v;
                    expected += mean;
                }
            }
            if expected > 0.0 {
                total / expected
            } else {
                f64::NAN
            }
        })
        .collect();

    let finite: Vec<f64> = scales.iter().copied().filter(|s| s.is_finite()).collect();
    if !finite.is_empty() {
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        if mean > 0.0 {
            for s in scales.iter_mut() {
                *s /= mean;
            }
        }
    }
    scales
}

/// Per-frame flux of one star divided by the frame scale; NaN where the
/// star is absent or the frame has no scale.
pub fn normalized_series(flux: &Array2<f64>, row: usize, scales: &[f64]) -> Vec<f64> {
    flux.row(row)
        .iter()
        .zip(scales)
        .map(|(&v, &s)| {
            if v.is_finite() && v > 0.0 && s.is_finite() && s > 0.0 {
                v / s
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Coefficient of variation of each star's normalized flux, computed in
/// parallel. NaN when a star has fewer than two usable frames.
pub fn variability(flux: &Array2<f64>, rows: &[usize], scales: &[f64]) -> Vec<f64> {
    rows.par_iter()
        .map(|&r| {
            let series: Vec<f64> = normalized_series(flux, r, scales)
                .into_iter()
                .filter(|v| v.is_finite())
                .collect();
            if series.len() < 2 {
                f64::NAN
            } else {
                coefficient_of_variation(&series)
            }
        })
        .collect()
}

/// Result of the iterative rejection loop.
#[derive(Clone, Debug)]
pub struct RejectionOutcome {
    /// Rows that survived, with their final variability.
    pub kept: Vec<(usize, f64)>,
    /// Rows rejected, with the variability they were rejected at.
    pub rejected: Vec<(usize, f64)>,
}

/// Reject variable candidates until the set is statistically stable.
///
/// Each pass recomputes frame scales from the surviving rows, then drops
/// rows whose variability is non-finite or above `median + sigma * std`.
/// Rejection is skipped entirely once the quietest star is below
/// [`MIN_REJECTION_VARIABILITY`]: at that level the spread is noise.
pub fn reject_variable(flux: &Array2<f64>, rows: &[usize], sigma: f64) -> RejectionOutcome {
    let mut active: Vec<usize> = rows.to_vec();
    let mut rejected: Vec<(usize, f64)> = Vec::new();

    for pass in 0..MAX_REJECTION_PASSES {
        let scales = frame_scales(flux, &active);
        let values = variability(flux, &active, &scales);

        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let threshold = if finite.is_empty() || min <= MIN_REJECTION_VARIABILITY {
            f64::INFINITY
        } else {
            let (_, std) = mean_stddev(&finite);
            median(&finite) + sigma * std
        };

        let (keep, drop): (Vec<(usize, f64)>, Vec<(usize, f64)>) = active
            .iter()
            .copied()
            .zip(values)
            .partition(|(_, v)| v.is_finite() && *v <= threshold);

        if drop.is_empty() || keep.is_empty() {
            debug!(pass, candidates = active.len(), "Candidate variability stable");
            let kept = if keep.is_empty() { drop } else { keep };
            return RejectionOutcome { kept, rejected };
        }

        debug!(pass, rejected = drop.len(), threshold, "Rejected variable candidates");
        rejected.extend(drop);
        active = keep.iter().map(|(r, _)| *r).collect();
    }

    let scales = frame_scales(flux, &active);
    let values = variability(flux, &active, &scales);
    RejectionOutcome {
        kept: active.into_iter().zip(values).collect(),
        rejected,
    }
}
