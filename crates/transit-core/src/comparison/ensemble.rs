use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::consts::{EPSILON, MIN_EVALUATION_FRAMES, MIN_VARIABILITY};
use crate::error::{Result, TransitError};
use crate::matching::MatchedStars;
use crate::stats::mean_stddev;
use crate::target::TargetStar;

use super::config::ComparisonParams;
use super::variability::{frame_scales, normalized_series, reject_variable};

/// Why a candidate did or did not end up in the ensemble.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateStatus {
    Member,
    /// Passed rejection but growth stopped before reaching it.
    Unused,
    /// Above the variability cap relative to the quietest star.
    TooVariable,
    /// Removed by the sigma-rejection loop.
    Rejected,
}

/// One row of the candidate table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateVariability {
    pub star_id: usize,
    /// Coefficient of variation of the normalized flux; `None` when it could
    /// not be computed.
    pub variability: Option<f64>,
    pub mean_flux: f64,
    /// Fraction of frames the star was detected in.
    pub presence: f64,
    pub status: CandidateStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnsembleMember {
    pub star_id: usize,
    /// Normalized so all member weights sum to one.
    pub weight: f64,
    pub variability: f64,
}

/// Comparison-ensemble artifact: output of the Comparison Selector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEnsemble {
    pub target: TargetStar,
    pub members: Vec<EnsembleMember>,
    pub candidates: Vec<CandidateVariability>,
    /// Variability of the weighted combined ensemble on the evaluation
    /// frames; `None` when fewer than two frames could be evaluated.
    pub combined_variability: Option<f64>,
    pub evaluation_frames: usize,
}

impl ComparisonEnsemble {
    pub fn member_ids(&self) -> Vec<usize> {
        self.members.iter().map(|m| m.star_id).collect()
    }

    pub fn contains(&self, star_id: usize) -> bool {
        self.members.iter().any(|m| m.star_id == star_id)
    }
}

/// Weight of a star with the given variability, before normalization.
pub fn raw_weight(variability: f64) -> f64 {
    1.0 / variability.max(MIN_VARIABILITY)
}

/// Choose a stable comparison ensemble for `target`.
///
/// Candidates are ranked by normalized-flux variability and the ensemble is
/// grown greedily from the quietest star while the combined variability on
/// the evaluation frames keeps improving. This is a local search: it does
/// not try every subset.
pub fn select_comparison_stars(
    matched: &MatchedStars,
    target: &TargetStar,
    params: &ComparisonParams,
) -> Result<ComparisonEnsemble> {
    let n_frames = matched.frame_count();
    let flux = matched.flux_matrix();
    let min_frames = (params.min_presence * n_frames as f64).ceil() as usize;

    let mut candidate_rows: Vec<usize> = Vec::new();
    for (row, star) in matched.stars.iter().enumerate() {
        if star.id == target.star_id {
            continue;
        }
        if star.position.separation_arcsec(&target.position) <= params.target_exclusion_arcsec {
            debug!(star = star.id, "Excluded: too close to target");
            continue;
        }
        if params
            .excluded
            .iter()
            .any(|p| p.separation_arcsec(&star.position) <= params.exclusion_radius_arcsec)
        {
            debug!(star = star.id, "Excluded: listed position");
            continue;
        }
        let usable = star.measurements.values().filter(|m| m.flux > 0.0).count();
        if usable < min_frames.max(1) {
            continue;
        }
        candidate_rows.push(row);
    }

    if candidate_rows.is_empty() {
        return Err(TransitError::InsufficientComparisonStars(format!(
            "no star other than the target is present in at least {min_frames} of {n_frames} frames"
        )));
    }
    info!(candidates = candidate_rows.len(), "Computing candidate variability");

    let split = FrameSplit::new(n_frames);
    let outcome = reject_variable(
        &split.ranking_matrix(&flux),
        &candidate_rows,
        params.reject_sigma,
    );
    let mut ranked: Vec<(usize, f64)> = outcome
        .kept
        .iter()
        .copied()
        .filter(|(_, v)| v.is_finite())
        .collect();
    if ranked.is_empty() {
        return Err(TransitError::InsufficientComparisonStars(
            "no candidate has a measurable variability".into(),
        ));
    }
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    if !outcome.rejected.is_empty() {
        warn!(rejected = outcome.rejected.len(), "Rejected variable comparison candidates");
    }

    let evaluation = &split.evaluation;
    let kept_rows: Vec<usize> = ranked.iter().map(|&(row, _)| row).collect();
    let scales = frame_scales(&flux, &kept_rows);
    let series: Vec<Vec<f64>> = ranked
        .iter()
        .map(|&(row, _)| relative_series(&flux, row, &scales))
        .collect();

    let min_variability = ranked[0].1;
    let variability_cap = min_variability * params.variability_multiplier;
    let mut chosen: Vec<usize> = vec![0];
    let mut best = combined_variability(&series, &ranked, &chosen, evaluation);
    let mut too_variable_from = ranked.len();

    for next in 1..ranked.len() {
        if chosen.len() >= params.max_ensemble_size {
            break;
        }
        if ranked[next].1 > variability_cap {
            too_variable_from = next;
            break;
        }
        if let Some(limit) = params.target_counts {
            let counts = reference_counts(matched, &ranked, &chosen);
            if counts >= limit {
                debug!(counts, limit, "Ensemble reached target counts");
                break;
            }
        }

        let mut trial = chosen.clone();
        trial.push(next);
        let value = combined_variability(&series, &ranked, &trial, evaluation);
        if value + EPSILON < best || chosen.len() < params.min_ensemble_size {
            debug!(
                star = matched.stars[ranked[next].0].id,
                combined = value,
                "Added comparison star"
            );
            chosen = trial;
            best = value;
        } else {
            debug!(
                star = matched.stars[ranked[next].0].id,
                combined = value,
                best,
                "Combined variability stopped improving"
            );
            break;
        }
    }
    if chosen.len() < params.min_ensemble_size {
        warn!(
            members = chosen.len(),
            requested = params.min_ensemble_size,
            "Ensemble smaller than requested minimum"
        );
    }

    let weight_sum: f64 = chosen.iter().map(|&i| raw_weight(ranked[i].1)).sum();
    let members: Vec<EnsembleMember> = chosen
        .iter()
        .map(|&i| EnsembleMember {
            star_id: matched.stars[ranked[i].0].id,
            weight: raw_weight(ranked[i].1) / weight_sum,
            variability: ranked[i].1,
        })
        .collect();

    let candidates = candidate_table(
        matched,
        &outcome.kept,
        &outcome.rejected,
        &ranked,
        &chosen,
        too_variable_from,
    );

    info!(
        members = members.len(),
        combined_variability = best,
        "Comparison ensemble selected"
    );

    Ok(ComparisonEnsemble {
        target: target.clone(),
        members,
        candidates,
        combined_variability: best.is_finite().then_some(best),
        evaluation_frames: evaluation.len(),
    })
}

/// Frames used to rank candidates and frames used to judge the combined
/// ensemble. With at least `2 * MIN_EVALUATION_FRAMES` frames the odd
/// frames are held out for evaluation and ranking sees only the even ones;
/// with fewer, both use every frame.
#[derive(Clone, Debug, PartialEq)]
struct FrameSplit {
    ranking: Vec<usize>,
    evaluation: Vec<usize>,
}

impl FrameSplit {
    fn new(n_frames: usize) -> Self {
        if n_frames >= 2 * MIN_EVALUATION_FRAMES {
            Self {
                ranking: (0..n_frames).step_by(2).collect(),
                evaluation: (1..n_frames).step_by(2).collect(),
            }
        } else {
            Self {
                ranking: (0..n_frames).collect(),
                evaluation: (0..n_frames).collect(),
            }
        }
    }

    fn is_held_out(&self) -> bool {
        !self.evaluation.iter().any(|f| self.ranking.contains(f))
    }

    /// Copy of `flux` with the held-out columns set to NaN, so ranking and
    /// rejection never read them.
    fn ranking_matrix(&self, flux: &Array2<f64>) -> Array2<f64> {
        let mut masked = flux.clone();
        if self.is_held_out() {
            for &frame in &self.evaluation {
                masked.column_mut(frame).fill(f64::NAN);
            }
        }
        masked
    }
}

/// Normalized flux divided by its own mean, so stars of different
/// brightness combine on a common unit scale.
fn relative_series(flux: &Array2<f64>, row: usize, scales: &[f64]) -> Vec<f64> {
    let series = normalized_series(flux, row, scales);
    let finite: Vec<f64> = series.iter().copied().filter(|v| v.is_finite()).collect();
    let (mean, _) = mean_stddev(&finite);
    series.into_iter().map(|v| v / mean).collect()
}

/// Coefficient of variation of the weighted mean of the members' relative
/// fluxes, weights renormalized per frame over the members present.
fn combined_variability(
    series: &[Vec<f64>],
    ranked: &[(usize, f64)],
    members: &[usize],
    evaluation: &[usize],
) -> f64 {
    let combined: Vec<f64> = evaluation
        .iter()
        .filter_map(|&frame| {
            let (mut sum, mut weights) = (0.0, 0.0);
            for &m in members {
                let v = series[m][frame];
                if v.is_finite() {
                    let w = raw_weight(ranked[m].1);
                    sum += w * v;
                    weights += w;
                }
            }
            (weights > 0.0).then(|| sum / weights)
        })
        .collect();
    if combined.len() < 2 {
        return f64::INFINITY;
    }
    let (mean, std) = mean_stddev(&combined);
    std / mean
}

/// Summed counts of the chosen stars in the reference frame (mean flux when
/// a star is missing there).
fn reference_counts(matched: &MatchedStars, ranked: &[(usize, f64)], chosen: &[usize]) -> f64 {
    chosen
        .iter()
        .map(|&i| {
            let star = &matched.stars[ranked[i].0];
            star.measurement(matched.reference_frame)
                .map(|m| m.flux)
                .unwrap_or_else(|| star.mean_flux())
        })
        .sum()
}

fn candidate_table(
    matched: &MatchedStars,
    kept: &[(usize, f64)],
    rejected: &[(usize, f64)],
    ranked: &[(usize, f64)],
    chosen: &[usize],
    too_variable_from: usize,
) -> Vec<CandidateVariability> {
    let n_frames = matched.frame_count().max(1) as f64;
    let status_of = |row: usize| -> CandidateStatus {
        match ranked.iter().position(|(r, _)| *r == row) {
            Some(i) if chosen.contains(&i) => CandidateStatus::Member,
            Some(i) if i >= too_variable_from => CandidateStatus::TooVariable,
            Some(_) => CandidateStatus::Unused,
            None => CandidateStatus::Rejected,
        }
    };

    let mut table: Vec<CandidateVariability> = kept
        .iter()
        .chain(rejected)
        .map(|&(row, v)| {
            let star = &matched.stars[row];
            CandidateVariability {
                star_id: star.id,
                variability: v.is_finite().then_some(v),
                mean_flux: star.mean_flux(),
                presence: star.frame_count() as f64 / n_frames,
                status: status_of(row),
            }
        })
        .collect();
    table.sort_by_key(|c| c.star_id);
    table
}
