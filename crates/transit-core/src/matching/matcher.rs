use std::cmp::Reverse;
use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{FrameCatalog, FrameWarning};
use crate::consts::{
    DEFAULT_MATCH_TOLERANCE_ARCSEC, DEFAULT_MIN_MATCHED_FRAMES, DEFAULT_MIN_MATCHED_STARS,
    MATCH_TIE_EPSILON_ARCSEC, PARALLEL_ITEM_THRESHOLD,
};
use crate::error::{Result, TransitError};
use crate::frame::{Detection, Frame, SkyPosition, TangentPlane};
use crate::pipeline::PipelineStage;

use super::record::{MatchedStars, Measurement, StarRecord};
use super::spatial::KdTree;

/// Tangent-plane distances overestimate angular ones away from the field
/// centre; the k-d tree is queried with this much headroom and candidates
/// are then confirmed with the true separation.
const PROJECTED_SEARCH_MARGIN: f64 = 1.5;

/// How the frame that seeds the star list is chosen.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum ReferenceFrame {
    /// Frame with the most detections; ties go to the earliest.
    #[default]
    MostDetections,
    /// Explicit frame index in time order.
    Index(usize),
}

impl std::fmt::Display for ReferenceFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MostDetections => write!(f, "Most Detections"),
            Self::Index(i) => write!(f, "Frame {i}"),
        }
    }
}

/// Parameters for cross-frame star matching.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchingParams {
    /// Matching radius in arcseconds.
    #[serde(default = "default_tolerance")]
    pub tolerance_arcsec: f64,
    /// Stars matched in fewer frames are discarded as spurious.
    #[serde(default = "default_min_frames")]
    pub min_frames: usize,
    /// Fewest surviving stars before the stage fails.
    #[serde(default = "default_min_stars")]
    pub min_stars: usize,
    #[serde(default)]
    pub reference: ReferenceFrame,
}

fn default_tolerance() -> f64 {
    DEFAULT_MATCH_TOLERANCE_ARCSEC
}
fn default_min_frames() -> usize {
    DEFAULT_MIN_MATCHED_FRAMES
}
fn default_min_stars() -> usize {
    DEFAULT_MIN_MATCHED_STARS
}

impl Default for MatchingParams {
    fn default() -> Self {
        Self {
            tolerance_arcsec: DEFAULT_MATCH_TOLERANCE_ARCSEC,
            min_frames: DEFAULT_MIN_MATCHED_FRAMES,
            min_stars: DEFAULT_MIN_MATCHED_STARS,
            reference: ReferenceFrame::default(),
        }
    }
}

/// A star being built up while frames are matched.
struct StarAccumulator {
    vector_sum: [f64; 3],
    position: SkyPosition,
    measurements: BTreeMap<usize, Measurement>,
}

impl StarAccumulator {
    fn seed(frame: usize, detection: &Detection) -> Self {
        let mut star = Self {
            vector_sum: [0.0; 3],
            position: detection.sky,
            measurements: BTreeMap::new(),
        };
        star.add(frame, detection);
        star
    }

    /// Attach a detection and move the canonical position to the running
    /// spherical centroid.
    fn add(&mut self, frame: usize, detection: &Detection) {
        let v = detection.sky.to_unit_vector();
        for (acc, c) in self.vector_sum.iter_mut().zip(v) {
            *acc += c;
        }
        self.position = SkyPosition::from_vector(self.vector_sum);
        self.measurements.insert(frame, Measurement::from(detection));
    }
}

/// A star within tolerance of a detection.
#[derive(Clone, Copy, Debug)]
struct Candidate {
    star: usize,
    separation: f64,
}

/// Sort key: nearest first, then the star with more prior detections, then
/// the older star. Separations are quantized so near-equal distances tie.
fn candidate_key(candidate: &Candidate, prior_counts: &[usize]) -> (i64, Reverse<usize>, usize) {
    (
        (candidate.separation / MATCH_TIE_EPSILON_ARCSEC).round() as i64,
        Reverse(prior_counts[candidate.star]),
        candidate.star,
    )
}

/// Counts of what happened while matching one frame.
#[derive(Debug, Default)]
struct FrameOutcome {
    matched: usize,
    created: usize,
    blended: usize,
    unprojectable: usize,
}

/// Resolve detections across all frames into a master star list.
pub fn match_stars(catalog: &FrameCatalog, params: &MatchingParams) -> Result<MatchedStars> {
    match_stars_with_progress(catalog, params, |_| {})
}

/// [`match_stars`] with a callback receiving the number of frames matched
/// so far.
pub fn match_stars_with_progress(
    catalog: &FrameCatalog,
    params: &MatchingParams,
    on_progress: impl Fn(usize),
) -> Result<MatchedStars> {
    if catalog.is_empty() {
        return Err(TransitError::Matching("no usable frames".into()));
    }
    if !params.tolerance_arcsec.is_finite() || params.tolerance_arcsec <= 0.0 {
        return Err(TransitError::InvalidConfig(format!(
            "matching tolerance must be positive, got {}",
            params.tolerance_arcsec
        )));
    }

    let reference = select_reference(catalog, &params.reference)?;
    let plane = TangentPlane::new(field_center(&catalog.frames[reference]));
    info!(
        frames = catalog.len(),
        reference,
        tolerance_arcsec = params.tolerance_arcsec,
        "Matching stars across frames"
    );

    let mut stars: Vec<StarAccumulator> = Vec::new();
    let mut warnings: Vec<FrameWarning> = catalog.warnings.clone();
    let mut blended_total = 0;

    let order = std::iter::once(reference).chain((0..catalog.len()).filter(|&i| i != reference));
    for (done, frame_idx) in order.enumerate() {
        let frame = &catalog.frames[frame_idx];
        let outcome = match_frame(&mut stars, frame, frame_idx, &plane, params.tolerance_arcsec);
        debug!(
            frame = frame_idx,
            matched = outcome.matched,
            created = outcome.created,
            blended = outcome.blended,
            "Frame matched"
        );
        if outcome.blended > 0 {
            warnings.push(FrameWarning::new(
                PipelineStage::Matching,
                frame.label(),
                format!(
                    "{} detection(s) blended with an already matched star and discarded",
                    outcome.blended
                ),
            ));
        }
        if outcome.unprojectable > 0 {
            warnings.push(FrameWarning::new(
                PipelineStage::Matching,
                frame.label(),
                format!(
                    "{} detection(s) too far from the field centre to match",
                    outcome.unprojectable
                ),
            ));
        }
        blended_total += outcome.blended;
        on_progress(done + 1);
    }

    let total_stars = stars.len();
    let surviving: Vec<StarRecord> = stars
        .into_iter()
        .filter(|s| s.measurements.len() >= params.min_frames)
        .enumerate()
        .map(|(i, s)| StarRecord {
            id: i + 1,
            position: s.position,
            measurements: s.measurements,
        })
        .collect();
    let spurious = total_stars - surviving.len();

    if surviving.len() < params.min_stars {
        return Err(TransitError::Matching(format!(
            "only {} star(s) matched in at least {} frame(s); {} required",
            surviving.len(),
            params.min_frames,
            params.min_stars
        )));
    }

    info!(
        stars = surviving.len(),
        spurious,
        blended = blended_total,
        "Star matching complete"
    );

    Ok(MatchedStars {
        frames: catalog.frame_infos(),
        stars: surviving,
        reference_frame: reference,
        tolerance_arcsec: params.tolerance_arcsec,
        spurious_discarded: spurious,
        blended_discarded: blended_total,
        warnings,
    })
}

fn select_reference(catalog: &FrameCatalog, choice: &ReferenceFrame) -> Result<usize> {
    match choice {
        ReferenceFrame::Index(i) if *i < catalog.len() => Ok(*i),
        ReferenceFrame::Index(i) => Err(TransitError::Matching(format!(
            "reference frame {i} out of range (total: {})",
            catalog.len()
        ))),
        ReferenceFrame::MostDetections => Ok(catalog
            .frames
            .iter()
            .enumerate()
            .max_by_key(|(i, f)| (f.detections.len(), Reverse(*i)))
            .map(|(i, _)| i)
            .unwrap_or(0)),
    }
}

/// Spherical mean of a frame's detection positions.
fn field_center(frame: &Frame) -> SkyPosition {
    let mut sum = [0.0; 3];
    for d in &frame.detections {
        for (acc, c) in sum.iter_mut().zip(d.sky.to_unit_vector()) {
            *acc += c;
        }
    }
    SkyPosition::from_vector(sum)
}

/// Match one frame against the current star list.
///
/// Candidate lookup runs in parallel against a snapshot of the stars; the
/// claims are then resolved sequentially, nearest first, so each star takes
/// at most one detection per frame.
fn match_frame(
    stars: &mut Vec<StarAccumulator>,
    frame: &Frame,
    frame_idx: usize,
    plane: &TangentPlane,
    tolerance: f64,
) -> FrameOutcome {
    let mut outcome = FrameOutcome::default();

    let mut tree_ids: Vec<usize> = Vec::with_capacity(stars.len());
    let mut points: Vec<(f64, f64)> = Vec::with_capacity(stars.len());
    for (i, star) in stars.iter().enumerate() {
        if let Some(p) = plane.project_arcsec(star.position) {
            tree_ids.push(i);
            points.push(p);
        }
    }
    let tree = KdTree::build(&points);
    let prior_counts: Vec<usize> = stars.iter().map(|s| s.measurements.len()).collect();

    let lookup = |detection: &Detection| -> Option<Vec<Candidate>> {
        let projected = plane.project_arcsec(detection.sky)?;
        let mut candidates: Vec<Candidate> = match &tree {
            Some(tree) => tree
                .radius_search(projected, tolerance * PROJECTED_SEARCH_MARGIN)
                .into_iter()
                .map(|(i, _)| {
                    let star = tree_ids[i];
                    Candidate {
                        star,
                        separation: detection.sky.separation_arcsec(&stars[star].position),
                    }
                })
                .filter(|c| c.separation <= tolerance)
                .collect(),
            None => Vec::new(),
        };
        candidates.sort_by_key(|c| candidate_key(c, &prior_counts));
        Some(candidates)
    };

    let lookups: Vec<Option<Vec<Candidate>>> = if frame.detections.len() >= PARALLEL_ITEM_THRESHOLD {
        frame.detections.par_iter().map(lookup).collect()
    } else {
        frame.detections.iter().map(lookup).collect()
    };

    // Detections with candidates are resolved nearest-first; the rest may
    // start new stars afterwards.
    let mut with_candidates: Vec<(usize, Vec<Candidate>)> = Vec::new();
    let mut unmatched: Vec<usize> = Vec::new();
    for (det_idx, found) in lookups.into_iter().enumerate() {
        match found {
            None => outcome.unprojectable += 1,
            Some(c) if c.is_empty() => unmatched.push(det_idx),
            Some(c) => with_candidates.push((det_idx, c)),
        }
    }
    with_candidates.sort_by_key(|(det_idx, c)| (candidate_key(&c[0], &prior_counts), *det_idx));

    let mut claimed = vec![false; stars.len()];
    for (det_idx, candidates) in with_candidates {
        match candidates.iter().find(|c| !claimed[c.star]) {
            Some(c) => {
                claimed[c.star] = true;
                stars[c.star].add(frame_idx, &frame.detections[det_idx]);
                outcome.matched += 1;
            }
            None => outcome.blended += 1,
        }
    }

    // Claims above moved some centroids, so the lookup results are stale
    // here. Unmatched detections are checked against current positions.
    let first_new = stars.len();
    for det_idx in unmatched {
        let detection = &frame.detections[det_idx];
        let free = stars[..first_new]
            .iter()
            .enumerate()
            .filter(|(i, _)| !claimed[*i])
            .map(|(star, s)| Candidate {
                star,
                separation: detection.sky.separation_arcsec(&s.position),
            })
            .filter(|c| c.separation <= tolerance)
            .min_by_key(|c| candidate_key(c, &prior_counts));
        if let Some(c) = free {
            claimed[c.star] = true;
            stars[c.star].add(frame_idx, detection);
            outcome.matched += 1;
            continue;
        }

        let collides = stars
            .iter()
            .any(|s| detection.sky.separation_arcsec(&s.position) <= tolerance);
        if collides {
            outcome.blended += 1;
        } else {
            stars.push(StarAccumulator::seed(frame_idx, detection));
            outcome.created += 1;
        }
    }

    outcome
}
