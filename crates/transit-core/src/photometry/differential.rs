use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::FrameWarning;
use crate::comparison::ComparisonEnsemble;
use crate::consts::MAG_ERROR_FACTOR;
use crate::error::{Result, TransitError};
use crate::frame::FrameInfo;
use crate::matching::{MatchedStars, StarRecord};
use crate::pipeline::PipelineStage;
use crate::stats::mean_stddev;

/// Configuration for the differential photometry stage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotometryParams {
    /// Number of leading points whose mean defines the zero point; all
    /// points when unset.
    #[serde(default)]
    pub zero_point_frames: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightCurvePoint {
    pub frame: usize,
    pub time: f64,
    /// Differential magnitude, centred by the zero point.
    pub magnitude: f64,
    pub magnitude_err: f64,
    pub target_flux: f64,
    /// Weighted mean flux of the members present in this frame.
    pub ensemble_flux: f64,
    pub members_used: usize,
}

/// Light-curve artifact: output of the Differential Photometry Engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightCurve {
    pub target_id: usize,
    /// Time-ordered points. Frames without a measurement are absent.
    pub points: Vec<LightCurvePoint>,
    /// Offset added to every raw differential magnitude.
    pub zero_point: f64,
    pub skipped_frames: usize,
    pub warnings: Vec<FrameWarning>,
}

impl LightCurve {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn times(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.time).collect()
    }

    pub fn magnitudes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.magnitude).collect()
    }

    /// Standard deviation of the magnitudes.
    pub fn scatter(&self) -> f64 {
        mean_stddev(&self.magnitudes()).1
    }

    pub fn baseline(&self) -> f64 {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => last.time - first.time,
            _ => 0.0,
        }
    }
}

/// What happened to a single frame.
enum FrameResult {
    Point(LightCurvePoint),
    Skipped(Vec<FrameWarning>),
}

/// Compute the target's differential light curve against the ensemble.
pub fn compute_light_curve(
    matched: &MatchedStars,
    ensemble: &ComparisonEnsemble,
    params: &PhotometryParams,
) -> Result<LightCurve> {
    let target_id = ensemble.target.star_id;
    let target = matched.star(target_id).ok_or_else(|| {
        TransitError::InvalidConfig(format!("target star {target_id} not among matched stars"))
    })?;
    let members: Vec<(&StarRecord, f64)> = ensemble
        .members
        .iter()
        .filter(|m| m.star_id != target_id)
        .filter_map(|m| matched.star(m.star_id).map(|s| (s, m.weight)))
        .collect();
    if members.is_empty() {
        return Err(TransitError::InsufficientComparisonStars(
            "no ensemble member is among the matched stars".into(),
        ));
    }

    info!(
        target = target_id,
        members = members.len(),
        frames = matched.frame_count(),
        "Computing differential photometry"
    );

    let results: Vec<FrameResult> = matched
        .frames
        .par_iter()
        .map(|info| measure_frame(info.index, info.time, &frame_label(info), target, &members))
        .collect();

    let mut raw: Vec<LightCurvePoint> = Vec::with_capacity(results.len());
    let mut warnings: Vec<FrameWarning> = Vec::new();
    let mut skipped = 0;
    for result in results {
        match result {
            FrameResult::Point(p) => raw.push(p),
            FrameResult::Skipped(w) => {
                skipped += 1;
                warnings.extend(w);
            }
        }
    }
    if raw.is_empty() {
        return Err(TransitError::EmptyLightCurve);
    }

    raw.sort_by(|a, b| a.time.total_cmp(&b.time));
    let leading = params.zero_point_frames.unwrap_or(raw.len()).clamp(1, raw.len());
    let zero_point = -raw[..leading].iter().map(|p| p.magnitude).sum::<f64>() / leading as f64;
    for p in raw.iter_mut() {
        p.magnitude += zero_point;
    }

    info!(points = raw.len(), skipped, zero_point, "Light curve computed");
    Ok(LightCurve {
        target_id,
        points: raw,
        zero_point,
        skipped_frames: skipped,
        warnings,
    })
}

fn frame_label(info: &FrameInfo) -> String {
    match &info.source {
        Some(path) => path.display().to_string(),
        None => format!("frame {}", info.index),
    }
}

/// Differential magnitude for one frame, before the zero point.
fn measure_frame(
    frame: usize,
    time: f64,
    label: &str,
    target: &StarRecord,
    members: &[(&StarRecord, f64)],
) -> FrameResult {
    let stage = PipelineStage::Photometry;
    let Some(t) = target.measurement(frame) else {
        debug!(frame, "Target not detected; frame skipped");
        return FrameResult::Skipped(Vec::new());
    };
    if !(t.flux > 0.0) {
        let err = TransitError::Numeric(format!("target flux {} is not positive", t.flux));
        return FrameResult::Skipped(vec![FrameWarning::from_error(stage, label, &err)]);
    }

    let mut warnings = Vec::new();
    let (mut weighted_flux, mut weighted_var, mut weight_sum, mut used) = (0.0, 0.0, 0.0, 0);
    for (star, weight) in members {
        let Some(m) = star.measurement(frame) else {
            continue;
        };
        if !(m.flux > 0.0) {
            let err = TransitError::Numeric(format!(
                "comparison star {} flux {} is not positive; excluded from this frame",
                star.id, m.flux
            ));
            warnings.push(FrameWarning::from_error(stage, label, &err));
            continue;
        }
        weighted_flux += weight * m.flux;
        weighted_var += (weight * m.flux_err).powi(2);
        weight_sum += weight;
        used += 1;
    }
    if used == 0 || weight_sum <= 0.0 {
        debug!(frame, "No ensemble member detected; frame skipped");
        return FrameResult::Skipped(warnings);
    }

    let ensemble_flux = weighted_flux / weight_sum;
    let ensemble_err = weighted_var.sqrt() / weight_sum;
    let magnitude = -2.5 * (t.flux / ensemble_flux).log10();
    let magnitude_err = MAG_ERROR_FACTOR
        * ((t.flux_err / t.flux).powi(2) + (ensemble_err / ensemble_flux).powi(2)).sqrt();

    if !warnings.is_empty() {
        debug!(frame, warnings = warnings.len(), "Frame measured with exclusions");
    }
    FrameResult::Point(LightCurvePoint {
        frame,
        time,
        magnitude,
        magnitude_err,
        target_flux: t.flux,
        ensemble_flux,
        members_used: used,
    })
}
