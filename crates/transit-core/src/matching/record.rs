use std::collections::BTreeMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::catalog::FrameWarning;
use crate::frame::{Detection, FrameInfo, PixelPosition, SkyPosition};

/// A detection as stored on its star, keyed by frame index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub detection_id: u64,
    pub pixel: PixelPosition,
    pub sky: SkyPosition,
    pub flux: f64,
    pub flux_err: f64,
}

impl From<&Detection> for Measurement {
    fn from(d: &Detection) -> Self {
        Self {
            detection_id: d.id,
            pixel: d.pixel,
            sky: d.sky,
            flux: d.flux,
            flux_err: d.flux_err,
        }
    }
}

/// One physical star resolved across frames.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StarRecord {
    /// Stable 1-based identity.
    pub id: usize,
    /// Spherical centroid of the matched detections.
    pub position: SkyPosition,
    /// Sparse frame index -> measurement map.
    pub measurements: BTreeMap<usize, Measurement>,
}

impl StarRecord {
    pub fn frame_count(&self) -> usize {
        self.measurements.len()
    }

    pub fn measurement(&self, frame: usize) -> Option<&Measurement> {
        self.measurements.get(&frame)
    }

    /// Mean flux over the frames the star was detected in.
    pub fn mean_flux(&self) -> f64 {
        if self.measurements.is_empty() {
            return 0.0;
        }
        self.measurements.values().map(|m| m.flux).sum::<f64>() / self.measurements.len() as f64
    }
}

/// Matched-stars artifact: output of the Star Matcher.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchedStars {
    pub frames: Vec<FrameInfo>,
    pub stars: Vec<StarRecord>,
    /// Frame index the stars were seeded from.
    pub reference_frame: usize,
    pub tolerance_arcsec: f64,
    /// Stars dropped for appearing in too few frames.
    pub spurious_discarded: usize,
    /// Detections dropped because they blended into an already-claimed star.
    pub blended_discarded: usize,
    pub warnings: Vec<FrameWarning>,
}

impl MatchedStars {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn star(&self, id: usize) -> Option<&StarRecord> {
        // Ids are dense and ordered, so the fast path nearly always hits.
        match self.stars.get(id.wrapping_sub(1)) {
            Some(star) if star.id == id => Some(star),
            _ => self.stars.iter().find(|s| s.id == id),
        }
    }

    /// Flux matrix of shape (stars.len(), frames.len()); NaN where absent.
    pub fn flux_matrix(&self) -> Array2<f64> {
        let mut matrix = Array2::from_elem((self.stars.len(), self.frames.len()), f64::NAN);
        for (row, star) in self.stars.iter().enumerate() {
            for (&frame, m) in &star.measurements {
                if frame < self.frames.len() {
                    matrix[[row, frame]] = m.flux;
                }
            }
        }
        matrix
    }
}
