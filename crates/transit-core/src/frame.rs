use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::ARCSEC_PER_DEGREE;

/// Celestial position in decimal degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SkyPosition {
    pub ra: f64,
    pub dec: f64,
}

impl SkyPosition {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }

    pub fn is_finite(&self) -> bool {
        self.ra.is_finite() && self.dec.is_finite()
    }

    /// Unit vector on the celestial sphere.
    pub fn to_unit_vector(&self) -> [f64; 3] {
        let (ra, dec) = (self.ra.to_radians(), self.dec.to_radians());
        [dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin()]
    }

    /// Inverse of [`to_unit_vector`](Self::to_unit_vector). The input need
    /// not be normalized.
    pub fn from_vector(v: [f64; 3]) -> Self {
        let [x, y, z] = v;
        let ra = y.atan2(x).to_degrees().rem_euclid(360.0);
        let dec = z.atan2((x * x + y * y).sqrt()).to_degrees();
        Self { ra, dec }
    }

    /// Great-circle separation in arcseconds (haversine form, stable at
    /// small angles).
    pub fn separation_arcsec(&self, other: &SkyPosition) -> f64 {
        let (ra1, dec1) = (self.ra.to_radians(), self.dec.to_radians());
        let (ra2, dec2) = (other.ra.to_radians(), other.dec.to_radians());
        let sin_ddec = ((dec2 - dec1) / 2.0).sin();
        let sin_dra = ((ra2 - ra1) / 2.0).sin();
        let h = sin_ddec * sin_ddec + dec1.cos() * dec2.cos() * sin_dra * sin_dra;
        2.0 * h.sqrt().min(1.0).asin() * (180.0 / std::f64::consts::PI) * ARCSEC_PER_DEGREE
    }
}

/// Detector position in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelPosition {
    pub x: f64,
    pub y: f64,
}

/// Gnomonic (TAN) pixel-to-sky mapping of a frame.
///
/// `cd` is the linear transform from pixel offsets to intermediate world
/// coordinates in degrees: `[[cd1_1, cd1_2], [cd2_1, cd2_2]]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkyProjection {
    pub reference_pixel: PixelPosition,
    pub reference_sky: SkyPosition,
    pub cd: [[f64; 2]; 2],
}

impl SkyProjection {
    pub fn pixel_to_sky(&self, pixel: PixelPosition) -> SkyPosition {
        let dx = pixel.x - self.reference_pixel.x;
        let dy = pixel.y - self.reference_pixel.y;
        let xi = (self.cd[0][0] * dx + self.cd[0][1] * dy).to_radians();
        let eta = (self.cd[1][0] * dx + self.cd[1][1] * dy).to_radians();
        TangentPlane::new(self.reference_sky).deproject(xi, eta)
    }

    /// Inverse mapping; `None` when the position lies on the far hemisphere
    /// or the CD matrix is singular.
    pub fn sky_to_pixel(&self, sky: SkyPosition) -> Option<PixelPosition> {
        let (xi, eta) = TangentPlane::new(self.reference_sky).project(sky)?;
        let (xi, eta) = (xi.to_degrees(), eta.to_degrees());
        let det = self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0];
        if det.abs() < f64::EPSILON {
            return None;
        }
        let dx = (self.cd[1][1] * xi - self.cd[0][1] * eta) / det;
        let dy = (-self.cd[1][0] * xi + self.cd[0][0] * eta) / det;
        Some(PixelPosition {
            x: self.reference_pixel.x + dx,
            y: self.reference_pixel.y + dy,
        })
    }
}

/// Tangent plane at a field centre. Standard coordinates are in radians.
#[derive(Clone, Copy, Debug)]
pub struct TangentPlane {
    center: SkyPosition,
    sin_dec0: f64,
    cos_dec0: f64,
}

impl TangentPlane {
    pub fn new(center: SkyPosition) -> Self {
        let dec0 = center.dec.to_radians();
        Self {
            center,
            sin_dec0: dec0.sin(),
            cos_dec0: dec0.cos(),
        }
    }

    /// Project onto the plane; `None` for points 90° or more from the centre.
    pub fn project(&self, sky: SkyPosition) -> Option<(f64, f64)> {
        let dra = (sky.ra - self.center.ra).to_radians();
        let dec = sky.dec.to_radians();
        let cos_c = self.sin_dec0 * dec.sin() + self.cos_dec0 * dec.cos() * dra.cos();
        if cos_c <= 0.0 {
            return None;
        }
        let xi = dec.cos() * dra.sin() / cos_c;
        let eta = (self.cos_dec0 * dec.sin() - self.sin_dec0 * dec.cos() * dra.cos()) / cos_c;
        Some((xi, eta))
    }

    /// Projected position in arcseconds.
    pub fn project_arcsec(&self, sky: SkyPosition) -> Option<(f64, f64)> {
        let scale = (180.0 / std::f64::consts::PI) * ARCSEC_PER_DEGREE;
        self.project(sky).map(|(xi, eta)| (xi * scale, eta * scale))
    }

    pub fn deproject(&self, xi: f64, eta: f64) -> SkyPosition {
        let denom = self.cos_dec0 - eta * self.sin_dec0;
        let ra0 = self.center.ra.to_radians();
        let ra = xi.atan2(denom) + ra0;
        let dec = (self.sin_dec0 + eta * self.cos_dec0).atan2((xi * xi + denom * denom).sqrt());
        SkyPosition {
            ra: ra.to_degrees().rem_euclid(360.0),
            dec: dec.to_degrees(),
        }
    }
}

/// A single source measured in a frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: u64,
    pub pixel: PixelPosition,
    pub sky: SkyPosition,
    /// Instrumental flux (counts), >= 0.
    pub flux: f64,
    /// 1-sigma flux uncertainty, > 0.
    pub flux_err: f64,
}

impl Detection {
    pub fn has_valid_flux(&self) -> bool {
        self.flux.is_finite() && self.flux >= 0.0 && self.flux_err.is_finite() && self.flux_err > 0.0
    }
}

/// One exposure: a timestamp and the detections extracted from it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Frame {
    /// Observation time in days (e.g. JD or BJD).
    pub time: f64,
    pub projection: Option<SkyProjection>,
    pub detections: Vec<Detection>,
    /// File the frame was read from, if any.
    pub source: Option<PathBuf>,
}

impl Frame {
    pub fn new(time: f64, detections: Vec<Detection>) -> Self {
        Self {
            time,
            projection: None,
            detections,
            source: None,
        }
    }

    pub fn with_projection(mut self, projection: SkyProjection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Human-readable label for warnings.
    pub fn label(&self) -> String {
        match &self.source {
            Some(path) => path.display().to_string(),
            None => format!("frame at t={}", self.time),
        }
    }
}

/// Summary of a catalogued frame carried through every artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameInfo {
    /// Position of the frame in time order.
    pub index: usize,
    pub time: f64,
    pub detections: usize,
    pub source: Option<PathBuf>,
}
