pub mod differential;

pub use differential::{compute_light_curve, LightCurve, LightCurvePoint, PhotometryParams};
