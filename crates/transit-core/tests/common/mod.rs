use std::f64::consts::PI;

use transit_core::frame::{Detection, Frame, PixelPosition, SkyPosition};
use transit_core::photometry::{LightCurve, LightCurvePoint};

/// Field centre used by the synthetic scenes.
pub const FIELD_RA: f64 = 150.0;
pub const FIELD_DEC: f64 = 2.0;

/// Sky position offset from the field centre by arcseconds on the sky.
pub fn offset(d_ra_arcsec: f64, d_dec_arcsec: f64) -> SkyPosition {
    let cos_dec = FIELD_DEC.to_radians().cos();
    SkyPosition::new(
        FIELD_RA + d_ra_arcsec / 3600.0 / cos_dec,
        FIELD_DEC + d_dec_arcsec / 3600.0,
    )
}

/// Detection with photon-noise-like uncertainty.
pub fn detection(id: u64, sky: SkyPosition, flux: f64) -> Detection {
    Detection {
        id,
        pixel: PixelPosition {
            x: (sky.ra - FIELD_RA) * 3600.0,
            y: (sky.dec - FIELD_DEC) * 3600.0,
        },
        sky,
        flux,
        flux_err: flux.abs().sqrt().max(1.0),
    }
}

/// Frame holding one detection per `(position, flux)` pair.
pub fn frame(time: f64, stars: &[(SkyPosition, f64)]) -> Frame {
    let detections = stars
        .iter()
        .enumerate()
        .map(|(i, &(sky, flux))| detection(i as u64, sky, flux))
        .collect();
    Frame::new(time, detections)
}

/// Star positions of the four-star scene: the target first, then three
/// comparison stars.
pub fn four_star_positions() -> [SkyPosition; 4] {
    [
        offset(0.0, 0.0),
        offset(40.0, 0.0),
        offset(0.0, 40.0),
        offset(-40.0, -30.0),
    ]
}

/// Comparison star flux: 1000 plus a sinusoid. The three phases are 120°
/// apart, so the three stars always sum to 3000.
pub fn comparison_flux(frame: usize, star: usize, frames: usize) -> f64 {
    let phase = 2.0 * PI * frame as f64 / frames as f64 + 2.0 * PI * star as f64 / 3.0;
    1000.0 + 50.0 * phase.sin()
}

/// Five frames of four stars. The target (star 1 after matching) has the
/// given fluxes; positions jitter by a fraction of an arcsecond.
pub fn four_star_frames(target_flux: &[f64; 5]) -> Vec<Frame> {
    let positions = four_star_positions();
    (0..5)
        .map(|k| {
            let jitter = 0.2 * ((k as f64) - 2.0);
            let mut stars = vec![(
                offset(jitter, -jitter),
                target_flux[k],
            )];
            for j in 0..3 {
                let p = positions[j + 1];
                stars.push((
                    SkyPosition::new(p.ra + jitter / 3600.0, p.dec - jitter / 7200.0),
                    comparison_flux(k, j, 5),
                ));
            }
            frame(2_460_000.0 + 0.1 * k as f64, &stars)
        })
        .collect()
}

/// Deterministic noise in [-1, 1).
pub fn noise(seed: u64, i: usize) -> f64 {
    let mut x = seed
        .wrapping_add(i as u64)
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    (x >> 11) as f64 / (1u64 << 52) as f64 - 1.0
}

/// Light curve sampled every `cadence` days with a box transit of `depth`
/// magnitudes lasting `duration` days every `period` days, first starting at
/// `first_transit`.
pub fn transit_light_curve(
    points: usize,
    cadence: f64,
    period: f64,
    duration: f64,
    first_transit: f64,
    depth: f64,
    sigma: f64,
) -> LightCurve {
    let points: Vec<LightCurvePoint> = (0..points)
        .map(|i| {
            let time = i as f64 * cadence;
            let in_transit = (time - first_transit).rem_euclid(period) < duration;
            let magnitude = if in_transit { depth } else { 0.0 } + sigma * noise(7, i);
            LightCurvePoint {
                frame: i,
                time,
                magnitude,
                magnitude_err: sigma.max(1e-4),
                target_flux: 1000.0,
                ensemble_flux: 1000.0,
                members_used: 3,
            }
        })
        .collect();
    LightCurve {
        target_id: 1,
        points,
        zero_point: 0.0,
        skipped_frames: 0,
        warnings: Vec::new(),
    }
}
