use serde::{Deserialize, Serialize};
use tracing::info;

use crate::consts::DEFAULT_TARGET_TOLERANCE_ARCSEC;
use crate::error::{Result, TransitError};
use crate::frame::SkyPosition;
use crate::matching::MatchedStars;

/// Where the target is on the sky.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Right ascension, decimal degrees.
    pub ra: f64,
    /// Declination, decimal degrees.
    pub dec: f64,
    #[serde(default = "default_target_tolerance")]
    pub tolerance_arcsec: f64,
    /// Matched star id to use instead of the coordinate lookup.
    #[serde(default)]
    pub star_id: Option<usize>,
}

fn default_target_tolerance() -> f64 {
    DEFAULT_TARGET_TOLERANCE_ARCSEC
}

impl TargetConfig {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self {
            ra,
            dec,
            tolerance_arcsec: DEFAULT_TARGET_TOLERANCE_ARCSEC,
            star_id: None,
        }
    }

    pub fn position(&self) -> SkyPosition {
        SkyPosition::new(self.ra, self.dec)
    }
}

/// The star whose light curve is being measured.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetStar {
    pub star_id: usize,
    pub position: SkyPosition,
    /// Distance between the requested coordinate and the star.
    pub separation_arcsec: f64,
}

/// Designate the star nearest the requested coordinate.
pub fn identify_target(matched: &MatchedStars, target: &TargetConfig) -> Result<TargetStar> {
    let requested = target.position();
    let nearest = matched
        .stars
        .iter()
        .map(|s| (s, requested.separation_arcsec(&s.position)))
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.id.cmp(&b.0.id)));

    match nearest {
        Some((star, separation)) if separation <= target.tolerance_arcsec => {
            info!(star = star.id, separation_arcsec = separation, "Target identified");
            Ok(TargetStar {
                star_id: star.id,
                position: star.position,
                separation_arcsec: separation,
            })
        }
        _ => Err(TransitError::TargetNotFound {
            ra: target.ra,
            dec: target.dec,
            tolerance_arcsec: target.tolerance_arcsec,
        }),
    }
}

/// Designate the target by `star_id` when configured, else by position.
pub fn resolve_target(matched: &MatchedStars, target: &TargetConfig) -> Result<TargetStar> {
    match target.star_id {
        Some(id) => target_by_id(matched, id),
        None => identify_target(matched, target),
    }
}

/// Designate a star by id, for runs where the target is already known.
pub fn target_by_id(matched: &MatchedStars, star_id: usize) -> Result<TargetStar> {
    let star = matched.star(star_id).ok_or_else(|| {
        TransitError::InvalidConfig(format!("target star id {star_id} not among matched stars"))
    })?;
    info!(star = star.id, "Target designated by id");
    Ok(TargetStar {
        star_id: star.id,
        position: star.position,
        separation_arcsec: 0.0,
    })
}
