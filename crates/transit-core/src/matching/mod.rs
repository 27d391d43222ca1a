mod matcher;
pub mod record;
pub mod spatial;

pub use matcher::{match_stars, match_stars_with_progress, MatchingParams, ReferenceFrame};
pub use record::{MatchedStars, Measurement, StarRecord};
