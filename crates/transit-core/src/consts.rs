/// Arcseconds per degree.
pub const ARCSEC_PER_DEGREE: f64 = 3600.0;

/// 2.5 / ln(10): converts a fractional flux error into a magnitude error.
pub const MAG_ERROR_FACTOR: f64 = 1.085_736_204_758_129_6;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f64 = 1e-12;

/// Distances closer than this (arcsec) are treated as equally near when
/// breaking matching ties.
pub const MATCH_TIE_EPSILON_ARCSEC: f64 = 1e-9;

/// Default sky-matching radius in arcseconds.
pub const DEFAULT_MATCH_TOLERANCE_ARCSEC: f64 = 2.0;

/// Default minimum number of frames a star must be matched in to survive.
pub const DEFAULT_MIN_MATCHED_FRAMES: usize = 2;

/// Default minimum number of stars that must survive matching.
pub const DEFAULT_MIN_MATCHED_STARS: usize = 2;

/// Default radius (arcsec) for identifying the target star.
pub const DEFAULT_TARGET_TOLERANCE_ARCSEC: f64 = 3.0;

/// Default minimum fraction of frames a comparison candidate must appear in.
pub const DEFAULT_MIN_PRESENCE: f64 = 0.8;

/// Default sigma multiplier for the candidate rejection loop.
pub const DEFAULT_REJECT_SIGMA: f64 = 2.5;

/// Default multiplier on the lowest variability above which candidates are
/// not added to the ensemble.
pub const DEFAULT_VARIABILITY_MULTIPLIER: f64 = 2.5;

/// Default largest comparison ensemble.
pub const DEFAULT_MAX_ENSEMBLE_SIZE: usize = 10;

/// Candidate rejection only runs while the lowest variability exceeds this.
pub const MIN_REJECTION_VARIABILITY: f64 = 0.002;

/// Variability floor used when deriving ensemble weights.
pub const MIN_VARIABILITY: f64 = 1e-6;

/// The ensemble is evaluated on every other frame only when at least twice
/// this many frames exist.
pub const MIN_EVALUATION_FRAMES: usize = 3;

/// Upper bound on rejection loop passes.
pub const MAX_REJECTION_PASSES: usize = 32;

/// Default transit durations, as fractions of the trial period.
pub const DEFAULT_DURATION_FRACTIONS: [f64; 6] = [0.01, 0.02, 0.04, 0.06, 0.1, 0.15];

/// Default number of phase bins for box search folding.
pub const DEFAULT_PHASE_BINS: usize = 200;

/// Default frequency oversampling factor of the period grid.
pub const DEFAULT_PERIOD_OVERSAMPLE: f64 = 3.0;

/// Default cap on the number of trial periods.
pub const DEFAULT_MAX_PERIODS: usize = 20_000;

/// Default minimum number of points inside a box window.
pub const DEFAULT_MIN_IN_TRANSIT_POINTS: usize = 3;

/// Fewest light-curve points the period search accepts.
pub const MIN_PERIOD_SEARCH_POINTS: usize = 4;

/// Minimum item count to use Rayon parallelism.
pub const PARALLEL_ITEM_THRESHOLD: usize = 64;
