pub mod bls;
pub mod grid;

pub use bls::{
    search_period, search_period_with_progress, PeriodogramEntry, Periodogram, TransitCandidate,
};
pub use grid::{period_grid, PeriodSearchParams};
