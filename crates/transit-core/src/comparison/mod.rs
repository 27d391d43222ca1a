pub mod config;
pub mod ensemble;
pub mod variability;

pub use config::ComparisonParams;
pub use ensemble::{
    select_comparison_stars, CandidateStatus, CandidateVariability, ComparisonEnsemble,
    EnsembleMember,
};
