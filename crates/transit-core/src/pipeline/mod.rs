pub mod config;
mod orchestrator;
mod types;

pub use config::PipelineConfig;
pub use orchestrator::{
    run_comparison_stage, run_matching_stage, run_period_stage, run_photometry_stage,
    run_pipeline, run_pipeline_on_frames, run_pipeline_reported,
};
pub use types::{PipelineOutput, PipelineStage, ProgressReporter, RunState};
