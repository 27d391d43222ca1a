use thiserror::Error;

use crate::pipeline::PipelineStage;

#[derive(Error, Debug)]
pub enum TransitError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid photometry input: {0}")]
    InputFormat(String),

    #[error("Star matching failed: {0}")]
    Matching(String),

    #[error("Target not found: no star within {tolerance_arcsec}\" of RA {ra}, Dec {dec}")]
    TargetNotFound {
        ra: f64,
        dec: f64,
        tolerance_arcsec: f64,
    },

    #[error("Insufficient comparison stars: {0}")]
    InsufficientComparisonStars(String),

    #[error("Non-physical value: {0}")]
    Numeric(String),

    #[error("No frame contains both the target and an ensemble member")]
    EmptyLightCurve,

    #[error("Period search failed: {0}")]
    PeriodSearch(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Artifact error: {0}")]
    Artifact(#[from] serde_json::Error),

    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: PipelineStage,
        #[source]
        source: Box<TransitError>,
    },
}

impl TransitError {
    /// Wrap a dataset-wide failure with the stage that produced it.
    pub fn in_stage(self, stage: PipelineStage) -> Self {
        match self {
            already @ Self::StageFailed { .. } => already,
            other => Self::StageFailed {
                stage,
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, TransitError>;
