use serde::{Deserialize, Serialize};

use crate::comparison::ComparisonEnsemble;
use crate::matching::MatchedStars;
use crate::period::Periodogram;
use crate::photometry::LightCurve;

/// Pipeline processing stage, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    Matching,
    ComparisonSelection,
    Photometry,
    PeriodSearch,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 4] = [
        Self::Matching,
        Self::ComparisonSelection,
        Self::Photometry,
        Self::PeriodSearch,
    ];

    /// The stage that runs after this one, if any.
    pub fn next(self) -> Option<PipelineStage> {
        match self {
            Self::Matching => Some(Self::ComparisonSelection),
            Self::ComparisonSelection => Some(Self::Photometry),
            Self::Photometry => Some(Self::PeriodSearch),
            Self::PeriodSearch => None,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Matching => write!(f, "Matching stars"),
            Self::ComparisonSelection => write!(f, "Selecting comparison stars"),
            Self::Photometry => write!(f, "Differential photometry"),
            Self::PeriodSearch => write!(f, "Period search"),
        }
    }
}

/// Persisted progress marker of a work directory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub last_completed: Option<PipelineStage>,
}

impl RunState {
    pub fn is_complete(&self, stage: PipelineStage) -> bool {
        self.last_completed.is_some_and(|done| done >= stage)
    }

    /// First stage that still has to run, `None` when everything is done.
    pub fn next_stage(&self) -> Option<PipelineStage> {
        match self.last_completed {
            None => Some(PipelineStage::Matching),
            Some(done) => done.next(),
        }
    }
}

/// Artifacts of a complete run.
#[derive(Clone, Debug)]
pub struct PipelineOutput {
    pub matched: MatchedStars,
    pub ensemble: ComparisonEnsemble,
    pub light_curve: LightCurve,
    pub periodogram: Periodogram,
}

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started. `total_items` is the number of
    /// work items in this stage (frames or trial periods), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}

    /// The stage was satisfied from an existing artifact.
    fn skip_stage(&self, _stage: PipelineStage) {}
}

/// No-op progress reporter, used when `run_pipeline` delegates.
pub(super) struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
