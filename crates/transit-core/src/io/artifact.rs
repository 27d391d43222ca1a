use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::comparison::ComparisonEnsemble;
use crate::error::Result;
use crate::matching::MatchedStars;
use crate::period::Periodogram;
use crate::photometry::LightCurve;
use crate::pipeline::{PipelineStage, RunState};

pub const MATCHED_STARS_FILE: &str = "matched_stars.json";
pub const COMPARISON_ENSEMBLE_FILE: &str = "comparison_ensemble.json";
pub const LIGHT_CURVE_FILE: &str = "light_curve.json";
pub const PERIODOGRAM_FILE: &str = "periodogram.json";
pub const RUN_STATE_FILE: &str = "run_state.json";

/// Artifact file written by a stage.
pub fn artifact_file(stage: PipelineStage) -> &'static str {
    match stage {
        PipelineStage::Matching => MATCHED_STARS_FILE,
        PipelineStage::ComparisonSelection => COMPARISON_ENSEMBLE_FILE,
        PipelineStage::Photometry => LIGHT_CURVE_FILE,
        PipelineStage::PeriodSearch => PERIODOGRAM_FILE,
    }
}

/// JSON artifacts of one run, kept together in a work directory.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) the work directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Serialize `value` to `name`. The file is written under a temporary
    /// name and renamed, so readers never see a partial artifact.
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.path(name);
        let tmp = self.path(&format!("{name}.tmp"));
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), "Artifact written");
        Ok(path)
    }

    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let reader = BufReader::new(File::open(self.path(name))?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save_matched_stars(&self, matched: &MatchedStars) -> Result<PathBuf> {
        self.save(MATCHED_STARS_FILE, matched)
    }

    pub fn load_matched_stars(&self) -> Result<MatchedStars> {
        self.load(MATCHED_STARS_FILE)
    }

    pub fn save_ensemble(&self, ensemble: &ComparisonEnsemble) -> Result<PathBuf> {
        self.save(COMPARISON_ENSEMBLE_FILE, ensemble)
    }

    pub fn load_ensemble(&self) -> Result<ComparisonEnsemble> {
        self.load(COMPARISON_ENSEMBLE_FILE)
    }

    pub fn save_light_curve(&self, curve: &LightCurve) -> Result<PathBuf> {
        self.save(LIGHT_CURVE_FILE, curve)
    }

    pub fn load_light_curve(&self) -> Result<LightCurve> {
        self.load(LIGHT_CURVE_FILE)
    }

    pub fn save_periodogram(&self, periodogram: &Periodogram) -> Result<PathBuf> {
        self.save(PERIODOGRAM_FILE, periodogram)
    }

    pub fn load_periodogram(&self) -> Result<Periodogram> {
        self.load(PERIODOGRAM_FILE)
    }

    /// Run state of this directory; a fresh state when none was saved.
    pub fn load_run_state(&self) -> Result<RunState> {
        if self.exists(RUN_STATE_FILE) {
            self.load(RUN_STATE_FILE)
        } else {
            Ok(RunState::default())
        }
    }

    pub fn save_run_state(&self, state: &RunState) -> Result<PathBuf> {
        self.save(RUN_STATE_FILE, state)
    }
}
