pub mod compare;
pub mod config;
pub mod info;
pub mod matching;
pub mod period;
pub mod photometry;
pub mod pipeline;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use transit_core::frame::SkyPosition;
use transit_core::io::ArtifactStore;
use transit_core::pipeline::PipelineConfig;

/// Options shared by the single-stage commands.
#[derive(Args)]
pub struct StageArgs {
    /// Work directory holding the artifacts
    #[arg(short, long, default_value = "transit-work")]
    pub work_dir: PathBuf,

    /// Pipeline config file (TOML) to take stage parameters from
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl StageArgs {
    pub fn store(&self) -> Result<ArtifactStore> {
        ArtifactStore::open(&self.work_dir)
            .with_context(|| format!("Failed to open work directory {}", self.work_dir.display()))
    }

    pub fn load_config(&self) -> Result<Option<PipelineConfig>> {
        self.config.as_deref().map(read_config).transpose()
    }
}

pub fn read_config(path: &Path) -> Result<PipelineConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&contents).context("Invalid pipeline config")
}

/// Parse `RA,DEC` in decimal degrees.
pub fn parse_sky_position(s: &str) -> std::result::Result<SkyPosition, String> {
    let (ra, dec) = s
        .split_once(',')
        .ok_or_else(|| format!("expected RA,DEC but got '{s}'"))?;
    let ra: f64 = ra.trim().parse().map_err(|_| format!("invalid RA '{ra}'"))?;
    let dec: f64 = dec.trim().parse().map_err(|_| format!("invalid Dec '{dec}'"))?;
    Ok(SkyPosition::new(ra, dec))
}
