use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use transit_core::pipeline::PipelineConfig;
use transit_core::target::TargetConfig;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save a full default PipelineConfig as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let mut config = PipelineConfig::new("transit-work", TargetConfig::new(0.0, 0.0));
    config.inputs = vec![PathBuf::from("tables")];
    let toml_str = toml::to_string_pretty(&config)?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
