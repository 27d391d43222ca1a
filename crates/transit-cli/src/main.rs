mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "transit", about = "Differential photometry and transit search tool")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match detections across photometry tables into a star list
    Match(commands::matching::MatchArgs),
    /// Identify the target and select comparison stars
    Compare(commands::compare::CompareArgs),
    /// Compute the target's differential light curve
    Photometry(commands::photometry::PhotometryArgs),
    /// Search the light curve for a periodic transit
    Period(commands::period::PeriodArgs),
    /// Run the full pipeline
    Run(commands::pipeline::RunArgs),
    /// Print or save a default pipeline config
    Config(commands::config::ConfigArgs),
    /// Show the artifacts and run state of a work directory
    Info(commands::info::InfoArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Match(args) => commands::matching::run(args),
        Commands::Compare(args) => commands::compare::run(args),
        Commands::Photometry(args) => commands::photometry::run(args),
        Commands::Period(args) => commands::period::run(args),
        Commands::Run(args) => commands::pipeline::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Info(args) => commands::info::run(args),
    }
}
