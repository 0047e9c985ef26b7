mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ccdred", about = "CCD reduction and differential photometry")]
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
    /// Build master bias, dark and flat frames and estimate gain and noise
    Masters(commands::masters::MastersArgs),
    /// Calibrate every science frame without photometry
    Reduce(commands::reduce::ReduceArgs),
    /// Aperture photometry on one calibrated frame
    Photometry(commands::photometry::PhotometryArgs),
    /// Run the full reduction and light curve pipeline
    Run(commands::pipeline::RunArgs),
    /// Print or save the default run configuration
    Config(commands::config::ConfigArgs),
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
        Commands::Masters(args) => commands::masters::run(args),
        Commands::Reduce(args) => commands::reduce::run(args),
        Commands::Photometry(args) => commands::photometry::run(args),
        Commands::Run(args) => commands::pipeline::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
