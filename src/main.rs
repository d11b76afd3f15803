use clap::{Parser, Subcommand};
use std::io::{stdin, stdout, BufWriter};
use std::path::PathBuf;

mod config;
mod dataset;
mod error;
mod phases;
mod protocol;
mod report;
mod rollback;
mod runtime;

use config::PipelineConfig;
use runtime::PipelineDriver;

#[derive(Parser)]
#[command(name = "rif")]
#[command(about = "ReviewInsightFactory - phased enrichment pipeline for tourism review corpora", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every pending phase in order
    Run {
        /// Path to pipeline YAML file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Re-run phases even when their output already exists
        #[arg(long)]
        force: bool,
        /// Start at this phase instead of phase 1
        #[arg(long, default_value_t = 1)]
        from: u8,
    },
    /// Run a single phase
    Phase {
        /// Phase number (1..=8)
        number: u8,
        /// Path to pipeline YAML file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Re-run the phase even when its output already exists
        #[arg(long)]
        force: bool,
    },
    /// Show which phases are applied and whether a run was interrupted
    Status {
        /// Path to pipeline YAML file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Check the dataset file for structural problems
    Validate {
        /// Path to pipeline YAML file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the current insight report
    Report {
        /// Path to pipeline YAML file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Serve the line protocol over stdin/stdout (what the UI launches)
    Serve {
        /// Path to pipeline YAML file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show version information
    Version,
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => Ok(PipelineConfig::from_yaml_file(&path)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn driver_for(path: Option<PathBuf>) -> anyhow::Result<PipelineDriver> {
    let config = load_config(path)?;
    let mut driver = PipelineDriver::new(config)?;
    driver.recover_interrupted()?;
    Ok(driver)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, force, from } => {
            let mut driver = driver_for(config)?;
            driver.run_from(from, force)?;
        }
        Commands::Phase {
            number,
            config,
            force,
        } => {
            let mut driver = driver_for(config)?;
            driver.run_single(number, force)?;
        }
        Commands::Status { config } => {
            // Status never mutates, so interrupted sessions are reported
            // instead of recovered here.
            let driver = PipelineDriver::new(load_config(config)?)?;
            let status = driver.status()?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Validate { config } => {
            let driver = PipelineDriver::new(load_config(config)?)?;
            let validation = driver.validate();
            println!("{}", serde_json::to_string_pretty(&validation)?);
            if validation.valido {
                println!("✓ Dataset is structurally valid");
            } else {
                anyhow::bail!("dataset failed validation");
            }
        }
        Commands::Report { config } => {
            let driver = PipelineDriver::new(load_config(config)?)?;
            let report = driver.report()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Serve { config } => {
            let mut driver = driver_for(config)?;
            let stdin = stdin();
            let stdout = stdout();
            let mut writer = BufWriter::new(stdout.lock());
            protocol::serve(&mut driver, stdin.lock(), &mut writer)?;
        }
        Commands::Version => {
            println!("rif version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
