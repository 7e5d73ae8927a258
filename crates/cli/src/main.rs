mod args;
mod commands;
pub mod defaults;
mod printing;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use args::{ExportArgs, InitArgs, RunArgs};
use commands::{export, info, init, run};

/// pfix: fixation probabilities of tracked lineages
///
/// Simulates a finite population of organisms that are born, die and switch
/// between phenotype states in continuous time, and estimates how often a
/// tracked lineage takes over the population.
#[derive(Parser, Debug)]
#[command(name = "pfix")]
#[command(author, version, about = "Estimates fixation probabilities by repeated simulation", long_about = None)]
struct Cli {
    /// Number of threads to use for parallel trials
    ///
    /// If not specified, defaults to the number of logical CPUs.
    #[arg(short = 't', long, global = true)]
    threads: Option<usize>,

    /// More log output on stderr (-v info, -vv debug; RUST_LOG overrides)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file to edit.
    Init(InitArgs),

    /// Run the trials of a configuration and print the fixation probability.
    ///
    /// The first line of output is the bare estimate.
    Run(RunArgs),

    /// Show the configuration and outcome counts of a recorded run.
    Info {
        /// Database path
        #[arg(short, long, default_value = defaults::OUTPUT_DB)]
        database: PathBuf,
    },

    /// Export the time series of one recorded trial as TSV.
    Export(ExportArgs),
}

fn init_logging(verbose: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(defaults::log_filter(verbose))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    match cli.command {
        Commands::Init(args) => init::init_config(&args)?,
        Commands::Run(args) => run::run_trials(&args)?,
        Commands::Info { database } => info::show_info(&database)?,
        Commands::Export(args) => export::export_series(&args)?,
    }

    Ok(())
}
