use clap::Args;
use std::path::PathBuf;

use crate::defaults;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Output configuration path
    #[arg(short, long, default_value = defaults::CONFIG_FILE)]
    pub output: PathBuf,

    /// Write a legacy `name = value` parameter file instead of JSON
    #[arg(long)]
    pub legacy: bool,

    /// Number of independent trials
    #[arg(long)]
    pub trials: Option<usize>,

    /// Population size
    #[arg(short = 'n', long)]
    pub capacity: Option<usize>,

    /// Tracked organisms at the start of each trial
    #[arg(long)]
    pub tracked: Option<usize>,

    /// Random seed (omit for a fresh seed every run)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file (JSON or legacy parameter file)
    #[arg(short, long, default_value = defaults::CONFIG_FILE)]
    pub config: PathBuf,

    /// Override the number of trials
    #[arg(long)]
    pub trials: Option<usize>,

    /// Override the random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Record trial outcomes and time series to this database
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Write one TSV time series per trial into this directory
    #[arg(long)]
    pub tsv: Option<PathBuf>,

    /// Show progress bar
    #[arg(long)]
    pub progress: bool,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Database path
    #[arg(short, long, default_value = defaults::OUTPUT_DB)]
    pub database: PathBuf,

    /// Trial whose time series to export
    #[arg(short, long)]
    pub trial: usize,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
