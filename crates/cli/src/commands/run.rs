use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use pfix_sim::simulation::{Configuration, TrialOptions, TrialSummary, run_trials_with};
use pfix_sim::storage::{Recorder, TsvWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

use crate::args::RunArgs;
use crate::printing::{print_parameters, print_summary};

pub fn run_trials(args: &RunArgs) -> Result<()> {
    let mut config = Configuration::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if let Some(trials) = args.trials {
        config.execution.trials = trials;
    }
    if args.seed.is_some() {
        config.execution.seed = args.seed;
    }
    config.validate().context("Invalid configuration")?;

    let options = TrialOptions {
        keep_series: args.tsv.is_some() || args.database.is_some(),
    };

    let pb = if args.progress {
        let pb = ProgressBar::new(config.execution.trials as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {per_sec}",
                )?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let table = config.state_table();
    let summary = run_trials_with(&config, &table, options, |_| {
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    })
    .context("Simulation failed")?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    // Bare estimate first, for scripts.
    println!("{}", summary.fixation_probability());
    print_parameters(&config);
    print_summary(&summary);

    if let Some(dir) = &args.tsv {
        write_tsv(dir, &summary)?;
        println!("✓ Time series written to {}", dir.display());
    }

    if let Some(database) = &args.database {
        let mut recorder =
            Recorder::new(database, &config).context("Failed to create recorder")?;
        recorder
            .record_summary(&summary)
            .context("Failed to record trials")?;
        let stats = recorder.close().context("Failed to close recorder")?;
        info!(trials = stats.trials_recorded, rows = stats.rows_recorded, "Recorded run");
        println!("✓ Results recorded to {}", database.display());
    }

    Ok(())
}

fn write_tsv(dir: &Path, summary: &TrialSummary) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    for report in &summary.reports {
        let path = dir.join(format!("trial_{:05}.tsv", report.index));
        let file =
            File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
        let mut writer = TsvWriter::new(BufWriter::new(file));
        writer.write_rows(&report.series)?;
        writer.flush()?;
    }
    Ok(())
}
