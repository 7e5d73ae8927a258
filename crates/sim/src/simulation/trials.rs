//! Repeated independent trials and the fixation-probability estimate.
//!
//! Trials share nothing mutable: each one builds its own population from
//! the shared, read-only state table and draws from its own
//! `Xoshiro256PlusPlus` stream. The per-trial seeds are drawn up front from
//! a master generator, so results do not depend on how rayon schedules the
//! trials.

use crate::errors::TrialError;
use crate::simulation::{Configuration, Experiment, PopulationBuilder, StateTable, TrialOutcome};
use crate::storage::{ReportRow, TimeSeries};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Options for a batch of trials.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrialOptions {
    /// Keep the time series of every trial in its report.
    pub keep_series: bool,
}

/// Result of one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialReport {
    pub index: usize,
    pub seed: u64,
    pub outcome: TrialOutcome,
    pub generations: f64,
    pub time: f64,
    pub events: u64,
    pub final_org_count: usize,
    pub births: u64,
    pub deaths: u64,
    pub tracked_births: u64,
    pub tracked_deaths: u64,
    #[serde(default)]
    pub series: Vec<ReportRow>,
}

/// Aggregate over a batch of trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialSummary {
    /// Master seed the per-trial seeds were drawn from
    pub seed: u64,
    pub trials: usize,
    pub fixed: usize,
    pub lost: usize,
    pub extinct: usize,
    pub unresolved: usize,
    /// Reports ordered by trial index
    pub reports: Vec<TrialReport>,
}

impl TrialSummary {
    fn from_reports(seed: u64, reports: Vec<TrialReport>) -> Self {
        let count = |o| reports.iter().filter(|r| r.outcome == o).count();
        Self {
            seed,
            trials: reports.len(),
            fixed: count(TrialOutcome::Fixed),
            lost: count(TrialOutcome::Lost),
            extinct: count(TrialOutcome::Extinct),
            unresolved: count(TrialOutcome::Unresolved),
            reports,
        }
    }

    /// Fraction of trials in which the tracked lineage took over.
    pub fn fixation_probability(&self) -> f64 {
        self.fraction(self.fixed)
    }

    /// Fraction of trials in which the tracked lineage disappeared.
    pub fn loss_probability(&self) -> f64 {
        self.fraction(self.lost)
    }

    pub fn count(&self, outcome: TrialOutcome) -> usize {
        match outcome {
            TrialOutcome::Fixed => self.fixed,
            TrialOutcome::Lost => self.lost,
            TrialOutcome::Extinct => self.extinct,
            TrialOutcome::Unresolved => self.unresolved,
        }
    }

    fn fraction(&self, n: usize) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            n as f64 / self.trials as f64
        }
    }
}

/// Run one trial with its own generator.
pub fn run_trial(
    index: usize,
    seed: u64,
    config: &Configuration,
    builder: &PopulationBuilder,
    options: TrialOptions,
) -> Result<TrialReport, TrialError> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut exp = Experiment::new(builder.build()?)
        .with_stop_condition(config.execution.stop.clone())
        .with_snapshot_condition(config.execution.snapshot.clone())
        .with_max_events(config.execution.max_events);

    let mut series = TimeSeries::new();
    let outcome = if options.keep_series {
        exp.run(&mut rng, &mut series)
    } else {
        exp.run(&mut rng, &mut ())
    }
    .map_err(|source| TrialError::Experiment {
        trial: index,
        source,
    })?;

    let pop = exp.population();
    debug!(trial = index, %outcome, events = exp.events(), "Trial finished");
    Ok(TrialReport {
        index,
        seed,
        outcome,
        generations: pop.generations(),
        time: exp.time_elapsed(),
        events: exp.events(),
        final_org_count: pop.org_count(),
        births: pop.births(),
        deaths: pop.deaths(),
        tracked_births: pop.tracked_births(),
        tracked_deaths: pop.tracked_deaths(),
        series: series.into_rows(),
    })
}

/// Run `config.execution.trials` trials in parallel.
pub fn run_trials(
    config: &Configuration,
    table: &Arc<StateTable>,
    options: TrialOptions,
) -> Result<TrialSummary, TrialError> {
    run_trials_with(config, table, options, |_| {})
}

/// Like [`run_trials`], calling `on_trial` as each trial completes (in
/// completion order, possibly from several threads).
pub fn run_trials_with<F>(
    config: &Configuration,
    table: &Arc<StateTable>,
    options: TrialOptions,
    on_trial: F,
) -> Result<TrialSummary, TrialError>
where
    F: Fn(&TrialReport) + Sync,
{
    config.validate()?;
    let builder = config.population_builder(Arc::clone(table));
    // Fail before spawning if the population cannot be built.
    builder.build()?;

    let master_seed = config
        .execution
        .seed
        .unwrap_or_else(|| rand::rng().random());
    let mut master = Xoshiro256PlusPlus::seed_from_u64(master_seed);
    let seeds: Vec<u64> = (0..config.execution.trials)
        .map(|_| master.random())
        .collect();

    let reports = seeds
        .par_iter()
        .enumerate()
        .map(|(index, &seed)| {
            let report = run_trial(index, seed, config, &builder, options)?;
            on_trial(&report);
            Ok(report)
        })
        .collect::<Result<Vec<_>, TrialError>>()?;

    let summary = TrialSummary::from_reports(master_seed, reports);
    info!(
        trials = summary.trials,
        fixed = summary.fixed,
        lost = summary.lost,
        extinct = summary.extinct,
        unresolved = summary.unresolved,
        "Trials complete"
    );
    Ok(summary)
}
