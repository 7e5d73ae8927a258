//! Commonly used imports for convenience.
//!
//! # Example
//!
//! ```
//! use pfix_sim::prelude::*;
//!
//! let mut config = Configuration::default();
//! config.execution.trials = 10;
//! config.execution.seed = Some(1);
//! let summary = run_trials(&config, &config.state_table(), TrialOptions::default()).unwrap();
//! assert_eq!(summary.trials, 10);
//! ```

pub use crate::base::Allele;
pub use crate::errors;
pub use crate::evolution::{BirthRateBound, MutationOutcome};
pub use crate::genome::Organism;
pub use crate::simulation::{
    Condition, Configuration, EventKind, Experiment, Observer, Population, PopulationBuilder,
    StateEntry, StateParams, StateTable, TrialOptions, TrialOutcome, TrialSummary, run_trials,
};
pub use crate::storage::{PopulationSnapshot, ReportRow, TimeSeries};
