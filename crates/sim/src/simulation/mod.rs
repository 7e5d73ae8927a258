//! Simulation engine and population management.
//!
//! - `Population`: the lineage-aware population with per-state event rates.
//! - `Experiment`: drives one population through time until a stop
//!   condition holds.
//! - `PopulationBuilder`: fluent builder for initial populations.
//! - `run_trials`: repeated independent trials in parallel.

pub mod builder;
pub mod conditions;
pub mod configs;
pub mod engine;
pub mod parameters;
pub mod population;
pub mod trials;

pub use builder::{FounderGroup, PopulationBuilder};
pub use conditions::Condition;
pub use configs::{Configuration, ExecutionConfig, ParameterFile, PopulationConfig};
pub use engine::{Experiment, Observer, TrialOutcome};
pub use parameters::{
    ParameterSource, STATE_COUNT, StateEntry, StateParams, StateTable, state_key,
};
pub use population::{EventCounters, EventKind, Population};
pub use trials::{
    TrialOptions, TrialReport, TrialSummary, run_trial, run_trials, run_trials_with,
};
