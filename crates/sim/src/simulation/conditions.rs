//! Stop and snapshot predicates over a running experiment.

use crate::errors::ParameterError;
use crate::simulation::Experiment;
use serde::{Deserialize, Serialize};

/// A predicate over the state of an [`Experiment`].
///
/// Evaluated after every event, once to decide whether to stop and once to
/// decide whether to take a snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Condition {
    Always,
    #[default]
    Never,
    /// Every organism is tracked.
    Fixed,
    /// No organism is tracked.
    Lost,
    FixedOrLost,
    /// Simulated time exceeds the value.
    TimeSinceStart(f64),
    /// Elapsed generations exceed the value.
    GenerationsSinceStart(f64),
    /// More than the value has elapsed since the last snapshot.
    TimeSinceLastSnapshot(f64),
    GenerationsSinceLastSnapshot(f64),
    /// Mean individual birth rate exceeds the value.
    MeanBirthRateAbove(f64),
    /// Any of the inner conditions holds.
    Any(Vec<Condition>),
}

impl Condition {
    /// Evaluate the predicate.
    pub fn is_met(&self, exp: &Experiment) -> bool {
        let pop = exp.population();
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Fixed => pop.is_fixed(),
            Self::Lost => pop.is_lost(),
            Self::FixedOrLost => pop.is_fixed() || pop.is_lost(),
            Self::TimeSinceStart(t) => exp.time_elapsed() > *t,
            Self::GenerationsSinceStart(g) => pop.generations() > *g,
            Self::TimeSinceLastSnapshot(dt) => {
                exp.time_elapsed() > exp.time_last_snapshot() + dt
            }
            Self::GenerationsSinceLastSnapshot(dg) => {
                pop.generations() > exp.generations_last_snapshot() + dg
            }
            Self::MeanBirthRateAbove(b) => pop.mean_birth_rate() > *b,
            Self::Any(inner) => inner.iter().any(|c| c.is_met(exp)),
        }
    }

    /// Check thresholds: start thresholds must be non-negative, snapshot
    /// intervals positive.
    pub fn validate(&self) -> Result<(), ParameterError> {
        let require = |name, value: f64, ok: bool, constraint| {
            if ok {
                Ok(())
            } else {
                Err(ParameterError::OutOfRange {
                    name,
                    value,
                    constraint,
                })
            }
        };
        match *self {
            Self::TimeSinceStart(t) => require("time_since_start", t, t >= 0.0, ">= 0"),
            Self::GenerationsSinceStart(g) => {
                require("generations_since_start", g, g >= 0.0, ">= 0")
            }
            Self::MeanBirthRateAbove(b) => require("mean_birth_rate_above", b, b >= 0.0, ">= 0"),
            Self::TimeSinceLastSnapshot(dt) => {
                require("time_since_last_snapshot", dt, dt > 0.0, "> 0")
            }
            Self::GenerationsSinceLastSnapshot(dg) => {
                require("generations_since_last_snapshot", dg, dg > 0.0, "> 0")
            }
            Self::Any(ref inner) => inner.iter().try_for_each(Condition::validate),
            _ => Ok(()),
        }
    }
}
