//! Experiment driver: runs one population until a stop condition holds.
//!
//! The loop follows the Gillespie scheme: execute one event, advance the
//! simulated clock by an exponential waiting time at the new total event
//! rate, then check whether a snapshot is due. After every snapshot the
//! population's birth-rate bounds are rescanned before the next event.

use crate::errors::ExperimentError;
use crate::simulation::{Condition, Population};
use rand::Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, trace};

/// How a single trial ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialOutcome {
    /// Every surviving organism is tracked.
    Fixed,
    /// No tracked organism is left.
    Lost,
    /// The population died out.
    Extinct,
    /// The run stopped with tracked and untracked organisms alive.
    Unresolved,
}

impl TrialOutcome {
    /// Classify the final state of `pop`.
    pub fn classify(pop: &Population) -> Self {
        if pop.is_empty() {
            Self::Extinct
        } else if pop.is_lost() {
            Self::Lost
        } else if pop.is_fixed() {
            Self::Fixed
        } else {
            Self::Unresolved
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Lost => "lost",
            Self::Extinct => "extinct",
            Self::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for TrialOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrialOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "lost" => Ok(Self::Lost),
            "extinct" => Ok(Self::Extinct),
            "unresolved" => Ok(Self::Unresolved),
            other => Err(format!("Unknown trial outcome: {other}")),
        }
    }
}

/// Actions run at the start of an experiment, at every snapshot, and at the
/// end. All default to doing nothing.
pub trait Observer {
    fn on_start(&mut self, _exp: &Experiment) -> Result<(), ExperimentError> {
        Ok(())
    }

    fn on_snapshot(&mut self, _exp: &Experiment) -> Result<(), ExperimentError> {
        Ok(())
    }

    fn on_finish(&mut self, _exp: &Experiment) -> Result<(), ExperimentError> {
        Ok(())
    }
}

impl Observer for () {}

/// A population evolving in simulated time.
#[derive(Debug)]
pub struct Experiment {
    population: Population,
    time_elapsed: f64,
    /// -1 until the first mark
    time_last_snapshot: f64,
    generations_last_snapshot: f64,
    events: u64,
    stop: Condition,
    snapshot: Condition,
    max_events: Option<u64>,
}

impl Experiment {
    /// Wrap `population`. The experiment stops immediately and never takes
    /// snapshots until conditions are set.
    pub fn new(population: Population) -> Self {
        Self {
            population,
            time_elapsed: 0.0,
            time_last_snapshot: -1.0,
            generations_last_snapshot: -1.0,
            events: 0,
            stop: Condition::Always,
            snapshot: Condition::Never,
            max_events: None,
        }
    }

    pub fn with_stop_condition(mut self, stop: Condition) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_snapshot_condition(mut self, snapshot: Condition) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Stop after this many events even if the stop condition never holds.
    pub fn with_max_events(mut self, max_events: Option<u64>) -> Self {
        self.max_events = max_events;
        self
    }

    #[inline]
    pub fn population(&self) -> &Population {
        &self.population
    }

    #[inline]
    pub fn population_mut(&mut self) -> &mut Population {
        &mut self.population
    }

    pub fn into_population(self) -> Population {
        self.population
    }

    #[inline]
    pub fn time_elapsed(&self) -> f64 {
        self.time_elapsed
    }

    #[inline]
    pub fn generations_elapsed(&self) -> f64 {
        self.population.generations()
    }

    #[inline]
    pub fn time_last_snapshot(&self) -> f64 {
        self.time_last_snapshot
    }

    #[inline]
    pub fn generations_last_snapshot(&self) -> f64 {
        self.generations_last_snapshot
    }

    /// Events executed so far.
    #[inline]
    pub fn events(&self) -> u64 {
        self.events
    }

    pub fn stop_condition(&self) -> &Condition {
        &self.stop
    }

    pub fn snapshot_condition(&self) -> &Condition {
        &self.snapshot
    }

    fn mark_snapshot(&mut self) {
        self.time_last_snapshot = self.time_elapsed;
        self.generations_last_snapshot = self.population.generations();
    }

    /// Run until the stop condition holds, the population dies out, or the
    /// event limit is reached.
    ///
    /// # Errors
    /// Returns [`ExperimentError::Stalled`] if the stop condition is false
    /// while no event can occur, and propagates observer failures.
    pub fn run<R, O>(&mut self, rng: &mut R, observer: &mut O) -> Result<TrialOutcome, ExperimentError>
    where
        R: Rng + ?Sized,
        O: Observer + ?Sized,
    {
        observer.on_start(self)?;
        self.mark_snapshot();

        while !self.stop.is_met(self) {
            if self.max_events.is_some_and(|max| self.events >= max) {
                debug!(events = self.events, "Event limit reached");
                break;
            }
            let rate = self.population.total_event_rate();
            if rate <= 0.0 {
                return Err(ExperimentError::Stalled {
                    rate,
                    events: self.events,
                });
            }

            let kind = self.population.do_event(rng);
            self.events += 1;
            trace!(?kind, events = self.events, "Event");
            if self.population.is_empty() {
                debug!(events = self.events, "Population went extinct");
                break;
            }

            // A population that can no longer change waits forever; the
            // clock stays put and the next pass reports the stall.
            let rate = self.population.total_event_rate();
            if rate > 0.0 {
                let waiting = Exp::new(rate).map_err(|_| ExperimentError::Stalled {
                    rate,
                    events: self.events,
                })?;
                self.time_elapsed += waiting.sample(rng);
            }

            if self.snapshot.is_met(self) {
                observer.on_snapshot(self)?;
                self.mark_snapshot();
                self.population.update_birth_ub();
            }
        }

        observer.on_finish(self)?;
        self.mark_snapshot();
        Ok(TrialOutcome::classify(&self.population))
    }
}
