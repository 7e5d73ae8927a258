//! Experiment configuration.
//!
//! A [`Configuration`] fully describes a fixation-probability estimate: how
//! many trials to run and how, the initial population, and the phenotype
//! states. It is stored as JSON, and can also be read from the plain
//! `name = value` parameter files used by older runs.

use crate::base::Allele;
use crate::errors::ParameterError;
use crate::evolution::BirthRateBound;
use crate::simulation::{
    Condition, ParameterSource, PopulationBuilder, STATE_COUNT, StateEntry, StateParams,
    StateTable, state_key,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// The master configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub execution: ExecutionConfig,
    pub population: PopulationConfig,
    pub states: StateTable,
}

/// How trials are run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Number of independent trials
    pub trials: usize,
    /// Optional RNG seed for reproducibility
    #[serde(default)]
    pub seed: Option<u64>,
    /// When a trial ends
    #[serde(default = "default_stop")]
    pub stop: Condition,
    /// When a trial records a time-series row
    #[serde(default)]
    pub snapshot: Condition,
    #[serde(default)]
    pub bound: BirthRateBound,
    /// Give up on a trial after this many events
    #[serde(default)]
    pub max_events: Option<u64>,
}

fn default_stop() -> Condition {
    Condition::FixedOrLost
}

fn default_tracked_state() -> usize {
    1
}

/// Initial population: `capacity - tracked_initial` untracked organisms and
/// `tracked_initial` tracked ones, each group forming one lineage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationConfig {
    pub capacity: usize,
    pub tracked_initial: usize,
    #[serde(default = "default_tracked_state")]
    pub tracked_state: usize,
    #[serde(default)]
    pub untracked_state: usize,
    #[serde(default)]
    pub tracked_allele: Allele,
    #[serde(default)]
    pub untracked_allele: Allele,
}

impl Default for Configuration {
    fn default() -> Self {
        let resident = StateParams {
            mut_rate_ben: 0.0,
            mut_rate_del: 0.0,
            sel_coeff_ben: 0.0,
            sel_coeff_del: 0.0,
            birth_prefactor: 1.0,
            change_rate: 0.0,
            death_rate: 0.0,
        };
        let switching = StateParams {
            mut_rate_ben: 1e-3,
            mut_rate_del: 1e-3,
            sel_coeff_ben: 0.1,
            sel_coeff_del: 0.1,
            birth_prefactor: 1.0,
            change_rate: 0.01,
            death_rate: 0.0,
        };
        // Validation cannot fail for these literals.
        let entry = |params| StateEntry::new(params).unwrap_or_else(|_| StateEntry::inert());
        Self {
            execution: ExecutionConfig {
                trials: 1000,
                seed: None,
                stop: default_stop(),
                snapshot: Condition::Never,
                bound: BirthRateBound::Running,
                max_events: None,
            },
            population: PopulationConfig {
                capacity: 100,
                tracked_initial: 1,
                tracked_state: 1,
                untracked_state: 0,
                tracked_allele: Allele::Neutral,
                untracked_allele: Allele::Neutral,
            },
            states: StateTable::new(vec![entry(resident), entry(switching), entry(switching)]),
        }
    }
}

impl Configuration {
    /// Resolve a configuration from a legacy parameter source.
    ///
    /// Required keys: `trials`, `pop_capacity`, `cells_init_tracked` and the
    /// per-state keys read by [`StateEntry::from_source`]. `seed` is
    /// optional.
    pub fn from_source<S: ParameterSource + ?Sized>(source: &S) -> Result<Self, ParameterError> {
        let seed = if source.contains("seed") {
            Some(source.get_u64("seed")?)
        } else {
            None
        };
        Ok(Self {
            execution: ExecutionConfig {
                trials: source.get_usize("trials")?,
                seed,
                stop: default_stop(),
                snapshot: Condition::Never,
                bound: BirthRateBound::Running,
                max_events: None,
            },
            population: PopulationConfig {
                capacity: source.get_usize("pop_capacity")?,
                tracked_initial: source.get_usize("cells_init_tracked")?,
                tracked_state: 1,
                untracked_state: 0,
                tracked_allele: Allele::Neutral,
                untracked_allele: Allele::Neutral,
            },
            states: StateTable::from_source(source, STATE_COUNT)?,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, ParameterError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, ParameterError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a configuration file: JSON if it starts with `{`, otherwise a
    /// legacy parameter file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ParameterError> {
        let text = std::fs::read_to_string(path)?;
        let config = if text.trim_start().starts_with('{') {
            Self::from_json_str(&text)?
        } else {
            Self::from_source(&text.parse::<ParameterFile>()?)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ParameterError> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Check the cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ParameterError> {
        let states = self.states.state_count();
        let pop = &self.population;
        if self.execution.trials == 0 {
            return Err(ParameterError::OutOfRange {
                name: "trials",
                value: 0.0,
                constraint: "> 0",
            });
        }
        if pop.tracked_initial > pop.capacity {
            return Err(ParameterError::OutOfRange {
                name: "tracked_initial",
                value: pop.tracked_initial as f64,
                constraint: "<= capacity",
            });
        }
        for index in [pop.tracked_state, pop.untracked_state] {
            if index >= states {
                return Err(ParameterError::StateIndex {
                    index,
                    count: states,
                });
            }
        }
        self.execution.stop.validate()?;
        self.execution.snapshot.validate()
    }

    /// The state table, ready to be shared between trials.
    pub fn state_table(&self) -> Arc<StateTable> {
        Arc::new(self.states.clone())
    }

    /// Builder producing the initial population of every trial.
    pub fn population_builder(&self, table: Arc<StateTable>) -> PopulationBuilder {
        let pop = &self.population;
        PopulationBuilder::new()
            .state_table(table)
            .capacity(pop.capacity)
            .bound(self.execution.bound)
            .founders(
                pop.capacity - pop.tracked_initial.min(pop.capacity),
                pop.untracked_state,
                pop.untracked_allele,
                false,
            )
            .founders(pop.tracked_initial, pop.tracked_state, pop.tracked_allele, true)
    }

    /// Render as a legacy parameter file.
    pub fn to_parameter_file(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "trials = {}", self.execution.trials);
        let _ = writeln!(out, "pop_capacity = {}", self.population.capacity);
        let _ = writeln!(out, "cells_init_tracked = {}", self.population.tracked_initial);
        if let Some(seed) = self.execution.seed {
            let _ = writeln!(out, "seed = {seed}");
        }
        for (st, entry) in self.states.iter().enumerate() {
            let _ = writeln!(out);
            let _ = writeln!(out, "{} = {}", state_key("mut_ben", st), entry.mut_rate_ben());
            let _ = writeln!(out, "{} = {}", state_key("mut_del", st), entry.mut_rate_del());
            let _ = writeln!(out, "{} = {}", state_key("s_ben", st), entry.sel_coeff_ben());
            let _ = writeln!(out, "{} = {}", state_key("s_del", st), entry.sel_coeff_del());
            let _ = writeln!(
                out,
                "{} = {}",
                state_key("birth_prefactor", st),
                entry.birth_prefactor()
            );
            let _ = writeln!(
                out,
                "{} = {}",
                state_key("log_chg_rate", st),
                entry.change_rate().log10()
            );
            let _ = writeln!(out, "{} = {}", state_key("death_rate", st), entry.death_rate());
        }
        out
    }
}

/// A plain-text parameter file of `name = value` lines.
///
/// Blank lines and `#` comments are ignored. A name may appear once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterFile {
    values: HashMap<String, String>,
}

impl ParameterFile {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ParameterError> {
        std::fs::read_to_string(path)?.parse()
    }

    /// Raw text of a parameter.
    pub fn get_str(&self, key: &str) -> Result<&str, ParameterError> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ParameterError::Missing(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn parse_value<T: FromStr>(&self, key: &str) -> Result<T, ParameterError> {
        let raw = self.get_str(key)?;
        raw.parse().map_err(|_| ParameterError::Unparsable {
            key: key.to_string(),
            value: raw.to_string(),
        })
    }
}

impl FromStr for ParameterFile {
    type Err = ParameterError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut values = HashMap::new();
        for (i, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let malformed = || ParameterError::Malformed {
                line: i + 1,
                text: raw.to_string(),
            };
            let (name, value) = line.split_once('=').ok_or_else(malformed)?;
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || value.is_empty() || name.contains(char::is_whitespace) {
                return Err(malformed());
            }
            if values.insert(name.to_string(), value.to_string()).is_some() {
                return Err(malformed());
            }
        }
        Ok(Self { values })
    }
}

impl ParameterSource for ParameterFile {
    fn get_f64(&self, key: &str) -> Result<f64, ParameterError> {
        self.parse_value(key)
    }

    fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get_usize(&self, key: &str) -> Result<usize, ParameterError> {
        self.parse_value(key)
    }

    fn get_u64(&self, key: &str) -> Result<u64, ParameterError> {
        self.parse_value(key)
    }
}
