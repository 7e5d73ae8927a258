//! Per-phenotype-state parameters.
//!
//! Every organism sits in one of a small number of phenotype states. A state
//! fixes how fast its occupants are born, die, switch state and mutate. The
//! table of states is configured once, wrapped in an `Arc`, and then read by
//! every population and trial without further mutation.

use crate::base::Allele;
use crate::errors::ParameterError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of phenotype states in the switching topology used here.
///
/// State 0 never switches; states 1 and 2 switch into each other.
pub const STATE_COUNT: usize = 3;

/// Typed key lookup over an external parameter store.
///
/// Values are resolved by name; per-state values use the `<base>_s<i>`
/// suffix convention (see [`state_key`]).
pub trait ParameterSource {
    /// Look up a floating-point parameter.
    fn get_f64(&self, key: &str) -> Result<f64, ParameterError>;

    /// Whether the key is present at all.
    fn contains(&self, key: &str) -> bool;

    /// Look up a non-negative integer parameter.
    fn get_usize(&self, key: &str) -> Result<usize, ParameterError> {
        let value = self.get_f64(key)?;
        if value >= 0.0 && value.fract() == 0.0 && value <= usize::MAX as f64 {
            Ok(value as usize)
        } else {
            Err(ParameterError::Unparsable {
                key: key.to_string(),
                value: value.to_string(),
            })
        }
    }

    /// Look up an unsigned 64-bit parameter (seeds).
    fn get_u64(&self, key: &str) -> Result<u64, ParameterError> {
        self.get_usize(key).map(|v| v as u64)
    }
}

impl ParameterSource for HashMap<String, f64> {
    fn get_f64(&self, key: &str) -> Result<f64, ParameterError> {
        self.get(key)
            .copied()
            .ok_or_else(|| ParameterError::Missing(key.to_string()))
    }

    fn contains(&self, key: &str) -> bool {
        self.contains_key(key)
    }
}

/// Build the per-state key for `base` and state index `state`, e.g.
/// `state_key("mut_ben", 0) == "mut_ben_s0"`.
pub fn state_key(base: &str, state: usize) -> String {
    format!("{base}_s{state}")
}

/// Raw, unvalidated values of one state. This is also the serialized shape
/// of a [`StateEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StateParams {
    /// Rate of beneficial mutation per replication
    pub mut_rate_ben: f64,
    /// Rate of deleterious mutation per replication
    pub mut_rate_del: f64,
    /// Selection coefficient of the beneficial allele
    pub sel_coeff_ben: f64,
    /// Selection coefficient of the deleterious allele, in [0, 1]
    pub sel_coeff_del: f64,
    /// Birth rate of the neutral genotype
    pub birth_prefactor: f64,
    /// Rate at which an organism switches to the partner state
    pub change_rate: f64,
    /// Death rate per unit time
    pub death_rate: f64,
}

/// Validated parameters of one phenotype state.
///
/// Construct with [`StateEntry::new`]; the per-replication mutation
/// probabilities `1 - exp(-rate)` are cached at construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StateParams", into = "StateParams")]
pub struct StateEntry {
    params: StateParams,
    mut_prob_ben: f64,
    mut_prob_del: f64,
}

fn check(name: &'static str, value: f64, ok: bool, constraint: &'static str) -> Result<(), ParameterError> {
    if value.is_finite() && ok {
        Ok(())
    } else {
        Err(ParameterError::OutOfRange {
            name,
            value,
            constraint,
        })
    }
}

impl StateEntry {
    /// Validate `params` and build a state entry.
    ///
    /// # Errors
    /// Returns [`ParameterError::OutOfRange`] if any value is non-finite,
    /// a rate or coefficient is negative, or `sel_coeff_del > 1`.
    pub fn new(params: StateParams) -> Result<Self, ParameterError> {
        let p = &params;
        check("mut_rate_ben", p.mut_rate_ben, p.mut_rate_ben >= 0.0, ">= 0")?;
        check("mut_rate_del", p.mut_rate_del, p.mut_rate_del >= 0.0, ">= 0")?;
        check("sel_coeff_ben", p.sel_coeff_ben, p.sel_coeff_ben >= 0.0, ">= 0")?;
        check(
            "sel_coeff_del",
            p.sel_coeff_del,
            (0.0..=1.0).contains(&p.sel_coeff_del),
            "in [0, 1]",
        )?;
        check("birth_prefactor", p.birth_prefactor, p.birth_prefactor >= 0.0, ">= 0")?;
        check("change_rate", p.change_rate, p.change_rate >= 0.0, ">= 0")?;
        check("death_rate", p.death_rate, p.death_rate >= 0.0, ">= 0")?;

        Ok(Self {
            params,
            mut_prob_ben: -(-p.mut_rate_ben).exp_m1(),
            mut_prob_del: -(-p.mut_rate_del).exp_m1(),
        })
    }

    /// The all-zero state: nothing happens to its occupants.
    pub fn inert() -> Self {
        Self {
            params: StateParams::default(),
            mut_prob_ben: 0.0,
            mut_prob_del: 0.0,
        }
    }

    /// Resolve state `state` from `source` using the `<base>_s<i>` keys.
    ///
    /// The change rate is stored in the source as `log_chg_rate` (base 10);
    /// `-inf` gives a change rate of exactly zero.
    pub fn from_source<S: ParameterSource + ?Sized>(
        source: &S,
        state: usize,
    ) -> Result<Self, ParameterError> {
        let get = |base: &str| source.get_f64(&state_key(base, state));
        Self::new(StateParams {
            mut_rate_ben: get("mut_ben")?,
            mut_rate_del: get("mut_del")?,
            sel_coeff_ben: get("s_ben")?,
            sel_coeff_del: get("s_del")?,
            birth_prefactor: get("birth_prefactor")?,
            change_rate: 10f64.powf(get("log_chg_rate")?),
            death_rate: get("death_rate")?,
        })
    }

    #[inline]
    pub fn params(&self) -> &StateParams {
        &self.params
    }

    #[inline]
    pub fn mut_rate_ben(&self) -> f64 {
        self.params.mut_rate_ben
    }

    #[inline]
    pub fn mut_rate_del(&self) -> f64 {
        self.params.mut_rate_del
    }

    #[inline]
    pub fn sel_coeff_ben(&self) -> f64 {
        self.params.sel_coeff_ben
    }

    #[inline]
    pub fn sel_coeff_del(&self) -> f64 {
        self.params.sel_coeff_del
    }

    #[inline]
    pub fn birth_prefactor(&self) -> f64 {
        self.params.birth_prefactor
    }

    #[inline]
    pub fn change_rate(&self) -> f64 {
        self.params.change_rate
    }

    #[inline]
    pub fn death_rate(&self) -> f64 {
        self.params.death_rate
    }

    /// Probability that a replication produces a beneficial mutation.
    #[inline]
    pub fn mut_prob_ben(&self) -> f64 {
        self.mut_prob_ben
    }

    /// Probability that a replication produces a deleterious mutation.
    #[inline]
    pub fn mut_prob_del(&self) -> f64 {
        self.mut_prob_del
    }

    /// Individual birth rate of an organism carrying `allele` in this state.
    #[inline]
    pub fn birth_rate(&self, allele: Allele) -> f64 {
        let p = &self.params;
        match allele {
            Allele::Beneficial => p.birth_prefactor * (1.0 + p.sel_coeff_ben),
            Allele::Neutral => p.birth_prefactor,
            Allele::Deleterious => p.birth_prefactor * (1.0 - p.sel_coeff_del),
        }
    }

    /// Largest birth rate any genotype can have in this state.
    #[inline]
    pub fn max_birth_rate(&self) -> f64 {
        self.birth_rate(Allele::Beneficial)
    }
}

impl TryFrom<StateParams> for StateEntry {
    type Error = ParameterError;

    fn try_from(params: StateParams) -> Result<Self, Self::Error> {
        Self::new(params)
    }
}

impl From<StateEntry> for StateParams {
    fn from(entry: StateEntry) -> Self {
        entry.params
    }
}

/// Table of every phenotype state, indexed `0..state_count()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateTable {
    states: Vec<StateEntry>,
}

impl StateTable {
    /// Create a table from fully specified entries.
    pub fn new(states: Vec<StateEntry>) -> Self {
        Self { states }
    }

    /// Create a table of `count` inert states, to be filled with
    /// [`set_state`](Self::set_state).
    pub fn with_states(count: usize) -> Self {
        Self {
            states: vec![StateEntry::inert(); count],
        }
    }

    /// Resolve `count` states from a parameter source.
    pub fn from_source<S: ParameterSource + ?Sized>(
        source: &S,
        count: usize,
    ) -> Result<Self, ParameterError> {
        let states = (0..count)
            .map(|st| StateEntry::from_source(source, st))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { states })
    }

    #[inline]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Parameters of state `st`.
    ///
    /// # Panics
    /// Panics if `st >= state_count()`.
    #[inline]
    pub fn state(&self, st: usize) -> &StateEntry {
        assert!(
            st < self.states.len(),
            "state {st} out of range ({} states)",
            self.states.len()
        );
        &self.states[st]
    }

    /// Install every field of state `st` at once.
    pub fn set_state(&mut self, st: usize, entry: StateEntry) -> Result<(), ParameterError> {
        let count = self.states.len();
        let slot = self
            .states
            .get_mut(st)
            .ok_or(ParameterError::StateIndex { index: st, count })?;
        *slot = entry;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateEntry> {
        self.states.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> StateParams {
        StateParams {
            mut_rate_ben: 0.01,
            mut_rate_del: 0.02,
            sel_coeff_ben: 0.1,
            sel_coeff_del: 0.5,
            birth_prefactor: 2.0,
            change_rate: 0.3,
            death_rate: 1.0,
        }
    }

    fn source_for(states: usize) -> HashMap<String, f64> {
        let mut map = HashMap::new();
        for st in 0..states {
            map.insert(state_key("mut_ben", st), 0.001);
            map.insert(state_key("mut_del", st), 0.002);
            map.insert(state_key("s_ben", st), 0.05);
            map.insert(state_key("s_del", st), 0.2);
            map.insert(state_key("birth_prefactor", st), 1.0 + st as f64);
            map.insert(state_key("log_chg_rate", st), -2.0);
            map.insert(state_key("death_rate", st), 0.0);
        }
        map
    }

    #[test]
    fn test_state_key_suffix() {
        assert_eq!(state_key("mut_ben", 0), "mut_ben_s0");
        assert_eq!(state_key("death_rate", 12), "death_rate_s12");
    }

    #[test]
    fn test_entry_caches_mutation_probabilities() {
        let entry = StateEntry::new(params()).unwrap();
        assert!((entry.mut_prob_ben() - (1.0 - (-0.01f64).exp())).abs() < 1e-15);
        assert!((entry.mut_prob_del() - (1.0 - (-0.02f64).exp())).abs() < 1e-15);
    }

    #[test]
    fn test_entry_birth_rate_by_allele() {
        let entry = StateEntry::new(params()).unwrap();
        assert!((entry.birth_rate(Allele::Beneficial) - 2.2).abs() < 1e-12);
        assert!((entry.birth_rate(Allele::Neutral) - 2.0).abs() < 1e-12);
        assert!((entry.birth_rate(Allele::Deleterious) - 1.0).abs() < 1e-12);
        assert_eq!(entry.max_birth_rate(), entry.birth_rate(Allele::Beneficial));
    }

    #[test]
    fn test_entry_rejects_out_of_range() {
        let mut p = params();
        p.sel_coeff_del = 1.5;
        assert!(matches!(
            StateEntry::new(p),
            Err(ParameterError::OutOfRange { name: "sel_coeff_del", .. })
        ));

        let mut p = params();
        p.mut_rate_ben = -0.1;
        assert!(StateEntry::new(p).is_err());

        let mut p = params();
        p.birth_prefactor = f64::NAN;
        assert!(StateEntry::new(p).is_err());

        let mut p = params();
        p.death_rate = -1.0;
        assert!(StateEntry::new(p).is_err());
    }

    #[test]
    fn test_entry_serde_validates() {
        let json = r#"{"mut_rate_ben":0.0,"mut_rate_del":0.0,"sel_coeff_ben":0.0,
            "sel_coeff_del":2.0,"birth_prefactor":1.0,"change_rate":0.0,"death_rate":0.0}"#;
        assert!(serde_json::from_str::<StateEntry>(json).is_err());

        let entry = StateEntry::new(params()).unwrap();
        let back: StateEntry = serde_json::from_str(&serde_json::to_string(&entry).unwrap()).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_table_from_source() {
        let table = StateTable::from_source(&source_for(STATE_COUNT), STATE_COUNT).unwrap();
        assert_eq!(table.state_count(), 3);
        assert_eq!(table.state(2).birth_prefactor(), 3.0);
        assert!((table.state(0).change_rate() - 0.01).abs() < 1e-15);
    }

    #[test]
    fn test_table_from_source_missing_key() {
        let mut source = source_for(STATE_COUNT);
        source.remove("s_del_s1");
        assert_eq!(
            StateTable::from_source(&source, STATE_COUNT),
            Err(ParameterError::Missing("s_del_s1".to_string()))
        );
    }

    #[test]
    fn test_table_set_state() {
        let mut table = StateTable::with_states(3);
        assert_eq!(table.state(1).birth_prefactor(), 0.0);
        let entry = StateEntry::new(params()).unwrap();
        table.set_state(1, entry).unwrap();
        assert_eq!(table.state(1), &entry);
        assert!(table.set_state(3, entry).is_err());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_table_state_out_of_range_panics() {
        StateTable::with_states(3).state(3);
    }

    #[test]
    fn test_get_usize_rejects_fractional() {
        let mut map = HashMap::new();
        map.insert("trials".to_string(), 10.0);
        map.insert("half".to_string(), 0.5);
        assert_eq!(map.get_usize("trials"), Ok(10));
        assert!(map.get_usize("half").is_err());
    }
}
