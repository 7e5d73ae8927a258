//! Builder for initial populations.
//!
//! Founders are added in groups; every organism of a group shares one
//! lineage, so a group of `n` starts as a single lineage of size `n`.

use crate::base::Allele;
pub use crate::errors::BuilderError;
use crate::evolution::BirthRateBound;
use crate::genome::Organism;
use crate::simulation::{Population, StateTable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A group of identical founders sharing one lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FounderGroup {
    pub count: usize,
    pub state: usize,
    #[serde(default)]
    pub allele: Allele,
    #[serde(default)]
    pub tracked: bool,
}

/// Builder for constructing [`Population`]s with a fluent API.
///
/// `build` borrows the builder, so one builder can produce a fresh
/// population for every trial.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use pfix_sim::base::Allele;
/// use pfix_sim::simulation::{PopulationBuilder, StateEntry, StateParams, StateTable};
///
/// let entry = StateEntry::new(StateParams { birth_prefactor: 1.0, ..Default::default() }).unwrap();
/// let table = Arc::new(StateTable::new(vec![entry; 3]));
///
/// let pop = PopulationBuilder::new()
///     .state_table(table)
///     .capacity(100)
///     .founders(99, 0, Allele::Neutral, false)
///     .founders(1, 1, Allele::Neutral, true)
///     .build()
///     .unwrap();
/// assert_eq!(pop.org_count(), 100);
/// assert_eq!(pop.lineage_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PopulationBuilder {
    table: Option<Arc<StateTable>>,
    capacity: Option<usize>,
    bound: BirthRateBound,
    founders: Vec<FounderGroup>,
}

impl PopulationBuilder {
    /// Create a builder with no states and no founders.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shared state table (required).
    pub fn state_table(mut self, table: Arc<StateTable>) -> Self {
        self.table = Some(table);
        self
    }

    /// Set the nominal population size (default: total founders).
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Set the birth-rate bound strategy.
    pub fn bound(mut self, bound: BirthRateBound) -> Self {
        self.bound = bound;
        self
    }

    /// Add `count` founders of one lineage in `state`.
    pub fn founders(self, count: usize, state: usize, allele: Allele, tracked: bool) -> Self {
        self.founder_group(FounderGroup {
            count,
            state,
            allele,
            tracked,
        })
    }

    pub fn founder_group(mut self, group: FounderGroup) -> Self {
        self.founders.push(group);
        self
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<&Arc<StateTable>, BuilderError> {
        let table = self
            .table
            .as_ref()
            .ok_or(BuilderError::MissingRequired("state_table"))?;
        let states = table.state_count();
        if states == 0 {
            return Err(BuilderError::InvalidParameter(
                "state table has no states".to_string(),
            ));
        }

        // Only states 1 and 2 of a three-state table may switch.
        for (st, entry) in table.iter().enumerate() {
            let may_switch = states == 3 && (st == 1 || st == 2);
            if entry.change_rate() > 0.0 && !may_switch {
                return Err(BuilderError::InvalidParameter(format!(
                    "state {st} has change rate {} but cannot switch",
                    entry.change_rate()
                )));
            }
        }

        for group in &self.founders {
            if group.state >= states {
                return Err(BuilderError::InvalidParameter(format!(
                    "founder state {} out of range ({states} states)",
                    group.state
                )));
            }
        }
        if self.founders.iter().all(|g| g.count == 0) {
            return Err(BuilderError::InvalidParameter(
                "population has no founders".to_string(),
            ));
        }
        Ok(table)
    }

    /// Build a fresh population.
    pub fn build(&self) -> Result<Population, BuilderError> {
        let table = self.validate()?;
        let states = table.state_count();
        let total: usize = self.founders.iter().map(|g| g.count).sum();
        let capacity = self.capacity.unwrap_or(total);

        let mut pop = Population::new(Arc::clone(table), capacity, self.bound);
        for group in &self.founders {
            let founder = Organism::with_genotype(states, group.allele, group.tracked);
            for _ in 0..group.count {
                pop.add(founder.clone(), group.state);
            }
        }
        Ok(pop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{StateEntry, StateParams};

    fn table(change_rates: [f64; 3]) -> Arc<StateTable> {
        Arc::new(StateTable::new(
            change_rates
                .iter()
                .map(|&change_rate| {
                    StateEntry::new(StateParams {
                        birth_prefactor: 1.0,
                        change_rate,
                        ..Default::default()
                    })
                    .unwrap()
                })
                .collect(),
        ))
    }

    #[test]
    fn test_builder_basic() {
        let pop = PopulationBuilder::new()
            .state_table(table([0.0, 0.1, 0.1]))
            .founders(8, 0, Allele::Neutral, false)
            .founders(2, 1, Allele::Beneficial, true)
            .build()
            .unwrap();
        assert_eq!(pop.org_count(), 10);
        assert_eq!(pop.capacity(), 10);
        assert_eq!(pop.tracked_org_count(), 2);
        assert_eq!(pop.lineage_count(), 2);
        assert_eq!(pop.tracked_progenitor(0).num_in_lineage(), 2);
        pop.validate().unwrap();
    }

    #[test]
    fn test_builder_is_reusable() {
        let builder = PopulationBuilder::new()
            .state_table(table([0.0, 0.0, 0.0]))
            .capacity(5)
            .founders(5, 0, Allele::Neutral, false);
        let a = builder.build().unwrap();
        let b = builder.build().unwrap();
        assert_ne!(a.untracked_progenitor(0), b.untracked_progenitor(0));
        assert_eq!(a.capacity(), 5);
    }

    #[test]
    fn test_builder_missing_table() {
        let result = PopulationBuilder::new()
            .founders(1, 0, Allele::Neutral, false)
            .build();
        assert!(matches!(
            result,
            Err(BuilderError::MissingRequired("state_table"))
        ));
    }

    #[test]
    fn test_builder_rejects_switching_state_zero() {
        let result = PopulationBuilder::new()
            .state_table(table([0.5, 0.0, 0.0]))
            .founders(1, 0, Allele::Neutral, false)
            .build();
        assert!(matches!(result, Err(BuilderError::InvalidParameter(_))));
    }

    #[test]
    fn test_builder_rejects_bad_founders() {
        let empty = PopulationBuilder::new()
            .state_table(table([0.0; 3]))
            .founders(0, 0, Allele::Neutral, false)
            .build();
        assert!(matches!(empty, Err(BuilderError::InvalidParameter(_))));

        let bad_state = PopulationBuilder::new()
            .state_table(table([0.0; 3]))
            .founders(1, 3, Allele::Neutral, false)
            .build();
        assert!(matches!(bad_state, Err(BuilderError::InvalidParameter(_))));
    }

    #[test]
    fn test_builder_bound_strategy() {
        let pop = PopulationBuilder::new()
            .state_table(table([0.0; 3]))
            .bound(BirthRateBound::Analytic)
            .founders(1, 0, Allele::Neutral, false)
            .build()
            .unwrap();
        assert_eq!(pop.bound_strategy(), BirthRateBound::Analytic);
        assert_eq!(pop.birth_rate_bound(2), 1.0);
    }
}
