//! The stochastic event engine.
//!
//! A [`Population`] holds organisms grouped by phenotype state and keeps the
//! rate aggregates needed to pick the next event in O(S) time:
//!
//! - per-state birth-rate totals and sums of squares,
//! - per-state total event rates `birth + n * death + n * change`,
//! - the overall event rate,
//! - per-state birth-rate upper bounds for rejection sampling.
//!
//! Each distinct live lineage has one representative handle (its
//! progenitor) in either the tracked or the untracked registry; the
//! lineage record remembers its slot. Removal from a state vector or a
//! registry is swap-with-last, and the lineage that moves into the freed
//! registry slot has its index corrected in the same step.

use crate::errors::PopulationError;
use crate::evolution::{BirthRateBound, mutate, sample_by_rejection};
use crate::genome::Organism;
use crate::simulation::StateTable;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Relative tolerance used when comparing maintained aggregates against a
/// fresh recomputation.
const RATE_TOLERANCE: f64 = 1e-9;

/// Category of the event executed by [`Population::do_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A birth immediately followed by a uniformly drawn death.
    Birth,
    /// An unpaired death; the census shrinks by one.
    Death,
    /// An organism switched between states 1 and 2.
    StateChange,
}

impl EventKind {
    /// Change in census size caused by one event of this kind.
    pub fn size_effect(self) -> isize {
        match self {
            Self::Birth | Self::StateChange => 0,
            Self::Death => -1,
        }
    }
}

/// Event counters of a population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventCounters {
    pub births: u64,
    pub deaths: u64,
    pub state_changes: u64,
    pub tracked_births: u64,
    pub tracked_deaths: u64,
    pub tracked_state_changes: u64,
    pub lethal_mutations: u64,
}

/// A finite population evolving under birth, death, state change and
/// mutation.
///
/// A population is single-threaded (organism handles are `!Send`) and is
/// intentionally not `Clone`: cloning the handles would alias the lineage
/// bookkeeping of two populations.
#[derive(Debug)]
pub struct Population {
    table: Arc<StateTable>,
    bound: BirthRateBound,
    /// Organisms by state
    orgs: Vec<Vec<Organism>>,
    birth_rate_totals: Vec<f64>,
    sum_sq_birth_rates: Vec<f64>,
    birth_rate_bounds: Vec<f64>,
    /// Birth + death + change rate of each state
    total_rates: Vec<f64>,
    total_event_rate: f64,
    /// Progenitors of live tracked lineages
    tracked_lineages: Vec<Organism>,
    /// Progenitors of live untracked lineages
    untracked_lineages: Vec<Organism>,
    org_count: usize,
    tracked_org_count: usize,
    counters: EventCounters,
    generations: f64,
    capacity: usize,
}

impl Population {
    /// Create an empty population over the states of `table`.
    pub fn new(table: Arc<StateTable>, capacity: usize, bound: BirthRateBound) -> Self {
        let states = table.state_count();
        let birth_rate_bounds = (0..states).map(|st| bound.initial(&table, st)).collect();
        Self {
            table,
            bound,
            orgs: vec![Vec::new(); states],
            birth_rate_totals: vec![0.0; states],
            sum_sq_birth_rates: vec![0.0; states],
            birth_rate_bounds,
            total_rates: vec![0.0; states],
            total_event_rate: 0.0,
            tracked_lineages: Vec::new(),
            untracked_lineages: Vec::new(),
            org_count: 0,
            tracked_org_count: 0,
            counters: EventCounters::default(),
            generations: 0.0,
            capacity,
        }
    }

    #[inline]
    pub fn state_table(&self) -> &Arc<StateTable> {
        &self.table
    }

    #[inline]
    pub fn state_count(&self) -> usize {
        self.orgs.len()
    }

    #[inline]
    pub fn bound_strategy(&self) -> BirthRateBound {
        self.bound
    }

    /// Birth rate of `org` if it lived in state `st`.
    #[inline]
    pub fn individual_birth_rate(&self, org: &Organism, st: usize) -> f64 {
        self.table.state(st).birth_rate(org.allele())
    }

    // ------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------

    /// Add `org` to state `st`, registering its lineage if it is new.
    ///
    /// # Panics
    /// Panics if `st` is not a state of this population or the organism was
    /// built for a different number of states.
    pub fn add(&mut self, org: Organism, st: usize) {
        assert!(st < self.state_count(), "state {st} out of range");
        assert_eq!(
            org.state_count(),
            self.state_count(),
            "organism built for a different number of states"
        );
        self.add_rates(&org, st);
        self.register(&org, st);
        self.org_count += 1;
        if org.tracked() {
            self.tracked_org_count += 1;
        }
        self.orgs[st].push(org);
    }

    fn add_rates(&mut self, org: &Organism, st: usize) {
        let entry = self.table.state(st);
        let birth = entry.birth_rate(org.allele());
        let total = birth + entry.change_rate() + entry.death_rate();
        self.total_event_rate += total;
        self.total_rates[st] += total;
        self.birth_rate_totals[st] += birth;
        self.sum_sq_birth_rates[st] += birth * birth;
        if birth > self.birth_rate_bounds[st] {
            self.birth_rate_bounds[st] = birth;
        }
    }

    /// Call after the organism has left `orgs[st]`.
    fn remove_rates(&mut self, org: &Organism, st: usize) {
        let entry = self.table.state(st);
        let birth = entry.birth_rate(org.allele());
        let total = birth + entry.change_rate() + entry.death_rate();
        self.total_event_rate -= total;
        self.total_rates[st] -= total;
        self.birth_rate_totals[st] -= birth;
        self.sum_sq_birth_rates[st] -= birth * birth;
        if self.orgs[st].is_empty() {
            // drop accumulated rounding once a state empties
            self.total_rates[st] = 0.0;
            self.birth_rate_totals[st] = 0.0;
            self.sum_sq_birth_rates[st] = 0.0;
            self.total_event_rate = self.total_rates.iter().sum();
        }
    }

    fn registry_mut(&mut self, tracked: bool) -> &mut Vec<Organism> {
        if tracked {
            &mut self.tracked_lineages
        } else {
            &mut self.untracked_lineages
        }
    }

    fn register(&mut self, org: &Organism, st: usize) {
        org.count_in(st);
        if org.registry_index().is_none() {
            let registry = self.registry_mut(org.tracked());
            org.set_registry_index(Some(registry.len()));
            registry.push(org.clone());
        }
    }

    fn unregister(&mut self, org: &Organism, st: usize) {
        let Some(index) = org.registry_index() else {
            panic!("removing an organism whose lineage is not registered");
        };
        if org.uncount_in(st) > 0 {
            return;
        }
        let registry = self.registry_mut(org.tracked());
        assert!(
            index < registry.len() && registry[index] == *org,
            "lineage registry out of sync at slot {index}"
        );
        registry.swap_remove(index);
        if let Some(moved) = registry.get(index) {
            moved.set_registry_index(Some(index));
        }
        org.set_registry_index(None);
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Sample and execute one event.
    ///
    /// # Panics
    /// Panics if no event can occur (total event rate not positive).
    pub fn do_event<R: Rng + ?Sized>(&mut self, rng: &mut R) -> EventKind {
        assert!(
            self.total_event_rate > 0.0,
            "no event can occur: total event rate is {}",
            self.total_event_rate
        );
        // u in (0, total]
        let mut u = (1.0 - rng.random::<f64>()) * self.total_event_rate;
        let st = self.select_state(&mut u);

        let kind = self.select_category(st, u);
        match kind {
            EventKind::Birth => {
                self.birth(st, rng);
                let victim = rng.random_range(0..self.org_count);
                let death_state = self.state_of_index(victim);
                self.death(death_state, rng);
            }
            EventKind::Death => self.death(st, rng),
            EventKind::StateChange => self.state_changer(st, rng),
        }
        kind
    }

    /// Walk the states, subtracting each state's rate from `u` until it is
    /// exhausted. States without events are never chosen, even when
    /// rounding leaves `u` positive after the last state.
    fn select_state(&self, u: &mut f64) -> usize {
        let mut chosen = None;
        for (st, &rate) in self.total_rates.iter().enumerate() {
            if rate <= 0.0 || self.orgs[st].is_empty() {
                continue;
            }
            chosen = Some(st);
            *u -= rate;
            if *u <= 0.0 {
                break;
            }
        }
        match chosen {
            Some(st) => st,
            None => panic!("no state has a positive event rate"),
        }
    }

    /// Pick the event category inside state `st`, where `remainder` is
    /// what is left of the draw after subtracting the state's total rate.
    fn select_category(&self, st: usize, remainder: f64) -> EventKind {
        let entry = self.table.state(st);
        let n = self.orgs[st].len() as f64;
        let birth = self.birth_rate_totals[st];
        let death = n * entry.death_rate();
        let change = n * entry.change_rate();

        let after_birth = remainder + birth;
        if birth > 0.0 && after_birth > 0.0 {
            EventKind::Birth
        } else if death > 0.0 && after_birth + death > 0.0 {
            EventKind::Death
        } else if change > 0.0 {
            EventKind::StateChange
        } else if death > 0.0 {
            EventKind::Death
        } else {
            EventKind::Birth
        }
    }

    /// State containing the `index`-th organism when states are laid end
    /// to end.
    fn state_of_index(&self, mut index: usize) -> usize {
        for (st, members) in self.orgs.iter().enumerate() {
            if index < members.len() {
                return st;
            }
            index -= members.len();
        }
        panic!("organism index out of range");
    }

    /// Replicate one organism of state `st`, chosen in proportion to its
    /// birth rate. The child may mutate; a child that diverged from its
    /// parent founds a new lineage.
    ///
    /// # Panics
    /// Panics if state `st` has no birth rate or its bound is not positive.
    pub fn birth<R: Rng + ?Sized>(&mut self, st: usize, rng: &mut R) {
        assert!(
            self.birth_rate_totals[st] > 0.0,
            "birth in state {st} without birth rate"
        );
        assert!(self.total_rates[st] > 0.0);

        let entry = *self.table.state(st);
        let members = &self.orgs[st];
        let ch = sample_by_rejection(rng, members.len(), self.birth_rate_bounds[st], |i| {
            entry.birth_rate(members[i].allele())
        });

        let parent = self.orgs[st][ch].clone();
        let mut child = parent.clone();
        if mutate(&mut child, &entry, rng).is_lethal() {
            self.counters.lethal_mutations += 1;
            return;
        }
        if child != parent {
            child.reset_lineage_counts();
        }

        let census = self.org_count;
        self.add(child, st);
        self.counters.births += 1;
        self.generations += 1.0 / census as f64;
        if parent.tracked() {
            self.counters.tracked_births += 1;
        }
    }

    /// Kill a uniformly chosen organism of state `st`.
    ///
    /// # Panics
    /// Panics if `st` is out of range or the state is empty.
    pub fn death<R: Rng + ?Sized>(&mut self, st: usize, rng: &mut R) {
        assert!(st < self.state_count(), "state {st} out of range");
        assert!(!self.orgs[st].is_empty(), "death in empty state {st}");

        let ch = rng.random_range(0..self.orgs[st].len());
        let org = self.orgs[st].swap_remove(ch);
        self.remove_rates(&org, st);
        self.unregister(&org, st);

        self.org_count -= 1;
        self.counters.deaths += 1;
        if org.tracked() {
            self.tracked_org_count -= 1;
            self.counters.tracked_deaths += 1;
        }
    }

    /// Move a uniformly chosen organism of state `st` to the partner state
    /// (1 and 2 switch into each other). The lineage stays registered.
    ///
    /// # Panics
    /// Panics unless the population has exactly three states, `st` is 1 or
    /// 2, and the state is non-empty.
    pub fn state_changer<R: Rng + ?Sized>(&mut self, st: usize, rng: &mut R) {
        assert_eq!(self.state_count(), 3, "state changes need exactly 3 states");
        assert!(st == 1 || st == 2, "state {st} cannot switch");
        assert!(!self.orgs[st].is_empty(), "state change in empty state {st}");

        let ch = rng.random_range(0..self.orgs[st].len());
        let org = self.orgs[st].swap_remove(ch);
        org.uncount_in(st);
        self.remove_rates(&org, st);
        self.org_count -= 1;
        let tracked = org.tracked();
        if tracked {
            self.tracked_org_count -= 1;
        }

        self.add(org, 3 - st);
        self.counters.state_changes += 1;
        if tracked {
            self.counters.tracked_state_changes += 1;
        }
    }

    /// Recompute every birth-rate bound.
    ///
    /// With the running strategy the bound becomes the largest birth rate
    /// present in the state (0 when empty); with the analytic strategy it
    /// is re-derived from the state table.
    pub fn update_birth_ub(&mut self) {
        for st in 0..self.state_count() {
            self.birth_rate_bounds[st] = match self.bound {
                BirthRateBound::Running => {
                    let entry = self.table.state(st);
                    self.orgs[st]
                        .iter()
                        .map(|org| entry.birth_rate(org.allele()))
                        .fold(0.0, f64::max)
                }
                BirthRateBound::Analytic => self.bound.initial(&self.table, st),
            };
        }
        debug!(bounds = ?self.birth_rate_bounds, "Rescanned birth-rate bounds");
    }

    /// Convert `count` random state-0 organisms into founders of new
    /// tracked lineages in state 1.
    ///
    /// # Panics
    /// Panics if state 0 has fewer than `count` organisms or the population
    /// has fewer than two states.
    pub fn seed_tracked<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R) {
        assert!(self.state_count() > 1, "need a state 1 to seed into");
        assert!(
            self.orgs[0].len() >= count,
            "cannot seed {count} tracked organisms from {} in state 0",
            self.orgs[0].len()
        );
        for _ in 0..count {
            let ch = rng.random_range(0..self.orgs[0].len());
            let mut org = self.orgs[0].swap_remove(ch);
            self.remove_rates(&org, 0);
            self.unregister(&org, 0);
            self.org_count -= 1;
            if org.tracked() {
                self.tracked_org_count -= 1;
            }

            org.reset_lineage_counts();
            org.set_tracked(true);
            self.add(org, 1);
        }
    }

    /// Zero the birth, death and state-change counters.
    pub fn reset_counts(&mut self) {
        self.counters = EventCounters {
            lethal_mutations: self.counters.lethal_mutations,
            ..EventCounters::default()
        };
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[inline]
    pub fn org_count(&self) -> usize {
        self.org_count
    }

    #[inline]
    pub fn tracked_org_count(&self) -> usize {
        self.tracked_org_count
    }

    #[inline]
    pub fn untracked_org_count(&self) -> usize {
        self.org_count - self.tracked_org_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.org_count == 0
    }

    /// Number of organisms in state `st`.
    #[inline]
    pub fn num_in_state(&self, st: usize) -> usize {
        assert!(st < self.state_count(), "state {st} out of range");
        self.orgs[st].len()
    }

    #[inline]
    pub fn lineage_count(&self) -> usize {
        self.tracked_lineages.len() + self.untracked_lineages.len()
    }

    #[inline]
    pub fn tracked_lineage_count(&self) -> usize {
        self.tracked_lineages.len()
    }

    #[inline]
    pub fn untracked_lineage_count(&self) -> usize {
        self.untracked_lineages.len()
    }

    #[inline]
    pub fn counters(&self) -> &EventCounters {
        &self.counters
    }

    pub fn births(&self) -> u64 {
        self.counters.births
    }

    pub fn deaths(&self) -> u64 {
        self.counters.deaths
    }

    pub fn state_changes(&self) -> u64 {
        self.counters.state_changes
    }

    pub fn tracked_births(&self) -> u64 {
        self.counters.tracked_births
    }

    pub fn tracked_deaths(&self) -> u64 {
        self.counters.tracked_deaths
    }

    pub fn tracked_state_changes(&self) -> u64 {
        self.counters.tracked_state_changes
    }

    pub fn untracked_births(&self) -> u64 {
        self.counters.births - self.counters.tracked_births
    }

    pub fn untracked_deaths(&self) -> u64 {
        self.counters.deaths - self.counters.tracked_deaths
    }

    pub fn untracked_state_changes(&self) -> u64 {
        self.counters.state_changes - self.counters.tracked_state_changes
    }

    pub fn lethal_mutations(&self) -> u64 {
        self.counters.lethal_mutations
    }

    /// Elapsed generations: each birth among `N` organisms adds `1/N`.
    #[inline]
    pub fn generations(&self) -> f64 {
        self.generations
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sum of all event rates.
    #[inline]
    pub fn total_event_rate(&self) -> f64 {
        self.total_event_rate
    }

    /// Event rate of state `st`.
    #[inline]
    pub fn state_total_rate(&self, st: usize) -> f64 {
        self.total_rates[st]
    }

    /// Upper bound used when sampling parents in state `st`.
    #[inline]
    pub fn birth_rate_bound(&self, st: usize) -> f64 {
        self.birth_rate_bounds[st]
    }

    pub fn birth_rate_bounds(&self) -> &[f64] {
        &self.birth_rate_bounds
    }

    /// Total birth rate over all states.
    pub fn birth_rate(&self) -> f64 {
        self.birth_rate_totals.iter().sum()
    }

    pub fn sum_squared_birth_rate(&self) -> f64 {
        self.sum_sq_birth_rates.iter().sum()
    }

    /// Total death rate over all states.
    pub fn death_rate(&self) -> f64 {
        self.orgs
            .iter()
            .enumerate()
            .map(|(st, members)| members.len() as f64 * self.table.state(st).death_rate())
            .sum()
    }

    /// Mean individual birth rate, 0 for an empty population.
    pub fn mean_birth_rate(&self) -> f64 {
        if self.org_count == 0 {
            0.0
        } else {
            self.birth_rate() / self.org_count as f64
        }
    }

    /// Population variance of the individual birth rates.
    pub fn birth_rate_variance(&self) -> f64 {
        if self.org_count == 0 {
            return 0.0;
        }
        let mean = self.mean_birth_rate();
        (self.sum_squared_birth_rate() / self.org_count as f64 - mean * mean).max(0.0)
    }

    /// The `i`-th organism of state `st`.
    ///
    /// # Panics
    /// Panics if either index is out of range.
    pub fn org(&self, st: usize, i: usize) -> &Organism {
        assert!(st < self.state_count(), "state {st} out of range");
        assert!(
            i < self.orgs[st].len(),
            "organism {i} out of range in state {st}"
        );
        &self.orgs[st][i]
    }

    /// Organisms of state `st`.
    pub fn orgs_in_state(&self, st: usize) -> &[Organism] {
        &self.orgs[st]
    }

    /// A uniformly chosen organism.
    ///
    /// # Panics
    /// Panics if the population is empty.
    pub fn random_org<R: Rng + ?Sized>(&self, rng: &mut R) -> &Organism {
        assert!(self.org_count > 0, "random organism from an empty population");
        let mut index = rng.random_range(0..self.org_count);
        for members in &self.orgs {
            if index < members.len() {
                return &members[index];
            }
            index -= members.len();
        }
        panic!("organism count out of sync with state vectors");
    }

    /// Progenitor of the `i`-th live tracked lineage.
    pub fn tracked_progenitor(&self, i: usize) -> &Organism {
        assert!(i < self.tracked_lineages.len(), "tracked lineage {i} out of range");
        &self.tracked_lineages[i]
    }

    /// Progenitor of the `i`-th live untracked lineage.
    pub fn untracked_progenitor(&self, i: usize) -> &Organism {
        assert!(
            i < self.untracked_lineages.len(),
            "untracked lineage {i} out of range"
        );
        &self.untracked_lineages[i]
    }

    pub(crate) fn tracked_progenitors(&self) -> &[Organism] {
        &self.tracked_lineages
    }

    pub(crate) fn untracked_progenitors(&self) -> &[Organism] {
        &self.untracked_lineages
    }

    /// Every organism is tracked (vacuously true when empty).
    pub fn is_fixed(&self) -> bool {
        self.tracked_org_count == self.org_count
    }

    /// No organism is tracked.
    pub fn is_lost(&self) -> bool {
        self.tracked_org_count == 0
    }

    // ------------------------------------------------------------------
    // Restore
    // ------------------------------------------------------------------

    /// Rebuild a population from organisms whose lineages carry no counts
    /// yet. Registries are installed first so their order is preserved;
    /// rate aggregates are recomputed. A saved running bound below a live
    /// rate is raised to that rate.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        table: Arc<StateTable>,
        capacity: usize,
        bound: BirthRateBound,
        orgs: Vec<Vec<Organism>>,
        tracked_lineages: Vec<Organism>,
        untracked_lineages: Vec<Organism>,
        counters: EventCounters,
        generations: f64,
        saved_bounds: &[f64],
    ) -> Self {
        let mut pop = Self::new(table, capacity, bound);
        for (i, org) in tracked_lineages.iter().enumerate() {
            org.set_registry_index(Some(i));
        }
        for (i, org) in untracked_lineages.iter().enumerate() {
            org.set_registry_index(Some(i));
        }
        pop.tracked_lineages = tracked_lineages;
        pop.untracked_lineages = untracked_lineages;

        for (st, members) in orgs.into_iter().enumerate() {
            for org in members {
                pop.add(org, st);
            }
        }
        if bound == BirthRateBound::Running {
            for (live, &saved) in pop.birth_rate_bounds.iter_mut().zip(saved_bounds) {
                *live = live.max(saved);
            }
        }
        pop.counters = counters;
        pop.generations = generations;
        pop
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Recompute every aggregate from scratch and compare with the
    /// maintained values. Returns the first discrepancy.
    pub fn validate(&self) -> Result<(), PopulationError> {
        let census: usize = self.orgs.iter().map(Vec::len).sum();
        check_count("organism count", self.org_count, census)?;

        let tracked = self.orgs.iter().flatten().filter(|o| o.tracked()).count();
        check_count("tracked organism count", self.tracked_org_count, tracked)?;

        let mut total = 0.0;
        for (st, members) in self.orgs.iter().enumerate() {
            let entry = self.table.state(st);
            let n = members.len() as f64;
            let births: f64 = members.iter().map(|o| entry.birth_rate(o.allele())).sum();
            let squares: f64 = members
                .iter()
                .map(|o| entry.birth_rate(o.allele()).powi(2))
                .sum();
            let state_total = births + n * (entry.death_rate() + entry.change_rate());
            check_rate(format!("birth rate of state {st}"), self.birth_rate_totals[st], births)?;
            check_rate(
                format!("squared birth rate of state {st}"),
                self.sum_sq_birth_rates[st],
                squares,
            )?;
            check_rate(format!("event rate of state {st}"), self.total_rates[st], state_total)?;
            total += state_total;

            let max = members
                .iter()
                .map(|o| entry.birth_rate(o.allele()))
                .fold(0.0, f64::max);
            if self.birth_rate_bounds[st] < max {
                return Err(PopulationError::BoundTooLow {
                    state: st,
                    bound: self.birth_rate_bounds[st],
                    rate: max,
                });
            }
        }
        check_rate("total event rate".to_string(), self.total_event_rate, total)?;
        let sum_of_states: f64 = self.total_rates.iter().sum();
        check_rate(
            "sum of state event rates".to_string(),
            self.total_event_rate,
            sum_of_states,
        )?;

        self.validate_lineages()
    }

    fn validate_lineages(&self) -> Result<(), PopulationError> {
        let states = self.state_count();
        let mut members: HashMap<*const (), (Organism, Vec<usize>)> = HashMap::new();
        for (st, orgs) in self.orgs.iter().enumerate() {
            for org in orgs {
                let (_, counts) = members
                    .entry(org.lineage_ptr())
                    .or_insert_with(|| (org.clone(), vec![0; states]));
                counts[st] += 1;
            }
        }

        for (org, counts) in members.values() {
            for (st, &count) in counts.iter().enumerate() {
                check_count(
                    &format!("lineage members in state {st}"),
                    org.num_in_state(st),
                    count,
                )?;
            }
            check_count(
                "lineage size",
                org.num_in_lineage(),
                counts.iter().sum(),
            )?;

            let registry = if org.tracked() {
                &self.tracked_lineages
            } else {
                &self.untracked_lineages
            };
            match org.registry_index() {
                Some(i) if i < registry.len() && registry[i] == *org => {}
                other => {
                    return Err(PopulationError::Registry(format!(
                        "live lineage has registry index {other:?} not matching its registry"
                    )));
                }
            }
        }

        for (tracked, registry) in [(true, &self.tracked_lineages), (false, &self.untracked_lineages)] {
            for (i, org) in registry.iter().enumerate() {
                if org.tracked() != tracked {
                    return Err(PopulationError::Registry(format!(
                        "slot {i} holds a lineage with tracked = {}",
                        org.tracked()
                    )));
                }
                if org.registry_index() != Some(i) {
                    return Err(PopulationError::Registry(format!(
                        "slot {i} holds a lineage indexed at {:?}",
                        org.registry_index()
                    )));
                }
                if !members.contains_key(&org.lineage_ptr()) {
                    return Err(PopulationError::Registry(format!(
                        "slot {i} holds a lineage with no live member"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn check_count(what: &str, stored: usize, recomputed: usize) -> Result<(), PopulationError> {
    if stored == recomputed {
        Ok(())
    } else {
        Err(PopulationError::CountMismatch {
            what: what.to_string(),
            stored,
            recomputed,
        })
    }
}

fn check_rate(what: String, stored: f64, recomputed: f64) -> Result<(), PopulationError> {
    let scale = stored.abs().max(recomputed.abs()).max(1.0);
    if (stored - recomputed).abs() <= RATE_TOLERANCE * scale {
        Ok(())
    } else {
        Err(PopulationError::RateDrift {
            what,
            stored,
            recomputed,
        })
    }
}

impl fmt::Display for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "total_event_rate   = {}", self.total_event_rate)?;
        writeln!(f, "death_rate         = {}", self.death_rate())?;
        writeln!(f, "org_count          = {}", self.org_count)?;
        writeln!(f, "tracked_orgs       = {}", self.tracked_org_count)?;
        writeln!(f, "tracked_lineages   = {}", self.tracked_lineages.len())?;
        writeln!(f, "untracked_lineages = {}", self.untracked_lineages.len())?;
        writeln!(f, "generations        = {}", self.generations)?;
        writeln!(f, "num_in_state       = {:?}", self.orgs.iter().map(Vec::len).collect::<Vec<_>>())?;
        writeln!(f, "birth_rates        = {:?}", self.birth_rate_totals)?;
        writeln!(f, "birth_rate_bounds  = {:?}", self.birth_rate_bounds)?;
        write!(f, "state_rates        = {:?}", self.total_rates)
    }
}
