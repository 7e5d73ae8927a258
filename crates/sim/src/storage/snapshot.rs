//! Population snapshots.
//!
//! Organisms are stored as ids into a table of lineage records, one record
//! per distinct lineage. Restoring creates exactly one shared record per
//! id, so handles that aliased one lineage before saving alias one lineage
//! after loading, and copy-on-write keeps working as before.

use crate::base::Allele;
use crate::errors::SnapshotError;
use crate::evolution::BirthRateBound;
use crate::genome::Organism;
use crate::simulation::{EventCounters, Population, StateTable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Bumped whenever the encoded layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Genotype of one lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageRecord {
    pub allele: Allele,
    pub tracked: bool,
}

/// Distinct lineages of a set of handles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageTable {
    records: Vec<LineageRecord>,
}

/// Assigns ids in order of first appearance.
#[derive(Default)]
struct LineageEncoder {
    table: LineageTable,
    ids: HashMap<*const (), usize>,
}

impl LineageEncoder {
    fn id_of(&mut self, org: &Organism) -> usize {
        let records = &mut self.table.records;
        *self.ids.entry(org.lineage_ptr()).or_insert_with(|| {
            records.push(LineageRecord {
                allele: org.allele(),
                tracked: org.tracked(),
            });
            records.len() - 1
        })
    }

    fn ids_of<'a>(&mut self, orgs: impl IntoIterator<Item = &'a Organism>) -> Vec<usize> {
        orgs.into_iter().map(|org| self.id_of(org)).collect()
    }
}

impl LineageTable {
    /// Encode `orgs` as lineage ids; equal ids mean a shared lineage.
    pub fn encode<'a>(orgs: impl IntoIterator<Item = &'a Organism>) -> (Self, Vec<usize>) {
        let mut encoder = LineageEncoder::default();
        let ids = encoder.ids_of(orgs);
        (encoder.table, ids)
    }

    /// Rebuild handles for `ids`, one fresh lineage per record.
    pub fn decode(&self, ids: &[usize], state_count: usize) -> Result<Vec<Organism>, SnapshotError> {
        let founders = self.founders(state_count);
        ids.iter().map(|&id| handle(&founders, id)).collect()
    }

    pub fn records(&self) -> &[LineageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn founders(&self, state_count: usize) -> Vec<Organism> {
        self.records
            .iter()
            .map(|r| Organism::with_genotype(state_count, r.allele, r.tracked))
            .collect()
    }
}

fn handle(founders: &[Organism], id: usize) -> Result<Organism, SnapshotError> {
    founders.get(id).cloned().ok_or_else(|| {
        SnapshotError::Inconsistent(format!(
            "lineage id {id} out of range ({} lineages)",
            founders.len()
        ))
    })
}

/// Everything needed to continue a population exactly where it was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    pub version: u32,
    pub states: StateTable,
    pub capacity: usize,
    pub bound: BirthRateBound,
    pub birth_rate_bounds: Vec<f64>,
    pub lineages: LineageTable,
    /// Lineage id of every organism, by state
    pub members: Vec<Vec<usize>>,
    pub tracked_registry: Vec<usize>,
    pub untracked_registry: Vec<usize>,
    pub counters: EventCounters,
    pub generations: f64,
}

impl PopulationSnapshot {
    /// Capture `pop`. Registry lineages are numbered first, in registry
    /// order.
    pub fn capture(pop: &Population) -> Self {
        let mut encoder = LineageEncoder::default();
        let tracked_registry = encoder.ids_of(pop.tracked_progenitors());
        let untracked_registry = encoder.ids_of(pop.untracked_progenitors());
        let members = (0..pop.state_count())
            .map(|st| encoder.ids_of(pop.orgs_in_state(st)))
            .collect();
        Self {
            version: SNAPSHOT_VERSION,
            states: StateTable::clone(pop.state_table()),
            capacity: pop.capacity(),
            bound: pop.bound_strategy(),
            birth_rate_bounds: pop.birth_rate_bounds().to_vec(),
            lineages: encoder.table,
            members,
            tracked_registry,
            untracked_registry,
            counters: *pop.counters(),
            generations: pop.generations(),
        }
    }

    /// Rebuild the population over a fresh copy of the saved state table.
    pub fn restore(&self) -> Result<Population, SnapshotError> {
        self.restore_with_table(Arc::new(self.states.clone()))
    }

    /// Rebuild the population over `table`, which must have the saved
    /// number of states.
    pub fn restore_with_table(&self, table: Arc<StateTable>) -> Result<Population, SnapshotError> {
        let states = table.state_count();
        if self.members.len() != states {
            return Err(SnapshotError::Inconsistent(format!(
                "{} member lists for {states} states",
                self.members.len()
            )));
        }
        self.check_registries()?;

        let founders = self.lineages.founders(states);
        let decode = |ids: &[usize]| -> Result<Vec<Organism>, SnapshotError> {
            ids.iter().map(|&id| handle(&founders, id)).collect()
        };
        let orgs = self
            .members
            .iter()
            .map(|ids| decode(ids))
            .collect::<Result<Vec<_>, _>>()?;
        let tracked = decode(&self.tracked_registry)?;
        let untracked = decode(&self.untracked_registry)?;
        // Only population handles may keep the records alive.
        drop(founders);

        let pop = Population::restore(
            table,
            self.capacity,
            self.bound,
            orgs,
            tracked,
            untracked,
            self.counters,
            self.generations,
            &self.birth_rate_bounds,
        );
        for (st, &saved) in self.birth_rate_bounds.iter().enumerate().take(states) {
            let live = pop.birth_rate_bound(st);
            if self.bound == BirthRateBound::Running && live > saved {
                warn!(state = st, saved, live, "Raised stale birth-rate bound on restore");
            }
        }
        pop.validate()
            .map_err(|e| SnapshotError::Inconsistent(e.to_string()))?;
        debug!(
            organisms = pop.org_count(),
            lineages = pop.lineage_count(),
            "Restored population"
        );
        Ok(pop)
    }

    /// Each registry entry must be a distinct lineage with the right
    /// tracked flag.
    fn check_registries(&self) -> Result<(), SnapshotError> {
        let mut seen = vec![false; self.lineages.len()];
        for (ids, tracked) in [(&self.tracked_registry, true), (&self.untracked_registry, false)] {
            for &id in ids {
                let record = self.lineages.records.get(id).ok_or_else(|| {
                    SnapshotError::Inconsistent(format!("registry lineage {id} out of range"))
                })?;
                if record.tracked != tracked || std::mem::replace(&mut seen[id], true) {
                    return Err(SnapshotError::Inconsistent(format!(
                        "lineage {id} misplaced in registry"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::Encode(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self =
            bincode::deserialize(bytes).map_err(|e| SnapshotError::Decode(e.to_string()))?;
        snapshot.check_version()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let mut out = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut out, self).map_err(|e| SnapshotError::Encode(e.to_string()))?;
        out.flush()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: Self = bincode::deserialize_from(reader)
            .map_err(|e| SnapshotError::Decode(e.to_string()))?;
        snapshot.check_version()
    }

    fn check_version(self) -> Result<Self, SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Decode(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                self.version
            )));
        }
        Ok(self)
    }
}
