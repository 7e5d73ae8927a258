use crate::base::Allele;
use std::cell::Cell;

/// Shared record of a lineage: organisms identical by descent.
///
/// The genotype (`allele`, `tracked`) is only ever changed through an
/// [`Organism`](super::Organism) that owns the record exclusively. The
/// membership bookkeeping is shared by every handle of the lineage and is
/// updated in place by the population, so it lives in `Cell`s.
#[derive(Debug, Clone)]
pub(crate) struct Lineage {
    pub(crate) allele: Allele,
    pub(crate) tracked: bool,
    /// Members of this lineage per phenotype state
    count_by_state: Box<[Cell<usize>]>,
    /// Sum of `count_by_state`
    total: Cell<usize>,
    /// Slot of this lineage's progenitor in the population registry
    registry_index: Cell<Option<usize>>,
}

impl Lineage {
    pub(crate) fn new(state_count: usize, allele: Allele, tracked: bool) -> Self {
        Self {
            allele,
            tracked,
            count_by_state: vec![Cell::new(0); state_count].into_boxed_slice(),
            total: Cell::new(0),
            registry_index: Cell::new(None),
        }
    }

    #[inline]
    pub(crate) fn state_count(&self) -> usize {
        self.count_by_state.len()
    }

    #[inline]
    pub(crate) fn num_in_state(&self, st: usize) -> usize {
        self.count_by_state[st].get()
    }

    #[inline]
    pub(crate) fn total(&self) -> usize {
        self.total.get()
    }

    #[inline]
    pub(crate) fn registry_index(&self) -> Option<usize> {
        self.registry_index.get()
    }

    #[inline]
    pub(crate) fn set_registry_index(&self, index: Option<usize>) {
        self.registry_index.set(index);
    }

    /// Count one more member in state `st`; returns the new total.
    pub(crate) fn increment(&self, st: usize) -> usize {
        let cell = &self.count_by_state[st];
        cell.set(cell.get() + 1);
        let total = self.total.get() + 1;
        self.total.set(total);
        total
    }

    /// Count one fewer member in state `st`; returns the new total.
    ///
    /// # Panics
    /// Panics if the lineage has no member in `st`.
    pub(crate) fn decrement(&self, st: usize) -> usize {
        let cell = &self.count_by_state[st];
        let in_state = cell.get();
        assert!(in_state > 0, "lineage has no member in state {st}");
        cell.set(in_state - 1);
        let total = self.total.get() - 1;
        self.total.set(total);
        total
    }

    /// Forget all membership and the registry slot.
    pub(crate) fn clear_counts(&self) {
        for cell in self.count_by_state.iter() {
            cell.set(0);
        }
        self.total.set(0);
        self.registry_index.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lineage_counts() {
        let lin = Lineage::new(3, Allele::Neutral, false);
        assert_eq!(lin.increment(1), 1);
        assert_eq!(lin.increment(2), 2);
        assert_eq!(lin.increment(1), 3);
        assert_eq!(lin.num_in_state(1), 2);
        assert_eq!(lin.decrement(1), 2);
        assert_eq!(lin.num_in_state(1), 1);
        assert_eq!(lin.num_in_state(2), 1);
        assert_eq!(lin.total(), 2);
    }

    #[test]
    fn test_lineage_clear_counts() {
        let lin = Lineage::new(3, Allele::Beneficial, true);
        lin.increment(0);
        lin.set_registry_index(Some(4));
        lin.clear_counts();
        assert_eq!(lin.total(), 0);
        assert_eq!(lin.num_in_state(0), 0);
        assert_eq!(lin.registry_index(), None);
        assert_eq!(lin.allele, Allele::Beneficial);
        assert!(lin.tracked);
    }

    #[test]
    #[should_panic(expected = "no member in state")]
    fn test_lineage_decrement_empty_state_panics() {
        Lineage::new(3, Allele::Neutral, false).decrement(0);
    }
}
