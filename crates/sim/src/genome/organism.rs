use super::lineage::Lineage;
use crate::base::Allele;
use std::fmt;
use std::rc::Rc;

/// A handle to the lineage an organism belongs to.
///
/// Many handles can point at one lineage; cloning an `Organism` is a
/// reference-count increment and represents a new organism identical by
/// descent. Every genotype-changing method first makes the handle the sole
/// owner of its lineage, copying the record if it is shared, so a change
/// never leaks into sibling organisms.
///
/// Two organisms compare equal iff they share a lineage. Handles are
/// deliberately `!Send`: a population and its organisms belong to one
/// thread.
#[derive(Clone)]
pub struct Organism {
    lineage: Rc<Lineage>,
}

impl Organism {
    /// Create the founder of a new, untracked, neutral lineage.
    pub fn new(state_count: usize) -> Self {
        Self::with_genotype(state_count, Allele::Neutral, false)
    }

    /// Create the founder of a new lineage with the given genotype.
    pub fn with_genotype(state_count: usize, allele: Allele, tracked: bool) -> Self {
        Self {
            lineage: Rc::new(Lineage::new(state_count, allele, tracked)),
        }
    }

    /// Make this handle the only one referencing its lineage.
    ///
    /// Returns `true` if the lineage was shared and has been copied.
    fn make_unique(&mut self) -> bool {
        let shared = Rc::strong_count(&self.lineage) != 1;
        if shared {
            self.lineage = Rc::new(Lineage::clone(&self.lineage));
        }
        shared
    }

    #[inline]
    fn lineage_mut(&mut self) -> &mut Lineage {
        self.make_unique();
        Rc::make_mut(&mut self.lineage)
    }

    #[inline]
    pub fn allele(&self) -> Allele {
        self.lineage.allele
    }

    #[inline]
    pub fn tracked(&self) -> bool {
        self.lineage.tracked
    }

    /// Number of lineage members in state `st`.
    #[inline]
    pub fn num_in_state(&self, st: usize) -> usize {
        self.lineage.num_in_state(st)
    }

    /// Number of lineage members over all states.
    #[inline]
    pub fn num_in_lineage(&self) -> usize {
        self.lineage.total()
    }

    /// Slot of the lineage in its population registry, if registered.
    #[inline]
    pub fn registry_index(&self) -> Option<usize> {
        self.lineage.registry_index()
    }

    #[inline]
    pub fn state_count(&self) -> usize {
        self.lineage.state_count()
    }

    /// Whether `self` and `other` belong to the same lineage.
    #[inline]
    pub fn same_lineage(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.lineage, &other.lineage)
    }

    pub fn set_tracked(&mut self, tracked: bool) -> &mut Self {
        if tracked != self.tracked() {
            self.lineage_mut().tracked = tracked;
        }
        self
    }

    pub fn set_allele(&mut self, allele: Allele) -> &mut Self {
        if allele != self.allele() {
            self.lineage_mut().allele = allele;
        }
        self
    }

    /// Turn this handle into the founder of a brand-new lineage: zero the
    /// membership counts and unassign the registry slot. The genotype is
    /// kept.
    pub fn reset_lineage_counts(&mut self) -> &mut Self {
        self.lineage_mut().clear_counts();
        self
    }

    // Bookkeeping shared by every handle of the lineage; only the
    // population calls these.

    #[inline]
    pub(crate) fn count_in(&self, st: usize) -> usize {
        self.lineage.increment(st)
    }

    #[inline]
    pub(crate) fn uncount_in(&self, st: usize) -> usize {
        self.lineage.decrement(st)
    }

    #[inline]
    pub(crate) fn set_registry_index(&self, index: Option<usize>) {
        self.lineage.set_registry_index(index);
    }

    /// Address of the lineage record, stable while any handle lives.
    #[inline]
    pub(crate) fn lineage_ptr(&self) -> *const () {
        Rc::as_ptr(&self.lineage).cast()
    }

    #[cfg(test)]
    pub(crate) fn lineage(&self) -> &Rc<Lineage> {
        &self.lineage
    }
}

impl PartialEq for Organism {
    fn eq(&self, other: &Self) -> bool {
        self.same_lineage(other)
    }
}

impl Eq for Organism {}

impl fmt::Debug for Organism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Organism")
            .field("lineage", &self.lineage_ptr())
            .field("allele", &self.allele())
            .field("tracked", &self.tracked())
            .field("num_in_lineage", &self.num_in_lineage())
            .field("registry_index", &self.registry_index())
            .finish()
    }
}

impl fmt::Display for Organism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "lineage        = {:p}", self.lineage_ptr())?;
        writeln!(f, "allele         = {}", self.allele())?;
        writeln!(f, "tracked        = {}", self.tracked())?;
        writeln!(f, "num_in_lineage = {}", self.num_in_lineage())?;
        write!(f, "num_in_state   = [")?;
        for st in 0..self.state_count() {
            write!(f, " {}", self.num_in_state(st))?;
        }
        writeln!(f, " ]")?;
        match self.registry_index() {
            Some(i) => write!(f, "registry_index = {i}"),
            None => write!(f, "registry_index = unassigned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_lineage() {
        let a = Organism::new(3);
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(Rc::strong_count(a.lineage()), 2);
    }

    #[test]
    fn test_distinct_founders_differ() {
        let a = Organism::new(3);
        let b = Organism::new(3);
        assert_ne!(a, b);
        assert_eq!(a.allele(), b.allele());
    }

    #[test]
    fn test_set_allele_diverges_shared_lineage() {
        let a = Organism::new(3);
        let mut b = a.clone();
        b.set_allele(Allele::Beneficial);
        assert_ne!(a, b);
        assert_eq!(a.allele(), Allele::Neutral);
        assert_eq!(b.allele(), Allele::Beneficial);
    }

    #[test]
    fn test_set_allele_in_place_when_unique() {
        let mut a = Organism::new(3);
        let before = a.lineage_ptr();
        a.set_allele(Allele::Deleterious);
        assert_eq!(a.lineage_ptr(), before);
    }

    #[test]
    fn test_unchanged_value_does_not_diverge() {
        let a = Organism::with_genotype(3, Allele::Neutral, true);
        let mut b = a.clone();
        b.set_tracked(true).set_allele(Allele::Neutral);
        assert_eq!(a, b);
    }

    #[test]
    fn test_bookkeeping_is_shared_between_handles() {
        let a = Organism::new(3);
        let b = a.clone();
        a.count_in(1);
        b.count_in(2);
        b.set_registry_index(Some(0));
        assert_eq!(a.num_in_lineage(), 2);
        assert_eq!(a.num_in_state(2), 1);
        assert_eq!(a.registry_index(), Some(0));
    }

    #[test]
    fn test_reset_lineage_counts_founds_new_lineage() {
        let a = Organism::with_genotype(3, Allele::Beneficial, true);
        a.count_in(0);
        a.count_in(1);
        a.set_registry_index(Some(3));

        let mut child = a.clone();
        child.reset_lineage_counts();

        assert_ne!(a, child);
        assert_eq!(child.num_in_lineage(), 0);
        assert_eq!(child.registry_index(), None);
        assert_eq!(child.allele(), Allele::Beneficial);
        assert!(child.tracked());
        // parent untouched
        assert_eq!(a.num_in_lineage(), 2);
        assert_eq!(a.registry_index(), Some(3));
    }

    #[test]
    fn test_display_lists_counts() {
        let a = Organism::new(3);
        a.count_in(2);
        let text = a.to_string();
        assert!(text.contains("num_in_state   = [ 0 0 1 ]"));
        assert!(text.contains("registry_index = unassigned"));
    }
}
