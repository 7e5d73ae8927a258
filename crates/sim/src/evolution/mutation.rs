//! Mutation on the three-allele landscape.
//!
//! Alleles sit on a line `-1 < 0 < +1`. Each replication is a Poisson
//! process with per-state rates, so a rate `r` becomes the per-replication
//! probability `1 - exp(-r)` (cached in [`StateEntry`]).
//!
//! - A beneficial allele can only decay back to neutral (probability
//!   `mut_prob_del`).
//! - A neutral allele draws a beneficial and a deleterious event
//!   independently; if both fire they cancel.
//! - A deleterious allele never mutates.
//!
//! Any net change makes the organism the owner of a private lineage record
//! before the allele is written, so siblings keep their genotype.

use crate::base::Allele;
use crate::genome::Organism;
use crate::simulation::StateEntry;
use rand::Rng;

/// What a replication produced.
///
/// Every mutation on this landscape yields a viable child; `Lethal` is kept
/// so populations can keep counting lethal mutations for landscapes that
/// have them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Viable,
    Lethal,
}

impl MutationOutcome {
    #[inline]
    pub fn is_lethal(self) -> bool {
        matches!(self, Self::Lethal)
    }
}

/// Net allele step for one replication from `allele` in a state with
/// parameters `entry`.
pub fn allele_change<R: Rng + ?Sized>(allele: Allele, entry: &StateEntry, rng: &mut R) -> i8 {
    match allele {
        Allele::Beneficial => -i8::from(rng.random::<f64>() < entry.mut_prob_del()),
        Allele::Neutral => {
            let ben = rng.random::<f64>() < entry.mut_prob_ben();
            let del = rng.random::<f64>() < entry.mut_prob_del();
            i8::from(ben) - i8::from(del)
        }
        Allele::Deleterious => 0,
    }
}

/// Mutate `org` as a freshly replicated child in a state with parameters
/// `entry`.
pub fn mutate<R: Rng + ?Sized>(org: &mut Organism, entry: &StateEntry, rng: &mut R) -> MutationOutcome {
    let delta = allele_change(org.allele(), entry, rng);
    if delta != 0 {
        // allele_change never steps off the landscape
        if let Some(next) = org.allele().shifted(delta) {
            org.set_allele(next);
        }
    }
    MutationOutcome::Viable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::StateParams;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn entry(mut_rate_ben: f64, mut_rate_del: f64) -> StateEntry {
        StateEntry::new(StateParams {
            mut_rate_ben,
            mut_rate_del,
            birth_prefactor: 1.0,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_deleterious_never_mutates() {
        let mut rng = StdRng::seed_from_u64(42);
        let e = entry(50.0, 50.0);
        let mut org = Organism::with_genotype(3, Allele::Deleterious, false);
        let before = org.clone();
        for _ in 0..1000 {
            assert_eq!(mutate(&mut org, &e, &mut rng), MutationOutcome::Viable);
            assert_eq!(org.allele(), Allele::Deleterious);
        }
        assert_eq!(org, before);
    }

    #[test]
    fn test_beneficial_decays_only_to_neutral() {
        let mut rng = StdRng::seed_from_u64(42);
        // mut_prob_del is effectively 1
        let e = entry(0.0, 50.0);
        let parent = Organism::with_genotype(3, Allele::Beneficial, false);
        let mut child = parent.clone();
        mutate(&mut child, &e, &mut rng);
        assert_eq!(child.allele(), Allele::Neutral);
        assert_eq!(parent.allele(), Allele::Beneficial);
        assert_ne!(child, parent);
    }

    #[test]
    fn test_beneficial_ignores_beneficial_rate() {
        let mut rng = StdRng::seed_from_u64(7);
        let e = entry(50.0, 0.0);
        let mut org = Organism::with_genotype(3, Allele::Beneficial, false);
        for _ in 0..100 {
            mutate(&mut org, &e, &mut rng);
        }
        assert_eq!(org.allele(), Allele::Beneficial);
    }

    #[test]
    fn test_neutral_both_events_cancel() {
        let mut rng = StdRng::seed_from_u64(1);
        let e = entry(50.0, 50.0);
        let parent = Organism::new(3);
        let mut child = parent.clone();
        mutate(&mut child, &e, &mut rng);
        assert_eq!(child.allele(), Allele::Neutral);
        assert_eq!(child, parent);
    }

    #[test]
    fn test_neutral_moves_up_or_down() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut up = Organism::new(3);
        mutate(&mut up, &entry(50.0, 0.0), &mut rng);
        assert_eq!(up.allele(), Allele::Beneficial);

        let mut down = Organism::new(3);
        mutate(&mut down, &entry(0.0, 50.0), &mut rng);
        assert_eq!(down.allele(), Allele::Deleterious);
    }

    #[test]
    fn test_zero_rates_keep_lineage() {
        let mut rng = StdRng::seed_from_u64(42);
        let e = entry(0.0, 0.0);
        let parent = Organism::new(3);
        let mut child = parent.clone();
        for _ in 0..100 {
            mutate(&mut child, &e, &mut rng);
        }
        assert_eq!(child, parent);
    }

    #[test]
    fn test_neutral_change_frequency() {
        let mut rng = StdRng::seed_from_u64(11);
        let e = entry(0.1, 0.0);
        let p = e.mut_prob_ben();
        let n = 20_000;
        let ups = (0..n)
            .filter(|_| allele_change(Allele::Neutral, &e, &mut rng) == 1)
            .count();
        let freq = ups as f64 / n as f64;
        assert!((freq - p).abs() < 0.01, "freq {freq} vs p {p}");
    }
}
