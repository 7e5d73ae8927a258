//! Organisms and the copy-on-write lineage records they share.

mod lineage;
mod organism;

pub use organism::Organism;
