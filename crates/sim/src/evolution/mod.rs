//! Evolutionary operators: mutation of a replicated child and fecundity
//! selection of its parent.

pub mod mutation;
pub mod selection;

pub use mutation::{MutationOutcome, mutate};
pub use selection::{BirthRateBound, sample_by_rejection};
