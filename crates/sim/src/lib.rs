//! # Simulation Crate
//!
//! The `sim` crate provides a continuous-time Moran-type engine for
//! estimating the fixation probability of tracked lineages. It includes
//! modules for genotypes and copy-on-write lineages, the mutation and
//! selection operators, the population event engine with its experiment
//! driver, and persistence of populations and trial results.

pub mod base;
pub mod errors;
pub mod evolution;
pub mod genome;
pub mod prelude;
pub mod simulation;
pub mod storage;

pub use base::Allele;
pub use genome::Organism;
