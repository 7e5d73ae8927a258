//! Base types for genotype representation.
//!
//! The genome of an organism is a single tri-state allele.

mod allele;

pub use allele::Allele;
