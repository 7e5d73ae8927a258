//! Storage module for persisting simulation data.
//!
//! - `snapshot`: binary population snapshots that keep lineage sharing.
//! - `timeseries`: per-snapshot report rows and a TSV writer.
//! - `database`, `recorder`, `query`: SQLite recording of trial batches,
//!   for reproducibility and post-run analysis.

mod database;
mod query;
mod recorder;
pub mod snapshot;
pub mod timeseries;

pub use database::{Database, DatabaseStats};
pub use query::QueryBuilder;
pub use recorder::{Recorder, RecorderStats};
pub use snapshot::{LineageRecord, LineageTable, PopulationSnapshot};
pub use timeseries::{ReportRow, TimeSeries, TsvWriter};
