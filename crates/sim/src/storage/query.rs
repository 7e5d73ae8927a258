//! Query interface for recorded trial batches.

use crate::errors::DatabaseError;
use crate::simulation::{Configuration, TrialOutcome, TrialReport, TrialSummary};
use crate::storage::{Database, ReportRow};
use rusqlite::{OptionalExtension, Row, params};
use std::collections::HashMap;
use std::path::Path;

/// Query builder for analyzing recorded trials.
pub struct QueryBuilder {
    db: Database,
}

fn query_err(e: impl std::fmt::Display) -> DatabaseError {
    DatabaseError::Query(e.to_string())
}

impl QueryBuilder {
    /// Open a database for querying.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    /// Get raw metadata value by key.
    pub fn get_metadata_value(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare("SELECT value FROM metadata WHERE key = ?1")
            .map_err(query_err)?;

        stmt.query_row(params![key], |row| row.get(0))
            .optional()
            .map_err(query_err)
    }

    /// Get all metadata as a map.
    pub fn get_metadata(&self) -> Result<HashMap<String, String>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare("SELECT key, value FROM metadata")
            .map_err(query_err)?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(query_err)?;

        let mut meta = HashMap::new();
        for row in rows {
            let (k, v): (String, String) = row.map_err(query_err)?;
            meta.insert(k, v);
        }
        Ok(meta)
    }

    /// Get the configuration the batch was run with.
    pub fn get_full_config(&self) -> Result<Configuration, DatabaseError> {
        let json = self.get_metadata_value("full_config_json")?.ok_or_else(|| {
            DatabaseError::Query("Missing full_config_json in metadata".to_string())
        })?;

        serde_json::from_str(&json)
            .map_err(|e| DatabaseError::Query(format!("Failed to parse config: {e}")))
    }

    /// Number of trials per outcome.
    pub fn get_outcome_counts(&self) -> Result<HashMap<TrialOutcome, usize>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare("SELECT outcome, COUNT(*) FROM trials GROUP BY outcome")
            .map_err(query_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })
            .map_err(query_err)?;

        let mut counts = HashMap::new();
        for row in rows {
            let (outcome, n) = row.map_err(query_err)?;
            counts.insert(outcome.parse::<TrialOutcome>().map_err(query_err)?, n);
        }
        Ok(counts)
    }

    /// Get all trial rows ordered by trial index, without their series.
    pub fn get_trials(&self) -> Result<Vec<TrialReport>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(
                "SELECT trial_id, seed, outcome, generations, time, events, final_org_count,
                        births, deaths, tracked_births, tracked_deaths
                 FROM trials
                 ORDER BY trial_id",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(2)?, trial_from_row(row)?)))
            .map_err(query_err)?;

        let mut trials = Vec::new();
        for row in rows {
            let (outcome, mut report) = row.map_err(query_err)?;
            report.outcome = outcome.parse().map_err(query_err)?;
            trials.push(report);
        }
        Ok(trials)
    }

    /// Get the recorded series of one trial (empty if none was kept).
    pub fn get_series(&self, trial: usize) -> Result<Vec<ReportRow>, DatabaseError> {
        let mut stmt = self
            .db
            .connection()
            .prepare(
                "SELECT generations, time, mean_birth_rate, num_in_state,
                        tracked_orgs, lineages, birth_rate_variance
                 FROM timeseries
                 WHERE trial_id = ?1
                 ORDER BY row_id",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![trial as i64], |row| {
                Ok((
                    row.get::<_, f64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)? as usize,
                    row.get::<_, i64>(5)? as usize,
                    row.get::<_, f64>(6)?,
                ))
            })
            .map_err(query_err)?;

        let mut series = Vec::new();
        for row in rows {
            let (generations, time, mean_birth_rate, census, tracked_orgs, lineages, variance) =
                row.map_err(query_err)?;
            series.push(ReportRow {
                generations,
                time,
                mean_birth_rate,
                num_in_state: serde_json::from_str(&census).map_err(query_err)?,
                tracked_orgs,
                lineages,
                birth_rate_variance: variance,
            });
        }
        Ok(series)
    }

    /// Rebuild the recorded batch, including every stored series.
    pub fn get_summary(&self) -> Result<TrialSummary, DatabaseError> {
        let seed = self
            .get_metadata_value("master_seed")?
            .ok_or_else(|| DatabaseError::Query("No trial batch recorded".to_string()))?
            .parse::<u64>()
            .map_err(query_err)?;

        let mut reports = self.get_trials()?;
        for report in &mut reports {
            report.series = self.get_series(report.index)?;
        }
        let count = |o| reports.iter().filter(|r| r.outcome == o).count();
        Ok(TrialSummary {
            seed,
            trials: reports.len(),
            fixed: count(TrialOutcome::Fixed),
            lost: count(TrialOutcome::Lost),
            extinct: count(TrialOutcome::Extinct),
            unresolved: count(TrialOutcome::Unresolved),
            reports,
        })
    }

    /// Close the query builder.
    pub fn close(self) -> Result<(), DatabaseError> {
        self.db.close()
    }
}

/// Reads every column but the outcome, which needs its own parse error.
fn trial_from_row(row: &Row<'_>) -> rusqlite::Result<TrialReport> {
    Ok(TrialReport {
        index: row.get::<_, i64>(0)? as usize,
        seed: row.get::<_, i64>(1)? as u64,
        outcome: TrialOutcome::Unresolved,
        generations: row.get(3)?,
        time: row.get(4)?,
        events: row.get::<_, i64>(5)? as u64,
        final_org_count: row.get::<_, i64>(6)? as usize,
        births: row.get::<_, i64>(7)? as u64,
        deaths: row.get::<_, i64>(8)? as u64,
        tracked_births: row.get::<_, i64>(9)? as u64,
        tracked_deaths: row.get::<_, i64>(10)? as u64,
        series: Vec::new(),
    })
}
