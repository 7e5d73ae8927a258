//! Persists a batch of trials to SQLite.

use crate::errors::DatabaseError;
use crate::simulation::{Configuration, TrialSummary};
use crate::storage::Database;
use rusqlite::params;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Statistics about what a recorder wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderStats {
    /// Trial rows written.
    pub trials_recorded: usize,
    /// Time-series rows written.
    pub rows_recorded: usize,
}

/// Writes the configuration and the results of a trial batch.
///
/// Each call to [`Recorder::record_summary`] runs in one transaction, so a
/// failed write leaves no partial batch behind.
#[derive(Debug)]
pub struct Recorder {
    db: Database,
    stats: RecorderStats,
}

impl Recorder {
    /// Open (or create) the database and store the run configuration.
    pub fn new(db_path: impl AsRef<Path>, config: &Configuration) -> Result<Self, DatabaseError> {
        let mut db = Database::open(db_path)?;

        let config_json =
            serde_json::to_string(config).map_err(|e| DatabaseError::Insert(e.to_string()))?;
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let meta_pairs = [
            ("full_config_json", config_json),
            ("trials", config.execution.trials.to_string()),
            ("capacity", config.population.capacity.to_string()),
            (
                "tracked_initial",
                config.population.tracked_initial.to_string(),
            ),
            ("created_at", created_at.to_string()),
        ];

        let tx = db.transaction()?;
        {
            let mut stmt = tx
                .prepare("INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)")
                .map_err(|e| DatabaseError::Insert(e.to_string()))?;
            for (k, v) in meta_pairs {
                stmt.execute(params![k, v])
                    .map_err(|e| DatabaseError::Insert(e.to_string()))?;
            }
        }
        tx.commit()
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;

        Ok(Self {
            db,
            stats: RecorderStats::default(),
        })
    }

    /// Write every trial report of `summary`, their time series, and the
    /// aggregate counts.
    pub fn record_summary(&mut self, summary: &TrialSummary) -> Result<(), DatabaseError> {
        let mut rows_recorded = 0;
        let tx = self.db.transaction()?;
        {
            let mut trial_stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO trials
                     (trial_id, seed, outcome, generations, time, events, final_org_count,
                      births, deaths, tracked_births, tracked_deaths)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                )
                .map_err(|e| DatabaseError::Insert(e.to_string()))?;
            let mut row_stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO timeseries
                     (trial_id, row_id, generations, time, mean_birth_rate, num_in_state,
                      tracked_orgs, lineages, birth_rate_variance)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )
                .map_err(|e| DatabaseError::Insert(e.to_string()))?;

            for report in &summary.reports {
                // SQLite integers are signed; seeds keep their bit pattern.
                trial_stmt
                    .execute(params![
                        report.index as i64,
                        report.seed as i64,
                        report.outcome.as_str(),
                        report.generations,
                        report.time,
                        report.events as i64,
                        report.final_org_count as i64,
                        report.births as i64,
                        report.deaths as i64,
                        report.tracked_births as i64,
                        report.tracked_deaths as i64,
                    ])
                    .map_err(|e| DatabaseError::Insert(e.to_string()))?;

                for (row_id, row) in report.series.iter().enumerate() {
                    let census = serde_json::to_string(&row.num_in_state)
                        .map_err(|e| DatabaseError::Insert(e.to_string()))?;
                    row_stmt
                        .execute(params![
                            report.index as i64,
                            row_id as i64,
                            row.generations,
                            row.time,
                            row.mean_birth_rate,
                            census,
                            row.tracked_orgs as i64,
                            row.lineages as i64,
                            row.birth_rate_variance,
                        ])
                        .map_err(|e| DatabaseError::Insert(e.to_string()))?;
                    rows_recorded += 1;
                }
            }

            let mut meta_stmt = tx
                .prepare("INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)")
                .map_err(|e| DatabaseError::Insert(e.to_string()))?;
            for (k, v) in [
                ("master_seed", summary.seed.to_string()),
                ("fixed", summary.fixed.to_string()),
                ("lost", summary.lost.to_string()),
                ("extinct", summary.extinct.to_string()),
                ("unresolved", summary.unresolved.to_string()),
                (
                    "fixation_probability",
                    summary.fixation_probability().to_string(),
                ),
            ] {
                meta_stmt
                    .execute(params![k, v])
                    .map_err(|e| DatabaseError::Insert(e.to_string()))?;
            }
        }
        tx.commit()
            .map_err(|e| DatabaseError::Transaction(e.to_string()))?;

        self.stats.trials_recorded += summary.reports.len();
        self.stats.rows_recorded += rows_recorded;
        debug!(
            trials = summary.reports.len(),
            rows = rows_recorded,
            "Recorded trial batch"
        );
        Ok(())
    }

    pub fn stats(&self) -> &RecorderStats {
        &self.stats
    }

    /// Close the database, returning what was written.
    pub fn close(self) -> Result<RecorderStats, DatabaseError> {
        info!(
            trials = self.stats.trials_recorded,
            rows = self.stats.rows_recorded,
            path = self.db.path(),
            "Closing recorder"
        );
        self.db.close()?;
        Ok(self.stats)
    }
}
