//! Low-level database operations and schema management.

pub use crate::errors::DatabaseError;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::warn;

/// Database connection wrapper with schema management.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
    db_path: String,
}

impl Database {
    /// Open (or create) a database at the specified path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let conn =
            Connection::open(&path_str).map_err(|e| DatabaseError::Connection(e.to_string()))?;

        // Performance pragmas for faster bulk inserts
        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA journal_mode = WAL;
             PRAGMA temp_store = MEMORY;",
        )
        .map_err(|e| DatabaseError::Initialization(e.to_string()))?;

        let mut db = Self {
            conn,
            db_path: path_str,
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&mut self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "-- Run-level items (configuration, summary)
                CREATE TABLE IF NOT EXISTS metadata (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );

                -- One row per trial
                CREATE TABLE IF NOT EXISTS trials (
                    trial_id INTEGER PRIMARY KEY,
                    seed INTEGER NOT NULL,
                    outcome TEXT NOT NULL,
                    generations REAL NOT NULL,
                    time REAL NOT NULL,
                    events INTEGER NOT NULL,
                    final_org_count INTEGER NOT NULL,
                    births INTEGER NOT NULL,
                    deaths INTEGER NOT NULL,
                    tracked_births INTEGER NOT NULL,
                    tracked_deaths INTEGER NOT NULL
                );

                -- Snapshot rows of trials that kept their series
                CREATE TABLE IF NOT EXISTS timeseries (
                    trial_id INTEGER NOT NULL,
                    row_id INTEGER NOT NULL,
                    generations REAL NOT NULL,
                    time REAL NOT NULL,
                    mean_birth_rate REAL NOT NULL,
                    num_in_state TEXT NOT NULL, -- JSON array
                    tracked_orgs INTEGER NOT NULL,
                    lineages INTEGER NOT NULL,
                    birth_rate_variance REAL NOT NULL,
                    PRIMARY KEY (trial_id, row_id)
                );

                CREATE INDEX IF NOT EXISTS idx_trials_outcome ON trials(outcome);",
            )
            .map_err(|e| DatabaseError::Initialization(e.to_string()))?;

        Ok(())
    }

    /// Begin a transaction for batched operations.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, DatabaseError> {
        self.conn
            .transaction()
            .map_err(|e| DatabaseError::Transaction(e.to_string()))
    }

    /// Get reference to underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get database path.
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Close the database and clean up WAL files.
    pub fn close(self) -> Result<(), DatabaseError> {
        if let Err(e) = self.conn.execute_batch(
            "PRAGMA wal_checkpoint(TRUNCATE);
             PRAGMA journal_mode = DELETE;",
        ) {
            warn!("Failed to checkpoint/truncate WAL: {e}");
        }

        self.conn
            .close()
            .map_err(|(_conn, e)| DatabaseError::Close(e.to_string()))?;

        for suffix in &["-wal", "-shm"] {
            let fname = format!("{}{}", self.db_path, suffix);
            if let Err(e) = std::fs::remove_file(&fname) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {fname}: {e}");
                }
            }
        }

        Ok(())
    }

    /// Get database statistics.
    pub fn stats(&self) -> Result<DatabaseStats, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| DatabaseError::Query(e.to_string()))?;

        let mut tables = Vec::new();
        for row in rows {
            tables.push(row.map_err(|e| DatabaseError::Query(e.to_string()))?);
        }

        let count = |table: &str| -> Result<usize, DatabaseError> {
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get::<_, i64>(0)
                })
                .map(|n| n as usize)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        };

        Ok(DatabaseStats {
            trial_records: count("trials")?,
            timeseries_records: count("timeseries")?,
            tables,
        })
    }
}

/// Database statistics.
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub trial_records: usize,
    pub timeseries_records: usize,
    pub tables: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_database_creation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runs.sqlite");

        let db = Database::open(&path).expect("Failed to create database");
        assert_eq!(db.path(), path.to_string_lossy());

        db.close().expect("Failed to close database");
        assert!(path.exists());
        assert!(!dir.path().join("runs.sqlite-wal").exists());
    }

    #[test]
    fn test_schema_initialization() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("schema.sqlite")).unwrap();
        let stats = db.stats().expect("Failed to get stats");

        for table in ["metadata", "trials", "timeseries"] {
            assert!(stats.tables.contains(&table.to_string()), "{table}");
        }
        assert_eq!(stats.trial_records, 0);
        assert_eq!(stats.timeseries_records, 0);
        db.close().unwrap();
    }

    #[test]
    fn test_transaction() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(dir.path().join("tx.sqlite")).unwrap();
        let tx = db.transaction().expect("Failed to begin transaction");
        tx.execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2)",
            ["k", "v"],
        )
        .unwrap();
        tx.commit().expect("Failed to commit transaction");

        // reopening keeps the schema and data
        let path = db.path().to_string();
        db.close().unwrap();
        let db = Database::open(&path).unwrap();
        let value: String = db
            .connection()
            .query_row("SELECT value FROM metadata WHERE key = 'k'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(value, "v");
    }
}
