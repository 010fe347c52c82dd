use chrono::{DateTime, Local, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::app_dirs::AppDirs;
use crate::solve::{Penalty, Solve, UnknownPenalty};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored solve {id} is corrupt: {source}")]
    BadPenalty { id: i64, source: UnknownPenalty },
    #[error("stored solve {id} has an invalid timestamp")]
    BadTimestamp { id: i64 },
    #[error("no solve with id {0}")]
    NotFound(i64),
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// A solve together with its database row id
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSolve {
    pub id: i64,
    pub solve: Solve,
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS solves (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        time_ms INTEGER NOT NULL CHECK (time_ms >= 0),
        penalty TEXT NOT NULL,
        scramble TEXT,
        recorded_at TEXT NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_solves_recorded_at ON solves(recorded_at);
"#;

const INSERT_SOLVE: &str =
    "INSERT INTO solves (time_ms, penalty, scramble, recorded_at) VALUES (?1, ?2, ?3, ?4)";

/// Solve history persisted in SQLite. Raw time and penalty are stored apart,
/// so editing a penalty never touches the recorded time.
#[derive(Debug)]
pub struct SolveStore {
    conn: Connection,
}

impl SolveStore {
    /// Open the default database under the application state directory
    pub fn open_default() -> Result<Self> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("cubik_solves.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened solve history");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn record(&self, solve: &Solve) -> Result<i64> {
        insert(&self.conn, solve)?;
        let id = self.conn.last_insert_rowid();
        debug!(id, time_ms = solve.time_ms, penalty = %solve.penalty, "recorded solve");
        Ok(id)
    }

    /// Insert many solves in one transaction
    pub fn record_batch(&mut self, solves: &[Solve]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        for solve in solves {
            insert(&tx, solve)?;
        }
        tx.commit()?;
        Ok(solves.len())
    }

    /// Every solve in the order it happened
    pub fn all(&self) -> Result<Vec<StoredSolve>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, time_ms, penalty, scramble, recorded_at FROM solves ORDER BY recorded_at, id",
        )?;
        let rows = stmt.query_map([], raw_row)?;

        let mut solves = Vec::new();
        for row in rows {
            solves.push(row?.into_stored()?);
        }
        Ok(solves)
    }

    pub fn set_penalty(&self, id: i64, penalty: Penalty) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE solves SET penalty = ?1 WHERE id = ?2",
            params![penalty.as_str(), id],
        )?;
        if changed == 0 {
            return Err(HistoryError::NotFound(id));
        }
        Ok(())
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        let changed = self
            .conn
            .execute("DELETE FROM solves WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(HistoryError::NotFound(id));
        }
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM solves", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM solves", [])?;
        Ok(())
    }
}

fn insert(conn: &Connection, solve: &Solve) -> rusqlite::Result<usize> {
    conn.execute(
        INSERT_SOLVE,
        params![
            solve.time_ms as i64,
            solve.penalty.as_str(),
            solve.scramble,
            stored_timestamp(&solve.recorded_at),
        ],
    )
}

/// Fixed-width RFC 3339 in UTC, so text order matches time order across
/// local offset changes
fn stored_timestamp(at: &DateTime<Local>) -> String {
    at.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Nanos, true)
}

struct RawRow {
    id: i64,
    time_ms: i64,
    penalty: String,
    scramble: Option<String>,
    recorded_at: String,
}

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        time_ms: row.get(1)?,
        penalty: row.get(2)?,
        scramble: row.get(3)?,
        recorded_at: row.get(4)?,
    })
}

impl RawRow {
    fn into_stored(self) -> Result<StoredSolve> {
        let id = self.id;
        let penalty = self
            .penalty
            .parse::<Penalty>()
            .map_err(|source| HistoryError::BadPenalty { id, source })?;
        let recorded_at = DateTime::parse_from_rfc3339(&self.recorded_at)
            .map_err(|_| HistoryError::BadTimestamp { id })?
            .with_timezone(&Local);

        Ok(StoredSolve {
            id,
            solve: Solve {
                time_ms: self.time_ms.max(0) as u64,
                penalty,
                scramble: self.scramble,
                recorded_at,
            },
        })
    }
}
