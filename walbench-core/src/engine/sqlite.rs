//! File-backed SQLite engine

use super::{Engine, Session};
use crate::{BenchError, DurabilityMode, Pragma, Record, Result};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CREATE_SQL: &str =
    "CREATE TABLE IF NOT EXISTS records (key INTEGER PRIMARY KEY NOT NULL, value TEXT NOT NULL)";
const INSERT_SQL: &str = "INSERT INTO records (key, value) VALUES (?1, ?2)";
const CLEAR_SQL: &str = "DELETE FROM records";
const COUNT_SQL: &str = "SELECT COUNT(*) FROM records";
const SELECT_SQL: &str = "SELECT key, value FROM records ORDER BY key";

/// SQLite database stored at a single path, plus its `-wal`/`-shm`/`-journal` sidecars
#[derive(Debug, Clone)]
pub struct SqliteEngine {
    path: PathBuf,
    name: String,
}

impl SqliteEngine {
    /// Create an engine for the database file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.to_string_lossy().into_owned();
        Self { path, name }
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Engine for SqliteEngine {
    type Session = SqliteSession;

    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> Result<SqliteSession> {
        let conn = Connection::open(&self.path).map_err(BenchError::from_sqlite)?;
        debug!("Opened SQLite connection to {:?}", self.path);
        Ok(SqliteSession { conn })
    }

    /// Delete every file in the parent directory whose name starts with the database file name
    fn remove_artifacts(&self) -> Result<usize> {
        let prefix = match self.path.file_name().and_then(|n| n.to_str()) {
            Some(prefix) => prefix,
            None => {
                return Err(BenchError::Config(format!(
                    "database path has no file name: {:?}",
                    self.path
                )))
            }
        };
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut removed = 0;
        if !dir.exists() {
            return Ok(removed);
        }
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with(prefix) {
                    fs::remove_file(&path)?;
                    debug!("Removed {:?}", path);
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

/// One rusqlite connection
pub struct SqliteSession {
    conn: Connection,
}

impl Session for SqliteSession {
    fn create_schema(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_SQL)
            .map_err(BenchError::from_sqlite)
    }

    fn query_pragma(&mut self, setting: &str) -> Result<Option<String>> {
        Pragma::validate_setting(setting)?;
        let sql = format!("PRAGMA {}", setting);
        self.conn
            .query_row(&sql, [], |row| Ok(value_to_string(row.get_ref(0)?)))
            .optional()
            .map(Option::flatten)
            .map_err(BenchError::from_sqlite)
    }

    fn set_pragma(&mut self, pragma: &Pragma) -> Result<()> {
        pragma.validate()?;
        // execute_batch steps past any row the pragma echoes back
        let sql = format!("PRAGMA {} = {};", pragma.setting, pragma.value);
        self.conn
            .execute_batch(&sql)
            .map_err(BenchError::from_sqlite)
    }

    fn set_journal_mode(&mut self, mode: DurabilityMode) -> Result<Option<String>> {
        let sql = format!("PRAGMA journal_mode = {}", mode.pragma_value());
        let mut stmt = self.conn.prepare(&sql).map_err(BenchError::from_sqlite)?;
        let mut rows = stmt.query([]).map_err(BenchError::from_sqlite)?;
        let mut reported = None;
        while let Some(row) = rows.next().map_err(BenchError::from_sqlite)? {
            reported = value_to_string(row.get_ref(0).map_err(BenchError::from_sqlite)?);
        }
        Ok(reported)
    }

    fn insert(&mut self, record: &Record) -> Result<()> {
        // IMMEDIATE takes the write lock at BEGIN, so a busy failure never leaves
        // a half-done transaction behind
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(BenchError::from_sqlite)?;
        {
            let mut stmt = tx.prepare_cached(INSERT_SQL).map_err(BenchError::from_sqlite)?;
            stmt.execute(params![record.key, record.value])
                .map_err(BenchError::from_sqlite)?;
        }
        tx.commit().map_err(BenchError::from_sqlite)
    }

    fn clear(&mut self) -> Result<usize> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(BenchError::from_sqlite)?;
        let removed = tx.execute(CLEAR_SQL, []).map_err(BenchError::from_sqlite)?;
        tx.commit().map_err(BenchError::from_sqlite)?;
        Ok(removed)
    }

    fn row_count(&mut self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(COUNT_SQL, [], |row| row.get(0))
            .map_err(BenchError::from_sqlite)?;
        Ok(count as u64)
    }

    fn records(&mut self) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(SELECT_SQL).map_err(BenchError::from_sqlite)?;
        let rows = stmt
            .query_map([], |row| Ok(Record::new(row.get(0)?, row.get::<_, String>(1)?)))
            .map_err(BenchError::from_sqlite)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(BenchError::from_sqlite)
    }

    fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| BenchError::from_sqlite(e))
    }
}

fn value_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
    }
}
