//! Store handle - owns the primary session and the lifecycle of the backing files

mod config;
mod mode;

pub use config::{ConfigBuilder, ConfigOption, StoreConfig};

use crate::engine::{Engine, Session, SqliteEngine};
use crate::pool::{default_value, WriterPool};
use crate::{BenchError, Pragma, Record, Result, WorkloadReport};
use std::path::Path;
use tracing::{debug, info, warn};

/// An open benchmark store
///
/// Exactly one handle exists per backing file. Opening wipes whatever was left
/// behind under the same name; closing removes every file sharing the name as
/// a prefix. An open handle that is dropped is closed on a best-effort basis.
pub struct StoreHandle<E: Engine = SqliteEngine> {
    engine: E,
    session: Option<E::Session>,
    config: StoreConfig,
    /// Pragmas applied after open, replayed on every writer session
    applied: Vec<Pragma>,
}

impl StoreHandle<SqliteEngine> {
    /// Create a fresh SQLite store at `path`
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        Self::open_with(SqliteEngine::new(path.as_ref()), config)
    }
}

impl<E: Engine> StoreHandle<E> {
    /// Create a fresh store on `engine`
    pub fn open_with(engine: E, config: StoreConfig) -> Result<Self> {
        let removed = engine.remove_artifacts()?;
        if removed > 0 {
            debug!("Removed {} stale files for {}", removed, engine.name());
        }

        let mut session = engine.connect()?;
        for pragma in &config.pragmas {
            session.set_pragma(pragma)?;
        }
        session.create_schema()?;

        info!(
            "Opened store {} (max_writers={}, pragmas={})",
            engine.name(),
            config.max_writers,
            config.pragmas.len()
        );

        Ok(Self {
            engine,
            session: Some(session),
            config,
            applied: Vec::new(),
        })
    }

    /// Backing store name
    pub fn name(&self) -> &str {
        self.engine.name()
    }

    /// Configuration the store was opened with
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Backing engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// True from open until close
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Close the primary session and delete the backing files
    ///
    /// Calling close on an already closed store does nothing.
    pub fn close(&mut self) -> Result<()> {
        let session = match self.session.take() {
            Some(session) => session,
            None => return Ok(()),
        };

        let closed = session.close();
        let removed = self.engine.remove_artifacts();
        closed?;
        let removed = removed?;

        info!("Closed store {} ({} files removed)", self.engine.name(), removed);
        Ok(())
    }

    /// Close the primary session but leave the backing files on disk
    pub fn release(&mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => session.close(),
            None => Ok(()),
        }
    }

    /// Delete every file sharing the store name as a prefix
    pub fn remove_artifacts(&self) -> Result<usize> {
        self.engine.remove_artifacts()
    }

    /// Delete all rows in one transaction
    pub fn clear_table(&mut self) -> Result<usize> {
        let removed = self.session()?.clear()?;
        debug!("Cleared {} rows from {}", removed, self.engine.name());
        Ok(removed)
    }

    /// Number of stored rows
    pub fn row_count(&mut self) -> Result<u64> {
        self.session()?.row_count()
    }

    /// Every stored record, ordered by key
    pub fn records(&mut self) -> Result<Vec<Record>> {
        self.session()?.records()
    }

    /// Clear the table, then insert keys `0..n` with values `value_<key>`
    pub fn insert_n(&mut self, n: usize) -> Result<WorkloadReport> {
        self.clear_table()?;
        self.run(n, default_value)
    }

    /// Insert keys `0..n`, with at most `max_writers` transactions in flight
    pub fn run<F>(&mut self, n: usize, value_of: F) -> Result<WorkloadReport>
    where
        F: Fn(i64) -> String + Sync,
    {
        let mode = self.get_mode()?;
        let report = WriterPool::new(&self.engine, &self.config)
            .with_pragmas(&self.applied)
            .run(n, value_of)?;
        let report = report.with_mode(mode);
        info!("{}", report);
        Ok(report)
    }

    fn session(&mut self) -> Result<&mut E::Session> {
        let name = self.engine.name();
        self.session
            .as_mut()
            .ok_or_else(|| BenchError::Closed(name.to_string()))
    }
}

impl<E: Engine> Drop for StoreHandle<E> {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(e) = self.close() {
                warn!("Failed to close store {}: {}", self.engine.name(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;
    use crate::DurabilityMode;
    use std::fs;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn leftover_files(dir: &Path, prefix: &str) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(prefix))
            .collect()
    }

    #[test]
    fn test_wal_end_to_end() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("t.db");

        let config = StoreConfig::builder().max_writers(4).build();
        let mut store = StoreHandle::open(&path, config).unwrap();
        store.set_mode(DurabilityMode::Wal).unwrap();
        assert_eq!(store.get_mode().unwrap(), DurabilityMode::Wal);

        let report = store.insert_n(1_000).unwrap();
        assert_eq!(report.requested, 1_000);
        assert_eq!(report.written, 1_000);
        assert_eq!(report.mode, Some(DurabilityMode::Wal));
        assert!(report.peak_in_flight <= 4);

        let records = store.records().unwrap();
        assert_eq!(records.len(), 1_000);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.key, i as i64);
            assert_eq!(record.value, format!("value_{}", i));
        }

        store.close().unwrap();
        assert!(!store.is_open());
        assert!(leftover_files(temp_dir.path(), "t.db").is_empty());
    }

    #[test]
    fn test_delete_mode_concurrent_writers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("delete.db");

        let config = StoreConfig::builder()
            .pragma("busy_timeout", "5000")
            .max_writers(4)
            .build();
        let mut store = StoreHandle::open(&path, config).unwrap();
        store.set_mode(DurabilityMode::Delete).unwrap();

        let report = store.insert_n(200).unwrap();
        assert_eq!(report.written, 200);
        assert_eq!(report.mode, Some(DurabilityMode::Delete));
        assert_eq!(store.row_count().unwrap(), 200);

        // Repeated runs start from an empty table
        let report = store.insert_n(50).unwrap();
        assert_eq!(report.written, 50);
        assert_eq!(store.row_count().unwrap(), 50);
    }

    #[test]
    fn test_open_removes_stale_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stale.db");
        fs::write(&path, b"not a database").unwrap();
        fs::write(temp_dir.path().join("stale.db-journal"), b"junk").unwrap();

        let mut store = StoreHandle::open(&path, StoreConfig::default()).unwrap();
        assert_eq!(store.row_count().unwrap(), 0);
        assert!(!temp_dir.path().join("stale.db-journal").exists());
    }

    #[test]
    fn test_operations_after_close() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("closed.db");

        let mut store = StoreHandle::open(&path, StoreConfig::default()).unwrap();
        store.close().unwrap();

        assert!(matches!(store.clear_table(), Err(BenchError::Closed(_))));
        assert!(matches!(store.get_mode(), Err(BenchError::Closed(_))));
        assert!(matches!(store.insert_n(10), Err(BenchError::Closed(_))));

        // Second close is a no-op
        store.close().unwrap();
    }

    #[test]
    fn test_release_keeps_files() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("kept.db");

        let mut store = StoreHandle::open(&path, StoreConfig::default()).unwrap();
        store.insert_n(5).unwrap();
        store.release().unwrap();
        assert!(!store.is_open());
        drop(store);

        assert!(path.exists());
        let mut reopened = crate::SqliteEngine::new(&path).connect().unwrap();
        assert_eq!(reopened.row_count().unwrap(), 5);
    }

    #[test]
    fn test_drop_closes_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dropped.db");
        {
            let mut store = StoreHandle::open(&path, StoreConfig::default()).unwrap();
            store.insert_n(10).unwrap();
        }
        assert!(leftover_files(temp_dir.path(), "dropped.db").is_empty());
    }

    #[test]
    fn test_open_applies_pragmas_before_schema() {
        let engine = MockEngine::new();
        let state = engine.state.clone();
        let config = StoreConfig::builder()
            .pragma("a", "1")
            .pragma("b", "2")
            .build();

        let store = StoreHandle::open_with(engine, config).unwrap();
        assert_eq!(
            store.engine().statements(),
            vec!["PRAGMA a = 1", "PRAGMA b = 2", "CREATE TABLE records"]
        );
        assert!(state.removed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_writer_sessions_get_applied_pragmas() {
        let config = StoreConfig::builder().pragma("a", "1").build();
        let mut store = StoreHandle::open_with(MockEngine::new(), config).unwrap();
        store
            .apply_pragmas(&[Pragma::new("busy_timeout", "100")])
            .unwrap();

        let before = store.engine().statements().len();
        store.run(1, default_value).unwrap();
        let issued = &store.engine().statements()[before..];
        assert_eq!(
            issued,
            [
                "PRAGMA journal_mode",
                "PRAGMA a = 1",
                "PRAGMA busy_timeout = 100",
                "INSERT 0",
                "CLOSE"
            ]
        );
    }

    #[test]
    fn test_configured_journal_mode_does_not_fight_set_mode() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("switched.db");

        let config = StoreConfig::builder()
            .pragma("busy_timeout", "2000")
            .pragma("journal_mode", "DELETE")
            .max_writers(4)
            .build();
        let mut store = StoreHandle::open(&path, config).unwrap();
        store.set_mode(DurabilityMode::Wal).unwrap();

        for _ in 0..3 {
            let report = store.insert_n(200).unwrap();
            assert_eq!(report.written, 200);
            assert_eq!(report.mode, Some(DurabilityMode::Wal));
        }
        assert_eq!(store.get_mode().unwrap(), DurabilityMode::Wal);
    }
}
