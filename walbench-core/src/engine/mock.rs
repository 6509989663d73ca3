//! In-memory engine that records every statement it receives

use super::{Engine, Session};
use crate::{BenchError, DurabilityMode, Pragma, Record, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub(crate) struct MockState {
    pub statements: Mutex<Vec<String>>,
    pub rows: Mutex<BTreeMap<i64, String>>,
    pub journal_mode: Mutex<String>,
    pub sessions_opened: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    /// Inserts that fail with `Busy` before one is allowed through
    pub busy_failures: AtomicU32,
    /// Every insert fails with a non-retryable engine error
    pub broken: AtomicBool,
    pub removed: AtomicBool,
    pub insert_delay: Mutex<Duration>,
}

pub(crate) struct MockEngine {
    pub state: Arc<MockState>,
}

impl MockEngine {
    pub fn new() -> Self {
        let state = MockState::default();
        *state.journal_mode.lock() = "delete".to_string();
        Self {
            state: Arc::new(state),
        }
    }

    pub fn with_insert_delay(self, delay: Duration) -> Self {
        *self.state.insert_delay.lock() = delay;
        self
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.statements.lock().clone()
    }

    pub fn inserts(&self) -> usize {
        self.statements()
            .iter()
            .filter(|s| s.starts_with("INSERT"))
            .count()
    }

    pub fn peak(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }
}

impl Engine for MockEngine {
    type Session = MockSession;

    fn name(&self) -> &str {
        "mock"
    }

    fn connect(&self) -> Result<MockSession> {
        self.state.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            state: self.state.clone(),
        })
    }

    fn remove_artifacts(&self) -> Result<usize> {
        self.state.removed.store(true, Ordering::SeqCst);
        Ok(0)
    }
}

pub(crate) struct MockSession {
    state: Arc<MockState>,
}

impl MockSession {
    fn log(&self, statement: String) {
        self.state.statements.lock().push(statement);
    }
}

impl Session for MockSession {
    fn create_schema(&mut self) -> Result<()> {
        self.log("CREATE TABLE records".to_string());
        Ok(())
    }

    fn query_pragma(&mut self, setting: &str) -> Result<Option<String>> {
        self.log(format!("PRAGMA {}", setting));
        if setting == "journal_mode" {
            return Ok(Some(self.state.journal_mode.lock().clone()));
        }
        Ok(None)
    }

    fn set_pragma(&mut self, pragma: &Pragma) -> Result<()> {
        pragma.validate()?;
        self.log(format!("PRAGMA {} = {}", pragma.setting, pragma.value));
        Ok(())
    }

    fn set_journal_mode(&mut self, mode: DurabilityMode) -> Result<Option<String>> {
        self.log(format!("PRAGMA journal_mode = {}", mode.pragma_value()));
        let reported = mode.pragma_value().to_lowercase();
        *self.state.journal_mode.lock() = reported.clone();
        Ok(Some(reported))
    }

    fn insert(&mut self, record: &Record) -> Result<()> {
        let state = &self.state;
        let now = state.active.fetch_add(1, Ordering::SeqCst) + 1;
        state.peak.fetch_max(now, Ordering::SeqCst);

        let delay = *state.insert_delay.lock();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        self.log(format!("INSERT {}", record.key));
        let busy = state
            .busy_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        let result = if busy {
            Err(BenchError::Busy("database is locked".to_string()))
        } else if state.broken.load(Ordering::SeqCst) {
            Err(BenchError::Sqlite(rusqlite::Error::InvalidQuery))
        } else {
            state.rows.lock().insert(record.key, record.value.clone());
            Ok(())
        };

        state.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn clear(&mut self) -> Result<usize> {
        self.log("DELETE FROM records".to_string());
        let mut rows = self.state.rows.lock();
        let removed = rows.len();
        rows.clear();
        Ok(removed)
    }

    fn row_count(&mut self) -> Result<u64> {
        Ok(self.state.rows.lock().len() as u64)
    }

    fn records(&mut self) -> Result<Vec<Record>> {
        Ok(self
            .state
            .rows
            .lock()
            .iter()
            .map(|(k, v)| Record::new(*k, v.clone()))
            .collect())
    }

    fn close(self) -> Result<()> {
        self.log("CLOSE".to_string());
        Ok(())
    }
}
