//! Engine seam - the transactional store a workload is driven against
//!
//! The harness only needs begin/insert/commit, pragma access and a way to
//! remove on-disk artifacts. [`SqliteEngine`] is the production backend;
//! anything else exposing the same surface can be benchmarked the same way.

mod sqlite;

#[cfg(test)]
pub(crate) mod mock;

pub use sqlite::{SqliteEngine, SqliteSession};

use crate::{DurabilityMode, Pragma, Record, Result};

/// A backing store that hands out sessions
pub trait Engine: Sync {
    type Session: Session;

    /// Identifier of the backing store (file path for SQLite)
    fn name(&self) -> &str;

    /// Open a new session
    fn connect(&self) -> Result<Self::Session>;

    /// Remove every artifact belonging to this store, returning how many
    fn remove_artifacts(&self) -> Result<usize>;
}

/// One connection to the backing store
pub trait Session: Send {
    /// Create the `records` table
    fn create_schema(&mut self) -> Result<()>;

    /// Read a pragma; `None` when the engine returns no row
    fn query_pragma(&mut self, setting: &str) -> Result<Option<String>>;

    /// Apply a single pragma
    fn set_pragma(&mut self, pragma: &Pragma) -> Result<()>;

    /// Switch journal mode, returning the mode the engine reports back
    fn set_journal_mode(&mut self, mode: DurabilityMode) -> Result<Option<String>>;

    /// Insert one record in its own transaction
    fn insert(&mut self, record: &Record) -> Result<()>;

    /// Delete all rows in one transaction, returning how many were removed
    fn clear(&mut self) -> Result<usize>;

    /// Number of stored rows
    fn row_count(&mut self) -> Result<u64>;

    /// All stored records ordered by key
    fn records(&mut self) -> Result<Vec<Record>>;

    /// Close the session
    fn close(self) -> Result<()>
    where
        Self: Sized;
}
