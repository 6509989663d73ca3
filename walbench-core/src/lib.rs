//! walbench core - concurrent write workloads against an embedded SQL store
//!
//! Measures how SQLite behaves under concurrent writers in its two common
//! durability modes:
//! - **DELETE**: rollback journal, writers serialize on the database lock
//! - **WAL**: write-ahead log, one writer alongside concurrent readers
//!
//! # Architecture
//!
//! - **Config**: writer cap, ordered pragma list and busy-retry policy
//! - **Engine**: the seam to the backing store ([`SqliteEngine`] in production)
//! - **Store**: owns the primary session, switches journal modes, tears down files
//! - **Pool**: fixed set of writer threads fed through a bounded queue
//! - **Txn**: validates one record and commits it, retrying on lock contention

pub mod engine;
pub mod pool;
pub mod store;
pub mod txn;

mod error;
mod report;
mod types;

pub use engine::{Engine, Session, SqliteEngine, SqliteSession};
pub use error::{BenchError, Result};
pub use pool::{default_value, WriterPool};
pub use report::WorkloadReport;
pub use store::{ConfigBuilder, ConfigOption, StoreConfig, StoreHandle};
pub use txn::{write_record, RetryPolicy};
pub use types::*;

/// walbench version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod config {
    /// Concurrent writers when no cap is configured
    pub const DEFAULT_MAX_WRITERS: usize = 1;

    /// Inserts per workload run for the command-line runner
    pub const DEFAULT_INSERTS: usize = 100_000;

    /// Attempts per record before giving up on a busy database
    pub const RETRY_MAX_ATTEMPTS: u32 = 8;

    /// First backoff after a busy failure (1ms)
    pub const RETRY_INITIAL_BACKOFF_MS: u64 = 1;

    /// Upper bound on a single backoff sleep (100ms)
    pub const RETRY_MAX_BACKOFF_MS: u64 = 100;
}
