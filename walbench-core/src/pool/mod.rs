//! Bounded writer pool
//!
//! A fixed set of `max_writers` threads, each with its own session, pulls
//! task indices off a bounded channel. The driver blocks once the channel is
//! full, so neither running transactions nor queued tasks can outgrow the
//! writer cap.

mod gauge;

pub use gauge::{InFlight, InFlightGuard};

use crate::engine::{Engine, Session};
use crate::store::StoreConfig;
use crate::txn::write_record;
use crate::{BenchError, Pragma, Record, Result, WorkloadReport};
use chrono::Utc;
use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;
use tracing::{debug, warn};

/// Value stored under `key` by the default workload
pub fn default_value(key: i64) -> String {
    format!("value_{}", key)
}

/// Runs write workloads against one engine
pub struct WriterPool<'a, E: Engine> {
    engine: &'a E,
    config: &'a StoreConfig,
    pragmas: &'a [Pragma],
}

/// Counters shared by the workers of one run
#[derive(Default)]
struct RunState {
    written: AtomicUsize,
    rejected: AtomicUsize,
    retries: AtomicU64,
    in_flight: InFlight,
    aborted: AtomicBool,
    error: Mutex<Option<BenchError>>,
}

impl RunState {
    fn aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Keep the first failure and stop admitting work
    fn fail(&self, err: BenchError) {
        let mut slot = self.error.lock();
        if slot.is_none() {
            warn!("Aborting workload: {}", err);
            *slot = Some(err);
        }
        self.aborted.store(true, Ordering::Release);
    }
}

impl<'a, E: Engine> WriterPool<'a, E> {
    pub fn new(engine: &'a E, config: &'a StoreConfig) -> Self {
        Self {
            engine,
            config,
            pragmas: &[],
        }
    }

    /// Extra pragmas for every writer session, applied after the configured ones
    pub fn with_pragmas(mut self, pragmas: &'a [Pragma]) -> Self {
        self.pragmas = pragmas;
        self
    }

    /// Write records `{key: i, value: value_of(i)}` for `i` in `0..tasks`
    ///
    /// Returns after every task has finished. The first engine failure
    /// stops the run: queued tasks are skipped and the error is returned
    /// once all writers have exited. Records that fail validation are
    /// counted as rejected and do not stop the run.
    pub fn run<F>(&self, tasks: usize, value_of: F) -> Result<WorkloadReport>
    where
        F: Fn(i64) -> String + Sync,
    {
        let max_writers = self.config.max_writers.max(1);
        let started_at = Utc::now();
        let start = Instant::now();
        let state = RunState::default();

        if tasks > 0 {
            let workers = max_writers.min(tasks);
            let (tx, rx) = bounded::<i64>(max_writers);
            debug!(
                "Starting {} writers for {} tasks on {}",
                workers,
                tasks,
                self.engine.name()
            );

            thread::scope(|scope| {
                let handles: Vec<_> = (0..workers)
                    .map(|id| {
                        let rx = rx.clone();
                        let state = &state;
                        let value_of = &value_of;
                        thread::Builder::new()
                            .name(format!("writer-{}", id))
                            .spawn_scoped(scope, move || self.worker(rx, state, value_of))
                    })
                    .collect();
                drop(rx);

                for key in 0..tasks {
                    if state.aborted() {
                        break;
                    }
                    // Fails only once every writer has exited
                    if tx.send(key as i64).is_err() {
                        break;
                    }
                }
                drop(tx);

                for handle in handles {
                    match handle {
                        Ok(handle) => {
                            if handle.join().is_err() {
                                state.fail(BenchError::WorkerPanicked(
                                    "writer thread panicked".to_string(),
                                ));
                            }
                        }
                        Err(e) => state.fail(BenchError::Io(e)),
                    }
                }
            });
        }

        if let Some(err) = state.error.into_inner() {
            return Err(err);
        }

        Ok(WorkloadReport {
            mode: None,
            max_writers,
            requested: tasks,
            written: state.written.into_inner(),
            rejected: state.rejected.into_inner(),
            retries: state.retries.into_inner(),
            peak_in_flight: state.in_flight.peak(),
            started_at,
            elapsed: start.elapsed(),
        })
    }

    fn worker<F>(&self, rx: Receiver<i64>, state: &RunState, value_of: &F)
    where
        F: Fn(i64) -> String + Sync,
    {
        let mut session = match self.open_session() {
            Ok(session) => session,
            Err(e) => {
                state.fail(e);
                return;
            }
        };

        for key in rx.iter() {
            // Drain without writing once the run is aborted
            if state.aborted() {
                continue;
            }

            let record = Record::new(key, value_of(key));
            let _guard = state.in_flight.enter();
            match write_record(&mut session, &record, &self.config.retry) {
                Ok(retries) => {
                    state.written.fetch_add(1, Ordering::Relaxed);
                    state.retries.fetch_add(u64::from(retries), Ordering::Relaxed);
                }
                Err(e) if e.is_validation() => {
                    debug!("Rejected record: {}", e);
                    state.rejected.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => state.fail(e),
            }
        }

        if let Err(e) = session.close() {
            state.fail(e);
        }
    }

    fn open_session(&self) -> Result<E::Session> {
        let mut session = self.engine.connect()?;
        for pragma in self.config.pragmas.iter().chain(self.pragmas) {
            // Persistent in the file and owned by the mode controller
            if pragma.is_journal_mode() {
                continue;
            }
            session.set_pragma(pragma)?;
        }
        Ok(session)
    }
}
