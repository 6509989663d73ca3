//! In-flight transaction gauge

use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts running write transactions and remembers the highest count seen
#[derive(Debug, Default)]
pub struct InFlight {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one transaction as started; it ends when the guard drops
    pub fn enter(&self) -> InFlightGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard { gauge: self }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct InFlightGuard<'a> {
    gauge: &'a InFlight,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.gauge.active.fetch_sub(1, Ordering::SeqCst);
    }
}
