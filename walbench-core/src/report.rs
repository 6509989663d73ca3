//! Workload results

use crate::{DurabilityMode, Result};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Outcome of one workload run
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadReport {
    /// Journal mode in effect when the run started
    pub mode: Option<DurabilityMode>,
    pub max_writers: usize,
    /// Tasks launched
    pub requested: usize,
    /// Records committed
    pub written: usize,
    /// Records that failed validation
    pub rejected: usize,
    /// Busy retries across all records
    pub retries: u64,
    /// Most write transactions observed in flight at once
    pub peak_in_flight: usize,
    pub started_at: DateTime<Utc>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl WorkloadReport {
    pub fn with_mode(mut self, mode: DurabilityMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Committed records per second
    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.written as f64 / secs
    }

    /// Wall-clock time per committed record, in microseconds
    pub fn mean_write_us(&self) -> f64 {
        if self.written == 0 {
            return 0.0;
        }
        self.elapsed.as_secs_f64() * 1_000_000.0 / self.written as f64
    }

    /// JSON object with the derived rates included
    pub fn to_json(&self) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Some(object) = value.as_object_mut() {
            object.insert("ops_per_sec".to_string(), self.ops_per_sec().into());
            object.insert("mean_write_us".to_string(), self.mean_write_us().into());
        }
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

impl fmt::Display for WorkloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = self.mode.map(|m| m.pragma_value()).unwrap_or("?");
        write!(
            f,
            "{} mode: {}/{} written by {} writers in {:.2?}",
            mode, self.written, self.requested, self.max_writers, self.elapsed
        )?;
        write!(
            f,
            " ({:.0} ops/s, {:.1}us/op, {} retries, peak {} in flight",
            self.ops_per_sec(),
            self.mean_write_us(),
            self.retries,
            self.peak_in_flight
        )?;
        if self.rejected > 0 {
            write!(f, ", {} rejected", self.rejected)?;
        }
        write!(f, ")")
    }
}

fn serialize_millis<S: Serializer>(
    elapsed: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64() * 1_000.0)
}
