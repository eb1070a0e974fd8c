use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{PerfSnapError, Result};

/// One benchmark measurement as produced by the external harness.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    pub name: String,
    pub ops_per_sec: f64,
    #[serde(default)]
    pub ns_per_op: u64,
    #[serde(default)]
    pub allocs_per_op: u64,
    #[serde(default)]
    pub alloc_bytes_per_op: u64,
    #[serde(default)]
    pub operations: u64,
    #[serde(default)]
    pub memory_before: u64,
    #[serde(default)]
    pub memory_after: u64,
    #[serde(default, with = "duration_nanos")]
    pub duration: Duration,
}

impl BenchmarkResult {
    /// Minimal result carrying only a name and a throughput figure.
    pub fn new<T: Into<String>>(name: T, ops_per_sec: f64) -> Self {
        let ns_per_op = if ops_per_sec > 0.0 {
            (1_000_000_000.0 / ops_per_sec).round() as u64
        } else {
            0
        };
        Self {
            name: name.into(),
            ops_per_sec,
            ns_per_op,
            allocs_per_op: 0,
            alloc_bytes_per_op: 0,
            operations: 0,
            memory_before: 0,
            memory_after: 0,
            duration: Duration::ZERO,
        }
    }

    pub fn with_memory(mut self, before: u64, after: u64) -> Self {
        self.memory_before = before;
        self.memory_after = after;
        self
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {:.2} ops/s {}ns/op {} allocs/op",
            self.name, self.ops_per_sec, self.ns_per_op, self.allocs_per_op
        )
    }

    /// Bytes retained across the run; a shrinking heap counts as zero.
    pub fn memory_delta(&self) -> u64 {
        self.memory_after.saturating_sub(self.memory_before)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PerfSnapError::invalid_input("benchmark name must not be empty"));
        }
        if !self.ops_per_sec.is_finite() || self.ops_per_sec < 0.0 {
            return Err(PerfSnapError::invalid_input(format!(
                "benchmark {} has invalid ops_per_sec {}",
                self.name, self.ops_per_sec
            )));
        }
        Ok(())
    }
}

/// `Duration` stored as integer nanoseconds.
pub(crate) mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(value.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}
