use ahash::{AHashMap, AHashSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    benchmark::BenchmarkResult,
    environment::Environment,
    errors::{PerfSnapError, Result},
};

/// A persisted, timestamped set of benchmark measurements.
///
/// Serialised as one JSON document per snapshot (`<id>.json`). Benchmark
/// names are unique within a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    pub environment: Environment,
    pub benchmarks: Vec<BenchmarkResult>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Caller-supplied descriptors recorded alongside a new snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotMetadata {
    pub version: Option<String>,
    pub git_commit: Option<String>,
    pub git_branch: Option<String>,
    pub extra: Map<String, Value>,
}

impl SnapshotMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version<T: Into<String>>(mut self, version: T) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn git<C: Into<String>, B: Into<String>>(mut self, commit: C, branch: B) -> Self {
        self.git_commit = Some(commit.into());
        self.git_branch = Some(branch.into());
        self
    }

    pub fn insert<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl PerformanceSnapshot {
    pub fn new<T: Into<String>>(
        id: T,
        timestamp: DateTime<Utc>,
        environment: Environment,
        benchmarks: Vec<BenchmarkResult>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            version: None,
            git_commit: None,
            git_branch: None,
            environment,
            benchmarks,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: SnapshotMetadata) -> Self {
        self.version = metadata.version;
        self.git_commit = metadata.git_commit;
        self.git_branch = metadata.git_branch;
        self.metadata = metadata.extra;
        self
    }

    pub fn benchmark(&self, name: &str) -> Option<&BenchmarkResult> {
        self.benchmarks.iter().find(|b| b.name == name)
    }

    pub fn benchmark_map(&self) -> AHashMap<&str, &BenchmarkResult> {
        self.benchmarks
            .iter()
            .map(|b| (b.name.as_str(), b))
            .collect()
    }

    pub fn benchmark_names(&self) -> impl Iterator<Item = &str> {
        self.benchmarks.iter().map(|b| b.name.as_str())
    }

    /// Checks the id and every benchmark, and that no name repeats.
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id)?;
        validate_benchmarks(&self.benchmarks)
    }
}

pub(crate) fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && !id.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(PerfSnapError::invalid_input(format!(
            "snapshot id {id:?} must be non-empty and use [A-Za-z0-9._-]"
        )))
    }
}

pub(crate) fn validate_benchmarks(benchmarks: &[BenchmarkResult]) -> Result<()> {
    let mut seen = AHashSet::with_capacity(benchmarks.len());
    for bench in benchmarks {
        bench.validate()?;
        if !seen.insert(bench.name.as_str()) {
            return Err(PerfSnapError::invalid_input(format!(
                "duplicate benchmark name {}",
                bench.name
            )));
        }
    }
    Ok(())
}
