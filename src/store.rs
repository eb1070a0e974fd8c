//! Durable, file-per-snapshot storage.
//!
//! Each snapshot lives in `<dir>/<id>.json`. Writes go to a hidden temporary
//! file first and are linked into place, so an existing id is never
//! overwritten and a reader never observes a half-written document.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    thread,
};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::{
    benchmark::BenchmarkResult,
    config::{RetryPolicy, StoreConfig},
    environment::{EnvironmentProbe, HostProbe},
    errors::{PerfSnapError, Result},
    snapshot::{PerformanceSnapshot, SnapshotMetadata, validate_benchmarks, validate_id},
};

/// Attempts at finding a free id before `create` gives up.
const MAX_ID_ATTEMPTS: u32 = 8;

/// A record `list` could not return.
#[derive(Clone, Debug, PartialEq)]
pub struct SkippedRecord {
    pub path: PathBuf,
    pub reason: PerfSnapError,
}

/// Result of a directory scan: readable snapshots, newest first, plus the
/// records that were skipped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotListing {
    pub snapshots: Vec<PerformanceSnapshot>,
    pub skipped: Vec<SkippedRecord>,
}

pub struct SnapshotStore {
    config: StoreConfig,
    probe: Box<dyn EnvironmentProbe>,
    id_guard: Mutex<()>,
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SnapshotStore {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_probe(config, HostProbe)
    }

    pub fn open<P: Into<PathBuf>>(dir: P) -> Self {
        Self::new(StoreConfig::new(dir))
    }

    pub fn from_env() -> Self {
        Self::new(StoreConfig::from_env())
    }

    pub fn with_probe<E: EnvironmentProbe + 'static>(config: StoreConfig, probe: E) -> Self {
        Self {
            config,
            probe: Box::new(probe),
            id_guard: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Persists a new snapshot of `benchmarks` stamped with the current time
    /// and the probe's environment fingerprint.
    pub fn create(
        &self,
        benchmarks: Vec<BenchmarkResult>,
        metadata: SnapshotMetadata,
    ) -> Result<PerformanceSnapshot> {
        validate_benchmarks(&benchmarks)?;
        self.ensure_dir()?;
        let environment = self.probe.fingerprint();

        let _guard = self.id_guard.lock();
        let mut snapshot = PerformanceSnapshot::new(String::new(), Utc::now(), environment, benchmarks)
            .with_metadata(metadata);
        for attempt in 1..=MAX_ID_ATTEMPTS {
            snapshot.id = generate_snapshot_id(snapshot.timestamp);
            match self.write_new(&snapshot) {
                Ok(()) => {
                    info!(
                        id = %snapshot.id,
                        benchmarks = snapshot.benchmarks.len(),
                        "created performance snapshot"
                    );
                    return Ok(snapshot);
                }
                Err(PerfSnapError::AlreadyExists(_)) => {
                    debug!(id = %snapshot.id, attempt, "snapshot id taken, regenerating");
                }
                Err(e) => return Err(e),
            }
        }
        Err(PerfSnapError::already_exists(format!(
            "no free snapshot id after {MAX_ID_ATTEMPTS} attempts"
        )))
    }

    /// Persists an externally built snapshot under its own id. Existing ids are
    /// rejected with `AlreadyExists`.
    pub fn save(&self, snapshot: &PerformanceSnapshot) -> Result<()> {
        snapshot.validate()?;
        self.ensure_dir()?;
        let _guard = self.id_guard.lock();
        self.write_new(snapshot)?;
        debug!(id = %snapshot.id, "saved performance snapshot");
        Ok(())
    }

    pub fn load(&self, id: &str) -> Result<PerformanceSnapshot> {
        validate_id(id).map_err(|_| PerfSnapError::not_found(id))?;
        let path = self.path_for(id);
        let data = with_retry(&self.config.retry, "read", || fs::read(&path)).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                PerfSnapError::not_found(id)
            } else {
                PerfSnapError::storage(format!("{}: {e}", path.display()))
            }
        })?;
        let snapshot = decode(&path, &data)?;
        if snapshot.id != id {
            return Err(PerfSnapError::parse(format!(
                "{}: document id {} does not match file name",
                path.display(),
                snapshot.id
            )));
        }
        Ok(snapshot)
    }

    /// All readable snapshots, newest first. Unreadable or corrupt records are
    /// logged and skipped.
    pub fn list(&self) -> Result<Vec<PerformanceSnapshot>> {
        Ok(self.list_with_report()?.snapshots)
    }

    pub fn list_with_report(&self) -> Result<SnapshotListing> {
        let mut listing = SnapshotListing::default();
        let entries = match fs::read_dir(self.dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(listing),
            Err(e) => {
                return Err(PerfSnapError::storage(format!(
                    "{}: {e}",
                    self.dir().display()
                )));
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && is_snapshot_file(&path) {
                        paths.push(path);
                    }
                }
                Err(e) => warn!(dir = %self.dir().display(), error = %e, "failed to read directory entry"),
            }
        }
        paths.sort();

        for path in paths {
            match self.read_record(&path) {
                Ok(snapshot) => listing.snapshots.push(snapshot),
                Err(reason) => {
                    warn!(file = %path.display(), error = %reason, "skipping snapshot record");
                    listing.skipped.push(SkippedRecord { path, reason });
                }
            }
        }

        listing.snapshots.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(listing)
    }

    /// Most recent snapshot in the store.
    pub fn latest(&self) -> Result<PerformanceSnapshot> {
        self.list()?
            .into_iter()
            .next()
            .ok_or_else(|| PerfSnapError::not_found(format!("no snapshots in {}", self.dir().display())))
    }

    /// Snapshots with `until - window_days < timestamp <= until`, oldest first.
    /// A window reaching past the representable range has no lower bound.
    pub fn history(&self, until: DateTime<Utc>, window_days: u32) -> Result<Vec<PerformanceSnapshot>> {
        let cutoff = window_cutoff(until, window_days);
        let mut snapshots: Vec<_> = self
            .list()?
            .into_iter()
            .filter(|s| s.timestamp > cutoff && s.timestamp <= until)
            .collect();
        snapshots.reverse();
        Ok(snapshots)
    }

    fn read_record(&self, path: &Path) -> Result<PerformanceSnapshot> {
        let data = with_retry(&self.config.retry, "read", || fs::read(path))
            .map_err(|e| PerfSnapError::storage(format!("{}: {e}", path.display())))?;
        decode(path, &data)
    }

    fn ensure_dir(&self) -> Result<()> {
        with_retry(&self.config.retry, "create_dir", || fs::create_dir_all(self.dir()))
            .map_err(|e| PerfSnapError::storage(format!("{}: {e}", self.dir().display())))
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir().join(format!("{id}.json"))
    }

    fn write_new(&self, snapshot: &PerformanceSnapshot) -> Result<()> {
        let target = self.path_for(&snapshot.id);
        if target.exists() {
            return Err(PerfSnapError::already_exists(snapshot.id.clone()));
        }
        let data = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| PerfSnapError::invalid_input(e.to_string()))?;

        let suffix: u32 = rand::thread_rng().gen_range(0..u32::MAX);
        let tmp = self.dir().join(format!(".{}.json.tmp-{suffix:08x}", snapshot.id));
        let written = with_retry(&self.config.retry, "write", || write_file(&tmp, &data))
            .and_then(|()| with_retry(&self.config.retry, "link", || fs::hard_link(&tmp, &target)));
        let _ = fs::remove_file(&tmp);
        written.map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                PerfSnapError::already_exists(snapshot.id.clone())
            } else {
                PerfSnapError::storage(format!("{}: {e}", target.display()))
            }
        })
    }
}

fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

fn decode(path: &Path, data: &[u8]) -> Result<PerformanceSnapshot> {
    let snapshot: PerformanceSnapshot = serde_json::from_slice(data)
        .map_err(|e| PerfSnapError::parse(format!("{}: {e}", path.display())))?;
    snapshot
        .validate()
        .map_err(|e| PerfSnapError::parse(format!("{}: {e}", path.display())))?;
    Ok(snapshot)
}

fn is_snapshot_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_none_or(|n| n.starts_with('.'));
    !hidden && path.extension().is_some_and(|ext| ext == "json")
}

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Runs `op`, retrying transient failures per `policy`. Anything else,
/// `NotFound` included, is returned immediately.
fn with_retry<T, F>(policy: &RetryPolicy, label: &str, mut op: F) -> io::Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && is_transient(&e) => {
                warn!(op = label, attempt, error = %e, "transient storage failure, retrying");
                thread::sleep(policy.delay_for(attempt));
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn window_cutoff(until: DateTime<Utc>, window_days: u32) -> DateTime<Utc> {
    ChronoDuration::try_days(i64::from(window_days))
        .and_then(|window| until.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// `snapshot-<UTC time to the nanosecond>-<random suffix>`.
fn generate_snapshot_id(timestamp: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..=u16::MAX);
    format!(
        "snapshot-{}-{suffix:04x}",
        timestamp.format("%Y%m%dT%H%M%S%.9fZ")
    )
}
