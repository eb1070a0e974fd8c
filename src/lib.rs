//! Benchmark snapshot storage with regression detection and trend analysis.
//!
//! perfsnap persists benchmark runs as versioned JSON snapshots, compares a
//! current run against a baseline to classify throughput changes, and fits
//! per-benchmark trends across stored history.
//!
//! # Features
//!
//! - **Snapshot Store**: one JSON document per snapshot, ids are never reused
//!   or overwritten, corrupt records are skipped when listing
//! - **Comparison**: threshold-based regression/improvement classification
//!   with severity tiers and an aggregate score
//! - **Trends**: least-squares fit of ops/sec over time, direction,
//!   significance heuristic and 7/30-day predictions
//! - **Summary**: health score and ordered recommendations
//! - **Parallel Fitting**: trends for independent benchmarks are fitted on a
//!   bounded worker pool with cooperative cancellation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use perfsnap::{
//!     AnalysisOptions, BenchmarkResult, CancellationToken, SnapshotAnalyzer, SnapshotMetadata,
//!     SnapshotStore,
//! };
//!
//! let store = SnapshotStore::open(".perfsnap/snapshots");
//! let current = store.create(
//!     vec![BenchmarkResult::new("encode", 1_250.0)],
//!     SnapshotMetadata::new().version("0.4.0"),
//! )?;
//! let analysis = SnapshotAnalyzer::new(&store).analyze_against_latest(
//!     &current,
//!     &AnalysisOptions::default(),
//!     &CancellationToken::new(),
//! )?;
//! if analysis.has_critical_regression() {
//!     std::process::exit(1);
//! }
//! # Ok::<(), perfsnap::PerfSnapError>(())
//! ```

pub mod analysis;
pub mod benchmark;
pub mod cancel;
pub mod compare;
pub mod config;
pub mod environment;
pub mod errors;
pub mod snapshot;
pub mod store;
pub mod summary;
pub mod trend;

pub use analysis::{SnapshotAnalysis, SnapshotAnalyzer, analyze_snapshots};
pub use benchmark::BenchmarkResult;
pub use cancel::{Cancellable, CancellationToken};
pub use compare::{
    Comparison, ComparisonConfidence, ComparisonEngine, Impact, PerformanceImprovement,
    PerformanceRegression, Severity,
};
pub use config::{AnalysisOptions, RetryPolicy, StoreConfig};
pub use environment::{Environment, EnvironmentProbe, FixedProbe, HostProbe};
pub use errors::{PerfSnapError, Result};
pub use snapshot::{PerformanceSnapshot, SnapshotMetadata};
pub use store::{SkippedRecord, SnapshotListing, SnapshotStore};
pub use summary::{SnapshotSummary, SummaryBuilder};
pub use trend::{
    LinearRegression, PerformanceTrend, TrendAnalyzer, TrendDataPoint, TrendDirection,
    TrendPrediction,
};
