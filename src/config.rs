//! Configuration for snapshot storage and analysis.
//!
//! All structures carry defaults matching the documented behaviour and can be
//! deserialised from JSON with missing fields falling back to those defaults.

use std::{env, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::errors::{PerfSnapError, Result};

/// Environment variable overriding the snapshot directory.
pub const SNAPSHOT_DIR_ENV: &str = "PERFSNAP_DIR";

/// Directory used when neither a path nor [`SNAPSHOT_DIR_ENV`] is given.
pub const DEFAULT_SNAPSHOT_DIR: &str = ".perfsnap/snapshots";

/// Options controlling a single snapshot analysis.
///
/// # Default Configuration
///
/// ```rust
/// use perfsnap::AnalysisOptions;
/// let options = AnalysisOptions::default();
/// assert_eq!(options.regression_threshold_percent, 10.0);
/// assert_eq!(options.trend_window_days, 30);
/// assert!(options.include_trends);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisOptions {
    /// Percent change in ops/sec beyond which a benchmark counts as a
    /// regression (negative) or improvement (positive).
    ///
    /// **Default:** `10.0`
    pub regression_threshold_percent: f64,

    /// Fit trends over stored history in addition to the pairwise comparison.
    ///
    /// **Default:** `true`
    pub include_trends: bool,

    /// Width of the history window in days, ending at the current snapshot.
    ///
    /// **Default:** `30`
    pub trend_window_days: u32,

    /// Confidence level copied onto each trend. Advisory only; it does not
    /// change the significance decision.
    ///
    /// **Default:** `0.95`
    pub confidence_level: f64,

    /// Attach 7-day/30-day predictions to each trend.
    ///
    /// **Default:** `true`
    pub generate_predictions: bool,

    /// Minimum absolute slope (ops/sec per day) for a trend to be significant.
    ///
    /// **Default:** `1.0`
    pub slope_significance: f64,

    /// Upper bound on worker threads used for trend fitting.
    ///
    /// **Default:** available parallelism
    pub max_workers: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            regression_threshold_percent: 10.0,
            include_trends: true,
            trend_window_days: 30,
            confidence_level: 0.95,
            generate_predictions: true,
            slope_significance: 1.0,
            max_workers: default_workers(),
        }
    }
}

impl AnalysisOptions {
    /// Options with trend analysis disabled.
    pub fn comparison_only() -> Self {
        Self {
            include_trends: false,
            ..Self::default()
        }
    }

    pub fn with_threshold(mut self, percent: f64) -> Self {
        self.regression_threshold_percent = percent;
        self
    }

    pub fn with_window_days(mut self, days: u32) -> Self {
        self.trend_window_days = days;
        self
    }

    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers;
        self
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(data)
            .map_err(|e| PerfSnapError::invalid_input(format!("analysis options: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.regression_threshold_percent;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(PerfSnapError::invalid_input(format!(
                "regression threshold must be positive, got {threshold}"
            )));
        }
        if self.trend_window_days == 0 {
            return Err(PerfSnapError::invalid_input("trend window must be at least one day"));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(PerfSnapError::invalid_input(format!(
                "confidence level must lie in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if !self.slope_significance.is_finite() || self.slope_significance < 0.0 {
            return Err(PerfSnapError::invalid_input(format!(
                "slope significance must be non-negative, got {}",
                self.slope_significance
            )));
        }
        if self.max_workers == 0 {
            return Err(PerfSnapError::invalid_input("max_workers must be at least 1"));
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Retry behaviour for transient storage failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before attempt `n` is `n * backoff_ms`.
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 25,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Location and I/O behaviour of a [`SnapshotStore`](crate::SnapshotStore).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    pub dir: PathBuf,
    pub retry: RetryPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            retry: RetryPolicy::default(),
        }
    }
}

impl StoreConfig {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Reads the directory from [`SNAPSHOT_DIR_ENV`], falling back to
    /// [`DEFAULT_SNAPSHOT_DIR`].
    pub fn from_env() -> Self {
        match env::var(SNAPSHOT_DIR_ENV) {
            Ok(dir) if !dir.trim().is_empty() => Self::new(dir),
            _ => Self::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
