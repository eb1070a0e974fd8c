//! End-to-end snapshot analysis: compare, fit trends, summarise.
//!
//! Every entry point either returns a fully populated [`SnapshotAnalysis`] or
//! an error; a cancelled run never yields partial results. Store reads are
//! blocking and belong on a worker thread, not on an event loop.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    cancel::Cancellable,
    compare::{Comparison, ComparisonEngine, PerformanceImprovement, PerformanceRegression},
    config::AnalysisOptions,
    errors::{PerfSnapError, Result},
    snapshot::PerformanceSnapshot,
    store::SnapshotStore,
    summary::{SnapshotSummary, SummaryBuilder},
    trend::{MIN_TREND_POINTS, PerformanceTrend, TrendAnalyzer},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotAnalysis {
    pub current: PerformanceSnapshot,
    pub baseline: PerformanceSnapshot,
    pub comparison: Comparison,
    pub trends: Vec<PerformanceTrend>,
    pub summary: SnapshotSummary,
}

impl SnapshotAnalysis {
    pub fn regressions(&self) -> &[PerformanceRegression] {
        &self.comparison.regressions
    }

    pub fn improvements(&self) -> &[PerformanceImprovement] {
        &self.comparison.improvements
    }

    /// Signal consumed by CI exit-code policies.
    pub fn has_critical_regression(&self) -> bool {
        self.summary.critical_issues > 0
    }
}

/// Analysis over an explicit history, without touching storage.
///
/// `history` should already be restricted to the trend window; it is ignored
/// when `options.include_trends` is false.
pub fn analyze_snapshots<C>(
    current: &PerformanceSnapshot,
    baseline: &PerformanceSnapshot,
    history: &[PerformanceSnapshot],
    options: &AnalysisOptions,
    cancel: &C,
) -> Result<SnapshotAnalysis>
where
    C: Cancellable + Sync + ?Sized,
{
    options.validate()?;
    cancel.check()?;

    let comparison =
        ComparisonEngine::new(options.regression_threshold_percent)?.compare(current, baseline);
    if comparison.environment_changed {
        warn!(
            current = %current.id,
            baseline = %baseline.id,
            "environment changed between snapshots, comparison confidence reduced"
        );
    }

    let trends = if options.include_trends {
        fit_trends(history, options, cancel)?
    } else {
        Vec::new()
    };
    cancel.check()?;

    let summary = SummaryBuilder::from_comparison(&comparison)
        .trends(&trends)
        .build();
    info!(
        current = %current.id,
        baseline = %baseline.id,
        regressions = comparison.regressions.len(),
        improvements = comparison.improvements.len(),
        trends = trends.len(),
        health_score = summary.overall_health_score,
        "snapshot analysis completed"
    );

    Ok(SnapshotAnalysis {
        current: current.clone(),
        baseline: baseline.clone(),
        comparison,
        trends,
        summary,
    })
}

fn fit_trends<C>(
    history: &[PerformanceSnapshot],
    options: &AnalysisOptions,
    cancel: &C,
) -> Result<Vec<PerformanceTrend>>
where
    C: Cancellable + Sync + ?Sized,
{
    if history.len() < MIN_TREND_POINTS {
        warn!(
            count = history.len(),
            "insufficient historical data for trend analysis"
        );
        return Ok(Vec::new());
    }
    TrendAnalyzer::from_options(options).analyze(history, cancel)
}

/// Runs analyses against the history held in a [`SnapshotStore`].
#[derive(Debug)]
pub struct SnapshotAnalyzer<'s> {
    store: &'s SnapshotStore,
}

impl<'s> SnapshotAnalyzer<'s> {
    pub fn new(store: &'s SnapshotStore) -> Self {
        Self { store }
    }

    /// Compares `current` with `baseline` and, when enabled, fits trends over
    /// stored snapshots within `trend_window_days` before `current`.
    pub fn analyze<C>(
        &self,
        current: &PerformanceSnapshot,
        baseline: &PerformanceSnapshot,
        options: &AnalysisOptions,
        cancel: &C,
    ) -> Result<SnapshotAnalysis>
    where
        C: Cancellable + Sync + ?Sized,
    {
        options.validate()?;
        cancel.check()?;
        let history = if options.include_trends {
            self.load_history(current, options)
        } else {
            Vec::new()
        };
        analyze_snapshots(current, baseline, &history, options, cancel)
    }

    /// Uses the newest stored snapshot other than `current` as baseline.
    pub fn analyze_against_latest<C>(
        &self,
        current: &PerformanceSnapshot,
        options: &AnalysisOptions,
        cancel: &C,
    ) -> Result<SnapshotAnalysis>
    where
        C: Cancellable + Sync + ?Sized,
    {
        cancel.check()?;
        let baseline = self
            .store
            .list()?
            .into_iter()
            .find(|s| s.id != current.id)
            .ok_or_else(|| {
                PerfSnapError::not_found("no baseline snapshot available for comparison")
            })?;
        info!(baseline = %baseline.id, timestamp = %baseline.timestamp, "using most recent snapshot as baseline");
        self.analyze(current, &baseline, options, cancel)
    }

    fn load_history(
        &self,
        current: &PerformanceSnapshot,
        options: &AnalysisOptions,
    ) -> Vec<PerformanceSnapshot> {
        match self
            .store
            .history(current.timestamp, options.trend_window_days)
        {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "failed to load historical snapshots, skipping trends");
                Vec::new()
            }
        }
    }
}
