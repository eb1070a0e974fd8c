//! Pairwise snapshot comparison.
//!
//! Benchmarks present in both snapshots are classified by their percent change
//! in ops/sec against a threshold. Pairs whose baseline throughput is zero have
//! no defined percent change and are reported separately instead.

use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    benchmark::BenchmarkResult,
    errors::{PerfSnapError, Result},
    snapshot::PerformanceSnapshot,
};

/// Regression severity, ordered from least to most severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Tier for a regression of `percent` (positive magnitude) under
    /// `threshold`. Checked most severe first.
    pub fn for_regression(percent: f64, threshold: f64) -> Self {
        let percent = percent.abs();
        if percent >= threshold * 3.0 {
            Severity::Critical
        } else if percent >= threshold * 2.0 {
            Severity::High
        } else if percent >= threshold {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Score deduction applied per regression of this tier.
    pub fn penalty(self) -> f64 {
        match self {
            Severity::Critical => 30.0,
            Severity::High => 20.0,
            Severity::Medium => 10.0,
            Severity::Low => 5.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Minimal,
    Moderate,
    Significant,
    Major,
}

impl Impact {
    pub fn for_change(percent: f64) -> Self {
        let percent = percent.abs();
        if percent < 10.0 {
            Impact::Minimal
        } else if percent < 25.0 {
            Impact::Moderate
        } else if percent < 50.0 {
            Impact::Significant
        } else {
            Impact::Major
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Impact::Minimal => "minimal",
            Impact::Moderate => "moderate",
            Impact::Significant => "significant",
            Impact::Major => "major",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one benchmark present in both snapshots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChangeClass {
    Regression(Severity),
    Improvement,
    Unchanged,
}

/// Classifies a percent change. A change whose magnitude reaches the
/// threshold is classified; anything strictly inside it is unchanged.
pub fn classify_change(percent: f64, threshold: f64) -> ChangeClass {
    if percent <= -threshold {
        ChangeClass::Regression(Severity::for_regression(percent, threshold))
    } else if percent >= threshold {
        ChangeClass::Improvement
    } else {
        ChangeClass::Unchanged
    }
}

/// Percent change from `baseline_ops` to `current_ops`; `None` when the
/// baseline is zero.
pub fn percent_change(current_ops: f64, baseline_ops: f64) -> Option<f64> {
    if baseline_ops == 0.0 {
        return None;
    }
    Some((current_ops - baseline_ops) / baseline_ops * 100.0)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRegression {
    pub benchmark_name: String,
    pub current_ops_per_sec: f64,
    pub baseline_ops_per_sec: f64,
    pub regression_percent: f64,
    pub severity: Severity,
    pub impact: Impact,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceImprovement {
    pub benchmark_name: String,
    pub current_ops_per_sec: f64,
    pub baseline_ops_per_sec: f64,
    pub improvement_percent: f64,
    pub impact: Impact,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonConfidence {
    Normal,
    /// Snapshots were taken on different host classes.
    Reduced,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub current_id: String,
    pub baseline_id: String,
    /// Current minus baseline timestamp, in seconds.
    pub time_difference_seconds: i64,
    pub environment_changed: bool,
    pub confidence: ComparisonConfidence,
    pub benchmark_count: usize,
    pub baseline_benchmarks: usize,
    pub new_benchmarks: Vec<String>,
    pub removed_benchmarks: Vec<String>,
    pub unchanged_benchmarks: Vec<String>,
    pub skipped_zero_baseline: Vec<String>,
    pub overall_change_percent: f64,
    pub performance_score: f64,
    pub threshold_percent: f64,
    pub regressions: Vec<PerformanceRegression>,
    pub improvements: Vec<PerformanceImprovement>,
}

impl Comparison {
    pub fn critical_regressions(&self) -> usize {
        self.regressions
            .iter()
            .filter(|r| r.severity == Severity::Critical)
            .count()
    }

    pub fn has_critical_regression(&self) -> bool {
        self.critical_regressions() > 0
    }
}

/// Classifies throughput changes between two snapshots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ComparisonEngine {
    threshold: f64,
}

impl ComparisonEngine {
    pub fn new(threshold_percent: f64) -> Result<Self> {
        if !threshold_percent.is_finite() || threshold_percent <= 0.0 {
            return Err(PerfSnapError::invalid_input(format!(
                "regression threshold must be positive, got {threshold_percent}"
            )));
        }
        Ok(Self {
            threshold: threshold_percent,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn compare(
        &self,
        current: &PerformanceSnapshot,
        baseline: &PerformanceSnapshot,
    ) -> Comparison {
        let current_map = current.benchmark_map();
        let baseline_map = baseline.benchmark_map();

        let mut new_benchmarks = names_missing_from(&current_map, &baseline_map);
        let mut removed_benchmarks = names_missing_from(&baseline_map, &current_map);
        new_benchmarks.sort();
        removed_benchmarks.sort();

        let mut shared: Vec<(&str, &BenchmarkResult, &BenchmarkResult)> = current_map
            .iter()
            .filter_map(|(name, cur)| baseline_map.get(name).map(|base| (*name, *cur, *base)))
            .collect();
        shared.sort_by(|a, b| a.0.cmp(b.0));

        let mut regressions = Vec::new();
        let mut improvements = Vec::new();
        let mut unchanged_benchmarks = Vec::new();
        let mut skipped_zero_baseline = Vec::new();
        let mut total_change = 0.0;
        let mut change_count = 0usize;

        for (name, cur, base) in shared {
            let Some(change) = percent_change(cur.ops_per_sec, base.ops_per_sec) else {
                skipped_zero_baseline.push(name.to_string());
                continue;
            };
            total_change += change;
            change_count += 1;
            match classify_change(change, self.threshold) {
                ChangeClass::Regression(severity) => regressions.push(PerformanceRegression {
                    benchmark_name: name.to_string(),
                    current_ops_per_sec: cur.ops_per_sec,
                    baseline_ops_per_sec: base.ops_per_sec,
                    regression_percent: -change,
                    severity,
                    impact: Impact::for_change(change),
                }),
                ChangeClass::Improvement => improvements.push(PerformanceImprovement {
                    benchmark_name: name.to_string(),
                    current_ops_per_sec: cur.ops_per_sec,
                    baseline_ops_per_sec: base.ops_per_sec,
                    improvement_percent: change,
                    impact: Impact::for_change(change),
                }),
                ChangeClass::Unchanged => unchanged_benchmarks.push(name.to_string()),
            }
        }

        let overall_change_percent = if change_count > 0 {
            total_change / change_count as f64
        } else {
            0.0
        };
        let environment_changed = !current.environment.same_host_class(&baseline.environment);
        let performance_score =
            comparison_score(&regressions, improvements.len(), current.benchmarks.len());

        Comparison {
            current_id: current.id.clone(),
            baseline_id: baseline.id.clone(),
            time_difference_seconds: (current.timestamp - baseline.timestamp).num_seconds(),
            environment_changed,
            confidence: if environment_changed {
                ComparisonConfidence::Reduced
            } else {
                ComparisonConfidence::Normal
            },
            benchmark_count: current.benchmarks.len(),
            baseline_benchmarks: baseline.benchmarks.len(),
            new_benchmarks,
            removed_benchmarks,
            unchanged_benchmarks,
            skipped_zero_baseline,
            overall_change_percent,
            performance_score,
            threshold_percent: self.threshold,
            regressions,
            improvements,
        }
    }
}

/// Starts at 100, deducts per regression by tier and adds up to 20 points for
/// improvements. Zero when the current snapshot has no benchmarks.
pub fn comparison_score(
    regressions: &[PerformanceRegression],
    improvements: usize,
    total_benchmarks: usize,
) -> f64 {
    if total_benchmarks == 0 {
        return 0.0;
    }
    let penalty: f64 = regressions.iter().map(|r| r.severity.penalty()).sum();
    let bonus = (improvements as f64 * 5.0).min(20.0);
    (100.0 - penalty + bonus).clamp(0.0, 100.0)
}

fn names_missing_from(
    from: &AHashMap<&str, &BenchmarkResult>,
    other: &AHashMap<&str, &BenchmarkResult>,
) -> Vec<String> {
    from.keys()
        .filter(|name| !other.contains_key(*name))
        .map(|name| name.to_string())
        .collect()
}
