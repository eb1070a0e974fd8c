use serde::{Deserialize, Serialize};

use crate::{
    compare::{Comparison, PerformanceRegression, Severity},
    trend::{PerformanceTrend, TrendDirection},
};

pub const STABLE_RECOMMENDATION: &str = "Performance appears stable - continue monitoring";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub overall_health_score: f64,
    pub trending_up: usize,
    pub trending_down: usize,
    pub stable_trends: usize,
    pub critical_issues: usize,
    pub regressions: usize,
    pub improvements: usize,
    pub recommended_actions: Vec<String>,
}

/// Health score in `[0, 100]`: 100 minus 5 per regression, 20 per critical
/// regression and 10 per degrading trend.
pub fn health_score(regressions: usize, critical: usize, degrading: usize) -> f64 {
    let penalty = regressions as f64 * 5.0 + critical as f64 * 20.0 + degrading as f64 * 10.0;
    (100.0 - penalty).clamp(0.0, 100.0)
}

/// Folds comparison and trend results into one [`SnapshotSummary`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SummaryBuilder<'a> {
    regressions: &'a [PerformanceRegression],
    improvements: usize,
    trends: &'a [PerformanceTrend],
}

impl<'a> SummaryBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_comparison(comparison: &'a Comparison) -> Self {
        Self {
            regressions: &comparison.regressions,
            improvements: comparison.improvements.len(),
            trends: &[],
        }
    }

    pub fn regressions(mut self, regressions: &'a [PerformanceRegression]) -> Self {
        self.regressions = regressions;
        self
    }

    pub fn improvements(mut self, count: usize) -> Self {
        self.improvements = count;
        self
    }

    pub fn trends(mut self, trends: &'a [PerformanceTrend]) -> Self {
        self.trends = trends;
        self
    }

    pub fn build(&self) -> SnapshotSummary {
        let mut summary = SnapshotSummary {
            regressions: self.regressions.len(),
            improvements: self.improvements,
            ..SnapshotSummary::default()
        };
        for trend in self.trends {
            match trend.direction {
                TrendDirection::Improving => summary.trending_up += 1,
                TrendDirection::Degrading => summary.trending_down += 1,
                TrendDirection::Stable => summary.stable_trends += 1,
            }
        }
        summary.critical_issues = self
            .regressions
            .iter()
            .filter(|r| r.severity == Severity::Critical)
            .count();
        summary.overall_health_score = health_score(
            summary.regressions,
            summary.critical_issues,
            summary.trending_down,
        );
        summary.recommended_actions = self.recommendations(&summary);
        summary
    }

    fn recommendations(&self, summary: &SnapshotSummary) -> Vec<String> {
        let mut actions = Vec::new();
        if summary.critical_issues > 0 {
            push_unique(
                &mut actions,
                format!(
                    "Address {} critical performance regressions immediately",
                    summary.critical_issues
                ),
            );
        }
        let other_regressions = summary.regressions - summary.critical_issues;
        if other_regressions > 0 {
            push_unique(
                &mut actions,
                format!("Investigate {other_regressions} performance regressions"),
            );
        }
        if summary.trending_down > 0 {
            push_unique(
                &mut actions,
                format!(
                    "Investigate {} degrading performance trends",
                    summary.trending_down
                ),
            );
            let mut degrading: Vec<&PerformanceTrend> = self
                .trends
                .iter()
                .filter(|t| t.direction == TrendDirection::Degrading)
                .collect();
            degrading.sort_by(|a, b| a.benchmark_name.cmp(&b.benchmark_name));
            for trend in degrading {
                push_unique(&mut actions, trend.recommendation.clone());
            }
        }
        if summary.improvements > 0 {
            push_unique(
                &mut actions,
                format!(
                    "Document and preserve {} performance improvements",
                    summary.improvements
                ),
            );
        }
        if actions.is_empty() {
            actions.push(STABLE_RECOMMENDATION.to_string());
        }
        actions
    }
}

fn push_unique(actions: &mut Vec<String>, action: String) {
    if !actions.contains(&action) {
        actions.push(action);
    }
}
