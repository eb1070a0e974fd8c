//! Time-series trend fitting across historical snapshots.
//!
//! For every benchmark name with at least [`MIN_TREND_POINTS`] observations an
//! ordinary least-squares line is fitted to ops/sec against elapsed days since
//! the earliest observation. Direction is decided by a heuristic: the fit must
//! explain more than half of the variance (`R² > 0.5`) and the slope must
//! exceed a configured magnitude. The reported p-value is a real two-sided
//! t-test on the slope and is informational only.
//!
//! Names are fitted independently on a bounded rayon pool; every worker returns
//! its trend by value and the results are joined once.

use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::{debug, warn};

use crate::{
    cancel::Cancellable,
    config::AnalysisOptions,
    errors::{PerfSnapError, Result},
    snapshot::PerformanceSnapshot,
};

/// Fewest observations a trend is fitted from.
pub const MIN_TREND_POINTS: usize = 3;

const R_SQUARED_SIGNIFICANCE: f64 = 0.5;
const RAPID_DEGRADATION_SLOPE: f64 = -10.0;
const MILD_DECLINE_SLOPE: f64 = -1.0;
const STRONG_IMPROVEMENT_SLOPE: f64 = 10.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendDataPoint {
    pub timestamp: DateTime<Utc>,
    pub ops_per_sec: f64,
    pub memory_usage: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearRegression {
    /// ops/sec per day.
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// Two-sided p-value of the slope under Student's t with n-2 degrees of
    /// freedom. Does not feed `is_significant`.
    pub p_value: f64,
    /// Heuristic: `R² > 0.5` and `|slope|` above the configured minimum.
    pub is_significant: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Degrading,
    Stable,
}

impl TrendDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Degrading => "degrading",
            TrendDirection::Stable => "stable",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPrediction {
    /// Absent when the latest observation is not positive.
    pub next_week_change_percent: Option<f64>,
    pub next_month_change_percent: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceTrend {
    pub benchmark_name: String,
    pub data_points: Vec<TrendDataPoint>,
    pub direction: TrendDirection,
    pub regression: LinearRegression,
    pub confidence_level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<TrendPrediction>,
    pub recommendation: String,
}

/// Ordinary least squares over `(x, y)` pairs.
pub fn fit_linear_regression(points: &[(f64, f64)], slope_significance: f64) -> LinearRegression {
    let n = points.len();
    if n == 0 {
        return LinearRegression {
            slope: 0.0,
            intercept: 0.0,
            r_squared: 0.0,
            p_value: 1.0,
            is_significant: false,
        };
    }
    let nf = n as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / nf;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut ss_tot = 0.0;
    let mut sum_sq_x = 0.0;
    for (x, y) in points {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        ss_tot += dy * dy;
        sum_sq_x += x * x;
    }

    // All observations at one instant: no time axis to regress on. The cutoff
    // scales with the magnitude of x.
    if sxx <= f64::EPSILON * sum_sq_x {
        return LinearRegression {
            slope: 0.0,
            intercept: mean_y,
            r_squared: 0.0,
            p_value: 1.0,
            is_significant: false,
        };
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let ss_res: f64 = points
        .iter()
        .map(|(x, y)| {
            let residual = y - (slope * x + intercept);
            residual * residual
        })
        .sum();
    let r_squared = if ss_tot > 0.0 {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let p_value = slope_p_value(slope, ss_res, sxx, n);
    let is_significant = r_squared > R_SQUARED_SIGNIFICANCE && slope.abs() > slope_significance;

    LinearRegression {
        slope,
        intercept,
        r_squared,
        p_value,
        is_significant,
    }
}

fn slope_p_value(slope: f64, ss_res: f64, sxx: f64, n: usize) -> f64 {
    if n < 3 {
        return 1.0;
    }
    let dof = (n - 2) as f64;
    let std_err = (ss_res / dof / sxx).sqrt();
    if std_err == 0.0 || !std_err.is_finite() {
        return if slope == 0.0 { 1.0 } else { 0.0 };
    }
    let t = (slope / std_err).abs();
    match StudentsT::new(0.0, 1.0, dof) {
        Ok(dist) => (2.0 * (1.0 - dist.cdf(t))).clamp(0.0, 1.0),
        Err(_) => 1.0,
    }
}

/// Observations of `name` across `snapshots`, oldest first.
pub fn extract_data_points(name: &str, snapshots: &[PerformanceSnapshot]) -> Vec<TrendDataPoint> {
    let mut points: Vec<TrendDataPoint> = snapshots
        .iter()
        .filter_map(|snapshot| {
            snapshot.benchmark(name).map(|bench| TrendDataPoint {
                timestamp: snapshot.timestamp,
                ops_per_sec: bench.ops_per_sec,
                memory_usage: bench.memory_delta(),
                git_commit: snapshot.git_commit.clone(),
            })
        })
        .collect();
    points.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    points
}

pub fn direction_for(regression: &LinearRegression) -> TrendDirection {
    if !regression.is_significant {
        TrendDirection::Stable
    } else if regression.slope > 0.0 {
        TrendDirection::Improving
    } else if regression.slope < 0.0 {
        TrendDirection::Degrading
    } else {
        TrendDirection::Stable
    }
}

pub fn recommendation_for(regression: &LinearRegression) -> &'static str {
    if !regression.is_significant {
        "Continue monitoring - trend not statistically significant"
    } else if regression.slope < RAPID_DEGRADATION_SLOPE {
        "Immediate investigation required - performance degrading rapidly"
    } else if regression.slope < MILD_DECLINE_SLOPE {
        "Monitor closely - performance showing downward trend"
    } else if regression.slope > STRONG_IMPROVEMENT_SLOPE {
        "Document optimization - performance improving significantly"
    } else {
        "Continue current practices - performance trend is stable"
    }
}

/// Extrapolated 7- and 30-day change relative to the latest observation.
/// Non-significant fits predict no change.
pub fn predict(regression: &LinearRegression, points: &[TrendDataPoint]) -> TrendPrediction {
    if !regression.is_significant {
        return TrendPrediction {
            next_week_change_percent: Some(0.0),
            next_month_change_percent: Some(0.0),
        };
    }
    let latest = points.last().map(|p| p.ops_per_sec).unwrap_or(0.0);
    if latest <= 0.0 {
        return TrendPrediction {
            next_week_change_percent: None,
            next_month_change_percent: None,
        };
    }
    TrendPrediction {
        next_week_change_percent: Some(regression.slope * 7.0 / latest * 100.0),
        next_month_change_percent: Some(regression.slope * 30.0 / latest * 100.0),
    }
}

/// Fits per-benchmark trends over a window of snapshots.
#[derive(Clone, Debug, PartialEq)]
pub struct TrendAnalyzer {
    slope_significance: f64,
    confidence_level: f64,
    generate_predictions: bool,
    max_workers: usize,
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::from_options(&AnalysisOptions::default())
    }
}

impl TrendAnalyzer {
    pub fn from_options(options: &AnalysisOptions) -> Self {
        Self {
            slope_significance: options.slope_significance,
            confidence_level: options.confidence_level,
            generate_predictions: options.generate_predictions,
            max_workers: options.max_workers.max(1),
        }
    }

    /// Trend for one benchmark, or `InsufficientData` when it appears in fewer
    /// than [`MIN_TREND_POINTS`] snapshots.
    pub fn analyze_benchmark(
        &self,
        name: &str,
        snapshots: &[PerformanceSnapshot],
    ) -> Result<PerformanceTrend> {
        let data_points = extract_data_points(name, snapshots);
        if data_points.len() < MIN_TREND_POINTS {
            return Err(PerfSnapError::insufficient_data(format!(
                "{name}: {} of {MIN_TREND_POINTS} data points",
                data_points.len()
            )));
        }

        let origin = data_points[0].timestamp;
        let xy: Vec<(f64, f64)> = data_points
            .iter()
            .map(|p| {
                let days = (p.timestamp - origin).num_milliseconds() as f64 / MILLIS_PER_DAY;
                (days, p.ops_per_sec)
            })
            .collect();
        let regression = fit_linear_regression(&xy, self.slope_significance);
        let prediction = self
            .generate_predictions
            .then(|| predict(&regression, &data_points));

        Ok(PerformanceTrend {
            benchmark_name: name.to_string(),
            direction: direction_for(&regression),
            recommendation: recommendation_for(&regression).to_string(),
            regression,
            confidence_level: self.confidence_level,
            prediction,
            data_points,
        })
    }

    /// Trends for every benchmark name in `history`, sorted by name. Names with
    /// too few observations are omitted. Cancellation discards all partial
    /// results.
    pub fn analyze<C>(
        &self,
        history: &[PerformanceSnapshot],
        cancel: &C,
    ) -> Result<Vec<PerformanceTrend>>
    where
        C: Cancellable + Sync + ?Sized,
    {
        cancel.check()?;
        let names: Vec<&str> = history
            .iter()
            .flat_map(|s| s.benchmark_names())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let fit = |name: &&str| -> Result<Option<PerformanceTrend>> {
            cancel.check()?;
            match self.analyze_benchmark(name, history) {
                Ok(trend) => Ok(Some(trend)),
                Err(PerfSnapError::InsufficientData(reason)) => {
                    debug!(benchmark = %name, %reason, "trend omitted");
                    Ok(None)
                }
                Err(e) => Err(e),
            }
        };

        let workers = self.max_workers.min(names.len());
        let fitted: Vec<Option<PerformanceTrend>> = match rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("perfsnap-trend-{i}"))
            .build()
        {
            Ok(pool) => pool.install(|| names.par_iter().map(fit).collect::<Result<Vec<_>>>())?,
            Err(e) => {
                warn!(error = %e, "trend worker pool unavailable, fitting on caller thread");
                names.iter().map(fit).collect::<Result<Vec<_>>>()?
            }
        };

        cancel.check()?;
        Ok(fitted.into_iter().flatten().collect())
    }
}
