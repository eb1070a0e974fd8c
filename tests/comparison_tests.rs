use perfsnap::{
    BenchmarkResult, ComparisonConfidence, ComparisonEngine, Environment, Impact, Severity,
};
use proptest::prelude::*;


use snapshot_common::snapshot_on;

fn engine() -> ComparisonEngine {
    ComparisonEngine::new(10.0).unwrap()
}

#[test]
fn test_improvement_scenario() {
    let baseline = snapshot_on("base", 0, &[("BenchmarkX", 100.0)]);
    let current = snapshot_on("cur", 1, &[("BenchmarkX", 150.0)]);
    let comparison = engine().compare(&current, &baseline);
    assert!(comparison.regressions.is_empty());
    assert_eq!(comparison.improvements.len(), 1);
    let improvement = &comparison.improvements[0];
    assert_eq!(improvement.benchmark_name, "BenchmarkX");
    assert_eq!(improvement.improvement_percent, 50.0);
    assert_eq!(improvement.impact, Impact::Major);
    assert_eq!(comparison.performance_score, 100.0);
}

#[test]
fn test_regression_scenario() {
    let baseline = snapshot_on("base", 0, &[("BenchmarkX", 100.0)]);
    let current = snapshot_on("cur", 1, &[("BenchmarkX", 80.0)]);
    let comparison = engine().compare(&current, &baseline);
    assert!(comparison.improvements.is_empty());
    assert_eq!(comparison.regressions.len(), 1);
    let regression = &comparison.regressions[0];
    assert!((regression.regression_percent - 20.0).abs() < 1e-9);
    assert_eq!(regression.severity, Severity::High);
    assert_eq!(regression.impact, Impact::Moderate);
    assert_eq!(comparison.performance_score, 80.0);
    assert_eq!(comparison.time_difference_seconds, 86_400);
}

#[test]
fn test_severity_tiers_at_threshold_multiples() {
    let baseline = snapshot_on(
        "base",
        0,
        &[("t1", 100.0), ("t2", 100.0), ("t3", 100.0), ("below", 100.0)],
    );
    let current = snapshot_on(
        "cur",
        1,
        &[("t1", 90.0), ("t2", 80.0), ("t3", 70.0), ("below", 91.0)],
    );
    let comparison = engine().compare(&current, &baseline);
    let severity_of = |name: &str| {
        comparison
            .regressions
            .iter()
            .find(|r| r.benchmark_name == name)
            .map(|r| r.severity)
    };
    assert_eq!(severity_of("t1"), Some(Severity::Medium));
    assert_eq!(severity_of("t2"), Some(Severity::High));
    assert_eq!(severity_of("t3"), Some(Severity::Critical));
    assert_eq!(severity_of("below"), None);
    assert_eq!(comparison.unchanged_benchmarks, vec!["below"]);
    assert!(comparison.has_critical_regression());
}

#[test]
fn test_zero_baseline_excluded() {
    let baseline = snapshot_on("base", 0, &[("idle", 0.0), ("busy", 100.0)]);
    let current = snapshot_on("cur", 1, &[("idle", 500.0), ("busy", 100.0)]);
    let comparison = engine().compare(&current, &baseline);
    assert!(comparison.regressions.is_empty());
    assert!(comparison.improvements.is_empty());
    assert_eq!(comparison.skipped_zero_baseline, vec!["idle"]);
    assert_eq!(comparison.unchanged_benchmarks, vec!["busy"]);
    assert_eq!(comparison.overall_change_percent, 0.0);
}

#[test]
fn test_new_and_removed_benchmarks_sorted() {
    let baseline = snapshot_on("base", 0, &[("keep", 1.0), ("gone_b", 1.0), ("gone_a", 1.0)]);
    let current = snapshot_on("cur", 1, &[("new_z", 1.0), ("keep", 1.0), ("new_a", 1.0)]);
    let comparison = engine().compare(&current, &baseline);
    assert_eq!(comparison.new_benchmarks, vec!["new_a", "new_z"]);
    assert_eq!(comparison.removed_benchmarks, vec!["gone_a", "gone_b"]);
    assert_eq!(comparison.benchmark_count, 3);
    assert_eq!(comparison.baseline_benchmarks, 3);
}

#[test]
fn test_environment_change_reduces_confidence() {
    let baseline = snapshot_on("base", 0, &[("x", 100.0)]);
    let mut current = snapshot_on("cur", 1, &[("x", 100.0)]);
    assert_eq!(
        engine().compare(&current, &baseline).confidence,
        ComparisonConfidence::Normal
    );
    current.environment = Environment::new("linux/x86_64", "rust-1.85", 32);
    let comparison = engine().compare(&current, &baseline);
    assert!(comparison.environment_changed);
    assert_eq!(comparison.confidence, ComparisonConfidence::Reduced);
    assert_eq!(comparison.unchanged_benchmarks, vec!["x"]);
}

#[test]
fn test_compare_is_idempotent_and_order_independent() {
    let baseline = snapshot_on("base", 0, &[("a", 100.0), ("b", 200.0), ("c", 300.0)]);
    let current = snapshot_on("cur", 1, &[("a", 60.0), ("b", 260.0), ("c", 290.0)]);
    let first = engine().compare(&current, &baseline);
    let second = engine().compare(&current, &baseline);
    assert_eq!(first, second);

    let mut shuffled = current.clone();
    shuffled.benchmarks.reverse();
    let mut shuffled_base = baseline.clone();
    shuffled_base.benchmarks.rotate_left(1);
    assert_eq!(engine().compare(&shuffled, &shuffled_base), first);
}

#[test]
fn test_score_penalties_and_capped_bonus() {
    let names: Vec<String> = (0..8).map(|i| format!("b{i}")).collect();
    let baseline_pairs: Vec<(&str, f64)> = names.iter().map(|n| (n.as_str(), 100.0)).collect();
    // one critical, one medium, six improvements
    let current_ops = [50.0, 88.0, 130.0, 130.0, 130.0, 130.0, 130.0, 130.0];
    let current_pairs: Vec<(&str, f64)> = names
        .iter()
        .zip(current_ops)
        .map(|(n, ops)| (n.as_str(), ops))
        .collect();
    let comparison = engine().compare(
        &snapshot_on("cur", 1, &current_pairs),
        &snapshot_on("base", 0, &baseline_pairs),
    );
    assert_eq!(comparison.regressions.len(), 2);
    assert_eq!(comparison.improvements.len(), 6);
    assert_eq!(comparison.performance_score, 100.0 - 30.0 - 10.0 + 20.0);
}

#[test]
fn test_empty_current_scores_zero() {
    let baseline = snapshot_on("base", 0, &[("x", 1.0)]);
    let current = snapshot_on("cur", 1, &[]);
    let comparison = engine().compare(&current, &baseline);
    assert_eq!(comparison.performance_score, 0.0);
    assert_eq!(comparison.removed_benchmarks, vec!["x"]);
}

#[test]
fn test_comparison_serializes_lowercase_tiers() {
    let baseline = snapshot_on("base", 0, &[("x", 100.0)]);
    let current = snapshot_on("cur", 1, &[("x", 10.0)]);
    let json = serde_json::to_value(engine().compare(&current, &baseline)).unwrap();
    assert_eq!(json["regressions"][0]["severity"], "critical");
    assert_eq!(json["regressions"][0]["impact"], "major");
    assert_eq!(json["confidence"], "normal");
}

proptest! {
    #[test]
    fn prop_severity_monotonic(a in 0.0f64..500.0, b in 0.0f64..500.0, threshold in 0.5f64..50.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(Severity::for_regression(lo, threshold) <= Severity::for_regression(hi, threshold));
    }

    #[test]
    fn prop_score_within_bounds(ops in proptest::collection::vec(0.0f64..1_000.0, 1..20)) {
        let baseline: Vec<BenchmarkResult> = ops
            .iter()
            .enumerate()
            .map(|(i, _)| BenchmarkResult::new(format!("b{i}"), 100.0))
            .collect();
        let current: Vec<BenchmarkResult> = ops
            .iter()
            .enumerate()
            .map(|(i, v)| BenchmarkResult::new(format!("b{i}"), *v))
            .collect();
        let mut base = snapshot_on("base", 0, &[]);
        base.benchmarks = baseline;
        let mut cur = snapshot_on("cur", 1, &[]);
        cur.benchmarks = current;
        let comparison = engine().compare(&cur, &base);
        prop_assert!((0.0..=100.0).contains(&comparison.performance_score));
    }
}
