//! Aggregation over stored events: developer breakdowns, quality
//! metrics, variance measures, and time series.
//!
//! Everything here operates on plain slices copied out of the store, so
//! callers hold no lock while aggregating. All ratios are 0.0 when their
//! denominator is empty rather than NaN.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::event::{CommitEvent, PrState, PullRequestEvent, ReviewEvent};
use crate::seed::DeveloperProfile;

// ============================================================================
// Developer breakdowns
// ============================================================================

/// Grouping key for developer breakdowns.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Seniority,
    Region,
    Team,
    Activity,
}

impl Dimension {
    /// The bucket label a developer falls into for this dimension.
    pub fn label(&self, dev: &DeveloperProfile) -> String {
        match self {
            Dimension::Seniority => dev.seniority.as_str().to_string(),
            Dimension::Region => dev.region.as_str().to_string(),
            Dimension::Team => dev.org_path.team.clone(),
            Dimension::Activity => {
                let m = dev.behavior.activity_multiplier;
                if m < 0.8 {
                    "low".to_string()
                } else if m <= 1.2 {
                    "normal".to_string()
                } else {
                    "high".to_string()
                }
            }
        }
    }
}

/// Developer headcount per bucket of `dim`. BTreeMap keeps the output
/// ordering stable for serialization.
pub fn developer_breakdown(devs: &[DeveloperProfile], dim: Dimension) -> BTreeMap<String, u64> {
    let mut buckets = BTreeMap::new();
    for dev in devs {
        *buckets.entry(dim.label(dev)).or_insert(0) += 1;
    }
    buckets
}

// ============================================================================
// Quality metrics
// ============================================================================

/// PR-level quality outcomes over a window.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QualityMetrics {
    /// Share of merged PRs later reverted.
    pub revert_rate: f64,
    /// Share of merged PRs needing a hotfix follow-up.
    pub hotfix_rate: f64,
    /// Line-weighted 30-day survival across merged PRs.
    pub code_survival_30d: f64,
    /// Mean review comment count scaled into [0, 1] (10+ comments = 1.0).
    pub review_thoroughness: f64,
    /// Mean review iterations per PR.
    pub avg_iterations: f64,
}

pub fn quality_metrics(prs: &[PullRequestEvent], reviews: &[ReviewEvent]) -> QualityMetrics {
    let merged: Vec<&PullRequestEvent> =
        prs.iter().filter(|p| p.state == PrState::Merged).collect();

    let (revert_rate, hotfix_rate, survival) = if merged.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let reverted = merged.iter().filter(|p| p.reverted).count() as f64;
        let hotfixed = merged.iter().filter(|p| p.hotfix_followup).count() as f64;
        let added: u64 = merged.iter().map(|p| p.additions).sum();
        let survived: u64 = merged.iter().map(|p| p.surviving_lines_30d).sum();
        let survival = if added == 0 {
            0.0
        } else {
            survived as f64 / added as f64
        };
        let n = merged.len() as f64;
        (reverted / n, hotfixed / n, survival)
    };

    let review_thoroughness = if reviews.is_empty() {
        0.0
    } else {
        let total: u32 = reviews.iter().map(|r| r.comment_count).sum();
        (total as f64 / reviews.len() as f64 / 10.0).min(1.0)
    };

    let avg_iterations = if prs.is_empty() {
        0.0
    } else {
        prs.iter().map(|p| f64::from(p.review_iterations)).sum::<f64>() / prs.len() as f64
    };

    QualityMetrics {
        revert_rate,
        hotfix_rate,
        code_survival_30d: survival,
        review_thoroughness,
        avg_iterations,
    }
}

// ============================================================================
// Variance
// ============================================================================

/// Spread measures exposed by the stats surface.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VarianceMetric {
    CommitsPerDeveloper,
    ChangeSize,
    CycleTimeDays,
}

/// Population standard deviation of the chosen metric. Empty inputs
/// yield 0.0.
pub fn variance(
    metric: VarianceMetric,
    commits: &[CommitEvent],
    prs: &[PullRequestEvent],
) -> f64 {
    let samples: Vec<f64> = match metric {
        VarianceMetric::CommitsPerDeveloper => {
            let mut per_dev: BTreeMap<&str, u64> = BTreeMap::new();
            for c in commits {
                *per_dev.entry(&c.user_id).or_insert(0) += 1;
            }
            per_dev.values().map(|n| *n as f64).collect()
        }
        VarianceMetric::ChangeSize => commits.iter().map(|c| c.lines.total as f64).collect(),
        VarianceMetric::CycleTimeDays => {
            prs.iter().filter_map(|p| p.cycle_time_days()).collect()
        }
    };
    std_dev(&samples)
}

fn std_dev(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

// ============================================================================
// Time series
// ============================================================================

/// Bucketing granularity. Weeks start on Monday.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    #[default]
    Day,
    Week,
}

impl Bucket {
    fn of(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Bucket::Day => date,
            Bucket::Week => date.week(Weekday::Mon).first_day(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeriesMetric {
    Commits,
    PullRequests,
    AvgCycleTimeDays,
}

/// One point of a bucketed series.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub bucket_start: NaiveDate,
    pub value: f64,
}

/// Bucketed series of `metric`, sorted by bucket start. Buckets with no
/// events are omitted rather than zero-filled.
pub fn time_series(
    bucket: Bucket,
    metric: SeriesMetric,
    commits: &[CommitEvent],
    prs: &[PullRequestEvent],
) -> Vec<SeriesPoint> {
    let mut points: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    match metric {
        SeriesMetric::Commits => {
            for c in commits {
                points
                    .entry(bucket.of(c.commit_ts.date_naive()))
                    .or_default()
                    .push(1.0);
            }
        }
        SeriesMetric::PullRequests => {
            for p in prs {
                points
                    .entry(bucket.of(p.created_at.date_naive()))
                    .or_default()
                    .push(1.0);
            }
        }
        SeriesMetric::AvgCycleTimeDays => {
            for p in prs {
                if let Some(days) = p.cycle_time_days() {
                    points
                        .entry(bucket.of(p.created_at.date_naive()))
                        .or_default()
                        .push(days);
                }
            }
        }
    }

    points
        .into_iter()
        .map(|(bucket_start, samples)| {
            let value = match metric {
                SeriesMetric::AvgCycleTimeDays => {
                    samples.iter().sum::<f64>() / samples.len() as f64
                }
                _ => samples.len() as f64,
            };
            SeriesPoint { bucket_start, value }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{LineAttribution, ReviewVerdict};
    use crate::seed::SeedProfile;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    fn pr(id: &str, state: PrState, additions: u64, surviving: u64) -> PullRequestEvent {
        PullRequestEvent {
            id: id.to_string(),
            number: 1,
            repo_name: "acme/gateway".to_string(),
            author_id: "user_0001".to_string(),
            author_email: "mika.tanaka@acme.dev".to_string(),
            title: "cache: ingest improvements".to_string(),
            state,
            additions,
            deletions: 10,
            review_iterations: 2,
            reverted: false,
            hotfix_followup: false,
            surviving_lines_30d: surviving,
            created_at: ts(3, 9),
            merged_at: (state == PrState::Merged).then(|| ts(4, 9)),
            closed_at: None,
        }
    }

    fn commit(user: &str, total: u64, at: DateTime<Utc>) -> CommitEvent {
        CommitEvent {
            commit_hash: format!("{user}-{total}-{at}"),
            user_id: user.to_string(),
            user_email: format!("{user}@acme.dev"),
            repo_name: "acme/gateway".to_string(),
            branch_name: "main".to_string(),
            is_primary_branch: true,
            lines: LineAttribution::split(total, 0.5, 0.7),
            lines_deleted: 3,
            touches_new_file: false,
            message: "Refactor ingest for clarity".to_string(),
            commit_ts: at,
        }
    }

    #[test]
    fn test_breakdown_by_seniority() {
        let devs = SeedProfile::demo().developers;
        let buckets = developer_breakdown(&devs, Dimension::Seniority);
        assert_eq!(buckets.get("senior"), Some(&1));
        assert_eq!(buckets.get("mid"), Some(&1));
        assert_eq!(buckets.get("junior"), Some(&1));
    }

    #[test]
    fn test_breakdown_by_activity_tiers() {
        let mut devs = SeedProfile::demo().developers;
        devs[0].behavior.activity_multiplier = 0.5; // low
        devs[1].behavior.activity_multiplier = 1.0; // normal
        devs[2].behavior.activity_multiplier = 1.6; // high
        let buckets = developer_breakdown(&devs, Dimension::Activity);
        assert_eq!(buckets.get("low"), Some(&1));
        assert_eq!(buckets.get("normal"), Some(&1));
        assert_eq!(buckets.get("high"), Some(&1));
    }

    #[test]
    fn test_quality_metrics_over_mixed_prs() {
        let mut merged = pr("PR-1", PrState::Merged, 100, 80);
        merged.reverted = true;
        let prs = vec![
            merged,
            pr("PR-2", PrState::Merged, 100, 60),
            pr("PR-3", PrState::Open, 50, 0),
        ];
        let q = quality_metrics(&prs, &[]);
        assert_eq!(q.revert_rate, 0.5);
        assert_eq!(q.hotfix_rate, 0.0);
        assert_eq!(q.code_survival_30d, 0.7);
        assert_eq!(q.avg_iterations, 2.0);
        assert_eq!(q.review_thoroughness, 0.0);
    }

    #[test]
    fn test_quality_metrics_empty_inputs_are_zero() {
        let q = quality_metrics(&[], &[]);
        assert_eq!(q, QualityMetrics::default());
    }

    #[test]
    fn test_review_thoroughness_caps_at_one() {
        let review = |comments: u32| ReviewEvent {
            id: format!("rev-{comments}"),
            pr_id: "PR-1".to_string(),
            repo_name: "acme/gateway".to_string(),
            reviewer_id: "user_0002".to_string(),
            reviewer_email: "lena.berg@acme.dev".to_string(),
            verdict: ReviewVerdict::Approved,
            comment_count: comments,
            submitted_at: ts(3, 12),
        };
        let q = quality_metrics(&[], &[review(30), review(40)]);
        assert_eq!(q.review_thoroughness, 1.0);
    }

    #[test]
    fn test_variance_commits_per_developer() {
        let commits = vec![
            commit("a", 10, ts(1, 9)),
            commit("a", 10, ts(2, 9)),
            commit("a", 10, ts(3, 9)),
            commit("b", 10, ts(1, 10)),
        ];
        // Counts are [3, 1]; population std dev is 1.
        let v = variance(VarianceMetric::CommitsPerDeveloper, &commits, &[]);
        assert!((v - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_variance_of_empty_input_is_zero() {
        assert_eq!(variance(VarianceMetric::ChangeSize, &[], &[]), 0.0);
        assert_eq!(variance(VarianceMetric::CycleTimeDays, &[], &[]), 0.0);
    }

    #[test]
    fn test_daily_commit_series() {
        let commits = vec![
            commit("a", 10, ts(3, 9)),
            commit("a", 10, ts(3, 15)),
            commit("b", 10, ts(5, 9)),
        ];
        let series = time_series(Bucket::Day, SeriesMetric::Commits, &commits, &[]);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].bucket_start, ts(3, 0).date_naive());
        assert_eq!(series[0].value, 2.0);
        assert_eq!(series[1].value, 1.0);
    }

    #[test]
    fn test_weekly_buckets_start_monday() {
        // 2025-03-05 is a Wednesday; its week starts 2025-03-03.
        let commits = vec![commit("a", 10, ts(5, 9))];
        let series = time_series(Bucket::Week, SeriesMetric::Commits, &commits, &[]);
        assert_eq!(
            series[0].bucket_start,
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
        );
    }

    #[test]
    fn test_cycle_time_series_averages() {
        let prs = vec![
            pr("PR-1", PrState::Merged, 100, 80), // 1 day cycle
            pr("PR-2", PrState::Open, 50, 0),     // excluded
        ];
        let series = time_series(Bucket::Day, SeriesMetric::AvgCycleTimeDays, &[], &prs);
        assert_eq!(series.len(), 1);
        assert!((series[0].value - 1.0).abs() < 1e-9);
    }
}
