//! Event model: the six event kinds the engine emits, plus the batching
//! and counting types shared by the generator and the store.
//!
//! Wire shape notes:
//! - All event structs serialize with camelCase field names, matching the
//!   JSON the HTTP surface emits.
//! - [`LineAttribution`] carries the tab/composer/non-AI split of a code
//!   change. `tab + composer + non_ai == total` always holds; the split
//!   constructor guarantees it by deriving the remainder instead of
//!   drawing it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Line attribution
// ============================================================================

/// Per-change attribution of added lines to AI surfaces.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LineAttribution {
    #[serde(rename = "totalLinesAdded")]
    pub total: u64,
    #[serde(rename = "tabLinesAdded")]
    pub tab: u64,
    #[serde(rename = "composerLinesAdded")]
    pub composer: u64,
    #[serde(rename = "nonAiLinesAdded")]
    pub non_ai: u64,
}

impl LineAttribution {
    /// Split `total` lines into tab / composer / non-AI buckets.
    ///
    /// `ai_share` is the fraction attributed to AI overall, `tab_share`
    /// the fraction of those AI lines attributed to tab completion. Both
    /// are clamped to [0, 1], so the partition always sums to `total`.
    pub fn split(total: u64, ai_share: f64, tab_share: f64) -> Self {
        let ai_share = ai_share.clamp(0.0, 1.0);
        let tab_share = tab_share.clamp(0.0, 1.0);
        let ai = (total as f64 * ai_share).round() as u64;
        let ai = ai.min(total);
        let tab = ((ai as f64 * tab_share).round() as u64).min(ai);
        LineAttribution {
            total,
            tab,
            composer: ai - tab,
            non_ai: total - ai,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.tab + self.composer + self.non_ai == self.total
    }

    /// Fraction of lines attributed to AI surfaces. Zero-line changes
    /// count as zero.
    pub fn ai_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.tab + self.composer) as f64 / self.total as f64
    }
}

// ============================================================================
// Event kinds
// ============================================================================

/// A code change landing on a branch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommitEvent {
    pub commit_hash: String,
    pub user_id: String,
    pub user_email: String,
    pub repo_name: String,
    pub branch_name: String,
    pub is_primary_branch: bool,
    #[serde(flatten)]
    pub lines: LineAttribution,
    pub lines_deleted: u64,
    pub touches_new_file: bool,
    pub message: String,
    pub commit_ts: DateTime<Utc>,
}

/// Lifecycle state of a pull request.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Merged,
    Closed,
}

/// A pull request and its quality outcomes.
///
/// Quality fields (`reverted`, `hotfix_followup`, `surviving_lines_30d`)
/// are decided at generation time from the seed's correlation knobs, not
/// tracked as later events.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestEvent {
    pub id: String,
    pub number: u32,
    pub repo_name: String,
    pub author_id: String,
    pub author_email: String,
    pub title: String,
    pub state: PrState,
    pub additions: u64,
    pub deletions: u64,
    /// Review rounds before resolution; 1 means approved first pass.
    pub review_iterations: u32,
    pub reverted: bool,
    pub hotfix_followup: bool,
    /// Of `additions`, how many lines still exist 30 days later.
    pub surviving_lines_30d: u64,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl PullRequestEvent {
    /// Open-to-merge duration in fractional days, when merged.
    pub fn cycle_time_days(&self) -> Option<f64> {
        self.merged_at
            .map(|m| (m - self.created_at).num_seconds() as f64 / 86_400.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approved,
    ChangesRequested,
    Commented,
}

/// A single review submitted on a pull request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEvent {
    pub id: String,
    pub pr_id: String,
    pub repo_name: String,
    pub reviewer_id: String,
    pub reviewer_email: String,
    pub verdict: ReviewVerdict,
    pub comment_count: u32,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

/// A tracker issue, typically filed against a merged PR's repository.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IssueEvent {
    pub id: String,
    pub number: u32,
    pub repo_name: String,
    pub author_id: String,
    pub title: String,
    pub state: IssueState,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// One model invocation with token usage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsageEvent {
    pub id: String,
    pub user_id: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub timestamp: DateTime<Utc>,
}

/// A burst of invocations of one editor feature.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureUsageEvent {
    pub id: String,
    pub user_id: String,
    pub feature: String,
    pub invocations: u32,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Shared indexing surface
// ============================================================================

/// Uniform access the store's indexes need from every event kind.
pub trait TimeIndexed {
    fn event_id(&self) -> &str;
    fn developer_id(&self) -> &str;
    /// Owning repository, when the kind has one.
    fn repository(&self) -> Option<&str>;
    fn timestamp(&self) -> DateTime<Utc>;
}

impl TimeIndexed for CommitEvent {
    fn event_id(&self) -> &str {
        &self.commit_hash
    }
    fn developer_id(&self) -> &str {
        &self.user_id
    }
    fn repository(&self) -> Option<&str> {
        Some(&self.repo_name)
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.commit_ts
    }
}

impl TimeIndexed for PullRequestEvent {
    fn event_id(&self) -> &str {
        &self.id
    }
    fn developer_id(&self) -> &str {
        &self.author_id
    }
    fn repository(&self) -> Option<&str> {
        Some(&self.repo_name)
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl TimeIndexed for ReviewEvent {
    fn event_id(&self) -> &str {
        &self.id
    }
    fn developer_id(&self) -> &str {
        &self.reviewer_id
    }
    fn repository(&self) -> Option<&str> {
        Some(&self.repo_name)
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

impl TimeIndexed for IssueEvent {
    fn event_id(&self) -> &str {
        &self.id
    }
    fn developer_id(&self) -> &str {
        &self.author_id
    }
    fn repository(&self) -> Option<&str> {
        Some(&self.repo_name)
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl TimeIndexed for ModelUsageEvent {
    fn event_id(&self) -> &str {
        &self.id
    }
    fn developer_id(&self) -> &str {
        &self.user_id
    }
    fn repository(&self) -> Option<&str> {
        None
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl TimeIndexed for FeatureUsageEvent {
    fn event_id(&self) -> &str {
        &self.id
    }
    fn developer_id(&self) -> &str {
        &self.user_id
    }
    fn repository(&self) -> Option<&str> {
        None
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

// ============================================================================
// Ranges, batches, counts
// ============================================================================

/// Inclusive time range for queries.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        TimeRange { from, to }
    }

    /// The unbounded range. Useful for "everything" queries.
    pub fn all() -> Self {
        TimeRange {
            from: DateTime::<Utc>::MIN_UTC,
            to: DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.from && ts <= self.to
    }
}

/// One generated batch: every event kind from a single generation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub commits: Vec<CommitEvent>,
    pub pull_requests: Vec<PullRequestEvent>,
    pub reviews: Vec<ReviewEvent>,
    pub issues: Vec<IssueEvent>,
    pub model_usage: Vec<ModelUsageEvent>,
    pub feature_usage: Vec<FeatureUsageEvent>,
}

impl Dataset {
    /// Sort every kind by (timestamp, id). Generation emits per-developer
    /// runs, so a final sort puts each log in insertion-friendly order.
    pub fn sort_by_time(&mut self) {
        fn sort<T: TimeIndexed>(events: &mut [T]) {
            events.sort_by(|a, b| {
                a.timestamp()
                    .cmp(&b.timestamp())
                    .then_with(|| a.event_id().cmp(b.event_id()))
            });
        }
        sort(&mut self.commits);
        sort(&mut self.pull_requests);
        sort(&mut self.reviews);
        sort(&mut self.issues);
        sort(&mut self.model_usage);
        sort(&mut self.feature_usage);
    }

    pub fn counts(&self) -> EventCounts {
        EventCounts {
            commits: self.commits.len() as u64,
            pull_requests: self.pull_requests.len() as u64,
            reviews: self.reviews.len() as u64,
            issues: self.issues.len() as u64,
            model_usage: self.model_usage.len() as u64,
            feature_usage: self.feature_usage.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }
}

/// Per-kind event tallies.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventCounts {
    pub commits: u64,
    pub pull_requests: u64,
    pub reviews: u64,
    pub issues: u64,
    pub model_usage: u64,
    pub feature_usage: u64,
}

impl EventCounts {
    pub fn total(&self) -> u64 {
        self.commits
            + self.pull_requests
            + self.reviews
            + self.issues
            + self.model_usage
            + self.feature_usage
    }

    /// Per-kind difference, clamped at zero.
    pub fn saturating_sub(&self, other: &EventCounts) -> EventCounts {
        EventCounts {
            commits: self.commits.saturating_sub(other.commits),
            pull_requests: self.pull_requests.saturating_sub(other.pull_requests),
            reviews: self.reviews.saturating_sub(other.reviews),
            issues: self.issues.saturating_sub(other.issues),
            model_usage: self.model_usage.saturating_sub(other.model_usage),
            feature_usage: self.feature_usage.saturating_sub(other.feature_usage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, h, 0, 0).unwrap()
    }

    #[test]
    fn test_attribution_split_sums_to_total() {
        for total in [0u64, 1, 7, 100, 12345] {
            for ai in [0.0, 0.3, 0.72, 1.0] {
                for tab in [0.0, 0.6, 1.0] {
                    let attr = LineAttribution::split(total, ai, tab);
                    assert!(attr.is_consistent(), "split({total}, {ai}, {tab})");
                    assert!(attr.tab + attr.composer <= total);
                }
            }
        }
    }

    #[test]
    fn test_attribution_split_clamps_shares() {
        let attr = LineAttribution::split(100, 1.7, -0.2);
        assert!(attr.is_consistent());
        assert_eq!(attr.non_ai, 0);
        assert_eq!(attr.tab, 0);
        assert_eq!(attr.composer, 100);
    }

    #[test]
    fn test_ai_ratio_on_zero_lines() {
        let attr = LineAttribution::split(0, 0.9, 0.5);
        assert_eq!(attr.ai_ratio(), 0.0);
    }

    #[test]
    fn test_commit_serializes_camel_case_with_flattened_attribution() {
        let commit = CommitEvent {
            commit_hash: "a1b2c3d4e5f6".to_string(),
            user_id: "user_0001".to_string(),
            user_email: "mika.tanaka@acme.dev".to_string(),
            repo_name: "acme/gateway".to_string(),
            branch_name: "main".to_string(),
            is_primary_branch: true,
            lines: LineAttribution::split(80, 0.5, 0.75),
            lines_deleted: 12,
            touches_new_file: false,
            message: "Fix retry edge case in ingest".to_string(),
            commit_ts: ts(9),
        };
        let json = serde_json::to_value(&commit).unwrap();
        assert_eq!(json["commitHash"], "a1b2c3d4e5f6");
        assert_eq!(json["totalLinesAdded"], 80);
        assert_eq!(json["tabLinesAdded"], 30);
        assert_eq!(json["composerLinesAdded"], 10);
        assert_eq!(json["nonAiLinesAdded"], 40);
        assert_eq!(json["isPrimaryBranch"], true);

        let back: CommitEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, commit);
    }

    #[test]
    fn test_cycle_time_days() {
        let pr = PullRequestEvent {
            id: "PR-7".to_string(),
            number: 7,
            repo_name: "acme/gateway".to_string(),
            author_id: "user_0001".to_string(),
            author_email: "mika.tanaka@acme.dev".to_string(),
            title: "retry: ingest improvements".to_string(),
            state: PrState::Merged,
            additions: 120,
            deletions: 30,
            review_iterations: 2,
            reverted: false,
            hotfix_followup: false,
            surviving_lines_30d: 100,
            created_at: ts(8),
            merged_at: Some(ts(20)),
            closed_at: None,
        };
        assert_eq!(pr.cycle_time_days(), Some(0.5));

        let open = PullRequestEvent {
            state: PrState::Open,
            merged_at: None,
            ..pr
        };
        assert_eq!(open.cycle_time_days(), None);
    }

    #[test]
    fn test_dataset_sort_orders_by_time_then_id() {
        let mk = |id: &str, h: u32| ModelUsageEvent {
            id: id.to_string(),
            user_id: "user_0001".to_string(),
            model: "auto".to_string(),
            input_tokens: 100,
            output_tokens: 40,
            timestamp: ts(h),
        };
        let mut ds = Dataset {
            model_usage: vec![mk("b", 9), mk("a", 9), mk("c", 7)],
            ..Dataset::default()
        };
        ds.sort_by_time();
        let ids: Vec<&str> = ds.model_usage.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_time_range_is_inclusive() {
        let range = TimeRange::new(ts(8), ts(10));
        assert!(range.contains(ts(8)));
        assert!(range.contains(ts(10)));
        assert!(!range.contains(ts(11)));
        assert!(TimeRange::all().contains(ts(0)));
    }

    #[test]
    fn test_counts_saturating_sub() {
        let a = EventCounts {
            commits: 5,
            pull_requests: 1,
            ..EventCounts::default()
        };
        let b = EventCounts {
            commits: 2,
            pull_requests: 3,
            ..EventCounts::default()
        };
        let diff = a.saturating_sub(&b);
        assert_eq!(diff.commits, 3);
        assert_eq!(diff.pull_requests, 0);
        assert_eq!(a.total(), 6);
    }
}
