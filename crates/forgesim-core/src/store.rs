//! In-memory event store.
//!
//! Layout:
//! - one `RwLock` over the whole store state, so a snapshot-style read
//!   never observes a half-applied batch,
//! - per event kind, an [`EventLog`] holding a time-sorted `Vec<Arc<T>>`
//!   plus id, developer, and repository indexes sharing the same `Arc`s.
//!
//! Range queries binary-search the time-sorted log with `partition_point`,
//! then copy out the matching window. Secondary-index hits are filtered by
//! timestamp after lookup.
//!
//! The primary log and the id index must stay in lockstep; a mismatch is a
//! programming error and panics rather than returning corrupt results.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::{
    CommitEvent, Dataset, EventCounts, FeatureUsageEvent, IssueEvent, ModelUsageEvent,
    PullRequestEvent, ReviewEvent, TimeIndexed, TimeRange,
};
use crate::seed::DeveloperProfile;

// ============================================================================
// EventLog: one kind, three indexes
// ============================================================================

#[derive(Debug)]
struct EventLog<T: TimeIndexed> {
    /// Primary log, sorted by (timestamp, id).
    events: Vec<Arc<T>>,
    by_id: HashMap<String, Arc<T>>,
    by_developer: HashMap<String, Vec<Arc<T>>>,
    by_repository: HashMap<String, Vec<Arc<T>>>,
}

impl<T: TimeIndexed> Default for EventLog<T> {
    fn default() -> Self {
        EventLog {
            events: Vec::new(),
            by_id: HashMap::new(),
            by_developer: HashMap::new(),
            by_repository: HashMap::new(),
        }
    }
}

impl<T: TimeIndexed> EventLog<T> {
    /// Insert a batch. The batch is assumed sorted by (timestamp, id);
    /// when it starts at or after the current tail the log extends in
    /// place, otherwise the merged log is re-sorted.
    fn insert(&mut self, batch: Vec<T>) {
        if batch.is_empty() {
            return;
        }
        let needs_sort = match (self.events.last(), batch.first()) {
            (Some(last), Some(first)) => first.timestamp() < last.timestamp(),
            _ => false,
        };

        for event in batch {
            let event = Arc::new(event);
            let prev = self.by_id.insert(event.event_id().to_string(), event.clone());
            assert!(
                prev.is_none(),
                "duplicate event id inserted: {}",
                event.event_id()
            );
            self.by_developer
                .entry(event.developer_id().to_string())
                .or_default()
                .push(event.clone());
            if let Some(repo) = event.repository() {
                self.by_repository
                    .entry(repo.to_string())
                    .or_default()
                    .push(event.clone());
            }
            self.events.push(event);
        }

        if needs_sort {
            let sort_key = |e: &Arc<T>| (e.timestamp(), e.event_id().to_string());
            self.events.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
            for bucket in self.by_developer.values_mut() {
                bucket.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
            }
            for bucket in self.by_repository.values_mut() {
                bucket.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
            }
        }

        self.check_consistency();
    }

    fn clear(&mut self) {
        self.events.clear();
        self.by_id.clear();
        self.by_developer.clear();
        self.by_repository.clear();
    }

    fn check_consistency(&self) {
        assert_eq!(
            self.events.len(),
            self.by_id.len(),
            "event log and id index out of sync"
        );
    }

    fn by_id(&self, id: &str) -> Option<T>
    where
        T: Clone,
    {
        self.by_id.get(id).map(|e| (**e).clone())
    }

    /// Events within `range`, in time order.
    fn in_range(&self, range: TimeRange) -> Vec<T>
    where
        T: Clone,
    {
        let lo = self.events.partition_point(|e| e.timestamp() < range.from);
        let hi = self.events.partition_point(|e| e.timestamp() <= range.to);
        self.events[lo..hi].iter().map(|e| (**e).clone()).collect()
    }

    fn by_developer(&self, developer: &str, range: TimeRange) -> Vec<T>
    where
        T: Clone,
    {
        Self::filter_bucket(self.by_developer.get(developer), range)
    }

    fn by_repository(&self, repo: &str, range: TimeRange) -> Vec<T>
    where
        T: Clone,
    {
        Self::filter_bucket(self.by_repository.get(repo), range)
    }

    /// Buckets stay (timestamp, id)-sorted: `insert` re-sorts them on an
    /// out-of-order batch, so the same bisection as `in_range` applies.
    fn filter_bucket(bucket: Option<&Vec<Arc<T>>>, range: TimeRange) -> Vec<T>
    where
        T: Clone,
    {
        let Some(events) = bucket else {
            return Vec::new();
        };
        let lo = events.partition_point(|e| e.timestamp() < range.from);
        let hi = events.partition_point(|e| e.timestamp() <= range.to);
        events[lo..hi].iter().map(|e| (**e).clone()).collect()
    }

    fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.events.last().map(|e| e.timestamp())
    }

    fn len(&self) -> u64 {
        self.events.len() as u64
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Debug, Default)]
struct StoreInner {
    developers: HashMap<String, DeveloperProfile>,
    commits: EventLog<CommitEvent>,
    pull_requests: EventLog<PullRequestEvent>,
    reviews: EventLog<ReviewEvent>,
    issues: EventLog<IssueEvent>,
    model_usage: EventLog<ModelUsageEvent>,
    feature_usage: EventLog<FeatureUsageEvent>,
}

impl StoreInner {
    fn insert_dataset(&mut self, dataset: Dataset) {
        self.commits.insert(dataset.commits);
        self.pull_requests.insert(dataset.pull_requests);
        self.reviews.insert(dataset.reviews);
        self.issues.insert(dataset.issues);
        self.model_usage.insert(dataset.model_usage);
        self.feature_usage.insert(dataset.feature_usage);
    }

    fn clear(&mut self) {
        self.developers.clear();
        self.commits.clear();
        self.pull_requests.clear();
        self.reviews.clear();
        self.issues.clear();
        self.model_usage.clear();
        self.feature_usage.clear();
    }

    fn load_developers(&mut self, developers: Vec<DeveloperProfile>) {
        for dev in developers {
            self.developers.insert(dev.id.clone(), dev);
        }
    }

    fn counts(&self) -> EventCounts {
        EventCounts {
            commits: self.commits.len(),
            pull_requests: self.pull_requests.len(),
            reviews: self.reviews.len(),
            issues: self.issues.len(),
            model_usage: self.model_usage.len(),
            feature_usage: self.feature_usage.len(),
        }
    }
}

/// Current store occupancy.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub developers: u64,
    pub events: EventCounts,
}

/// Thread-safe in-memory event store.
///
/// Lock poisoning means a writer panicked mid-mutation; the store may be
/// inconsistent, so every accessor propagates the panic instead of
/// limping on.
#[derive(Debug, Default)]
pub struct EventStore {
    inner: RwLock<StoreInner>,
}

impl EventStore {
    pub fn new() -> Self {
        EventStore::default()
    }

    /// Insert a generated batch, keeping existing contents. One write
    /// guard covers the whole batch.
    pub fn insert(&self, dataset: Dataset) {
        let mut inner = self.write();
        inner.insert_dataset(dataset);
    }

    /// Register or overwrite developer profiles without touching events.
    pub fn load_developers(&self, developers: Vec<DeveloperProfile>) {
        let mut inner = self.write();
        inner.load_developers(developers);
    }

    /// Append a batch plus its (possibly replicated) roster under one
    /// write guard.
    pub fn append(&self, developers: Vec<DeveloperProfile>, dataset: Dataset) {
        let mut inner = self.write();
        inner.load_developers(developers);
        inner.insert_dataset(dataset);
    }

    /// Atomically replace the whole store contents. Readers observe
    /// either the old state or the fully inserted new one, never the
    /// cleared intermediate.
    pub fn replace(&self, developers: Vec<DeveloperProfile>, dataset: Dataset) {
        let mut inner = self.write();
        inner.clear();
        inner.load_developers(developers);
        inner.insert_dataset(dataset);
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn snapshot(&self) -> StorageStats {
        let inner = self.read();
        StorageStats {
            developers: inner.developers.len() as u64,
            events: inner.counts(),
        }
    }

    /// All registered developer profiles, in unspecified order.
    pub fn developers(&self) -> Vec<DeveloperProfile> {
        self.read().developers.values().cloned().collect()
    }

    pub fn developer(&self, id: &str) -> Option<DeveloperProfile> {
        self.read().developers.get(id).cloned()
    }

    /// Latest commit timestamp in the store, used as the append anchor.
    pub fn latest_commit_timestamp(&self) -> Option<DateTime<Utc>> {
        self.read().commits.latest_timestamp()
    }

    // ------------------------------------------------------------------
    // Commit queries
    // ------------------------------------------------------------------

    pub fn commit_by_hash(&self, hash: &str) -> Option<CommitEvent> {
        self.read().commits.by_id(hash)
    }

    pub fn commits_in_range(&self, range: TimeRange) -> Vec<CommitEvent> {
        self.read().commits.in_range(range)
    }

    pub fn commits_by_developer(&self, developer: &str, range: TimeRange) -> Vec<CommitEvent> {
        self.read().commits.by_developer(developer, range)
    }

    pub fn commits_by_repository(&self, repo: &str, range: TimeRange) -> Vec<CommitEvent> {
        self.read().commits.by_repository(repo, range)
    }

    // ------------------------------------------------------------------
    // Pull request, review, issue queries
    // ------------------------------------------------------------------

    pub fn pull_request_by_id(&self, id: &str) -> Option<PullRequestEvent> {
        self.read().pull_requests.by_id(id)
    }

    pub fn pull_requests_in_range(&self, range: TimeRange) -> Vec<PullRequestEvent> {
        self.read().pull_requests.in_range(range)
    }

    pub fn pull_requests_by_developer(
        &self,
        developer: &str,
        range: TimeRange,
    ) -> Vec<PullRequestEvent> {
        self.read().pull_requests.by_developer(developer, range)
    }

    pub fn pull_requests_by_repository(
        &self,
        repo: &str,
        range: TimeRange,
    ) -> Vec<PullRequestEvent> {
        self.read().pull_requests.by_repository(repo, range)
    }

    pub fn reviews_in_range(&self, range: TimeRange) -> Vec<ReviewEvent> {
        self.read().reviews.in_range(range)
    }

    pub fn reviews_by_developer(&self, developer: &str, range: TimeRange) -> Vec<ReviewEvent> {
        self.read().reviews.by_developer(developer, range)
    }

    pub fn issues_in_range(&self, range: TimeRange) -> Vec<IssueEvent> {
        self.read().issues.in_range(range)
    }

    pub fn issues_by_repository(&self, repo: &str, range: TimeRange) -> Vec<IssueEvent> {
        self.read().issues.by_repository(repo, range)
    }

    // ------------------------------------------------------------------
    // Telemetry queries
    // ------------------------------------------------------------------

    pub fn model_usage_in_range(&self, range: TimeRange) -> Vec<ModelUsageEvent> {
        self.read().model_usage.in_range(range)
    }

    pub fn model_usage_by_developer(
        &self,
        developer: &str,
        range: TimeRange,
    ) -> Vec<ModelUsageEvent> {
        self.read().model_usage.by_developer(developer, range)
    }

    pub fn feature_usage_in_range(&self, range: TimeRange) -> Vec<FeatureUsageEvent> {
        self.read().feature_usage.in_range(range)
    }

    pub fn feature_usage_by_developer(
        &self,
        developer: &str,
        range: TimeRange,
    ) -> Vec<FeatureUsageEvent> {
        self.read().feature_usage.by_developer(developer, range)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().expect("event store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().expect("event store lock poisoned")
    }
}
