//! HTTP control and analytics surface.
//!
//! Admin routes drive the engine, analytics routes read it back:
//! - `POST /admin/regenerate`: run a generation pass (409 while one is
//!   already in flight, 400 on out-of-range parameters)
//! - `POST /admin/seed`: validate and swap the active seed profile
//! - `GET  /admin/config`: active seed summary, limits, controller state
//! - `GET  /admin/stats`: breakdowns, quality, variance, optional series
//! - `GET  /analytics/commits`: paginated commit listing with filters
//! - `GET  /healthz`

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use forgesim_core::{
    developer_breakdown, quality_metrics, time_series, variance, Bucket, CommitEvent, Dimension,
    GenerationConfig, Mode, QualityMetrics, RegenController, RegenError, RegenReport, RegenState,
    SeedProfile, SeriesMetric, SeriesPoint, StorageStats, TimeRange, VarianceMetric, Velocity,
};

// ============================================================================
// State and router
// ============================================================================

pub struct AppState {
    seed: RwLock<Arc<SeedProfile>>,
    controller: Arc<RegenController>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(seed: SeedProfile, controller: Arc<RegenController>) -> SharedState {
        Arc::new(AppState {
            seed: RwLock::new(Arc::new(seed)),
            controller,
        })
    }

    fn seed(&self) -> Arc<SeedProfile> {
        self.seed.read().expect("seed lock poisoned").clone()
    }

    fn swap_seed(&self, seed: SeedProfile) {
        *self.seed.write().expect("seed lock poisoned") = Arc::new(seed);
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/admin/regenerate", post(regenerate))
        .route("/admin/seed", post(swap_seed))
        .route("/admin/config", get(config))
        .route("/admin/stats", get(stats))
        .route("/analytics/commits", get(commits))
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<RegenError> for ApiError {
    fn from(err: RegenError) -> Self {
        let status = match &err {
            RegenError::AlreadyRunning => StatusCode::CONFLICT,
            RegenError::ControllerFailed => StatusCode::SERVICE_UNAVAILABLE,
            RegenError::Generate(_) => StatusCode::BAD_REQUEST,
        };
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Regeneration
// ============================================================================

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RegenRequest {
    pub days: u32,
    pub velocity: Velocity,
    pub developer_count: Option<u32>,
    pub max_events: Option<u32>,
    pub mode: Mode,
    /// Fixed RNG seed for reproducible runs. Absent means a fresh random
    /// seed, reported back in the response.
    pub rng_seed: Option<u64>,
}

impl Default for RegenRequest {
    fn default() -> Self {
        RegenRequest {
            days: 30,
            velocity: Velocity::Medium,
            developer_count: None,
            max_events: None,
            mode: Mode::Override,
            rng_seed: None,
        }
    }
}

impl RegenRequest {
    fn config(&self) -> GenerationConfig {
        GenerationConfig {
            days: self.days,
            velocity: self.velocity,
            developer_count: self.developer_count,
            max_events: self.max_events,
            mode: self.mode,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RegenResponse {
    rng_seed: u64,
    #[serde(flatten)]
    report: RegenReport,
}

async fn regenerate(
    State(state): State<SharedState>,
    Json(request): Json<RegenRequest>,
) -> Result<Json<RegenResponse>, ApiError> {
    let rng_seed = request.rng_seed.unwrap_or_else(rand::random);
    let cfg = request.config();
    let seed = state.seed();
    let controller = state.controller.clone();

    // Generation is CPU-bound; keep it off the async workers.
    let report = tokio::task::spawn_blocking(move || controller.regenerate(&seed, &cfg, rng_seed))
        .await
        .map_err(|err| {
            warn!(%err, "regeneration task aborted");
            ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "regeneration task aborted".to_string(),
            }
        })??;

    Ok(Json(RegenResponse { rng_seed, report }))
}

// ============================================================================
// Seed management
// ============================================================================

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SeedSummary {
    developers: usize,
    repositories: usize,
    teams: usize,
    divisions: usize,
}

fn summarize(seed: &SeedProfile) -> SeedSummary {
    SeedSummary {
        developers: seed.developers.len(),
        repositories: seed.repositories.len(),
        teams: seed.declared_teams().len(),
        divisions: seed.declared_divisions().len(),
    }
}

async fn swap_seed(
    State(state): State<SharedState>,
    Json(seed): Json<SeedProfile>,
) -> Result<Json<SeedSummary>, ApiError> {
    seed.validate()
        .map_err(|err| ApiError::bad_request(err.to_string()))?;
    let summary = summarize(&seed);
    info!(
        developers = summary.developers,
        repositories = summary.repositories,
        "seed profile swapped"
    );
    state.swap_seed(seed);
    Ok(Json(summary))
}

async fn config(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let seed = state.seed();
    Json(json!({
        "limits": {
            "maxDays": forgesim_core::generate::MAX_DAYS,
            "maxDevelopers": forgesim_core::generate::MAX_DEVELOPERS,
            "maxEvents": forgesim_core::generate::MAX_EVENT_CAP,
        },
        "seed": summarize(&seed),
        "controllerState": state.controller.state(),
        "storage": state.controller.store().snapshot(),
    }))
}

async fn healthz(State(state): State<SharedState>) -> impl IntoResponse {
    let state_now = state.controller.state();
    let status = if state_now == RegenState::Failed {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(json!({ "status": "ok", "controller": state_now })))
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub bucket: Option<Bucket>,
    #[serde(alias = "include_timeseries")]
    pub include_timeseries: bool,
}

impl StatsQuery {
    fn range(&self) -> TimeRange {
        TimeRange::new(
            self.from.unwrap_or(DateTime::<Utc>::MIN_UTC),
            self.to.unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    controller: RegenState,
    storage: StorageStats,
    developers: DeveloperBreakdowns,
    quality: QualityMetrics,
    variance: VarianceReport,
    organization: SeedSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_series: Option<SeriesReport>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeveloperBreakdowns {
    by_seniority: BTreeMap<String, u64>,
    by_region: BTreeMap<String, u64>,
    by_team: BTreeMap<String, u64>,
    by_activity: BTreeMap<String, u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VarianceReport {
    commits_per_developer: f64,
    change_size: f64,
    cycle_time_days: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SeriesReport {
    bucket: Bucket,
    commits: Vec<SeriesPoint>,
    pull_requests: Vec<SeriesPoint>,
    avg_cycle_time_days: Vec<SeriesPoint>,
}

async fn stats(
    State(state): State<SharedState>,
    Query(query): Query<StatsQuery>,
) -> Json<StatsResponse> {
    let range = query.range();
    let store = state.controller.store();

    let devs = store.developers();
    let commits = store.commits_in_range(range);
    let prs = store.pull_requests_in_range(range);
    let reviews = store.reviews_in_range(range);

    let time_series_report = query.include_timeseries.then(|| {
        let bucket = query.bucket.unwrap_or_default();
        SeriesReport {
            bucket,
            commits: time_series(bucket, SeriesMetric::Commits, &commits, &prs),
            pull_requests: time_series(bucket, SeriesMetric::PullRequests, &commits, &prs),
            avg_cycle_time_days: time_series(
                bucket,
                SeriesMetric::AvgCycleTimeDays,
                &commits,
                &prs,
            ),
        }
    });

    Json(StatsResponse {
        controller: state.controller.state(),
        storage: store.snapshot(),
        developers: DeveloperBreakdowns {
            by_seniority: developer_breakdown(&devs, Dimension::Seniority),
            by_region: developer_breakdown(&devs, Dimension::Region),
            by_team: developer_breakdown(&devs, Dimension::Team),
            by_activity: developer_breakdown(&devs, Dimension::Activity),
        },
        quality: quality_metrics(&prs, &reviews),
        variance: VarianceReport {
            commits_per_developer: variance(
                VarianceMetric::CommitsPerDeveloper,
                &commits,
                &prs,
            ),
            change_size: variance(VarianceMetric::ChangeSize, &commits, &prs),
            cycle_time_days: variance(VarianceMetric::CycleTimeDays, &commits, &prs),
        },
        organization: summarize(&state.seed()),
        time_series: time_series_report,
    })
}

// ============================================================================
// Commit listing
// ============================================================================

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 500;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CommitsQuery {
    pub user: Option<String>,
    pub repo: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitPage {
    data: Vec<CommitEvent>,
    pagination: Pagination,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    page: usize,
    per_page: usize,
    total: usize,
}

async fn commits(
    State(state): State<SharedState>,
    Query(query): Query<CommitsQuery>,
) -> Result<Json<CommitPage>, ApiError> {
    let range = TimeRange::new(
        query.from.unwrap_or(DateTime::<Utc>::MIN_UTC),
        query.to.unwrap_or(DateTime::<Utc>::MAX_UTC),
    );
    let store = state.controller.store();

    let mut matching = match (&query.user, &query.repo) {
        (Some(user), None) => store.commits_by_developer(user, range),
        (None, Some(repo)) => store.commits_by_repository(repo, range),
        (Some(user), Some(repo)) => {
            let mut commits = store.commits_by_developer(user, range);
            commits.retain(|c| &c.repo_name == repo);
            commits
        }
        (None, None) => store.commits_in_range(range),
    };
    matching.sort_by(|a, b| a.commit_ts.cmp(&b.commit_ts));

    let (page, per_page) = page_params(query.page, query.per_page)?;
    let total = matching.len();
    let start = (page - 1).saturating_mul(per_page).min(total);
    let end = (start + per_page).min(total);

    Ok(Json(CommitPage {
        data: matching[start..end].to_vec(),
        pagination: Pagination {
            page,
            per_page,
            total,
        },
    }))
}

fn page_params(page: Option<usize>, per_page: Option<usize>) -> Result<(usize, usize), ApiError> {
    let page = page.unwrap_or(1);
    let per_page = per_page.unwrap_or(DEFAULT_PAGE_SIZE);
    if page == 0 {
        return Err(ApiError::bad_request("page must be at least 1"));
    }
    if per_page == 0 || per_page > MAX_PAGE_SIZE {
        return Err(ApiError::bad_request(format!(
            "perPage must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok((page, per_page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use forgesim_core::EventStore;

    fn shared_state() -> SharedState {
        let store = Arc::new(EventStore::new());
        AppState::new(SeedProfile::demo(), Arc::new(RegenController::new(store)))
    }

    #[test]
    fn test_regen_request_defaults() {
        let request: RegenRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, RegenRequest::default());
        assert_eq!(request.days, 30);
        assert_eq!(request.mode, Mode::Override);
        assert!(request.rng_seed.is_none());
    }

    #[test]
    fn test_regen_request_parses_camel_case() {
        let request: RegenRequest = serde_json::from_str(
            r#"{"days": 90, "velocity": "high", "developerCount": 50,
                "maxEvents": 1000, "mode": "append", "rngSeed": 7}"#,
        )
        .unwrap();
        assert_eq!(request.days, 90);
        assert_eq!(request.velocity, Velocity::High);
        assert_eq!(request.developer_count, Some(50));
        assert_eq!(request.max_events, Some(1000));
        assert_eq!(request.mode, Mode::Append);
        assert_eq!(request.rng_seed, Some(7));
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(
            ApiError::from(RegenError::AlreadyRunning).status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(RegenError::ControllerFailed).status,
            StatusCode::SERVICE_UNAVAILABLE
        );
        let config_err: RegenError = forgesim_core::ConfigError::DaysOutOfRange(0).into();
        assert_eq!(ApiError::from(config_err).status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_page_params_bounds() {
        assert_eq!(page_params(None, None).unwrap(), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(page_params(Some(3), Some(10)).unwrap(), (3, 10));
        assert!(page_params(Some(0), None).is_err());
        assert!(page_params(None, Some(0)).is_err());
        assert!(page_params(None, Some(MAX_PAGE_SIZE + 1)).is_err());
    }

    #[test]
    fn test_stats_query_defaults_to_unbounded_range() {
        let query = StatsQuery::default();
        let range = query.range();
        assert_eq!(range.from, DateTime::<Utc>::MIN_UTC);
        assert_eq!(range.to, DateTime::<Utc>::MAX_UTC);
        assert!(!query.include_timeseries);
    }

    #[tokio::test]
    async fn test_regenerate_then_stats_roundtrip() {
        let state = shared_state();
        let request = RegenRequest {
            days: 14,
            rng_seed: Some(11),
            ..RegenRequest::default()
        };
        let Json(response) = regenerate(State(state.clone()), Json(request))
            .await
            .unwrap();
        assert_eq!(response.rng_seed, 11);
        assert!(response.report.added.commits > 0);

        let Json(overview) = stats(State(state.clone()), Query(StatsQuery::default())).await;
        assert_eq!(overview.storage.events, response.report.added);
        assert_eq!(overview.controller, RegenState::Idle);
        assert!(overview.time_series.is_none());

        let Json(with_series) = stats(
            State(state),
            Query(StatsQuery {
                include_timeseries: true,
                ..StatsQuery::default()
            }),
        )
        .await;
        let series = with_series.time_series.unwrap();
        assert!(!series.commits.is_empty());
    }

    #[tokio::test]
    async fn test_commit_listing_paginates() {
        let state = shared_state();
        let request = RegenRequest {
            days: 30,
            rng_seed: Some(5),
            ..RegenRequest::default()
        };
        regenerate(State(state.clone()), Json(request))
            .await
            .unwrap();

        let Json(first) = commits(
            State(state.clone()),
            Query(CommitsQuery {
                per_page: Some(10),
                ..CommitsQuery::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(first.data.len(), 10.min(first.pagination.total));
        assert!(first.pagination.total > 10);

        let Json(second) = commits(
            State(state.clone()),
            Query(CommitsQuery {
                page: Some(2),
                per_page: Some(10),
                ..CommitsQuery::default()
            }),
        )
        .await
        .unwrap();
        assert_ne!(first.data[0].commit_hash, second.data[0].commit_hash);

        // Filtering by an unknown user returns an empty page, not an error.
        let Json(empty) = commits(
            State(state),
            Query(CommitsQuery {
                user: Some("nobody".to_string()),
                ..CommitsQuery::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(empty.pagination.total, 0);
    }

    #[tokio::test]
    async fn test_seed_swap_rejects_invalid_profile() {
        let state = shared_state();
        let mut bad = SeedProfile::demo();
        bad.developers.clear();
        let err = swap_seed(State(state.clone()), Json(bad)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let good = SeedProfile::demo();
        let Json(summary) = swap_seed(State(state), Json(good)).await.unwrap();
        assert_eq!(summary.developers, 3);
        assert_eq!(summary.teams, 2);
    }
}
