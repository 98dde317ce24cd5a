//! forgesim-core: deterministic synthetic development telemetry.
//!
//! Simulates the event stream of a software organization (commits, pull
//! requests, reviews, issues, and editor telemetry) from a declarative
//! seed profile, with reproducible output for a fixed RNG seed.
//!
//! Layers:
//! - [`seed`]: the declarative organization profile and its validation.
//! - [`generate`]: the pure generation engine; statistical event
//!   synthesis over a time window.
//! - [`store`]: the multi-index in-memory event store.
//! - [`aggregate`]: breakdowns, quality metrics, variance, time series.
//! - [`regen`]: the controller serializing regeneration runs.
//!
//! ```text
//! SeedProfile --> generate() --> Dataset --> RegenController --> EventStore
//!                                                                   |
//!                                              aggregate  <---------+
//! ```

pub mod aggregate;
pub mod error;
pub mod event;
pub mod generate;
pub mod regen;
pub mod seed;
pub mod store;

pub use aggregate::{
    developer_breakdown, quality_metrics, time_series, variance, Bucket, Dimension,
    QualityMetrics, SeriesMetric, SeriesPoint, VarianceMetric,
};
pub use error::{ConfigError, GenerateError, RegenError, SeedError};
pub use event::{
    CommitEvent, Dataset, EventCounts, FeatureUsageEvent, IssueEvent, IssueState,
    LineAttribution, ModelUsageEvent, PrState, PullRequestEvent, ReviewEvent, ReviewVerdict,
    TimeRange,
};
pub use generate::{generate, GenerationConfig, GenerationOutput, Mode, Velocity};
pub use regen::{RegenController, RegenReport, RegenState};
pub use seed::{DeveloperProfile, RepositoryProfile, SeedProfile};
pub use store::{EventStore, StorageStats};
