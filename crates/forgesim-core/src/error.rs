//! Error taxonomy for the simulation core.
//!
//! Four families, matching how callers are expected to react:
//! - [`SeedError`]: a seed profile failed validation. Fix the seed file.
//! - [`ConfigError`]: an out-of-range generation parameter. Rejected before
//!   any event is produced; safe to retry with corrected input.
//! - [`GenerateError`]: malformed seed data reached the generator despite
//!   upstream validation. The generation pass aborts entirely rather than
//!   silently skipping entities, since a partial dataset skews every
//!   downstream metric.
//! - [`RegenError`]: lifecycle failures of the regeneration controller,
//!   including contention (a run is already in flight).
//!
//! Storage index desync is deliberately absent from this taxonomy: it is a
//! fatal programming error and panics instead of surfacing as a `Result`.

use thiserror::Error;

/// Seed profile validation failures.
#[derive(Debug, Error, PartialEq)]
pub enum SeedError {
    #[error("seed must declare at least one developer")]
    NoDevelopers,

    #[error("seed must declare at least one repository")]
    NoRepositories,

    #[error("duplicate developer id: {0}")]
    DuplicateDeveloperId(String),

    #[error("duplicate developer email: {0}")]
    DuplicateEmail(String),

    #[error("developer {id}: acceptance rate {value} is outside [0.0, 1.0]")]
    AcceptanceRateOutOfRange { id: String, value: f64 },

    #[error("developer {id}: behavior field `{field}` must be finite and non-negative")]
    InvalidBehavior { id: String, field: &'static str },

    #[error("developer {id}: org path {org}/{division}/{team} is not declared in the org chart")]
    UnresolvedOrgPath {
        id: String,
        org: String,
        division: String,
        team: String,
    },

    #[error("repository {repo}: owning team {team} is not declared in the org chart")]
    UndeclaredRepositoryTeam { repo: String, team: String },
}

/// Out-of-range generation parameters, rejected before any side effect.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("days must be between 1 and 3650, got {0}")]
    DaysOutOfRange(u32),

    #[error("developer count override must be at most 10000, got {0}")]
    DeveloperCountOutOfRange(u32),

    #[error("max events cap must be at most 100000, got {0}")]
    MaxEventsOutOfRange(u32),
}

/// Failures inside a generation pass. Any of these aborts the whole pass;
/// no partial output is ever handed to the store.
#[derive(Debug, Error, PartialEq)]
pub enum GenerateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("developer {developer} references undeclared team {team}")]
    UndeclaredTeam { developer: String, team: String },
}

/// Regeneration controller failures.
#[derive(Debug, Error, PartialEq)]
pub enum RegenError {
    /// Another regeneration holds the at-most-one-in-flight slot. This is
    /// not a failure of the in-flight run; callers should retry later.
    #[error("a regeneration is already running")]
    AlreadyRunning,

    /// A previous run left the store in an indeterminate state. The process
    /// should be restarted; the controller refuses further work.
    #[error("regeneration controller is in the failed state")]
    ControllerFailed,

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

impl From<ConfigError> for RegenError {
    fn from(err: ConfigError) -> Self {
        RegenError::Generate(GenerateError::Config(err))
    }
}
