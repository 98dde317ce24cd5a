//! Generation engine: turns a seed profile plus a generation config into
//! a deterministic batch of synthetic events.
//!
//! Pipeline, in fixed RNG draw order:
//! 1. resolve the roster (truncate or replicate to `developer_count`),
//! 2. per developer, in roster order: commit stream, then telemetry,
//! 3. per developer: pull requests, reviews, and issues derived from
//!    that developer's commits,
//! 4. final (timestamp, id) sort of every kind.
//!
//! `generate` is a pure function of `(seed, config, window_start,
//! rng_seed)`. Wall-clock time never enters here; the caller anchors the
//! window. Identical inputs produce byte-identical output.

pub mod commit;
pub mod lifecycle;
pub mod telemetry;
pub mod text;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, GenerateError};
use crate::event::{Dataset, TimeRange};
use crate::seed::{replicate_developers, DeveloperProfile, SeedProfile};
use text::TextEngine;

/// Bounds enforced by [`GenerationConfig::validate`].
pub const MAX_DAYS: u32 = 3650;
pub const MAX_DEVELOPERS: u32 = 10_000;
pub const MAX_EVENT_CAP: u32 = 100_000;

/// Activity scaling tier.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Velocity {
    Low,
    #[default]
    Medium,
    High,
}

impl Velocity {
    /// Multiplier applied to every developer's commit rate.
    pub fn multiplier(&self) -> f64 {
        match self {
            Velocity::Low => 0.5,
            Velocity::Medium => 1.0,
            Velocity::High => 2.0,
        }
    }
}

/// Whether a regeneration extends the store or replaces it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Append,
    #[default]
    Override,
}

/// Parameters of one generation pass.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Length of the generation window in days.
    pub days: u32,
    #[serde(default)]
    pub velocity: Velocity,
    /// Roster size override. Absent or zero means the seed roster as-is.
    #[serde(default)]
    pub developer_count: Option<u32>,
    /// Hard cap on total events across all kinds. Absent or zero means
    /// uncapped.
    #[serde(default)]
    pub max_events: Option<u32>,
    #[serde(default)]
    pub mode: Mode,
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.days == 0 || self.days > MAX_DAYS {
            return Err(ConfigError::DaysOutOfRange(self.days));
        }
        if let Some(count) = self.developer_count {
            if count > MAX_DEVELOPERS {
                return Err(ConfigError::DeveloperCountOutOfRange(count));
            }
        }
        if let Some(cap) = self.max_events {
            if cap > MAX_EVENT_CAP {
                return Err(ConfigError::MaxEventsOutOfRange(cap));
            }
        }
        Ok(())
    }
}

/// Everything a generation pass produces.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    /// The resolved roster, including replicated developers.
    pub developers: Vec<DeveloperProfile>,
    pub dataset: Dataset,
    /// The window events were generated for.
    pub window: TimeRange,
}

/// Shared countdown against `max_events`. `None` means uncapped.
pub(crate) struct EventBudget {
    remaining: Option<u64>,
}

impl EventBudget {
    fn new(cap: Option<u32>) -> Self {
        EventBudget {
            remaining: cap.filter(|c| *c > 0).map(u64::from),
        }
    }

    /// Reserve one event slot. Returns false once the cap is exhausted.
    pub(crate) fn take(&mut self) -> bool {
        match &mut self.remaining {
            None => true,
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
        }
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

/// Run one generation pass.
///
/// `window_start` anchors the window; events land in
/// `[window_start, window_start + days)`. `rng_seed` fixes every random
/// draw, so repeated calls with the same arguments return equal output.
pub fn generate(
    seed: &SeedProfile,
    cfg: &GenerationConfig,
    window_start: DateTime<Utc>,
    rng_seed: u64,
) -> Result<GenerationOutput, GenerateError> {
    cfg.validate()?;

    let mut rng = StdRng::seed_from_u64(rng_seed);
    let window_end = window_start + Duration::days(i64::from(cfg.days));
    let window = TimeRange::new(window_start, window_end - Duration::seconds(1));

    let target = cfg
        .developer_count
        .filter(|n| *n > 0)
        .map(|n| n as usize)
        .unwrap_or(seed.developers.len());
    let roster = replicate_developers(seed, target, &mut rng);

    let declared = seed.declared_teams();
    for dev in &roster {
        if !declared.contains(dev.org_path.team.as_str()) {
            return Err(GenerateError::UndeclaredTeam {
                developer: dev.id.clone(),
                team: dev.org_path.team.clone(),
            });
        }
    }

    let engine = TextEngine::new(&seed.templates);
    let mut budget = EventBudget::new(cfg.max_events);
    let mut dataset = Dataset::default();
    let velocity = cfg.velocity.multiplier();

    for dev in &roster {
        let commits = commit::commit_stream(
            dev,
            seed,
            &engine,
            velocity,
            window_start,
            window_end,
            &mut rng,
            &mut budget,
        );
        telemetry::telemetry_stream(
            dev,
            velocity,
            window_start,
            window_end,
            &mut rng,
            &mut budget,
            &mut dataset,
        );
        dataset.commits.extend(commits);
        if budget.exhausted() {
            break;
        }
    }

    let mut chains = lifecycle::LifecycleBuilder::new(seed, &roster, &mut rng);
    for dev in &roster {
        let own: Vec<_> = dataset
            .commits
            .iter()
            .filter(|c| c.user_id == dev.id)
            .cloned()
            .collect();
        chains.extend_for(dev, &own, &engine, &mut rng, &mut budget, &mut dataset);
        if budget.exhausted() {
            break;
        }
    }

    dataset.sort_by_time();
    debug!(
        developers = roster.len(),
        commits = dataset.commits.len(),
        pull_requests = dataset.pull_requests.len(),
        "generation pass complete"
    );

    Ok(GenerationOutput {
        developers: roster,
        dataset,
        window,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 6, 0, 0, 0).unwrap()
    }

    fn cfg(days: u32) -> GenerationConfig {
        GenerationConfig {
            days,
            velocity: Velocity::Medium,
            developer_count: None,
            max_events: None,
            mode: Mode::Override,
        }
    }

    #[test]
    fn test_config_bounds() {
        assert!(cfg(1).validate().is_ok());
        assert!(cfg(3650).validate().is_ok());
        assert_eq!(cfg(0).validate(), Err(ConfigError::DaysOutOfRange(0)));
        assert_eq!(cfg(3651).validate(), Err(ConfigError::DaysOutOfRange(3651)));

        let mut c = cfg(30);
        c.developer_count = Some(10_001);
        assert_eq!(
            c.validate(),
            Err(ConfigError::DeveloperCountOutOfRange(10_001))
        );
        c.developer_count = None;
        c.max_events = Some(100_001);
        assert_eq!(c.validate(), Err(ConfigError::MaxEventsOutOfRange(100_001)));
    }

    #[test]
    fn test_same_inputs_produce_identical_output() {
        let seed = SeedProfile::demo();
        let a = generate(&seed, &cfg(30), start(), 42).unwrap();
        let b = generate(&seed, &cfg(30), start(), 42).unwrap();
        assert_eq!(a, b);
        assert!(!a.dataset.commits.is_empty());
    }

    #[test]
    fn test_different_rng_seed_changes_output() {
        let seed = SeedProfile::demo();
        let a = generate(&seed, &cfg(30), start(), 42).unwrap();
        let b = generate(&seed, &cfg(30), start(), 43).unwrap();
        assert_ne!(a.dataset, b.dataset);
    }

    #[test]
    fn test_events_stay_inside_window() {
        let seed = SeedProfile::demo();
        let out = generate(&seed, &cfg(14), start(), 7).unwrap();
        let end = start() + Duration::days(14);
        for c in &out.dataset.commits {
            assert!(c.commit_ts >= start() && c.commit_ts < end);
        }
        for e in &out.dataset.model_usage {
            assert!(e.timestamp >= start() && e.timestamp < end);
        }
    }

    #[test]
    fn test_velocity_scales_volume() {
        let seed = SeedProfile::demo();
        let mut low = cfg(60);
        low.velocity = Velocity::Low;
        let mut high = cfg(60);
        high.velocity = Velocity::High;
        let n_low = generate(&seed, &low, start(), 5).unwrap().dataset.commits.len();
        let n_high = generate(&seed, &high, start(), 5).unwrap().dataset.commits.len();
        assert!(
            n_high > n_low * 2,
            "high velocity ({n_high}) should far exceed low ({n_low})"
        );
    }

    #[test]
    fn test_max_events_caps_total() {
        let seed = SeedProfile::demo();
        let mut c = cfg(90);
        c.max_events = Some(50);
        let out = generate(&seed, &c, start(), 11).unwrap();
        assert!(out.dataset.counts().total() <= 50);
    }

    #[test]
    fn test_developer_count_replicates_roster() {
        let seed = SeedProfile::demo();
        let mut c = cfg(7);
        c.developer_count = Some(20);
        let out = generate(&seed, &c, start(), 3).unwrap();
        assert_eq!(out.developers.len(), 20);
    }

    #[test]
    fn test_zero_overrides_mean_defaults() {
        let seed = SeedProfile::demo();
        let mut c = cfg(7);
        c.developer_count = Some(0);
        c.max_events = Some(0);
        let out = generate(&seed, &c, start(), 3).unwrap();
        assert_eq!(out.developers.len(), seed.developers.len());
        assert!(out.dataset.counts().total() > 0);
    }

    #[test]
    fn test_attribution_always_sums() {
        let seed = SeedProfile::demo();
        let out = generate(&seed, &cfg(45), start(), 99).unwrap();
        for c in &out.dataset.commits {
            assert!(c.lines.is_consistent(), "commit {}", c.commit_hash);
        }
    }

    #[test]
    fn test_reviews_reference_existing_prs() {
        let seed = SeedProfile::demo();
        let out = generate(&seed, &cfg(45), start(), 21).unwrap();
        assert!(!out.dataset.pull_requests.is_empty());
        let pr_ids: std::collections::HashSet<&str> = out
            .dataset
            .pull_requests
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert!(!out.dataset.reviews.is_empty());
        for review in &out.dataset.reviews {
            assert!(pr_ids.contains(review.pr_id.as_str()));
        }
    }
}
