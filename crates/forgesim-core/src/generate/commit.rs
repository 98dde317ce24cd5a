//! Per-developer commit stream.
//!
//! Arrivals follow a Poisson process: exponential inter-arrival gaps at a
//! rate of `commits_per_week × velocity × activity_multiplier`, thinned
//! by a weekend keep-probability and re-centered into the developer's
//! regional business hours. Change magnitudes are log-normal around the
//! developer's average change size.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use rand::prelude::IndexedRandom;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Exp, LogNormal, Normal};

use crate::event::{CommitEvent, LineAttribution};
use crate::seed::{DeveloperProfile, RepositoryProfile, SeedProfile, Seniority};

use super::text::TextEngine;
use super::EventBudget;

/// Fraction of weekend arrivals kept after thinning.
const WEEKEND_KEEP: f64 = 0.35;
/// Probability a commit lands directly on the default branch.
const DEFAULT_BRANCH_SHARE: f64 = 0.3;
/// Probability a commit goes to a repository owned by the author's team.
const TEAM_REPO_SHARE: f64 = 0.75;
/// Change size clamp, in added lines.
const MIN_CHANGE: f64 = 1.0;
const MAX_CHANGE: f64 = 50_000.0;

#[allow(clippy::too_many_arguments)]
pub(super) fn commit_stream(
    dev: &DeveloperProfile,
    seed: &SeedProfile,
    engine: &TextEngine<'_>,
    velocity: f64,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    rng: &mut StdRng,
    budget: &mut EventBudget,
) -> Vec<CommitEvent> {
    let rate_per_hour =
        dev.behavior.commits_per_week / (7.0 * 24.0) * velocity * dev.behavior.activity_multiplier;
    if rate_per_hour <= 0.0 || !rate_per_hour.is_finite() {
        return Vec::new();
    }
    // Exp::new only fails on a non-positive rate, checked above.
    let gap_hours = Exp::new(rate_per_hour).expect("positive arrival rate");

    let size_dist = LogNormal::new(dev.behavior.avg_change_size.max(MIN_CHANGE).ln(), 0.8)
        .expect("finite log-normal parameters");
    let hour_dist = Normal::new(dev.region.business_hour_utc(), 2.2)
        .expect("finite normal parameters");

    let team_repos = seed.repositories_for_team(&dev.org_path.team);
    let ai_share_base = ai_share_for(dev, seed);

    let mut commits = Vec::new();
    let mut cursor = window_start;
    let mut branch_seq: u32 = 0;

    loop {
        let gap = gap_hours.sample(rng);
        cursor += Duration::seconds((gap * 3600.0) as i64);
        if cursor >= window_end {
            break;
        }

        let is_weekend = matches!(cursor.weekday(), Weekday::Sat | Weekday::Sun);
        if is_weekend && !rng.random_bool(WEEKEND_KEEP) {
            continue;
        }
        if !budget.take() {
            break;
        }

        let at = business_hours(cursor, &hour_dist, rng);
        let repo = pick_repository(seed, &team_repos, rng);

        let total = size_dist.sample(rng).clamp(MIN_CHANGE, MAX_CHANGE) as u64;
        let deleted = (total as f64 * (0.1 + rng.random::<f64>() * 0.5)) as u64;
        let ai_share = (ai_share_base + (rng.random::<f64>() - 0.5) * 0.2).clamp(0.0, 1.0);
        let tab_share = 0.6 + rng.random::<f64>() * 0.2;

        let on_default = rng.random_bool(DEFAULT_BRANCH_SHARE);
        let branch_name = if on_default {
            repo.default_branch.clone()
        } else {
            branch_seq += 1;
            feature_branch(seed, dev, branch_seq, rng)
        };

        commits.push(CommitEvent {
            commit_hash: commit_hash(rng),
            user_id: dev.id.clone(),
            user_email: dev.email.clone(),
            repo_name: repo.name.clone(),
            branch_name,
            is_primary_branch: on_default,
            lines: LineAttribution::split(total, ai_share, tab_share),
            lines_deleted: deleted,
            touches_new_file: rng.random_bool(dev.behavior.new_file_ratio.clamp(0.0, 1.0)),
            message: engine.commit_message(rng),
            commit_ts: at,
        });
    }

    commits
}

/// Baseline AI attribution share: the developer's acceptance rate shifted
/// by the seniority correlation (juniors accept more, seniors less).
fn ai_share_for(dev: &DeveloperProfile, seed: &SeedProfile) -> f64 {
    let corr = seed.correlation("seniority_acceptance", 0.1);
    let shift = match dev.seniority {
        Seniority::Junior => corr,
        Seniority::Mid => 0.0,
        Seniority::Senior => -corr,
    };
    (dev.acceptance_rate + shift).clamp(0.0, 1.0)
}

/// Re-center an arrival into the developer's business hours, keeping the
/// date. The drawn hour wraps modulo 24 so APAC mornings do not underflow.
fn business_hours(at: DateTime<Utc>, hour_dist: &Normal<f64>, rng: &mut StdRng) -> DateTime<Utc> {
    let hour = hour_dist.sample(rng).rem_euclid(24.0);
    let second_of_day = ((hour * 3600.0) as u32).min(86_399);
    let date = at.date_naive();
    date.and_hms_opt(second_of_day / 3600, second_of_day % 3600 / 60, second_of_day % 60)
        .map(|naive| naive.and_utc())
        .unwrap_or(at)
}

fn pick_repository<'a>(
    seed: &'a SeedProfile,
    team_repos: &[&'a RepositoryProfile],
    rng: &mut StdRng,
) -> &'a RepositoryProfile {
    if !team_repos.is_empty() && rng.random_bool(TEAM_REPO_SHARE) {
        team_repos.choose(rng).copied().expect("non-empty team repos")
    } else {
        seed.repositories
            .choose(rng)
            .expect("validated seed has repositories")
    }
}

fn feature_branch(
    seed: &SeedProfile,
    dev: &DeveloperProfile,
    seq: u32,
    rng: &mut StdRng,
) -> String {
    let topic = seed
        .templates
        .fragments
        .get("component")
        .and_then(|pool| pool.choose(rng))
        .map(String::as_str)
        .unwrap_or("change");
    format!("{}/{}-{}", dev.id, topic, seq)
}

/// 40 hex chars drawn from the generation RNG, so hashes are reproducible.
fn commit_hash(rng: &mut StdRng) -> String {
    format!(
        "{:016x}{:016x}{:08x}",
        rng.random::<u64>(),
        rng.random::<u64>(),
        rng.random::<u32>()
    )
}
