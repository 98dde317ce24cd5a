//! Editor telemetry: model invocations and feature usage bursts.
//!
//! Both streams are Poisson arrivals scaled off the developer's commit
//! rate, so heavier committers also produce heavier telemetry. Feature
//! choice is biased by the developer's acceptance rate: high acceptors
//! lean on tab completion, low acceptors on chat.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Exp, LogNormal};
use uuid::Uuid;

use crate::event::{Dataset, FeatureUsageEvent, ModelUsageEvent};
use crate::seed::DeveloperProfile;

use super::EventBudget;

/// Telemetry rates relative to the developer's commit rate.
const MODEL_RATE_FACTOR: f64 = 0.4;
const FEATURE_RATE_FACTOR: f64 = 0.25;

const MODELS: [&str; 4] = ["auto", "fast", "max", "reasoning"];
const FEATURES: [&str; 5] = ["tab", "composer", "chat", "agent", "inline_edit"];

pub(super) fn telemetry_stream(
    dev: &DeveloperProfile,
    velocity: f64,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    rng: &mut StdRng,
    budget: &mut EventBudget,
    dataset: &mut Dataset,
) {
    let commit_rate =
        dev.behavior.commits_per_week / (7.0 * 24.0) * velocity * dev.behavior.activity_multiplier;
    if commit_rate <= 0.0 || !commit_rate.is_finite() {
        return;
    }

    let token_dist = LogNormal::new(1200f64.ln(), 0.7).expect("finite log-normal parameters");

    for_arrivals(
        commit_rate * MODEL_RATE_FACTOR,
        window_start,
        window_end,
        rng,
        budget,
        |rng, at| {
            let input_tokens = token_dist.sample(rng).clamp(10.0, 200_000.0) as u64;
            let output_tokens =
                (input_tokens as f64 * (0.15 + rng.random::<f64>() * 0.6)) as u64;
            dataset.model_usage.push(ModelUsageEvent {
                id: event_id(rng),
                user_id: dev.id.clone(),
                model: pick_model(rng),
                input_tokens,
                output_tokens,
                timestamp: at,
            });
        },
    );

    for_arrivals(
        commit_rate * FEATURE_RATE_FACTOR,
        window_start,
        window_end,
        rng,
        budget,
        |rng, at| {
            dataset.feature_usage.push(FeatureUsageEvent {
                id: event_id(rng),
                user_id: dev.id.clone(),
                feature: pick_feature(dev.acceptance_rate, rng),
                invocations: rng.random_range(1..=40),
                timestamp: at,
            });
        },
    );
}

/// Walk a Poisson arrival process across the window, invoking `emit` for
/// every arrival the budget admits.
fn for_arrivals<F>(
    rate_per_hour: f64,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    rng: &mut StdRng,
    budget: &mut EventBudget,
    mut emit: F,
) where
    F: FnMut(&mut StdRng, DateTime<Utc>),
{
    if rate_per_hour <= 0.0 {
        return;
    }
    let gaps = Exp::new(rate_per_hour).expect("positive arrival rate");
    let mut cursor = window_start;
    loop {
        cursor += Duration::seconds((gaps.sample(rng) * 3600.0) as i64);
        if cursor >= window_end {
            return;
        }
        if !budget.take() {
            return;
        }
        emit(rng, cursor);
    }
}

fn pick_model(rng: &mut StdRng) -> String {
    // auto dominates; reasoning is the rare expensive pick.
    let roll = rng.random::<f64>();
    let idx = if roll < 0.5 {
        0
    } else if roll < 0.75 {
        1
    } else if roll < 0.92 {
        2
    } else {
        3
    };
    MODELS[idx].to_string()
}

fn pick_feature(acceptance_rate: f64, rng: &mut StdRng) -> String {
    // High acceptors skew toward tab/composer, low acceptors toward chat.
    let tab_weight = 0.2 + 0.4 * acceptance_rate;
    let roll = rng.random::<f64>();
    let feature = if roll < tab_weight {
        "tab"
    } else if roll < tab_weight + 0.2 {
        "composer"
    } else if roll < tab_weight + 0.45 {
        "chat"
    } else if roll < tab_weight + 0.55 {
        "agent"
    } else {
        "inline_edit"
    };
    debug_assert!(FEATURES.contains(&feature));
    feature.to_string()
}

/// Deterministic id built from RNG draws instead of a v4 UUID, keeping
/// generation reproducible.
fn event_id(rng: &mut StdRng) -> String {
    Uuid::from_u64_pair(rng.random(), rng.random())
        .simple()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::SeedProfile;
    use chrono::TimeZone;
    use rand::SeedableRng;

    fn run(rng_seed: u64, days: i64) -> Dataset {
        let seed = SeedProfile::demo();
        let mut rng = StdRng::seed_from_u64(rng_seed);
        let mut budget = EventBudget::new(None);
        let start = Utc.with_ymd_and_hms(2025, 1, 6, 0, 0, 0).unwrap();
        let mut dataset = Dataset::default();
        telemetry_stream(
            &seed.developers[0],
            1.0,
            start,
            start + Duration::days(days),
            &mut rng,
            &mut budget,
            &mut dataset,
        );
        dataset
    }

    #[test]
    fn test_model_usage_outnumbers_feature_usage() {
        let dataset = run(2, 120);
        assert!(dataset.model_usage.len() > dataset.feature_usage.len());
        assert!(!dataset.feature_usage.is_empty());
    }

    #[test]
    fn test_ids_are_unique_and_stable() {
        let a = run(6, 60);
        let b = run(6, 60);
        assert_eq!(a, b);

        let mut ids: Vec<&str> = a
            .model_usage
            .iter()
            .map(|e| e.id.as_str())
            .chain(a.feature_usage.iter().map(|e| e.id.as_str()))
            .collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn test_output_tokens_below_input() {
        let dataset = run(3, 60);
        for e in &dataset.model_usage {
            assert!(e.output_tokens < e.input_tokens);
            assert!(e.input_tokens >= 10);
        }
    }

    #[test]
    fn test_known_features_only() {
        let dataset = run(4, 90);
        for e in &dataset.feature_usage {
            assert!(FEATURES.contains(&e.feature.as_str()), "{}", e.feature);
            assert!((1..=40).contains(&e.invocations));
        }
    }
}
