//! Pull request, review, and issue derivation.
//!
//! A developer's commit stream is grouped per repository and chunked into
//! pull requests of 1..=5 commits. Each PR gets review rounds with
//! reviewers drawn from the rest of the roster, quality outcomes biased
//! by the chunk's AI attribution ratio, and a chance of a follow-up
//! tracker issue after merge.

use chrono::{Duration, Utc};
use rand::prelude::IndexedRandom;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, LogNormal, Normal};
use std::collections::HashMap;

use crate::event::{
    CommitEvent, Dataset, IssueEvent, IssueState, PrState, PullRequestEvent, ReviewEvent,
    ReviewVerdict,
};
use crate::seed::{DeveloperProfile, MaturityTier, SeedProfile};

use super::text::TextEngine;
use super::EventBudget;

const MAX_COMMITS_PER_PR: usize = 5;
/// PR resolution outcome thresholds on a uniform roll.
const MERGED_BELOW: f64 = 0.82;
const OPEN_BELOW: f64 = 0.92;
/// Probability a merged PR spawns a follow-up issue.
const ISSUE_SHARE: f64 = 0.25;
/// Cumulative weights for 1..=4 review iterations.
const ITERATION_WEIGHTS: [f64; 4] = [0.55, 0.85, 0.97, 1.0];

pub(super) struct LifecycleBuilder<'a> {
    seed: &'a SeedProfile,
    roster: &'a [DeveloperProfile],
    /// Per-run id prefix so append runs never collide with stored ids.
    run_tag: String,
    pr_seq: u32,
    review_seq: u32,
    issue_seq: u32,
    pr_numbers: HashMap<String, u32>,
    issue_numbers: HashMap<String, u32>,
}

impl<'a> LifecycleBuilder<'a> {
    pub(super) fn new(
        seed: &'a SeedProfile,
        roster: &'a [DeveloperProfile],
        rng: &mut StdRng,
    ) -> Self {
        LifecycleBuilder {
            seed,
            roster,
            run_tag: format!("{:08x}", rng.random::<u32>()),
            pr_seq: 0,
            review_seq: 0,
            issue_seq: 0,
            pr_numbers: HashMap::new(),
            issue_numbers: HashMap::new(),
        }
    }

    /// Derive PRs, reviews, and issues from one developer's commits,
    /// appending into `dataset`.
    pub(super) fn extend_for(
        &mut self,
        dev: &DeveloperProfile,
        commits: &[CommitEvent],
        engine: &TextEngine<'_>,
        rng: &mut StdRng,
        budget: &mut EventBudget,
        dataset: &mut Dataset,
    ) {
        let mut per_repo: HashMap<&str, Vec<&CommitEvent>> = HashMap::new();
        for commit in commits {
            per_repo.entry(&commit.repo_name).or_default().push(commit);
        }
        // HashMap iteration order would leak into the RNG stream.
        let mut repos: Vec<&str> = per_repo.keys().copied().collect();
        repos.sort_unstable();

        let merge_delay_hours =
            LogNormal::new(12f64.ln(), 0.9).expect("finite log-normal parameters");
        let survival_noise = Normal::new(0.0, 0.08).expect("finite normal parameters");

        for repo in repos {
            let repo_commits = &per_repo[repo];
            let mut offset = 0;
            while offset < repo_commits.len() {
                let take = rng.random_range(1..=MAX_COMMITS_PER_PR);
                let chunk = &repo_commits[offset..(offset + take).min(repo_commits.len())];
                offset += chunk.len();

                if !budget.take() {
                    return;
                }
                let pr = self.build_pr(dev, repo, chunk, engine, &merge_delay_hours,
                    &survival_noise, rng);
                self.reviews_for(&pr, rng, budget, dataset);
                if pr.state == PrState::Merged && rng.random_bool(ISSUE_SHARE) && budget.take() {
                    dataset.issues.push(self.build_issue(&pr, engine, rng));
                }
                dataset.pull_requests.push(pr);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_pr(
        &mut self,
        dev: &DeveloperProfile,
        repo: &str,
        chunk: &[&CommitEvent],
        engine: &TextEngine<'_>,
        merge_delay_hours: &LogNormal<f64>,
        survival_noise: &Normal<f64>,
        rng: &mut StdRng,
    ) -> PullRequestEvent {
        self.pr_seq += 1;
        let number = {
            let n = self.pr_numbers.entry(repo.to_string()).or_insert(0);
            *n += 1;
            *n
        };

        let additions: u64 = chunk.iter().map(|c| c.lines.total).sum();
        let deletions: u64 = chunk.iter().map(|c| c.lines_deleted).sum();
        let ai_lines: u64 = chunk.iter().map(|c| c.lines.tab + c.lines.composer).sum();
        let ai_ratio = if additions > 0 {
            ai_lines as f64 / additions as f64
        } else {
            0.0
        };

        let created_at = chunk.first().map(|c| c.commit_ts).unwrap_or_else(Utc::now);
        let last_commit = chunk.last().map(|c| c.commit_ts).unwrap_or(created_at);
        let resolved_at =
            last_commit + Duration::seconds((merge_delay_hours.sample(rng) * 3600.0) as i64);

        let roll = rng.random::<f64>();
        let state = if roll < MERGED_BELOW {
            PrState::Merged
        } else if roll < OPEN_BELOW {
            PrState::Open
        } else {
            PrState::Closed
        };

        let review_iterations = sample_iterations(rng);

        // Quality outcomes lean on the AI attribution ratio and the
        // repository's maturity tier.
        let revert_rate = 0.02 + self.seed.correlation("ai_revert", 0.05) * ai_ratio;
        let hotfix_rate =
            self.seed.correlation("hotfix_base", 0.08) * self.maturity_factor(repo);
        let merged = state == PrState::Merged;
        let reverted = merged && rng.random_bool(revert_rate.clamp(0.0, 1.0));
        let hotfix_followup = merged && rng.random_bool(hotfix_rate.clamp(0.0, 1.0));

        let survival = (0.85 - 0.15 * ai_ratio + survival_noise.sample(rng)).clamp(0.3, 1.0);
        let surviving_lines_30d = if merged {
            (additions as f64 * survival) as u64
        } else {
            0
        };

        PullRequestEvent {
            id: format!("PR-{}-{}", self.run_tag, self.pr_seq),
            number,
            repo_name: repo.to_string(),
            author_id: dev.id.clone(),
            author_email: dev.email.clone(),
            title: engine.pr_title(rng),
            state,
            additions,
            deletions,
            review_iterations,
            reverted,
            hotfix_followup,
            surviving_lines_30d,
            created_at,
            merged_at: merged.then_some(resolved_at),
            closed_at: (state == PrState::Closed).then_some(resolved_at),
        }
    }

    fn reviews_for(
        &mut self,
        pr: &PullRequestEvent,
        rng: &mut StdRng,
        budget: &mut EventBudget,
        dataset: &mut Dataset,
    ) {
        let resolution = pr.merged_at.or(pr.closed_at).unwrap_or_else(|| {
            pr.created_at + Duration::hours(24)
        });
        let span = (resolution - pr.created_at).num_seconds().max(1);

        for round in 0..pr.review_iterations {
            if !budget.take() {
                return;
            }
            self.review_seq += 1;
            let last = round + 1 == pr.review_iterations;
            let verdict = match (last, pr.state) {
                (true, PrState::Merged) => ReviewVerdict::Approved,
                (true, PrState::Closed) => ReviewVerdict::ChangesRequested,
                (true, PrState::Open) => ReviewVerdict::Commented,
                (false, _) => ReviewVerdict::ChangesRequested,
            };
            // Space rounds across the PR's lifetime.
            let frac = (round as f64 + 1.0) / (pr.review_iterations as f64 + 1.0);
            let submitted_at =
                pr.created_at + Duration::seconds((span as f64 * frac) as i64);

            let reviewer = self.pick_reviewer(&pr.author_id, rng);
            // Square the roll to skew toward few comments.
            let comment_count = (rng.random::<f64>().powi(2) * 12.0) as u32;

            dataset.reviews.push(ReviewEvent {
                id: format!("rev-{}-{:06}", self.run_tag, self.review_seq),
                pr_id: pr.id.clone(),
                repo_name: pr.repo_name.clone(),
                reviewer_id: reviewer.id.clone(),
                reviewer_email: reviewer.email.clone(),
                verdict,
                comment_count,
                submitted_at,
            });
        }
    }

    fn build_issue(
        &mut self,
        pr: &PullRequestEvent,
        engine: &TextEngine<'_>,
        rng: &mut StdRng,
    ) -> IssueEvent {
        self.issue_seq += 1;
        let number = {
            let n = self.issue_numbers.entry(pr.repo_name.clone()).or_insert(0);
            *n += 1;
            *n
        };

        let anchor = pr.merged_at.unwrap_or(pr.created_at);
        let created_at = anchor + Duration::seconds(rng.random_range(1..=72 * 3600));
        let closed = rng.random_bool(0.6);
        let closed_at = closed
            .then(|| created_at + Duration::seconds(rng.random_range(3600..=14 * 24 * 3600)));

        IssueEvent {
            id: format!("issue-{}-{:06}", self.run_tag, self.issue_seq),
            number,
            repo_name: pr.repo_name.clone(),
            author_id: self.pick_reviewer(&pr.author_id, rng).id.clone(),
            title: engine.issue_title(rng),
            state: if closed { IssueState::Closed } else { IssueState::Open },
            created_at,
            closed_at,
        }
    }

    /// Any roster member other than the author, when the roster allows it.
    fn pick_reviewer(&self, author_id: &str, rng: &mut StdRng) -> &'a DeveloperProfile {
        let candidates: Vec<&DeveloperProfile> = self
            .roster
            .iter()
            .filter(|d| d.id != author_id)
            .collect();
        candidates.choose(rng).copied().unwrap_or(&self.roster[0])
    }

    fn maturity_factor(&self, repo: &str) -> f64 {
        let tier = self
            .seed
            .repositories
            .iter()
            .find(|r| r.name == repo)
            .map(|r| r.maturity)
            .unwrap_or(MaturityTier::Active);
        match tier {
            MaturityTier::Incubating => 1.5,
            MaturityTier::Active => 1.0,
            MaturityTier::Mature => 0.7,
        }
    }
}

fn sample_iterations(rng: &mut StdRng) -> u32 {
    let roll = rng.random::<f64>();
    for (i, bound) in ITERATION_WEIGHTS.iter().enumerate() {
        if roll < *bound {
            return (i + 1) as u32;
        }
    }
    ITERATION_WEIGHTS.len() as u32
}
