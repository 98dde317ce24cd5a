//! Regeneration controller: the single write path into the store.
//!
//! At most one regeneration runs at a time. A run:
//! 1. validates the config and claims the in-flight slot,
//! 2. anchors the generation window (append runs continue from the
//!    latest stored commit; override runs end at the caller's `now`),
//! 3. generates the full dataset off to the side,
//! 4. applies it to the store in one atomic write (replace or append).
//!
//! Because generation finishes before the store is touched, a failed run
//! never leaves partial data behind. The Failed state exists for the
//! remaining hole: a panic between claiming the slot and applying. The
//! run guard trips it so later callers see an explicit error instead of
//! a silently wedged controller.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::RegenError;
use crate::event::{EventCounts, TimeRange};
use crate::generate::{generate, GenerationConfig, Mode};
use crate::seed::SeedProfile;
use crate::store::{EventStore, StorageStats};

/// Controller lifecycle state.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RegenState {
    Idle,
    Running,
    Failed,
}

/// Outcome of a completed regeneration.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegenReport {
    pub mode: Mode,
    pub window: TimeRange,
    /// Roster size after this run.
    pub developers: u64,
    /// Events this run produced.
    pub added: EventCounts,
    /// Store occupancy after the run.
    pub totals: StorageStats,
    pub duration_ms: u64,
}

pub struct RegenController {
    store: Arc<EventStore>,
    state: Mutex<RegenState>,
}

impl RegenController {
    pub fn new(store: Arc<EventStore>) -> Self {
        RegenController {
            store,
            state: Mutex::new(RegenState::Idle),
        }
    }

    pub fn state(&self) -> RegenState {
        *self.state.lock().expect("regen state lock poisoned")
    }

    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }

    /// Run a regeneration anchored at the current wall clock.
    pub fn regenerate(
        &self,
        seed: &SeedProfile,
        cfg: &GenerationConfig,
        rng_seed: u64,
    ) -> Result<RegenReport, RegenError> {
        self.regenerate_at(seed, cfg, rng_seed, Utc::now())
    }

    /// Run a regeneration with an explicit clock, for reproducible runs
    /// and tests.
    pub fn regenerate_at(
        &self,
        seed: &SeedProfile,
        cfg: &GenerationConfig,
        rng_seed: u64,
        now: DateTime<Utc>,
    ) -> Result<RegenReport, RegenError> {
        cfg.validate()?;
        self.claim()?;
        let guard = RunGuard { controller: self };
        let started = Instant::now();

        let window_start = self.window_start(cfg, now);
        // The stream seed mixes in the window anchor. A repeated append
        // request reuses the caller's rng seed but starts from a new
        // anchor, so it draws fresh ids instead of re-deriving the ones
        // already stored.
        let stream_seed = rng_seed ^ window_start.timestamp_millis() as u64;
        info!(
            mode = ?cfg.mode,
            days = cfg.days,
            rng_seed,
            %window_start,
            "regeneration started"
        );

        // All failures happen here, before the store is touched.
        let output = generate(seed, cfg, window_start, stream_seed)?;

        let added = output.dataset.counts();
        match cfg.mode {
            Mode::Override => self.store.replace(output.developers.clone(), output.dataset),
            Mode::Append => self.store.append(output.developers.clone(), output.dataset),
        }

        let totals = self.store.snapshot();
        let report = RegenReport {
            mode: cfg.mode,
            window: output.window,
            developers: totals.developers,
            added,
            totals,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            events = report.added.total(),
            developers = report.developers,
            duration_ms = report.duration_ms,
            "regeneration finished"
        );

        guard.disarm();
        Ok(report)
    }

    /// Reset a failed controller back to idle. Deliberately explicit so
    /// an operator acknowledges the wedged run.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("regen state lock poisoned");
        if *state == RegenState::Failed {
            warn!("regeneration controller reset from failed state");
        }
        *state = RegenState::Idle;
    }

    fn claim(&self) -> Result<(), RegenError> {
        let mut state = self.state.lock().expect("regen state lock poisoned");
        match *state {
            RegenState::Running => Err(RegenError::AlreadyRunning),
            RegenState::Failed => Err(RegenError::ControllerFailed),
            RegenState::Idle => {
                *state = RegenState::Running;
                Ok(())
            }
        }
    }

    fn finish(&self, next: RegenState) {
        *self.state.lock().expect("regen state lock poisoned") = next;
    }

    /// Append runs continue where stored data ends; override runs and
    /// appends into an empty store place the window so it ends at `now`.
    fn window_start(&self, cfg: &GenerationConfig, now: DateTime<Utc>) -> DateTime<Utc> {
        let fallback = now - Duration::days(i64::from(cfg.days));
        match cfg.mode {
            Mode::Append => self.store.latest_commit_timestamp().unwrap_or(fallback),
            Mode::Override => fallback,
        }
    }
}

/// Marks the controller failed if a run unwinds before completing.
struct RunGuard<'a> {
    controller: &'a RegenController,
}

impl RunGuard<'_> {
    fn disarm(self) {
        self.controller.finish(RegenState::Idle);
        std::mem::forget(self);
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        // Generation errors land here too; they leave the store untouched,
        // so idle is the right resting state for them. Only an unwind mid
        // run is a real failure.
        if std::thread::panicking() {
            self.controller.finish(RegenState::Failed);
        } else {
            self.controller.finish(RegenState::Idle);
        }
    }
}
