//! Auto-pull: keep rolling 10-pull batches on a fixed delay until the
//! wallet runs dry, the batch limit is hit or the caller asks to stop.
use crate::config::MIN_AUTO_INTERVAL_MS;
use crate::error::Result;
use crate::pool::{PoolKind, PoolRules, PullResult};
use crate::save::{self, KeyValueStore, SIM_KEY};
use crate::state::SimState;
use rand::Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const AUTO_BATCH: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoPullOptions {
    pub interval: Duration,
    pub max_batches: Option<u32>,
    /// Oroberyl for a state created from scratch.
    pub starting_primary: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Unaffordable,
    BatchLimit,
    Cancelled,
}

/// What one tick of the loop produced, handed to the reporter.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch: u32,
    pub pool: PoolKind,
    pub results: Vec<PullResult>,
    pub pity: u32,
    pub primary: u64,
    pub secondary: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AutoPullSummary {
    pub batches: u32,
    pub pulls: u32,
    pub stop: StopReason,
}

fn load_state<S: KeyValueStore + ?Sized>(store: &S, starting_primary: u64) -> SimState {
    save::load_or_else(store, SIM_KEY, || SimState::with_starting_primary(starting_primary))
}

/// Wait the interval, then roll one 10-pull batch, until something stops
/// the loop. Every batch is saved before it is reported, so killing the
/// process mid-loop loses at most the wait. `stop` is checked before and
/// after each wait; `None` runs until money or the batch limit runs out.
pub fn run_auto_pull<S, R, F>(
    store: &mut S,
    pool: PoolKind,
    options: AutoPullOptions,
    stop: Option<&AtomicBool>,
    rng: &mut R,
    mut report: F,
) -> Result<AutoPullSummary>
where
    S: KeyValueStore + ?Sized,
    R: Rng + ?Sized,
    F: FnMut(&BatchReport),
{
    let rules = PoolRules::for_pool(pool);
    let interval = options.interval.max(Duration::from_millis(MIN_AUTO_INTERVAL_MS));
    let mut batches = 0u32;
    let mut pulls = 0u32;

    let cancelled = || stop.is_some_and(|flag| flag.load(Ordering::SeqCst));

    let reason = loop {
        if cancelled() {
            break StopReason::Cancelled;
        }
        if options.max_batches.is_some_and(|max| batches >= max) {
            break StopReason::BatchLimit;
        }

        if !load_state(&*store, options.starting_primary).wallet.can_afford(pool, AUTO_BATCH) {
            break StopReason::Unaffordable;
        }

        std::thread::sleep(interval);
        if cancelled() {
            break StopReason::Cancelled;
        }
        // the store may have changed while we slept
        let state = load_state(&*store, options.starting_primary);
        if !state.wallet.can_afford(pool, AUTO_BATCH) {
            break StopReason::Unaffordable;
        }

        let outcome = rules.roll(&state, AUTO_BATCH, rng)?;
        save::save(store, SIM_KEY, &outcome.state)?;
        batches += 1;
        pulls += outcome.results.len() as u32;

        report(&BatchReport {
            batch: batches,
            pool,
            pity: outcome.state.pool(pool).pity,
            primary: outcome.state.wallet.primary,
            secondary: outcome.state.wallet.secondary,
            results: outcome.results,
        });
    };

    log::info!("Auto-pull on {} stopped after {} batches ({:?})", pool, batches, reason);
    Ok(AutoPullSummary {
        batches,
        pulls,
        stop: reason,
    })
}
