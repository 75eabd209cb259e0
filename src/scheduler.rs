//! Batch scheduling of relay probes.
//!
//! # Overview
//!
//! [`run`] walks the ordered candidate list in consecutive batches of
//! `batch_size`, hands each batch to [`probe_batch`], and stops once the
//! accepted set holds at least `target_count` relays or no batches remain.
//!
//! ```text
//!   NotStarted ──▶ Running ──┬──▶ GoalReached   accepted >= target
//!                            └──▶ Exhausted     no batches left
//! ```
//!
//! Batches never overlap. The goal is checked only after a batch has fully
//! joined, so the last batch can push the accepted count past the target:
//! with a target of 3 and batches yielding 0, 2 and 2 relays, the scan
//! stops after the third batch with 4 accepted relays.
//!
//! # Candidate Order
//!
//! [`shuffle_candidates`] randomizes the candidate list once before
//! filtering. Passing a seed makes the order, and therefore the accepted
//! set's order, reproducible.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::config::{Config, LogLevel};
use crate::error::{Error, Result};
use crate::logger::plog;
use crate::plog_fmt;
use crate::prober::{probe_batch, BatchStats, Dialer, ProbeContext};
use crate::relay::RelayCandidate;

/// Scan progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanState {
    /// No batch has been launched.
    NotStarted,
    /// Batches are being probed.
    Running,
    /// The accepted set reached the target count.
    GoalReached,
    /// Every batch was probed without reaching the target.
    Exhausted,
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanState::NotStarted => write!(f, "not started"),
            ScanState::Running => write!(f, "running"),
            ScanState::GoalReached => write!(f, "goal reached"),
            ScanState::Exhausted => write!(f, "candidates exhausted"),
        }
    }
}

/// Batch size and stop condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Relays probed together per batch.
    pub batch_size: usize,
    /// Stop after the batch that brings the accepted set to this size.
    pub target_count: usize,
}

impl From<&Config> for ScanOptions {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.num_relays,
            target_count: config.goal,
        }
    }
}

/// Outcome of a completed scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// Relays with at least one reachable address, in scheduling order.
    pub accepted: Vec<RelayCandidate>,
    /// Final state, either [`ScanState::GoalReached`] or [`ScanState::Exhausted`].
    pub state: ScanState,
    /// Batches probed.
    pub batches_run: usize,
    /// Relays probed across all batches.
    pub candidates_tested: usize,
    /// Probe counters across all batches.
    pub stats: BatchStats,
    /// When the first batch started.
    pub started_at: DateTime<Utc>,
    /// When the last batch finished.
    pub finished_at: DateTime<Utc>,
}

impl ScanReport {
    /// Number of reachable addresses across all accepted relays.
    pub fn reachable_addresses(&self) -> usize {
        self.accepted
            .iter()
            .map(|r| r.reachable_addresses.len())
            .sum()
    }

    /// Wall-clock duration of the scan.
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Shuffles candidates in place.
///
/// With `Some(seed)` the permutation is deterministic.
///
/// ```rust
/// use tor_relay_scanner::RelayCandidate;
/// use tor_relay_scanner::scheduler::shuffle_candidates;
///
/// let relays: Vec<RelayCandidate> = (0..10)
///     .map(|i| RelayCandidate::new(format!("{i}"), "", vec![]))
///     .collect();
/// let mut a = relays.clone();
/// let mut b = relays.clone();
/// shuffle_candidates(&mut a, Some(7));
/// shuffle_candidates(&mut b, Some(7));
/// assert_eq!(a, b);
/// ```
pub fn shuffle_candidates(candidates: &mut [RelayCandidate], seed: Option<u64>) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    candidates.shuffle(&mut rng);
}

/// Probes `candidates` batch by batch until the target is met or the list
/// runs out.
///
/// A scan that finds nothing is still a success; its report has an empty
/// accepted set and state [`ScanState::Exhausted`].
///
/// # Errors
///
/// Returns [`Error::NoCandidates`] if `candidates` is empty.
pub async fn run<D: Dialer>(
    mut candidates: Vec<RelayCandidate>,
    options: &ScanOptions,
    ctx: &ProbeContext<D>,
) -> Result<ScanReport> {
    if candidates.is_empty() {
        return Err(Error::NoCandidates);
    }

    let batch_size = options.batch_size.max(1);
    let target_count = options.target_count.max(1);
    let total_batches = candidates.len().div_ceil(batch_size);

    let started_at = Utc::now();
    let mut state = ScanState::NotStarted;
    let mut accepted: Vec<RelayCandidate> = Vec::new();
    let mut stats = BatchStats::default();
    let mut batches_run = 0;
    let mut candidates_tested = 0;

    for (i, batch) in candidates.chunks_mut(batch_size).enumerate() {
        state = ScanState::Running;

        plog_fmt!(
            LogLevel::Notice,
            "Attempt {}/{}, Testing {} random relays:",
            i + 1,
            total_batches,
            batch.len(),
        );
        for relay in batch.iter() {
            plog(LogLevel::Debug, &relay.fingerprint);
        }

        let result = probe_batch(batch, ctx).await;
        batches_run += 1;
        candidates_tested += batch.len();
        stats.merge(&result.stats);

        plog(LogLevel::Notice, "Reachable relays this attempt:");
        for &idx in &result.accepted {
            let relay = &batch[idx];
            for line in relay.bridge_lines() {
                plog(LogLevel::Notice, &line);
            }
            accepted.push(relay.clone());
        }
        plog_fmt!(
            LogLevel::Info,
            "Attempt {}: {} of {} addresses reachable, {} refused, {} timed out, {} failed",
            i + 1,
            result.stats.reachable,
            result.stats.attempted,
            result.stats.refused,
            result.stats.timed_out,
            result.stats.failed,
        );

        if accepted.len() >= target_count {
            state = ScanState::GoalReached;
            break;
        }
    }

    if state != ScanState::GoalReached {
        state = ScanState::Exhausted;
    }

    Ok(ScanReport {
        accepted,
        state,
        batches_run,
        candidates_tested,
        stats,
        started_at,
        finished_at: Utc::now(),
    })
}
