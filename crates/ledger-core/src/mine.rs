use crate::{
    constants::{DEADLINE_CHECK_INTERVAL, NONCE_BATCH},
    error::LedgerError,
    pow::Difficulty,
    Block,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing::debug;

/// How a ledger searches for a proof.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MiningStrategy {
    #[default]
    Sequential,
    /// Rayon search that still returns the lowest qualifying nonce.
    Parallel,
}

/// Shared flag that stops an in-flight search.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Escape hatches for the nonce search. The default never stops.
#[derive(Clone, Debug, Default)]
pub struct MiningLimits {
    deadline: Option<Instant>,
    max_attempts: Option<u64>,
    cancel: Option<CancelToken>,
}

impl MiningLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_max_attempts(mut self, attempts: u64) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.deadline.is_none() && self.max_attempts.is_none() && self.cancel.is_none()
    }

    /// Called before hashing attempt number `attempts` (zero based).
    pub(crate) fn check(&self, attempts: u64) -> Result<(), LedgerError> {
        if let Some(max) = self.max_attempts {
            if attempts >= max {
                return Err(LedgerError::MiningAborted(format!(
                    "no proof within {max} attempts"
                )));
            }
        }
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(LedgerError::MiningAborted("cancelled".into()));
        }
        if attempts % DEADLINE_CHECK_INTERVAL == 0
            && self.deadline.is_some_and(|d| Instant::now() >= d)
        {
            return Err(LedgerError::MiningAborted("deadline exceeded".into()));
        }
        Ok(())
    }
}

/// Searches nonces in parallel batches until the block hash meets `difficulty`.
///
/// Each batch is scanned with `find_first`, so the winner is the lowest
/// qualifying nonce and the outcome matches the sequential search. Limits are
/// consulted between batches. On success `block.nonce` holds the winner.
pub fn proof_of_work_parallel(
    block: &mut Block,
    difficulty: Difficulty,
    limits: &MiningLimits,
) -> Result<String, LedgerError> {
    let mut start = 0u64;
    loop {
        // NONCE_BATCH is a multiple of DEADLINE_CHECK_INTERVAL, so the clock is read every round.
        limits.check(start)?;
        let mut end = start.saturating_add(NONCE_BATCH);
        if let Some(max) = limits.max_attempts {
            end = end.min(max);
        }

        let template = &*block;
        let found = (start..end)
            .into_par_iter()
            .find_first(|nonce| difficulty.is_met_by(&template.compute_hash_with_nonce(*nonce)));

        if let Some(nonce) = found {
            block.nonce = nonce;
            let hash = block.compute_hash();
            debug!(block = block.index, nonce, %hash, "proof found");
            return Ok(hash);
        }
        if end == u64::MAX {
            return Err(LedgerError::MiningAborted("nonce space exhausted".into()));
        }
        debug!(block = block.index, searched = end, "no proof in batch");
        start = end;
    }
}
