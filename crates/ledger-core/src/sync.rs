//! Reconciling the local chain with chains reported by peers.
//!
//! The default [`MergePolicy::LongestChain`] adopts any strictly longer
//! remote chain without checking its linkage or work. A peer can therefore
//! overwrite a valid local chain with an invalid longer one.
//! [`MergePolicy::Validated`] is the opt-in stricter mode.

use crate::{
    chain::Chain,
    constants::GENESIS_PREVIOUS_HASH,
    error::FetchError,
    ledger::Ledger,
    peers::PeerRegistry,
    RemoteBlock,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MergePolicy {
    /// Length is the only acceptance criterion.
    #[default]
    LongestChain,
    /// Longer chains must also be internally consistent, judged by the
    /// hashes the peer reported.
    Validated,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    Kept { local: usize, remote: usize },
    Replaced { length: usize },
    Invalid(String),
}

/// Synchronous request/response access to a peer's `get_chain`.
pub trait ChainFetcher {
    fn fetch_chain(&self, url: &str) -> Result<Vec<RemoteBlock>, FetchError>;
}

/// Per-peer result of a sync round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PeerOutcome {
    /// The peer answered; `length` is the length it reported, adopted or not.
    Success { length: usize },
    Failed { code: u16 },
    Error { error: String },
    Invalid { reason: String },
}

pub type SyncReport = BTreeMap<String, PeerOutcome>;

pub fn merge_remote_chain(
    chain: &mut Chain,
    remote: Vec<RemoteBlock>,
    policy: MergePolicy,
) -> MergeOutcome {
    let (local, length) = (chain.len(), remote.len());
    if length <= local {
        return MergeOutcome::Kept {
            local,
            remote: length,
        };
    }
    if policy == MergePolicy::Validated {
        if let Err(reason) = validate_remote(&remote, chain) {
            warn!(%reason, "refusing longer remote chain");
            return MergeOutcome::Invalid(reason);
        }
    }
    chain.replace(remote.into_iter().map(RemoteBlock::into_block).collect());
    info!(from = local, to = length, "replaced local chain with longer remote chain");
    MergeOutcome::Replaced { length }
}

/// Nonces are not on the wire, so proofs cannot be recomputed; instead the
/// reported hashes must link up and carry the difficulty prefix.
fn validate_remote(remote: &[RemoteBlock], chain: &Chain) -> Result<(), String> {
    let difficulty = chain.difficulty();
    let mut parent_hash = GENESIS_PREVIOUS_HASH;
    for (position, block) in remote.iter().enumerate() {
        if block.index != position as u64 {
            return Err(format!("block at position {position} has index {}", block.index));
        }
        if block.previous_hash != parent_hash {
            return Err(format!("block {} does not link to its parent", block.index));
        }
        let Some(hash) = block.hash.as_deref() else {
            return Err(format!("block {} carries no hash", block.index));
        };
        if position > 0 && !difficulty.is_met_by(hash) {
            return Err(format!(
                "block {} hash lacks prefix {:?}",
                block.index,
                difficulty.prefix()
            ));
        }
        parent_hash = hash;
    }
    Ok(())
}

/// Chains fetched from peers, in registration order, keyed by peer name.
pub type FetchedChains = Vec<(String, Result<Vec<RemoteBlock>, FetchError>)>;

/// Ask every peer for its chain. Touches no ledger state, so hosts can run
/// it outside the ledger's critical section.
pub fn fetch_peer_chains<F: ChainFetcher + ?Sized>(
    peers: &PeerRegistry,
    fetcher: &F,
) -> FetchedChains {
    peers
        .iter()
        .map(|peer| (peer.name.clone(), fetcher.fetch_chain(&peer.url)))
        .collect()
}

/// Merge fetched chains one after another against the current local chain.
/// A failed fetch is recorded and never stops the round.
pub fn merge_fetched(ledger: &mut Ledger, fetched: FetchedChains) -> SyncReport {
    let mut report = SyncReport::new();
    for (name, result) in fetched {
        let outcome = match result {
            Ok(remote) => {
                let length = remote.len();
                match ledger.merge_remote_chain(remote) {
                    MergeOutcome::Invalid(reason) => PeerOutcome::Invalid { reason },
                    MergeOutcome::Kept { .. } | MergeOutcome::Replaced { .. } => {
                        PeerOutcome::Success { length }
                    }
                }
            }
            Err(FetchError::Status(code)) => {
                warn!(peer = %name, code, "peer refused chain request");
                PeerOutcome::Failed { code }
            }
            Err(err) => {
                warn!(peer = %name, error = %err, "peer fetch failed");
                PeerOutcome::Error {
                    error: err.to_string(),
                }
            }
        };
        report.insert(name, outcome);
    }
    report
}

/// Fetch from every peer, then merge in registration order.
pub fn sync_with_peers<F: ChainFetcher + ?Sized>(
    ledger: &mut Ledger,
    peers: &PeerRegistry,
    fetcher: &F,
) -> SyncReport {
    merge_fetched(ledger, fetch_peer_chains(peers, fetcher))
}
