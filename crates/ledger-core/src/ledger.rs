use crate::{
    chain::Chain,
    error::LedgerError,
    mine::{proof_of_work_parallel, MiningLimits, MiningStrategy},
    now_timestamp,
    peers::PeerRegistry,
    pool::PendingPool,
    pow::{self, Difficulty},
    sync::{self, ChainFetcher, MergeOutcome, MergePolicy, SyncReport},
    Block, BlockRecord, RemoteBlock, Transaction,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub difficulty: Difficulty,
    pub strategy: MiningStrategy,
    pub policy: MergePolicy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MineOutcome {
    Mined { index: u64, hash: String },
    /// The pending pool was empty.
    NothingToMine,
    /// No block was appended: either the tip moved between snapshot and
    /// append, or the proof search ran out of nonces. The pool is untouched.
    Rejected,
}

/// One ledger instance: the chain plus the transactions waiting for it.
#[derive(Clone, Debug)]
pub struct Ledger {
    chain: Chain,
    pool: PendingPool,
    config: LedgerConfig,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            chain: Chain::new(config.difficulty),
            pool: PendingPool::new(),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn pending(&self) -> &PendingPool {
        &self.pool
    }

    pub fn get_chain(&self) -> Vec<BlockRecord> {
        self.chain.records()
    }

    pub fn add_new_transaction(&mut self, tx: Transaction) {
        self.pool.push(tx);
    }

    /// The block `mine` would search a proof for, or None with an empty pool.
    pub fn prepare_candidate(&self) -> Option<Block> {
        if self.pool.is_empty() {
            return None;
        }
        let last = self.chain.last_block();
        Some(Block::new(
            last.index + 1,
            self.pool.snapshot(),
            now_timestamp(),
            last.hash().unwrap_or_default(),
        ))
    }

    /// Append a mined candidate. The pool is cleared only when the append succeeds.
    pub fn commit(&mut self, candidate: Block, proof: String) -> MineOutcome {
        let index = candidate.index;
        if self.chain.add_block(candidate, proof.clone()) {
            self.pool.clear();
            info!(index, hash = %proof, "mined block");
            MineOutcome::Mined { index, hash: proof }
        } else {
            warn!(index, "mined block no longer extends the tip");
            MineOutcome::Rejected
        }
    }

    /// Mine every pending transaction into one block. The search is unbounded.
    pub fn mine(&mut self) -> MineOutcome {
        let Some(mut candidate) = self.prepare_candidate() else {
            return MineOutcome::NothingToMine;
        };
        let difficulty = self.config.difficulty;
        let proof = match self.config.strategy {
            MiningStrategy::Sequential => pow::proof_of_work(&mut candidate, difficulty),
            MiningStrategy::Parallel => {
                match proof_of_work_parallel(&mut candidate, difficulty, &MiningLimits::unbounded()) {
                    Ok(proof) => proof,
                    Err(err) => {
                        warn!(error = %err, "parallel search gave up");
                        return MineOutcome::Rejected;
                    }
                }
            }
        };
        self.commit(candidate, proof)
    }

    /// Like [`Ledger::mine`] but escapable; an aborted search leaves the pool untouched.
    pub fn mine_with(&mut self, limits: &MiningLimits) -> Result<MineOutcome, LedgerError> {
        let Some(mut candidate) = self.prepare_candidate() else {
            return Ok(MineOutcome::NothingToMine);
        };
        let difficulty = self.config.difficulty;
        let proof = match self.config.strategy {
            MiningStrategy::Sequential => pow::proof_of_work_with(&mut candidate, difficulty, limits)?,
            MiningStrategy::Parallel => proof_of_work_parallel(&mut candidate, difficulty, limits)?,
        };
        Ok(self.commit(candidate, proof))
    }

    pub fn merge_remote_chain(&mut self, remote: Vec<RemoteBlock>) -> MergeOutcome {
        sync::merge_remote_chain(&mut self.chain, remote, self.config.policy)
    }

    pub fn sync_with_peers<F: ChainFetcher + ?Sized>(
        &mut self,
        peers: &PeerRegistry,
        fetcher: &F,
    ) -> SyncReport {
        sync::sync_with_peers(self, peers, fetcher)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}
