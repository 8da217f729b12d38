use crate::{
    constants::GENESIS_PREVIOUS_HASH,
    error::ChainViolation,
    now_timestamp,
    pow::{self, Difficulty},
    Block, BlockRecord,
};
use tracing::debug;

/// Append-only sequence of blocks rooted at a genesis block.
#[derive(Clone, Debug)]
pub struct Chain {
    blocks: Vec<Block>,
    difficulty: Difficulty,
}

/// Index 0, no transactions, sentinel parent, hash computed directly (no proof).
pub fn genesis_block() -> Block {
    let mut genesis = Block::new(0, vec![], now_timestamp(), GENESIS_PREVIOUS_HASH);
    let hash = genesis.compute_hash();
    genesis.seal(hash);
    genesis
}

impl Chain {
    pub fn new(difficulty: Difficulty) -> Self {
        let mut chain = Self {
            blocks: Vec::new(),
            difficulty,
        };
        chain.create_genesis_block();
        chain
    }

    fn create_genesis_block(&mut self) {
        self.blocks.push(genesis_block());
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn last_block(&self) -> &Block {
        self.blocks
            .last()
            .expect("a chain always holds its genesis block")
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn records(&self) -> Vec<BlockRecord> {
        self.blocks.iter().map(Block::to_record).collect()
    }

    pub fn is_valid_proof(&self, block: &Block, proof: &str) -> bool {
        pow::is_valid_proof(block, proof, self.difficulty)
    }

    /// Append `block` sealed with `proof`. Returns false and leaves the chain
    /// untouched when the block does not extend the tip or the proof is invalid.
    pub fn add_block(&mut self, mut block: Block, proof: String) -> bool {
        if self.last_block().hash() != Some(block.previous_hash.as_str()) {
            debug!(index = block.index, "rejected block: previous hash mismatch");
            return false;
        }
        if !self.is_valid_proof(&block, &proof) {
            debug!(index = block.index, "rejected block: invalid proof");
            return false;
        }
        block.seal(proof);
        self.blocks.push(block);
        true
    }

    /// Wholesale replacement used by sync merge. Callers guarantee `blocks`
    /// is non-empty.
    pub(crate) fn replace(&mut self, blocks: Vec<Block>) {
        debug_assert!(!blocks.is_empty());
        self.blocks = blocks;
    }

    /// Re-check linkage, hash integrity and difficulty across the whole chain.
    pub fn verify(&self) -> Result<(), ChainViolation> {
        let mut parent: Option<&Block> = None;
        for (position, block) in self.blocks.iter().enumerate() {
            if block.index != position as u64 {
                return Err(ChainViolation::IndexGap {
                    position,
                    index: block.index,
                });
            }
            let Some(hash) = block.hash() else {
                return Err(ChainViolation::Unsealed { index: block.index });
            };
            let expected_parent = parent
                .and_then(Block::hash)
                .unwrap_or(GENESIS_PREVIOUS_HASH);
            if block.previous_hash != expected_parent {
                return Err(ChainViolation::BrokenLink { index: block.index });
            }
            if hash != block.compute_hash() {
                return Err(ChainViolation::HashMismatch { index: block.index });
            }
            if parent.is_some() && !self.difficulty.is_met_by(hash) {
                return Err(ChainViolation::InsufficientWork { index: block.index });
            }
            parent = Some(block);
        }
        Ok(())
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new(Difficulty::default())
    }
}
