pub mod chain;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod mine;
pub mod peers;
pub mod pool;
pub mod sync;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub use chain::Chain;
pub use error::{ChainViolation, FetchError, LedgerError};
pub use ledger::{Ledger, LedgerConfig, MineOutcome};
pub use mine::{CancelToken, MiningLimits, MiningStrategy};
pub use peers::{Peer, PeerRegistry};
pub use pool::PendingPool;
pub use pow::Difficulty;
pub use sync::{
    fetch_peer_chains, merge_fetched, ChainFetcher, FetchedChains, MergeOutcome, MergePolicy,
    PeerOutcome, SyncReport,
};

/// Seconds since the Unix epoch with sub-second precision.
pub fn now_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// A value transfer. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    sender: String,
    recipient: String,
    amount: i64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: i64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }
}

/// Raw submission body as handed over by a request layer.
///
/// Every field is optional so that a missing field surfaces as
/// [`LedgerError::MalformedTransaction`] rather than a decoder error. The
/// amount may arrive as a JSON integer, an integral float or a numeric string.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TransactionRequest {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub amount: Option<AmountField>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    Int(i64),
    Float(f64),
    Text(String),
}

impl AmountField {
    fn to_amount(&self) -> Result<i64, LedgerError> {
        match self {
            AmountField::Int(v) => Ok(*v),
            AmountField::Float(v) if !v.is_finite() || v.fract() != 0.0 => Err(
                LedgerError::MalformedTransaction(format!("amount {v} is not an integer")),
            ),
            // `i64::MAX as f64` rounds up to 2^63, which is already out of range.
            AmountField::Float(v) if *v < i64::MIN as f64 || *v >= i64::MAX as f64 => Err(
                LedgerError::MalformedTransaction(format!("amount {v} is out of range")),
            ),
            AmountField::Float(v) => Ok(*v as i64),
            AmountField::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                LedgerError::MalformedTransaction(format!("amount {s:?} is not an integer"))
            }),
        }
    }
}

impl TransactionRequest {
    pub fn into_transaction(self) -> Result<Transaction, LedgerError> {
        let sender = self.sender.ok_or_else(|| missing("sender"))?;
        let recipient = self.recipient.ok_or_else(|| missing("recipient"))?;
        let amount = self.amount.ok_or_else(|| missing("amount"))?.to_amount()?;
        Ok(Transaction::new(sender, recipient, amount))
    }
}

fn missing(field: &str) -> LedgerError {
    LedgerError::MalformedTransaction(format!("missing field `{field}`"))
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub timestamp: f64,
    pub previous_hash: String,
    pub nonce: u64,
    hash: Option<String>,
}

/// Canonical hashing document. Keys are declared in sorted order so the
/// serialized form does not depend on map ordering.
#[derive(Serialize)]
struct HashPreimage<'a> {
    index: u64,
    nonce: u64,
    previous_hash: &'a str,
    timestamp: f64,
    transactions: Vec<TxPreimage<'a>>,
}

#[derive(Serialize)]
struct TxPreimage<'a> {
    amount: i64,
    recipient: &'a str,
    sender: &'a str,
}

impl Block {
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        timestamp: f64,
        previous_hash: impl Into<String>,
    ) -> Self {
        Self {
            index,
            transactions,
            timestamp,
            previous_hash: previous_hash.into(),
            nonce: 0,
            hash: None,
        }
    }

    /// The sealed hash, absent until the block joins a chain.
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    pub(crate) fn seal(&mut self, hash: String) {
        self.hash = Some(hash);
    }

    pub fn compute_hash(&self) -> String {
        self.compute_hash_with_nonce(self.nonce)
    }

    /// Hash of this block as if its nonce were `nonce`.
    pub fn compute_hash_with_nonce(&self, nonce: u64) -> String {
        let preimage = HashPreimage {
            index: self.index,
            nonce,
            previous_hash: &self.previous_hash,
            timestamp: self.timestamp,
            transactions: self
                .transactions
                .iter()
                .map(|tx| TxPreimage {
                    amount: tx.amount,
                    recipient: &tx.recipient,
                    sender: &tx.sender,
                })
                .collect(),
        };
        let mut hasher = Sha256::new();
        serde_json::to_writer(&mut hasher, &preimage).expect("hashing writer never fails");
        hex::encode(hasher.finalize())
    }

    pub fn to_record(&self) -> BlockRecord {
        BlockRecord {
            index: self.index,
            timestamp: self.timestamp,
            previous_hash: self.previous_hash.clone(),
            hash: self.hash.clone(),
            transactions: self.transactions.clone(),
        }
    }
}

/// Block as reported by `get_chain`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub index: u64,
    pub timestamp: f64,
    pub previous_hash: String,
    pub hash: Option<String>,
    pub transactions: Vec<Transaction>,
}

/// Block as consumed by sync. Nonce never travels; a reported `hash` is
/// kept only for the validated merge policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemoteBlock {
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub timestamp: f64,
    pub previous_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl RemoteBlock {
    /// Rebuild a local block (nonce 0) and seal it with a freshly computed hash.
    pub fn into_block(self) -> Block {
        let mut block = Block::new(self.index, self.transactions, self.timestamp, self.previous_hash);
        let hash = block.compute_hash();
        block.seal(hash);
        block
    }
}

impl From<BlockRecord> for RemoteBlock {
    fn from(record: BlockRecord) -> Self {
        Self {
            index: record.index,
            transactions: record.transactions,
            timestamp: record.timestamp,
            previous_hash: record.previous_hash,
            hash: record.hash,
        }
    }
}

pub mod pow {
    use super::Block;
    use crate::constants::{DEFAULT_DIFFICULTY, HASH_HEX_SIZE};
    use crate::error::LedgerError;
    use crate::mine::MiningLimits;
    use serde::{Deserialize, Serialize};

    /// Number of leading zero hex digits a proof must carry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Difficulty(u32);

    impl Difficulty {
        /// Clamped to the digest length.
        pub fn new(zeros: u32) -> Self {
            Self(zeros.min(HASH_HEX_SIZE as u32))
        }

        pub fn zeros(self) -> u32 {
            self.0
        }

        pub fn prefix(self) -> String {
            "0".repeat(self.0 as usize)
        }

        pub fn is_met_by(self, hash: &str) -> bool {
            count_leading_zero_digits(hash) >= self.0
        }
    }

    impl Default for Difficulty {
        fn default() -> Self {
            Self(DEFAULT_DIFFICULTY)
        }
    }

    pub fn count_leading_zero_digits(hash: &str) -> u32 {
        hash.bytes().take_while(|b| *b == b'0').count() as u32
    }

    /// A candidate is a proof for `block` only if it carries the prefix and
    /// is the hash of the block's current contents.
    pub fn is_valid_proof(block: &Block, candidate: &str, difficulty: Difficulty) -> bool {
        difficulty.is_met_by(candidate) && candidate == block.compute_hash()
    }

    /// Reset the nonce and increment it until the block hash meets `difficulty`.
    /// Unbounded.
    pub fn proof_of_work(block: &mut Block, difficulty: Difficulty) -> String {
        block.nonce = 0;
        let mut hash = block.compute_hash();
        while !difficulty.is_met_by(&hash) {
            block.nonce = block.nonce.wrapping_add(1);
            hash = block.compute_hash();
        }
        hash
    }

    /// Same search as [`proof_of_work`], stopping early once `limits` say so.
    pub fn proof_of_work_with(
        block: &mut Block,
        difficulty: Difficulty,
        limits: &MiningLimits,
    ) -> Result<String, LedgerError> {
        block.nonce = 0;
        let mut attempts = 0u64;
        loop {
            limits.check(attempts)?;
            let hash = block.compute_hash();
            if difficulty.is_met_by(&hash) {
                return Ok(hash);
            }
            attempts += 1;
            block.nonce = block.nonce.wrapping_add(1);
        }
    }
}
