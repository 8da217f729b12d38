use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),
    #[error("missing peer name or url")]
    MissingPeerField,
    #[error("mining aborted: {0}")]
    MiningAborted(String),
}

/// Failure to obtain a chain snapshot from a peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("peer answered with status {0}")]
    Status(u16),
    #[error("peer unreachable: {0}")]
    Unreachable(String),
    #[error("malformed chain payload: {0}")]
    Payload(String),
}

/// First inconsistency found by `Chain::verify`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainViolation {
    #[error("block {index} is not sealed with a hash")]
    Unsealed { index: u64 },
    #[error("block at position {position} carries index {index}")]
    IndexGap { position: usize, index: u64 },
    #[error("block {index} does not link to its parent")]
    BrokenLink { index: u64 },
    #[error("block {index} hash does not match its contents")]
    HashMismatch { index: u64 },
    #[error("block {index} hash lacks the difficulty prefix")]
    InsufficientWork { index: u64 },
}
