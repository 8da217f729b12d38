use crate::constants::{DEFAULT_LISTEN, DEFAULT_PEER_TIMEOUT_SECS};
use clap::Parser;
use ledger_core::{Difficulty, LedgerConfig, MergePolicy, MiningLimits, MiningStrategy};
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node")]
#[command(about = "Proof-of-work ledger node")]
pub struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8000
    #[arg(long, default_value = DEFAULT_LISTEN)]
    pub listen: String,

    /// Leading zero hex digits a block hash must carry
    #[arg(long, default_value_t = ledger_core::constants::DEFAULT_DIFFICULTY)]
    pub difficulty: u32,

    /// Search nonces on all cores
    #[arg(long)]
    pub parallel: bool,

    /// Give up a mine request after this many seconds
    #[arg(long)]
    pub mine_timeout_secs: Option<u64>,

    /// Only adopt longer peer chains whose reported hashes link up
    #[arg(long)]
    pub strict_sync: bool,

    /// HTTP timeout when fetching a peer's chain
    #[arg(long, default_value_t = DEFAULT_PEER_TIMEOUT_SECS)]
    pub peer_timeout_secs: u64,
}

/// Runtime settings shared by the request handlers.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub ledger: LedgerConfig,
    pub mine_timeout: Option<Duration>,
    pub peer_timeout: Duration,
}

impl NodeConfig {
    /// Fresh limits for one mine request.
    pub fn mining_limits(&self) -> MiningLimits {
        match self.mine_timeout {
            Some(timeout) => MiningLimits::unbounded().with_timeout(timeout),
            None => MiningLimits::unbounded(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            mine_timeout: None,
            peer_timeout: Duration::from_secs(DEFAULT_PEER_TIMEOUT_SECS),
        }
    }
}

impl From<&Args> for NodeConfig {
    fn from(args: &Args) -> Self {
        Self {
            ledger: LedgerConfig {
                difficulty: Difficulty::new(args.difficulty),
                strategy: if args.parallel {
                    MiningStrategy::Parallel
                } else {
                    MiningStrategy::Sequential
                },
                policy: if args.strict_sync {
                    MergePolicy::Validated
                } else {
                    MergePolicy::LongestChain
                },
            },
            mine_timeout: args.mine_timeout_secs.map(Duration::from_secs),
            peer_timeout: Duration::from_secs(args.peer_timeout_secs),
        }
    }
}
