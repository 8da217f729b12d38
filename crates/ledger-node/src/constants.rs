pub(crate) const CHAIN_PATH: &str = "/api/chain";
pub(crate) const DEFAULT_LISTEN: &str = "127.0.0.1:8000";
pub(crate) const DEFAULT_PEER_TIMEOUT_SECS: u64 = 5;
