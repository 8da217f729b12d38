pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
/// `previous_hash` carried by every genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";
/// Leading zero hex digits a proof must carry unless configured otherwise.
pub const DEFAULT_DIFFICULTY: u32 = 4;
/// Nonces handed to rayon per parallel search round.
pub const NONCE_BATCH: u64 = 1 << 14;
/// Sequential search consults the clock once per this many attempts.
pub const DEADLINE_CHECK_INTERVAL: u64 = 1 << 10;
