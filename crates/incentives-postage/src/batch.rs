use incentives_types::{hash_parts, Address, ChunkBalance};
use serde::{Deserialize, Serialize};

/// Deepest batch the ledger accounts for. `2^depth` chunks times any
/// per-chunk balance below `2^64` stays within `u128`.
pub const MAX_DEPTH: u8 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub owner: Address,
    pub depth: u8,
    pub bucket_depth: u8,
    pub immutable: bool,
    /// Cumulative outpayment at which the batch runs out
    pub normalised_balance: ChunkBalance,
}

impl Batch {
    /// Number of chunks the batch may stamp
    pub fn capacity(&self) -> u128 {
        1u128 << self.depth
    }

    /// Stamps allowed per bucket
    pub fn bucket_capacity(&self) -> u64 {
        1u64 << (self.depth - self.bucket_depth).min(63)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Account holding batch payments until they are paid out
    pub escrow_account: Address,
    pub minimum_bucket_depth: u8,
    /// Blocks a fresh batch must at least cover at the current price
    pub minimum_validity_blocks: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            escrow_account: Address::from_bytes(hash_parts(&[b"incentives/postage-escrow"])),
            minimum_bucket_depth: 1,
            minimum_validity_blocks: 0,
        }
    }
}
