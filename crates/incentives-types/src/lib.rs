pub mod amount;
pub mod error;
pub mod hash;
pub mod id;
pub mod proximity;

pub use amount::TokenAmount;
pub use error::{ErrorKind, HasErrorKind};
pub use hash::{compute_challenge, hash_parts, hash_to_u128, hash_to_u64, Hash, ZERO_HASH};
pub use id::{Address, BatchId, ChunkAddress, Overlay};
pub use proximity::{bucket_of, in_proximity, proximity, MAX_PROXIMITY};

/// Block height supplied by the host ledger
pub type BlockHeight = u64;

/// Per-chunk accrual unit shared by prices, normalised balances and the
/// cumulative outpayment.
pub type ChunkBalance = u128;
