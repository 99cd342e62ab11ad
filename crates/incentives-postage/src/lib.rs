//! Postage batch ledger
//!
//! Batches prepay storage for `2^depth` chunks. Every block each live chunk
//! owes the current price, tracked globally as the oracle's cumulative
//! outpayment. A batch's `normalised_balance` is the cumulative outpayment at
//! which it runs dry, so expiry is a walk from the smallest balance upwards,
//! and the value owed by expired and live chunks accumulates in the pot.

pub mod batch;
pub mod error;
pub mod index;
pub mod ledger;

pub use batch::{Batch, LedgerConfig, MAX_DEPTH};
pub use error::{PostageError, Result};
pub use index::BatchIndex;
pub use ledger::PostageLedger;
