//! Host ledger collaborators consumed by the incentive components.
//!
//! The components never own time, token balances or role storage. They reach
//! them through the traits defined here:
//!
//! - [`BlockClock`]: monotonically increasing block height
//! - [`TokenLedger`]: fungible token debits and credits
//! - [`AccessControl`]: boolean role checks
//! - [`EventBus`]: observations for external indexers
//!
//! Each trait has an in-memory implementation used by tests and the simulator.

pub mod access;
pub mod clock;
pub mod events;
pub mod token;

pub use access::{AccessControl, Role, RoleRegistry};
pub use clock::{BlockClock, ManualClock};
pub use events::{EventBus, IncentiveEvent};
pub use token::{MemoryToken, TokenError, TokenLedger};
