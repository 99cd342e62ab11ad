pub mod error;
pub mod policy;
pub mod registry;

pub use error::{Result, StakingError};
pub use policy::{FullStake, UsableStakePolicy};
pub use registry::{StakeRecord, StakeRegistry, StakingConfig};
