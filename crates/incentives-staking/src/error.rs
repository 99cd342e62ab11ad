use incentives_host::{Role, TokenError};
use incentives_types::{Address, ErrorKind, HasErrorKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StakingError {
    #[error("Caller {caller} cannot deposit for owner {owner}")]
    CallerNotOwner { caller: Address, owner: Address },

    #[error("Account {caller} lacks the {role} role")]
    Unauthorized { caller: Address, role: Role },

    #[error("Stake deposit must be non-zero")]
    ZeroAmount,

    #[error("Stake amount overflow")]
    StakeOverflow,

    #[error("Stake transfer failed: {0}")]
    TransferFailed(#[from] TokenError),

    #[error("Stake registry is paused")]
    Paused,
}

impl HasErrorKind for StakingError {
    fn kind(&self) -> ErrorKind {
        match self {
            StakingError::CallerNotOwner { .. } | StakingError::Unauthorized { .. } => {
                ErrorKind::Unauthorized
            }
            StakingError::ZeroAmount | StakingError::StakeOverflow => ErrorKind::InvalidInput,
            StakingError::TransferFailed(e) => e.kind(),
            StakingError::Paused => ErrorKind::Paused,
        }
    }
}

pub type Result<T> = std::result::Result<T, StakingError>;
