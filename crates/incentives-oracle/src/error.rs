use incentives_host::Role;
use incentives_types::{Address, ErrorKind, HasErrorKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Account {caller} lacks the {role} role")]
    Unauthorized { caller: Address, role: Role },

    #[error("Invalid redundancy signal {0}")]
    InvalidSignal(u8),
}

impl HasErrorKind for OracleError {
    fn kind(&self) -> ErrorKind {
        match self {
            OracleError::Unauthorized { .. } => ErrorKind::Unauthorized,
            OracleError::InvalidSignal(_) => ErrorKind::InvalidInput,
        }
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;
