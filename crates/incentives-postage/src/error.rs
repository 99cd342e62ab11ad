use incentives_host::{Role, TokenError};
use incentives_types::{Address, BatchId, ChunkBalance, ErrorKind, HasErrorKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PostageError {
    #[error("Batch owner must not be the zero address")]
    InvalidOwner,

    #[error("Invalid bucket depth {bucket_depth} for depth {depth}")]
    InvalidBucketDepth { depth: u8, bucket_depth: u8 },

    #[error("Depth {0} exceeds the accounting width")]
    InvalidDepth(u8),

    #[error("Batch {0} already exists")]
    BatchExists(BatchId),

    #[error("Balance per chunk must be non-zero")]
    ZeroBalance,

    #[error("Balance per chunk {provided} below required {required}")]
    InsufficientBalance {
        required: ChunkBalance,
        provided: ChunkBalance,
    },

    #[error("Amount overflow")]
    AmountOverflow,

    #[error("Batch payment failed: {0}")]
    TransferFailed(#[from] TokenError),

    #[error("Batch {0} not found")]
    BatchNotFound(BatchId),

    #[error("Batch {0} has expired")]
    BatchExpired(BatchId),

    #[error("Account {caller} does not own batch {batch_id}")]
    NotOwner { batch_id: BatchId, caller: Address },

    #[error("Batch {0} is immutable")]
    Immutable(BatchId),

    #[error("Depth must increase: current {current}, requested {requested}")]
    DepthNotIncreasing { current: u8, requested: u8 },

    #[error("Account {caller} lacks the {role} role")]
    Unauthorized { caller: Address, role: Role },

    #[error("Postage ledger is paused")]
    Paused,
}

impl HasErrorKind for PostageError {
    fn kind(&self) -> ErrorKind {
        match self {
            PostageError::InvalidOwner
            | PostageError::InvalidBucketDepth { .. }
            | PostageError::InvalidDepth(_)
            | PostageError::ZeroBalance
            | PostageError::AmountOverflow
            | PostageError::Immutable(_)
            | PostageError::DepthNotIncreasing { .. } => ErrorKind::InvalidInput,
            PostageError::BatchExists(_) => ErrorKind::AlreadyExists,
            PostageError::InsufficientBalance { .. } => ErrorKind::InsufficientFunds,
            PostageError::TransferFailed(e) => e.kind(),
            PostageError::BatchNotFound(_) => ErrorKind::NotFound,
            PostageError::BatchExpired(_) => ErrorKind::Expired,
            PostageError::NotOwner { .. } | PostageError::Unauthorized { .. } => {
                ErrorKind::Unauthorized
            }
            PostageError::Paused => ErrorKind::Paused,
        }
    }
}

pub type Result<T> = std::result::Result<T, PostageError>;
