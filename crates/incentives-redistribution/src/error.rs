use crate::Phase;
use incentives_host::Role;
use incentives_postage::PostageError;
use incentives_types::{Address, BatchId, BlockHeight, ErrorKind, HasErrorKind, Overlay};
use thiserror::Error;

/// Reasons a claim proof bundle is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error("Chunk of {0} bytes exceeds the chunk size")]
    ChunkTooLarge(usize),

    #[error("Proof has {actual} siblings, expected {expected}")]
    WrongProofLength { expected: usize, actual: usize },

    #[error("Witness {witness} is outside the neighbourhood of the anchor")]
    WitnessOutOfDepth { witness: usize },

    #[error("Witness {witness} is not part of the revealed sample")]
    SampleMismatch { witness: usize },

    #[error("Witness {witness} original and transformed proofs disagree")]
    SiblingMismatch { witness: usize },

    #[error("Witness {witness} data does not hash to its chunk address")]
    ChunkMismatch { witness: usize },

    #[error("Witness {witness} transformed address does not match the sample")]
    TransformedMismatch { witness: usize },

    #[error("Witness transformed addresses are out of order")]
    OrderMismatch,

    #[error("Reserve estimate too small: last sample entry above the maximum")]
    ReserveTooSmall,

    #[error("Sample needs {required} chunks in the neighbourhood, found {found}")]
    InsufficientSample { required: usize, found: usize },

    #[error("Stamp batch {0} is unknown to the ledger")]
    UnknownBatch(BatchId),

    #[error("Stamp index {index} out of range for batch {batch_id}")]
    StampIndexOutOfRange { batch_id: BatchId, index: u64 },

    #[error("Stamp index {index} is for another bucket in batch {batch_id}")]
    BucketMismatch { batch_id: BatchId, index: u64 },

    #[error("Stamp for batch {0} not signed by the batch owner")]
    SignerNotOwner(BatchId),

    #[error("Stamp signer {0} is not a valid public key")]
    InvalidSigner(Address),

    #[error("Stamp signature invalid for batch {0}")]
    InvalidSignature(BatchId),
}

impl HasErrorKind for ProofError {
    fn kind(&self) -> ErrorKind {
        match self {
            ProofError::ChunkTooLarge(_) | ProofError::InsufficientSample { .. } => {
                ErrorKind::InvalidInput
            }
            _ => ErrorKind::ProofMismatch,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RedistributionError {
    #[error("Wrong phase: expected {expected}, currently {actual}")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error("Commits are closed in the last block of the commit phase")]
    CommitPhaseEnding,

    #[error("Not determined during the reveal phase")]
    UpcomingRoundUndetermined,

    #[error("Caller {caller} does not own overlay {overlay}")]
    NotOverlayOwner { overlay: Overlay, caller: Address },

    #[error("Overlay {0} has no usable stake")]
    NoStake(Overlay),

    #[error("Stake of overlay {overlay} updated at block {last_updated} is too recent")]
    StakeTooRecent {
        overlay: Overlay,
        last_updated: BlockHeight,
    },

    #[error("Overlay {0} already committed this round")]
    AlreadyCommitted(Overlay),

    #[error("No commits in round {0}")]
    NoCommits(u64),

    #[error("Reveal from overlay {0} matches no commit")]
    HashMismatch(Overlay),

    #[error("Overlay {0} already revealed this round")]
    AlreadyRevealed(Overlay),

    #[error("Overlay {overlay} is out of depth {depth} for this round's anchor")]
    OutOfDepth { overlay: Overlay, depth: u8 },

    #[error("No reveals in round {0}")]
    NoReveals(u64),

    #[error("Round {0} already claimed")]
    AlreadyClaimed(u64),

    #[error("Claim proof rejected: {0}")]
    Proof(#[from] ProofError),

    #[error("Pot withdrawal failed: {0}")]
    Withdraw(#[from] PostageError),

    #[error("Account {caller} lacks the {role} role")]
    Unauthorized { caller: Address, role: Role },

    #[error("Redistribution game is paused")]
    Paused,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl HasErrorKind for RedistributionError {
    fn kind(&self) -> ErrorKind {
        match self {
            RedistributionError::WrongPhase { .. }
            | RedistributionError::CommitPhaseEnding
            | RedistributionError::UpcomingRoundUndetermined => ErrorKind::WrongPhase,
            RedistributionError::NotOverlayOwner { .. }
            | RedistributionError::Unauthorized { .. } => ErrorKind::Unauthorized,
            RedistributionError::NoStake(_) => ErrorKind::InsufficientFunds,
            RedistributionError::StakeTooRecent { .. }
            | RedistributionError::InvalidConfiguration(_) => ErrorKind::InvalidInput,
            RedistributionError::AlreadyCommitted(_)
            | RedistributionError::AlreadyRevealed(_)
            | RedistributionError::AlreadyClaimed(_) => ErrorKind::AlreadyExists,
            RedistributionError::NoCommits(_) | RedistributionError::NoReveals(_) => {
                ErrorKind::NotFound
            }
            RedistributionError::HashMismatch(_) | RedistributionError::OutOfDepth { .. } => {
                ErrorKind::ProofMismatch
            }
            RedistributionError::Proof(e) => e.kind(),
            RedistributionError::Withdraw(e) => e.kind(),
            RedistributionError::Paused => ErrorKind::Paused,
        }
    }
}

pub type Result<T> = std::result::Result<T, RedistributionError>;
