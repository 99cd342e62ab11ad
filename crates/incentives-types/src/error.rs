use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes shared by every component.
///
/// Component errors keep their own detailed variants and report one of these
/// through [`HasErrorKind`], so callers can react to a class of failure
/// without matching every crate's enum.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid input")]
    InvalidInput,

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("expired")]
    Expired,

    #[error("wrong phase")]
    WrongPhase,

    #[error("proof mismatch")]
    ProofMismatch,

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("paused")]
    Paused,
}

pub trait HasErrorKind {
    fn kind(&self) -> ErrorKind;
}
