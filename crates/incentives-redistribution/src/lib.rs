//! Stake-weighted commit-reveal lottery over storage proofs
//!
//! Each round splits into three phases of block height:
//!
//! - **Commit**: staked overlays publish an obfuscated reserve commitment
//! - **Reveal**: overlays open their commitments; the round anchor is fixed
//! - **Claim**: the round randomness picks a truth and a winner, and the
//!   claimant proves the winning sample against that randomness
//!
//! Verification of the claim proofs lives in [`proof`] and is free of state.
//! [`sample`] builds the same proofs from a node's stamped chunks.

pub mod anchor;
pub mod bmt;
pub mod error;
pub mod game;
pub mod proof;
pub mod round;
pub mod sample;
pub mod selection;
pub mod stamp;

pub use anchor::{round_randomness, SeedState};
pub use bmt::Bmt;
pub use error::{ProofError, RedistributionError, Result};
pub use game::{wrap_commit, ClaimOutcome, Commit, GameConfig, RedistributionGame, Reveal};
pub use proof::{
    segment_index, verify_claim_proofs, ChunkInclusionProof, ClaimContext, ClaimProofs,
    WitnessIndices,
};
pub use round::{Phase, PhaseSchedule};
pub use sample::{ReserveSample, SampleEntry, StampedChunk, SAMPLE_SIZE, SAMPLE_SPAN};
pub use selection::select_weighted;
pub use stamp::PostageStamp;
