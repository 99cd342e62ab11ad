use incentives_types::BlockHeight;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Commit,
    Reveal,
    Claim,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Commit => write!(f, "commit"),
            Phase::Reveal => write!(f, "reveal"),
            Phase::Claim => write!(f, "claim"),
        }
    }
}

/// Maps block heights to rounds and phases.
///
/// Commit covers `[0, phase_length)` of a round, reveal
/// `[phase_length, 2 * phase_length)` and claim the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSchedule {
    phase_length: u64,
    round_length: u64,
}

impl PhaseSchedule {
    pub const DEFAULT_PHASE_LENGTH: u64 = 38;
    pub const DEFAULT_ROUND_LENGTH: u64 = 152;

    /// `None` unless `phase_length >= 2` and the claim phase is non-empty
    pub fn new(phase_length: u64, round_length: u64) -> Option<Self> {
        if phase_length < 2 || round_length <= phase_length.saturating_mul(2) {
            return None;
        }
        Some(Self {
            phase_length,
            round_length,
        })
    }

    pub fn phase_length(&self) -> u64 {
        self.phase_length
    }

    pub fn round_length(&self) -> u64 {
        self.round_length
    }

    pub fn round_of(&self, block: BlockHeight) -> u64 {
        block / self.round_length
    }

    pub fn phase_of(&self, block: BlockHeight) -> Phase {
        let offset = block % self.round_length;
        if offset < self.phase_length {
            Phase::Commit
        } else if offset < 2 * self.phase_length {
            Phase::Reveal
        } else {
            Phase::Claim
        }
    }

    /// Commits landing here could not be revealed in time by a node that
    /// only reacts to the next block
    pub fn is_last_commit_block(&self, block: BlockHeight) -> bool {
        block % self.round_length == self.phase_length - 1
    }

    /// First block of `phase` in `round`
    pub fn phase_start(&self, round: u64, phase: Phase) -> BlockHeight {
        let start = round * self.round_length;
        match phase {
            Phase::Commit => start,
            Phase::Reveal => start + self.phase_length,
            Phase::Claim => start + 2 * self.phase_length,
        }
    }
}

impl Default for PhaseSchedule {
    fn default() -> Self {
        Self {
            phase_length: Self::DEFAULT_PHASE_LENGTH,
            round_length: Self::DEFAULT_ROUND_LENGTH,
        }
    }
}
