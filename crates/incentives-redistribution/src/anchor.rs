use incentives_types::{hash_parts, Hash};
use serde::{Deserialize, Serialize};

/// Seed from which round anchors are derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedState {
    #[serde(with = "hex::serde")]
    pub seed: Hash,
    /// Round whose anchor is the seed itself
    pub seed_round: u64,
}

impl SeedState {
    pub fn new(seed: Hash, seed_round: u64) -> Self {
        Self { seed, seed_round }
    }

    /// Anchor of `round`: the seed for the seed round and any earlier round,
    /// `H(seed || rounds since seed round)` afterwards
    pub fn anchor_for(&self, round: u64) -> Hash {
        if round <= self.seed_round {
            return self.seed;
        }
        let offset = round - self.seed_round;
        hash_parts(&[&self.seed, &offset.to_be_bytes()])
    }
}

/// Round randomness: `H(anchor || XOR of H(nonce))`.
/// Independent of the order of `nonces`.
pub fn round_randomness<'a>(anchor: &Hash, nonces: impl IntoIterator<Item = &'a Hash>) -> Hash {
    let mut mix = [0u8; 32];
    for nonce in nonces {
        let digest = hash_parts(&[nonce]);
        for (m, d) in mix.iter_mut().zip(digest.iter()) {
            *m ^= d;
        }
    }
    hash_parts(&[anchor, &mix])
}
