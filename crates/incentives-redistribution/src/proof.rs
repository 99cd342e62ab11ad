use crate::bmt::{address_from_proof, BRANCHES};
use crate::sample::{SAMPLE_SIZE, SAMPLE_SPAN};
use crate::{PostageStamp, ProofError};
use incentives_postage::Batch;
use incentives_types::{compute_challenge, hash_to_u64, in_proximity, BatchId, ChunkAddress, Hash};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Evidence that one sample entry is a stamped chunk held by the claimant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInclusionProof {
    /// Siblings of the witness address at segment `2i` of the sample chunk.
    /// The first sibling is the witness's transformed address.
    pub sample_proof: Vec<Hash>,
    /// Address of the witness chunk
    pub chunk_address: ChunkAddress,
    /// Data segment at the challenged segment index
    #[serde(with = "hex::serde")]
    pub data_segment: Hash,
    /// Siblings of the data segment in the witness chunk
    pub original_proof: Vec<Hash>,
    /// Siblings of the data segment in the anchor-transformed witness chunk
    pub transformed_proof: Vec<Hash>,
    pub chunk_span: u64,
    pub stamp: PostageStamp,
}

impl ChunkInclusionProof {
    /// Transformed address as recorded in the sample
    pub fn transformed_address(&self) -> Option<&Hash> {
        self.sample_proof.first()
    }
}

/// Proofs for the three witness entries of a sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimProofs {
    pub first: ChunkInclusionProof,
    pub second: ChunkInclusionProof,
    pub last: ChunkInclusionProof,
}

impl ClaimProofs {
    pub fn batch_ids(&self) -> [BatchId; 3] {
        [
            self.first.stamp.batch_id,
            self.second.stamp.batch_id,
            self.last.stamp.batch_id,
        ]
    }
}

/// Sample positions challenged in a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WitnessIndices {
    pub first: usize,
    pub second: usize,
    pub last: usize,
}

impl WitnessIndices {
    /// Two distinct positions among the first fifteen entries, plus the
    /// last entry
    pub fn from_randomness(randomness: &Hash) -> Self {
        let draw = hash_to_u64(&compute_challenge(randomness, "witness", &[]));
        let first = (draw % (SAMPLE_SIZE as u64 - 1)) as usize;
        let mut second = (draw % (SAMPLE_SIZE as u64 - 2)) as usize;
        if second >= first {
            second += 1;
        }
        Self {
            first,
            second,
            last: SAMPLE_SIZE - 1,
        }
    }
}

/// Data segment challenged in every witness chunk this round
pub fn segment_index(randomness: &Hash) -> usize {
    let draw = hash_to_u64(&compute_challenge(randomness, "segment", &[]));
    (draw % BRANCHES as u64) as usize
}

/// Round facts a claim is checked against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimContext {
    pub randomness: Hash,
    /// Anchor fixed at the round's first reveal
    pub anchor: Hash,
    /// Revealed hash of the winner (the sample chunk address)
    pub sample_hash: Hash,
    pub depth: u8,
    /// Transformed addresses at or above this bound mean the reserve was
    /// estimated too small
    pub sample_max_value: Hash,
}

/// Verify the three witness proofs of a claim.
///
/// `batches` must hold every batch referenced by the stamps; missing ones
/// are reported as unknown.
pub fn verify_claim_proofs(
    ctx: &ClaimContext,
    proofs: &ClaimProofs,
    batches: &HashMap<BatchId, Batch>,
) -> Result<(), ProofError> {
    let indices = WitnessIndices::from_randomness(&ctx.randomness);
    let segment = segment_index(&ctx.randomness);

    let witnesses = [
        (indices.first, &proofs.first),
        (indices.second, &proofs.second),
        (indices.last, &proofs.last),
    ];
    for (witness, (sample_index, proof)) in witnesses.iter().enumerate() {
        verify_inclusion(ctx, witness, *sample_index, segment, proof)?;

        let batch = batches
            .get(&proof.stamp.batch_id)
            .ok_or(ProofError::UnknownBatch(proof.stamp.batch_id))?;
        proof.stamp.verify_for_batch(&proof.chunk_address, batch)?;
    }

    let transformed = |proof: &ChunkInclusionProof| {
        proof
            .transformed_address()
            .copied()
            .ok_or(ProofError::WrongProofLength {
                expected: crate::bmt::PROOF_LENGTH,
                actual: 0,
            })
    };
    let first = transformed(&proofs.first)?;
    let second = transformed(&proofs.second)?;
    let last = transformed(&proofs.last)?;

    let ordered = if indices.first < indices.second {
        first < second && second < last
    } else {
        second < first && first < last
    };
    if !ordered {
        return Err(ProofError::OrderMismatch);
    }

    if last >= ctx.sample_max_value {
        return Err(ProofError::ReserveTooSmall);
    }

    Ok(())
}

fn verify_inclusion(
    ctx: &ClaimContext,
    witness: usize,
    sample_index: usize,
    segment: usize,
    proof: &ChunkInclusionProof,
) -> Result<(), ProofError> {
    if !in_proximity(proof.chunk_address.as_bytes(), &ctx.anchor, ctx.depth) {
        return Err(ProofError::WitnessOutOfDepth { witness });
    }

    let sample_address = address_from_proof(
        proof.chunk_address.as_bytes(),
        2 * sample_index,
        &proof.sample_proof,
        SAMPLE_SPAN,
        None,
    )?;
    if sample_address.as_bytes() != &ctx.sample_hash {
        return Err(ProofError::SampleMismatch { witness });
    }

    let original = address_from_proof(
        &proof.data_segment,
        segment,
        &proof.original_proof,
        proof.chunk_span,
        None,
    )?;
    if original != proof.chunk_address {
        return Err(ProofError::ChunkMismatch { witness });
    }

    let transformed = address_from_proof(
        &proof.data_segment,
        segment,
        &proof.transformed_proof,
        proof.chunk_span,
        Some(&ctx.anchor),
    )?;
    if Some(transformed.as_bytes()) != proof.transformed_address() {
        return Err(ProofError::TransformedMismatch { witness });
    }

    if proof.original_proof.first() != proof.transformed_proof.first() {
        return Err(ProofError::SiblingMismatch { witness });
    }

    Ok(())
}
