use crate::bmt::Bmt;
use crate::proof::{segment_index, ChunkInclusionProof, ClaimProofs, WitnessIndices};
use crate::{PostageStamp, ProofError};
use incentives_types::{in_proximity, ChunkAddress, Hash};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Entries in a reserve sample
pub const SAMPLE_SIZE: usize = 16;

/// Byte length of the sample chunk: an address and a transformed address
/// per entry
pub const SAMPLE_SPAN: u64 = (SAMPLE_SIZE * 64) as u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampedChunk {
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
    pub stamp: PostageStamp,
}

impl StampedChunk {
    pub fn address(&self) -> Result<ChunkAddress, ProofError> {
        Ok(Bmt::new(&self.data)?.address())
    }
}

#[derive(Debug, Clone)]
pub struct SampleEntry {
    pub address: ChunkAddress,
    pub transformed: Hash,
    pub chunk: StampedChunk,
}

/// The sixteen reserve chunks with the smallest anchor-transformed
/// addresses among those within `depth` of the anchor.
///
/// Its chunk address is the hash a node reveals, and it produces the
/// proofs needed to claim with that hash.
pub struct ReserveSample {
    anchor: Hash,
    depth: u8,
    entries: Vec<SampleEntry>,
    tree: Bmt,
}

impl ReserveSample {
    pub fn build(chunks: &[StampedChunk], anchor: &Hash, depth: u8) -> Result<Self, ProofError> {
        let mut entries = Vec::new();
        for chunk in chunks {
            let address = chunk.address()?;
            if !in_proximity(address.as_bytes(), anchor, depth) {
                continue;
            }
            let transformed = Bmt::transformed(&chunk.data, anchor)?.address().to_bytes();
            entries.push(SampleEntry {
                address,
                transformed,
                chunk: chunk.clone(),
            });
        }

        if entries.len() < SAMPLE_SIZE {
            return Err(ProofError::InsufficientSample {
                required: SAMPLE_SIZE,
                found: entries.len(),
            });
        }

        entries.sort_by(|a, b| a.transformed.cmp(&b.transformed));
        entries.dedup_by(|a, b| a.address == b.address);
        if entries.len() < SAMPLE_SIZE {
            return Err(ProofError::InsufficientSample {
                required: SAMPLE_SIZE,
                found: entries.len(),
            });
        }
        entries.truncate(SAMPLE_SIZE);

        let mut data = Vec::with_capacity(SAMPLE_SPAN as usize);
        for entry in &entries {
            data.extend_from_slice(entry.address.as_bytes());
            data.extend_from_slice(&entry.transformed);
        }
        let tree = Bmt::new(&data)?;

        debug!(
            candidates = chunks.len(),
            depth,
            sample = %hex::encode(&tree.address().as_bytes()[..4]),
            "Reserve sample built"
        );

        Ok(Self {
            anchor: *anchor,
            depth,
            entries,
            tree,
        })
    }

    /// Reserve commitment revealed for this sample
    pub fn hash(&self) -> Hash {
        self.tree.address().to_bytes()
    }

    pub fn anchor(&self) -> &Hash {
        &self.anchor
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn entries(&self) -> &[SampleEntry] {
        &self.entries
    }

    /// Proofs for the witnesses `randomness` selects
    pub fn claim_proofs(&self, randomness: &Hash) -> Result<ClaimProofs, ProofError> {
        let indices = WitnessIndices::from_randomness(randomness);
        let segment = segment_index(randomness);

        Ok(ClaimProofs {
            first: self.inclusion_proof(indices.first, segment)?,
            second: self.inclusion_proof(indices.second, segment)?,
            last: self.inclusion_proof(indices.last, segment)?,
        })
    }

    fn inclusion_proof(&self, index: usize, segment: usize) -> Result<ChunkInclusionProof, ProofError> {
        let entry = &self.entries[index];
        let original = Bmt::new(&entry.chunk.data)?;
        let transformed = Bmt::transformed(&entry.chunk.data, &self.anchor)?;

        Ok(ChunkInclusionProof {
            sample_proof: self.tree.proof(2 * index),
            chunk_address: entry.address,
            data_segment: original.segment(segment),
            original_proof: original.proof(segment),
            transformed_proof: transformed.proof(segment),
            chunk_span: original.span(),
            stamp: entry.chunk.stamp.clone(),
        })
    }
}
