//! Binary Merkle tree over a chunk's 32-byte segments.
//!
//! A chunk holds up to 4096 bytes, zero padded to 128 segments. Leaves are
//! the raw segments, inner nodes `H(left || right)`, and the chunk address
//! is `H(span || root)` with the span as 8 little-endian bytes.
//!
//! The anchor-transformed variant prefixes every inner node and the address
//! hash with the round anchor, giving each round an unpredictable ordering
//! of the same content.

use crate::ProofError;
use incentives_types::{hash_parts, ChunkAddress, Hash};

pub const SEGMENT_SIZE: usize = 32;
pub const BRANCHES: usize = 128;
pub const CHUNK_SIZE: usize = SEGMENT_SIZE * BRANCHES;
/// Siblings from a leaf to the root
pub const PROOF_LENGTH: usize = 7;

pub struct Bmt {
    /// `levels[0]` are the leaves, the last level holds the root
    levels: Vec<Vec<Hash>>,
    span: u64,
    prefix: Option<Hash>,
}

impl Bmt {
    pub fn new(data: &[u8]) -> Result<Self, ProofError> {
        Self::build(data, None)
    }

    /// Tree hashed with `anchor` in front of every node
    pub fn transformed(data: &[u8], anchor: &Hash) -> Result<Self, ProofError> {
        Self::build(data, Some(*anchor))
    }

    fn build(data: &[u8], prefix: Option<Hash>) -> Result<Self, ProofError> {
        if data.len() > CHUNK_SIZE {
            return Err(ProofError::ChunkTooLarge(data.len()));
        }

        let mut leaves = vec![[0u8; SEGMENT_SIZE]; BRANCHES];
        for (leaf, segment) in leaves.iter_mut().zip(data.chunks(SEGMENT_SIZE)) {
            leaf[..segment.len()].copy_from_slice(segment);
        }

        let mut levels = vec![leaves];
        while levels.last().map(|l| l.len()).unwrap_or(1) > 1 {
            let below = &levels[levels.len() - 1];
            let above = below
                .chunks(2)
                .map(|pair| node_hash(prefix.as_ref(), &pair[0], &pair[1]))
                .collect();
            levels.push(above);
        }

        Ok(Self {
            levels,
            span: data.len() as u64,
            prefix,
        })
    }

    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|l| l.first())
            .copied()
            .unwrap_or([0u8; 32])
    }

    pub fn span(&self) -> u64 {
        self.span
    }

    pub fn address(&self) -> ChunkAddress {
        chunk_address(self.prefix.as_ref(), self.span, &self.root())
    }

    pub fn segment(&self, index: usize) -> Hash {
        self.levels[0][index % BRANCHES]
    }

    /// Siblings of segment `index`, leaf level first
    pub fn proof(&self, index: usize) -> Vec<Hash> {
        let mut position = index % BRANCHES;
        let mut siblings = Vec::with_capacity(PROOF_LENGTH);
        for level in &self.levels[..self.levels.len() - 1] {
            siblings.push(level[position ^ 1]);
            position /= 2;
        }
        siblings
    }
}

fn node_hash(prefix: Option<&Hash>, left: &Hash, right: &Hash) -> Hash {
    match prefix {
        Some(p) => hash_parts(&[p, left, right]),
        None => hash_parts(&[left, right]),
    }
}

fn chunk_address(prefix: Option<&Hash>, span: u64, root: &Hash) -> ChunkAddress {
    let span = span.to_le_bytes();
    let digest = match prefix {
        Some(p) => hash_parts(&[p, &span, root]),
        None => hash_parts(&[&span, root]),
    };
    ChunkAddress::from_bytes(digest)
}

/// Root implied by `segment` at `index` and its siblings
pub fn root_from_proof(
    segment: &Hash,
    index: usize,
    siblings: &[Hash],
    prefix: Option<&Hash>,
) -> Result<Hash, ProofError> {
    if siblings.len() != PROOF_LENGTH {
        return Err(ProofError::WrongProofLength {
            expected: PROOF_LENGTH,
            actual: siblings.len(),
        });
    }

    let mut current = *segment;
    let mut position = index % BRANCHES;
    for sibling in siblings {
        current = if position % 2 == 0 {
            node_hash(prefix, &current, sibling)
        } else {
            node_hash(prefix, sibling, &current)
        };
        position /= 2;
    }
    Ok(current)
}

/// Chunk address implied by `segment` at `index`, its siblings and the span
pub fn address_from_proof(
    segment: &Hash,
    index: usize,
    siblings: &[Hash],
    span: u64,
    prefix: Option<&Hash>,
) -> Result<ChunkAddress, ProofError> {
    let root = root_from_proof(segment, index, siblings, prefix)?;
    Ok(chunk_address(prefix, span, &root))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 251) as u8).collect()
    }

    #[test]
    fn test_proof_reconstructs_address() {
        let bytes = data(1000);
        let tree = Bmt::new(&bytes).unwrap();

        for index in [0usize, 1, 31, 64, 127] {
            let proof = tree.proof(index);
            assert_eq!(proof.len(), PROOF_LENGTH);
            let address =
                address_from_proof(&tree.segment(index), index, &proof, 1000, None).unwrap();
            assert_eq!(address, tree.address());
        }
    }

    #[test]
    fn test_wrong_segment_or_span_fails() {
        let bytes = data(4096);
        let tree = Bmt::new(&bytes).unwrap();
        let proof = tree.proof(5);

        let forged = [0xaa; 32];
        let address = address_from_proof(&forged, 5, &proof, 4096, None).unwrap();
        assert_ne!(address, tree.address());

        let address = address_from_proof(&tree.segment(5), 5, &proof, 4095, None).unwrap();
        assert_ne!(address, tree.address());

        let address = address_from_proof(&tree.segment(5), 6, &proof, 4096, None).unwrap();
        assert_ne!(address, tree.address());
    }

    #[test]
    fn test_transformed_tree_shares_leaves() {
        let bytes = data(300);
        let anchor = [0x11; 32];
        let plain = Bmt::new(&bytes).unwrap();
        let transformed = Bmt::transformed(&bytes, &anchor).unwrap();

        assert_ne!(plain.address(), transformed.address());
        assert_eq!(plain.proof(9)[0], transformed.proof(9)[0]);

        let address = address_from_proof(
            &transformed.segment(9),
            9,
            &transformed.proof(9),
            300,
            Some(&anchor),
        )
        .unwrap();
        assert_eq!(address, transformed.address());
    }

    #[test]
    fn test_oversized_chunk_rejected() {
        assert!(matches!(
            Bmt::new(&data(CHUNK_SIZE + 1)),
            Err(ProofError::ChunkTooLarge(_))
        ));
        assert!(root_from_proof(&[0; 32], 0, &[[0; 32]; 3], None).is_err());
    }
}
