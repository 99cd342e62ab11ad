use crate::ProofError;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use incentives_postage::Batch;
use incentives_types::{bucket_of, hash_parts, Address, BatchId, ChunkAddress, Hash};
use serde::{Deserialize, Serialize};

/// Proof that a batch owner paid for storing a chunk.
///
/// `index` packs the bucket in its high 32 bits and the position within the
/// bucket in its low 32 bits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostageStamp {
    pub batch_id: BatchId,
    pub index: u64,
    pub timestamp: u64,
    pub signer: Address,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

impl PostageStamp {
    pub fn pack_index(bucket: u32, position: u32) -> u64 {
        ((bucket as u64) << 32) | position as u64
    }

    pub fn bucket(&self) -> u32 {
        (self.index >> 32) as u32
    }

    pub fn position(&self) -> u32 {
        self.index as u32
    }

    /// Message signed by the batch owner:
    /// `H(chunk || batch_id || index (big endian) || timestamp (big endian))`
    pub fn digest(chunk: &ChunkAddress, batch_id: &BatchId, index: u64, timestamp: u64) -> Hash {
        hash_parts(&[
            chunk.as_bytes(),
            batch_id.as_bytes(),
            &index.to_be_bytes(),
            &timestamp.to_be_bytes(),
        ])
    }

    pub fn sign(
        key: &SigningKey,
        chunk: &ChunkAddress,
        batch_id: BatchId,
        index: u64,
        timestamp: u64,
    ) -> Self {
        let digest = Self::digest(chunk, &batch_id, index, timestamp);
        let signature = key.sign(&digest);
        Self {
            batch_id,
            index,
            timestamp,
            signer: Address::from_bytes(key.verifying_key().to_bytes()),
            signature: signature.to_bytes().to_vec(),
        }
    }

    pub fn verify_signature(&self, chunk: &ChunkAddress) -> Result<(), ProofError> {
        let verifying_key = VerifyingKey::from_bytes(self.signer.as_bytes())
            .map_err(|_| ProofError::InvalidSigner(self.signer))?;

        let bytes: [u8; 64] = self
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| ProofError::InvalidSignature(self.batch_id))?;
        let signature = Signature::from_bytes(&bytes);

        let digest = Self::digest(chunk, &self.batch_id, self.index, self.timestamp);
        verifying_key
            .verify(&digest, &signature)
            .map_err(|_| ProofError::InvalidSignature(self.batch_id))
    }

    /// Check the stamp against the batch it claims: index range, bucket of
    /// the chunk, signer and signature
    pub fn verify_for_batch(&self, chunk: &ChunkAddress, batch: &Batch) -> Result<(), ProofError> {
        if self.position() as u64 >= batch.bucket_capacity() {
            return Err(ProofError::StampIndexOutOfRange {
                batch_id: self.batch_id,
                index: self.index,
            });
        }
        if self.bucket() != bucket_of(chunk.as_bytes(), batch.bucket_depth) {
            return Err(ProofError::BucketMismatch {
                batch_id: self.batch_id,
                index: self.index,
            });
        }
        if self.signer != batch.owner {
            return Err(ProofError::SignerNotOwner(self.batch_id));
        }
        self.verify_signature(chunk)
    }
}
