/// 32-byte digest used across the protocol
pub type Hash = [u8; 32];

pub const ZERO_HASH: Hash = [0u8; 32];

/// Hash the concatenation of `parts`
pub fn hash_parts(parts: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Derive a domain-separated value from round randomness.
/// Layout: domain || 0x00 || randomness || params...
pub fn compute_challenge(randomness: &Hash, domain: &str, params: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new();

    hasher.update(domain.as_bytes());
    hasher.update(&[0]);
    hasher.update(randomness);

    for param in params {
        hasher.update(param);
    }

    *hasher.finalize().as_bytes()
}

/// First eight bytes of a digest, big endian
pub fn hash_to_u64(hash: &Hash) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&hash[..8]);
    u64::from_be_bytes(buf)
}

/// First sixteen bytes of a digest, big endian
pub fn hash_to_u128(hash: &Hash) -> u128 {
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&hash[..16]);
    u128::from_be_bytes(buf)
}
