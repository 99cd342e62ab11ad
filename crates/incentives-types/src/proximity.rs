//! Bitwise closeness between 32-byte identifiers.
//!
//! The proximity order of two identifiers is the length of their common bit
//! prefix. An overlay is "within depth d" of an anchor when the first d bits
//! agree.

/// Proximity of two identical identifiers
pub const MAX_PROXIMITY: u16 = 256;

/// Number of leading bits shared by `a` and `b`
pub fn proximity(a: &[u8; 32], b: &[u8; 32]) -> u16 {
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = x ^ y;
        if diff != 0 {
            return (i as u16) * 8 + diff.leading_zeros() as u16;
        }
    }
    MAX_PROXIMITY
}

/// True when the first `depth` bits of `a` and `b` agree
pub fn in_proximity(a: &[u8; 32], b: &[u8; 32], depth: u8) -> bool {
    depth == 0 || proximity(a, b) >= depth as u16
}

/// Bucket of an address: the integer formed by its first `bucket_depth` bits.
/// `bucket_depth` is capped at 32.
pub fn bucket_of(address: &[u8; 32], bucket_depth: u8) -> u32 {
    if bucket_depth == 0 {
        return 0;
    }
    let depth = bucket_depth.min(32) as u32;
    let prefix = u32::from_be_bytes([address[0], address[1], address[2], address[3]]);
    prefix >> (32 - depth)
}
