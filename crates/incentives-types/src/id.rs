use crate::hash::hash_parts;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! bytes32_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(#[serde(with = "hex::serde")] [u8; 32]);

        impl $name {
            pub const ZERO: Self = Self([0u8; 32]);

            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_bytes(self) -> [u8; 32] {
                self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; 32]
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s.trim_start_matches("0x"))?;
                if bytes.len() != 32 {
                    return Err(hex::FromHexError::InvalidStringLength);
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }

            /// Short hex prefix for log fields
            pub fn short(&self) -> String {
                hex::encode(&self.0[..4])
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}...)", stringify!($name), &self.to_hex()[..8])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }
    };
}

bytes32_id!(
    /// Account on the host ledger. Equal to the ed25519 verifying key bytes of
    /// the account holder, so postage stamp signers can be matched against
    /// batch owners directly.
    Address
);

bytes32_id!(
    /// Derived node identity used as the unit of stake and proximity
    Overlay
);

bytes32_id!(
    /// Postage batch identifier
    BatchId
);

bytes32_id!(
    /// Content address of a chunk (BMT address)
    ChunkAddress
);

impl Overlay {
    /// overlay = H(owner || network_id (little endian) || nonce)
    pub fn derive(owner: &Address, network_id: u64, nonce: &[u8; 32]) -> Self {
        Self(hash_parts(&[
            owner.as_bytes(),
            &network_id.to_le_bytes(),
            nonce,
        ]))
    }
}

impl BatchId {
    /// batch_id = H(creator || nonce)
    pub fn derive(creator: &Address, nonce: &[u8; 32]) -> Self {
        Self(hash_parts(&[creator.as_bytes(), nonce]))
    }
}
