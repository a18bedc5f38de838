//! Indexed Blob Hash.

use alloy_primitives::B256;

/// The version byte of a KZG commitment's versioned hash (EIP-4844).
pub const VERSIONED_HASH_VERSION_KZG: u8 = 0x01;

/// A blob versioned hash, with the index of the blob within its L1 block.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexedBlobHash {
    /// The index of the blob in the block
    pub index: usize,
    /// The versioned hash of the blob
    pub hash: B256,
}

impl IndexedBlobHash {
    /// Creates a new [IndexedBlobHash].
    pub const fn new(index: usize, hash: B256) -> Self {
        Self { index, hash }
    }

    /// Returns `true` if the hash carries the KZG version byte.
    pub fn is_kzg_versioned(&self) -> bool {
        self.hash[0] == VERSIONED_HASH_VERSION_KZG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kzg_version() {
        let mut hash = B256::repeat_byte(0xAA);
        assert!(!IndexedBlobHash::new(0, hash).is_kzg_versioned());
        hash[0] = VERSIONED_HASH_VERSION_KZG;
        assert!(IndexedBlobHash::new(3, hash).is_kzg_versioned());
    }

    #[test]
    #[cfg(feature = "serde")]
    fn test_indexed_blob_hash_serde_roundtrip() {
        let indexed_blob_hash = IndexedBlobHash::new(1, B256::from([1; 32]));

        let serialized = serde_json::to_string(&indexed_blob_hash).unwrap();
        let deserialized: IndexedBlobHash = serde_json::from_str(&serialized).unwrap();

        assert_eq!(indexed_blob_hash, deserialized);
    }
}
