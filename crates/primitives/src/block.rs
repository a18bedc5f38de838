//! This module contains the various Block types.

use crate::RawTransaction;
use alloy_primitives::{BlockHash, BlockNumber, B256};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Block ID identifies a block by its hash and number
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Hash)]
pub struct BlockID {
    /// The block hash
    pub hash: BlockHash,
    /// The block number
    pub number: BlockNumber,
}

impl core::fmt::Display for BlockID {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{{ hash: {}, number: {} }}", self.hash, self.number)
    }
}

/// Block Header Info
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Hash)]
pub struct BlockInfo {
    /// The block hash
    pub hash: B256,
    /// The block number
    pub number: u64,
    /// The parent block hash
    pub parent_hash: B256,
    /// The block timestamp
    pub timestamp: u64,
}

impl BlockInfo {
    /// Instantiates a new [BlockInfo].
    pub const fn new(hash: B256, number: u64, parent_hash: B256, timestamp: u64) -> Self {
        Self { hash, number, parent_hash, timestamp }
    }

    /// Returns the block ID.
    pub const fn id(&self) -> BlockID {
        BlockID { hash: self.hash, number: self.number }
    }

    /// Returns `true` if `self` is the direct parent of `child`.
    pub fn is_parent_of(&self, child: &Self) -> bool {
        self.number + 1 == child.number && self.hash == child.parent_hash
    }
}

impl core::fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "BlockInfo {{ hash: {}, number: {}, parent_hash: {}, timestamp: {} }}",
            self.hash, self.number, self.parent_hash, self.timestamp
        )
    }
}

/// L2 Block Header Info
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Hash)]
pub struct L2BlockInfo {
    /// The base [BlockInfo]
    pub block_info: BlockInfo,
    /// The L1 origin [BlockID]
    pub l1_origin: BlockID,
    /// The sequence number of the L2 block within its epoch
    pub seq_num: u64,
}

impl L2BlockInfo {
    /// Instantiates a new [L2BlockInfo].
    pub const fn new(block_info: BlockInfo, l1_origin: BlockID, seq_num: u64) -> Self {
        Self { block_info, l1_origin, seq_num }
    }
}

/// The subset of an L1 block header consumed by derivation.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Header {
    /// The block hash
    pub hash: B256,
    /// The parent block hash
    pub parent_hash: B256,
    /// The block number
    pub number: u64,
    /// The block timestamp
    pub timestamp: u64,
    /// The base fee, present after London.
    pub base_fee_per_gas: Option<u64>,
    /// The `prevRandao` value.
    pub mix_hash: B256,
    /// The excess blob gas, present after Cancun.
    pub excess_blob_gas: Option<u64>,
    /// The parent beacon block root, present after Cancun.
    pub parent_beacon_block_root: Option<B256>,
}

impl Header {
    /// Returns the [BlockInfo] view of the header.
    pub const fn block_info(&self) -> BlockInfo {
        BlockInfo::new(self.hash, self.number, self.parent_hash, self.timestamp)
    }

    /// Returns the blob base fee for the block, or `1` before Cancun.
    pub fn blob_base_fee(&self) -> u128 {
        self.excess_blob_gas.map_or(1, alloy_eips::eip4844::calc_blob_gasprice)
    }
}

/// An L2 block as handed to the batcher, or fetched back from L2 during span batch validation.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct L2Block {
    /// The block reference.
    pub info: L2BlockInfo,
    /// The EIP-2718 encoded transactions, deposits first.
    pub transactions: Vec<RawTransaction>,
}

impl L2Block {
    /// Returns the block hash.
    pub const fn hash(&self) -> B256 {
        self.info.block_info.hash
    }

    /// Returns the block number.
    pub const fn number(&self) -> u64 {
        self.info.block_info.number
    }

    /// Returns the parent block hash.
    pub const fn parent_hash(&self) -> B256 {
        self.info.block_info.parent_hash
    }

    /// Returns the block timestamp.
    pub const fn timestamp(&self) -> u64 {
        self.info.block_info.timestamp
    }

    /// Returns an iterator over the non-deposit transactions of the block.
    pub fn user_transactions(&self) -> impl Iterator<Item = &RawTransaction> {
        self.transactions.iter().filter(|tx| !tx.is_deposit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_info_parent() {
        let parent = BlockInfo::new(B256::with_last_byte(1), 10, B256::ZERO, 100);
        let child = BlockInfo::new(B256::with_last_byte(2), 11, B256::with_last_byte(1), 112);
        assert!(parent.is_parent_of(&child));
        assert!(!child.is_parent_of(&parent));
        assert_eq!(parent.id(), BlockID { hash: B256::with_last_byte(1), number: 10 });
    }

    #[test]
    fn test_blob_base_fee() {
        let header = Header::default();
        assert_eq!(header.blob_base_fee(), 1);
        let header = Header { excess_blob_gas: Some(0), ..Default::default() };
        assert_eq!(header.blob_base_fee(), 1);
    }

    #[test]
    fn test_user_transactions() {
        let block = L2Block {
            transactions: vec![
                RawTransaction::from(vec![0x7E, 0x01]),
                RawTransaction::from(vec![0x02, 0x01]),
            ],
            ..Default::default()
        };
        assert_eq!(block.user_transactions().count(), 1);
    }

    #[test]
    #[cfg(feature = "serde")]
    fn test_l2_block_info_serde() {
        let info = L2BlockInfo::new(
            BlockInfo::new(B256::with_last_byte(1), 1, B256::ZERO, 2),
            BlockID { hash: B256::with_last_byte(3), number: 4 },
            0,
        );
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(serde_json::from_str::<L2BlockInfo>(&json).unwrap(), info);
    }
}
