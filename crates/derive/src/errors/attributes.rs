//! Error types for the attributes builder.

use alloy_primitives::B256;
use ferry_primitives::BlockID;
use thiserror::Error;

/// An [AttributesBuilder] Error.
///
/// [AttributesBuilder]: crate::traits::AttributesBuilder
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum BuilderError {
    /// Mismatched blocks.
    #[error("Block mismatch. Expected {0}, got {1}")]
    BlockMismatch(BlockID, BlockID),
    /// Mismatched blocks for the start of an Epoch.
    #[error("Block mismatch on epoch reset. Expected {0}, got {1}, parent hash {2}")]
    BlockMismatchEpochReset(BlockID, BlockID, B256),
    /// Broken time invariant between L2 and L1.
    #[error("Time invariant broken. L1 origin: {0} | Next L2 time: {1} | L1 block: {2} | L1 timestamp {3}")]
    BrokenTimeInvariant(BlockID, u64, BlockID, u64),
    /// A custom error.
    #[error("Error in attributes builder: {0}")]
    Custom(String),
}
