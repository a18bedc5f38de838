//! This module contains the [Genesis] type.

use crate::{BlockID, SystemConfig};

/// The anchor blocks and initial system config of the rollup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Genesis {
    /// The L1 block that the rollup starts *after* (no derived transactions)
    pub l1: BlockID,
    /// The L2 block the rollup starts from (no transactions, pre-configured state)
    pub l2: BlockID,
    /// Timestamp of the L2 genesis block.
    pub timestamp: u64,
    /// Initial system configuration values. The L2 genesis block carries no L1 info
    /// transaction, so the config cannot be read back from it.
    pub system_config: SystemConfig,
}
