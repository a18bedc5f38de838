//! This module contains the [RollupConfig] type.

use crate::{
    params::{
        FJORD_MAX_CHANNEL_BANK_SIZE, FJORD_MAX_RLP_BYTES_PER_CHANNEL, FJORD_MAX_SEQUENCER_DRIFT,
        MAX_CHANNEL_BANK_SIZE, MAX_RLP_BYTES_PER_CHANNEL,
    },
    Genesis,
};
use alloy_primitives::Address;

/// The channel timeout, in L1 blocks, once Granite is active.
pub const GRANITE_CHANNEL_TIMEOUT: u64 = 50;

/// The Rollup configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RollupConfig {
    /// The genesis state of the rollup.
    pub genesis: Genesis,
    /// The block time of the L2, in seconds.
    pub block_time: u64,
    /// Sequencer batches may not be more than MaxSequencerDrift seconds after
    /// the L1 timestamp of the sequencing window end.
    ///
    /// Replaced by [FJORD_MAX_SEQUENCER_DRIFT] once Fjord is active.
    pub max_sequencer_drift: u64,
    /// The sequencer window size, in L1 blocks.
    pub seq_window_size: u64,
    /// Number of L1 blocks between when a channel can be opened and when it can be closed.
    pub channel_timeout: u64,
    /// The channel timeout once Granite is active.
    pub granite_channel_timeout: u64,
    /// The L1 chain ID
    pub l1_chain_id: u64,
    /// The L2 chain ID
    pub l2_chain_id: u64,
    /// Activation time of the Regolith network upgrade.
    pub regolith_time: Option<u64>,
    /// Activation time of the Canyon network upgrade.
    pub canyon_time: Option<u64>,
    /// Activation time of the Delta network upgrade, which introduces span batches.
    pub delta_time: Option<u64>,
    /// Activation time of the Ecotone network upgrade, which introduces blobs.
    pub ecotone_time: Option<u64>,
    /// Activation time of the Fjord network upgrade, which introduces brotli channels.
    pub fjord_time: Option<u64>,
    /// Activation time of the Granite network upgrade.
    pub granite_time: Option<u64>,
    /// Activation time of the Holocene network upgrade.
    pub holocene_time: Option<u64>,
    /// The L1 address that batches are sent to.
    pub batch_inbox_address: Address,
    /// The L1 address that deposits are sent to.
    pub deposit_contract_address: Address,
    /// The L1 address that the system config is stored at.
    pub l1_system_config_address: Address,
    /// The L1 timestamp to start reading blobs as a batch data source. When unset, blobs are
    /// read from Ecotone activation onwards.
    pub blobs_enabled_l1_timestamp: Option<u64>,
}

macro_rules! fork_active {
    ($($(#[$meta:meta])* $fn:ident => $field:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $fn(&self, timestamp: u64) -> bool {
                self.$field.is_some_and(|t| timestamp >= t)
            }
        )*
    };
}

impl RollupConfig {
    fork_active! {
        /// Returns true if Regolith is active at the given timestamp.
        is_regolith_active => regolith_time,
        /// Returns true if Canyon is active at the given timestamp.
        is_canyon_active => canyon_time,
        /// Returns true if Delta is active at the given timestamp.
        is_delta_active => delta_time,
        /// Returns true if Ecotone is active at the given timestamp.
        is_ecotone_active => ecotone_time,
        /// Returns true if Fjord is active at the given timestamp.
        is_fjord_active => fjord_time,
        /// Returns true if Granite is active at the given timestamp.
        is_granite_active => granite_time,
        /// Returns true if Holocene is active at the given timestamp.
        is_holocene_active => holocene_time,
    }

    /// Returns true if the block at `timestamp` is the first block after Ecotone activation.
    pub fn is_first_ecotone_block(&self, timestamp: u64) -> bool {
        self.is_ecotone_active(timestamp) &&
            timestamp >= self.block_time &&
            !self.is_ecotone_active(timestamp - self.block_time)
    }

    /// Returns true if blobs should be read as the batch data source for an L1 block at
    /// `l1_timestamp`.
    pub fn is_blobs_enabled(&self, l1_timestamp: u64) -> bool {
        match self.blobs_enabled_l1_timestamp {
            Some(t) => l1_timestamp >= t,
            None => self.is_ecotone_active(l1_timestamp),
        }
    }

    /// Returns the max sequencer drift for the given timestamp.
    pub fn max_sequencer_drift(&self, timestamp: u64) -> u64 {
        if self.is_fjord_active(timestamp) {
            FJORD_MAX_SEQUENCER_DRIFT
        } else {
            self.max_sequencer_drift
        }
    }

    /// Returns the channel timeout, in L1 blocks, for the given timestamp.
    pub fn channel_timeout(&self, timestamp: u64) -> u64 {
        if self.is_granite_active(timestamp) {
            self.granite_channel_timeout
        } else {
            self.channel_timeout
        }
    }

    /// Returns the max rlp bytes per channel for the given timestamp.
    pub fn max_rlp_bytes_per_channel(&self, timestamp: u64) -> u64 {
        if self.is_fjord_active(timestamp) {
            FJORD_MAX_RLP_BYTES_PER_CHANNEL
        } else {
            MAX_RLP_BYTES_PER_CHANNEL
        }
    }

    /// Returns the max size of the channel bank for the given timestamp.
    pub fn max_channel_bank_size(&self, timestamp: u64) -> usize {
        if self.is_fjord_active(timestamp) {
            FJORD_MAX_CHANNEL_BANK_SIZE
        } else {
            MAX_CHANNEL_BANK_SIZE
        }
    }
}
