//! This module contains the receipt and L1 transaction views used within the derivation pipeline.

use alloy_primitives::{Address, Bytes, Log, B256};

/// Receipt containing the result of an L1 transaction's execution.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Receipt {
    /// If transaction is executed successfully.
    ///
    /// This is the `statusCode`
    pub success: bool,
    /// Gas used
    pub cumulative_gas_used: u64,
    /// Log send from contracts.
    pub logs: Vec<Log>,
}

/// The fields of an L1 transaction the data sources read.
///
/// The sender is expected to be recovered by the chain provider.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct L1Transaction {
    /// The EIP-2718 transaction type.
    pub tx_type: u8,
    /// The recovered sender.
    pub from: Address,
    /// The recipient, `None` for contract creations.
    pub to: Option<Address>,
    /// The calldata.
    pub input: Bytes,
    /// The versioned hashes of the blobs carried by an EIP-4844 transaction.
    pub blob_versioned_hashes: Vec<B256>,
}

impl L1Transaction {
    /// The EIP-4844 transaction type.
    pub const EIP4844_TX_TYPE: u8 = 3;

    /// Returns `true` if the transaction carries blobs.
    pub fn is_blob_tx(&self) -> bool {
        self.tx_type == Self::EIP4844_TX_TYPE
    }
}
