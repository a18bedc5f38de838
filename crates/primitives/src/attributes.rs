//! Payload attributes: the block building instructions the derivation pipeline hands to the
//! execution engine.

use crate::{L2BlockInfo, RawTransaction};
use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::{Address, B256, B64};

/// The attributes of the next L2 block to build.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpPayloadAttributes {
    /// Value for the timestamp field of the new payload
    pub timestamp: u64,
    /// Value for the random field of the new payload
    pub prev_randao: B256,
    /// Suggested value for the coinbase field of the new payload
    pub suggested_fee_recipient: Address,
    /// Withdrawals, an empty list from Canyon onwards.
    pub withdrawals: Option<Vec<Withdrawal>>,
    /// Root of the parent beacon block, from Ecotone onwards.
    pub parent_beacon_block_root: Option<B256>,
    /// Transactions to force into the block: the L1 info deposit, user deposits, then the batch
    /// transactions.
    pub transactions: Option<Vec<RawTransaction>>,
    /// If true, the execution engine must not include transactions from its own pool.
    pub no_tx_pool: Option<bool>,
    /// The gas limit of the block.
    pub gas_limit: Option<u64>,
    /// The EIP-1559 `denominator ++ elasticity` parameters, from Holocene onwards.
    pub eip_1559_params: Option<B64>,
}

impl OpPayloadAttributes {
    /// Returns the number of forced transactions.
    pub fn transaction_count(&self) -> usize {
        self.transactions.as_ref().map_or(0, Vec::len)
    }

    /// Returns the number of deposit transactions at the head of the forced transactions.
    pub fn deposit_count(&self) -> usize {
        self.transactions
            .as_ref()
            .map_or(0, |txs| txs.iter().take_while(|tx| tx.is_deposit()).count())
    }
}

/// [OpPayloadAttributes] together with the L2 block they build on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L2AttributesWithParent {
    /// The payload attributes.
    pub attributes: OpPayloadAttributes,
    /// The parent block reference.
    pub parent: L2BlockInfo,
    /// Whether the attributes are the last of a span batch, or of a singular batch.
    pub is_last_in_span: bool,
}

impl L2AttributesWithParent {
    /// Create a new [L2AttributesWithParent] instance.
    pub const fn new(
        attributes: OpPayloadAttributes,
        parent: L2BlockInfo,
        is_last_in_span: bool,
    ) -> Self {
        Self { attributes, parent, is_last_in_span }
    }

    /// Returns the payload attributes.
    pub const fn attributes(&self) -> &OpPayloadAttributes {
        &self.attributes
    }

    /// Returns the parent block reference.
    pub const fn parent(&self) -> &L2BlockInfo {
        &self.parent
    }

    /// Returns whether the attributes are the last in the span.
    pub const fn is_last_in_span(&self) -> bool {
        self.is_last_in_span
    }
}
