//! Raw Span Batch

use super::{
    SpanBatch, SpanBatchElement, SpanBatchError, SpanBatchPayload, SpanBatchPrefix,
    SpanDecodingError,
};
use crate::batch::BatchType;

/// The span batch as it is laid out on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSpanBatch {
    /// The span batch prefix
    pub prefix: SpanBatchPrefix,
    /// The span batch payload
    pub payload: SpanBatchPayload,
}

impl RawSpanBatch {
    /// Returns the batch type
    pub const fn get_batch_type(&self) -> BatchType {
        BatchType::Span
    }

    /// Encodes the [RawSpanBatch] into a writer, without the batch type byte.
    pub fn encode(&self, w: &mut Vec<u8>) -> Result<(), SpanBatchError> {
        self.prefix.encode_prefix(w);
        self.payload.encode_payload(w)
    }

    /// Decodes the [RawSpanBatch] from a reader positioned after the batch type byte.
    pub fn decode(r: &mut &[u8]) -> Result<Self, SpanBatchError> {
        let prefix = SpanBatchPrefix::decode_prefix(r)?;
        let payload = SpanBatchPayload::decode_payload(r)?;
        Ok(Self { prefix, payload })
    }

    /// Expands the [RawSpanBatch] into a [SpanBatch] of per-block [SpanBatchElement]s, recovering
    /// every block's epoch number and timestamp and rebuilding the signed transactions.
    pub fn derive(
        &mut self,
        block_time: u64,
        genesis_time: u64,
        chain_id: u64,
    ) -> Result<SpanBatch, SpanBatchError> {
        let block_count = self.payload.block_count as usize;
        if block_count == 0 {
            return Err(SpanBatchError::EmptySpanBatch);
        }
        if self.payload.block_tx_counts.len() != block_count {
            return Err(SpanDecodingError::BlockTxCounts.into());
        }

        // The prefix carries the epoch of the last block. Walk backwards, stepping the epoch down
        // whenever a block's origin bit says it changed at that block.
        let mut block_origin_nums = vec![0u64; block_count];
        let mut l1_origin_number = self.prefix.l1_origin_num;
        for i in (0..block_count).rev() {
            block_origin_nums[i] = l1_origin_number;
            if i > 0 && self.payload.origin_bits.get_bit(i) == Some(1) {
                l1_origin_number = l1_origin_number
                    .checked_sub(1)
                    .ok_or(SpanDecodingError::L1OriginNumber)?;
            }
        }

        self.payload.txs.recover_v(chain_id)?;
        let mut txs = self.payload.txs.full_txs(chain_id)?.into_iter();

        let mut batches = Vec::with_capacity(block_count);
        for (i, tx_count) in self.payload.block_tx_counts.iter().enumerate() {
            let transactions = txs.by_ref().take(*tx_count as usize).collect::<Vec<_>>();
            if transactions.len() != *tx_count as usize {
                return Err(SpanDecodingError::BlockTxCounts.into());
            }
            batches.push(SpanBatchElement {
                epoch_num: block_origin_nums[i],
                timestamp: genesis_time + self.prefix.rel_timestamp + block_time * i as u64,
                transactions,
            });
        }

        Ok(SpanBatch {
            parent_check: self.prefix.parent_check,
            l1_origin_check: self.prefix.l1_origin_check,
            genesis_timestamp: genesis_time,
            chain_id,
            batches,
            origin_bits: self.payload.origin_bits.clone(),
            block_tx_counts: self.payload.block_tx_counts.clone(),
            txs: self.payload.txs.clone(),
        })
    }
}
