//! Raw Span Batch Payload

use super::{
    read_varint, write_varint, SpanBatchBits, SpanBatchError, SpanBatchTransactions,
    SpanDecodingError,
};
use crate::params::MAX_SPAN_BATCH_ELEMENTS;

/// Span Batch Payload
///
/// ```text
/// payload = block_count ++ origin_bits ++ block_tx_counts ++ txs
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanBatchPayload {
    /// Number of L2 block in the span
    pub block_count: u64,
    /// Standard span-batch bitlist of blockCount bits. Each bit indicates if the L1 origin is
    /// changed at the L2 block.
    pub origin_bits: SpanBatchBits,
    /// List of transaction counts for each L2 block
    pub block_tx_counts: Vec<u64>,
    /// Transactions encoded in SpanBatch specs
    pub txs: SpanBatchTransactions,
}

impl SpanBatchPayload {
    /// Decodes a [SpanBatchPayload] from a reader.
    pub fn decode_payload(r: &mut &[u8]) -> Result<Self, SpanBatchError> {
        let block_count = read_varint(r, SpanDecodingError::BlockCount)?;
        if block_count > MAX_SPAN_BATCH_ELEMENTS {
            return Err(SpanBatchError::TooBigSpanBatchSize);
        }
        if block_count == 0 {
            return Err(SpanBatchError::EmptySpanBatch);
        }

        let origin_bits = SpanBatchBits::decode(r, block_count as usize)?;

        let mut block_tx_counts = Vec::with_capacity(block_count as usize);
        let mut total_block_tx_count = 0u64;
        for _ in 0..block_count {
            let block_tx_count = read_varint(r, SpanDecodingError::BlockTxCounts)?;
            // Neither a single block nor the whole span may exceed the element limit.
            if block_tx_count > MAX_SPAN_BATCH_ELEMENTS {
                return Err(SpanBatchError::TooBigSpanBatchSize);
            }
            total_block_tx_count = total_block_tx_count
                .checked_add(block_tx_count)
                .filter(|total| *total <= MAX_SPAN_BATCH_ELEMENTS)
                .ok_or(SpanBatchError::TooBigSpanBatchSize)?;
            block_tx_counts.push(block_tx_count);
        }

        let mut txs = SpanBatchTransactions { total_block_tx_count, ..Default::default() };
        txs.decode(r)?;

        Ok(Self { block_count, origin_bits, block_tx_counts, txs })
    }

    /// Encodes a [SpanBatchPayload] into a writer.
    pub fn encode_payload(&self, w: &mut Vec<u8>) -> Result<(), SpanBatchError> {
        write_varint(w, self.block_count);
        SpanBatchBits::encode(w, self.block_count as usize, &self.origin_bits)?;
        self.block_tx_counts.iter().for_each(|count| write_varint(w, *count));
        self.txs.encode(w)
    }
}
