//! This module contains the batch types for the derivation pipeline: [SpanBatch] &
//! [SingleBatch], their validation rules, and the [BatchReader] that reads them out of channels.

use crate::{BlockInfo, L2BlockInfo, RollupConfig};
use alloy_rlp::{Decodable, Encodable};
use thiserror::Error;

mod reader;
pub use reader::{decompress_channel, BatchReader, DecompressionError};

mod single;
pub use single::SingleBatch;

mod span;
pub use span::{
    read_varint, write_varint, RawSpanBatch, SpanBatch, SpanBatchBits,
    SpanBatchEip1559TransactionData, SpanBatchEip2930TransactionData, SpanBatchElement,
    SpanBatchError, SpanBatchLegacyTransactionData, SpanBatchPayload, SpanBatchPrefix,
    SpanBatchSignature, SpanBatchTransactionData, SpanBatchTransactions, SpanBatchTxType,
    SpanDecodingError,
};

mod traits;
pub use traits::BatchValidationProvider;

mod validity;
pub use validity::BatchValidity;

/// An error decoding a [Batch].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchDecodingError {
    /// The batch data is empty.
    #[error("Empty buffer")]
    EmptyBuffer,
    /// The batch type byte is unknown.
    #[error("Unknown batch type: {0}")]
    UnknownBatchType(u8),
    /// RLP decoding failed.
    #[error("RLP error: {0}")]
    Rlp(alloy_rlp::Error),
    /// The span batch is malformed.
    #[error(transparent)]
    SpanBatch(#[from] SpanBatchError),
    /// The channel could not be decompressed.
    #[error(transparent)]
    Decompression(#[from] DecompressionError),
}

/// The type of a [Batch], the first byte of its encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BatchType {
    /// Single batch.
    Single = 0,
    /// Span batch.
    Span = 1,
}

impl TryFrom<u8> for BatchType {
    type Error = BatchDecodingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Single),
            1 => Ok(Self::Span),
            _ => Err(BatchDecodingError::UnknownBatchType(value)),
        }
    }
}

/// A batch with its inclusion block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchWithInclusionBlock {
    /// The inclusion block
    pub inclusion_block: BlockInfo,
    /// The batch
    pub batch: Batch,
}

impl BatchWithInclusionBlock {
    /// Creates a new [BatchWithInclusionBlock].
    pub const fn new(inclusion_block: BlockInfo, batch: Batch) -> Self {
        Self { inclusion_block, batch }
    }

    /// Validates the batch can be applied on top of the specified L2 safe head.
    /// The first entry of the l1_blocks should match the origin of the l2_safe_head.
    /// One or more consecutive l1_blocks should be provided.
    /// In case of only a single L1 block, the decision whether a batch is valid may have to stay
    /// undecided.
    pub async fn check_batch<BV: BatchValidationProvider>(
        &self,
        cfg: &RollupConfig,
        l1_blocks: &[BlockInfo],
        l2_safe_head: L2BlockInfo,
        fetcher: &mut BV,
    ) -> BatchValidity {
        match &self.batch {
            Batch::Single(single_batch) => {
                single_batch.check_batch(cfg, l1_blocks, l2_safe_head, &self.inclusion_block)
            }
            Batch::Span(span_batch) => {
                span_batch
                    .check_batch(cfg, l1_blocks, l2_safe_head, &self.inclusion_block, fetcher)
                    .await
            }
        }
    }
}

/// A Batch.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Batch {
    /// A single batch
    Single(SingleBatch),
    /// Span Batches
    Span(SpanBatch),
}

impl Batch {
    /// Returns the [BatchType] of the batch.
    pub const fn batch_type(&self) -> BatchType {
        match self {
            Self::Single(_) => BatchType::Single,
            Self::Span(_) => BatchType::Span,
        }
    }

    /// Returns the timestamp for the batch.
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::Single(sb) => sb.timestamp,
            Self::Span(sb) => sb.starting_timestamp(),
        }
    }

    /// Attempts to decode a batch, type byte first, from a reader.
    pub fn decode(r: &mut &[u8], cfg: &RollupConfig) -> Result<Self, BatchDecodingError> {
        let (first, rest) = r.split_first().ok_or(BatchDecodingError::EmptyBuffer)?;
        let batch_type = BatchType::try_from(*first)?;
        *r = rest;

        match batch_type {
            BatchType::Single => {
                let single_batch = SingleBatch::decode(r).map_err(BatchDecodingError::Rlp)?;
                Ok(Self::Single(single_batch))
            }
            BatchType::Span => {
                let mut raw_span_batch = RawSpanBatch::decode(r)?;
                let span_batch = raw_span_batch.derive(
                    cfg.block_time,
                    cfg.genesis.timestamp,
                    cfg.l2_chain_id,
                )?;
                Ok(Self::Span(span_batch))
            }
        }
    }

    /// Encodes the batch, type byte first, into a writer.
    pub fn encode(&self, w: &mut Vec<u8>) -> Result<(), SpanBatchError> {
        w.push(self.batch_type() as u8);
        match self {
            Self::Single(sb) => {
                sb.encode(w);
                Ok(())
            }
            Self::Span(sb) => sb.to_raw_span_batch()?.encode(w),
        }
    }
}
