//! Span Batch Element

use crate::{batch::SingleBatch, RawTransaction};

/// A single L2 block of a span batch.
///
/// Unlike a [SingleBatch], it carries neither the parent hash nor the epoch hash, since the span
/// batch only commits to those for the span as a whole.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpanBatchElement {
    /// The epoch number of the L1 block
    pub epoch_num: u64,
    /// The timestamp of the L2 block
    pub timestamp: u64,
    /// The transactions in the L2 block
    pub transactions: Vec<RawTransaction>,
}

impl From<SingleBatch> for SpanBatchElement {
    fn from(batch: SingleBatch) -> Self {
        Self {
            epoch_num: batch.epoch_num,
            timestamp: batch.timestamp,
            transactions: batch.transactions,
        }
    }
}
