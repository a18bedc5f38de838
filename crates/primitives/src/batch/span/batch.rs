//! The Span Batch Type

use super::{
    RawSpanBatch, SpanBatchBits, SpanBatchElement, SpanBatchError, SpanBatchPayload,
    SpanBatchPrefix, SpanBatchTransactions,
};
use crate::{
    batch::{BatchValidationProvider, BatchValidity, SingleBatch},
    BlockInfo, L2BlockInfo, RawTransaction, RollupConfig,
};
use alloy_primitives::{FixedBytes, B256};
use tracing::{info, warn};

/// The span batch contains the input to build a span of L2 blocks in derived form.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpanBatch {
    /// First 20 bytes of the first block's parent hash
    pub parent_check: FixedBytes<20>,
    /// First 20 bytes of the last block's L1 origin hash
    pub l1_origin_check: FixedBytes<20>,
    /// Genesis block timestamp
    pub genesis_timestamp: u64,
    /// Chain ID
    pub chain_id: u64,
    /// List of block input in derived form
    pub batches: Vec<SpanBatchElement>,
    /// Caching - origin bits
    pub origin_bits: SpanBatchBits,
    /// Caching - block tx counts
    pub block_tx_counts: Vec<u64>,
    /// Caching - span batch txs
    pub txs: SpanBatchTransactions,
}

impl SpanBatch {
    /// Creates an empty [SpanBatch] for the chain, ready for [Self::append_singular_batch].
    pub fn new(genesis_timestamp: u64, chain_id: u64) -> Self {
        Self { genesis_timestamp, chain_id, ..Default::default() }
    }

    /// Returns the timestamp of the first block in the span.
    pub fn starting_timestamp(&self) -> u64 {
        self.batches.first().map_or(0, |b| b.timestamp)
    }

    /// Returns the timestamp of the last block in the span.
    pub fn final_timestamp(&self) -> u64 {
        self.batches.last().map_or(0, |b| b.timestamp)
    }

    /// Returns the epoch number of the first block in the span.
    pub fn starting_epoch_num(&self) -> u64 {
        self.batches.first().map_or(0, |b| b.epoch_num)
    }

    /// Returns the epoch number of the last block in the span.
    pub fn final_epoch_num(&self) -> u64 {
        self.batches.last().map_or(0, |b| b.epoch_num)
    }

    /// Checks if the first 20 bytes of the given hash match the L1 origin check.
    pub fn check_origin_hash(&self, hash: B256) -> bool {
        self.l1_origin_check == hash[..20]
    }

    /// Checks if the first 20 bytes of the given hash match the parent check.
    pub fn check_parent_hash(&self, hash: B256) -> bool {
        self.parent_check == hash[..20]
    }

    /// Returns the `n`th element from the end of the span.
    fn peek(&self, n: usize) -> Option<&SpanBatchElement> {
        self.batches.iter().rev().nth(n)
    }

    /// Converts the span batch into its wire form.
    pub fn to_raw_span_batch(&self) -> Result<RawSpanBatch, SpanBatchError> {
        let (Some(span_start), Some(span_end)) = (self.batches.first(), self.batches.last()) else {
            return Err(SpanBatchError::EmptySpanBatch);
        };

        Ok(RawSpanBatch {
            prefix: SpanBatchPrefix {
                rel_timestamp: span_start.timestamp - self.genesis_timestamp,
                l1_origin_num: span_end.epoch_num,
                parent_check: self.parent_check,
                l1_origin_check: self.l1_origin_check,
            },
            payload: SpanBatchPayload {
                block_count: self.batches.len() as u64,
                origin_bits: self.origin_bits.clone(),
                block_tx_counts: self.block_tx_counts.clone(),
                txs: self.txs.clone(),
            },
        })
    }

    /// Converts the blocks of the span past `l2_safe_head` into [SingleBatch]es.
    ///
    /// The parent hash of the returned batches is left empty; the caller fills it in when it
    /// applies a batch on top of its parent.
    pub fn get_singular_batches(
        &self,
        l1_origins: &[BlockInfo],
        l2_safe_head: L2BlockInfo,
    ) -> Result<Vec<SingleBatch>, SpanBatchError> {
        let mut single_batches = Vec::new();
        let mut origin_index = 0;
        for batch in &self.batches {
            if batch.timestamp <= l2_safe_head.block_info.timestamp {
                continue;
            }
            let (offset, origin) = l1_origins[origin_index..]
                .iter()
                .enumerate()
                .find(|(_, origin)| origin.number == batch.epoch_num)
                .ok_or(SpanBatchError::MissingL1Origin)?;
            origin_index += offset;
            single_batches.push(SingleBatch {
                parent_hash: B256::ZERO,
                epoch_num: batch.epoch_num,
                epoch_hash: origin.hash,
                timestamp: batch.timestamp,
                transactions: batch.transactions.clone(),
            });
        }
        Ok(single_batches)
    }

    /// Appends a [SingleBatch] to the span.
    ///
    /// `seq_num` is the sequence number of the L2 block within its epoch; a zero sequence number
    /// on the first block marks an epoch change at the start of the span.
    pub fn append_singular_batch(
        &mut self,
        singular_batch: SingleBatch,
        seq_num: u64,
    ) -> Result<(), SpanBatchError> {
        let epoch_bit = match self.peek(0) {
            Some(prev) if prev.timestamp > singular_batch.timestamp => {
                return Err(SpanBatchError::UnorderedBatch(
                    prev.timestamp,
                    singular_batch.timestamp,
                ));
            }
            Some(prev) => prev.epoch_num < singular_batch.epoch_num,
            None => {
                self.parent_check = FixedBytes::from_slice(&singular_batch.parent_hash[..20]);
                seq_num == 0
            }
        };

        self.txs.add_txs(&singular_batch.transactions, self.chain_id)?;
        self.origin_bits.set_bit(self.batches.len(), epoch_bit);
        self.l1_origin_check = FixedBytes::from_slice(&singular_batch.epoch_hash[..20]);
        self.block_tx_counts.push(singular_batch.transactions.len() as u64);
        self.batches.push(singular_batch.into());
        Ok(())
    }

    /// Checks if the span batch is valid on top of `l2_safe_head`.
    ///
    /// Blocks of the span that are already part of the safe chain must match it exactly; they
    /// are compared against the chain through `fetcher`.
    pub async fn check_batch<BV: BatchValidationProvider>(
        &self,
        cfg: &RollupConfig,
        l1_blocks: &[BlockInfo],
        l2_safe_head: L2BlockInfo,
        inclusion_block: &BlockInfo,
        fetcher: &mut BV,
    ) -> BatchValidity {
        let Some(epoch) = l1_blocks.first() else {
            warn!(
                target: "batch-queue",
                "missing L1 block input, cannot proceed with batch checking"
            );
            return BatchValidity::Undecided;
        };
        if self.batches.is_empty() {
            warn!(target: "batch-queue", "empty span batch, cannot proceed with batch checking");
            return BatchValidity::Drop;
        }

        let starting_epoch_num = self.starting_epoch_num();
        let mut batch_origin = *epoch;
        if starting_epoch_num == batch_origin.number + 1 {
            match l1_blocks.get(1) {
                Some(next) => batch_origin = *next,
                None => {
                    info!(
                        target: "batch-queue",
                        "eager batch wants to advance current epoch {}, but could not without more L1 blocks",
                        epoch.id()
                    );
                    return BatchValidity::Undecided;
                }
            }
        }

        // Span batches are only valid after the Delta hard fork.
        if !cfg.is_delta_active(batch_origin.timestamp) {
            warn!(
                target: "batch-queue",
                "received SpanBatch (id {}) with L1 origin (timestamp {}) before Delta hard fork",
                batch_origin.id(),
                batch_origin.timestamp
            );
            return BatchValidity::Drop;
        }

        let next_timestamp = l2_safe_head.block_info.timestamp + cfg.block_time;
        if self.starting_timestamp() > next_timestamp {
            info!(
                target: "batch-queue",
                "received out-of-order batch for future processing after next batch ({} > {})",
                self.starting_timestamp(),
                next_timestamp
            );
            return BatchValidity::Future;
        }
        if self.final_timestamp() < next_timestamp {
            warn!(target: "batch-queue", "span batch has no new blocks after safe head");
            return BatchValidity::Drop;
        }

        // Find the parent block of the span batch.
        // If the span batch does not overlap the current safe chain, the parent block is the
        // L2 safe head.
        let mut parent_num = l2_safe_head.block_info.number;
        let mut parent_block = l2_safe_head;
        if self.starting_timestamp() < next_timestamp {
            if self.starting_timestamp() > l2_safe_head.block_info.timestamp {
                // Batch timestamp cannot be between the safe head and the next timestamp.
                warn!(
                    target: "batch-queue",
                    "batch has misaligned timestamp, block time is too short"
                );
                return BatchValidity::Drop;
            }
            if (l2_safe_head.block_info.timestamp - self.starting_timestamp()) % cfg.block_time != 0
            {
                warn!(
                    target: "batch-queue",
                    "batch has misaligned timestamp, not overlapped exactly"
                );
                return BatchValidity::Drop;
            }
            let Some(num) = (l2_safe_head.block_info.timestamp - self.starting_timestamp())
                .checked_div(cfg.block_time)
                .and_then(|blocks| parent_num.checked_sub(blocks + 1))
            else {
                warn!(target: "batch-queue", "span batch starts before the L2 genesis block");
                return BatchValidity::Drop;
            };
            parent_num = num;
            parent_block = match fetcher.l2_block_info_by_number(parent_num).await {
                Ok(block) => block,
                Err(e) => {
                    warn!(
                        target: "batch-queue",
                        "failed to fetch L2 block number {parent_num}: {e}"
                    );
                    // Unable to validate the batch for now. Retry later.
                    return BatchValidity::Undecided;
                }
            };
        }
        if !self.check_parent_hash(parent_block.block_info.hash) {
            warn!(
                target: "batch-queue",
                "parent block number mismatch, expected: {parent_num}, received: {}, parent hash: {}, parent hash check: {}",
                parent_block.block_info.number,
                parent_block.block_info.hash,
                self.parent_check
            );
            return BatchValidity::Drop;
        }

        // Filter out batches that were included too late.
        if starting_epoch_num + cfg.seq_window_size < inclusion_block.number {
            warn!(target: "batch-queue", "batch was included too late, sequence window expired");
            return BatchValidity::Drop;
        }

        // Check the L1 origin of the batch
        if starting_epoch_num > parent_block.l1_origin.number + 1 {
            warn!(
                target: "batch-queue",
                "batch is for future epoch too far ahead, while it has the next timestamp, so it must be invalid. starting epoch: {starting_epoch_num} | next epoch: {}",
                parent_block.l1_origin.number + 1
            );
            return BatchValidity::Drop;
        }

        // Verify the l1 origin hash for each l1 block.
        let end_epoch_num = self.final_epoch_num();
        let Some(end_origin) = l1_blocks.iter().find(|b| b.number == end_epoch_num) else {
            info!(
                target: "batch-queue",
                "need more l1 blocks to check entire origins of span batch"
            );
            return BatchValidity::Undecided;
        };
        if !self.check_origin_hash(end_origin.hash) {
            warn!(
                target: "batch-queue",
                "batch is for different L1 chain, epoch hash does not match, expected: {}",
                end_origin.hash
            );
            return BatchValidity::Drop;
        }

        if starting_epoch_num < parent_block.l1_origin.number {
            warn!(
                target: "batch-queue",
                "dropped batch, epoch is too old, minimum: {}",
                parent_block.l1_origin
            );
            return BatchValidity::Drop;
        }

        let mut origin_index = 0;
        let mut origin_advanced = starting_epoch_num == parent_block.l1_origin.number + 1;
        for (i, batch) in self.batches.iter().enumerate() {
            if batch.timestamp <= l2_safe_head.block_info.timestamp {
                continue;
            }
            // Find the L1 origin for the batch.
            let mut l1_origin = BlockInfo::default();
            for (j, block) in l1_blocks.iter().enumerate().skip(origin_index) {
                if batch.epoch_num == block.number {
                    l1_origin = *block;
                    origin_index = j;
                    break;
                }
            }
            if i > 0 {
                origin_advanced = false;
                if batch.epoch_num > self.batches[i - 1].epoch_num {
                    origin_advanced = true;
                }
            }
            let block_timestamp = batch.timestamp;
            if block_timestamp < l1_origin.timestamp {
                warn!(
                    target: "batch-queue",
                    "block timestamp is less than L1 origin timestamp, l2_timestamp: {block_timestamp}, l1_timestamp: {}, origin: {}",
                    l1_origin.timestamp,
                    l1_origin.id()
                );
                return BatchValidity::Drop;
            }

            // Check if we ran out of sequencer time drift
            let max_drift = cfg.max_sequencer_drift(l1_origin.timestamp) + l1_origin.timestamp;
            if block_timestamp > max_drift {
                if batch.transactions.is_empty() {
                    // If the sequencer is co-operating by producing an empty batch,
                    // then allow the batch if it was the right thing to do to maintain the L2
                    // time >= L1 time invariant. We only check batches that do not advance the
                    // epoch, to ensure epoch advancement regardless of time drift is allowed.
                    if !origin_advanced {
                        let Some(next_origin) = l1_blocks.get(origin_index + 1) else {
                            info!(
                                target: "batch-queue",
                                "without the next L1 origin we cannot determine yet if this empty batch that exceeds the time drift is still valid"
                            );
                            return BatchValidity::Undecided;
                        };
                        // Check if the next L1 Origin could have been adopted
                        if block_timestamp >= next_origin.timestamp {
                            warn!(
                                target: "batch-queue",
                                "batch exceeded sequencer time drift without adopting next origin, and next L1 origin would have been valid"
                            );
                            return BatchValidity::Drop;
                        }
                        info!(
                            target: "batch-queue",
                            "continuing with empty batch before late L1 block to preserve L2 time invariant"
                        );
                    }
                } else {
                    // If the sequencer is ignoring the time drift rule, then drop the batch and
                    // force an empty batch instead, as the sequencer is not allowed to include
                    // anything past this point without moving to the next epoch.
                    warn!(
                        target: "batch-queue",
                        "batch exceeded sequencer time drift, sequencer must adopt new L1 origin to include transactions again, max_time: {max_drift}"
                    );
                    return BatchValidity::Drop;
                }
            }

            // Check that the transactions are not empty and do not contain any deposits.
            for (tx_index, tx) in batch.transactions.iter().enumerate() {
                if tx.is_empty() {
                    warn!(
                        target: "batch-queue",
                        "transaction data must not be empty, but found empty tx, tx_index: {tx_index}"
                    );
                    return BatchValidity::Drop;
                }
                if tx.is_deposit() {
                    warn!(
                        target: "batch-queue",
                        "sequencers may not embed any deposits into batch data, but found tx that has one, tx_index: {tx_index}"
                    );
                    return BatchValidity::Drop;
                }
            }
        }

        // Check overlapped blocks
        if self.starting_timestamp() < next_timestamp {
            for i in 0..(l2_safe_head.block_info.number - parent_num) {
                let safe_block_num = parent_num + i + 1;
                let safe_block = match fetcher.block_by_number(safe_block_num).await {
                    Ok(block) => block,
                    Err(e) => {
                        warn!(
                            target: "batch-queue",
                            "failed to fetch L2 block number {safe_block_num}: {e}"
                        );
                        // Unable to validate the batch for now. Retry later.
                        return BatchValidity::Undecided;
                    }
                };
                let Some(element) = self.batches.get(i as usize) else {
                    warn!(
                        target: "batch-queue",
                        "overlapped block {safe_block_num} is missing from the span batch"
                    );
                    return BatchValidity::Drop;
                };
                // The safe block carries its deposits, the batch does not.
                let safe_block_txs =
                    safe_block.user_transactions().collect::<Vec<&RawTransaction>>();
                if safe_block_txs.len() != element.transactions.len() {
                    warn!(
                        target: "batch-queue",
                        "overlapped block's tx count does not match, safe_block_txs: {}, batch_txs: {}",
                        safe_block_txs.len(),
                        element.transactions.len()
                    );
                    return BatchValidity::Drop;
                }
                if safe_block_txs.iter().zip(element.transactions.iter()).any(|(a, b)| *a != b) {
                    warn!(target: "batch-queue", "overlapped block's transaction does not match");
                    return BatchValidity::Drop;
                }
                if safe_block.info.l1_origin.number != element.epoch_num {
                    warn!(
                        target: "batch-queue",
                        "overlapped block's L1 origin number does not match {}, {}",
                        safe_block.info.l1_origin.number,
                        element.epoch_num
                    );
                    return BatchValidity::Drop;
                }
            }
        }

        BatchValidity::Accept
    }
}
