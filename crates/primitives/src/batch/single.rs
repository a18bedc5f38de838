//! This module contains the [SingleBatch] type.

use super::BatchValidity;
use crate::{BlockID, BlockInfo, L2BlockInfo, RawTransaction, RollupConfig};
use alloy_primitives::BlockHash;
use alloy_rlp::{RlpDecodable, RlpEncodable};
use tracing::{info, warn};

/// Represents a single batch: a single encoded L2 block
#[derive(Debug, Default, RlpEncodable, RlpDecodable, Clone, PartialEq, Eq)]
pub struct SingleBatch {
    /// Block hash of the previous L2 block
    pub parent_hash: BlockHash,
    /// The batch epoch number. Same as the first L1 block number in the epoch.
    pub epoch_num: u64,
    /// The block hash of the first L1 block in the epoch
    pub epoch_hash: BlockHash,
    /// The L2 block timestamp of this batch
    pub timestamp: u64,
    /// The L2 block transactions in this batch
    pub transactions: Vec<RawTransaction>,
}

impl SingleBatch {
    /// If any transactions are empty or deposited transaction types.
    pub fn has_invalid_transactions(&self) -> bool {
        self.transactions.iter().any(|tx| tx.is_empty() || tx.is_deposit())
    }

    /// Returns the [BlockID] of the batch's epoch.
    pub const fn epoch(&self) -> BlockID {
        BlockID { number: self.epoch_num, hash: self.epoch_hash }
    }

    /// Checks if the batch can be applied on top of `l2_safe_head`.
    ///
    /// `l1_blocks` starts at the L1 origin of the safe head. With a single L1 block the decision
    /// may have to stay [BatchValidity::Undecided].
    pub fn check_batch(
        &self,
        cfg: &RollupConfig,
        l1_blocks: &[BlockInfo],
        l2_safe_head: L2BlockInfo,
        inclusion_block: &BlockInfo,
    ) -> BatchValidity {
        let Some(epoch) = l1_blocks.first() else {
            return BatchValidity::Undecided;
        };

        let next_timestamp = l2_safe_head.block_info.timestamp + cfg.block_time;
        if self.timestamp > next_timestamp {
            info!(
                target: "batch-queue",
                "Received out-of-order batch for future processing after next batch ({} > {})",
                self.timestamp,
                next_timestamp
            );
            return BatchValidity::Future;
        }
        if self.timestamp < next_timestamp {
            warn!(
                target: "batch-queue",
                "Dropping batch with old timestamp, min_timestamp: {next_timestamp}"
            );
            return BatchValidity::Drop;
        }

        // Dependent on the above timestamp check.
        // If the timestamp is correct, then it must build on top of the safe head.
        if self.parent_hash != l2_safe_head.block_info.hash {
            warn!(
                target: "batch-queue",
                "ignoring batch with mismatching parent hash {}, current safe head: {}",
                self.parent_hash,
                l2_safe_head.block_info.hash
            );
            return BatchValidity::Drop;
        }

        // Filter out batches that were included too late.
        if self.epoch_num + cfg.seq_window_size < inclusion_block.number {
            warn!(target: "batch-queue", "Batch was included too late, sequence window expired");
            return BatchValidity::Drop;
        }

        // Check the L1 origin of the batch
        let batch_origin = if self.epoch_num < epoch.number {
            warn!(
                target: "batch-queue",
                "dropped batch, epoch is too old, minimum: {}",
                epoch.id()
            );
            return BatchValidity::Drop;
        } else if self.epoch_num == epoch.number {
            // Batch is sticking to the current epoch, continue.
            *epoch
        } else if self.epoch_num == epoch.number + 1 {
            // With only one l1Block we cannot look at the next L1 Origin.
            // Note: This means that we are unable to determine validity of a batch
            // without more information. In this case we should bail out until we have
            // more information otherwise the eager algorithm may diverge from a non-eager
            // algorithm.
            match l1_blocks.get(1) {
                Some(next) => *next,
                None => {
                    info!(
                        target: "batch-queue",
                        "Eager batch wants to advance epoch {}, but could not without more L1 blocks",
                        epoch.id()
                    );
                    return BatchValidity::Undecided;
                }
            }
        } else {
            warn!(
                target: "batch-queue",
                "Batch is for future epoch too far ahead, while it has the next timestamp, so it must be invalid. Current epoch: {}",
                epoch.id()
            );
            return BatchValidity::Drop;
        };

        if self.epoch_hash != batch_origin.hash {
            warn!(
                target: "batch-queue",
                "Batch is for different L1 chain, epoch hash does not match, expected: {}",
                batch_origin.id()
            );
            return BatchValidity::Drop;
        }

        if self.timestamp < batch_origin.timestamp {
            warn!(
                target: "batch-queue",
                "block timestamp is less than L1 origin timestamp, l2_timestamp: {}, l1_timestamp: {}, origin: {}",
                self.timestamp,
                batch_origin.timestamp,
                batch_origin.id()
            );
            return BatchValidity::Drop;
        }

        // Check if we ran out of sequencer time drift
        let max_drift = cfg.max_sequencer_drift(batch_origin.timestamp) + batch_origin.timestamp;
        if self.timestamp > max_drift {
            if self.transactions.is_empty() {
                // If the sequencer is co-operating by producing an empty batch,
                // allow the batch if it was the right thing to do to maintain the L2 time >= L1
                // time invariant. We only check batches that do not advance the epoch, to ensure
                // epoch advancement regardless of time drift is allowed.
                if epoch.number == batch_origin.number {
                    let Some(next_origin) = l1_blocks.get(1) else {
                        info!(
                            target: "batch-queue",
                            "without the next L1 origin we cannot determine yet if this empty batch that exceeds the time drift is still valid"
                        );
                        return BatchValidity::Undecided;
                    };
                    // Check if the next L1 Origin could have been adopted
                    if self.timestamp >= next_origin.timestamp {
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
                // If the sequencer is ignoring the time drift rule, then drop the batch and force
                // an empty batch instead, as the sequencer is not allowed to include anything
                // past this point without moving to the next epoch.
                warn!(
                    target: "batch-queue",
                    "batch exceeded sequencer time drift, sequencer must adopt new L1 origin to include transactions again, max_time: {max_drift}"
                );
                return BatchValidity::Drop;
            }
        }

        // We can do this check earlier, but it's intensive so we do it last for the sad-path.
        for (i, tx) in self.transactions.iter().enumerate() {
            if tx.is_empty() {
                warn!(
                    target: "batch-queue",
                    "transaction data must not be empty, but found empty tx at index {i}"
                );
                return BatchValidity::Drop;
            }
            if tx.is_deposit() {
                warn!(
                    target: "batch-queue",
                    "sequencers may not embed any deposits into batch data, but found tx that has one at index: {i}"
                );
                return BatchValidity::Drop;
            }
        }

        BatchValidity::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CollectingLayer, TraceStorage};
    use alloy_primitives::{b256, B256};
    use alloy_rlp::{Decodable, Encodable};
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    fn l1_block(number: u64, timestamp: u64) -> BlockInfo {
        BlockInfo {
            number,
            timestamp,
            hash: B256::with_last_byte(number as u8),
            ..Default::default()
        }
    }

    fn safe_head() -> L2BlockInfo {
        L2BlockInfo {
            block_info: BlockInfo {
                number: 40,
                timestamp: 100,
                hash: b256!("1111111111111111111111111111111111111111111111111111111111111111"),
                ..Default::default()
            },
            l1_origin: BlockID { number: 10, hash: B256::with_last_byte(10) },
            seq_num: 0,
        }
    }

    fn config() -> RollupConfig {
        RollupConfig {
            block_time: 2,
            max_sequencer_drift: 600,
            seq_window_size: 100,
            ..Default::default()
        }
    }

    fn next_batch() -> SingleBatch {
        SingleBatch {
            parent_hash: safe_head().block_info.hash,
            epoch_num: 10,
            epoch_hash: B256::with_last_byte(10),
            timestamp: 102,
            transactions: vec![RawTransaction::from(vec![0x02, 0xC0])],
        }
    }

    #[test]
    fn test_single_batch_rlp_roundtrip() {
        let single_batch = SingleBatch {
            parent_hash: B256::ZERO,
            epoch_num: 0xFF,
            epoch_hash: B256::ZERO,
            timestamp: 0xEE,
            transactions: vec![RawTransaction::from(vec![0x00])],
        };

        let mut out_buf = Vec::new();
        single_batch.encode(&mut out_buf);
        let decoded = SingleBatch::decode(&mut out_buf.as_slice()).unwrap();
        assert_eq!(decoded, single_batch);
        assert!(!single_batch.has_invalid_transactions());
    }

    #[test]
    fn test_single_batch_invalid_transactions() {
        let single_batch = SingleBatch {
            transactions: vec![RawTransaction::from(vec![0x7E])],
            ..Default::default()
        };
        assert!(single_batch.has_invalid_transactions());
    }

    #[test]
    fn test_check_batch_accept() {
        let l1_blocks = [l1_block(10, 90), l1_block(11, 110)];
        let validity =
            next_batch().check_batch(&config(), &l1_blocks, safe_head(), &l1_block(12, 120));
        assert_eq!(validity, BatchValidity::Accept);
    }

    #[test]
    fn test_check_batch_no_l1_blocks() {
        let validity = next_batch().check_batch(&config(), &[], safe_head(), &l1_block(12, 120));
        assert_eq!(validity, BatchValidity::Undecided);
    }

    #[test]
    fn test_check_batch_timestamps() {
        let l1_blocks = [l1_block(10, 90)];
        let future = SingleBatch { timestamp: 104, ..next_batch() };
        assert_eq!(
            future.check_batch(&config(), &l1_blocks, safe_head(), &l1_block(12, 120)),
            BatchValidity::Future
        );
        let old = SingleBatch { timestamp: 100, ..next_batch() };
        assert_eq!(
            old.check_batch(&config(), &l1_blocks, safe_head(), &l1_block(12, 120)),
            BatchValidity::Drop
        );
    }

    #[test]
    fn test_check_batch_old_epoch_dropped() {
        let trace_store: TraceStorage = Default::default();
        let layer = CollectingLayer::new(trace_store.clone());
        let subscriber = tracing_subscriber::Registry::default().with(layer);
        let _guard = tracing::subscriber::set_default(subscriber);

        let l1_blocks = [l1_block(10, 90), l1_block(11, 110)];
        let batch =
            SingleBatch { epoch_num: 9, epoch_hash: B256::with_last_byte(9), ..next_batch() };
        assert_eq!(
            batch.check_batch(&config(), &l1_blocks, safe_head(), &l1_block(12, 120)),
            BatchValidity::Drop
        );

        let warns = trace_store.get_by_level(Level::WARN);
        assert_eq!(warns.len(), 1);
        assert!(warns[0].contains("dropped batch, epoch is too old"));
    }

    #[test]
    fn test_check_batch_next_epoch_needs_l1_block() {
        let batch =
            SingleBatch { epoch_num: 11, epoch_hash: B256::with_last_byte(11), ..next_batch() };
        assert_eq!(
            batch.check_batch(&config(), &[l1_block(10, 90)], safe_head(), &l1_block(12, 120)),
            BatchValidity::Undecided
        );
        let l1_blocks = [l1_block(10, 90), l1_block(11, 102)];
        assert_eq!(
            batch.check_batch(&config(), &l1_blocks, safe_head(), &l1_block(12, 120)),
            BatchValidity::Accept
        );
        let far = SingleBatch { epoch_num: 12, ..next_batch() };
        assert_eq!(
            far.check_batch(&config(), &l1_blocks, safe_head(), &l1_block(12, 120)),
            BatchValidity::Drop
        );
    }

    #[test]
    fn test_check_batch_sequence_window_expired() {
        let l1_blocks = [l1_block(10, 90), l1_block(11, 110)];
        assert_eq!(
            next_batch().check_batch(&config(), &l1_blocks, safe_head(), &l1_block(111, 2000)),
            BatchValidity::Drop
        );
    }

    #[test]
    fn test_check_batch_sequencer_drift() {
        let cfg = RollupConfig { max_sequencer_drift: 5, ..config() };
        let l1_blocks = [l1_block(10, 90), l1_block(11, 110)];

        // Non-empty batches past the drift are dropped.
        assert_eq!(
            next_batch().check_batch(&cfg, &l1_blocks, safe_head(), &l1_block(12, 120)),
            BatchValidity::Drop
        );

        // Empty batches are kept while the next origin is still ahead of them.
        let empty = SingleBatch { transactions: vec![], ..next_batch() };
        assert_eq!(
            empty.check_batch(&cfg, &l1_blocks, safe_head(), &l1_block(12, 120)),
            BatchValidity::Accept
        );
        assert_eq!(
            empty.check_batch(&cfg, &l1_blocks[..1], safe_head(), &l1_block(12, 120)),
            BatchValidity::Undecided
        );
        let late = [l1_block(10, 90), l1_block(11, 101)];
        assert_eq!(
            empty.check_batch(&cfg, &late, safe_head(), &l1_block(12, 120)),
            BatchValidity::Drop
        );
    }

    #[test]
    fn test_check_batch_deposit_dropped() {
        let l1_blocks = [l1_block(10, 90), l1_block(11, 110)];
        let batch = SingleBatch {
            transactions: vec![RawTransaction::from(vec![0x7E, 0x01])],
            ..next_batch()
        };
        assert_eq!(
            batch.check_batch(&config(), &l1_blocks, safe_head(), &l1_block(12, 120)),
            BatchValidity::Drop
        );
    }
}
