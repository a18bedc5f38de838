//! Contains the [ChannelManager], which turns a stream of L2 blocks into frames to publish.

use crate::{
    channel::{random_channel_id, ChannelOut, FrameId, TxData},
    compressor::BatchCompressor,
    config::ChannelConfig,
    errors::{ChannelError, ChannelManagerError, ConfigError},
};
use alloy_primitives::{hex, B256};
use ferry_primitives::{BlockID, L2Block, RollupConfig};
use std::{collections::VecDeque, sync::Arc};
use tracing::{debug, error, info, warn};

/// The [ChannelManager] buffers L2 blocks, packs them into channels and hands out their frames.
///
/// At most one channel is open at a time: the last channel in the queue, while it is not full.
/// Closed channels stay queued until all of their frames are confirmed.
#[derive(Debug)]
pub struct ChannelManager {
    /// The channel configuration.
    config: ChannelConfig,
    /// The rollup configuration.
    rollup_config: Arc<RollupConfig>,
    /// Blocks not yet added to a channel.
    blocks: VecDeque<L2Block>,
    /// Channels in the order they were opened.
    channels: VecDeque<ChannelOut<BatchCompressor>>,
    /// The hash of the last added block.
    tip: Option<B256>,
    /// Whether the manager stopped opening channels.
    closed: bool,
}

impl ChannelManager {
    /// Creates a new, empty [ChannelManager]. Fails if the configuration cannot produce valid
    /// batcher transactions.
    pub fn new(
        config: ChannelConfig,
        rollup_config: Arc<RollupConfig>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            rollup_config,
            blocks: VecDeque::new(),
            channels: VecDeque::new(),
            tip: None,
            closed: false,
        })
    }

    /// Returns the channel configuration.
    pub const fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Returns the number of blocks waiting for a channel.
    pub fn pending_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the number of channels that are not yet fully submitted.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Returns the hash of the last added block.
    pub const fn tip(&self) -> Option<B256> {
        self.tip
    }

    /// Returns `true` if the manager was closed.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Queues an L2 block. The block must extend the previously added one.
    pub fn add_l2_block(&mut self, block: L2Block) -> Result<(), ChannelManagerError> {
        if let Some(tip) = self.tip {
            if block.parent_hash() != tip {
                warn!(
                    target: "channel-manager",
                    "Reorg detected at L2 block {}: parent {} does not match tip {}",
                    block.number(),
                    block.parent_hash(),
                    tip
                );
                return Err(ChannelManagerError::Reorg { expected: tip, got: block.parent_hash() });
            }
        }
        debug!(target: "channel-manager", "Added L2 block {} ({})", block.number(), block.hash());
        self.tip = Some(block.hash());
        self.blocks.push_back(block);
        Ok(())
    }

    /// Returns the next frame to publish, or [None] if no data is ready.
    ///
    /// Frames of older channels are handed out first. Otherwise pending blocks are packed into the
    /// open channel, opening one if needed, and the channel is cut into frames once it is full or
    /// timed out at `l1_head`.
    ///
    /// A block that cannot be put into any channel is dropped and reported as
    /// [ChannelManagerError::InvalidBlock]. Any other channel error abandons the open channel and
    /// queues its blocks again, so the next call rebuilds it.
    pub fn tx_data(&mut self, l1_head: BlockID) -> Result<Option<TxData>, ChannelManagerError> {
        if let Some(tx) = self.next_tx_data() {
            return Ok(Some(tx));
        }
        if self.closed {
            return Ok(None);
        }

        let has_open_channel = self.channels.back().is_some_and(|c| !c.is_full());
        if !has_open_channel {
            if self.blocks.is_empty() {
                return Ok(None);
            }
            self.open_channel(l1_head);
        }

        match self.fill_open_channel(l1_head) {
            Ok(()) => Ok(self.next_tx_data()),
            Err(e @ ChannelManagerError::InvalidBlock { .. }) => Err(e),
            Err(e) => {
                self.abandon_open_channel();
                Err(e)
            }
        }
    }

    /// Adds pending blocks to the open channel until it is full, then outputs its frames.
    fn fill_open_channel(&mut self, l1_head: BlockID) -> Result<(), ChannelManagerError> {
        let Some(channel) = self.channels.back_mut() else {
            return Ok(());
        };
        channel.check_timeout(l1_head.number);
        while let Some(block) = self.blocks.front() {
            match channel.add_block(block) {
                Ok(()) => {
                    self.blocks.pop_front();
                }
                Err(ChannelError::Full(_)) => break,
                Err(e) if e.is_block_error() => {
                    let number = block.number();
                    error!(target: "channel-manager", "Dropping L2 block {}: {}", number, e);
                    self.blocks.pop_front();
                    return Err(ChannelManagerError::InvalidBlock { number, source: e });
                }
                Err(e) => return Err(e.into()),
            }
        }
        if channel.blocks().is_empty() {
            if channel.is_full() {
                self.channels.pop_back();
            }
            return Ok(());
        }
        channel.output_frames()?;
        Ok(())
    }

    /// Drops the open channel and puts its blocks back at the front of the queue.
    fn abandon_open_channel(&mut self) {
        let Some(channel) = self.channels.pop_back() else {
            return;
        };
        warn!(
            target: "channel-manager",
            "Abandoning channel {} with {} blocks",
            hex::encode(channel.id()),
            channel.blocks().len()
        );
        for block in channel.into_blocks().into_iter().rev() {
            self.blocks.push_front(block);
        }
    }

    fn open_channel(&mut self, l1_head: BlockID) {
        let mut channel = ChannelOut::new(
            random_channel_id(),
            self.config,
            Arc::clone(&self.rollup_config),
            BatchCompressor::from(&self.config),
        );
        if self.config.max_channel_duration > 0 {
            channel.update_timeout(l1_head.number.saturating_add(self.config.max_channel_duration));
        }
        info!(
            target: "channel-manager",
            "Opened channel {} at L1 block {} with {} pending blocks",
            hex::encode(channel.id()),
            l1_head.number,
            self.blocks.len()
        );
        self.channels.push_back(channel);
    }

    fn next_tx_data(&mut self) -> Option<TxData> {
        self.channels.iter_mut().find(|c| c.has_frame()).and_then(|c| c.next_frame())
    }

    fn channel_index(&self, id: &FrameId) -> Option<usize> {
        self.channels.iter().position(|c| c.id() == id.channel_id)
    }

    /// Marks the transaction carrying the frame as failed, queueing the frame for resubmission.
    pub fn tx_failed(&mut self, id: FrameId) {
        match self.channel_index(&id) {
            Some(index) => {
                self.channels[index].tx_failed(id.number);
            }
            None => {
                warn!(target: "channel-manager", "Failed transaction for unknown channel {}", id);
            }
        }
    }

    /// Marks the transaction carrying the frame as included in `inclusion_block`.
    ///
    /// A fully confirmed channel is dropped. If the channel timed out on L1, it is dropped
    /// together with every later channel and their blocks are queued again, in order.
    pub fn tx_confirmed(&mut self, id: FrameId, inclusion_block: BlockID) {
        let Some(index) = self.channel_index(&id) else {
            warn!(target: "channel-manager", "Confirmed transaction for unknown channel {}", id);
            return;
        };

        if self.channels[index].tx_confirmed(id.number, inclusion_block) {
            self.requeue_channels_from(index);
            return;
        }
        if self.channels[index].is_fully_submitted() {
            self.channels.remove(index);
        }
    }

    fn requeue_channels_from(&mut self, index: usize) {
        let dropped: Vec<_> = self.channels.drain(index..).collect();
        let blocks: Vec<L2Block> = dropped.into_iter().flat_map(ChannelOut::into_blocks).collect();
        warn!(
            target: "channel-manager",
            "Channel timed out on L1, requeueing {} blocks",
            blocks.len()
        );
        for block in blocks.into_iter().rev() {
            self.blocks.push_front(block);
        }
    }

    /// Returns every frame handed to the publisher but not yet confirmed to its ready queue.
    pub fn requeue_pending(&mut self) -> usize {
        let count: usize = self.channels.iter_mut().map(ChannelOut::requeue_pending).sum();
        if count > 0 {
            info!(target: "channel-manager", "Requeued {} in-flight frames", count);
        }
        count
    }

    /// Stops opening channels. The open channel is closed and cut into frames, or dropped if it
    /// holds no blocks; the frames of queued channels remain available from [Self::tx_data].
    pub fn close(&mut self) -> Result<(), ChannelManagerError> {
        if self.closed {
            return Err(ChannelManagerError::Closed);
        }
        self.closed = true;
        info!(
            target: "channel-manager",
            "Closing channel manager with {} pending blocks",
            self.blocks.len()
        );
        if self.channels.back().is_some_and(|c| !c.is_closed() && c.blocks().is_empty()) {
            self.channels.pop_back();
        }
        if let Some(channel) = self.channels.back_mut() {
            channel.close()?;
        }
        Ok(())
    }

    /// Drops all blocks and channels, typically after a reorg.
    pub fn clear(&mut self) {
        info!(target: "channel-manager", "Clearing channel manager state");
        self.blocks.clear();
        self.channels.clear();
        self.tip = None;
        self.closed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::FullReason, test_utils::collect_traces};
    use ferry_primitives::{
        Batch, BatchReader, BlockInfo, Channel, Frame, L2BlockInfo, RawTransaction,
    };
    use tracing::Level;

    fn block(number: u64, epoch: u64) -> L2Block {
        let info = BlockInfo {
            number,
            hash: B256::with_last_byte(number as u8),
            parent_hash: B256::with_last_byte(number as u8 - 1),
            timestamp: 100 + 2 * number,
        };
        let origin = BlockID { number: epoch, hash: B256::repeat_byte(0xE0 + epoch as u8) };
        L2Block { info: L2BlockInfo::new(info, origin, number), transactions: vec![] }
    }

    fn l1(number: u64) -> BlockID {
        BlockID { number, hash: B256::repeat_byte(0x11) }
    }

    fn manager(max_frame_size: usize, target_num_frames: usize) -> ChannelManager {
        let config = ChannelConfig { max_frame_size, target_num_frames, ..Default::default() };
        ChannelManager::new(config, Arc::new(RollupConfig::default())).unwrap()
    }

    fn drain(manager: &mut ChannelManager, head: u64) -> Vec<TxData> {
        core::iter::from_fn(|| manager.tx_data(l1(head)).unwrap()).collect()
    }

    /// Reassembles the frames of one channel and decodes its batches.
    fn decode_channel(txs: &[TxData]) -> Vec<Batch> {
        let frames: Vec<Frame> =
            txs.iter().flat_map(|tx| Frame::parse_frames(&tx.to_bytes()).unwrap()).collect();
        let mut channel = Channel::new(frames[0].id, BlockInfo::default());
        for frame in frames {
            channel.add_frame(frame, BlockInfo::default()).unwrap();
        }
        let cfg = RollupConfig { block_time: 2, ..Default::default() };
        let mut reader = BatchReader::new(channel.frame_data().unwrap().to_vec(), 10_000_000);
        core::iter::from_fn(|| reader.next_batch(&cfg).unwrap()).collect()
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let rollup_config = Arc::new(RollupConfig::default());
        let config = ChannelConfig { max_frame_size: 0, ..Default::default() };
        assert_eq!(
            ChannelManager::new(config, Arc::clone(&rollup_config)).err(),
            Some(ConfigError::ZeroFrameSize)
        );
        let config = ChannelConfig { target_num_frames: 0, ..Default::default() };
        assert_eq!(
            ChannelManager::new(config, rollup_config).err(),
            Some(ConfigError::ZeroTargetFrames)
        );
    }

    #[test]
    fn test_oversized_block_is_dropped() {
        let (traces, _guard) = collect_traces();
        let mut manager = manager(120_000, 1);
        let mut oversized = block(1, 0);
        oversized.transactions = vec![RawTransaction::from(vec![0x02; 10_000_001])];
        manager.add_l2_block(oversized).unwrap();

        let err = manager.tx_data(l1(1)).unwrap_err();
        assert!(matches!(
            err,
            ChannelManagerError::InvalidBlock {
                number: 1,
                source: ChannelError::OversizedBlock { max: 10_000_000, .. }
            }
        ));
        assert_eq!(traces.get_by_level(Level::ERROR).len(), 1);

        // No empty channel is published and the manager stays idle.
        for _ in 0..5 {
            assert_eq!(manager.tx_data(l1(1)).unwrap(), None);
        }
        assert_eq!(manager.pending_blocks(), 0);
        assert!(manager.channel_count() <= 1);

        manager.add_l2_block(block(2, 0)).unwrap();
        assert_eq!(manager.tx_data(l1(1)).unwrap(), None);
        manager.close().unwrap();
        let txs = drain(&mut manager, 1);
        assert_eq!(txs.len(), 1);
        let batches = decode_channel(&txs);
        assert_eq!(batches.len(), 1);
        let Batch::Single(batch) = &batches[0] else { panic!("expected a single batch") };
        assert_eq!(batch.timestamp, 104);
    }

    #[test]
    fn test_unencodable_block_is_dropped_from_span() {
        let config = ChannelConfig { span_batches: true, ..Default::default() };
        let mut manager = ChannelManager::new(config, Arc::new(RollupConfig::default())).unwrap();
        for n in 1..=3 {
            let mut block = block(n, 0);
            if n == 2 {
                block.transactions = vec![RawTransaction::from(vec![0x05, 0xC0])];
            }
            manager.add_l2_block(block).unwrap();
        }

        let err = manager.tx_data(l1(1)).unwrap_err();
        assert!(matches!(
            err,
            ChannelManagerError::InvalidBlock { number: 2, source: ChannelError::BatchEncoding(_) }
        ));
        assert_eq!(manager.tx_data(l1(1)).unwrap(), None);
        manager.close().unwrap();
        let txs = drain(&mut manager, 1);
        assert_eq!(manager.pending_blocks(), 0);

        let batches = decode_channel(&txs);
        assert_eq!(batches.len(), 1);
        let Batch::Span(span) = &batches[0] else { panic!("expected a span batch") };
        assert_eq!(span.batches.len(), 2);
    }

    #[test]
    fn test_abandoned_channel_requeues_blocks_in_order() {
        let mut manager = manager(1_000, 10);
        for n in 1..=3 {
            manager.add_l2_block(block(n, 0)).unwrap();
        }
        assert_eq!(manager.tx_data(l1(1)).unwrap(), None);
        manager.add_l2_block(block(4, 0)).unwrap();
        assert_eq!(manager.pending_blocks(), 1);

        manager.abandon_open_channel();
        assert_eq!(manager.channel_count(), 0);
        let numbers: Vec<u64> = manager.blocks.iter().map(L2Block::number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);

        // The next call rebuilds the channel from the requeued blocks.
        assert_eq!(manager.tx_data(l1(1)).unwrap(), None);
        assert_eq!(manager.pending_blocks(), 0);
        assert_eq!(manager.channels[0].blocks().len(), 4);
    }

    #[test]
    fn test_reorg_rejected() {
        let mut manager = manager(100, 1);
        manager.add_l2_block(block(1, 0)).unwrap();
        let mut orphan = block(2, 0);
        orphan.info.block_info.parent_hash = B256::repeat_byte(0xFF);
        assert_eq!(
            manager.add_l2_block(orphan),
            Err(ChannelManagerError::Reorg {
                expected: B256::with_last_byte(1),
                got: B256::repeat_byte(0xFF)
            })
        );
        assert_eq!(manager.pending_blocks(), 1);

        manager.clear();
        assert_eq!(manager.tip(), None);
        assert_eq!(manager.pending_blocks(), 0);
    }

    #[test]
    fn test_no_data_without_blocks() {
        let mut manager = manager(100, 1);
        assert_eq!(manager.tx_data(l1(1)).unwrap(), None);
        assert_eq!(manager.channel_count(), 0);
    }

    #[test]
    fn test_open_channel_waits_until_full() {
        let mut manager = manager(1_000, 10);
        manager.add_l2_block(block(1, 0)).unwrap();
        assert_eq!(manager.tx_data(l1(1)).unwrap(), None);
        assert_eq!(manager.channel_count(), 1);
        assert_eq!(manager.pending_blocks(), 0);
    }

    #[test]
    fn test_blocks_roundtrip_through_frames() {
        let (traces, _guard) = collect_traces();
        let mut manager = manager(30, 2);
        for n in 1..=20 {
            manager.add_l2_block(block(n, n / 4)).unwrap();
        }

        let mut txs = drain(&mut manager, 1);
        manager.close().unwrap();
        txs.extend(drain(&mut manager, 1));
        assert!(manager.channel_count() > 1);
        assert!(!traces.get_by_level(Level::INFO).is_empty());

        let mut channels: Vec<Channel> = Vec::new();
        for tx in &txs {
            let frame = Frame::parse_frames(&tx.to_bytes()).unwrap().remove(0);
            match channels.iter_mut().find(|c| c.id() == frame.id) {
                Some(channel) => channel.add_frame(frame, BlockInfo::default()).unwrap(),
                None => {
                    let mut channel = Channel::new(frame.id, BlockInfo::default());
                    channel.add_frame(frame, BlockInfo::default()).unwrap();
                    channels.push(channel);
                }
            }
        }

        let cfg = RollupConfig::default();
        let mut timestamps = Vec::new();
        for channel in channels {
            let mut reader = BatchReader::new(channel.frame_data().unwrap().to_vec(), 10_000_000);
            while let Some(batch) = reader.next_batch(&cfg).unwrap() {
                let Batch::Single(batch) = batch else { panic!("expected a single batch") };
                timestamps.push(batch.timestamp);
            }
        }
        assert_eq!(timestamps, (1..=20).map(|n| 100 + 2 * n).collect::<Vec<_>>());
    }

    #[test]
    fn test_failed_frame_is_resent() {
        let mut manager = manager(10, 1);
        for n in 1..=10 {
            manager.add_l2_block(block(n, 0)).unwrap();
        }
        let first = manager.tx_data(l1(1)).unwrap().unwrap();
        manager.tx_failed(first.id());
        assert_eq!(manager.tx_data(l1(1)).unwrap(), Some(first));
    }

    #[test]
    fn test_fully_confirmed_channel_is_dropped() {
        let mut manager = manager(1_000, 10);
        manager.add_l2_block(block(1, 0)).unwrap();
        assert_eq!(manager.tx_data(l1(1)).unwrap(), None);
        manager.close().unwrap();
        assert_eq!(manager.close(), Err(ChannelManagerError::Closed));

        let txs = drain(&mut manager, 1);
        assert_eq!(txs.len(), 1);
        assert!(txs[0].frame.is_last);
        assert_eq!(manager.channel_count(), 1);
        manager.tx_confirmed(txs[0].id(), l1(2));
        assert_eq!(manager.channel_count(), 0);
    }

    #[test]
    fn test_max_channel_duration_closes_channel() {
        let config = ChannelConfig { max_channel_duration: 5, ..Default::default() };
        let mut manager = ChannelManager::new(config, Arc::new(RollupConfig::default())).unwrap();
        manager.add_l2_block(block(1, 0)).unwrap();
        assert_eq!(manager.tx_data(l1(10)).unwrap(), None);
        manager.add_l2_block(block(2, 0)).unwrap();
        assert_eq!(manager.tx_data(l1(14)).unwrap(), None);
        let tx = manager.tx_data(l1(15)).unwrap().unwrap();
        assert!(tx.frame.is_last);
        assert_eq!(manager.channels[0].full_reason(), Some(FullReason::Timeout));
        assert_eq!(manager.channels[0].blocks().len(), 2);
    }

    #[test]
    fn test_inclusion_timeout_requeues_blocks() {
        let mut manager = manager(10, 1);
        for n in 1..=10 {
            manager.add_l2_block(block(n, 0)).unwrap();
        }
        let first = manager.tx_data(l1(1)).unwrap().unwrap();
        let second = manager.tx_data(l1(1)).unwrap().unwrap();
        assert_eq!(first.id().channel_id, second.id().channel_id);
        let queued = manager.pending_blocks();

        manager.tx_confirmed(first.id(), l1(10));
        manager.tx_confirmed(second.id(), l1(10 + manager.config().channel_timeout));
        assert_eq!(manager.channel_count(), 0);
        assert_eq!(manager.pending_blocks(), 10);
        assert!(queued < 10);

        // The requeued blocks are packed again, starting from the first block.
        let tx = manager.tx_data(l1(400)).unwrap().unwrap();
        assert_ne!(tx.id().channel_id, first.id().channel_id);
        assert_eq!(manager.channels[0].blocks()[0].number(), 1);
    }

    #[test]
    fn test_requeue_pending() {
        let mut manager = manager(10, 1);
        for n in 1..=10 {
            manager.add_l2_block(block(n, 0)).unwrap();
        }
        let first = manager.tx_data(l1(1)).unwrap().unwrap();
        let _second = manager.tx_data(l1(1)).unwrap().unwrap();
        assert_eq!(manager.requeue_pending(), 2);
        assert_eq!(manager.tx_data(l1(1)).unwrap(), Some(first));
    }
}
