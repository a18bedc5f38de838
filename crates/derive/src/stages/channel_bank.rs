//! This module contains the [ChannelBank] stage.

use crate::{
    errors::{PipelineError, PipelineResult},
    stages::ChannelReaderProvider,
    traits::{OriginAdvancer, OriginProvider, ResettableStage},
};
use alloy_primitives::{hex, Bytes};
use async_trait::async_trait;
use core::fmt::Debug;
use ferry_primitives::{BlockInfo, Channel, ChannelID, Frame, RollupConfig, SystemConfig};
use hashbrown::HashMap;
use std::{collections::VecDeque, sync::Arc};
use tracing::{debug, trace, warn};

/// Provides frames for the [ChannelBank] stage.
#[async_trait]
pub trait ChannelBankProvider {
    /// Retrieves the next [Frame] from the [FrameQueue] stage.
    ///
    /// [FrameQueue]: crate::stages::FrameQueue
    async fn next_frame(&mut self) -> PipelineResult<Frame>;
}

/// [ChannelBank] is a stateful stage that does the following:
/// 1. Unmarshalls frames from L1 transaction data
/// 2. Applies those frames to a channel
/// 3. Attempts to read from the channel when it is ready
/// 4. Prunes channels (not frames) when the channel bank is too large.
///
/// Note: we prune before we ingest data.
/// As we switch between ingesting data & reading, the prune step occurs at an odd point
/// Specifically, the channel bank is not allowed to become too large between successive calls
/// to `IngestData`. This means that we can do an ingest and then do a read while becoming too
/// large. [ChannelBank] buffers channel frames, and emits full channel data
#[derive(Debug)]
pub struct ChannelBank<P>
where
    P: ChannelBankProvider + OriginAdvancer + OriginProvider + ResettableStage + Debug,
{
    /// The rollup configuration.
    cfg: Arc<RollupConfig>,
    /// Map of channels by ID.
    channels: HashMap<ChannelID, Channel>,
    /// Channels in FIFO order.
    channel_queue: VecDeque<ChannelID>,
    /// The previous stage of the derivation pipeline.
    pub prev: P,
}

impl<P> ChannelBank<P>
where
    P: ChannelBankProvider + OriginAdvancer + OriginProvider + ResettableStage + Debug,
{
    /// Create a new [ChannelBank] stage.
    pub fn new(cfg: Arc<RollupConfig>, prev: P) -> Self {
        Self { cfg, channels: HashMap::new(), channel_queue: VecDeque::new(), prev }
    }

    /// Returns the size of the channel bank by accumulating over all channels.
    pub fn size(&self) -> usize {
        self.channels.values().map(|c| c.size()).sum()
    }

    /// Returns `true` if a channel opened at `open_block_number` has timed out at `origin`.
    fn is_timed_out(&self, open_block_number: u64, origin: &BlockInfo) -> bool {
        open_block_number + self.cfg.channel_timeout(origin.timestamp) < origin.number
    }

    /// Prunes the Channel bank, until it is below the max channel bank size.
    pub fn prune(&mut self) -> PipelineResult<()> {
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;
        let max_channel_bank_size = self.cfg.max_channel_bank_size(origin.timestamp);
        let mut total_size = self.size();
        while total_size > max_channel_bank_size {
            let id =
                self.channel_queue.pop_front().ok_or(PipelineError::ChannelBankEmpty.crit())?;
            let channel = self.channels.remove(&id).ok_or(PipelineError::ChannelNotFound.crit())?;
            warn!(
                target: "channel-bank",
                "Pruned channel {} ({} bytes) to respect the channel bank size limit",
                hex::encode(id),
                channel.size()
            );
            total_size -= channel.size();
        }
        Ok(())
    }

    /// Adds new L1 data to the channel bank. Should only be called after all data has been read.
    pub fn ingest_frame(&mut self, frame: Frame) -> PipelineResult<()> {
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;

        // Get the channel for the frame, or create a new one if it doesn't exist.
        let current_channel = self.channels.entry(frame.id).or_insert_with(|| {
            debug!(target: "channel-bank", "Opening channel {}", hex::encode(frame.id));
            self.channel_queue.push_back(frame.id);
            Channel::new(frame.id, origin)
        });
        let open_block_number = current_channel.open_block_number();

        // Check if the channel is not timed out. If it has, ignore the frame.
        if open_block_number + self.cfg.channel_timeout(origin.timestamp) < origin.number {
            warn!(
                target: "channel-bank",
                "Channel {} timed out (opened at {}, origin {}), ignoring frame {}",
                hex::encode(frame.id),
                open_block_number,
                origin.number,
                frame.number
            );
            return Ok(());
        }

        // Ingest the frame. If it fails, ignore the frame.
        let frame_id = frame.id;
        let frame_number = frame.number;
        if let Err(e) = current_channel.add_frame(frame, origin) {
            warn!(
                target: "channel-bank",
                "Dropping frame {} of channel {}: {e}",
                frame_number,
                hex::encode(frame_id)
            );
            return Ok(());
        }

        self.prune()
    }

    /// Read the raw data of the first channel, if it's timed-out or closed.
    ///
    /// Returns an error if there is nothing new to read.
    pub fn read(&mut self) -> PipelineResult<Option<Bytes>> {
        // Bail if there are no channels to read from.
        if self.channel_queue.is_empty() {
            trace!(target: "channel-bank", "No channels to read from");
            return Err(PipelineError::Eof.temp());
        }

        // Return an `Ok(None)` if the first channel is timed out. There may be more timed
        // out channels at the head of the queue and we want to remove them all.
        let first = self.channel_queue[0];
        let channel = self.channels.get(&first).ok_or(PipelineError::ChannelNotFound.crit())?;
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;
        if self.is_timed_out(channel.open_block_number(), &origin) {
            warn!(
                target: "channel-bank",
                "Channel {} timed out before completion, dropping it",
                hex::encode(first)
            );
            self.channels.remove(&first);
            self.channel_queue.pop_front();
            return Ok(None);
        }

        // At this point we have removed all timed out channels from the front of the
        // `channel_queue`. Pre-Canyon we simply check the first index.
        // Post-Canyon we read the entire channelQueue for the first ready channel.
        // If no channel is available, we return `PipelineError::Eof`.
        // Canyon is activated when the first L1 block whose time >= CanyonTime, not on the L2
        // timestamp.
        if !self.cfg.is_canyon_active(origin.timestamp) {
            return self.try_read_channel_at_index(0).map(Some);
        }

        let channel_data =
            (0..self.channel_queue.len()).find_map(|i| self.try_read_channel_at_index(i).ok());
        channel_data.map(Some).ok_or(PipelineError::Eof.temp())
    }

    /// Attempts to read the channel at the specified index. If the channel is not ready or timed
    /// out, it will return an error.
    /// If the channel read was successful, it will remove the channel from the channel queue.
    fn try_read_channel_at_index(&mut self, index: usize) -> PipelineResult<Bytes> {
        let channel_id = self.channel_queue[index];
        let channel =
            self.channels.get(&channel_id).ok_or(PipelineError::ChannelNotFound.crit())?;
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;

        let timed_out = self.is_timed_out(channel.open_block_number(), &origin);
        if timed_out || !channel.is_ready() {
            return Err(PipelineError::Eof.temp());
        }

        let frame_data = channel.frame_data();
        self.channels.remove(&channel_id);
        self.channel_queue.remove(index);
        debug!(target: "channel-bank", "Read channel {}", hex::encode(channel_id));

        frame_data.ok_or(PipelineError::ChannelNotFound.crit())
    }
}

#[async_trait]
impl<P> ChannelReaderProvider for ChannelBank<P>
where
    P: ChannelBankProvider + OriginAdvancer + OriginProvider + ResettableStage + Send + Debug,
{
    /// Pulls the next piece of data from the channel bank. Note that it attempts to pull data out
    /// of the channel bank prior to loading data in (unlike most other stages). This is to
    /// ensure maintain consistency around channel bank pruning which depends upon the order
    /// of operations.
    async fn next_data(&mut self) -> PipelineResult<Option<Bytes>> {
        match self.read() {
            Err(e) if e.is_eof() => {
                // Continue - we will attempt to load data into the channel bank.
            }
            data => return data,
        };

        // Load the data into the channel bank.
        let frame = self.prev.next_frame().await?;
        self.ingest_frame(frame)?;
        Err(PipelineError::NotEnoughData.temp())
    }
}

#[async_trait]
impl<P> OriginAdvancer for ChannelBank<P>
where
    P: ChannelBankProvider + OriginAdvancer + OriginProvider + ResettableStage + Send + Debug,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

impl<P> OriginProvider for ChannelBank<P>
where
    P: ChannelBankProvider + OriginAdvancer + OriginProvider + ResettableStage + Debug,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> ResettableStage for ChannelBank<P>
where
    P: ChannelBankProvider + OriginAdvancer + OriginProvider + ResettableStage + Send + Debug,
{
    async fn reset(&mut self, base: BlockInfo, system_config: &SystemConfig) -> PipelineResult<()> {
        self.prev.reset(base, system_config).await?;
        self.channels.clear();
        self.channel_queue = VecDeque::with_capacity(10);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::PipelineErrorKind,
        test_utils::{collect_traces, TestChannelBankProvider},
    };
    use alloy_primitives::B256;
    use ferry_batcher::{config::ChannelConfig, test_utils::test_l2_block, ChannelManager};
    use ferry_primitives::{
        params::{FRAME_OVERHEAD, MAX_CHANNEL_BANK_SIZE},
        Batch, BatchReader, BlockID, RawTransaction,
    };
    use proptest::prelude::*;
    use tracing::Level;

    fn origin(number: u64) -> BlockInfo {
        BlockInfo { number, ..Default::default() }
    }

    fn config() -> Arc<RollupConfig> {
        Arc::new(RollupConfig { channel_timeout: 10, ..Default::default() })
    }

    fn channel_frames(id: u8, data: &[u8], parts: usize) -> Vec<Frame> {
        let chunks: Vec<&[u8]> = data.chunks(data.len().div_ceil(parts).max(1)).collect();
        let last = chunks.len() - 1;
        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| Frame::new([id; 16], i as u16, chunk.to_vec(), i == last))
            .collect()
    }

    fn bank() -> ChannelBank<TestChannelBankProvider> {
        let mut mock = TestChannelBankProvider::new(vec![]);
        mock.block_info = Some(origin(0));
        ChannelBank::new(config(), mock)
    }

    #[test]
    fn test_ingest_empty_origin() {
        let mock = TestChannelBankProvider::new(vec![]);
        let mut channel_bank = ChannelBank::new(config(), mock);
        let frame = Frame::default();
        let err = channel_bank.ingest_frame(frame).unwrap_err();
        assert_eq!(err, PipelineError::MissingOrigin.crit());
    }

    #[test]
    fn test_read_empty_channel_bank() {
        let mut channel_bank = bank();
        let err = channel_bank.read().unwrap_err();
        assert_eq!(err, PipelineError::Eof.temp());
    }

    #[test]
    fn test_reassembles_frames_in_reverse_order() {
        let mut channel_bank = bank();
        let data = b"the quick brown fox jumps over the lazy dog".to_vec();
        let mut frames = channel_frames(0xAA, &data, 4);
        frames.reverse();
        for frame in frames {
            assert_eq!(channel_bank.read().unwrap_err(), PipelineError::Eof.temp());
            channel_bank.ingest_frame(frame).unwrap();
        }
        assert_eq!(channel_bank.read().unwrap(), Some(Bytes::from(data)));
        assert_eq!(channel_bank.size(), 0);
    }

    #[test]
    fn test_duplicate_frames_are_ignored() {
        let (traces, _guard) = collect_traces();
        let mut channel_bank = bank();
        let frame = Frame::new([0xAA; 16], 0, b"first".to_vec(), false);
        channel_bank.ingest_frame(frame.clone()).unwrap();
        channel_bank.ingest_frame(Frame { data: b"second".to_vec(), ..frame }).unwrap();
        channel_bank.ingest_frame(Frame::new([0xAA; 16], 1, b"!".to_vec(), true)).unwrap();
        assert_eq!(channel_bank.read().unwrap(), Some(Bytes::from_static(b"first!")));
        assert_eq!(traces.get_by_level(Level::WARN).len(), 1);
    }

    #[test]
    fn test_channel_timeout_eviction() {
        let mut channel_bank = bank();
        channel_bank.ingest_frame(Frame::new([0xAA; 16], 0, b"abc".to_vec(), false)).unwrap();

        // Within the timeout, the incomplete channel blocks the head of the queue.
        channel_bank.prev.block_info = Some(origin(10));
        assert_eq!(channel_bank.read().unwrap_err(), PipelineError::Eof.temp());

        // A late frame for a timed out channel is ignored.
        channel_bank.prev.block_info = Some(origin(11));
        channel_bank.ingest_frame(Frame::new([0xAA; 16], 1, b"def".to_vec(), true)).unwrap();
        assert_eq!(channel_bank.channels.get(&[0xAA; 16]).unwrap().len(), 1);

        // The timed out channel is dropped unread.
        assert_eq!(channel_bank.read().unwrap(), None);
        assert!(channel_bank.channels.is_empty());
        assert_eq!(channel_bank.read().unwrap_err(), PipelineError::Eof.temp());
    }

    #[test]
    fn test_pre_canyon_reads_head_only() {
        let mut channel_bank = bank();
        channel_bank.ingest_frame(Frame::new([0xAA; 16], 0, b"head".to_vec(), false)).unwrap();
        channel_bank.ingest_frame(Frame::new([0xBB; 16], 0, b"ready".to_vec(), true)).unwrap();
        assert_eq!(channel_bank.read().unwrap_err(), PipelineError::Eof.temp());
        assert_eq!(channel_bank.channel_queue.len(), 2);
    }

    #[test]
    fn test_post_canyon_reads_first_ready() {
        let mock = TestChannelBankProvider::new(vec![]);
        let cfg = RollupConfig { channel_timeout: 10, canyon_time: Some(0), ..Default::default() };
        let mut channel_bank = ChannelBank::new(Arc::new(cfg), mock);
        channel_bank.prev.block_info = Some(origin(0));
        channel_bank.ingest_frame(Frame::new([0xAA; 16], 0, b"head".to_vec(), false)).unwrap();
        channel_bank.ingest_frame(Frame::new([0xBB; 16], 0, b"ready".to_vec(), true)).unwrap();
        assert_eq!(channel_bank.read().unwrap(), Some(Bytes::from_static(b"ready")));
        assert_eq!(channel_bank.channel_queue, VecDeque::from([[0xAA; 16]]));
    }

    #[test]
    fn test_ingest_and_prune_channel_bank() {
        let mut channel_bank = bank();
        let frame_data_len = MAX_CHANNEL_BANK_SIZE / 100 - FRAME_OVERHEAD;
        for i in 0..100u8 {
            let frame = Frame::new([i; 16], 0, vec![0xDD; frame_data_len], false);
            channel_bank.ingest_frame(frame).unwrap();
        }
        assert_eq!(channel_bank.size(), MAX_CHANNEL_BANK_SIZE);
        assert_eq!(channel_bank.channel_queue.len(), 100);

        // One more channel pushes the bank over its limit and evicts the oldest channel.
        let frame = Frame::new([100; 16], 0, vec![0xDD; 1], false);
        channel_bank.ingest_frame(frame).unwrap();
        assert_eq!(channel_bank.channel_queue.len(), 100);
        assert!(!channel_bank.channels.contains_key(&[0; 16]));
        assert_eq!(channel_bank.channel_queue.front(), Some(&[1; 16]));
        assert!(channel_bank.size() <= MAX_CHANNEL_BANK_SIZE);
    }

    #[tokio::test]
    async fn test_next_data_loads_frames() {
        let data = b"channel data".to_vec();
        let mut frames: Vec<PipelineResult<Frame>> =
            channel_frames(0xAA, &data, 2).into_iter().map(Ok).collect();
        // The mock pops from the back.
        frames.reverse();
        let mut mock = TestChannelBankProvider::new(frames);
        mock.block_info = Some(origin(0));
        let mut channel_bank = ChannelBank::new(config(), mock);

        assert_eq!(channel_bank.next_data().await, Err(PipelineError::NotEnoughData.temp()));
        assert_eq!(channel_bank.next_data().await, Err(PipelineError::NotEnoughData.temp()));
        assert_eq!(channel_bank.next_data().await.unwrap(), Some(Bytes::from(data)));
        assert_eq!(channel_bank.next_data().await, Err(PipelineError::Eof.temp()));
    }

    #[tokio::test]
    async fn test_reassembles_batcher_frames_in_reverse_order() {
        let text = b"The quick brown fox jumps over a lazy cat";
        assert_eq!(text.len(), 41);
        let mut block = test_l2_block(1, 0);
        block.transactions = vec![RawTransaction::from(text.to_vec())];

        let channel_config =
            ChannelConfig { max_frame_size: 20, target_num_frames: 4, ..Default::default() };
        let mut manager =
            ChannelManager::new(channel_config, Arc::new(RollupConfig::default())).unwrap();
        manager.add_l2_block(block).unwrap();
        let l1_head = BlockID { number: 1, hash: B256::ZERO };
        let mut txs = Vec::new();
        while let Some(tx) = manager.tx_data(l1_head).unwrap() {
            txs.push(tx);
        }
        manager.close().unwrap();
        while let Some(tx) = manager.tx_data(l1_head).unwrap() {
            txs.push(tx);
        }

        let frames: Vec<Frame> =
            txs.iter().flat_map(|tx| Frame::parse_frames(&tx.to_bytes()).unwrap()).collect();
        assert!(frames.len() > 1);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.number, i as u16);
            assert_eq!(frame.is_last, i == frames.len() - 1);
            assert!(frame.data.len() <= 20);
        }

        // The mock pops from the back, so the last frame is ingested first.
        let count = frames.len();
        let mut mock = TestChannelBankProvider::new(frames.into_iter().map(Ok).collect());
        mock.block_info = Some(origin(0));
        let mut channel_bank = ChannelBank::new(config(), mock);
        for _ in 0..count {
            assert_eq!(channel_bank.next_data().await, Err(PipelineError::NotEnoughData.temp()));
        }
        let data = channel_bank.next_data().await.unwrap().unwrap();

        let mut reader = BatchReader::new(data.to_vec(), 10_000_000);
        let Some(Batch::Single(batch)) = reader.next_batch(&RollupConfig::default()).unwrap()
        else {
            panic!("expected a single batch");
        };
        assert_eq!(batch.transactions, vec![RawTransaction::from(text.to_vec())]);
        assert_eq!(reader.next_batch(&RollupConfig::default()).unwrap(), None);
    }

    #[tokio::test]
    async fn test_next_data_bubbles_critical_errors() {
        let mock = TestChannelBankProvider::new(vec![Ok(Frame::default())]);
        let mut channel_bank = ChannelBank::new(config(), mock);
        let err = channel_bank.next_data().await.unwrap_err();
        assert!(matches!(err, PipelineErrorKind::Critical(PipelineError::MissingOrigin)));
    }

    #[tokio::test]
    async fn test_channel_bank_reset() {
        let mut channel_bank = bank();
        channel_bank.ingest_frame(Frame::new([0xAA; 16], 0, b"abc".to_vec(), false)).unwrap();
        channel_bank.reset(origin(5), &SystemConfig::default()).await.unwrap();
        assert!(channel_bank.channels.is_empty());
        assert!(channel_bank.channel_queue.is_empty());
        assert!(channel_bank.prev.reset);
    }

    proptest! {
        #[test]
        fn test_reassembly_is_order_independent(
            data in proptest::collection::vec(any::<u8>(), 1..512),
            parts in 1usize..8,
            seed in any::<u64>(),
        ) {
            let mut frames = channel_frames(0x42, &data, parts);
            // Deterministic shuffle.
            let len = frames.len();
            for i in (1..len).rev() {
                let j = (seed.rotate_left(i as u32) as usize) % (i + 1);
                frames.swap(i, j);
            }

            let mut channel_bank = bank();
            for frame in frames {
                channel_bank.ingest_frame(frame).unwrap();
            }
            prop_assert_eq!(channel_bank.read().unwrap(), Some(Bytes::from(data)));
        }
    }
}
