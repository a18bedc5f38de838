//! Contains the batcher-side [ChannelOut], which packs L2 blocks into compressed frames.

use crate::{
    compressor::ChannelCompressor,
    config::{ChannelConfig, BATCHER_TX_VERSION},
    errors::{ChannelError, CompressorError, FullReason},
};
use alloy_primitives::{hex, Bytes};
use alloy_rlp::Encodable;
use ferry_primitives::{
    batch::BatchType, BlockID, ChannelID, Frame, L2Block, RollupConfig, SingleBatch, SpanBatch,
};
use hashbrown::HashMap;
use rand::RngCore;
use std::{collections::VecDeque, fmt, sync::Arc};
use tracing::{debug, info, trace, warn};

/// Identifies a frame across channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId {
    /// The channel the frame belongs to.
    pub channel_id: ChannelID,
    /// The frame number within the channel.
    pub number: u16,
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.channel_id), self.number)
    }
}

/// A frame handed to the publisher, to be carried by one L1 transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxData {
    /// The frame.
    pub frame: Frame,
}

impl TxData {
    /// Returns the [FrameId] of the carried frame.
    pub const fn id(&self) -> FrameId {
        FrameId { channel_id: self.frame.id, number: self.frame.number }
    }

    /// Returns the transaction payload: the derivation version byte followed by the frame.
    pub fn to_bytes(&self) -> Bytes {
        let mut data = vec![BATCHER_TX_VERSION];
        data.extend_from_slice(&self.frame.encode());
        data.into()
    }
}

/// Generates a random [ChannelID].
pub fn random_channel_id() -> ChannelID {
    let mut id = ChannelID::default();
    rand::thread_rng().fill_bytes(&mut id);
    id
}

/// Converts an L2 block into the [SingleBatch] that derives it. Deposits are left out, the
/// derivation pipeline rebuilds them from L1.
pub fn block_to_batch(block: &L2Block) -> SingleBatch {
    SingleBatch {
        parent_hash: block.parent_hash(),
        epoch_num: block.info.l1_origin.number,
        epoch_hash: block.info.l1_origin.hash,
        timestamp: block.timestamp(),
        transactions: block.user_transactions().cloned().collect(),
    }
}

/// Wraps an encoded batch into the RLP string it is stored as inside a channel.
fn rlp_string(encoded: Vec<u8>) -> Vec<u8> {
    let encoded = Bytes::from(encoded);
    let mut out = Vec::with_capacity(encoded.length());
    encoded.encode(&mut out);
    out
}

/// [ChannelOut] builds one channel: it compresses the batches of the added blocks, cuts the
/// compressed stream into frames and tracks every frame until its transaction is confirmed.
///
/// A frame is either ready (waiting to be published), pending (handed to the publisher) or
/// confirmed. Failed frames return to the ready queue.
#[derive(Debug)]
pub struct ChannelOut<C: ChannelCompressor> {
    /// The unique identifier for the channel.
    id: ChannelID,
    /// The channel configuration.
    config: ChannelConfig,
    /// The rollup configuration, used for protocol limits and span batch encoding.
    rollup_config: Arc<RollupConfig>,
    /// The compressor.
    compressor: C,
    /// The blocks added to the channel.
    blocks: Vec<L2Block>,
    /// The span batch of the channel, when blocks are packed into span batches.
    span: Option<SpanBatch>,
    /// The encoding of `span`, rewritten into the compressor on every added block.
    span_rlp: Vec<u8>,
    /// The rlp length of the channel.
    rlp_length: u64,
    /// The number of frames output so far.
    frame_count: u32,
    /// Why the channel stopped accepting blocks.
    full: Option<FullReason>,
    /// Whether the compressed stream has been finished.
    closed: bool,
    /// Frames waiting to be published.
    ready: VecDeque<Frame>,
    /// Frames handed to the publisher, by number.
    pending: HashMap<u16, Frame>,
    /// Inclusion blocks of confirmed frames, by number.
    confirmed: HashMap<u16, BlockID>,
    /// The L1 block number at which the channel must be closed.
    timeout: u64,
}

impl<C: ChannelCompressor> ChannelOut<C> {
    /// Creates a new, empty [ChannelOut].
    pub fn new(
        id: ChannelID,
        config: ChannelConfig,
        rollup_config: Arc<RollupConfig>,
        compressor: C,
    ) -> Self {
        let span = config
            .span_batches
            .then(|| SpanBatch::new(rollup_config.genesis.timestamp, rollup_config.l2_chain_id));
        Self {
            id,
            config,
            rollup_config,
            compressor,
            blocks: Vec::new(),
            span,
            span_rlp: Vec::new(),
            rlp_length: 0,
            frame_count: 0,
            full: None,
            closed: false,
            ready: VecDeque::new(),
            pending: HashMap::new(),
            confirmed: HashMap::new(),
            timeout: u64::MAX,
        }
    }

    /// Returns the [ChannelID] of the channel.
    pub const fn id(&self) -> ChannelID {
        self.id
    }

    /// Returns the blocks added to the channel.
    pub fn blocks(&self) -> &[L2Block] {
        &self.blocks
    }

    /// Consumes the channel, returning its blocks.
    pub fn into_blocks(self) -> Vec<L2Block> {
        self.blocks
    }

    /// Returns the reason the channel is full, if it is.
    pub const fn full_reason(&self) -> Option<FullReason> {
        self.full
    }

    /// Returns `true` if the channel does not accept more blocks.
    pub const fn is_full(&self) -> bool {
        self.full.is_some()
    }

    /// Returns `true` if the compressed stream has been finished.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns the total amount of rlp-encoded input bytes.
    pub const fn input_bytes(&self) -> u64 {
        self.rlp_length
    }

    /// Returns the number of compressed bytes not yet cut into frames.
    pub fn ready_bytes(&self) -> usize {
        self.compressor.len()
    }

    /// Returns the L1 block number at which the channel must be closed.
    pub const fn timeout(&self) -> u64 {
        self.timeout
    }

    /// Returns the number of frames waiting to be published.
    pub fn ready_frames(&self) -> usize {
        self.ready.len()
    }

    /// Returns the number of frames handed to the publisher and not yet confirmed.
    pub fn pending_frames(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if a frame is waiting to be published.
    pub fn has_frame(&self) -> bool {
        !self.ready.is_empty()
    }

    /// Returns `true` if no frame has been handed to the publisher.
    pub fn none_submitted(&self) -> bool {
        self.pending.is_empty() && self.confirmed.is_empty()
    }

    /// Returns `true` once every frame of the closed channel is confirmed.
    pub fn is_fully_submitted(&self) -> bool {
        self.closed && self.ready.is_empty() && self.pending.is_empty()
    }

    /// Lowers the channel timeout to `block_number` if it is earlier.
    pub fn update_timeout(&mut self, block_number: u64) {
        self.timeout = self.timeout.min(block_number);
    }

    /// Marks the channel full once the L1 head reaches its timeout. Returns `true` if the channel
    /// timed out.
    pub fn check_timeout(&mut self, l1_head: u64) -> bool {
        if l1_head < self.timeout {
            return false;
        }
        if self.full.is_none() {
            debug!(
                target: "channel-manager",
                "Channel {} reached timeout {} at L1 block {}",
                hex::encode(self.id),
                self.timeout,
                l1_head
            );
            self.full = Some(FullReason::Timeout);
        }
        true
    }

    /// Adds an L2 block to the channel.
    ///
    /// Fails with [ChannelError::Full] if the block does not fit; the block is then left out and
    /// the channel stops accepting blocks. A block that would not fit even into an empty channel
    /// fails with [ChannelError::OversizedBlock] and leaves the channel untouched.
    pub fn add_block(&mut self, block: &L2Block) -> Result<(), ChannelError> {
        if self.closed {
            return Err(ChannelError::Closed);
        }
        if let Some(reason) = self.full {
            return Err(ChannelError::Full(reason));
        }

        let batch = block_to_batch(block);
        let epoch = batch.epoch_num;
        let max_rlp_bytes = self.rollup_config.max_rlp_bytes_per_channel(batch.timestamp);

        if self.span.is_some() {
            self.add_span_element(batch, block.info.seq_num, max_rlp_bytes)?;
        } else {
            let mut encoded = vec![BatchType::Single as u8];
            batch.encode(&mut encoded);
            let rlp = rlp_string(encoded);
            let size = rlp.len() as u64;
            if size > max_rlp_bytes && self.blocks.is_empty() {
                return Err(ChannelError::OversizedBlock { size, max: max_rlp_bytes });
            }
            if self.rlp_length + size > max_rlp_bytes {
                return Err(self.set_full(FullReason::RlpLimit));
            }
            match self.compressor.write(&rlp) {
                Ok(_) => {}
                Err(CompressorError::Full) => return Err(self.set_full(FullReason::Compressor)),
                Err(e) => return Err(e.into()),
            }
            self.rlp_length += rlp.len() as u64;
            if self.compressor.is_full() {
                self.set_full(FullReason::Compressor);
            }
        }

        self.blocks.push(block.clone());
        let seq_window_timeout =
            self.config.seq_window_size.saturating_sub(self.config.sub_safety_margin);
        self.update_timeout(epoch.saturating_add(seq_window_timeout));
        Ok(())
    }

    /// Appends a batch to the span and recompresses the whole span. Reverts to the previous span
    /// if the new one no longer fits, unless the span was empty.
    fn add_span_element(
        &mut self,
        batch: SingleBatch,
        seq_num: u64,
        max_rlp_bytes: u64,
    ) -> Result<(), ChannelError> {
        let Some(mut span) = self.span.clone() else {
            return Err(ChannelError::Closed);
        };
        span.append_singular_batch(batch, seq_num)?;
        let mut encoded = vec![BatchType::Span as u8];
        span.to_raw_span_batch()?.encode(&mut encoded)?;
        let rlp = rlp_string(encoded);
        let size = rlp.len() as u64;
        if size > max_rlp_bytes && self.blocks.is_empty() {
            return Err(ChannelError::OversizedBlock { size, max: max_rlp_bytes });
        }
        if size > max_rlp_bytes {
            return Err(self.set_full(FullReason::RlpLimit));
        }

        self.compressor.reset();
        let fits = match self.compressor.write(&rlp) {
            Ok(_) => !self.compressor.is_full(),
            Err(CompressorError::Full) => false,
            Err(e) => return Err(e.into()),
        };
        if !fits && !self.blocks.is_empty() {
            self.compressor.reset();
            self.compressor.write(&self.span_rlp)?;
            return Err(self.set_full(FullReason::Compressor));
        }
        if !fits {
            self.set_full(FullReason::Compressor);
        }

        self.rlp_length = rlp.len() as u64;
        self.span = Some(span);
        self.span_rlp = rlp;
        Ok(())
    }

    fn set_full(&mut self, reason: FullReason) -> ChannelError {
        if self.full.is_none() {
            debug!(
                target: "channel-manager",
                "Channel {} is full: {}",
                hex::encode(self.id),
                reason
            );
            self.full = Some(reason);
        }
        ChannelError::Full(reason)
    }

    /// Cuts compressed data into frames. A full channel is closed and cut completely; an open
    /// channel only outputs whole frames.
    pub fn output_frames(&mut self) -> Result<(), ChannelError> {
        if self.closed {
            return Ok(());
        }
        if self.span.is_none() {
            while self.full.is_none() && self.compressor.len() >= self.config.max_frame_size {
                let frame = self.output_frame()?;
                self.ready.push_back(frame);
            }
        }
        if self.full.is_some() {
            self.close()?;
        }
        Ok(())
    }

    /// Finishes the compressed stream and cuts the rest of it into frames, the last one marked
    /// `is_last`.
    pub fn close(&mut self) -> Result<(), ChannelError> {
        if self.closed {
            return Ok(());
        }
        self.compressor.close()?;
        self.closed = true;
        loop {
            let frame = self.output_frame()?;
            let is_last = frame.is_last;
            self.ready.push_back(frame);
            if is_last {
                break;
            }
        }
        info!(
            target: "channel-manager",
            "Closed channel {} with {} blocks in {} frames",
            hex::encode(self.id),
            self.blocks.len(),
            self.frame_count
        );
        Ok(())
    }

    fn output_frame(&mut self) -> Result<Frame, ChannelError> {
        let number = u16::try_from(self.frame_count).map_err(|_| ChannelError::TooManyFrames)?;
        let ready = self.compressor.len();
        let (size, is_last) = if self.config.max_frame_size >= ready {
            (ready, self.closed)
        } else {
            (self.config.max_frame_size, false)
        };

        let mut data = vec![0u8; size];
        let read = self.compressor.read(&mut data)?;
        data.truncate(read);

        self.frame_count += 1;
        if number == u16::MAX && self.full.is_none() {
            self.full = Some(FullReason::MaxFrameIndex);
        }
        Ok(Frame::new(self.id, number, data, is_last))
    }

    /// Hands out the next ready frame, marking it pending.
    pub fn next_frame(&mut self) -> Option<TxData> {
        let frame = self.ready.pop_front()?;
        self.pending.insert(frame.number, frame.clone());
        Some(TxData { frame })
    }

    /// Returns a pending frame to the front of the ready queue. Returns `false` if the frame was
    /// not pending.
    pub fn tx_failed(&mut self, number: u16) -> bool {
        let Some(frame) = self.pending.remove(&number) else {
            warn!(
                target: "channel-manager",
                "Unknown frame {} of channel {} marked as failed",
                number,
                hex::encode(self.id)
            );
            return false;
        };
        trace!(
            target: "channel-manager",
            "Frame {} of channel {} failed",
            number,
            hex::encode(self.id)
        );
        self.ready.push_front(frame);
        true
    }

    /// Marks a pending frame as confirmed in `inclusion_block`.
    ///
    /// Returns `true` if the confirmed frames now span more than the channel timeout, in which
    /// case the channel cannot be derived and its blocks must be resubmitted.
    pub fn tx_confirmed(&mut self, number: u16, inclusion_block: BlockID) -> bool {
        if self.pending.remove(&number).is_none() {
            warn!(
                target: "channel-manager",
                "Unknown frame {} of channel {} marked as confirmed",
                number,
                hex::encode(self.id)
            );
            return false;
        }
        debug!(
            target: "channel-manager",
            "Frame {} of channel {} confirmed in block {}",
            number,
            hex::encode(self.id),
            inclusion_block
        );
        self.confirmed.insert(number, inclusion_block);
        let timeout = inclusion_block
            .number
            .saturating_add(self.config.channel_timeout)
            .saturating_sub(self.config.sub_safety_margin);
        self.update_timeout(timeout);

        if self.is_inclusion_timed_out() {
            warn!(target: "channel-manager", "Channel {} timed out", hex::encode(self.id));
            return true;
        }
        if self.is_fully_submitted() {
            info!(target: "channel-manager", "Channel {} is fully submitted", hex::encode(self.id));
        }
        false
    }

    /// Returns `true` if the confirmed frames were included further apart than the channel
    /// timeout.
    fn is_inclusion_timed_out(&self) -> bool {
        let min = self.confirmed.values().map(|b| b.number).min();
        let max = self.confirmed.values().map(|b| b.number).max();
        match (min, max) {
            (Some(min), Some(max)) => max - min >= self.config.channel_timeout,
            _ => false,
        }
    }

    /// Returns every pending frame to the ready queue, in frame order.
    pub fn requeue_pending(&mut self) -> usize {
        let mut frames: Vec<Frame> = self.pending.drain().map(|(_, f)| f).collect();
        frames.sort_by_key(|f| core::cmp::Reverse(f.number));
        let count = frames.len();
        for frame in frames {
            self.ready.push_front(frame);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compressor::{BatchCompressor, CompressorWriter},
        errors::CompressorResult,
    };
    use alloy_primitives::B256;
    use ferry_primitives::{BatchReader, BlockInfo, Channel, L2BlockInfo, RawTransaction};

    #[derive(Debug, Default)]
    struct MockCompressor {
        data: Vec<u8>,
        full_after: Option<usize>,
    }

    impl CompressorWriter for MockCompressor {
        fn write(&mut self, data: &[u8]) -> CompressorResult<usize> {
            if self.is_full() {
                return Err(CompressorError::Full);
            }
            self.data.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> CompressorResult<()> {
            Ok(())
        }

        fn close(&mut self) -> CompressorResult<()> {
            Ok(())
        }

        fn reset(&mut self) {
            self.data.clear();
        }

        fn len(&self) -> usize {
            self.data.len()
        }

        fn read(&mut self, buf: &mut [u8]) -> CompressorResult<usize> {
            let n = buf.len().min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data.drain(..n);
            Ok(n)
        }
    }

    impl ChannelCompressor for MockCompressor {
        fn is_full(&self) -> bool {
            self.full_after.is_some_and(|n| self.data.len() >= n)
        }
    }

    fn config(max_frame_size: usize, target_num_frames: usize) -> ChannelConfig {
        ChannelConfig { max_frame_size, target_num_frames, ..Default::default() }
    }

    fn block(number: u64, parent: B256, epoch: u64, txs: Vec<RawTransaction>) -> L2Block {
        let info = BlockInfo {
            number,
            hash: B256::with_last_byte(number as u8),
            parent_hash: parent,
            timestamp: 100 + 2 * number,
        };
        let origin = BlockID { number: epoch, hash: B256::repeat_byte(0xE0 + epoch as u8) };
        L2Block { info: L2BlockInfo::new(info, origin, number), transactions: txs }
    }

    fn l1(number: u64) -> BlockID {
        BlockID { number, hash: B256::repeat_byte(0x11) }
    }

    fn mock_channel(full_after: Option<usize>) -> ChannelOut<MockCompressor> {
        ChannelOut::new(
            [0xAA; 16],
            config(10, 1),
            Arc::new(RollupConfig::default()),
            MockCompressor { data: Vec::new(), full_after },
        )
    }

    fn drain(channel: &mut ChannelOut<impl ChannelCompressor>) -> Vec<Frame> {
        core::iter::from_fn(|| channel.next_frame().map(|tx| tx.frame)).collect()
    }

    #[test]
    fn test_block_to_batch_drops_deposits() {
        let deposit = RawTransaction::from(vec![0x7E, 0x01]);
        let user = RawTransaction::from(vec![0x02, 0x01]);
        let b = block(3, B256::with_last_byte(2), 1, vec![deposit, user.clone()]);
        let batch = block_to_batch(&b);
        assert_eq!(batch.parent_hash, B256::with_last_byte(2));
        assert_eq!(batch.epoch_num, 1);
        assert_eq!(batch.timestamp, 106);
        assert_eq!(batch.transactions, vec![user]);
    }

    #[test]
    fn test_tx_data_bytes() {
        let tx = TxData { frame: Frame::new([1; 16], 2, vec![0xFF], true) };
        assert_eq!(tx.id(), FrameId { channel_id: [1; 16], number: 2 });
        let bytes = tx.to_bytes();
        assert_eq!(bytes[0], BATCHER_TX_VERSION);
        assert_eq!(Frame::parse_frames(&bytes).unwrap(), vec![tx.frame]);
    }

    #[test]
    fn test_add_block_closed_and_full() {
        let mut channel = mock_channel(Some(1));
        channel.add_block(&block(1, B256::ZERO, 0, vec![])).unwrap();
        assert_eq!(channel.full_reason(), Some(FullReason::Compressor));
        assert_eq!(
            channel.add_block(&block(2, B256::with_last_byte(1), 0, vec![])),
            Err(ChannelError::Full(FullReason::Compressor))
        );
        assert_eq!(channel.blocks().len(), 1);

        channel.close().unwrap();
        assert_eq!(
            channel.add_block(&block(2, B256::with_last_byte(1), 0, vec![])),
            Err(ChannelError::Closed)
        );
    }

    #[test]
    fn test_add_block_rlp_limit() {
        let mut channel = mock_channel(None);
        channel.rlp_length = channel.rollup_config.max_rlp_bytes_per_channel(0);
        assert_eq!(
            channel.add_block(&block(1, B256::ZERO, 0, vec![])),
            Err(ChannelError::Full(FullReason::RlpLimit))
        );
        assert!(channel.blocks().is_empty());
    }

    #[test]
    fn test_seq_window_timeout() {
        let mut channel = mock_channel(None);
        assert_eq!(channel.timeout(), u64::MAX);
        channel.add_block(&block(1, B256::ZERO, 5, vec![])).unwrap();
        assert_eq!(channel.timeout(), 5 + 3600 - 10);
        channel.update_timeout(20);
        channel.update_timeout(40);
        assert_eq!(channel.timeout(), 20);

        assert!(!channel.check_timeout(19));
        assert!(channel.check_timeout(20));
        assert_eq!(channel.full_reason(), Some(FullReason::Timeout));
    }

    #[test]
    fn test_output_ready_frames_while_open() {
        let mut channel = mock_channel(None);
        channel.compressor.data = vec![7u8; 25];
        channel.output_frames().unwrap();
        let frames = drain(&mut channel);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.data.len() == 10 && !f.is_last));
        assert_eq!(channel.ready_bytes(), 5);

        channel.close().unwrap();
        let frames = drain(&mut channel);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].number, 2);
        assert!(frames[0].is_last);
        assert_eq!(frames[0].data, vec![7u8; 5]);
    }

    #[test]
    fn test_close_exact_multiple_of_frame_size() {
        let mut channel = mock_channel(None);
        channel.compressor.data = vec![1u8; 20];
        channel.close().unwrap();
        let frames = drain(&mut channel);
        assert_eq!(frames.len(), 2);
        assert!(!frames[0].is_last);
        assert!(frames[1].is_last);
        assert_eq!(frames[1].data.len(), 10);
        assert!(channel.is_closed());
    }

    #[test]
    fn test_frame_lifecycle() {
        let mut channel = mock_channel(None);
        channel.compressor.data = vec![1u8; 15];
        channel.close().unwrap();
        assert_eq!(channel.ready_frames(), 2);
        assert!(channel.none_submitted());

        let first = channel.next_frame().unwrap();
        let second = channel.next_frame().unwrap();
        assert_eq!(channel.pending_frames(), 2);
        assert!(!channel.tx_failed(9));

        assert!(channel.tx_failed(first.frame.number));
        assert_eq!(channel.next_frame(), Some(first.clone()));

        assert!(!channel.tx_confirmed(first.frame.number, l1(10)));
        assert!(!channel.is_fully_submitted());
        assert!(!channel.tx_confirmed(second.frame.number, l1(11)));
        assert!(channel.is_fully_submitted());
        assert_eq!(channel.timeout(), 10 + 300 - 10);
    }

    #[test]
    fn test_inclusion_timeout() {
        let mut channel = mock_channel(None);
        channel.compressor.data = vec![1u8; 15];
        channel.close().unwrap();
        let first = channel.next_frame().unwrap();
        let second = channel.next_frame().unwrap();
        assert!(!channel.tx_confirmed(first.frame.number, l1(10)));
        assert!(channel.tx_confirmed(second.frame.number, l1(310)));
    }

    #[test]
    fn test_requeue_pending_in_frame_order() {
        let mut channel = mock_channel(None);
        channel.compressor.data = vec![1u8; 35];
        channel.close().unwrap();
        let _ = channel.next_frame();
        let _ = channel.next_frame();
        let _ = channel.next_frame();
        assert_eq!(channel.requeue_pending(), 3);
        let numbers: Vec<u16> = drain(&mut channel).iter().map(|f| f.number).collect();
        assert_eq!(numbers, vec![0, 1, 2, 3]);
    }

    /// Compresses a 41 byte string into frames of at most 20 bytes and reassembles it from the
    /// frames in reverse order.
    #[test]
    fn test_reverse_reassembly_of_small_channel() {
        let input = b"the quick brown fox jumps over a lazy dog";
        assert_eq!(input.len(), 41);

        let cfg = ChannelConfig { max_frame_size: 20, target_num_frames: 4, ..Default::default() };
        let mut channel = ChannelOut::new(
            random_channel_id(),
            cfg,
            Arc::new(RollupConfig::default()),
            BatchCompressor::from(&cfg),
        );
        channel.compressor.write(input).unwrap();
        channel.close().unwrap();

        let frames = drain(&mut channel);
        assert!(frames.len() > 1);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.number as usize, i);
            assert_eq!(frame.is_last, i == frames.len() - 1);
            assert!(frame.data.len() <= 20);
        }

        let mut bank_channel = Channel::new(channel.id(), BlockInfo::default());
        for frame in frames.into_iter().rev() {
            assert!(bank_channel.frame_data().is_none());
            bank_channel.add_frame(frame, BlockInfo::default()).unwrap();
        }
        let data = bank_channel.frame_data().unwrap();
        let decompressed = miniz_oxide::inflate::decompress_to_vec_zlib(&data).unwrap();
        assert_eq!(decompressed, input);
    }

    #[test]
    fn test_single_batches_decode_from_frames() {
        let cfg = config(50, 10);
        let rollup = Arc::new(RollupConfig::default());
        let compressor = BatchCompressor::from(&cfg);
        let mut channel = ChannelOut::new([0xCC; 16], cfg, Arc::clone(&rollup), compressor);
        let tx = RawTransaction::from(vec![0x02, 0xAB, 0xCD]);
        let blocks = vec![
            block(1, B256::ZERO, 0, vec![tx.clone()]),
            block(2, B256::with_last_byte(1), 0, vec![]),
            block(3, B256::with_last_byte(2), 1, vec![tx]),
        ];
        for b in &blocks {
            channel.add_block(b).unwrap();
        }
        channel.close().unwrap();

        let mut bank_channel = Channel::new(channel.id(), BlockInfo::default());
        for frame in drain(&mut channel) {
            bank_channel.add_frame(frame, BlockInfo::default()).unwrap();
        }
        let mut reader = BatchReader::new(bank_channel.frame_data().unwrap().to_vec(), 10_000_000);
        for b in &blocks {
            let batch = reader.next_batch(&rollup).unwrap().unwrap();
            assert_eq!(batch, ferry_primitives::Batch::Single(block_to_batch(b)));
        }
        assert_eq!(reader.next_batch(&rollup).unwrap(), None);
    }

    #[test]
    fn test_span_batch_channel() {
        let cfg = ChannelConfig { span_batches: true, ..config(50, 10) };
        let rollup = Arc::new(RollupConfig { block_time: 2, ..Default::default() });
        let compressor = BatchCompressor::from(&cfg);
        let mut channel = ChannelOut::new([0xCC; 16], cfg, Arc::clone(&rollup), compressor);
        let blocks = vec![
            block(1, B256::ZERO, 0, vec![]),
            block(2, B256::with_last_byte(1), 0, vec![]),
            block(3, B256::with_last_byte(2), 1, vec![]),
        ];
        for b in &blocks {
            channel.add_block(b).unwrap();
        }
        // Span channels are only cut once closed.
        channel.output_frames().unwrap();
        assert!(!channel.has_frame());
        channel.close().unwrap();

        let mut bank_channel = Channel::new(channel.id(), BlockInfo::default());
        for frame in drain(&mut channel) {
            bank_channel.add_frame(frame, BlockInfo::default()).unwrap();
        }
        let mut reader = BatchReader::new(bank_channel.frame_data().unwrap().to_vec(), 10_000_000);
        let Some(ferry_primitives::Batch::Span(span)) = reader.next_batch(&rollup).unwrap() else {
            panic!("expected a span batch");
        };
        assert_eq!(span.batches.len(), 3);
        assert_eq!(span.starting_timestamp(), 102);
        assert_eq!(span.final_epoch_num(), 1);
        assert_eq!(reader.next_batch(&rollup).unwrap(), None);
    }

    #[test]
    fn test_span_batch_reverts_block_that_does_not_fit() {
        let cfg = ChannelConfig { span_batches: true, ..config(10, 1) };
        let mut channel = ChannelOut::new(
            [0xBB; 16],
            cfg,
            Arc::new(RollupConfig::default()),
            MockCompressor::default(),
        );
        channel.add_block(&block(1, B256::ZERO, 0, vec![])).unwrap();
        let before = channel.span_rlp.clone();
        channel.compressor.full_after = Some(before.len() + 4);
        let mut res = Ok(());
        for n in 2..40u64 {
            res = channel.add_block(&block(n, B256::with_last_byte(n as u8 - 1), 0, vec![]));
            if res.is_err() {
                break;
            }
        }
        assert_eq!(res, Err(ChannelError::Full(FullReason::Compressor)));
        assert!(channel.blocks().len() > 1);
        assert_ne!(channel.span_rlp, before);
        assert_eq!(channel.compressor.data, channel.span_rlp);
        assert_eq!(channel.span.as_ref().map(|s| s.batches.len()), Some(channel.blocks().len()));
    }
}
