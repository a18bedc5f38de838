//! Error types for the batcher.

use alloy_primitives::B256;
use ferry_primitives::SpanBatchError;
use miniz_oxide::MZError;
use thiserror::Error;

/// A [Result] type for compressor operations.
pub type CompressorResult<T> = Result<T, CompressorError>;

/// An error returned by a compressor.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressorError {
    /// The compressor has reached its output budget.
    #[error("Compressor is full")]
    Full,
    /// The stream was already finished.
    #[error("Compressor is closed")]
    Closed,
    /// The zlib stream failed.
    #[error("Zlib stream error: {0:?}")]
    Zlib(MZError),
    /// The brotli stream failed.
    #[error("Brotli stream error: {0}")]
    Brotli(std::io::ErrorKind),
}

/// The reason a channel stopped accepting blocks.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullReason {
    /// The compressor reached its budget.
    #[error("compressor budget reached")]
    Compressor,
    /// Adding the block would exceed the maximum RLP bytes per channel.
    #[error("max RLP bytes per channel reached")]
    RlpLimit,
    /// The frame number reached [u16::MAX].
    #[error("max frame index reached")]
    MaxFrameIndex,
    /// The channel timed out before it filled up.
    #[error("channel timed out")]
    Timeout,
}

/// An error returned by a batcher-side [ChannelOut].
///
/// [ChannelOut]: crate::ChannelOut
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel is closed.
    #[error("Channel is closed")]
    Closed,
    /// The channel does not accept more blocks.
    #[error("Channel is full: {0}")]
    Full(FullReason),
    /// The closed channel holds more data than fits in [u16::MAX] frames.
    #[error("Channel data does not fit in the frame index range")]
    TooManyFrames,
    /// A compressor error.
    #[error(transparent)]
    Compressor(#[from] CompressorError),
    /// The batch could not be encoded.
    #[error("Failed to encode batch: {0}")]
    BatchEncoding(#[from] SpanBatchError),
    /// The block alone exceeds the maximum RLP bytes per channel.
    #[error("Block encodes to {size} RLP bytes, above the channel limit of {max}")]
    OversizedBlock {
        /// The encoded size of the block's batch.
        size: u64,
        /// The maximum RLP bytes per channel.
        max: u64,
    },
}

impl ChannelError {
    /// Returns `true` if the error is caused by the added block and not by the channel.
    pub const fn is_block_error(&self) -> bool {
        matches!(self, Self::BatchEncoding(_) | Self::OversizedBlock { .. })
    }
}

/// An error returned by the [ChannelManager].
///
/// [ChannelManager]: crate::ChannelManager
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelManagerError {
    /// The added L2 block does not extend the last added block.
    #[error("Reorg detected: block parent {got} does not match tip {expected}")]
    Reorg {
        /// The hash of the last added block.
        expected: B256,
        /// The parent hash of the rejected block.
        got: B256,
    },
    /// The manager was closed and does not open new channels.
    #[error("Channel manager is closed")]
    Closed,
    /// The L2 block cannot be put into any channel. It was dropped from the queue.
    #[error("L2 block {number} dropped: {source}")]
    InvalidBlock {
        /// The number of the dropped block.
        number: u64,
        /// Why the block was rejected.
        source: ChannelError,
    },
    /// A channel error. The open channel was abandoned and its blocks queued again.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// An error returned by a [Publisher].
///
/// [Publisher]: crate::traits::Publisher
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublisherError {
    /// The transaction was rejected and will not be included.
    #[error("Transaction rejected: {0}")]
    Rejected(String),
    /// The publisher could not reach L1.
    #[error("Publisher unavailable: {0}")]
    Unavailable(String),
}

/// An invalid batcher configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The maximum frame size is zero.
    #[error("max_frame_size must be greater than zero")]
    ZeroFrameSize,
    /// An encoded frame does not fit in an L1 transaction.
    #[error("Encoded frame of {frame} bytes exceeds max_l1_tx_size of {max} bytes")]
    FrameExceedsTxSize {
        /// The encoded frame size, version byte included.
        frame: usize,
        /// The maximum L1 transaction size.
        max: usize,
    },
    /// The target number of frames is zero.
    #[error("target_num_frames must be greater than zero")]
    ZeroTargetFrames,
    /// The approximate compression ratio is not a positive number.
    #[error("approx_compr_ratio must be positive")]
    InvalidComprRatio,
    /// The safety margin swallows the whole timeout window.
    #[error("sub_safety_margin {0} must be smaller than the channel timeout and sequencing window")]
    SafetyMarginTooLarge(u64),
}
