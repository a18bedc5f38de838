//! This module contains the [FrameQueue] stage of the derivation pipeline.

use crate::{
    errors::{PipelineError, PipelineResult},
    stages::ChannelBankProvider,
    traits::{OriginAdvancer, OriginProvider, ResettableStage},
};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use core::fmt::Debug;
use ferry_primitives::{BlockInfo, Frame, SystemConfig};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Provides data frames for the [FrameQueue] stage.
#[async_trait]
pub trait FrameQueueProvider {
    /// Retrieves the next data item from the L1 retrieval stage.
    /// If there is data, it pushes it into the next stage.
    /// If there is no data, it returns an error.
    async fn next_data(&mut self) -> PipelineResult<Bytes>;
}

/// The [FrameQueue] stage of the derivation pipeline.
/// This stage takes the output of the [L1Retrieval] stage and parses it into frames.
///
/// [L1Retrieval]: crate::stages::L1Retrieval
#[derive(Debug)]
pub struct FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + ResettableStage + Debug,
{
    /// The previous stage in the pipeline.
    pub prev: P,
    /// The current frame queue.
    queue: VecDeque<Frame>,
}

impl<P> FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + ResettableStage + Debug,
{
    /// Create a new [FrameQueue] stage with the given previous [L1Retrieval] stage.
    ///
    /// [L1Retrieval]: crate::stages::L1Retrieval
    pub const fn new(prev: P) -> Self {
        Self { prev, queue: VecDeque::new() }
    }

    /// Loads more frames into the queue if it is empty.
    ///
    /// Payloads that fail to parse are dropped: one malformed transaction must not halt
    /// derivation.
    async fn load_frames(&mut self) -> PipelineResult<()> {
        if !self.queue.is_empty() {
            return Ok(());
        }

        let data = match self.prev.next_data().await {
            Ok(data) => data,
            Err(e) => {
                debug!(target: "frame-queue", "Failed to retrieve data: {:?}", e);
                return Err(e);
            }
        };

        match Frame::parse_frames(&data) {
            Ok(frames) => {
                debug!(target: "frame-queue", "Parsed {} frames", frames.len());
                self.queue.extend(frames);
            }
            Err(e) => {
                warn!(target: "frame-queue", "Dropping malformed frame data: {e}");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<P> OriginAdvancer for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + ResettableStage + Send + Debug,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

#[async_trait]
impl<P> ChannelBankProvider for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + ResettableStage + Send + Debug,
{
    async fn next_frame(&mut self) -> PipelineResult<Frame> {
        self.load_frames().await?;

        // If we did not add more frames but still have more data, retry this function.
        self.queue.pop_front().ok_or(PipelineError::NotEnoughData.temp())
    }
}

impl<P> OriginProvider for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + ResettableStage + Debug,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> ResettableStage for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + OriginProvider + ResettableStage + Send + Debug,
{
    async fn reset(&mut self, base: BlockInfo, system_config: &SystemConfig) -> PipelineResult<()> {
        self.prev.reset(base, system_config).await?;
        self.queue = VecDeque::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{collect_traces, encode_frames, TestFrameQueueProvider};
    use tracing::Level;

    fn frames(n: u16) -> Vec<Frame> {
        (0..n).map(|i| Frame::new([0xFF; 16], i, vec![0xDD; 8], i == n - 1)).collect()
    }

    #[tokio::test]
    async fn test_frame_queue_empty_bytes() {
        let (traces, _guard) = collect_traces();
        let data = vec![Ok(Bytes::from(vec![0x00]))];
        let mock = TestFrameQueueProvider::new(data);
        let mut frame_queue = FrameQueue::new(mock);
        let err = frame_queue.next_frame().await.unwrap_err();
        assert_eq!(err, PipelineError::NotEnoughData.temp());
        assert_eq!(traces.get_by_level(Level::WARN).len(), 1);
    }

    #[tokio::test]
    async fn test_frame_queue_no_frames_decoded() {
        let data = vec![Err(PipelineError::Eof.temp()), Ok(Bytes::default())];
        let mock = TestFrameQueueProvider::new(data);
        let mut frame_queue = FrameQueue::new(mock);
        let err = frame_queue.next_frame().await.unwrap_err();
        assert_eq!(err, PipelineError::NotEnoughData.temp());
        // The provider error is bubbled up once the data is exhausted.
        let err = frame_queue.next_frame().await.unwrap_err();
        assert_eq!(err, PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_frame_queue_wrong_derivation_version() {
        let (traces, _guard) = collect_traces();
        let data = vec![Ok(Bytes::from(vec![0x01]))];
        let mock = TestFrameQueueProvider::new(data);
        let mut frame_queue = FrameQueue::new(mock);
        let err = frame_queue.next_frame().await.unwrap_err();
        assert_eq!(err, PipelineError::NotEnoughData.temp());
        let warns = traces.get_by_level(Level::WARN);
        assert!(warns[0].contains("Unsupported derivation version"));
    }

    #[tokio::test]
    async fn test_frame_queue_frame_too_short() {
        let data = vec![Ok(Bytes::from(vec![0x00, 0x01]))];
        let mock = TestFrameQueueProvider::new(data);
        let mut frame_queue = FrameQueue::new(mock);
        let err = frame_queue.next_frame().await.unwrap_err();
        assert_eq!(err, PipelineError::NotEnoughData.temp());
    }

    #[tokio::test]
    async fn test_frame_queue_single_frame() {
        let data = encode_frames(&frames(1));
        let mut mock = TestFrameQueueProvider::new(vec![Ok(data)]);
        mock.set_origin(BlockInfo::default());
        let mut frame_queue = FrameQueue::new(mock);
        assert_eq!(frame_queue.origin(), Some(BlockInfo::default()));
        let frame_decoded = frame_queue.next_frame().await.unwrap();
        assert_eq!(frame_decoded, frames(1)[0]);
        let err = frame_queue.next_frame().await.unwrap_err();
        assert_eq!(err, PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_frame_queue_multiple_frames() {
        let expected = frames(3);
        let data = encode_frames(&expected);
        let mock = TestFrameQueueProvider::new(vec![Ok(data)]);
        let mut frame_queue = FrameQueue::new(mock);
        for frame in expected {
            assert_eq!(frame_queue.next_frame().await.unwrap(), frame);
        }
        let err = frame_queue.next_frame().await.unwrap_err();
        assert_eq!(err, PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_frame_queue_skips_malformed_payload() {
        let expected = frames(2);
        let mut bad = encode_frames(&expected).to_vec();
        bad.push(0xFF);
        // Payloads are served last to first.
        let data = vec![Ok(encode_frames(&expected)), Ok(bad.into())];
        let mock = TestFrameQueueProvider::new(data);
        let mut frame_queue = FrameQueue::new(mock);
        let err = frame_queue.next_frame().await.unwrap_err();
        assert_eq!(err, PipelineError::NotEnoughData.temp());
        assert_eq!(frame_queue.next_frame().await.unwrap(), expected[0]);
        assert_eq!(frame_queue.next_frame().await.unwrap(), expected[1]);
    }

    #[tokio::test]
    async fn test_frame_queue_reset() {
        let mock = TestFrameQueueProvider::new(vec![]);
        let mut frame_queue = FrameQueue::new(mock);
        frame_queue.queue.extend(frames(2));
        frame_queue.reset(BlockInfo::default(), &SystemConfig::default()).await.unwrap();
        assert!(frame_queue.queue.is_empty());
        assert!(frame_queue.prev.reset);
    }
}
