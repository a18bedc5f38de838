//! Mock stages that stand in for the previous stage of each pipeline stage under test.
//!
//! Every mock serves its queued results last to first and reports [PipelineError::Eof] once
//! drained.

use crate::{
    errors::{BuilderError, PipelineError, PipelineErrorKind, PipelineResult},
    stages::{
        AttributesProvider, BatchQueueProvider, ChannelBankProvider, ChannelReaderProvider,
        FrameQueueProvider,
    },
    traits::{AttributesBuilder, NextAttributes, OriginAdvancer, OriginProvider, ResettableStage},
};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use ferry_primitives::{
    Batch, BlockID, BlockInfo, Frame, L2AttributesWithParent, L2BlockInfo, OpPayloadAttributes,
    SingleBatch, SystemConfig,
};

/// A mock [FrameQueueProvider] for testing the [FrameQueue] stage.
///
/// [FrameQueue]: crate::stages::FrameQueue
#[derive(Debug, Default)]
pub struct TestFrameQueueProvider {
    /// The data to return.
    pub data: Vec<PipelineResult<Bytes>>,
    /// The origin to return.
    pub origin: Option<BlockInfo>,
    /// Whether the reset method was called.
    pub reset: bool,
}

impl TestFrameQueueProvider {
    /// Creates a new [TestFrameQueueProvider] with the given data.
    pub const fn new(data: Vec<PipelineResult<Bytes>>) -> Self {
        Self { data, origin: None, reset: false }
    }

    /// Sets the origin for the [TestFrameQueueProvider].
    pub fn set_origin(&mut self, origin: BlockInfo) {
        self.origin = Some(origin);
    }
}

impl OriginProvider for TestFrameQueueProvider {
    fn origin(&self) -> Option<BlockInfo> {
        self.origin
    }
}

#[async_trait]
impl OriginAdvancer for TestFrameQueueProvider {
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        Ok(())
    }
}

#[async_trait]
impl FrameQueueProvider for TestFrameQueueProvider {
    async fn next_data(&mut self) -> PipelineResult<Bytes> {
        self.data.pop().unwrap_or(Err(PipelineError::Eof.temp()))
    }
}

#[async_trait]
impl ResettableStage for TestFrameQueueProvider {
    async fn reset(&mut self, _base: BlockInfo, _cfg: &SystemConfig) -> PipelineResult<()> {
        self.reset = true;
        Ok(())
    }
}

/// A mock [ChannelBankProvider] for testing the [ChannelBank] stage.
///
/// [ChannelBank]: crate::stages::ChannelBank
#[derive(Debug, Default)]
pub struct TestChannelBankProvider {
    /// The data to return.
    pub data: Vec<PipelineResult<Frame>>,
    /// The block info
    pub block_info: Option<BlockInfo>,
    /// Tracks if the channel bank provider has been reset.
    pub reset: bool,
}

impl TestChannelBankProvider {
    /// Creates a new [TestChannelBankProvider] with the given data.
    pub const fn new(data: Vec<PipelineResult<Frame>>) -> Self {
        Self { data, block_info: None, reset: false }
    }
}

impl OriginProvider for TestChannelBankProvider {
    fn origin(&self) -> Option<BlockInfo> {
        self.block_info
    }
}

#[async_trait]
impl OriginAdvancer for TestChannelBankProvider {
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ChannelBankProvider for TestChannelBankProvider {
    async fn next_frame(&mut self) -> PipelineResult<Frame> {
        self.data.pop().unwrap_or(Err(PipelineError::Eof.temp()))
    }
}

#[async_trait]
impl ResettableStage for TestChannelBankProvider {
    async fn reset(&mut self, _base: BlockInfo, _cfg: &SystemConfig) -> PipelineResult<()> {
        self.reset = true;
        Ok(())
    }
}

/// A mock [ChannelReaderProvider] for testing the [ChannelReader] stage.
///
/// [ChannelReader]: crate::stages::ChannelReader
#[derive(Debug)]
pub struct TestChannelReaderProvider {
    /// The channel data to return.
    pub data: Vec<PipelineResult<Option<Bytes>>>,
    /// The origin block info
    pub block_info: Option<BlockInfo>,
    /// Tracks if the channel reader provider has been reset.
    pub reset: bool,
}

impl TestChannelReaderProvider {
    /// Creates a new [TestChannelReaderProvider] with the given data, at the default origin.
    pub fn new(data: Vec<PipelineResult<Option<Bytes>>>) -> Self {
        Self { data, block_info: Some(BlockInfo::default()), reset: false }
    }
}

impl OriginProvider for TestChannelReaderProvider {
    fn origin(&self) -> Option<BlockInfo> {
        self.block_info
    }
}

#[async_trait]
impl OriginAdvancer for TestChannelReaderProvider {
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ChannelReaderProvider for TestChannelReaderProvider {
    async fn next_data(&mut self) -> PipelineResult<Option<Bytes>> {
        self.data.pop().unwrap_or(Err(PipelineError::Eof.temp()))
    }
}

#[async_trait]
impl ResettableStage for TestChannelReaderProvider {
    async fn reset(&mut self, _base: BlockInfo, _cfg: &SystemConfig) -> PipelineResult<()> {
        self.reset = true;
        Ok(())
    }
}

/// A mock [BatchQueueProvider] for testing the [BatchQueue] stage.
///
/// [BatchQueue]: crate::stages::BatchQueue
#[derive(Debug, Default)]
pub struct TestBatchQueueProvider {
    /// The origin of the L1 block.
    pub origin: Option<BlockInfo>,
    /// A list of batches to return.
    pub batches: Vec<PipelineResult<Batch>>,
    /// Tracks if the provider has been reset.
    pub reset: bool,
}

impl TestBatchQueueProvider {
    /// Creates a new [TestBatchQueueProvider] with the given batches.
    pub const fn new(batches: Vec<PipelineResult<Batch>>) -> Self {
        Self { origin: None, batches, reset: false }
    }
}

impl OriginProvider for TestBatchQueueProvider {
    fn origin(&self) -> Option<BlockInfo> {
        self.origin
    }
}

#[async_trait]
impl BatchQueueProvider for TestBatchQueueProvider {
    async fn next_batch(&mut self) -> PipelineResult<Batch> {
        self.batches.pop().unwrap_or(Err(PipelineError::Eof.temp()))
    }
}

#[async_trait]
impl OriginAdvancer for TestBatchQueueProvider {
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ResettableStage for TestBatchQueueProvider {
    async fn reset(&mut self, _base: BlockInfo, _cfg: &SystemConfig) -> PipelineResult<()> {
        self.reset = true;
        Ok(())
    }
}

/// A mock [AttributesProvider] for testing the [AttributesQueue] stage.
///
/// [AttributesQueue]: crate::stages::AttributesQueue
#[derive(Debug, Default)]
pub struct TestAttributesProvider {
    /// The origin of the L1 block.
    origin: Option<BlockInfo>,
    /// A list of batches to return.
    batches: Vec<PipelineResult<SingleBatch>>,
    /// Tracks if the provider has been reset.
    pub reset: bool,
}

/// Creates a new [TestAttributesProvider] with the given origin and batches.
pub const fn new_test_attributes_provider(
    origin: Option<BlockInfo>,
    batches: Vec<PipelineResult<SingleBatch>>,
) -> TestAttributesProvider {
    TestAttributesProvider { origin, batches, reset: false }
}

impl OriginProvider for TestAttributesProvider {
    fn origin(&self) -> Option<BlockInfo> {
        self.origin
    }
}

#[async_trait]
impl OriginAdvancer for TestAttributesProvider {
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        Ok(())
    }
}

#[async_trait]
impl ResettableStage for TestAttributesProvider {
    async fn reset(&mut self, _base: BlockInfo, _cfg: &SystemConfig) -> PipelineResult<()> {
        self.reset = true;
        Ok(())
    }
}

#[async_trait]
impl AttributesProvider for TestAttributesProvider {
    async fn next_batch(&mut self, _parent: L2BlockInfo) -> PipelineResult<SingleBatch> {
        self.batches.pop().ok_or(PipelineError::Eof.temp())?
    }

    fn is_last_in_span(&self) -> bool {
        self.batches.is_empty()
    }
}

/// A mock implementation of the [AttributesBuilder] for testing.
#[derive(Debug, Default)]
pub struct TestAttributesBuilder {
    /// The attributes to return.
    pub attributes: Vec<PipelineResult<OpPayloadAttributes>>,
}

#[async_trait]
impl AttributesBuilder for TestAttributesBuilder {
    async fn prepare_payload_attributes(
        &mut self,
        _l2_parent: L2BlockInfo,
        _epoch: BlockID,
    ) -> PipelineResult<OpPayloadAttributes> {
        match self.attributes.pop() {
            Some(attributes) => attributes,
            None => Err(PipelineError::AttributesBuilder(BuilderError::Custom(
                "no attributes queued".to_string(),
            ))
            .crit()),
        }
    }
}

/// A mock top-level stage, standing in for the [AttributesQueue] under a pipeline.
///
/// [AttributesQueue]: crate::stages::AttributesQueue
#[derive(Debug, Default)]
pub struct TestNextAttributes {
    /// The attributes to hand out once.
    pub next_attributes: Option<L2AttributesWithParent>,
    /// The error returned by [OriginAdvancer::advance_origin], if any.
    pub advance_error: Option<PipelineErrorKind>,
    /// The origin to report.
    pub origin: Option<BlockInfo>,
    /// The last base the stage was reset to.
    pub reset_to: Option<BlockInfo>,
}

#[async_trait]
impl NextAttributes for TestNextAttributes {
    async fn next_attributes(&mut self, _: L2BlockInfo) -> PipelineResult<L2AttributesWithParent> {
        self.next_attributes.take().ok_or(PipelineError::Eof.temp())
    }
}

#[async_trait]
impl OriginAdvancer for TestNextAttributes {
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        match self.advance_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl OriginProvider for TestNextAttributes {
    fn origin(&self) -> Option<BlockInfo> {
        self.origin
    }
}

#[async_trait]
impl ResettableStage for TestNextAttributes {
    async fn reset(&mut self, base: BlockInfo, _: &SystemConfig) -> PipelineResult<()> {
        self.reset_to = Some(base);
        Ok(())
    }
}
