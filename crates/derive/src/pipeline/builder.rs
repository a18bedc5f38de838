//! Contains the `PipelineBuilder` object that is used to build a `DerivationPipeline`.

use super::DerivationPipeline;
use crate::{
    errors::PipelineBuilderError,
    stages::{
        AttributesQueue, BatchQueue, ChannelBank, ChannelReader, FrameQueue, L1Retrieval,
        L1Traversal,
    },
    traits::{AttributesBuilder, ChainProvider, DataAvailabilityProvider, L2ChainProvider},
};
use core::fmt::Debug;
use ferry_primitives::RollupConfig;
use std::sync::Arc;

type L1TraversalStage<P> = L1Traversal<P>;
type L1RetrievalStage<DAP, P> = L1Retrieval<DAP, L1TraversalStage<P>>;
type FrameQueueStage<DAP, P> = FrameQueue<L1RetrievalStage<DAP, P>>;
type ChannelBankStage<DAP, P> = ChannelBank<FrameQueueStage<DAP, P>>;
type ChannelReaderStage<DAP, P> = ChannelReader<ChannelBankStage<DAP, P>>;
type BatchQueueStage<DAP, P, T> = BatchQueue<ChannelReaderStage<DAP, P>, T>;

/// The top stage of a pipeline assembled by the [PipelineBuilder].
pub type AttributesQueueStage<DAP, P, T, B> = AttributesQueue<BatchQueueStage<DAP, P, T>, B>;

/// The [DerivationPipeline] assembled by the [PipelineBuilder].
pub type StagedPipeline<B, P, T, DAP> = DerivationPipeline<AttributesQueueStage<DAP, P, T, B>, T>;

/// The PipelineBuilder constructs a [DerivationPipeline] using a builder pattern.
#[derive(Debug)]
pub struct PipelineBuilder<B, P, T, D>
where
    B: AttributesBuilder + Send + Debug,
    P: ChainProvider + Send + Sync + Debug,
    T: L2ChainProvider + Clone + Send + Sync + Debug,
    D: DataAvailabilityProvider + Send + Sync + Debug,
{
    l2_chain_provider: Option<T>,
    dap_source: Option<D>,
    chain_provider: Option<P>,
    builder: Option<B>,
    rollup_config: Option<Arc<RollupConfig>>,
}

impl<B, P, T, D> Default for PipelineBuilder<B, P, T, D>
where
    B: AttributesBuilder + Send + Debug,
    P: ChainProvider + Send + Sync + Debug,
    T: L2ChainProvider + Clone + Send + Sync + Debug,
    D: DataAvailabilityProvider + Send + Sync + Debug,
{
    fn default() -> Self {
        Self {
            l2_chain_provider: None,
            dap_source: None,
            chain_provider: None,
            builder: None,
            rollup_config: None,
        }
    }
}

impl<B, P, T, D> PipelineBuilder<B, P, T, D>
where
    B: AttributesBuilder + Send + Debug,
    P: ChainProvider + Send + Sync + Debug,
    T: L2ChainProvider + Clone + Send + Sync + Debug,
    D: DataAvailabilityProvider + Send + Sync + Debug,
{
    /// Creates a new pipeline builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rollup config for the pipeline.
    pub fn rollup_config(mut self, rollup_config: Arc<RollupConfig>) -> Self {
        self.rollup_config = Some(rollup_config);
        self
    }

    /// Sets the data availability provider for the pipeline.
    pub fn dap_source(mut self, dap_source: D) -> Self {
        self.dap_source = Some(dap_source);
        self
    }

    /// Sets the builder for the pipeline.
    pub fn builder(mut self, builder: B) -> Self {
        self.builder = Some(builder);
        self
    }

    /// Sets the l2 chain provider for the pipeline.
    pub fn l2_chain_provider(mut self, l2_chain_provider: T) -> Self {
        self.l2_chain_provider = Some(l2_chain_provider);
        self
    }

    /// Sets the chain provider for the pipeline.
    pub fn chain_provider(mut self, chain_provider: P) -> Self {
        self.chain_provider = Some(chain_provider);
        self
    }

    /// Builds the pipeline, linking every stage from [L1Traversal] up to the [AttributesQueue].
    ///
    /// The stack starts out without an L1 origin; the caller resets it before stepping.
    pub fn build(self) -> Result<StagedPipeline<B, P, T, D>, PipelineBuilderError> {
        let rollup_config =
            self.rollup_config.ok_or(PipelineBuilderError::MissingComponent("rollup_config"))?;
        let chain_provider =
            self.chain_provider.ok_or(PipelineBuilderError::MissingComponent("chain_provider"))?;
        let l2_chain_provider = self
            .l2_chain_provider
            .ok_or(PipelineBuilderError::MissingComponent("l2_chain_provider"))?;
        let dap_source =
            self.dap_source.ok_or(PipelineBuilderError::MissingComponent("dap_source"))?;
        let attributes_builder =
            self.builder.ok_or(PipelineBuilderError::MissingComponent("builder"))?;

        let l1_traversal = L1Traversal::new(chain_provider, Arc::clone(&rollup_config));
        let l1_retrieval = L1Retrieval::new(l1_traversal, dap_source);
        let frame_queue = FrameQueue::new(l1_retrieval);
        let channel_bank = ChannelBank::new(Arc::clone(&rollup_config), frame_queue);
        let channel_reader = ChannelReader::new(channel_bank, Arc::clone(&rollup_config));
        let batch_queue =
            BatchQueue::new(Arc::clone(&rollup_config), channel_reader, l2_chain_provider.clone());
        let attributes =
            AttributesQueue::new(Arc::clone(&rollup_config), batch_queue, attributes_builder);

        Ok(DerivationPipeline::new(attributes, rollup_config, l2_chain_provider))
    }
}
