//! Contains the [L1Retrieval] stage of the derivation pipeline.

use crate::{
    errors::{PipelineError, PipelineErrorKind, PipelineResult},
    stages::FrameQueueProvider,
    traits::{
        AsyncIterator, DataAvailabilityProvider, OriginAdvancer, OriginProvider, ResettableStage,
    },
};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use ferry_primitives::{BlockInfo, SystemConfig};
use tracing::debug;

/// Provides L1 blocks for the [L1Retrieval] stage.
/// This is the previous stage in the pipeline.
#[async_trait]
pub trait L1RetrievalProvider {
    /// Returns the next L1 [BlockInfo] in the [L1Traversal] stage, if the stage is not complete.
    /// This function can only be called once while the stage is in progress, and will return
    /// [PipelineError::Eof] on subsequent calls unless the stage is reset or advanced.
    ///
    /// [L1Traversal]: crate::stages::L1Traversal
    async fn next_l1_block(&mut self) -> PipelineResult<Option<BlockInfo>>;

    /// Returns the batcher [Address] from the current [SystemConfig].
    fn batcher_addr(&self) -> Address;
}

/// The [L1Retrieval] stage of the derivation pipeline.
///
/// For each L1 [BlockInfo] pulled from the [L1Traversal] stage, [L1Retrieval] fetches the
/// associated data from a specified [DataAvailabilityProvider]. The data is served one item
/// at a time to the [FrameQueue].
///
/// [L1Traversal]: crate::stages::L1Traversal
/// [FrameQueue]: crate::stages::FrameQueue
#[derive(Debug)]
pub struct L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + ResettableStage,
{
    /// The previous stage in the pipeline.
    pub prev: P,
    /// The data availability provider to use for the L1 retrieval stage.
    pub provider: DAP,
    /// The current data iterator.
    pub(crate) data: Option<DAP::DataIter>,
}

impl<DAP, P> L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + ResettableStage,
{
    /// Creates a new [L1Retrieval] stage with the previous [L1Traversal] stage and given
    /// [DataAvailabilityProvider].
    ///
    /// [L1Traversal]: crate::stages::L1Traversal
    pub const fn new(prev: P, provider: DAP) -> Self {
        Self { prev, provider, data: None }
    }
}

#[async_trait]
impl<DAP, P> OriginAdvancer for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider + Send + Sync,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + ResettableStage + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

#[async_trait]
impl<DAP, P> FrameQueueProvider for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider + Send + Sync,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + ResettableStage + Send,
{
    async fn next_data(&mut self) -> PipelineResult<Bytes> {
        if self.data.is_none() {
            let next = self.prev.next_l1_block().await?.ok_or(PipelineError::MissingL1Data.temp())?;
            debug!(target: "l1-retrieval", "Opening data for L1 block {}", next.number);
            self.data = Some(self.provider.open_data(&next, self.prev.batcher_addr()).await?);
        }

        let Some(data) = self.data.as_mut() else {
            return Err(PipelineError::MissingL1Data.temp());
        };
        match data.next().await {
            Ok(data) => Ok(data.into()),
            Err(PipelineErrorKind::Temporary(PipelineError::Eof)) => {
                self.data = None;
                Err(PipelineError::Eof.temp())
            }
            Err(e) => Err(e),
        }
    }
}

impl<DAP, P> OriginProvider for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + ResettableStage,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<DAP, P> ResettableStage for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider + Send + Sync,
    P: L1RetrievalProvider + OriginAdvancer + OriginProvider + ResettableStage + Send,
{
    async fn reset(&mut self, base: BlockInfo, cfg: &SystemConfig) -> PipelineResult<()> {
        self.prev.reset(base, cfg).await?;
        self.data = None;
        Ok(())
    }
}
