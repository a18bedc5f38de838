//! This module contains the `ChannelReader` struct.

use crate::{
    errors::{PipelineError, PipelineResult},
    stages::BatchQueueProvider,
    traits::{OriginAdvancer, OriginProvider, ResettableStage},
};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use core::fmt::Debug;
use ferry_primitives::{Batch, BatchReader, BlockInfo, RollupConfig, SystemConfig};
use std::sync::Arc;
use tracing::{debug, warn};

/// The [ChannelReader] provider trait.
#[async_trait]
pub trait ChannelReaderProvider {
    /// Pulls the next piece of data from the channel bank. Note that it attempts to pull data out
    /// of the channel bank prior to loading data in (unlike most other stages). This is to
    /// ensure maintain consistency around channel bank pruning which depends upon the order
    /// of operations.
    async fn next_data(&mut self) -> PipelineResult<Option<Bytes>>;
}

/// [ChannelReader] is a stateful stage that reads [Batch]es from `Channel`s.
///
/// The [ChannelReader] pulls `Channel`s from the channel bank as raw data
/// and pipes it into a [BatchReader]. Since the raw data is compressed,
/// the [BatchReader] first decompresses the data using the first bytes as
/// a compression algorithm identifier.
///
/// Once the data is decompressed, it is decoded into a [Batch] and passed
/// to the next stage in the pipeline.
#[derive(Debug)]
pub struct ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + ResettableStage + Debug,
{
    /// The previous stage of the derivation pipeline.
    pub prev: P,
    /// The batch reader.
    next_batch: Option<BatchReader>,
    /// The rollup configuration.
    cfg: Arc<RollupConfig>,
}

impl<P> ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + ResettableStage + Debug,
{
    /// Create a new [ChannelReader] stage.
    pub const fn new(prev: P, cfg: Arc<RollupConfig>) -> Self {
        Self { prev, next_batch: None, cfg }
    }

    /// Creates the batch reader from available channel data.
    async fn set_batch_reader(&mut self) -> PipelineResult<()> {
        if self.next_batch.is_none() {
            let channel =
                self.prev.next_data().await?.ok_or(PipelineError::ChannelReaderEmpty.temp())?;
            let origin = self.prev.origin().ok_or(PipelineError::MissingOrigin.crit())?;
            self.next_batch =
                Some(BatchReader::for_origin(channel.to_vec(), &self.cfg, origin.timestamp));
        }
        Ok(())
    }

    /// Forces the read to continue with the next channel, resetting any
    /// decoding / decompression state to a fresh start.
    pub fn next_channel(&mut self) {
        self.next_batch = None;
    }
}

#[async_trait]
impl<P> OriginAdvancer for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + ResettableStage + Send + Debug,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

#[async_trait]
impl<P> BatchQueueProvider for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + ResettableStage + Send + Debug,
{
    async fn next_batch(&mut self) -> PipelineResult<Batch> {
        if let Err(e) = self.set_batch_reader().await {
            debug!(target: "channel-reader", "Failed to set batch reader: {:?}", e);
            self.next_channel();
            return Err(e);
        }
        let Some(reader) = self.next_batch.as_mut() else {
            return Err(PipelineError::NotEnoughData.temp());
        };

        let batch = match reader.next_batch(self.cfg.as_ref()) {
            Ok(Some(batch)) => batch,
            Ok(None) => {
                debug!(target: "channel-reader", "Channel exhausted");
                self.next_channel();
                return Err(PipelineError::NotEnoughData.temp());
            }
            Err(e) => {
                warn!(
                    target: "channel-reader",
                    "Dropping channel after failing to decode batch: {e}"
                );
                self.next_channel();
                return Err(PipelineError::NotEnoughData.temp());
            }
        };

        // Span batches are only valid once Delta is active on the L1 origin.
        if let Batch::Span(_) = batch {
            let origin = self.prev.origin().ok_or(PipelineError::MissingOrigin.crit())?;
            if !self.cfg.is_delta_active(origin.timestamp) {
                warn!(
                    target: "channel-reader",
                    "Dropping span batch received before Delta activation at L1 block {}",
                    origin.number
                );
                return Err(PipelineError::NotEnoughData.temp());
            }
        }

        Ok(batch)
    }
}

impl<P> OriginProvider for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + ResettableStage + Debug,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> ResettableStage for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + ResettableStage + Debug + Send,
{
    async fn reset(&mut self, base: BlockInfo, cfg: &SystemConfig) -> PipelineResult<()> {
        self.prev.reset(base, cfg).await?;
        self.next_channel();
        Ok(())
    }
}
