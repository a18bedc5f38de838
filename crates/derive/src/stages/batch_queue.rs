//! This module contains the `BatchQueue` stage implementation.

use crate::{
    errors::{PipelineEncodingError, PipelineError, PipelineErrorKind, PipelineResult, ResetError},
    stages::AttributesProvider,
    traits::{L2ChainProvider, OriginAdvancer, OriginProvider, ResettableStage},
};
use async_trait::async_trait;
use core::fmt::Debug;
use ferry_primitives::{
    Batch, BatchValidity, BatchWithInclusionBlock, BlockInfo, L2BlockInfo, RollupConfig,
    SingleBatch, SystemConfig,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Provides [Batch]es for the [BatchQueue] stage.
#[async_trait]
pub trait BatchQueueProvider {
    /// Returns the next [Batch] in the [ChannelReader] stage, if the stage is not complete.
    /// If the stage has no more batches for the current origin, an [PipelineError::Eof] error is
    /// returned.
    ///
    /// [ChannelReader]: crate::stages::ChannelReader
    async fn next_batch(&mut self) -> PipelineResult<Batch>;
}

/// [BatchQueue] is responsible for ordering unordered batches
/// and generating empty batches when the sequence window has passed.
///
/// It receives batches that are tagged with the L1 Inclusion block of the batch.
/// It only considers batches that are inside the sequencing window of a specific L1 Origin.
/// It tries to eagerly pull batches based on the current L2 safe head.
/// Otherwise it filters/creates an entire epoch's worth of batches at once.
///
/// This stage tracks a range of L1 blocks with the assumption that all batches with an L1 inclusion
/// block inside that range have been added to the stage by the time that it attempts to advance a
/// full epoch.
///
/// It is internally responsible for making sure that batches with L1 inclusions block outside its
/// working range are not considered or pruned.
#[derive(Debug)]
pub struct BatchQueue<P, BF>
where
    P: BatchQueueProvider + OriginAdvancer + OriginProvider + ResettableStage + Debug,
    BF: L2ChainProvider + Debug,
{
    /// The rollup config.
    cfg: Arc<RollupConfig>,
    /// The previous stage of the derivation pipeline.
    pub prev: P,
    /// The l1 block ref
    origin: Option<BlockInfo>,
    /// A consecutive, time-centric window of L1 Blocks.
    /// Every L1 origin of unsafe L2 Blocks must be included in this list.
    /// If every L2 Block corresponding to a single L1 Block becomes safe,
    /// the block is popped from this list.
    /// If new L2 Block's L1 origin is not included in this list, fetch and
    /// push it to the list.
    l1_blocks: Vec<BlockInfo>,
    /// A set of batches in order from when we've seen them.
    pub(crate) batches: Vec<BatchWithInclusionBlock>,
    /// A set of cached [SingleBatch]es derived from [SpanBatch]es.
    ///
    /// [SpanBatch]: ferry_primitives::SpanBatch
    next_spans: Vec<SingleBatch>,
    /// Used to validate the batches.
    fetcher: BF,
}

impl<P, BF> BatchQueue<P, BF>
where
    P: BatchQueueProvider + OriginAdvancer + OriginProvider + ResettableStage + Debug,
    BF: L2ChainProvider + Debug,
{
    /// Creates a new [BatchQueue] stage.
    pub const fn new(cfg: Arc<RollupConfig>, prev: P, fetcher: BF) -> Self {
        Self {
            cfg,
            prev,
            origin: None,
            l1_blocks: Vec::new(),
            batches: Vec::new(),
            next_spans: Vec::new(),
            fetcher,
        }
    }

    /// Pops the next batch from the current queued up span-batch cache.
    /// The parent is used to set the parent hash of the batch.
    /// The parent is verified when the batch is later validated.
    pub fn pop_next_batch(&mut self, parent: L2BlockInfo) -> Option<SingleBatch> {
        if self.next_spans.is_empty() {
            return None;
        }
        let mut next = self.next_spans.remove(0);
        next.parent_hash = parent.block_info.hash;
        Some(next)
    }

    /// Derives the next batch to apply on top of the current L2 safe head.
    /// Follows the validity rules imposed on consecutive batches.
    /// Based on currently available buffered batch and L1 origin information.
    /// A [PipelineError::Eof] is returned if no batch can be derived yet.
    pub async fn derive_next_batch(
        &mut self,
        empty: bool,
        parent: L2BlockInfo,
    ) -> PipelineResult<Batch> {
        // Cannot derive a batch if no origin was prepared.
        let Some(epoch) = self.l1_blocks.first().copied() else {
            return Err(PipelineError::MissingOrigin.crit());
        };
        debug!(target: "batch-queue", "Deriving next batch for epoch: {}", epoch.number);

        // The epoch origin can be one block ahead of the L2 safe head when every batch of an
        // epoch was generated and the epoch advanced, but the safe head's epoch did not.
        if parent.l1_origin != epoch.id() &&
            parent.l1_origin.number != epoch.number.saturating_sub(1)
        {
            return Err(PipelineErrorKind::Reset(ResetError::L1OriginMismatch(
                parent.l1_origin.number,
                epoch.number.saturating_sub(1),
            )));
        }

        // Find the first-seen batch that matches all validity conditions.
        // There may be none: in that case we force-create an empty batch.
        let mut next_batch = None;
        let next_timestamp = parent.block_info.timestamp + self.cfg.block_time;

        // Go over all batches, in order of inclusion, and find the first batch we can accept.
        // Only batches that may be processed in the future, or undecided ones, are kept.
        let mut remaining = Vec::new();
        for i in 0..self.batches.len() {
            let batch = &self.batches[i];
            let validity =
                batch.check_batch(&self.cfg, &self.l1_blocks, parent, &mut self.fetcher).await;
            match validity {
                BatchValidity::Future => {
                    remaining.push(batch.clone());
                }
                BatchValidity::Drop => {
                    warn!(
                        target: "batch-queue",
                        "Dropping batch with parent: {}",
                        parent.block_info.number
                    );
                    continue;
                }
                BatchValidity::Accept => {
                    next_batch = Some(batch.clone());
                    // Retain every batch we didn't get to yet.
                    remaining.extend_from_slice(&self.batches[i + 1..]);
                    break;
                }
                BatchValidity::Undecided => {
                    remaining.extend_from_slice(&self.batches[i..]);
                    self.batches = remaining;
                    return Err(PipelineError::Eof.temp());
                }
            }
        }
        self.batches = remaining;

        if let Some(nb) = next_batch {
            info!(target: "batch-queue", "Next batch found for timestamp {}", nb.batch.timestamp());
            return Ok(nb.batch);
        }

        // If the current epoch is too old compared to the L1 block we are at,
        // i.e. if the sequence window expired, we create empty batches for the current epoch.
        let expiry_epoch = epoch.number + self.cfg.seq_window_size;
        let bq_origin = self.origin.ok_or(PipelineError::MissingOrigin.crit())?;
        let force_empty_batches =
            (expiry_epoch == bq_origin.number && empty) || expiry_epoch < bq_origin.number;
        let first_of_epoch = epoch.number == parent.l1_origin.number + 1;

        // There is still room to receive batches for the current epoch.
        if !force_empty_batches {
            return Err(PipelineError::Eof.temp());
        }

        info!(
            target: "batch-queue",
            "Generating empty batches for epoch: {} | parent: {}",
            epoch.number, parent.l1_origin.number
        );

        // The next L1 block is needed to proceed towards the next epoch.
        let Some(next_epoch) = self.l1_blocks.get(1).copied() else {
            return Err(PipelineError::Eof.temp());
        };

        // Fill with empty L2 blocks of the same epoch until we meet the time of the next L1 origin,
        // to preserve that L2 time >= L1 time. The first block of an epoch is always generated.
        if next_timestamp < next_epoch.timestamp || first_of_epoch {
            info!(target: "batch-queue", "Generating empty batch for epoch: {}", epoch.number);
            return Ok(Batch::Single(SingleBatch {
                parent_hash: parent.block_info.hash,
                epoch_num: epoch.number,
                epoch_hash: epoch.hash,
                timestamp: next_timestamp,
                transactions: Vec::new(),
            }));
        }

        // Every batch of the current epoch has been generated, advance to the next epoch.
        info!(
            target: "batch-queue",
            "Advancing to next epoch: {}, timestamp: {}, epoch timestamp: {}",
            next_epoch.number, next_timestamp, next_epoch.timestamp
        );
        self.l1_blocks.remove(0);
        Err(PipelineError::Eof.temp())
    }

    /// Adds a batch to the queue, tagged with the current origin as its inclusion block.
    pub async fn add_batch(&mut self, batch: Batch, parent: L2BlockInfo) -> PipelineResult<()> {
        if self.l1_blocks.is_empty() {
            error!(target: "batch-queue", "Cannot add batch without an origin");
            return Err(PipelineError::MissingOrigin.crit());
        }
        let origin = self.origin.ok_or(PipelineError::MissingOrigin.crit())?;
        let data = BatchWithInclusionBlock::new(origin, batch);
        // Validation logs the drop reason.
        if data.check_batch(&self.cfg, &self.l1_blocks, parent, &mut self.fetcher).await.is_drop() {
            return Ok(());
        }
        self.batches.push(data);
        Ok(())
    }
}

#[async_trait]
impl<P, BF> OriginAdvancer for BatchQueue<P, BF>
where
    P: BatchQueueProvider + OriginAdvancer + OriginProvider + ResettableStage + Send + Debug,
    BF: L2ChainProvider + Send + Debug,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

#[async_trait]
impl<P, BF> AttributesProvider for BatchQueue<P, BF>
where
    P: BatchQueueProvider + OriginAdvancer + OriginProvider + ResettableStage + Send + Debug,
    BF: L2ChainProvider + Send + Debug,
{
    /// Returns the next valid batch upon the given safe head.
    async fn next_batch(&mut self, parent: L2BlockInfo) -> PipelineResult<SingleBatch> {
        if let Some(next) = self.next_spans.first() {
            // There are cached singular batches derived from the span batch.
            // Check if the next cached batch matches the given parent block.
            if next.timestamp == parent.block_info.timestamp + self.cfg.block_time {
                return self.pop_next_batch(parent).ok_or(PipelineError::BatchQueueEmpty.crit());
            }
            // The previously returned batch was not applied, drop the rest of the span.
            warn!(
                target: "batch-queue",
                "Parent block does not match the next batch. Dropping {} cached batches.",
                self.next_spans.len()
            );
            self.next_spans.clear();
        }

        // If the epoch is advanced, update the l1 blocks.
        // Advancing epoch must be done after the pipeline successfully applies the entire span
        // batch to the chain, so the existing l1 blocks stay available to verify the epochs of
        // the next candidate batch.
        if !self.l1_blocks.is_empty() && parent.l1_origin.number > self.l1_blocks[0].number {
            if let Some(i) =
                self.l1_blocks.iter().position(|block| block.number == parent.l1_origin.number)
            {
                self.l1_blocks.drain(0..i);
                debug!(target: "batch-queue", "Advancing epoch to {}", parent.l1_origin.number);
            }
        }

        // The origin is used to determine if it's behind.
        // It is the future origin that gets saved into the l1 blocks array.
        let origin_behind =
            self.prev.origin().map_or(true, |origin| origin.number < parent.l1_origin.number);

        // Advance the origin if needed. Batches prior to the l1 origin of the l2 safe head are not
        // accepted.
        if self.origin != self.prev.origin() {
            self.origin = self.prev.origin();
            if !origin_behind {
                let origin = self.origin.ok_or(PipelineError::MissingOrigin.crit())?;
                self.l1_blocks.push(origin);
            } else {
                // At startup the batch queue is reset to include the l1 origin. That is the only
                // time the origin is not behind right after a reset.
                self.l1_blocks.clear();
            }
            debug!(target: "batch-queue", "Advancing batch queue origin: {:?}", self.origin);
        }

        // Load more data into the batch queue.
        let mut out_of_data = false;
        match self.prev.next_batch().await {
            Ok(b) => {
                if !origin_behind {
                    self.add_batch(b, parent).await?;
                } else {
                    warn!(target: "batch-queue", "Dropping batch: Origin is behind");
                }
            }
            Err(e) if e.is_eof() => out_of_data = true,
            Err(e) => return Err(e),
        }

        // Skip adding the data unless up to date with the origin,
        // but still fully empty the previous stages.
        if origin_behind {
            if out_of_data {
                return Err(PipelineError::Eof.temp());
            }
            return Err(PipelineError::NotEnoughData.temp());
        }

        // Attempt to derive more batches.
        let batch = match self.derive_next_batch(out_of_data, parent).await {
            Ok(b) => b,
            Err(e) if e.is_eof() => {
                if out_of_data {
                    return Err(PipelineError::Eof.temp());
                }
                return Err(PipelineError::NotEnoughData.temp());
            }
            Err(e) => return Err(e),
        };

        // If the next batch is derived from the span batch, it's the last batch of the span.
        // For singular batches, the span batch cache should be empty.
        match batch {
            Batch::Single(sb) => Ok(sb),
            Batch::Span(sb) => {
                let batches = match sb.get_singular_batches(&self.l1_blocks, parent) {
                    Ok(b) => b,
                    Err(e) => {
                        return Err(
                            PipelineError::BadEncoding(PipelineEncodingError::SpanBatchError(e))
                                .crit(),
                        )
                    }
                };
                self.next_spans = batches;
                self.pop_next_batch(parent).ok_or(PipelineError::BatchQueueEmpty.crit())
            }
        }
    }

    /// Returns if the previous batch was the last in the span.
    fn is_last_in_span(&self) -> bool {
        self.next_spans.is_empty()
    }
}

impl<P, BF> OriginProvider for BatchQueue<P, BF>
where
    P: BatchQueueProvider + OriginAdvancer + OriginProvider + ResettableStage + Debug,
    BF: L2ChainProvider + Debug,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P, BF> ResettableStage for BatchQueue<P, BF>
where
    P: BatchQueueProvider + OriginAdvancer + OriginProvider + ResettableStage + Send + Debug,
    BF: L2ChainProvider + Send + Debug,
{
    async fn reset(&mut self, base: BlockInfo, system_config: &SystemConfig) -> PipelineResult<()> {
        self.prev.reset(base, system_config).await?;
        self.origin = Some(base);
        self.batches.clear();
        // Include the new origin as an origin to build on.
        // This is only for the initialization case.
        // During normal resets we will later throw out this block.
        self.l1_blocks.clear();
        self.l1_blocks.push(base);
        self.next_spans.clear();
        Ok(())
    }
}
