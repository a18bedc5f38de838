//! Contains the [L1Traversal] stage of the derivation pipeline.

use crate::{
    errors::{PipelineError, PipelineResult, ResetError},
    stages::L1RetrievalProvider,
    traits::{ChainProvider, OriginAdvancer, OriginProvider, ResettableStage},
};
use alloy_primitives::Address;
use async_trait::async_trait;
use ferry_primitives::{BlockInfo, RollupConfig, SystemConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The [L1Traversal] stage of the derivation pipeline.
///
/// This stage sits at the bottom of the pipeline, holding a handle to the data source
/// (a [ChainProvider] implementation) and the current L1 [BlockInfo] in the pipeline,
/// which are used to traverse the L1 chain. When the [L1Traversal] stage is advanced,
/// it fetches the next L1 [BlockInfo] from the data source and updates the [SystemConfig]
/// with the receipts from the block.
#[derive(Debug, Clone)]
pub struct L1Traversal<F: ChainProvider> {
    /// The current block in the traversal stage.
    pub(crate) block: Option<BlockInfo>,
    /// The data source for the traversal stage.
    data_source: F,
    /// Signals whether or not the traversal stage is complete.
    done: bool,
    /// The system config.
    pub system_config: SystemConfig,
    /// A reference to the rollup config.
    pub rollup_config: Arc<RollupConfig>,
}

#[async_trait]
impl<F: ChainProvider + Send> L1RetrievalProvider for L1Traversal<F> {
    fn batcher_addr(&self) -> Address {
        self.system_config.batcher_address
    }

    async fn next_l1_block(&mut self) -> PipelineResult<Option<BlockInfo>> {
        if !self.done {
            self.done = true;
            Ok(self.block)
        } else {
            Err(PipelineError::Eof.temp())
        }
    }
}

impl<F: ChainProvider> L1Traversal<F> {
    /// Creates a new [L1Traversal] instance, starting from the genesis [SystemConfig].
    pub fn new(data_source: F, cfg: Arc<RollupConfig>) -> Self {
        Self {
            block: Some(BlockInfo::default()),
            data_source,
            done: false,
            system_config: cfg.genesis.system_config,
            rollup_config: cfg,
        }
    }

    /// Retrieves a reference to the inner data source of the [L1Traversal] stage.
    pub const fn data_source(&self) -> &F {
        &self.data_source
    }
}

#[async_trait]
impl<F: ChainProvider + Send> OriginAdvancer for L1Traversal<F> {
    /// Advances the internal state of the [L1Traversal] stage to the next L1 block.
    /// This function fetches the next L1 [BlockInfo] from the data source and updates the
    /// [SystemConfig] with the receipts from the block.
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        // Pull the next block or return EOF.
        // PipelineError::EOF has special handling further up the pipeline.
        let block = match self.block {
            Some(block) => block,
            None => {
                warn!(
                    target: "l1-traversal",
                    "Missing current block, can't advance origin with no reference."
                );
                return Err(PipelineError::Eof.temp());
            }
        };
        let next_l1_origin = match self.data_source.block_info_by_number(block.number + 1).await {
            Ok(block) => block,
            Err(e) => return Err(e.into()),
        };

        // Check block hashes for reorgs.
        if block.hash != next_l1_origin.parent_hash {
            info!(
                target: "l1-traversal",
                "Detected L1 reorg at block {}: expected parent {}, got {}",
                next_l1_origin.number,
                block.hash,
                next_l1_origin.parent_hash
            );
            return Err(ResetError::ReorgDetected(block.hash, next_l1_origin.parent_hash).into());
        }

        // Fetch receipts for the next l1 block and update the system config.
        let receipts = match self.data_source.receipts_by_hash(next_l1_origin.hash).await {
            Ok(receipts) => receipts,
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.system_config.update_with_receipts(
            receipts.as_slice(),
            &self.rollup_config,
            next_l1_origin.timestamp,
        ) {
            return Err(PipelineError::SystemConfigUpdate(e).crit());
        }

        let prev_block_holocene = self.rollup_config.is_holocene_active(block.timestamp);
        let next_block_holocene = self.rollup_config.is_holocene_active(next_l1_origin.timestamp);

        self.block = Some(next_l1_origin);
        self.done = false;

        // Holocene activates on the L1 timestamp, not the L2 timestamp.
        if !prev_block_holocene && next_block_holocene {
            info!(
                target: "l1-traversal",
                "Holocene activated at L1 block {}",
                next_l1_origin.number
            );
        }

        debug!(target: "l1-traversal", "Advanced origin to L1 block {}", next_l1_origin.number);
        Ok(())
    }
}

impl<F: ChainProvider> OriginProvider for L1Traversal<F> {
    fn origin(&self) -> Option<BlockInfo> {
        self.block
    }
}

#[async_trait]
impl<F: ChainProvider + Send> ResettableStage for L1Traversal<F> {
    async fn reset(&mut self, base: BlockInfo, cfg: &SystemConfig) -> PipelineResult<()> {
        self.block = Some(base);
        self.done = false;
        self.system_config = *cfg;
        info!(target: "l1-traversal", "Reset to L1 block {}", base.number);
        Ok(())
    }
}
