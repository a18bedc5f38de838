//! Contains the core derivation pipeline.

use crate::{
    errors::{PipelineError, PipelineErrorKind, PipelineResult},
    traits::{
        L2ChainProvider, NextAttributes, OriginAdvancer, OriginProvider, Pipeline,
        ResettableStage, StepResult,
    },
};
use async_trait::async_trait;
use core::fmt::Debug;
use ferry_primitives::{BlockInfo, L2AttributesWithParent, L2BlockInfo, RollupConfig};
use std::{collections::VecDeque, sync::Arc};
use tracing::{error, trace, warn};

/// The derivation pipeline is responsible for deriving L2 inputs from L1 data.
#[derive(Debug)]
pub struct DerivationPipeline<S, P>
where
    S: NextAttributes + ResettableStage + OriginProvider + OriginAdvancer + Debug + Send,
    P: L2ChainProvider + Send + Sync + Debug,
{
    /// A handle to the next attributes.
    pub attributes: S,
    /// A list of prepared [L2AttributesWithParent] to be used by the derivation pipeline
    /// consumer.
    pub prepared: VecDeque<L2AttributesWithParent>,
    /// The rollup config.
    pub rollup_config: Arc<RollupConfig>,
    /// The L2 Chain Provider used to fetch the system config on reset.
    pub l2_chain_provider: P,
}

impl<S, P> DerivationPipeline<S, P>
where
    S: NextAttributes + ResettableStage + OriginProvider + OriginAdvancer + Debug + Send,
    P: L2ChainProvider + Send + Sync + Debug,
{
    /// Creates a new instance of the [DerivationPipeline].
    pub const fn new(
        attributes: S,
        rollup_config: Arc<RollupConfig>,
        l2_chain_provider: P,
    ) -> Self {
        Self { attributes, prepared: VecDeque::new(), rollup_config, l2_chain_provider }
    }
}

impl<S, P> OriginProvider for DerivationPipeline<S, P>
where
    S: NextAttributes + ResettableStage + OriginProvider + OriginAdvancer + Debug + Send,
    P: L2ChainProvider + Send + Sync + Debug,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.attributes.origin()
    }
}

impl<S, P> Iterator for DerivationPipeline<S, P>
where
    S: NextAttributes + ResettableStage + OriginProvider + OriginAdvancer + Debug + Send,
    P: L2ChainProvider + Send + Sync + Debug,
{
    type Item = L2AttributesWithParent;

    fn next(&mut self) -> Option<Self::Item> {
        self.prepared.pop_front()
    }
}

#[async_trait]
impl<S, P> Pipeline for DerivationPipeline<S, P>
where
    S: NextAttributes + ResettableStage + OriginProvider + OriginAdvancer + Debug + Send,
    P: L2ChainProvider + Send + Sync + Debug,
{
    /// Peeks at the next prepared [L2AttributesWithParent] from the pipeline.
    fn peek(&self) -> Option<&L2AttributesWithParent> {
        self.prepared.front()
    }

    /// Returns the rollup config.
    fn rollup_config(&self) -> &RollupConfig {
        &self.rollup_config
    }

    /// Resets the pipeline on the provided L2 safe head and L1 origin.
    ///
    /// Each stage resets the stage below it before clearing its own state, so the reset walks
    /// from the [AttributesQueue] down to the [L1Traversal] and the stages are cleared bottom up.
    /// The [SystemConfig] the stages restart with is the one in effect at the safe head.
    ///
    /// [AttributesQueue]: crate::stages::AttributesQueue
    /// [L1Traversal]: crate::stages::L1Traversal
    /// [SystemConfig]: ferry_primitives::SystemConfig
    async fn reset(
        &mut self,
        l2_safe_head: L2BlockInfo,
        l1_origin: BlockInfo,
    ) -> PipelineResult<()> {
        let system_config = match self
            .l2_chain_provider
            .system_config_by_number(
                l2_safe_head.block_info.number,
                Arc::clone(&self.rollup_config),
            )
            .await
        {
            Ok(config) => config,
            Err(e) => return Err(e.into()),
        };
        match self.attributes.reset(l1_origin, &system_config).await {
            Ok(()) => trace!(target: "pipeline", "Stages reset"),
            Err(err) => {
                if let PipelineErrorKind::Temporary(PipelineError::Eof) = err {
                    trace!(target: "pipeline", "Stages reset with EOF");
                } else {
                    error!(target: "pipeline", "Stage reset errored: {:?}", err);
                    return Err(err);
                }
            }
        }
        self.prepared.clear();
        Ok(())
    }

    /// Attempts to progress the pipeline.
    ///
    /// ## Returns
    ///
    /// A [PipelineError::Eof] from the stages means the pipeline is blocked waiting on the
    /// current L1 origin, so the origin is advanced. Any other error is handed back to the caller,
    /// which is expected to reset the pipeline on a [PipelineErrorKind::Reset] and halt on a
    /// [PipelineErrorKind::Critical].
    async fn step(&mut self, cursor: L2BlockInfo) -> StepResult {
        match self.attributes.next_attributes(cursor).await {
            Ok(a) => {
                trace!(target: "pipeline", "Prepared L2 attributes: {:?}", a);
                self.prepared.push_back(a);
                StepResult::PreparedAttributes
            }
            Err(err) => match err {
                PipelineErrorKind::Temporary(PipelineError::Eof) => {
                    trace!(target: "pipeline", "Pipeline advancing origin");
                    if let Err(e) = self.attributes.advance_origin().await {
                        return StepResult::OriginAdvanceErr(e);
                    }
                    StepResult::AdvancedOrigin
                }
                PipelineErrorKind::Temporary(_) => {
                    trace!(
                        target: "pipeline",
                        "Attributes queue step failed due to temporary error: {:?}",
                        err
                    );
                    StepResult::StepFailed(err)
                }
                _ => {
                    warn!(target: "pipeline", "Attributes queue step failed: {:?}", err);
                    StepResult::StepFailed(err)
                }
            },
        }
    }
}
