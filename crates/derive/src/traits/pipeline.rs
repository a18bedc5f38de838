//! Defines the interface for the core derivation pipeline.

use super::OriginProvider;
use crate::errors::{PipelineErrorKind, PipelineResult};
use async_trait::async_trait;
use ferry_primitives::{BlockInfo, L2AttributesWithParent, L2BlockInfo, RollupConfig};

/// A pipeline step result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// Attributes were successfully prepared.
    PreparedAttributes,
    /// Origin was advanced.
    AdvancedOrigin,
    /// Origin advance failed.
    OriginAdvanceErr(PipelineErrorKind),
    /// Step failed.
    StepFailed(PipelineErrorKind),
}

impl StepResult {
    /// Returns the error carried by a failed step, if any.
    pub const fn err(&self) -> Option<&PipelineErrorKind> {
        match self {
            Self::OriginAdvanceErr(e) | Self::StepFailed(e) => Some(e),
            _ => None,
        }
    }
}

/// This trait defines the interface for interacting with the derivation pipeline.
#[async_trait]
pub trait Pipeline: OriginProvider + Iterator<Item = L2AttributesWithParent> {
    /// Peeks at the next [L2AttributesWithParent] from the pipeline.
    fn peek(&self) -> Option<&L2AttributesWithParent>;

    /// Returns the rollup config.
    fn rollup_config(&self) -> &RollupConfig;

    /// Resets every stage of the pipeline, from [L1Traversal] upwards, onto the given L2 safe head
    /// and L1 origin.
    ///
    /// [L1Traversal]: crate::stages::L1Traversal
    async fn reset(&mut self, l2_safe_head: L2BlockInfo, l1_origin: BlockInfo)
        -> PipelineResult<()>;

    /// Attempts to progress the pipeline.
    async fn step(&mut self, cursor: L2BlockInfo) -> StepResult;
}
