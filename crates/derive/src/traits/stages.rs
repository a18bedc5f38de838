//! This module contains common traits for stages within the derivation pipeline.

use crate::errors::PipelineResult;
use async_trait::async_trait;
use ferry_primitives::{BlockInfo, SystemConfig};

/// Provides a method for accessing the pipeline's current L1 origin.
pub trait OriginProvider {
    /// Returns the optional L1 [BlockInfo] origin.
    fn origin(&self) -> Option<BlockInfo>;
}

/// Defines a trait for advancing the L1 origin of the pipeline.
#[async_trait]
pub trait OriginAdvancer {
    /// Advances the internal state of the lowest stage to the next l1 origin.
    /// This method is the equivalent of the reference implementation `advance_l1_block`.
    async fn advance_origin(&mut self) -> PipelineResult<()>;
}

/// Describes the functionality of a resettable stage within the derivation pipeline.
///
/// Stages reset the stage they pull from before clearing their own state, so a reset issued to
/// the top of the pipeline reaches [L1Traversal] first.
///
/// [L1Traversal]: crate::stages::L1Traversal
#[async_trait]
pub trait ResettableStage {
    /// Resets the derivation stage to its initial state, with `base` as the new L1 origin and
    /// `system_config` as the configuration in effect at that origin.
    async fn reset(&mut self, base: BlockInfo, system_config: &SystemConfig) -> PipelineResult<()>;
}
