//! An in-memory [BatchValidationProvider].

use crate::{BatchValidationProvider, L2Block, L2BlockInfo};
use async_trait::async_trait;

/// A [BatchValidationProvider] serving blocks from memory.
#[derive(Debug, Clone, Default)]
pub struct TestBatchValidator {
    /// Block references, looked up by number.
    pub blocks: Vec<L2BlockInfo>,
    /// Full blocks, looked up by number.
    pub full_blocks: Vec<L2Block>,
}

#[async_trait]
impl BatchValidationProvider for TestBatchValidator {
    type Error = String;

    async fn l2_block_info_by_number(&mut self, number: u64) -> Result<L2BlockInfo, Self::Error> {
        self.blocks
            .iter()
            .find(|b| b.block_info.number == number)
            .copied()
            .ok_or_else(|| format!("L2 block {number} not found"))
    }

    async fn block_by_number(&mut self, number: u64) -> Result<L2Block, Self::Error> {
        self.full_blocks
            .iter()
            .find(|b| b.number() == number)
            .cloned()
            .ok_or_else(|| format!("L2 block {number} not found"))
    }
}
