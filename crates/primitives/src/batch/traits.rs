//! Traits for validating batches against the L2 chain.

use crate::{L2Block, L2BlockInfo};
use async_trait::async_trait;
use core::fmt::Display;

/// Read access to the already derived L2 chain, used to validate span batches that overlap the
/// safe head.
#[async_trait]
pub trait BatchValidationProvider {
    /// The error type returned by the provider.
    type Error: Display;

    /// Returns the [L2BlockInfo] of the L2 block with the given number.
    async fn l2_block_info_by_number(&mut self, number: u64) -> Result<L2BlockInfo, Self::Error>;

    /// Returns the full [L2Block] with the given number.
    async fn block_by_number(&mut self, number: u64) -> Result<L2Block, Self::Error>;
}
