//! A mock [DataAvailabilityProvider] serving a fixed list of payloads.

use crate::{
    errors::{PipelineError, PipelineResult},
    traits::{AsyncIterator, DataAvailabilityProvider},
};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use ferry_primitives::BlockInfo;

/// Mock data iterator
#[derive(Debug, Default, PartialEq)]
pub struct TestIter {
    /// Holds open data calls with args for assertions.
    pub open_data_calls: Vec<(BlockInfo, Address)>,
    /// A queue of results to return as the next iterated data. Served last to first.
    pub results: Vec<PipelineResult<Bytes>>,
}

#[async_trait]
impl AsyncIterator for TestIter {
    type Item = Bytes;

    async fn next(&mut self) -> PipelineResult<Self::Item> {
        self.results.pop().unwrap_or(Err(PipelineError::Eof.temp()))
    }
}

/// Mock data availability provider
#[derive(Debug, Default)]
pub struct TestDAP {
    /// The results each opened iterator serves.
    pub results: Vec<PipelineResult<Bytes>>,
}

#[async_trait]
impl DataAvailabilityProvider for TestDAP {
    type Item = Bytes;
    type DataIter = TestIter;

    async fn open_data(
        &self,
        block_ref: &BlockInfo,
        batcher_address: Address,
    ) -> PipelineResult<Self::DataIter> {
        Ok(TestIter {
            open_data_calls: vec![(*block_ref, batcher_address)],
            results: self.results.clone(),
        })
    }
}
