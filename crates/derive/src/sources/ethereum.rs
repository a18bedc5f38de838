//! Contains the [EthereumDataSource], which is a concrete implementation of the
//! [DataAvailabilityProvider] trait for the Ethereum protocol.

use crate::{
    errors::PipelineResult,
    sources::{BlobSource, CalldataSource},
    traits::{AsyncIterator, BlobProvider, ChainProvider, DataAvailabilityProvider},
};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use core::fmt::Debug;
use ferry_primitives::{BlockInfo, RollupConfig};
use std::sync::Arc;

/// The data iterator opened by an [EthereumDataSource]: blob data once blobs are enabled at the
/// L1 block, calldata before.
#[derive(Debug, Clone)]
pub enum EthereumDataSourceVariant<CP, B>
where
    CP: ChainProvider + Send,
    B: BlobProvider + Send,
{
    /// Reads batcher transaction calldata.
    Calldata(CalldataSource<CP>),
    /// Reads blobs, and calldata of non-blob batcher transactions.
    Blob(BlobSource<CP, B>),
}

#[async_trait]
impl<CP, B> AsyncIterator for EthereumDataSourceVariant<CP, B>
where
    CP: ChainProvider + Send,
    B: BlobProvider + Send,
{
    type Item = Bytes;

    async fn next(&mut self) -> PipelineResult<Self::Item> {
        match self {
            Self::Calldata(source) => source.next().await,
            Self::Blob(source) => source.next().await,
        }
    }
}

/// A factory for creating an Ethereum data source provider.
#[derive(Debug, Clone)]
pub struct EthereumDataSource<C, B>
where
    C: ChainProvider + Send + Clone,
    B: BlobProvider + Send + Clone,
{
    /// The chain provider to use for the factory.
    pub chain_provider: C,
    /// The blob provider
    pub blob_provider: B,
    /// The rollup config, used to select the source by L1 timestamp.
    pub rollup_config: Arc<RollupConfig>,
}

impl<C, B> EthereumDataSource<C, B>
where
    C: ChainProvider + Send + Clone + Debug,
    B: BlobProvider + Send + Clone + Debug,
{
    /// Creates a new factory.
    pub const fn new(provider: C, blobs: B, cfg: Arc<RollupConfig>) -> Self {
        Self { chain_provider: provider, blob_provider: blobs, rollup_config: cfg }
    }
}

#[async_trait]
impl<C, B> DataAvailabilityProvider for EthereumDataSource<C, B>
where
    C: ChainProvider + Send + Sync + Clone + Debug,
    B: BlobProvider + Send + Sync + Clone + Debug,
{
    type Item = Bytes;
    type DataIter = EthereumDataSourceVariant<C, B>;

    async fn open_data(
        &self,
        block_ref: &BlockInfo,
        batcher_address: Address,
    ) -> PipelineResult<Self::DataIter> {
        let inbox = self.rollup_config.batch_inbox_address;
        if self.rollup_config.is_blobs_enabled(block_ref.timestamp) {
            Ok(EthereumDataSourceVariant::Blob(BlobSource::new(
                self.chain_provider.clone(),
                self.blob_provider.clone(),
                inbox,
                *block_ref,
                batcher_address,
            )))
        } else {
            Ok(EthereumDataSourceVariant::Calldata(CalldataSource::new(
                self.chain_provider.clone(),
                inbox,
                *block_ref,
                batcher_address,
            )))
        }
    }
}
