//! In-memory L1 and L2 chain providers.

use crate::{
    errors::{PipelineError, PipelineErrorKind},
    traits::{ChainProvider, L2ChainProvider},
};
use alloy_primitives::B256;
use async_trait::async_trait;
use ferry_primitives::{
    BatchValidationProvider, BlockInfo, Header, L1Transaction, L2Block, L2BlockInfo, Receipt,
    RollupConfig, SystemConfig,
};
use hashbrown::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// An error returned by the in-memory test providers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TestProviderError {
    /// No block is stored at the requested number or hash.
    #[error("Block not found")]
    BlockNotFound,
    /// No header is stored for the requested hash.
    #[error("Header not found")]
    HeaderNotFound,
    /// No receipts are stored for the requested hash.
    #[error("Receipts not found")]
    ReceiptsNotFound,
    /// No L2 block is stored at the requested number.
    #[error("L2 Block not found")]
    L2BlockNotFound,
    /// No system config is stored for the requested L2 block number.
    #[error("System config not found for L2 block {0}")]
    SystemConfigNotFound(u64),
}

impl From<TestProviderError> for PipelineErrorKind {
    fn from(val: TestProviderError) -> Self {
        PipelineError::Provider(val.to_string()).temp()
    }
}

/// A mock chain provider for testing.
#[derive(Debug, Clone, Default)]
pub struct TestChainProvider {
    /// Maps block numbers to block information using a tuple list.
    pub blocks: Vec<(u64, BlockInfo)>,
    /// Maps block hashes to header information using a tuple list.
    pub headers: Vec<(B256, Header)>,
    /// Maps block hashes to receipts using a tuple list.
    pub receipts: Vec<(B256, Vec<Receipt>)>,
    /// Maps block hashes to transactions using a tuple list.
    pub transactions: Vec<(B256, Vec<L1Transaction>)>,
}

impl TestChainProvider {
    /// Insert a block into the mock chain provider.
    pub fn insert_block(&mut self, number: u64, block: BlockInfo) {
        self.blocks.push((number, block));
    }

    /// Insert a block with transactions into the mock chain provider.
    pub fn insert_block_with_transactions(
        &mut self,
        number: u64,
        block: BlockInfo,
        txs: Vec<L1Transaction>,
    ) {
        self.blocks.push((number, block));
        self.transactions.push((block.hash, txs));
    }

    /// Insert a header into the mock chain provider.
    pub fn insert_header(&mut self, key: B256, header: Header) {
        self.headers.push((key, header));
    }

    /// Insert receipts into the mock chain provider.
    pub fn insert_receipts(&mut self, hash: B256, receipts: Vec<Receipt>) {
        self.receipts.push((hash, receipts));
    }

    /// Clears headers from the mock chain provider.
    pub fn clear_headers(&mut self) {
        self.headers.clear();
    }

    /// Clears blocks from the mock chain provider.
    pub fn clear_blocks(&mut self) {
        self.blocks.clear();
    }

    /// Clears receipts from the mock chain provider.
    pub fn clear_receipts(&mut self) {
        self.receipts.clear();
    }

    /// Clears all blocks, headers, receipts and transactions from the mock chain provider.
    pub fn clear(&mut self) {
        self.clear_headers();
        self.clear_blocks();
        self.clear_receipts();
        self.transactions.clear();
    }
}

#[async_trait]
impl ChainProvider for TestChainProvider {
    type Error = TestProviderError;

    async fn header_by_hash(&mut self, hash: B256) -> Result<Header, Self::Error> {
        self.headers
            .iter()
            .find(|(k, _)| *k == hash)
            .map(|(_, header)| header.clone())
            .ok_or(TestProviderError::HeaderNotFound)
    }

    async fn block_info_by_number(&mut self, number: u64) -> Result<BlockInfo, Self::Error> {
        self.blocks
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, b)| *b)
            .ok_or(TestProviderError::BlockNotFound)
    }

    async fn receipts_by_hash(&mut self, hash: B256) -> Result<Vec<Receipt>, Self::Error> {
        self.receipts
            .iter()
            .find(|(k, _)| *k == hash)
            .map(|(_, receipts)| receipts.clone())
            .ok_or(TestProviderError::ReceiptsNotFound)
    }

    async fn block_info_and_transactions_by_hash(
        &mut self,
        hash: B256,
    ) -> Result<(BlockInfo, Vec<L1Transaction>), Self::Error> {
        let block = self
            .blocks
            .iter()
            .find(|(_, b)| b.hash == hash)
            .map(|(_, b)| *b)
            .ok_or(TestProviderError::BlockNotFound)?;
        let txs = self
            .transactions
            .iter()
            .find(|(k, _)| *k == hash)
            .map(|(_, txs)| txs.clone())
            .unwrap_or_default();
        Ok((block, txs))
    }
}

/// An [L2ChainProvider] implementation for testing.
#[derive(Debug, Default, Clone)]
pub struct TestL2ChainProvider {
    /// Blocks
    pub blocks: Vec<L2BlockInfo>,
    /// Full L2 blocks, served to span batch validation.
    pub l2_blocks: Vec<L2Block>,
    /// System configs
    pub system_configs: HashMap<u64, SystemConfig>,
}

impl TestL2ChainProvider {
    /// Creates a new [TestL2ChainProvider] with the given data.
    pub const fn new(
        blocks: Vec<L2BlockInfo>,
        l2_blocks: Vec<L2Block>,
        system_configs: HashMap<u64, SystemConfig>,
    ) -> Self {
        Self { blocks, l2_blocks, system_configs }
    }
}

#[async_trait]
impl BatchValidationProvider for TestL2ChainProvider {
    type Error = TestProviderError;

    async fn l2_block_info_by_number(&mut self, number: u64) -> Result<L2BlockInfo, Self::Error> {
        self.blocks
            .iter()
            .find(|b| b.block_info.number == number)
            .copied()
            .ok_or(TestProviderError::BlockNotFound)
    }

    async fn block_by_number(&mut self, number: u64) -> Result<L2Block, Self::Error> {
        self.l2_blocks
            .iter()
            .find(|b| b.number() == number)
            .cloned()
            .ok_or(TestProviderError::L2BlockNotFound)
    }
}

#[async_trait]
impl L2ChainProvider for TestL2ChainProvider {
    type Error = TestProviderError;

    async fn system_config_by_number(
        &mut self,
        number: u64,
        _: Arc<RollupConfig>,
    ) -> Result<SystemConfig, <Self as L2ChainProvider>::Error> {
        self.system_configs
            .get(&number)
            .copied()
            .ok_or(TestProviderError::SystemConfigNotFound(number))
    }
}
