//! Test utilities for the batcher.

use crate::{
    channel::TxData,
    errors::PublisherError,
    traits::{L2BlockSource, Publisher, TxOutcome, TxReceipt},
};
use alloy_primitives::{keccak256, B256};
use async_trait::async_trait;
use core::convert::Infallible;
use ferry_primitives::{BlockID, BlockInfo, L2Block, L2BlockInfo};
use spin::Mutex;
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, Registry};

pub use ferry_primitives::test_utils::{CollectingLayer, TraceStorage};

/// Installs a [CollectingLayer] as the default subscriber of the current thread.
///
/// Traces are collected until the returned guard is dropped.
pub fn collect_traces() -> (TraceStorage, tracing::subscriber::DefaultGuard) {
    let storage = TraceStorage::default();
    let subscriber = Registry::default().with(CollectingLayer::new(storage.clone()));
    let guard = tracing::subscriber::set_default(subscriber);
    (storage, guard)
}

/// Builds an L2 block without transactions. Blocks built from consecutive numbers form a chain.
pub fn test_l2_block(number: u64, epoch: u64) -> L2Block {
    let info = BlockInfo {
        number,
        hash: B256::with_last_byte(number as u8),
        parent_hash: B256::with_last_byte(number.saturating_sub(1) as u8),
        timestamp: 100 + 2 * number,
    };
    let origin = BlockID { number: epoch, hash: B256::repeat_byte(0xE0 + epoch as u8) };
    L2Block { info: L2BlockInfo::new(info, origin, number), transactions: Vec::new() }
}

/// An in-memory [L2BlockSource].
#[derive(Debug, Default)]
pub struct TestL2Source {
    /// Blocks returned by [L2BlockSource::next_block], front first.
    pub blocks: VecDeque<L2Block>,
    /// The L1 head.
    pub l1_head: BlockID,
    /// The number of resets.
    pub resets: usize,
}

impl TestL2Source {
    /// Creates a new [TestL2Source].
    pub fn new(blocks: impl IntoIterator<Item = L2Block>, l1_head: BlockID) -> Self {
        Self { blocks: blocks.into_iter().collect(), l1_head, resets: 0 }
    }
}

#[async_trait]
impl L2BlockSource for TestL2Source {
    type Error = Infallible;

    async fn next_block(&mut self) -> Result<Option<L2Block>, Self::Error> {
        Ok(self.blocks.pop_front())
    }

    async fn l1_head(&mut self) -> Result<BlockID, Self::Error> {
        Ok(self.l1_head)
    }

    async fn reset(&mut self) -> Result<(), Self::Error> {
        self.resets += 1;
        self.blocks.clear();
        Ok(())
    }
}

/// A [Publisher] that records published transactions. Clones share the record.
#[derive(Debug, Default, Clone)]
pub struct TestPublisher {
    published: Arc<Mutex<Vec<TxData>>>,
    receipts: Option<(mpsc::Sender<TxReceipt>, BlockID)>,
    reject: bool,
}

impl TestPublisher {
    /// Confirms every published transaction in `inclusion_block` through `sender`.
    pub fn with_receipts(
        mut self,
        sender: mpsc::Sender<TxReceipt>,
        inclusion_block: BlockID,
    ) -> Self {
        self.receipts = Some((sender, inclusion_block));
        self
    }

    /// Rejects every transaction.
    pub fn rejecting(mut self) -> Self {
        self.reject = true;
        self
    }

    /// Returns the published transactions, in order.
    pub fn published(&self) -> Vec<TxData> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl Publisher for TestPublisher {
    async fn publish(&mut self, tx: TxData) -> Result<B256, PublisherError> {
        if self.reject {
            return Err(PublisherError::Rejected("rejected by test publisher".into()));
        }
        let id = tx.id();
        let hash = keccak256(tx.to_bytes());
        self.published.lock().push(tx);
        if let Some((sender, inclusion_block)) = &self.receipts {
            let receipt = TxReceipt { id, outcome: TxOutcome::Confirmed(*inclusion_block) };
            sender.send(receipt).await.map_err(|e| PublisherError::Unavailable(e.to_string()))?;
        }
        Ok(hash)
    }
}
