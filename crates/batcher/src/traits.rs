//! Traits at the edges of the batcher: where L2 blocks come from and where frames go.

use crate::{channel::TxData, errors::PublisherError, FrameId};
use alloy_primitives::B256;
use async_trait::async_trait;
use core::fmt::Display;
use ferry_primitives::{BlockID, L2Block};

/// Publishes batcher transactions to L1.
///
/// Inclusion is reported later, as a [TxReceipt] on the submitter's receipt channel.
#[async_trait]
pub trait Publisher {
    /// Sends the transaction carrying `tx`, returning its transaction hash.
    async fn publish(&mut self, tx: TxData) -> Result<B256, PublisherError>;
}

/// A source of unsafe L2 blocks and the current L1 head.
#[async_trait]
pub trait L2BlockSource {
    /// The error type for the [L2BlockSource].
    type Error: Display;

    /// Returns the next L2 block past the last returned one, or [None] if there is none yet.
    async fn next_block(&mut self) -> Result<Option<L2Block>, Self::Error>;

    /// Returns the current L1 head.
    async fn l1_head(&mut self) -> Result<BlockID, Self::Error>;

    /// Restarts the source from the safe head, after the batcher dropped its state.
    async fn reset(&mut self) -> Result<(), Self::Error>;
}

/// The outcome of a published batcher transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// The transaction was included in the given L1 block.
    Confirmed(BlockID),
    /// The transaction failed or was dropped.
    Failed,
}

/// A receipt for the transaction carrying the frame `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    /// The frame carried by the transaction.
    pub id: FrameId,
    /// The outcome.
    pub outcome: TxOutcome,
}
