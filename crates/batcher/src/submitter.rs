//! Contains the [BatchSubmitter], the async loop driving a [ChannelManager].

use crate::{
    config::BatcherConfig,
    errors::{ChannelManagerError, ConfigError},
    manager::ChannelManager,
    traits::{L2BlockSource, Publisher, TxOutcome, TxReceipt},
};
use ferry_primitives::RollupConfig;
use std::{sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// The [BatchSubmitter] loads L2 blocks from an [L2BlockSource] into a [ChannelManager] and
/// publishes the resulting frames through a [Publisher].
///
/// Receipts for published transactions arrive on an mpsc channel and are applied by the loop
/// itself, so the channel state has a single owner.
#[derive(Debug)]
pub struct BatchSubmitter<S, P> {
    /// The batcher configuration.
    config: BatcherConfig,
    /// The channel manager.
    manager: ChannelManager,
    /// The L2 block source.
    source: S,
    /// The transaction publisher.
    publisher: P,
    /// Receipts of published transactions.
    receipts: mpsc::Receiver<TxReceipt>,
}

impl<S, P> BatchSubmitter<S, P>
where
    S: L2BlockSource + Send,
    P: Publisher + Send,
{
    /// Creates a new [BatchSubmitter].
    ///
    /// Fails if the channel configuration is rejected by [ChannelConfig::validate].
    ///
    /// [ChannelConfig::validate]: crate::config::ChannelConfig::validate
    pub fn new(
        config: BatcherConfig,
        rollup_config: Arc<RollupConfig>,
        source: S,
        publisher: P,
        receipts: mpsc::Receiver<TxReceipt>,
    ) -> Result<Self, ConfigError> {
        let manager = ChannelManager::new(config.channel, rollup_config)?;
        Ok(Self { config, manager, source, publisher, receipts })
    }

    /// Returns the channel manager.
    pub const fn manager(&self) -> &ChannelManager {
        &self.manager
    }

    /// Returns the channel manager mutably.
    pub fn manager_mut(&mut self) -> &mut ChannelManager {
        &mut self.manager
    }

    /// Returns the L2 block source.
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Runs the submission loop until `shutdown` fires or its sender is dropped.
    ///
    /// A publish in flight at shutdown is abandoned. Every frame not yet confirmed is then
    /// requeued, so it is sent again by the next run.
    pub async fn run(&mut self, mut shutdown: oneshot::Receiver<()>) {
        info!(target: "batch-submitter", "Starting batch submitter");
        loop {
            let loaded = self.load_blocks().await;
            if loaded > 0 {
                debug!(target: "batch-submitter", "Loaded {} L2 blocks", loaded);
            }

            let published = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                published = self.publish_next() => published,
            };

            let wait = if published { Duration::ZERO } else { self.config.poll_interval };
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                Some(receipt) = self.receipts.recv() => self.handle_receipt(receipt),
                _ = tokio::time::sleep(wait) => {}
            }
        }

        while let Ok(receipt) = self.receipts.try_recv() {
            self.handle_receipt(receipt);
        }
        let requeued = self.manager.requeue_pending();
        info!(
            target: "batch-submitter",
            "Batch submitter stopped with {} frames requeued",
            requeued
        );
    }

    /// Pulls every available block from the source into the channel manager. On a reorg the
    /// manager state is dropped and the source is reset.
    pub async fn load_blocks(&mut self) -> usize {
        let mut loaded = 0;
        loop {
            let block = match self.source.next_block().await {
                Ok(Some(block)) => block,
                Ok(None) => break,
                Err(e) => {
                    warn!(target: "batch-submitter", "Failed to fetch L2 block: {}", e);
                    break;
                }
            };
            match self.manager.add_l2_block(block) {
                Ok(()) => loaded += 1,
                Err(e @ ChannelManagerError::Reorg { .. }) => {
                    warn!(target: "batch-submitter", "{}, clearing state", e);
                    self.manager.clear();
                    if let Err(e) = self.source.reset().await {
                        error!(target: "batch-submitter", "Failed to reset L2 block source: {}", e);
                    }
                    return 0;
                }
                Err(e) => {
                    error!(target: "batch-submitter", "Failed to add L2 block: {}", e);
                    break;
                }
            }
        }
        loaded
    }

    /// Publishes the next frame, if any. Returns `true` if a transaction was sent.
    pub async fn publish_next(&mut self) -> bool {
        let l1_head = match self.source.l1_head().await {
            Ok(head) => head,
            Err(e) => {
                warn!(target: "batch-submitter", "Failed to fetch L1 head: {}", e);
                return false;
            }
        };
        let tx = match self.manager.tx_data(l1_head) {
            Ok(Some(tx)) => tx,
            Ok(None) => return false,
            Err(e) => {
                error!(target: "batch-submitter", "Failed to get transaction data: {}", e);
                return false;
            }
        };

        let id = tx.id();
        match self.publisher.publish(tx).await {
            Ok(hash) => {
                debug!(target: "batch-submitter", "Published frame {} in transaction {}", id, hash);
                true
            }
            Err(e) => {
                warn!(target: "batch-submitter", "Failed to publish frame {}: {}", id, e);
                self.manager.tx_failed(id);
                false
            }
        }
    }

    /// Applies a transaction receipt to the channel manager.
    pub fn handle_receipt(&mut self, receipt: TxReceipt) {
        match receipt.outcome {
            TxOutcome::Confirmed(block) => self.manager.tx_confirmed(receipt.id, block),
            TxOutcome::Failed => self.manager.tx_failed(receipt.id),
        }
    }
}
