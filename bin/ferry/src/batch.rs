//! The `batch` subcommand.

use crate::cli::{read_json, read_json_or_default};
use alloy_primitives::{hex, Bytes, B256};
use anyhow::Result;
use clap::Args;
use ferry_batcher::{
    config::{BatcherConfig, ChannelConfig},
    ChannelManager,
};
use ferry_primitives::{BlockID, L2Block, RollupConfig};
use std::{path::PathBuf, sync::Arc};
use tracing::info;

/// Arguments of the `batch` subcommand.
#[derive(Debug, Clone, Args)]
pub(crate) struct BatchCommand {
    /// A JSON array of L2 blocks, in chain order.
    #[clap(long, short = 'b')]
    pub blocks: PathBuf,
    /// A JSON rollup config.
    #[clap(long)]
    pub rollup_config: Option<PathBuf>,
    /// A JSON batcher config.
    #[clap(long)]
    pub batcher_config: Option<PathBuf>,
    /// The L1 block number channels are opened and confirmed at.
    #[clap(long, default_value_t = 0)]
    pub l1_head: u64,
}

impl BatchCommand {
    /// Packs the blocks and returns one hex encoded payload per transaction.
    pub(crate) fn run(&self) -> Result<Vec<String>> {
        let blocks: Vec<L2Block> = read_json(&self.blocks)?;
        let rollup_config: RollupConfig = read_json_or_default(self.rollup_config.as_deref())?;
        let config: BatcherConfig = read_json_or_default(self.batcher_config.as_deref())?;

        let l1_head = BlockID { number: self.l1_head, hash: B256::ZERO };
        let payloads = batch_blocks(blocks, config.channel, Arc::new(rollup_config), l1_head)?;
        Ok(payloads.iter().map(hex::encode_prefixed).collect())
    }
}

/// Packs blocks into batcher transaction payloads. Every frame is confirmed at `l1_head` as soon
/// as it is handed out, and the last channel is closed once all blocks are packed.
pub(crate) fn batch_blocks(
    blocks: Vec<L2Block>,
    config: ChannelConfig,
    rollup_config: Arc<RollupConfig>,
    l1_head: BlockID,
) -> Result<Vec<Bytes>> {
    let block_count = blocks.len();
    let mut manager = ChannelManager::new(config, rollup_config)?;
    for block in blocks {
        manager.add_l2_block(block)?;
    }

    let mut payloads = Vec::new();
    loop {
        match manager.tx_data(l1_head)? {
            Some(tx) => {
                manager.tx_confirmed(tx.id(), l1_head);
                payloads.push(tx.to_bytes());
            }
            None if !manager.is_closed() => manager.close()?,
            None => break,
        }
    }
    info!(target: "ferry", "Packed {} blocks into {} transactions", block_count, payloads.len());
    Ok(payloads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_batcher::test_utils::test_l2_block;

    #[test]
    fn test_batch_blocks_confirms_everything() {
        let config =
            ChannelConfig { max_frame_size: 40, target_num_frames: 2, ..Default::default() };
        let blocks = (1..=5).map(|n| test_l2_block(n, 0)).collect();
        let payloads =
            batch_blocks(blocks, config, Arc::new(RollupConfig::default()), BlockID::default())
                .unwrap();
        assert!(payloads.len() >= 3);
        assert!(payloads.iter().all(|p| p.len() <= 40 + 23 + 1));
    }

    #[test]
    fn test_batch_blocks_rejects_gap() {
        let blocks = vec![test_l2_block(1, 0), test_l2_block(3, 0)];
        let res = batch_blocks(
            blocks,
            ChannelConfig::default(),
            Arc::new(RollupConfig::default()),
            BlockID::default(),
        );
        assert!(res.is_err());
    }
}
