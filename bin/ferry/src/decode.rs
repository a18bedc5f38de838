//! The `decode` subcommand.

use crate::cli::{read_hex_lines, read_json_or_default};
use alloy_primitives::{hex, Bytes};
use anyhow::Result;
use clap::Args;
use ferry_primitives::{Batch, BatchReader, BlockInfo, Channel, ChannelID, Frame, RollupConfig};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Arguments of the `decode` subcommand.
#[derive(Debug, Clone, Args)]
pub(crate) struct DecodeCommand {
    /// A file of hex encoded batcher transaction payloads, one per line.
    #[clap(long, short = 'i')]
    pub input: PathBuf,
    /// A JSON rollup config.
    #[clap(long)]
    pub rollup_config: Option<PathBuf>,
}

impl DecodeCommand {
    /// Decodes the payloads and returns one JSON summary per batch.
    pub(crate) fn run(&self) -> Result<Vec<String>> {
        let payloads = read_hex_lines(&self.input)?;
        let cfg: RollupConfig = read_json_or_default(self.rollup_config.as_deref())?;
        decode_payloads(&payloads, &cfg)?
            .iter()
            .map(|batch| serde_json::to_string(batch).map_err(Into::into))
            .collect()
    }
}

/// A summary of a decoded batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct DecodedBatch {
    /// The hex encoded id of the channel holding the batch.
    pub channel_id: String,
    /// `single` or `span`.
    pub batch_type: &'static str,
    /// The timestamp of the first block.
    pub timestamp: u64,
    /// The epoch of the first block.
    pub epoch: u64,
    /// The number of blocks.
    pub blocks: usize,
    /// The number of transactions.
    pub transactions: usize,
}

impl DecodedBatch {
    fn new(channel_id: ChannelID, batch: &Batch) -> Self {
        let channel_id = hex::encode(channel_id);
        match batch {
            Batch::Single(b) => Self {
                channel_id,
                batch_type: "single",
                timestamp: b.timestamp,
                epoch: b.epoch_num,
                blocks: 1,
                transactions: b.transactions.len(),
            },
            Batch::Span(b) => Self {
                channel_id,
                batch_type: "span",
                timestamp: b.starting_timestamp(),
                epoch: b.starting_epoch_num(),
                blocks: b.batches.len(),
                transactions: b.batches.iter().map(|e| e.transactions.len()).sum(),
            },
        }
    }
}

/// Reassembles channels from batcher transaction payloads and decodes their batches, in the order
/// the channels complete. Frames that do not fit their channel are dropped.
pub(crate) fn decode_payloads(
    payloads: &[Vec<u8>],
    cfg: &RollupConfig,
) -> Result<Vec<DecodedBatch>> {
    let mut channels: Vec<Channel> = Vec::new();
    let mut batches = Vec::new();
    for payload in payloads {
        for frame in Frame::parse_frames(payload)? {
            let index = match channels.iter().position(|c| c.id() == frame.id) {
                Some(index) => index,
                None => {
                    channels.push(Channel::new(frame.id, BlockInfo::default()));
                    channels.len() - 1
                }
            };
            if let Err(e) = channels[index].add_frame(frame, BlockInfo::default()) {
                warn!(target: "ferry", "Dropping frame: {}", e);
                continue;
            }
            if let Some(data) = channels[index].frame_data() {
                let channel = channels.remove(index);
                decode_channel(channel.id(), data, cfg, &mut batches)?;
            }
        }
    }
    for channel in &channels {
        warn!(target: "ferry", "Channel {} is incomplete", hex::encode(channel.id()));
    }
    Ok(batches)
}

fn decode_channel(
    id: ChannelID,
    data: Bytes,
    cfg: &RollupConfig,
    out: &mut Vec<DecodedBatch>,
) -> Result<()> {
    debug!(target: "ferry", "Decoding channel {} of {} bytes", hex::encode(id), data.len());
    let max_rlp_bytes = cfg.max_rlp_bytes_per_channel(u64::MAX) as usize;
    let mut reader = BatchReader::new(data.to_vec(), max_rlp_bytes);
    while let Some(batch) = reader.next_batch(cfg)? {
        out.push(DecodedBatch::new(id, &batch));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::batch_blocks;
    use ferry_batcher::{config::ChannelConfig, test_utils::test_l2_block};
    use ferry_primitives::BlockID;
    use std::sync::Arc;

    fn payloads(config: ChannelConfig, cfg: &RollupConfig) -> Vec<Vec<u8>> {
        let blocks = (1..=6).map(|n| test_l2_block(n, n / 3)).collect();
        batch_blocks(blocks, config, Arc::new(*cfg), BlockID::default())
            .unwrap()
            .into_iter()
            .map(|p| p.to_vec())
            .collect()
    }

    #[test]
    fn test_single_batches_roundtrip() {
        let cfg = RollupConfig::default();
        let config =
            ChannelConfig { max_frame_size: 40, target_num_frames: 2, ..Default::default() };
        let mut payloads = payloads(config, &cfg);
        // Channels are reassembled regardless of frame order.
        payloads.reverse();

        let mut batches = decode_payloads(&payloads, &cfg).unwrap();
        batches.sort_by_key(|b| b.timestamp);
        let timestamps: Vec<u64> = batches.iter().map(|b| b.timestamp).collect();
        assert_eq!(timestamps, vec![102, 104, 106, 108, 110, 112]);
        assert!(batches.iter().all(|b| b.batch_type == "single" && b.blocks == 1));
    }

    #[test]
    fn test_span_batch_roundtrip() {
        let cfg = RollupConfig { block_time: 2, ..Default::default() };
        let config = ChannelConfig { span_batches: true, ..Default::default() };
        let batches = decode_payloads(&payloads(config, &cfg), &cfg).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].batch_type, "span");
        assert_eq!(batches[0].blocks, 6);
        assert_eq!(batches[0].timestamp, 102);
    }

    #[test]
    fn test_incomplete_channel_yields_nothing() {
        let cfg = RollupConfig::default();
        let config =
            ChannelConfig { max_frame_size: 20, target_num_frames: 100, ..Default::default() };
        let mut payloads = payloads(config, &cfg);
        assert!(payloads.len() > 1);
        payloads.pop();
        assert!(decode_payloads(&payloads, &cfg).unwrap().is_empty());
    }
}
