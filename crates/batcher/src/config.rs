//! Configuration for the batcher.

use crate::errors::ConfigError;
use ferry_primitives::params::{DERIVATION_VERSION_0, FRAME_V0_OVERHEAD};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The budget strategy a compressor uses to decide when a channel is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressorKind {
    /// Estimates the compressed size from the input size and an approximate ratio.
    #[default]
    Ratio,
    /// Tracks the compressed size with a flushed shadow stream.
    Shadow,
}

/// The compression algorithm of a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionAlgo {
    /// Zlib at the best compression level.
    #[default]
    Zlib,
    /// Brotli at quality 9.
    Brotli9,
    /// Brotli at quality 10.
    Brotli10,
    /// Brotli at quality 11.
    Brotli11,
}

impl CompressionAlgo {
    /// Returns the brotli quality of the algorithm, or [None] for zlib.
    pub const fn brotli_quality(&self) -> Option<u32> {
        match self {
            Self::Zlib => None,
            Self::Brotli9 => Some(9),
            Self::Brotli10 => Some(10),
            Self::Brotli11 => Some(11),
        }
    }
}

/// The compressor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorConfig {
    /// The budget strategy.
    pub kind: CompressorKind,
    /// The compression algorithm.
    pub algo: CompressionAlgo,
    /// The expected ratio of compressed to uncompressed bytes. Only used by the ratio
    /// compressor.
    pub approx_compr_ratio: f64,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self { kind: CompressorKind::Ratio, algo: CompressionAlgo::Zlib, approx_compr_ratio: 0.6 }
    }
}

/// The configuration of batcher channels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Number of L1 blocks a channel may span between its first and last included frame.
    pub channel_timeout: u64,
    /// Number of L1 blocks after which an open channel is closed. Zero disables the limit.
    pub max_channel_duration: u64,
    /// Number of L1 blocks subtracted from the protocol timeouts, so that frames are included
    /// before the derivation pipeline gives up on them.
    pub sub_safety_margin: u64,
    /// The sequencing window size, in L1 blocks.
    pub seq_window_size: u64,
    /// The maximum number of data bytes in a frame.
    pub max_frame_size: usize,
    /// The maximum size of an L1 batcher transaction payload.
    pub max_l1_tx_size: usize,
    /// The number of frames a channel is expected to fill.
    pub target_num_frames: usize,
    /// Whether blocks are packed into a single span batch instead of one batch per block.
    pub span_batches: bool,
    /// The compressor configuration.
    pub compressor: CompressorConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            channel_timeout: 300,
            max_channel_duration: 0,
            sub_safety_margin: 10,
            seq_window_size: 3600,
            max_frame_size: 120_000,
            max_l1_tx_size: 128_000,
            target_num_frames: 1,
            span_batches: false,
            compressor: CompressorConfig::default(),
        }
    }
}

impl ChannelConfig {
    /// Returns the number of compressed bytes a channel aims to produce.
    pub const fn target_output_size(&self) -> u64 {
        (self.target_num_frames * self.max_frame_size) as u64
    }

    /// Returns the input size at which a ratio compressor reports itself full.
    ///
    /// The threshold is `floor(target_output_size / approx_compr_ratio)`.
    pub fn input_threshold(&self) -> u64 {
        (self.target_output_size() as f64 / self.compressor.approx_compr_ratio) as u64
    }

    /// Checks that the configuration can produce valid batcher transactions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frame_size == 0 {
            return Err(ConfigError::ZeroFrameSize);
        }
        let frame = self.max_frame_size + FRAME_V0_OVERHEAD + 1;
        if frame > self.max_l1_tx_size {
            return Err(ConfigError::FrameExceedsTxSize { frame, max: self.max_l1_tx_size });
        }
        if self.target_num_frames == 0 {
            return Err(ConfigError::ZeroTargetFrames);
        }
        let ratio = self.compressor.approx_compr_ratio;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(ConfigError::InvalidComprRatio);
        }
        if self.sub_safety_margin >= self.channel_timeout ||
            self.sub_safety_margin >= self.seq_window_size
        {
            return Err(ConfigError::SafetyMarginTooLarge(self.sub_safety_margin));
        }
        Ok(())
    }
}

/// The configuration of the [BatchSubmitter].
///
/// [BatchSubmitter]: crate::BatchSubmitter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherConfig {
    /// How long to sleep when there is nothing to publish, serialized as seconds.
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
    /// The channel configuration.
    pub channel: ChannelConfig,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(6), channel: ChannelConfig::default() }
    }
}

/// The version byte every batcher transaction starts with.
pub const BATCHER_TX_VERSION: u8 = DERIVATION_VERSION_0;

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(ChannelConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_validate_frame_size() {
        let cfg = ChannelConfig { max_frame_size: 0, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroFrameSize));

        let cfg = ChannelConfig { max_frame_size: 100, max_l1_tx_size: 123, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::FrameExceedsTxSize { frame: 124, max: 123 }));
        let cfg = ChannelConfig { max_frame_size: 100, max_l1_tx_size: 124, ..Default::default() };
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn test_validate_ratio_and_margins() {
        let mut cfg = ChannelConfig::default();
        cfg.compressor.approx_compr_ratio = 0.0;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidComprRatio));
        cfg.compressor.approx_compr_ratio = f64::NAN;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidComprRatio));

        let cfg = ChannelConfig { sub_safety_margin: 300, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::SafetyMarginTooLarge(300)));
        let cfg = ChannelConfig { target_num_frames: 0, ..Default::default() };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTargetFrames));
    }

    #[test]
    fn test_input_threshold() {
        let mut cfg =
            ChannelConfig { max_frame_size: 20, target_num_frames: 4, ..Default::default() };
        cfg.compressor.approx_compr_ratio = 0.6;
        assert_eq!(cfg.target_output_size(), 80);
        assert_eq!(cfg.input_threshold(), 133);
        cfg.compressor.approx_compr_ratio = 1.0;
        assert_eq!(cfg.input_threshold(), 80);
    }

    #[test]
    fn test_batcher_config_serde() {
        let raw = r#"{
            "poll_interval": 12,
            "channel": {
                "channel_timeout": 50,
                "max_frame_size": 1000,
                "max_l1_tx_size": 2000,
                "compressor": { "kind": "shadow", "algo": "brotli10" }
            }
        }"#;
        let cfg: BatcherConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_secs(12));
        assert_eq!(cfg.channel.channel_timeout, 50);
        assert_eq!(cfg.channel.seq_window_size, 3600);
        assert_eq!(cfg.channel.compressor.kind, CompressorKind::Shadow);
        assert_eq!(cfg.channel.compressor.algo.brotli_quality(), Some(10));
        assert_eq!(cfg.channel.compressor.approx_compr_ratio, 0.6);

        let json = serde_json::to_string(&cfg).unwrap();
        assert_eq!(serde_json::from_str::<BatcherConfig>(&json).unwrap(), cfg);
    }
}
