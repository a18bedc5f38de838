//! Streaming compressors with an output budget, used to fill batcher channels.

mod traits;
pub use traits::{ChannelCompressor, CompressorWriter};

mod zlib;
pub use zlib::ZlibCompressor;

mod brotli;
pub use self::brotli::BrotliCompressor;

mod variant;
pub use variant::VariantCompressor;

mod ratio;
pub use ratio::RatioCompressor;

mod shadow;
pub use shadow::ShadowCompressor;

use crate::{
    config::{ChannelConfig, CompressorKind},
    errors::CompressorResult,
};

/// The compressor a channel is built with, selected by [CompressorKind].
#[derive(Debug)]
pub enum BatchCompressor {
    /// A [RatioCompressor].
    Ratio(RatioCompressor),
    /// A [ShadowCompressor].
    Shadow(ShadowCompressor),
}

impl From<&ChannelConfig> for BatchCompressor {
    fn from(config: &ChannelConfig) -> Self {
        match config.compressor.kind {
            CompressorKind::Ratio => Self::Ratio(RatioCompressor::from(config)),
            CompressorKind::Shadow => Self::Shadow(ShadowCompressor::from(config)),
        }
    }
}

impl CompressorWriter for BatchCompressor {
    fn write(&mut self, data: &[u8]) -> CompressorResult<usize> {
        match self {
            Self::Ratio(c) => c.write(data),
            Self::Shadow(c) => c.write(data),
        }
    }

    fn flush(&mut self) -> CompressorResult<()> {
        match self {
            Self::Ratio(c) => c.flush(),
            Self::Shadow(c) => c.flush(),
        }
    }

    fn close(&mut self) -> CompressorResult<()> {
        match self {
            Self::Ratio(c) => c.close(),
            Self::Shadow(c) => c.close(),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Ratio(c) => c.reset(),
            Self::Shadow(c) => c.reset(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Ratio(c) => c.len(),
            Self::Shadow(c) => c.len(),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> CompressorResult<usize> {
        match self {
            Self::Ratio(c) => c.read(buf),
            Self::Shadow(c) => c.read(buf),
        }
    }
}

impl ChannelCompressor for BatchCompressor {
    fn is_full(&self) -> bool {
        match self {
            Self::Ratio(c) => c.is_full(),
            Self::Shadow(c) => c.is_full(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionAlgo;
    use ferry_primitives::batch::decompress_channel;

    #[test]
    fn test_batch_compressor_from_config() {
        let mut cfg = ChannelConfig::default();
        assert!(matches!(BatchCompressor::from(&cfg), BatchCompressor::Ratio(_)));
        cfg.compressor.kind = CompressorKind::Shadow;
        assert!(matches!(BatchCompressor::from(&cfg), BatchCompressor::Shadow(_)));
    }

    #[test]
    fn test_every_algo_decodes_as_channel_data() {
        for algo in [
            CompressionAlgo::Zlib,
            CompressionAlgo::Brotli9,
            CompressionAlgo::Brotli10,
            CompressionAlgo::Brotli11,
        ] {
            let mut cfg = ChannelConfig::default();
            cfg.compressor.algo = algo;
            let mut c = BatchCompressor::from(&cfg);
            c.write(b"channel data").unwrap();
            c.close().unwrap();

            let mut out = vec![0u8; c.len()];
            c.read(&mut out).unwrap();
            assert_eq!(decompress_channel(&out, 1_000, true).unwrap(), b"channel data");
        }
    }
}
