//! Contains the ratio compressor.

use super::{ChannelCompressor, CompressorWriter, VariantCompressor};
use crate::{
    config::ChannelConfig,
    errors::{CompressorError, CompressorResult},
};
use tracing::debug;

/// Ratio Compressor
///
/// Estimates the compressed size of a channel from the number of input bytes and a configured
/// compression ratio. The compressor is full once the input reaches
/// `target_output_size / approx_compr_ratio` bytes; the write that crosses the threshold is still
/// accepted.
#[derive(Debug)]
pub struct RatioCompressor {
    /// The inner compression stream.
    compressor: VariantCompressor,
    /// The input size at which the compressor is full.
    input_threshold: u64,
    /// The number of input bytes written.
    input_length: u64,
}

impl RatioCompressor {
    /// Creates a new [RatioCompressor] with the given input threshold.
    pub const fn new(compressor: VariantCompressor, input_threshold: u64) -> Self {
        Self { compressor, input_threshold, input_length: 0 }
    }

    /// Returns the input size at which the compressor is full.
    pub const fn input_threshold(&self) -> u64 {
        self.input_threshold
    }

    /// Returns the number of input bytes written.
    pub const fn input_length(&self) -> u64 {
        self.input_length
    }
}

impl From<&ChannelConfig> for RatioCompressor {
    fn from(config: &ChannelConfig) -> Self {
        Self::new(VariantCompressor::from(config.compressor.algo), config.input_threshold())
    }
}

impl CompressorWriter for RatioCompressor {
    fn write(&mut self, data: &[u8]) -> CompressorResult<usize> {
        if self.is_full() {
            return Err(CompressorError::Full);
        }
        let written = self.compressor.write(data)?;
        self.input_length += data.len() as u64;
        if self.is_full() {
            debug!(
                target: "compressor",
                "Ratio compressor full at {} input bytes",
                self.input_length
            );
        }
        Ok(written)
    }

    fn flush(&mut self) -> CompressorResult<()> {
        self.compressor.flush()
    }

    fn close(&mut self) -> CompressorResult<()> {
        self.compressor.close()
    }

    fn reset(&mut self) {
        self.compressor.reset();
        self.input_length = 0;
    }

    fn len(&self) -> usize {
        self.compressor.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> CompressorResult<usize> {
        self.compressor.read(buf)
    }
}

impl ChannelCompressor for RatioCompressor {
    fn is_full(&self) -> bool {
        self.input_length >= self.input_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionAlgo;
    use proptest::prelude::*;

    fn zlib(threshold: u64) -> RatioCompressor {
        RatioCompressor::new(VariantCompressor::from(CompressionAlgo::Zlib), threshold)
    }

    #[test]
    fn test_ratio_full_after_crossing_threshold() {
        let mut c = zlib(10);
        assert_eq!(c.write(&[0u8; 6]), Ok(6));
        assert!(!c.is_full());
        // The write crossing the threshold is accepted.
        assert_eq!(c.write(&[0u8; 6]), Ok(6));
        assert!(c.is_full());
        assert_eq!(c.write(&[0u8; 1]), Err(CompressorError::Full));
        assert_eq!(c.input_length(), 12);

        c.reset();
        assert!(!c.is_full());
        assert_eq!(c.input_length(), 0);
    }

    #[test]
    fn test_ratio_from_config() {
        let mut cfg =
            ChannelConfig { max_frame_size: 100, target_num_frames: 2, ..Default::default() };
        cfg.compressor.approx_compr_ratio = 0.5;
        assert_eq!(RatioCompressor::from(&cfg).input_threshold(), 400);
    }

    proptest! {
        #[test]
        fn test_threshold_monotonic_in_ratio(
            frames in 1usize..64,
            frame_size in 1usize..200_000,
            a in 0.01f64..10.0,
            b in 0.01f64..10.0,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let mut cfg = ChannelConfig {
                max_frame_size: frame_size,
                target_num_frames: frames,
                ..Default::default()
            };
            cfg.compressor.approx_compr_ratio = lo;
            let loose = cfg.input_threshold();
            cfg.compressor.approx_compr_ratio = hi;
            let tight = cfg.input_threshold();
            prop_assert!(tight <= loose);
        }

        #[test]
        fn test_fullness_is_monotonic(
            threshold in 1u64..2_000,
            writes in proptest::collection::vec(1usize..256, 1..32),
        ) {
            let mut c = zlib(threshold);
            let mut was_full = false;
            for len in writes {
                let res = c.write(&vec![0xAB; len]);
                if was_full {
                    prop_assert_eq!(res, Err(CompressorError::Full));
                }
                prop_assert!(!was_full || c.is_full());
                was_full = c.is_full();
                prop_assert!(c.input_length() < threshold + 256);
            }
        }
    }
}
