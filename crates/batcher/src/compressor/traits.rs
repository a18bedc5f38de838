//! Contains the core compressor traits.

use crate::errors::CompressorResult;

/// Compressor Writer
///
/// An incremental compression stream. Input is fed with [CompressorWriter::write] and the
/// compressed output is drained with [CompressorWriter::read].
#[allow(clippy::len_without_is_empty)]
pub trait CompressorWriter {
    /// Writes the given data to the compressor.
    fn write(&mut self, data: &[u8]) -> CompressorResult<usize>;

    /// Flushes the pending input into the output buffer.
    fn flush(&mut self) -> CompressorResult<()>;

    /// Finishes the stream. No data may be written afterwards.
    fn close(&mut self) -> CompressorResult<()>;

    /// Resets the compressor to an empty stream.
    fn reset(&mut self);

    /// Returns the number of compressed bytes ready to be read.
    fn len(&self) -> usize;

    /// Reads compressed data into the given buffer, returning the number of bytes read.
    fn read(&mut self, buf: &mut [u8]) -> CompressorResult<usize>;
}

/// Channel Compressor
///
/// A [CompressorWriter] with an output budget, used to decide when a channel is full.
pub trait ChannelCompressor: CompressorWriter {
    /// Returns `true` once the budget is reached. Further writes fail with
    /// [CompressorError::Full].
    ///
    /// [CompressorError::Full]: crate::errors::CompressorError::Full
    fn is_full(&self) -> bool;
}
