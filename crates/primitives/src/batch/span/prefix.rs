//! Raw Span Batch Prefix

use super::{read_fixed, read_varint, write_varint, SpanBatchError, SpanDecodingError};
use alloy_primitives::FixedBytes;

/// Span Batch Prefix
///
/// ```text
/// prefix = rel_timestamp ++ l1_origin_num ++ parent_check ++ l1_origin_check
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanBatchPrefix {
    /// Relative timestamp of the first block
    pub rel_timestamp: u64,
    /// L1 origin number
    pub l1_origin_num: u64,
    /// First 20 bytes of the first block's parent hash
    pub parent_check: FixedBytes<20>,
    /// First 20 bytes of the last block's L1 origin hash
    pub l1_origin_check: FixedBytes<20>,
}

impl SpanBatchPrefix {
    /// Decodes a [SpanBatchPrefix] from a reader.
    pub fn decode_prefix(r: &mut &[u8]) -> Result<Self, SpanBatchError> {
        Ok(Self {
            rel_timestamp: read_varint(r, SpanDecodingError::RelativeTimestamp)?,
            l1_origin_num: read_varint(r, SpanDecodingError::L1OriginNumber)?,
            parent_check: read_fixed::<20>(r, SpanDecodingError::ParentCheck)?.into(),
            l1_origin_check: read_fixed::<20>(r, SpanDecodingError::L1OriginCheck)?.into(),
        })
    }

    /// Encodes the [SpanBatchPrefix] into a writer.
    pub fn encode_prefix(&self, w: &mut Vec<u8>) {
        write_varint(w, self.rel_timestamp);
        write_varint(w, self.l1_origin_num);
        w.extend_from_slice(self.parent_check.as_slice());
        w.extend_from_slice(self.l1_origin_check.as_slice());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_batch_prefix_encoding() {
        let prefix = SpanBatchPrefix {
            rel_timestamp: 1337,
            l1_origin_num: 42,
            parent_check: FixedBytes::repeat_byte(0x11),
            l1_origin_check: FixedBytes::repeat_byte(0x22),
        };
        let mut encoded = Vec::new();
        prefix.encode_prefix(&mut encoded);
        assert_eq!(&encoded[..3], &[0xB9, 0x0A, 0x2A]);
        assert_eq!(encoded.len(), 3 + 40);
        assert_eq!(SpanBatchPrefix::decode_prefix(&mut encoded.as_slice()), Ok(prefix));
    }

    #[test]
    fn test_decode_truncated_checks() {
        let mut encoded = vec![0x01, 0x02];
        encoded.extend_from_slice(&[0x11; 20]);
        encoded.extend_from_slice(&[0x22; 19]);
        assert_eq!(
            SpanBatchPrefix::decode_prefix(&mut encoded.as_slice()),
            Err(SpanBatchError::Decoding(SpanDecodingError::L1OriginCheck))
        );
        assert_eq!(
            SpanBatchPrefix::decode_prefix(&mut [].as_slice()),
            Err(SpanBatchError::Decoding(SpanDecodingError::RelativeTimestamp))
        );
    }
}
