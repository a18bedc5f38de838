//! Module for working with span batch bits.

use super::SpanBatchError;
use crate::params::MAX_SPAN_BATCH_ELEMENTS;
use core::cmp::Ordering;

/// Type for span batch bits.
///
/// The bitlist is a big-endian integer: bit `i` lives in byte `len - 1 - i / 8`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpanBatchBits(pub Vec<u8>);

impl AsRef<[u8]> for SpanBatchBits {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl SpanBatchBits {
    /// Returns the number of bytes a bitlist of `bit_length` bits occupies on the wire.
    pub const fn byte_len(bit_length: usize) -> usize {
        // Avoids the overflow of `(bit_length + 7) / 8`.
        bit_length / 8 + if bit_length % 8 != 0 { 1 } else { 0 }
    }

    /// Decodes a standard span-batch bitlist from a reader.
    ///
    /// Reads exactly `ceil(bit_length / 8)` bytes. The bitlist cannot be longer than
    /// [MAX_SPAN_BATCH_ELEMENTS] bytes, and its value cannot have more than `bit_length` bits.
    pub fn decode(r: &mut &[u8], bit_length: usize) -> Result<Self, SpanBatchError> {
        let buffer_len = Self::byte_len(bit_length);
        if buffer_len as u64 > MAX_SPAN_BATCH_ELEMENTS {
            return Err(SpanBatchError::TooBigSpanBatchSize);
        }
        if r.len() < buffer_len {
            return Err(SpanBatchError::BitfieldTooShort);
        }

        let (bits, rest) = r.split_at(buffer_len);
        let bits = Self(bits.to_vec());
        *r = rest;

        if bits.bit_len() > bit_length {
            return Err(SpanBatchError::BitfieldTooLong);
        }
        Ok(bits)
    }

    /// Encodes a standard span-batch bitlist, left-padded with zeroes to exactly
    /// `ceil(bit_length / 8)` bytes.
    pub fn encode(w: &mut Vec<u8>, bit_length: usize, bits: &Self) -> Result<(), SpanBatchError> {
        if bits.bit_len() > bit_length {
            return Err(SpanBatchError::BitfieldTooLong);
        }

        let buf_len = Self::byte_len(bit_length);
        if buf_len as u64 > MAX_SPAN_BATCH_ELEMENTS {
            return Err(SpanBatchError::TooBigSpanBatchSize);
        }

        // The backing vector may carry leading zero bytes past `buf_len` after bits were cleared.
        let significant = &bits.0[bits.0.len().saturating_sub(buf_len)..];
        w.resize(w.len() + buf_len - significant.len(), 0);
        w.extend_from_slice(significant);
        Ok(())
    }

    /// Get a bit from the [SpanBatchBits] bitlist.
    pub fn get_bit(&self, index: usize) -> Option<u8> {
        let byte_index = index / 8;
        let bit_index = index % 8;
        if byte_index >= self.0.len() {
            return None;
        }
        let byte = self.0[self.0.len() - byte_index - 1];
        Some((byte >> bit_index) & 1)
    }

    /// Sets a bit in the [SpanBatchBits] bitlist, growing it from the left as needed.
    pub fn set_bit(&mut self, index: usize, value: bool) {
        let byte_index = index / 8;
        let bit_index = index % 8;

        if byte_index >= self.0.len() {
            Self::resize_from_right(&mut self.0, byte_index + 1);
        }

        let len = self.0.len();
        let byte = &mut self.0[len - byte_index - 1];
        if value {
            *byte |= 1 << bit_index;
        } else {
            *byte &= !(1 << bit_index);
        }
    }

    /// Calculates the bit length of the [SpanBatchBits] bitfield, the position of the most
    /// significant set bit plus one.
    pub fn bit_len(&self) -> usize {
        self.0
            .iter()
            .position(|b| *b != 0)
            .map(|i| {
                let msb_index = 7 - self.0[i].leading_zeros() as usize;
                msb_index + 1 + (self.0.len() - i - 1) * 8
            })
            .unwrap_or(0)
    }

    /// Returns the number of set bits.
    pub fn count_ones(&self) -> u64 {
        self.0.iter().map(|b| b.count_ones() as u64).sum()
    }

    /// Resizes an array from the right. Useful for big-endian zero extension.
    fn resize_from_right<T: Default + Clone>(vec: &mut Vec<T>, new_size: usize) {
        let current_size = vec.len();
        match new_size.cmp(&current_size) {
            Ordering::Less => {
                vec.drain(0..current_size - new_size);
            }
            Ordering::Greater => {
                let mut extended = vec![T::default(); new_size - current_size];
                extended.append(vec);
                *vec = extended;
            }
            Ordering::Equal => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::{collection::vec, prelude::any, proptest};

    proptest! {
        #[test]
        fn test_encode_decode_roundtrip_span_bitlist(vec in vec(any::<u8>(), 0..5096)) {
            let bits = SpanBatchBits(vec);
            assert_eq!(SpanBatchBits::decode(&mut bits.as_ref(), bits.0.len() * 8).unwrap(), bits);
            let mut encoded = Vec::new();
            SpanBatchBits::encode(&mut encoded, bits.0.len() * 8, &bits).unwrap();
            assert_eq!(encoded, bits.0);
        }

        #[test]
        fn test_encode_exact_length(bit_length in 0usize..4096, index in 0usize..4096) {
            let mut bits = SpanBatchBits::default();
            bits.set_bit(index, true);
            let mut encoded = Vec::new();
            let res = SpanBatchBits::encode(&mut encoded, bit_length, &bits);
            if index < bit_length {
                assert!(res.is_ok());
                assert_eq!(encoded.len(), SpanBatchBits::byte_len(bit_length));
            } else {
                assert_eq!(res, Err(SpanBatchError::BitfieldTooLong));
            }
        }

        #[test]
        fn test_span_bitlist_bitlen(index in 0usize..65536) {
            let mut bits = SpanBatchBits::default();
            bits.set_bit(index, true);
            assert_eq!(bits.0.len(), (index / 8) + 1);
            assert_eq!(bits.bit_len(), index + 1);
            assert_eq!(bits.get_bit(index), Some(1));
        }
    }

    #[test]
    fn test_bitlist_big_endian_zero_extended() {
        let mut bits = SpanBatchBits::default();

        bits.set_bit(1, true);
        bits.set_bit(6, true);
        bits.set_bit(8, true);
        bits.set_bit(15, true);
        assert_eq!(bits.0, vec![0b1000_0001, 0b0100_0010]);
        assert_eq!(bits.bit_len(), 16);
        assert_eq!(bits.count_ones(), 4);
    }

    #[test]
    fn test_decode_rejects_overlong_value() {
        // 0b0000_0100 has a bit length of 3.
        let encoded = [0x04u8];
        assert_eq!(
            SpanBatchBits::decode(&mut encoded.as_slice(), 2),
            Err(SpanBatchError::BitfieldTooLong)
        );
        let bits = SpanBatchBits::decode(&mut encoded.as_slice(), 3).unwrap();
        assert_eq!(bits.get_bit(2), Some(1));
        assert_eq!(bits.get_bit(0), Some(0));
    }

    #[test]
    fn test_decode_short_input() {
        let encoded = [0x01u8];
        assert_eq!(
            SpanBatchBits::decode(&mut encoded.as_slice(), 9),
            Err(SpanBatchError::BitfieldTooShort)
        );
    }

    #[test]
    fn test_decode_advances_reader() {
        let encoded = [0x01u8, 0x02, 0xFF];
        let mut r = encoded.as_slice();
        let bits = SpanBatchBits::decode(&mut r, 10).unwrap();
        assert_eq!(bits.0, vec![0x01, 0x02]);
        assert_eq!(r, &[0xFF]);
    }

    #[test]
    fn test_too_big() {
        let bit_length = (MAX_SPAN_BATCH_ELEMENTS as usize + 1) * 8;
        assert_eq!(
            SpanBatchBits::decode(&mut [].as_slice(), bit_length),
            Err(SpanBatchError::TooBigSpanBatchSize)
        );
    }

    #[test]
    fn test_encode_after_clearing_high_bits() {
        let mut bits = SpanBatchBits::default();
        bits.set_bit(20, true);
        bits.set_bit(20, false);
        bits.set_bit(1, true);
        let mut encoded = Vec::new();
        SpanBatchBits::encode(&mut encoded, 4, &bits).unwrap();
        assert_eq!(encoded, vec![0b10]);
    }
}
