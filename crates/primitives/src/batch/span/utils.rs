//! Utilities for Span Batch Encoding and Decoding.

use super::{SpanBatchError, SpanBatchTxType, SpanDecodingError};
use alloy_rlp::Header;

/// Appends `value` to `w` as an unsigned LEB128 varint.
pub fn write_varint(w: &mut Vec<u8>, value: u64) {
    let mut buf = unsigned_varint::encode::u64_buffer();
    w.extend_from_slice(unsigned_varint::encode::u64(value, &mut buf));
}

/// Reads an unsigned LEB128 varint of at most 64 bits from `r`, advancing it.
pub fn read_varint(r: &mut &[u8], err: SpanDecodingError) -> Result<u64, SpanBatchError> {
    let (value, rest) = unsigned_varint::decode::u64(r).map_err(|_| err)?;
    *r = rest;
    Ok(value)
}

/// Reads `N` raw bytes from `r`, advancing it.
pub(crate) fn read_fixed<const N: usize>(
    r: &mut &[u8],
    err: SpanDecodingError,
) -> Result<[u8; N], SpanBatchError> {
    if r.len() < N {
        return Err(err.into());
    }
    let (head, rest) = r.split_at(N);
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    *r = rest;
    Ok(out)
}

/// Reads one span batch transaction data entry: an optional EIP-2718 type byte followed by an RLP
/// list, returned with the type byte included.
pub(crate) fn read_tx_data(r: &mut &[u8]) -> Result<(Vec<u8>, SpanBatchTxType), SpanBatchError> {
    let first_byte = *r.first().ok_or(SpanDecodingError::InvalidTransactionData)?;
    let mut tx_data = Vec::new();
    let mut tx_type = 0;
    if first_byte <= 0x7F {
        tx_type = first_byte;
        tx_data.push(tx_type);
        *r = &r[1..];
    }

    // Peek the header with a copy of the reader, so `r` still points at the full list.
    let rlp_header =
        Header::decode(&mut &r[..]).map_err(|_| SpanDecodingError::InvalidTransactionData)?;
    if !rlp_header.list {
        return Err(SpanDecodingError::InvalidTransactionData.into());
    }
    let total_len = rlp_header.length() + rlp_header.payload_length;
    if r.len() < total_len {
        return Err(SpanDecodingError::InvalidTransactionData.into());
    }
    tx_data.extend_from_slice(&r[..total_len]);
    *r = &r[total_len..];

    Ok((tx_data, SpanBatchTxType::try_from(tx_type)?))
}

/// Converts a signature `v` value to its y parity bit, according to the transaction type.
pub(crate) fn convert_v_to_y_parity(
    v: u64,
    tx_type: SpanBatchTxType,
) -> Result<bool, SpanBatchError> {
    match tx_type {
        SpanBatchTxType::Legacy => match v {
            27 | 28 => Ok(v == 28),
            // EIP-155: v = 2 * chain_id + 35 + y_parity
            v if v >= 35 => Ok((v - 35) & 1 == 1),
            _ => Err(SpanDecodingError::InvalidTransactionSignature.into()),
        },
        SpanBatchTxType::Eip2930 | SpanBatchTxType::Eip1559 => match v {
            0 | 1 => Ok(v == 1),
            _ => Err(SpanDecodingError::InvalidTransactionSignature.into()),
        },
    }
}

/// Returns `true` if a legacy transaction's `v` value carries replay protection (EIP-155).
pub(crate) fn is_protected_v(v: u64) -> bool {
    if 64 - v.leading_zeros() <= 8 {
        return v != 27 && v != 28 && v != 1 && v != 0;
    }
    // anything not 27 or 28 is considered protected
    true
}
