//! This module contains the [SpanBatchSignature] type.

use alloy_primitives::U256;

/// The ECDSA signature of a transaction within a span batch.
///
/// Only `r` and `s` are stored on the wire; `v` is recovered from the y parity bits, the
/// protected bits and the chain id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanBatchSignature {
    /// The recovered `v` value, in the encoding of the transaction type.
    pub v: u64,
    /// The `r` value.
    pub r: U256,
    /// The `s` value.
    pub s: U256,
}
