//! Span Batch Errors

use thiserror::Error;

/// Span Batch Errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpanBatchError {
    /// The span batch is too big
    #[error("The span batch is too big")]
    TooBigSpanBatchSize,
    /// The bit field is too long
    #[error("The bit field is too long")]
    BitfieldTooLong,
    /// The reader ended before a bit field was fully read
    #[error("Unexpected end of input reading a bit field")]
    BitfieldTooShort,
    /// Empty Span Batch
    #[error("Empty span batch")]
    EmptySpanBatch,
    /// Missing L1 origin
    #[error("Missing L1 origin")]
    MissingL1Origin,
    /// Singular batches were appended out of order
    #[error("Batch is not ordered: timestamp {0} after {1}")]
    UnorderedBatch(u64, u64),
    /// A protected transaction was signed for another chain
    #[error("Protected transaction chain id {0} does not match {1}")]
    ChainIdMismatch(u64, u64),
    /// Decoding errors
    #[error("Span batch decoding error: {0}")]
    Decoding(#[from] SpanDecodingError),
}

/// Decoding Error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpanDecodingError {
    /// Failed to decode relative timestamp
    #[error("Failed to decode relative timestamp")]
    RelativeTimestamp,
    /// Failed to decode L1 origin number
    #[error("Failed to decode L1 origin number")]
    L1OriginNumber,
    /// Failed to decode parent check
    #[error("Failed to decode parent check")]
    ParentCheck,
    /// Failed to decode L1 origin check
    #[error("Failed to decode L1 origin check")]
    L1OriginCheck,
    /// Failed to decode block count
    #[error("Failed to decode block count")]
    BlockCount,
    /// Failed to decode block tx counts
    #[error("Failed to decode block tx counts")]
    BlockTxCounts,
    /// Failed to decode transaction signatures
    #[error("Failed to decode transaction signatures")]
    TxSignatures,
    /// Failed to decode transaction `to` addresses
    #[error("Failed to decode transaction to addresses")]
    TxTos,
    /// Failed to decode transaction nonces
    #[error("Failed to decode transaction nonces")]
    TxNonces,
    /// Failed to decode transaction gas limits
    #[error("Failed to decode transaction gas limits")]
    TxGases,
    /// Mismatch in length between the transaction type and signature arrays in a span batch
    /// transaction payload.
    #[error("Mismatch in length between the transaction type and signature arrays")]
    TypeSignatureLenMismatch,
    /// Invalid transaction type
    #[error("Invalid transaction type")]
    InvalidTransactionType,
    /// Invalid transaction data
    #[error("Invalid transaction data")]
    InvalidTransactionData,
    /// Invalid transaction signature
    #[error("Invalid transaction signature")]
    InvalidTransactionSignature,
}
