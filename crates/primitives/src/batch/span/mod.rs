//! Span batches: a compact encoding of a run of consecutive L2 blocks.
//!
//! ```text
//! span_batch = batch_version ++ prefix ++ payload
//! prefix = rel_timestamp ++ l1_origin_num ++ parent_check ++ l1_origin_check
//! payload = block_count ++ origin_bits ++ block_tx_counts ++ txs
//! txs = contract_creation_bits ++ y_parity_bits ++ tx_sigs ++ tx_tos ++ tx_datas ++ tx_nonces
//!       ++ tx_gases ++ protected_bits
//! ```
//!
//! Integers are unsigned LEB128 varints; bitlists are big-endian and zero padded to a whole
//! number of bytes.

mod batch;
pub use batch::SpanBatch;

mod bits;
pub use bits::SpanBatchBits;

mod element;
pub use element::SpanBatchElement;

mod errors;
pub use errors::{SpanBatchError, SpanDecodingError};

mod payload;
pub use payload::SpanBatchPayload;

mod prefix;
pub use prefix::SpanBatchPrefix;

mod raw;
pub use raw::RawSpanBatch;

mod signature;
pub use signature::SpanBatchSignature;

mod transactions;
pub use transactions::SpanBatchTransactions;

mod tx_data;
pub use tx_data::{
    SpanBatchEip1559TransactionData, SpanBatchEip2930TransactionData,
    SpanBatchLegacyTransactionData, SpanBatchTransactionData, SpanBatchTxType,
};

mod utils;
pub(crate) use utils::{read_fixed, read_tx_data};
pub use utils::{read_varint, write_varint};
