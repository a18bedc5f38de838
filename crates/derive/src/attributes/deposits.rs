//! Contains a helper method to derive deposit transactions from L1 Receipts.

use crate::errors::PipelineEncodingError;
use alloy_primitives::{Address, Log, B256};
use ferry_primitives::{decode_deposit, deposits::DEPOSIT_EVENT_ABI_HASH, RawTransaction, Receipt};

/// Derive deposits for transaction receipts.
///
/// Successful deposits must be emitted by the deposit contract and have the correct event
/// signature. So the receipt address must equal the specified deposit contract and the first topic
/// must be the [DEPOSIT_EVENT_ABI_HASH]. Source hashes commit to the log's index within the block.
pub(crate) fn derive_deposits(
    block_hash: B256,
    receipts: &[Receipt],
    deposit_contract: Address,
) -> Result<Vec<RawTransaction>, PipelineEncodingError> {
    let is_deposit = |l: &Log| {
        l.address == deposit_contract &&
            l.data.topics().first().map_or(false, |i| *i == DEPOSIT_EVENT_ABI_HASH)
    };

    let mut deposits = Vec::new();
    let mut log_index = 0;
    for receipt in receipts {
        if !receipt.success {
            log_index += receipt.logs.len();
            continue;
        }
        for log in &receipt.logs {
            if is_deposit(log) {
                deposits.push(decode_deposit(block_hash, log_index, log)?);
            }
            log_index += 1;
        }
    }
    Ok(deposits)
}
