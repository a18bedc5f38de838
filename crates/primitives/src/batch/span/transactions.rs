//! This module contains the [SpanBatchTransactions] type and logic for encoding and decoding
//! transactions in a span batch.

use super::{
    read_fixed, read_tx_data, read_varint,
    tx_data::SignedSpanTx,
    utils::{convert_v_to_y_parity, is_protected_v},
    write_varint, SpanBatchBits, SpanBatchError, SpanBatchSignature, SpanBatchTransactionData,
    SpanBatchTxType, SpanDecodingError,
};
use crate::{params::MAX_SPAN_BATCH_ELEMENTS, RawTransaction};
use alloy_primitives::{Address, U256};

/// This struct contains the decoded information for transactions in a span batch.
///
/// ```text
/// txs = contract_creation_bits ++ y_parity_bits ++ tx_sigs ++ tx_tos ++ tx_datas ++ tx_nonces
///       ++ tx_gases ++ protected_bits
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpanBatchTransactions {
    /// The total number of transactions in a span batch. Must be manually set before decoding.
    pub total_block_tx_count: u64,
    /// The contract creation bits, standard span-batch bitlist.
    pub contract_creation_bits: SpanBatchBits,
    /// The y parity bits, standard span-batch bitlist.
    pub y_parity_bits: SpanBatchBits,
    /// The transaction signatures.
    pub tx_sigs: Vec<SpanBatchSignature>,
    /// The transaction nonces
    pub tx_nonces: Vec<u64>,
    /// The transaction gas limits.
    pub tx_gases: Vec<u64>,
    /// The `to` addresses of the transactions that are not contract creations.
    pub tx_tos: Vec<Address>,
    /// The transaction data.
    pub tx_datas: Vec<Vec<u8>>,
    /// The protected bits, standard span-batch bitlist.
    pub protected_bits: SpanBatchBits,
    /// The types of the transactions.
    pub tx_types: Vec<SpanBatchTxType>,
    /// Total legacy transaction count in the span batch.
    pub legacy_tx_count: u64,
}

impl SpanBatchTransactions {
    /// Encodes the [SpanBatchTransactions] into a writer.
    pub fn encode(&self, w: &mut Vec<u8>) -> Result<(), SpanBatchError> {
        let total = self.total_block_tx_count as usize;
        SpanBatchBits::encode(w, total, &self.contract_creation_bits)?;
        SpanBatchBits::encode(w, total, &self.y_parity_bits)?;
        for sig in &self.tx_sigs {
            w.extend_from_slice(&sig.r.to_be_bytes::<32>());
            w.extend_from_slice(&sig.s.to_be_bytes::<32>());
        }
        for to in &self.tx_tos {
            w.extend_from_slice(to.as_slice());
        }
        for data in &self.tx_datas {
            w.extend_from_slice(data);
        }
        self.tx_nonces.iter().for_each(|nonce| write_varint(w, *nonce));
        self.tx_gases.iter().for_each(|gas| write_varint(w, *gas));
        SpanBatchBits::encode(w, self.legacy_tx_count as usize, &self.protected_bits)
    }

    /// Decodes the [SpanBatchTransactions] from a reader. [Self::total_block_tx_count] must be
    /// set beforehand.
    pub fn decode(&mut self, r: &mut &[u8]) -> Result<(), SpanBatchError> {
        if self.total_block_tx_count > MAX_SPAN_BATCH_ELEMENTS {
            return Err(SpanBatchError::TooBigSpanBatchSize);
        }
        let total = self.total_block_tx_count as usize;

        self.contract_creation_bits = SpanBatchBits::decode(r, total)?;
        self.y_parity_bits = SpanBatchBits::decode(r, total)?;

        self.tx_sigs = (0..total)
            .map(|_| {
                let r_val = read_fixed::<32>(r, SpanDecodingError::TxSignatures)?;
                let s_val = read_fixed::<32>(r, SpanDecodingError::TxSignatures)?;
                Ok(SpanBatchSignature {
                    v: 0,
                    r: U256::from_be_bytes(r_val),
                    s: U256::from_be_bytes(s_val),
                })
            })
            .collect::<Result<_, SpanBatchError>>()?;

        let to_count = total as u64 - self.contract_creation_count();
        self.tx_tos = (0..to_count)
            .map(|_| read_fixed::<20>(r, SpanDecodingError::TxTos).map(Address::from))
            .collect::<Result<_, _>>()?;

        // Transaction data carries its own RLP length, so it needs no header.
        self.tx_datas = Vec::with_capacity(total);
        self.tx_types = Vec::with_capacity(total);
        self.legacy_tx_count = 0;
        for _ in 0..total {
            let (tx_data, tx_type) = read_tx_data(r)?;
            if tx_type == SpanBatchTxType::Legacy {
                self.legacy_tx_count += 1;
            }
            self.tx_datas.push(tx_data);
            self.tx_types.push(tx_type);
        }

        self.tx_nonces = (0..total)
            .map(|_| read_varint(r, SpanDecodingError::TxNonces))
            .collect::<Result<_, _>>()?;
        self.tx_gases = (0..total)
            .map(|_| read_varint(r, SpanDecodingError::TxGases))
            .collect::<Result<_, _>>()?;

        self.protected_bits = SpanBatchBits::decode(r, self.legacy_tx_count as usize)?;
        Ok(())
    }

    /// Returns the number of contract creation transactions in the span batch.
    pub fn contract_creation_count(&self) -> u64 {
        self.contract_creation_bits.count_ones()
    }

    /// Recover the `v` values of the transaction signatures.
    ///
    /// Legacy transactions get `27 + y` when unprotected and `chain_id * 2 + 35 + y` when
    /// protected. Typed transactions carry the bare y parity.
    pub fn recover_v(&mut self, chain_id: u64) -> Result<(), SpanBatchError> {
        if self.tx_sigs.len() != self.tx_types.len() {
            return Err(SpanDecodingError::TypeSignatureLenMismatch.into());
        }
        let mut protected_bits_idx = 0;
        for (i, (sig, tx_type)) in self.tx_sigs.iter_mut().zip(&self.tx_types).enumerate() {
            let bit = self.y_parity_bits.get_bit(i).unwrap_or(0) as u64;
            sig.v = match tx_type {
                SpanBatchTxType::Legacy => {
                    let protected = self.protected_bits.get_bit(protected_bits_idx).unwrap_or(0);
                    protected_bits_idx += 1;
                    if protected == 0 {
                        27 + bit
                    } else {
                        chain_id * 2 + 35 + bit
                    }
                }
                SpanBatchTxType::Eip2930 | SpanBatchTxType::Eip1559 => bit,
            };
        }
        Ok(())
    }

    /// Rebuilds every signed transaction in the span batch. [Self::recover_v] must have been
    /// called first.
    pub fn full_txs(&self, chain_id: u64) -> Result<Vec<RawTransaction>, SpanBatchError> {
        let invalid = || SpanBatchError::from(SpanDecodingError::InvalidTransactionData);
        let mut txs = Vec::with_capacity(self.total_block_tx_count as usize);
        let mut tos = self.tx_tos.iter();
        for idx in 0..self.total_block_tx_count as usize {
            let data = self.tx_datas.get(idx).ok_or_else(invalid)?;
            let tx = SpanBatchTransactionData::decode(&mut data.as_slice())?;
            let nonce = *self.tx_nonces.get(idx).ok_or_else(invalid)?;
            let gas = *self.tx_gases.get(idx).ok_or_else(invalid)?;
            let to = match self.contract_creation_bits.get_bit(idx).unwrap_or(0) {
                0 => Some(*tos.next().ok_or_else(invalid)?),
                _ => None,
            };
            let sig = *self.tx_sigs.get(idx).ok_or_else(invalid)?;
            txs.push(RawTransaction::from(tx.to_signed_tx(nonce, gas, to, chain_id, sig)?));
        }
        Ok(txs)
    }

    /// Splits signed transactions into the span batch columns and appends them.
    ///
    /// Protected transactions must be signed for `chain_id`.
    pub fn add_txs(
        &mut self,
        txs: &[RawTransaction],
        chain_id: u64,
    ) -> Result<(), SpanBatchError> {
        let offset = self.total_block_tx_count as usize;
        for (i, raw) in txs.iter().enumerate() {
            let tx = SignedSpanTx::decode(raw.as_ref())?;
            let tx_type = tx.data.tx_type();

            let protected = match tx_type {
                SpanBatchTxType::Legacy => {
                    let protected = is_protected_v(tx.signature.v);
                    self.protected_bits.set_bit(self.legacy_tx_count as usize, protected);
                    self.legacy_tx_count += 1;
                    protected
                }
                _ => true,
            };
            if protected {
                let tx_chain_id = tx.chain_id.ok_or(SpanDecodingError::InvalidTransactionData)?;
                if tx_chain_id != chain_id {
                    return Err(SpanBatchError::ChainIdMismatch(tx_chain_id, chain_id));
                }
            }

            let y_parity = convert_v_to_y_parity(tx.signature.v, tx_type)?;
            self.y_parity_bits.set_bit(offset + i, y_parity);
            self.contract_creation_bits.set_bit(offset + i, tx.to.is_none());
            if let Some(to) = tx.to {
                self.tx_tos.push(to);
            }

            let mut tx_data = Vec::new();
            tx.data.encode(&mut tx_data);
            self.tx_datas.push(tx_data);
            self.tx_sigs.push(tx.signature);
            self.tx_nonces.push(tx.nonce);
            self.tx_gases.push(tx.gas);
            self.tx_types.push(tx_type);
        }
        self.total_block_tx_count += txs.len() as u64;
        Ok(())
    }
}
