//! Span batch transaction data, and the conversion between it and signed EIP-2718 transactions.
//!
//! A span batch strips the fields it stores column-wise (nonce, gas, `to`, signature) out of each
//! transaction. What remains is the transaction data:
//!
//! ```text
//! legacy   = rlp([value, gas_price, data])
//! eip2930  = 0x01 ++ rlp([value, gas_price, data, access_list])
//! eip1559  = 0x02 ++ rlp([value, max_priority_fee_per_gas, max_fee_per_gas, data, access_list])
//! ```

use super::{SpanBatchError, SpanBatchSignature, SpanDecodingError};
use alloy_eips::eip2930::AccessList;
use alloy_primitives::{Address, Bytes, TxKind, U256};
use alloy_rlp::{Decodable, Encodable, Header, RlpDecodable, RlpEncodable};

/// The transaction types a span batch can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SpanBatchTxType {
    /// Legacy, optionally EIP-155 protected.
    Legacy = 0,
    /// EIP-2930 access list transaction.
    Eip2930 = 1,
    /// EIP-1559 dynamic fee transaction.
    Eip1559 = 2,
}

impl TryFrom<u8> for SpanBatchTxType {
    type Error = SpanBatchError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Legacy),
            1 => Ok(Self::Eip2930),
            2 => Ok(Self::Eip1559),
            _ => Err(SpanDecodingError::InvalidTransactionType.into()),
        }
    }
}

/// The transaction data for a legacy transaction within a span batch.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct SpanBatchLegacyTransactionData {
    /// The ETH value of the transaction.
    pub value: U256,
    /// The gas price of the transaction.
    pub gas_price: U256,
    /// Transaction calldata.
    pub data: Bytes,
}

/// The transaction data for an EIP-2930 transaction within a span batch.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct SpanBatchEip2930TransactionData {
    /// The ETH value of the transaction.
    pub value: U256,
    /// The gas price of the transaction.
    pub gas_price: U256,
    /// Transaction calldata.
    pub data: Bytes,
    /// Access list, used to pre-warm storage slots through static declaration.
    pub access_list: AccessList,
}

/// The transaction data for an EIP-1559 transaction within a span batch.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct SpanBatchEip1559TransactionData {
    /// The ETH value of the transaction.
    pub value: U256,
    /// Max priority fee per gas.
    pub max_priority_fee_per_gas: U256,
    /// Max fee per gas.
    pub max_fee_per_gas: U256,
    /// Transaction calldata.
    pub data: Bytes,
    /// Access list, used to pre-warm storage slots through static declaration.
    pub access_list: AccessList,
}

/// The typed transaction data stored in a span batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanBatchTransactionData {
    /// Legacy transaction data.
    Legacy(SpanBatchLegacyTransactionData),
    /// EIP-2930 transaction data.
    Eip2930(SpanBatchEip2930TransactionData),
    /// EIP-1559 transaction data.
    Eip1559(SpanBatchEip1559TransactionData),
}

impl SpanBatchTransactionData {
    /// Returns the [SpanBatchTxType] of the data.
    pub const fn tx_type(&self) -> SpanBatchTxType {
        match self {
            Self::Legacy(_) => SpanBatchTxType::Legacy,
            Self::Eip2930(_) => SpanBatchTxType::Eip2930,
            Self::Eip1559(_) => SpanBatchTxType::Eip1559,
        }
    }

    /// Encodes the transaction data, prefixed with the type byte for typed transactions.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Legacy(data) => data.encode(out),
            Self::Eip2930(data) => {
                out.push(SpanBatchTxType::Eip2930 as u8);
                data.encode(out);
            }
            Self::Eip1559(data) => {
                out.push(SpanBatchTxType::Eip1559 as u8);
                data.encode(out);
            }
        }
    }

    /// Decodes transaction data written by [Self::encode].
    pub fn decode(r: &mut &[u8]) -> Result<Self, SpanBatchError> {
        let invalid = |_| SpanDecodingError::InvalidTransactionData;
        let first = *r.first().ok_or(SpanDecodingError::InvalidTransactionData)?;
        if first > 0x7F {
            return Ok(Self::Legacy(SpanBatchLegacyTransactionData::decode(r).map_err(invalid)?));
        }

        *r = &r[1..];
        match SpanBatchTxType::try_from(first)? {
            SpanBatchTxType::Eip2930 => {
                Ok(Self::Eip2930(SpanBatchEip2930TransactionData::decode(r).map_err(invalid)?))
            }
            SpanBatchTxType::Eip1559 => {
                Ok(Self::Eip1559(SpanBatchEip1559TransactionData::decode(r).map_err(invalid)?))
            }
            SpanBatchTxType::Legacy => Err(SpanDecodingError::InvalidTransactionType.into()),
        }
    }

    /// Rebuilds the signed EIP-2718 encoding of the transaction from the data and the column
    /// fields stored elsewhere in the span batch. The signature `v` must already be recovered.
    pub fn to_signed_tx(
        &self,
        nonce: u64,
        gas: u64,
        to: Option<Address>,
        chain_id: u64,
        signature: SpanBatchSignature,
    ) -> Result<Vec<u8>, SpanBatchError> {
        let to = to.map_or(TxKind::Create, TxKind::Call);
        let mut fields = Vec::new();
        let mut out = Vec::new();
        match self {
            Self::Legacy(data) => {
                nonce.encode(&mut fields);
                data.gas_price.encode(&mut fields);
                gas.encode(&mut fields);
                to.encode(&mut fields);
                data.value.encode(&mut fields);
                data.data.encode(&mut fields);
                signature.v.encode(&mut fields);
            }
            Self::Eip2930(data) => {
                out.push(SpanBatchTxType::Eip2930 as u8);
                chain_id.encode(&mut fields);
                nonce.encode(&mut fields);
                data.gas_price.encode(&mut fields);
                gas.encode(&mut fields);
                to.encode(&mut fields);
                data.value.encode(&mut fields);
                data.data.encode(&mut fields);
                data.access_list.encode(&mut fields);
                y_parity(signature.v)?.encode(&mut fields);
            }
            Self::Eip1559(data) => {
                out.push(SpanBatchTxType::Eip1559 as u8);
                chain_id.encode(&mut fields);
                nonce.encode(&mut fields);
                data.max_priority_fee_per_gas.encode(&mut fields);
                data.max_fee_per_gas.encode(&mut fields);
                gas.encode(&mut fields);
                to.encode(&mut fields);
                data.value.encode(&mut fields);
                data.data.encode(&mut fields);
                data.access_list.encode(&mut fields);
                y_parity(signature.v)?.encode(&mut fields);
            }
        }
        signature.r.encode(&mut fields);
        signature.s.encode(&mut fields);

        Header { list: true, payload_length: fields.len() }.encode(&mut out);
        out.extend_from_slice(&fields);
        Ok(out)
    }
}

fn y_parity(v: u64) -> Result<bool, SpanBatchError> {
    match v {
        0 | 1 => Ok(v == 1),
        _ => Err(SpanDecodingError::InvalidTransactionSignature.into()),
    }
}

/// A signed EIP-2718 transaction split into span batch columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SignedSpanTx {
    pub(crate) data: SpanBatchTransactionData,
    pub(crate) nonce: u64,
    pub(crate) gas: u64,
    pub(crate) to: Option<Address>,
    /// The chain id of typed and EIP-155 transactions.
    pub(crate) chain_id: Option<u64>,
    pub(crate) signature: SpanBatchSignature,
}

impl SignedSpanTx {
    /// Splits a signed EIP-2718 transaction into span batch columns.
    pub(crate) fn decode(raw: &[u8]) -> Result<Self, SpanBatchError> {
        let invalid = |_| SpanBatchError::from(SpanDecodingError::InvalidTransactionData);
        let first = *raw.first().ok_or(SpanDecodingError::InvalidTransactionData)?;
        let (tx_type, mut r) = if first > 0x7F {
            (SpanBatchTxType::Legacy, raw)
        } else {
            (SpanBatchTxType::try_from(first)?, &raw[1..])
        };

        let header = Header::decode(&mut r).map_err(invalid)?;
        if !header.list || header.payload_length != r.len() {
            return Err(SpanDecodingError::InvalidTransactionData.into());
        }

        let tx = match tx_type {
            SpanBatchTxType::Legacy => {
                let nonce = u64::decode(&mut r).map_err(invalid)?;
                let gas_price = U256::decode(&mut r).map_err(invalid)?;
                let gas = u64::decode(&mut r).map_err(invalid)?;
                let to = TxKind::decode(&mut r).map_err(invalid)?;
                let value = U256::decode(&mut r).map_err(invalid)?;
                let data = Bytes::decode(&mut r).map_err(invalid)?;
                let v = u64::decode(&mut r).map_err(invalid)?;
                let chain_id = (v >= 35).then(|| (v - 35) / 2);
                Self {
                    data: SpanBatchTransactionData::Legacy(SpanBatchLegacyTransactionData {
                        value,
                        gas_price,
                        data,
                    }),
                    nonce,
                    gas,
                    to: to.to().copied(),
                    chain_id,
                    signature: SpanBatchSignature {
                        v,
                        r: U256::decode(&mut r).map_err(invalid)?,
                        s: U256::decode(&mut r).map_err(invalid)?,
                    },
                }
            }
            SpanBatchTxType::Eip2930 => {
                let chain_id = u64::decode(&mut r).map_err(invalid)?;
                let nonce = u64::decode(&mut r).map_err(invalid)?;
                let gas_price = U256::decode(&mut r).map_err(invalid)?;
                let gas = u64::decode(&mut r).map_err(invalid)?;
                let to = TxKind::decode(&mut r).map_err(invalid)?;
                let value = U256::decode(&mut r).map_err(invalid)?;
                let data = Bytes::decode(&mut r).map_err(invalid)?;
                let access_list = AccessList::decode(&mut r).map_err(invalid)?;
                Self {
                    data: SpanBatchTransactionData::Eip2930(SpanBatchEip2930TransactionData {
                        value,
                        gas_price,
                        data,
                        access_list,
                    }),
                    nonce,
                    gas,
                    to: to.to().copied(),
                    chain_id: Some(chain_id),
                    signature: SpanBatchSignature {
                        v: u64::decode(&mut r).map_err(invalid)?,
                        r: U256::decode(&mut r).map_err(invalid)?,
                        s: U256::decode(&mut r).map_err(invalid)?,
                    },
                }
            }
            SpanBatchTxType::Eip1559 => {
                let chain_id = u64::decode(&mut r).map_err(invalid)?;
                let nonce = u64::decode(&mut r).map_err(invalid)?;
                let max_priority_fee_per_gas = U256::decode(&mut r).map_err(invalid)?;
                let max_fee_per_gas = U256::decode(&mut r).map_err(invalid)?;
                let gas = u64::decode(&mut r).map_err(invalid)?;
                let to = TxKind::decode(&mut r).map_err(invalid)?;
                let value = U256::decode(&mut r).map_err(invalid)?;
                let data = Bytes::decode(&mut r).map_err(invalid)?;
                let access_list = AccessList::decode(&mut r).map_err(invalid)?;
                Self {
                    data: SpanBatchTransactionData::Eip1559(SpanBatchEip1559TransactionData {
                        value,
                        max_priority_fee_per_gas,
                        max_fee_per_gas,
                        data,
                        access_list,
                    }),
                    nonce,
                    gas,
                    to: to.to().copied(),
                    chain_id: Some(chain_id),
                    signature: SpanBatchSignature {
                        v: u64::decode(&mut r).map_err(invalid)?,
                        r: U256::decode(&mut r).map_err(invalid)?,
                        s: U256::decode(&mut r).map_err(invalid)?,
                    },
                }
            }
        };

        if !r.is_empty() {
            return Err(SpanDecodingError::InvalidTransactionData.into());
        }
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_eips::eip2930::AccessListItem;
    use alloy_primitives::{address, b256};

    fn sig(v: u64) -> SpanBatchSignature {
        SpanBatchSignature { v, r: U256::from(0xAAu64), s: U256::from(0xBBu64) }
    }

    #[test]
    fn test_legacy_data_roundtrip() {
        let data = SpanBatchTransactionData::Legacy(SpanBatchLegacyTransactionData {
            value: U256::from(0xFF),
            gas_price: U256::from(0xEE),
            data: Bytes::from(vec![0x01, 0x02, 0x03]),
        });
        let mut buf = Vec::new();
        data.encode(&mut buf);
        assert!(buf[0] > 0x7F);
        assert_eq!(SpanBatchTransactionData::decode(&mut buf.as_slice()).unwrap(), data);
    }

    #[test]
    fn test_eip1559_data_field_order() {
        let data = SpanBatchEip1559TransactionData {
            value: U256::from(1),
            max_priority_fee_per_gas: U256::from(2),
            max_fee_per_gas: U256::from(3),
            data: Bytes::new(),
            access_list: AccessList::default(),
        };
        let mut buf = Vec::new();
        SpanBatchTransactionData::Eip1559(data.clone()).encode(&mut buf);
        // 0x02 ++ rlp([1, 2, 3, "", []])
        assert_eq!(buf, vec![0x02, 0xC5, 0x01, 0x02, 0x03, 0x80, 0xC0]);
        assert_eq!(
            SpanBatchTransactionData::decode(&mut buf.as_slice()).unwrap(),
            SpanBatchTransactionData::Eip1559(data)
        );
    }

    #[test]
    fn test_unknown_type() {
        assert_eq!(
            SpanBatchTransactionData::decode(&mut [0x03, 0xC0].as_slice()),
            Err(SpanBatchError::Decoding(SpanDecodingError::InvalidTransactionType))
        );
    }

    #[test]
    fn test_signed_legacy_roundtrip() {
        let data = SpanBatchTransactionData::Legacy(SpanBatchLegacyTransactionData {
            value: U256::from(5),
            gas_price: U256::from(7),
            data: Bytes::from(vec![0xCA, 0xFE]),
        });
        let to = Some(address!("0123456789012345678901234567890123456789"));
        let raw = data.to_signed_tx(3, 21_000, to, 10, sig(56)).unwrap();

        let parsed = SignedSpanTx::decode(&raw).unwrap();
        assert_eq!(parsed.data, data);
        assert_eq!(parsed.nonce, 3);
        assert_eq!(parsed.gas, 21_000);
        assert_eq!(parsed.to, to);
        assert_eq!(parsed.chain_id, Some(10));
        assert_eq!(parsed.signature, sig(56));
    }

    #[test]
    fn test_signed_eip2930_contract_creation() {
        let data = SpanBatchTransactionData::Eip2930(SpanBatchEip2930TransactionData {
            value: U256::ZERO,
            gas_price: U256::from(1_000_000_000u64),
            data: Bytes::from(vec![0x60, 0x80]),
            access_list: AccessList(vec![AccessListItem {
                address: address!("4200000000000000000000000000000000000015"),
                storage_keys: vec![b256!(
                    "0000000000000000000000000000000000000000000000000000000000000001"
                )],
            }]),
        });
        let raw = data.to_signed_tx(0, 100_000, None, 10, sig(1)).unwrap();
        assert_eq!(raw[0], 0x01);

        let parsed = SignedSpanTx::decode(&raw).unwrap();
        assert_eq!(parsed.data, data);
        assert_eq!(parsed.to, None);
        assert_eq!(parsed.chain_id, Some(10));
        assert_eq!(parsed.signature.v, 1);
    }

    #[test]
    fn test_signed_tx_rejects_invalid_parity() {
        let data = SpanBatchTransactionData::Eip1559(SpanBatchEip1559TransactionData {
            value: U256::ZERO,
            max_priority_fee_per_gas: U256::ZERO,
            max_fee_per_gas: U256::ZERO,
            data: Bytes::new(),
            access_list: AccessList::default(),
        });
        assert_eq!(
            data.to_signed_tx(0, 0, None, 1, sig(27)),
            Err(SpanBatchError::Decoding(SpanDecodingError::InvalidTransactionSignature))
        );
    }

    #[test]
    fn test_signed_tx_trailing_bytes() {
        let data = SpanBatchTransactionData::Legacy(SpanBatchLegacyTransactionData {
            value: U256::ZERO,
            gas_price: U256::ZERO,
            data: Bytes::new(),
        });
        let mut raw = data.to_signed_tx(0, 0, None, 1, sig(27)).unwrap();
        raw.push(0x00);
        assert!(SignedSpanTx::decode(&raw).is_err());
    }
}
