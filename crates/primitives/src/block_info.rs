//! This module contains the [L1BlockInfoTx] type, the first transaction of every derived L2 block.

use crate::{
    BlockID, DepositSourceDomain, Header, L1InfoDepositSource, RollupConfig, SystemConfig,
    TxDeposit, L1_SCALAR_ECOTONE,
};
use alloy_primitives::{address, Address, Bytes, TxKind, B256, U256};
use thiserror::Error;

/// The system transaction gas limit post-Regolith
const REGOLITH_SYSTEM_TX_GAS: u64 = 1_000_000;
/// The system transaction gas limit pre-Regolith
const SYSTEM_TX_GAS: u64 = 150_000_000;
/// The length of an L1 info transaction in Bedrock.
const L1_INFO_TX_LEN_BEDROCK: usize = 4 + 32 * 8;
/// The length of an L1 info transaction in Ecotone.
const L1_INFO_TX_LEN_ECOTONE: usize = 4 + 32 * 5;
/// The 4 byte selector of the
/// "setL1BlockValues(uint64,uint64,uint256,bytes32,uint64,bytes32,uint256,uint256)" function
const L1_INFO_TX_SELECTOR_BEDROCK: [u8; 4] = [0x01, 0x5d, 0x8e, 0xb9];
/// The 4 byte selector of "setL1BlockValuesEcotone()"
const L1_INFO_TX_SELECTOR_ECOTONE: [u8; 4] = [0x44, 0x0a, 0x5e, 0x20];
/// The address of the L1 Block contract
pub const L1_BLOCK_ADDRESS: Address = address!("4200000000000000000000000000000000000015");
/// The depositor address of the L1 info transaction
pub const L1_INFO_DEPOSITOR_ADDRESS: Address =
    address!("deaddeaddeaddeaddeaddeaddeaddeaddead0001");

/// An error decoding L1 info transaction calldata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum L1BlockInfoTxError {
    /// The calldata has the wrong length for its format.
    #[error("Invalid calldata length for {0} L1 info transaction: {1}")]
    InvalidLength(&'static str, usize),
    /// The calldata does not start with a known selector.
    #[error("Invalid L1 info transaction selector: {0:?}")]
    InvalidSelector(Bytes),
}

/// The [L1BlockInfoTx] enum contains variants for the different versions of the L1 block info
/// transaction.
///
/// This transaction always sits at the top of the block, and alters the `L1 Block` contract's
/// knowledge of the L1 chain.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum L1BlockInfoTx {
    /// A Bedrock L1 info transaction
    Bedrock(L1BlockInfoBedrock),
    /// An Ecotone L1 info transaction
    Ecotone(L1BlockInfoEcotone),
}

/// The fields within a Bedrock L1 block info transaction.
///
/// ```text
/// +---------+--------------------------+
/// | Bytes   | Field                    |
/// +---------+--------------------------+
/// | 4       | Function signature       |
/// | 32      | Number                   |
/// | 32      | Time                     |
/// | 32      | BaseFee                  |
/// | 32      | BlockHash                |
/// | 32      | SequenceNumber           |
/// | 32      | BatcherHash              |
/// | 32      | L1FeeOverhead            |
/// | 32      | L1FeeScalar              |
/// +---------+--------------------------+
/// ```
#[derive(Debug, Clone, Hash, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct L1BlockInfoBedrock {
    /// The current L1 origin block number
    pub number: u64,
    /// The current L1 origin block's timestamp
    pub time: u64,
    /// The current L1 origin block's basefee
    pub base_fee: u64,
    /// The current L1 origin block's hash
    pub block_hash: B256,
    /// The current sequence number
    pub sequence_number: u64,
    /// The address of the batch submitter
    pub batcher_address: Address,
    /// The fee overhead for L1 data
    pub l1_fee_overhead: U256,
    /// The fee scalar for L1 data
    pub l1_fee_scalar: U256,
}

/// The fields within an Ecotone L1 block info transaction.
///
/// ```text
/// +---------+--------------------------+
/// | Bytes   | Field                    |
/// +---------+--------------------------+
/// | 4       | Function signature       |
/// | 4       | BaseFeeScalar            |
/// | 4       | BlobBaseFeeScalar        |
/// | 8       | SequenceNumber           |
/// | 8       | Timestamp                |
/// | 8       | L1BlockNumber            |
/// | 32      | BaseFee                  |
/// | 32      | BlobBaseFee              |
/// | 32      | BlockHash                |
/// | 32      | BatcherHash              |
/// +---------+--------------------------+
/// ```
#[derive(Debug, Clone, Hash, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct L1BlockInfoEcotone {
    /// The current L1 origin block number
    pub number: u64,
    /// The current L1 origin block's timestamp
    pub time: u64,
    /// The current L1 origin block's basefee
    pub base_fee: u64,
    /// The current L1 origin block's hash
    pub block_hash: B256,
    /// The current sequence number
    pub sequence_number: u64,
    /// The address of the batch submitter
    pub batcher_address: Address,
    /// The current blob base fee on L1
    pub blob_base_fee: u128,
    /// The fee scalar for L1 blobspace data
    pub blob_base_fee_scalar: u32,
    /// The fee scalar for L1 data
    pub base_fee_scalar: u32,
}

impl L1BlockInfoTx {
    /// Builds the [L1BlockInfoTx] for an L2 block at `l2_block_time` in the epoch of `l1_header`.
    pub fn new(
        rollup_config: &RollupConfig,
        system_config: &SystemConfig,
        sequence_number: u64,
        l1_header: &Header,
        l2_block_time: u64,
    ) -> Self {
        // The L1Block contract is upgraded by transactions placed after the L1 info transaction
        // of the first Ecotone block, so that block still carries the Bedrock format.
        if !rollup_config.is_ecotone_active(l2_block_time) ||
            rollup_config.is_first_ecotone_block(l2_block_time)
        {
            return Self::Bedrock(L1BlockInfoBedrock {
                number: l1_header.number,
                time: l1_header.timestamp,
                base_fee: l1_header.base_fee_per_gas.unwrap_or_default(),
                block_hash: l1_header.hash,
                sequence_number,
                batcher_address: system_config.batcher_address,
                l1_fee_overhead: system_config.l1_fee_overhead,
                l1_fee_scalar: system_config.l1_fee_scalar,
            });
        }

        let scalar = system_config.l1_fee_scalar.to_be_bytes::<32>();
        let blob_base_fee_scalar =
            if scalar[0] == L1_SCALAR_ECOTONE { read_u32(&scalar, 28) } else { 0 };
        Self::Ecotone(L1BlockInfoEcotone {
            number: l1_header.number,
            time: l1_header.timestamp,
            base_fee: l1_header.base_fee_per_gas.unwrap_or_default(),
            block_hash: l1_header.hash,
            sequence_number,
            batcher_address: system_config.batcher_address,
            blob_base_fee: l1_header.blob_base_fee(),
            blob_base_fee_scalar,
            base_fee_scalar: read_u32(&scalar, 32),
        })
    }

    /// Builds the [L1BlockInfoTx] and wraps it in the system [TxDeposit] placed at the top of the
    /// L2 block.
    pub fn new_with_deposit_tx(
        rollup_config: &RollupConfig,
        system_config: &SystemConfig,
        sequence_number: u64,
        l1_header: &Header,
        l2_block_time: u64,
    ) -> (Self, TxDeposit) {
        let l1_info =
            Self::new(rollup_config, system_config, sequence_number, l1_header, l2_block_time);
        let source = DepositSourceDomain::L1Info(L1InfoDepositSource::new(
            l1_info.id().hash,
            sequence_number,
        ));

        // Regolith deprecates system transactions in favor of a fixed gas allowance.
        let regolith = rollup_config.is_regolith_active(l2_block_time);
        let deposit_tx = TxDeposit {
            source_hash: source.source_hash(),
            from: L1_INFO_DEPOSITOR_ADDRESS,
            to: TxKind::Call(L1_BLOCK_ADDRESS),
            mint: None,
            value: U256::ZERO,
            gas_limit: if regolith { REGOLITH_SYSTEM_TX_GAS } else { SYSTEM_TX_GAS },
            is_system_transaction: !regolith,
            input: l1_info.encode_calldata(),
        };

        (l1_info, deposit_tx)
    }

    /// Decodes an [L1BlockInfoTx] from transaction calldata, dispatching on the selector.
    pub fn decode_calldata(r: &[u8]) -> Result<Self, L1BlockInfoTxError> {
        match r.get(..4) {
            Some(s) if s == L1_INFO_TX_SELECTOR_BEDROCK => {
                L1BlockInfoBedrock::decode_calldata(r).map(Self::Bedrock)
            }
            Some(s) if s == L1_INFO_TX_SELECTOR_ECOTONE => {
                L1BlockInfoEcotone::decode_calldata(r).map(Self::Ecotone)
            }
            _ => Err(L1BlockInfoTxError::InvalidSelector(Bytes::copy_from_slice(
                &r[..r.len().min(4)],
            ))),
        }
    }

    /// Encodes the [L1BlockInfoTx] object into transaction calldata.
    pub fn encode_calldata(&self) -> Bytes {
        match self {
            Self::Bedrock(tx) => tx.encode_calldata(),
            Self::Ecotone(tx) => tx.encode_calldata(),
        }
    }

    /// Returns the L1 [BlockID] for the info transaction.
    pub const fn id(&self) -> BlockID {
        match self {
            Self::Bedrock(L1BlockInfoBedrock { number, block_hash, .. }) |
            Self::Ecotone(L1BlockInfoEcotone { number, block_hash, .. }) => {
                BlockID { number: *number, hash: *block_hash }
            }
        }
    }

    /// Returns the sequence number for the info transaction
    pub const fn sequence_number(&self) -> u64 {
        match self {
            Self::Bedrock(L1BlockInfoBedrock { sequence_number, .. }) |
            Self::Ecotone(L1BlockInfoEcotone { sequence_number, .. }) => *sequence_number,
        }
    }

    /// Returns the batcher address for the info transaction
    pub const fn batcher_address(&self) -> Address {
        match self {
            Self::Bedrock(L1BlockInfoBedrock { batcher_address, .. }) |
            Self::Ecotone(L1BlockInfoEcotone { batcher_address, .. }) => *batcher_address,
        }
    }
}

impl L1BlockInfoBedrock {
    /// Encodes the [L1BlockInfoBedrock] object into transaction calldata.
    pub fn encode_calldata(&self) -> Bytes {
        let mut buf = Vec::with_capacity(L1_INFO_TX_LEN_BEDROCK);
        buf.extend_from_slice(&L1_INFO_TX_SELECTOR_BEDROCK);
        buf.extend_from_slice(&U256::from(self.number).to_be_bytes::<32>());
        buf.extend_from_slice(&U256::from(self.time).to_be_bytes::<32>());
        buf.extend_from_slice(&U256::from(self.base_fee).to_be_bytes::<32>());
        buf.extend_from_slice(self.block_hash.as_slice());
        buf.extend_from_slice(&U256::from(self.sequence_number).to_be_bytes::<32>());
        buf.extend_from_slice(self.batcher_address.into_word().as_slice());
        buf.extend_from_slice(&self.l1_fee_overhead.to_be_bytes::<32>());
        buf.extend_from_slice(&self.l1_fee_scalar.to_be_bytes::<32>());
        buf.into()
    }

    /// Decodes the [L1BlockInfoBedrock] object from transaction calldata.
    pub fn decode_calldata(r: &[u8]) -> Result<Self, L1BlockInfoTxError> {
        if r.len() != L1_INFO_TX_LEN_BEDROCK {
            return Err(L1BlockInfoTxError::InvalidLength("Bedrock", r.len()));
        }

        Ok(Self {
            number: read_u64(r, 36),
            time: read_u64(r, 68),
            base_fee: read_u64(r, 100),
            block_hash: B256::from_slice(&r[100..132]),
            sequence_number: read_u64(r, 164),
            batcher_address: Address::from_slice(&r[176..196]),
            l1_fee_overhead: U256::from_be_slice(&r[196..228]),
            l1_fee_scalar: U256::from_be_slice(&r[228..260]),
        })
    }
}

impl L1BlockInfoEcotone {
    /// Encodes the [L1BlockInfoEcotone] object into transaction calldata.
    pub fn encode_calldata(&self) -> Bytes {
        let mut buf = Vec::with_capacity(L1_INFO_TX_LEN_ECOTONE);
        buf.extend_from_slice(&L1_INFO_TX_SELECTOR_ECOTONE);
        buf.extend_from_slice(&self.base_fee_scalar.to_be_bytes());
        buf.extend_from_slice(&self.blob_base_fee_scalar.to_be_bytes());
        buf.extend_from_slice(&self.sequence_number.to_be_bytes());
        buf.extend_from_slice(&self.time.to_be_bytes());
        buf.extend_from_slice(&self.number.to_be_bytes());
        buf.extend_from_slice(&U256::from(self.base_fee).to_be_bytes::<32>());
        buf.extend_from_slice(&U256::from(self.blob_base_fee).to_be_bytes::<32>());
        buf.extend_from_slice(self.block_hash.as_slice());
        buf.extend_from_slice(self.batcher_address.into_word().as_slice());
        buf.into()
    }

    /// Decodes the [L1BlockInfoEcotone] object from transaction calldata.
    pub fn decode_calldata(r: &[u8]) -> Result<Self, L1BlockInfoTxError> {
        if r.len() != L1_INFO_TX_LEN_ECOTONE {
            return Err(L1BlockInfoTxError::InvalidLength("Ecotone", r.len()));
        }

        let mut blob_base_fee = [0u8; 16];
        blob_base_fee.copy_from_slice(&r[84..100]);
        Ok(Self {
            base_fee_scalar: read_u32(r, 8),
            blob_base_fee_scalar: read_u32(r, 12),
            sequence_number: read_u64(r, 20),
            time: read_u64(r, 28),
            number: read_u64(r, 36),
            base_fee: read_u64(r, 68),
            blob_base_fee: u128::from_be_bytes(blob_base_fee),
            block_hash: B256::from_slice(&r[100..132]),
            batcher_address: Address::from_slice(&r[144..164]),
        })
    }
}

/// Reads the big-endian `u64` ending at byte `end`. Callers validate the length.
fn read_u64(r: &[u8], end: usize) -> u64 {
    let mut word = [0u8; 8];
    word.copy_from_slice(&r[end - 8..end]);
    u64::from_be_bytes(word)
}

/// Reads the big-endian `u32` ending at byte `end`. Callers validate the length.
fn read_u32(r: &[u8], end: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&r[end - 4..end]);
    u32::from_be_bytes(word)
}
