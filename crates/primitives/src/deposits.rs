//! Contains deposit transaction types and helper methods.

use crate::{params::DEPOSIT_TX_TYPE, RawTransaction};
use alloy_primitives::{b256, keccak256, Address, Bytes, Log, TxKind, B256, U256, U64};
use alloy_rlp::{Encodable, Header};
use thiserror::Error;

/// Deposit log event abi signature.
pub const DEPOSIT_EVENT_ABI: &str = "TransactionDeposited(address,address,uint256,bytes)";

/// Deposit event abi hash.
///
/// This is the keccak256 hash of the deposit event ABI signature.
/// `keccak256("TransactionDeposited(address,address,uint256,bytes)")`
pub const DEPOSIT_EVENT_ABI_HASH: B256 =
    b256!("b3813568d9991fc951961fcb4c784893574240a28925604d09fc577c55bb7c32");

/// The initial version of the deposit event log.
pub const DEPOSIT_EVENT_VERSION_0: B256 = B256::ZERO;

/// A deposit log validation error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DepositError {
    /// Unexpected number of deposit event log topics.
    #[error("Unexpected number of deposit event log topics: {0}")]
    UnexpectedTopicsLen(usize),
    /// Invalid deposit event selector.
    /// Expected: [B256] (deposit event selector), Actual: [B256] (event log topic).
    #[error("Invalid deposit event selector: {1}, expected {0}")]
    InvalidSelector(B256, B256),
    /// Incomplete opaqueData slice header (incomplete length).
    #[error("Incomplete opaqueData slice header (incomplete length): {0}")]
    IncompleteOpaqueData(usize),
    /// The log data is not aligned to 32 bytes.
    #[error("Unaligned log data, expected multiple of 32 bytes, got: {0}")]
    UnalignedData(usize),
    /// Invalid opaque data content offset.
    #[error("Invalid u64 opaque data content offset: {0}")]
    InvalidOpaqueDataOffset(Bytes),
    /// Invalid opaque data content length.
    #[error("Invalid u64 opaque data content length: {0}")]
    InvalidOpaqueDataLength(Bytes),
    /// Opaque data length exceeds the deposit log event data length.
    /// Specified: [usize] (data length), Actual: [usize] (opaque data length).
    #[error("Specified opaque data length {0} exceeds the deposit log event data length {1}")]
    OpaqueDataOverflow(usize, usize),
    /// Opaque data with padding exceeds the specified data length.
    #[error("Opaque data with padding exceeds the specified data length: {1} > {0}")]
    PaddedOpaqueDataOverflow(usize, usize),
    /// An invalid deposit version.
    #[error("Invalid deposit version: {0}")]
    InvalidVersion(B256),
    /// Unexpected opaque data length
    #[error("Unexpected opaque data length: {0}")]
    UnexpectedOpaqueDataLen(usize),
}

/// Source domain identifiers for deposit transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DepositSourceDomainIdentifier {
    /// A user deposit source.
    User = 0,
    /// A L1 info deposit source.
    L1Info = 1,
    /// An upgrade deposit source.
    Upgrade = 2,
}

impl DepositSourceDomainIdentifier {
    /// Hashes `inner` into this domain: `keccak256(bytes32(uint256(domain)) ++ inner)`.
    fn hash(self, inner: B256) -> B256 {
        let mut domain_input = [0u8; 32 * 2];
        domain_input[32 - 8..32].copy_from_slice(&(self as u64).to_be_bytes());
        domain_input[32..].copy_from_slice(inner.as_slice());
        keccak256(domain_input)
    }
}

/// Source domains for deposit transactions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepositSourceDomain {
    /// A user deposit source.
    User(UserDepositSource),
    /// A L1 info deposit source.
    L1Info(L1InfoDepositSource),
    /// An upgrade deposit source.
    Upgrade(UpgradeDepositSource),
}

impl DepositSourceDomain {
    /// Returns the source hash.
    pub fn source_hash(&self) -> B256 {
        match self {
            Self::User(ds) => ds.source_hash(),
            Self::L1Info(ds) => ds.source_hash(),
            Self::Upgrade(ds) => ds.source_hash(),
        }
    }
}

/// Hashes a block hash with a big-endian `u64` in the last 8 bytes of the second word.
fn block_hash_with_index(block_hash: B256, index: u64) -> B256 {
    let mut input = [0u8; 32 * 2];
    input[..32].copy_from_slice(block_hash.as_slice());
    input[32 * 2 - 8..].copy_from_slice(&index.to_be_bytes());
    keccak256(input)
}

/// A deposit transaction source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserDepositSource {
    /// The L1 block hash.
    pub l1_block_hash: B256,
    /// The log index.
    pub log_index: u64,
}

impl UserDepositSource {
    /// Creates a new [UserDepositSource].
    pub const fn new(l1_block_hash: B256, log_index: u64) -> Self {
        Self { l1_block_hash, log_index }
    }

    /// Returns the source hash.
    pub fn source_hash(&self) -> B256 {
        DepositSourceDomainIdentifier::User
            .hash(block_hash_with_index(self.l1_block_hash, self.log_index))
    }
}

/// A L1 info deposit transaction source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct L1InfoDepositSource {
    /// The L1 block hash.
    pub l1_block_hash: B256,
    /// The sequence number.
    pub seq_number: u64,
}

impl L1InfoDepositSource {
    /// Creates a new [L1InfoDepositSource].
    pub const fn new(l1_block_hash: B256, seq_number: u64) -> Self {
        Self { l1_block_hash, seq_number }
    }

    /// Returns the source hash.
    pub fn source_hash(&self) -> B256 {
        DepositSourceDomainIdentifier::L1Info
            .hash(block_hash_with_index(self.l1_block_hash, self.seq_number))
    }
}

/// An upgrade deposit transaction source.
///
/// System-upgrade transactions have their own domain for source-hashes, so they do not conflict
/// with user-deposits or deposited L1 information. The intent identifies the upgrade-tx
/// uniquely, in a human-readable way.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpgradeDepositSource {
    /// The intent.
    pub intent: String,
}

impl UpgradeDepositSource {
    /// Creates a new [UpgradeDepositSource].
    pub const fn new(intent: String) -> Self {
        Self { intent }
    }

    /// Returns the source hash.
    pub fn source_hash(&self) -> B256 {
        DepositSourceDomainIdentifier::Upgrade.hash(keccak256(self.intent.as_bytes()))
    }
}

/// An OP Stack deposit transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxDeposit {
    /// Hash that uniquely identifies the source of the deposit.
    pub source_hash: B256,
    /// The address of the sender account.
    pub from: Address,
    /// The address of the recipient account, or the null (zero-length) address if the deposited
    /// transaction is a contract creation.
    pub to: TxKind,
    /// The ETH value to mint on L2.
    pub mint: Option<u128>,
    /// The ETH value to send to the recipient account.
    pub value: U256,
    /// The gas limit for the L2 transaction.
    pub gas_limit: u64,
    /// Field indicating if this transaction is exempt from the L2 gas limit.
    pub is_system_transaction: bool,
    /// Input has two uses depending if transaction is Create or Call (if `to` field is None or
    /// Some).
    pub input: Bytes,
}

impl TxDeposit {
    fn fields_len(&self) -> usize {
        self.source_hash.length() +
            self.from.length() +
            self.to.length() +
            self.mint.unwrap_or_default().length() +
            self.value.length() +
            self.gas_limit.length() +
            self.is_system_transaction.length() +
            self.input.length()
    }

    /// Encodes the transaction as `0x7E ++ rlp([source_hash, from, to, mint, value, gas,
    /// is_system_tx, data])`.
    pub fn encode_2718(&self) -> Vec<u8> {
        let header = Header { list: true, payload_length: self.fields_len() };
        let mut out = Vec::with_capacity(1 + header.length() + header.payload_length);
        out.push(DEPOSIT_TX_TYPE);
        header.encode(&mut out);
        self.source_hash.encode(&mut out);
        self.from.encode(&mut out);
        self.to.encode(&mut out);
        // A zero mint is encoded the same as no mint.
        self.mint.unwrap_or_default().encode(&mut out);
        self.value.encode(&mut out);
        self.gas_limit.encode(&mut out);
        self.is_system_transaction.encode(&mut out);
        self.input.encode(&mut out);
        out
    }

    /// Returns the EIP-2718 encoding as a [RawTransaction].
    pub fn to_raw_transaction(&self) -> RawTransaction {
        RawTransaction::from(self.encode_2718())
    }
}

/// Derives a deposit transaction from an EVM log event emitted by the deposit contract.
///
/// The emitted log must be in format:
/// ```solidity
/// event TransactionDeposited(
///    address indexed from,
///    address indexed to,
///    uint256 indexed version,
///    bytes opaqueData
/// );
/// ```
pub fn decode_deposit(
    block_hash: B256,
    index: usize,
    log: &Log,
) -> Result<RawTransaction, DepositError> {
    let topics = log.data.topics();
    if topics.len() != 4 {
        return Err(DepositError::UnexpectedTopicsLen(topics.len()));
    }
    if topics[0] != DEPOSIT_EVENT_ABI_HASH {
        return Err(DepositError::InvalidSelector(DEPOSIT_EVENT_ABI_HASH, topics[0]));
    }
    let data = &log.data.data;
    if data.len() < 64 {
        return Err(DepositError::IncompleteOpaqueData(data.len()));
    }
    if data.len() % 32 != 0 {
        return Err(DepositError::UnalignedData(data.len()));
    }

    let from = Address::from_slice(&topics[1].as_slice()[12..]);
    let to = Address::from_slice(&topics[2].as_slice()[12..]);
    let version = topics[3];

    // The data field is `abi.encode(bytes opaqueData)`:
    // word 0 holds the offset of the bytes content (always 32), word 1 holds its length.
    let opaque_content_offset = U64::try_from_be_slice(&data[24..32]).ok_or_else(|| {
        DepositError::InvalidOpaqueDataOffset(Bytes::copy_from_slice(&data[24..32]))
    })?;
    if opaque_content_offset != U64::from(32) {
        return Err(DepositError::InvalidOpaqueDataOffset(Bytes::copy_from_slice(&data[24..32])));
    }

    let mut raw_len = [0u8; 8];
    raw_len.copy_from_slice(&data[56..64]);
    let opaque_content_len = u64::from_be_bytes(raw_len);
    if data[32..56].iter().any(|b| *b != 0) {
        return Err(DepositError::InvalidOpaqueDataLength(Bytes::copy_from_slice(&data[32..64])));
    }
    if opaque_content_len as usize > data.len() - 64 {
        return Err(DepositError::OpaqueDataOverflow(
            opaque_content_len as usize,
            data.len() - 64,
        ));
    }
    let padded_len = opaque_content_len.checked_add(32).ok_or(DepositError::OpaqueDataOverflow(
        opaque_content_len as usize,
        data.len() - 64,
    ))?;
    if padded_len as usize <= data.len() - 64 {
        return Err(DepositError::PaddedOpaqueDataOverflow(
            data.len() - 64,
            opaque_content_len as usize,
        ));
    }

    // The remaining data is the opaqueData which is tightly packed and then padded to 32 bytes by
    // the EVM.
    let opaque_data = &data[64..64 + opaque_content_len as usize];
    let source = UserDepositSource::new(block_hash, index as u64);

    let mut deposit_tx = TxDeposit {
        from,
        is_system_transaction: false,
        source_hash: source.source_hash(),
        ..Default::default()
    };

    // Can only handle version 0 for now
    if version != DEPOSIT_EVENT_VERSION_0 {
        return Err(DepositError::InvalidVersion(version));
    }

    unmarshal_deposit_version0(&mut deposit_tx, to, opaque_data)?;
    Ok(deposit_tx.to_raw_transaction())
}

/// Unmarshals a deposit transaction from the opaque data.
///
/// `opaqueData = abi.encodePacked(uint256 mint, uint256 value, uint64 gasLimit, uint8
/// isCreation, bytes data)`
pub(crate) fn unmarshal_deposit_version0(
    tx: &mut TxDeposit,
    to: Address,
    data: &[u8],
) -> Result<(), DepositError> {
    if data.len() < 32 + 32 + 8 + 1 {
        return Err(DepositError::UnexpectedOpaqueDataLen(data.len()));
    }

    let mut offset = 0;

    // The mint is a uint256, but only values that fit in 128 bits can be minted.
    let mut raw_mint = [0u8; 16];
    raw_mint.copy_from_slice(&data[offset + 16..offset + 32]);
    let mint = u128::from_be_bytes(raw_mint);

    // 0 mint is represented as nil to skip minting code
    tx.mint = (mint != 0).then_some(mint);
    offset += 32;

    // uint256 value
    tx.value = U256::from_be_slice(&data[offset..offset + 32]);
    offset += 32;

    // uint64 gas
    let mut raw_gas = [0u8; 8];
    raw_gas.copy_from_slice(&data[offset..offset + 8]);
    tx.gas_limit = u64::from_be_bytes(raw_gas);
    offset += 8;

    // uint8 isCreation
    // If the byte is 1 the recipient stays empty and a contract is created using the L2 account
    // nonce to determine the created address.
    tx.to = if data[offset] == 0 { TxKind::Call(to) } else { TxKind::Create };
    offset += 1;

    // The remainder of the opaqueData is the transaction data (without length prefix).
    tx.input = Bytes::copy_from_slice(&data[offset..]);

    Ok(())
}
