//! This module contains the [SystemConfig] type.

use crate::{Receipt, RollupConfig};
use alloy_primitives::{address, b256, Address, Log, B256, U256};
use thiserror::Error;
use tracing::warn;

/// `keccak256("ConfigUpdate(uint256,uint8,bytes)")`
pub const CONFIG_UPDATE_TOPIC: B256 =
    b256!("1d2b0bda21d56b8bd12d4f94ebacffdfb35f5e226f84b461103bb8beab6353be");

/// The initial version of the system config event log.
pub const CONFIG_UPDATE_EVENT_VERSION_0: B256 = B256::ZERO;

/// The L1 fee scalar version used before Ecotone.
pub const L1_SCALAR_BEDROCK: u8 = 0;

/// The L1 fee scalar version introduced in Ecotone.
pub const L1_SCALAR_ECOTONE: u8 = 1;

/// An error applying a system config update log.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemConfigUpdateError {
    /// The log has fewer than 3 topics.
    #[error("Invalid config update log: expected 3 topics, got {0}")]
    InvalidTopicLen(usize),
    /// The first topic is not [CONFIG_UPDATE_TOPIC].
    #[error("Invalid config update log: invalid topic {0}")]
    InvalidTopic(B256),
    /// The event version is not supported.
    #[error("Invalid config update log: unsupported version {0}")]
    UnsupportedVersion(B256),
    /// The update type is not recognized.
    #[error("Invalid config update log: unrecognized update type {0}")]
    InvalidUpdateType(B256),
    /// The log data has the wrong length for its update type.
    #[error("Invalid config update log: invalid data length {0}")]
    InvalidDataLen(usize),
    /// The ABI offset of the payload is not 32.
    #[error("Invalid config update log: invalid data pointer {0}")]
    InvalidDataPointer(U256),
    /// The ABI length of the payload does not match the update type.
    #[error("Invalid config update log: invalid payload length {0}")]
    InvalidPayloadLen(U256),
    /// A field does not fit its type.
    #[error("Invalid config update log: value out of range {0}")]
    ValueOutOfRange(U256),
}

/// Represents type of update to the system config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum SystemConfigUpdateType {
    /// Batcher update type
    Batcher = 0,
    /// Gas config update type
    GasConfig = 1,
    /// Gas limit update type
    GasLimit = 2,
    /// Unsafe block signer update type
    UnsafeBlockSigner = 3,
    /// EIP-1559 parameters update type
    Eip1559 = 4,
}

impl TryFrom<B256> for SystemConfigUpdateType {
    type Error = SystemConfigUpdateError;

    fn try_from(topic: B256) -> Result<Self, Self::Error> {
        if topic[..24].iter().any(|b| *b != 0) {
            return Err(SystemConfigUpdateError::InvalidUpdateType(topic));
        }
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&topic[24..]);
        match u64::from_be_bytes(raw) {
            0 => Ok(Self::Batcher),
            1 => Ok(Self::GasConfig),
            2 => Ok(Self::GasLimit),
            3 => Ok(Self::UnsafeBlockSigner),
            4 => Ok(Self::Eip1559),
            _ => Err(SystemConfigUpdateError::InvalidUpdateType(topic)),
        }
    }
}

/// Optimism system config contract values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SystemConfig {
    /// Batch sender address
    pub batcher_address: Address,
    /// L2 gas limit
    pub gas_limit: u64,
    /// Fee overhead
    pub l1_fee_overhead: U256,
    /// Fee scalar
    pub l1_fee_scalar: U256,
    /// EIP-1559 base fee change denominator, set after Holocene.
    pub eip1559_denominator: Option<u32>,
    /// EIP-1559 elasticity multiplier, set after Holocene.
    pub eip1559_elasticity: Option<u32>,
}

impl SystemConfig {
    /// Filters all L1 receipts to find config updates and applies the config updates.
    ///
    /// Every valid update is applied. The first invalid update log, if any, is returned once all
    /// receipts have been processed.
    pub fn update_with_receipts(
        &mut self,
        receipts: &[Receipt],
        rollup_config: &RollupConfig,
        l1_time: u64,
    ) -> Result<(), SystemConfigUpdateError> {
        let mut first_err = None;
        let logs = receipts.iter().filter(|r| r.success).flat_map(|r| r.logs.iter());
        for log in logs {
            let topics = log.topics();
            if log.address != rollup_config.l1_system_config_address ||
                topics.first() != Some(&CONFIG_UPDATE_TOPIC)
            {
                continue;
            }
            if let Err(e) = self.process_config_update_log(log, rollup_config, l1_time) {
                warn!(target: "system-config", "Skipping invalid config update log: {e}");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Decodes an EVM log entry emitted by the system config contract and applies it as a
    /// [SystemConfig] change.
    ///
    /// Parse log data for:
    ///
    /// ```text
    /// event ConfigUpdate(
    ///    uint256 indexed version,
    ///    UpdateType indexed updateType,
    ///    bytes data
    /// );
    /// ```
    pub fn process_config_update_log(
        &mut self,
        log: &Log,
        rollup_config: &RollupConfig,
        l1_time: u64,
    ) -> Result<SystemConfigUpdateType, SystemConfigUpdateError> {
        let topics = log.topics();
        if topics.len() < 3 {
            return Err(SystemConfigUpdateError::InvalidTopicLen(topics.len()));
        }
        if topics[0] != CONFIG_UPDATE_TOPIC {
            return Err(SystemConfigUpdateError::InvalidTopic(topics[0]));
        }
        if topics[1] != CONFIG_UPDATE_EVENT_VERSION_0 {
            return Err(SystemConfigUpdateError::UnsupportedVersion(topics[1]));
        }

        let update_type = SystemConfigUpdateType::try_from(topics[2])?;
        let log_data = log.data.data.as_ref();

        match update_type {
            SystemConfigUpdateType::Batcher => {
                let word = abi_bytes_payload(log_data, 32)?;
                if word[..12].iter().any(|b| *b != 0) {
                    return Err(SystemConfigUpdateError::ValueOutOfRange(U256::from_be_slice(
                        word,
                    )));
                }
                self.batcher_address = Address::from_slice(&word[12..]);
            }
            SystemConfigUpdateType::GasConfig => {
                let payload = abi_bytes_payload(log_data, 64)?;
                let overhead = U256::from_be_slice(&payload[..32]);
                let scalar = U256::from_be_slice(&payload[32..]);

                if rollup_config.is_ecotone_active(l1_time) {
                    if check_ecotone_l1_system_config_scalar(scalar.to_be_bytes()).is_err() {
                        // ignore invalid scalars, retain the old system-config scalar
                        warn!(target: "system-config", "Ignoring invalid Ecotone scalar: {scalar}");
                        return Ok(update_type);
                    }

                    // retain the scalar data in encoded form
                    self.l1_fee_scalar = scalar;
                    // zero out the overhead, it will not affect the state-transition after Ecotone
                    self.l1_fee_overhead = U256::ZERO;
                } else {
                    self.l1_fee_scalar = scalar;
                    self.l1_fee_overhead = overhead;
                }
            }
            SystemConfigUpdateType::GasLimit => {
                let gas_limit = U256::from_be_slice(abi_bytes_payload(log_data, 32)?);
                self.gas_limit = gas_limit
                    .try_into()
                    .map_err(|_| SystemConfigUpdateError::ValueOutOfRange(gas_limit))?;
            }
            SystemConfigUpdateType::UnsafeBlockSigner => {
                // Ignored in derivation
            }
            SystemConfigUpdateType::Eip1559 => {
                let word = abi_bytes_payload(log_data, 32)?;
                let mut denominator = [0u8; 4];
                denominator.copy_from_slice(&word[24..28]);
                let mut elasticity = [0u8; 4];
                elasticity.copy_from_slice(&word[28..32]);
                self.eip1559_denominator = Some(u32::from_be_bytes(denominator));
                self.eip1559_elasticity = Some(u32::from_be_bytes(elasticity));
            }
        }

        Ok(update_type)
    }
}

/// Validates the ABI `bytes` header (offset word, then length word) of an update log and returns
/// the payload, which must be exactly `payload_len` bytes.
fn abi_bytes_payload(data: &[u8], payload_len: usize) -> Result<&[u8], SystemConfigUpdateError> {
    if data.len() != 64 + payload_len {
        return Err(SystemConfigUpdateError::InvalidDataLen(data.len()));
    }
    let pointer = U256::from_be_slice(&data[0..32]);
    if pointer != U256::from(32) {
        return Err(SystemConfigUpdateError::InvalidDataPointer(pointer));
    }
    let length = U256::from_be_slice(&data[32..64]);
    if length != U256::from(payload_len) {
        return Err(SystemConfigUpdateError::InvalidPayloadLen(length));
    }
    Ok(&data[64..])
}

/// Checks the versioned encoding of an Ecotone L1 fee scalar.
///
/// Version 0 carries the scalar in the last 4 bytes, version 1 carries the blob base fee scalar
/// in bytes 24..28 and the base fee scalar in bytes 28..32. All other bytes must be zero.
pub fn check_ecotone_l1_system_config_scalar(scalar: [u8; 32]) -> Result<(), u8> {
    let version_byte = scalar[0];
    match version_byte {
        L1_SCALAR_BEDROCK if scalar[1..28].iter().all(|b| *b == 0) => Ok(()),
        L1_SCALAR_ECOTONE if scalar[1..24].iter().all(|b| *b == 0) => Ok(()),
        _ => Err(version_byte),
    }
}

/// System accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SystemAccounts {
    /// The address that can deposit attributes
    pub attributes_depositor: Address,
    /// The address of the attributes predeploy
    pub attributes_predeploy: Address,
    /// The address of the fee vault
    pub fee_vault: Address,
}

impl Default for SystemAccounts {
    fn default() -> Self {
        Self {
            attributes_depositor: address!("deaddeaddeaddeaddeaddeaddeaddeaddead0001"),
            attributes_predeploy: address!("4200000000000000000000000000000000000015"),
            fee_vault: address!("4200000000000000000000000000000000000011"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{hex, LogData};

    fn mock_rollup_config() -> RollupConfig {
        RollupConfig { ecotone_time: Some(10), ..Default::default() }
    }

    fn update_log(update_type: u8, data: Vec<u8>) -> Log {
        Log {
            address: Address::ZERO,
            data: LogData::new_unchecked(
                vec![
                    CONFIG_UPDATE_TOPIC,
                    CONFIG_UPDATE_EVENT_VERSION_0,
                    B256::with_last_byte(update_type),
                ],
                data.into(),
            ),
        }
    }

    #[test]
    fn test_system_config_update_batcher_log() {
        let mut system_config = SystemConfig::default();
        let log = update_log(0, hex!("00000000000000000000000000000000000000000000000000000000000000200000000000000000000000000000000000000000000000000000000000000020000000000000000000000000000000000000000000000000000000000000beef").to_vec());

        system_config.process_config_update_log(&log, &mock_rollup_config(), 0).unwrap();

        assert_eq!(
            system_config.batcher_address,
            address!("000000000000000000000000000000000000bEEF")
        );
    }

    #[test]
    fn test_system_config_update_gas_config_log() {
        let mut system_config = SystemConfig::default();
        let log = update_log(1, hex!("00000000000000000000000000000000000000000000000000000000000000200000000000000000000000000000000000000000000000000000000000000040000000000000000000000000000000000000000000000000000000000000babe000000000000000000000000000000000000000000000000000000000000beef").to_vec());

        system_config.process_config_update_log(&log, &mock_rollup_config(), 0).unwrap();

        assert_eq!(system_config.l1_fee_overhead, U256::from(0xbabe));
        assert_eq!(system_config.l1_fee_scalar, U256::from(0xbeef));
    }

    #[test]
    fn test_system_config_update_gas_config_log_ecotone() {
        let mut system_config = SystemConfig::default();
        let log = update_log(1, hex!("00000000000000000000000000000000000000000000000000000000000000200000000000000000000000000000000000000000000000000000000000000040000000000000000000000000000000000000000000000000000000000000babe000000000000000000000000000000000000000000000000000000000000beef").to_vec());

        system_config.process_config_update_log(&log, &mock_rollup_config(), 10).unwrap();

        assert_eq!(system_config.l1_fee_overhead, U256::ZERO);
        assert_eq!(system_config.l1_fee_scalar, U256::from(0xbeef));
    }

    #[test]
    fn test_system_config_ignores_invalid_ecotone_scalar() {
        let mut system_config =
            SystemConfig { l1_fee_scalar: U256::from(7), ..Default::default() };
        let mut data = hex!("00000000000000000000000000000000000000000000000000000000000000200000000000000000000000000000000000000000000000000000000000000040000000000000000000000000000000000000000000000000000000000000babe000000000000000000000000000000000000000000000000000000000000beef").to_vec();
        // Unknown scalar version.
        data[96] = 0x02;

        system_config
            .process_config_update_log(&update_log(1, data), &mock_rollup_config(), 10)
            .unwrap();

        assert_eq!(system_config.l1_fee_scalar, U256::from(7));
    }

    #[test]
    fn test_system_config_update_gas_limit_log() {
        let mut system_config = SystemConfig::default();
        let log = update_log(2, hex!("00000000000000000000000000000000000000000000000000000000000000200000000000000000000000000000000000000000000000000000000000000020000000000000000000000000000000000000000000000000000000000000beef").to_vec());

        system_config.process_config_update_log(&log, &mock_rollup_config(), 0).unwrap();

        assert_eq!(system_config.gas_limit, 0xbeef);
    }

    #[test]
    fn test_system_config_update_eip1559_log() {
        let mut system_config = SystemConfig::default();
        let log = update_log(4, hex!("000000000000000000000000000000000000000000000000000000000000002000000000000000000000000000000000000000000000000000000000000000200000000000000000000000000000000000000000000000000000000a00000006").to_vec());

        system_config.process_config_update_log(&log, &mock_rollup_config(), 0).unwrap();

        assert_eq!(system_config.eip1559_denominator, Some(10));
        assert_eq!(system_config.eip1559_elasticity, Some(6));
    }

    #[test]
    fn test_system_config_update_invalid_len() {
        let mut system_config = SystemConfig::default();
        let log = update_log(0, vec![0u8; 64]);
        assert_eq!(
            system_config.process_config_update_log(&log, &mock_rollup_config(), 0),
            Err(SystemConfigUpdateError::InvalidDataLen(64))
        );
    }

    #[test]
    fn test_system_config_unknown_update_type() {
        let mut system_config = SystemConfig::default();
        let log = update_log(9, vec![0u8; 96]);
        assert_eq!(
            system_config.process_config_update_log(&log, &mock_rollup_config(), 0),
            Err(SystemConfigUpdateError::InvalidUpdateType(B256::with_last_byte(9)))
        );
    }

    #[test]
    fn test_update_with_receipts_filters() {
        let mut system_config = SystemConfig::default();
        let rollup_config = mock_rollup_config();
        let good = update_log(2, hex!("00000000000000000000000000000000000000000000000000000000000000200000000000000000000000000000000000000000000000000000000000000020000000000000000000000000000000000000000000000000000000000000beef").to_vec());
        let mut foreign = good.clone();
        foreign.address = Address::with_last_byte(1);
        foreign.data.data = hex!("00000000000000000000000000000000000000000000000000000000000000200000000000000000000000000000000000000000000000000000000000000020000000000000000000000000000000000000000000000000000000000000dead").to_vec().into();

        let receipts = vec![
            Receipt { success: false, logs: vec![good.clone()], ..Default::default() },
            Receipt { success: true, logs: vec![foreign], ..Default::default() },
        ];
        system_config.update_with_receipts(&receipts, &rollup_config, 0).unwrap();
        assert_eq!(system_config.gas_limit, 0);

        let receipts = vec![Receipt { success: true, logs: vec![good], ..Default::default() }];
        system_config.update_with_receipts(&receipts, &rollup_config, 0).unwrap();
        assert_eq!(system_config.gas_limit, 0xbeef);
    }

    #[test]
    fn test_check_ecotone_scalar() {
        let mut scalar = [0u8; 32];
        assert!(check_ecotone_l1_system_config_scalar(scalar).is_ok());
        scalar[0] = L1_SCALAR_ECOTONE;
        scalar[24] = 1;
        assert!(check_ecotone_l1_system_config_scalar(scalar).is_ok());
        scalar[5] = 1;
        assert_eq!(check_ecotone_l1_system_config_scalar(scalar), Err(L1_SCALAR_ECOTONE));
    }
}
