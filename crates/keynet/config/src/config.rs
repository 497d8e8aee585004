//! Network configuration types

use alloy_primitives::{Address, U256};
use keynet_primitives::MAX_SCOPE_WIDTH;
use keynet_staking::{KickVoteRetention, StakingParams};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::ConfigError;

/// Preset values per network
pub mod presets {
    /// Devnet minimum stake
    pub const DEVNET_MINIMUM_STAKE: u64 = 100;
    /// Testnet minimum stake
    pub const TESTNET_MINIMUM_STAKE: u64 = 10_000;
    /// Mainnet minimum stake
    pub const MAINNET_MINIMUM_STAKE: u64 = 100_000;

    /// Devnet epoch length: every block may close an epoch
    pub const DEVNET_EPOCH_LENGTH: u64 = 1;
    /// Testnet epoch length
    pub const TESTNET_EPOCH_LENGTH: u64 = 300;
    /// Mainnet epoch length, roughly one day of 12 second blocks
    pub const MAINNET_EPOCH_LENGTH: u64 = 7_200;

    /// Kick penalty on every network
    pub const KICK_PENALTY_PERCENT: u8 = 10;
}

/// Network type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Production mainnet
    Mainnet,
    /// Public testnet
    Testnet,
    /// Local development
    #[default]
    Devnet,
}

impl NetworkType {
    /// Minimum stake for this network
    pub const fn minimum_stake(&self) -> u64 {
        match self {
            Self::Mainnet => presets::MAINNET_MINIMUM_STAKE,
            Self::Testnet => presets::TESTNET_MINIMUM_STAKE,
            Self::Devnet => presets::DEVNET_MINIMUM_STAKE,
        }
    }

    /// Epoch length for this network
    pub const fn epoch_length(&self) -> u64 {
        match self {
            Self::Mainnet => presets::MAINNET_EPOCH_LENGTH,
            Self::Testnet => presets::TESTNET_EPOCH_LENGTH,
            Self::Devnet => presets::DEVNET_EPOCH_LENGTH,
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Network type
    pub network: NetworkType,
    /// Stake every validator must keep
    pub minimum_stake: U256,
    /// Epoch length in blocks
    pub epoch_length: u64,
    /// Share of stake slashed on a successful kick
    pub kick_penalty_percent: u8,
    /// Whether kick votes survive an epoch advance
    #[serde(default)]
    pub kick_vote_retention: KickVoteRetention,
    /// Reward credited to each validator of a completed epoch
    #[serde(default)]
    pub epoch_reward: U256,
    /// Usable permission scope bits
    pub max_scope_width: usize,
    /// Identity allowed to pause and tune parameters
    pub admin: Address,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::devnet()
    }
}

impl NetworkConfig {
    /// Create the preset config for a network
    pub fn new(network: NetworkType) -> Self {
        Self {
            network,
            minimum_stake: U256::from(network.minimum_stake()),
            epoch_length: network.epoch_length(),
            kick_penalty_percent: presets::KICK_PENALTY_PERCENT,
            kick_vote_retention: KickVoteRetention::PerEpoch,
            epoch_reward: U256::ZERO,
            max_scope_width: MAX_SCOPE_WIDTH,
            admin: Address::ZERO,
        }
    }

    /// Create a devnet config
    pub fn devnet() -> Self {
        Self::new(NetworkType::Devnet)
    }

    /// Create a testnet config administered by `admin`
    pub fn testnet(admin: Address) -> Self {
        Self::new(NetworkType::Testnet).with_admin(admin)
    }

    /// Create a mainnet config administered by `admin`
    pub fn mainnet(admin: Address) -> Self {
        Self::new(NetworkType::Mainnet).with_admin(admin)
    }

    /// Set the admin
    pub const fn with_admin(mut self, admin: Address) -> Self {
        self.admin = admin;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kick_penalty_percent > 100 {
            return Err(ConfigError::InvalidPercent(self.kick_penalty_percent));
        }
        if self.epoch_length == 0 {
            return Err(ConfigError::ZeroEpochLength);
        }
        if self.minimum_stake.is_zero() {
            return Err(ConfigError::ZeroMinimumStake);
        }
        if self.max_scope_width == 0 || self.max_scope_width > MAX_SCOPE_WIDTH {
            return Err(ConfigError::InvalidScopeWidth(self.max_scope_width));
        }
        Ok(())
    }

    /// Staking lifecycle parameters
    pub fn staking_params(&self) -> StakingParams {
        StakingParams {
            minimum_stake: self.minimum_stake,
            epoch_length: self.epoch_length,
            kick_penalty_percent: self.kick_penalty_percent,
            kick_vote_retention: self.kick_vote_retention,
            epoch_reward: self.epoch_reward,
            admin: self.admin,
        }
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = Self::from_json(&std::fs::read_to_string(path)?)?;
        debug!(
            target: "keynet::config",
            path = %path.display(),
            network = ?config.network,
            "Config loaded"
        );
        Ok(config)
    }

    /// Validate and write the config to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        self.validate()?;
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        info!(
            target: "keynet::config",
            path = %path.display(),
            network = ?self.network,
            "Config written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_presets() {
        let devnet = NetworkConfig::devnet();
        assert_eq!(devnet.minimum_stake, U256::from(100u64));
        assert_eq!(devnet.epoch_length, 1);
        assert!(devnet.validate().is_ok());

        let mainnet = NetworkConfig::mainnet(Address::repeat_byte(1));
        assert_eq!(mainnet.network, NetworkType::Mainnet);
        assert_eq!(mainnet.admin, Address::repeat_byte(1));
        assert!(mainnet.minimum_stake > devnet.minimum_stake);
    }

    #[test]
    fn test_validation() {
        let mut config = NetworkConfig::devnet();
        config.kick_penalty_percent = 101;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPercent(101))));

        let mut config = NetworkConfig::devnet();
        config.epoch_length = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroEpochLength)));

        let mut config = NetworkConfig::devnet();
        config.minimum_stake = U256::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroMinimumStake)));

        let mut config = NetworkConfig::devnet();
        config.max_scope_width = 257;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidScopeWidth(257))));
    }

    #[test]
    fn test_staking_params() {
        let mut config = NetworkConfig::testnet(Address::repeat_byte(9));
        config.kick_vote_retention = KickVoteRetention::Persistent;

        let params = config.staking_params();
        assert_eq!(params.minimum_stake, U256::from(presets::TESTNET_MINIMUM_STAKE));
        assert_eq!(params.kick_vote_retention, KickVoteRetention::Persistent);
        assert_eq!(params.admin, Address::repeat_byte(9));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.json");

        let config = NetworkConfig::testnet(Address::repeat_byte(2));
        config.save(&path).unwrap();
        assert_eq!(NetworkConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.json");

        let mut config = NetworkConfig::devnet();
        config.epoch_length = 0;
        std::fs::write(&path, config.to_json().unwrap()).unwrap();

        assert!(matches!(NetworkConfig::load(&path), Err(ConfigError::ZeroEpochLength)));
        assert!(matches!(
            NetworkConfig::load(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_optional_fields_default() {
        let json = r#"{
            "network": "devnet",
            "minimum_stake": "0x64",
            "epoch_length": 5,
            "kick_penalty_percent": 10,
            "max_scope_width": 256,
            "admin": "0x0000000000000000000000000000000000000000"
        }"#;
        let config = NetworkConfig::from_json(json).unwrap();
        assert_eq!(config.kick_vote_retention, KickVoteRetention::PerEpoch);
        assert_eq!(config.epoch_reward, U256::ZERO);
        assert_eq!(config.minimum_stake, U256::from(100u64));
    }
}
