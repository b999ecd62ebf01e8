//! Configuration for the chain and the HTTP node

use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fs;
use std::path::Path;

use crate::blockchain::difficulty::MAX_DIFFICULTY_BITS;
use crate::blockchain::Difficulty;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid mining reward: {0}")]
    InvalidReward(f64),

    #[error("Invalid difficulty: {0} bits (at most {max})", max = MAX_DIFFICULTY_BITS)]
    InvalidDifficulty(u32),
}

/// When the reward for a mined block is credited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardPolicy {
    /// The reward is queued as a pending transaction and sealed by the next mine
    #[default]
    Deferred,
    /// The reward is appended to the block being mined
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_mining_reward")]
    pub mining_reward: f64,
    #[serde(default)]
    pub reward_policy: RewardPolicy,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::default(),
            mining_reward: default_mining_reward(),
            reward_policy: RewardPolicy::default(),
        }
    }
}

impl ChainConfig {
    /// Sets the difficulty from a raw bit count
    ///
    /// # Arguments
    ///
    /// * `bits` - Leading zero bits required of a block hash
    ///
    /// # Returns
    ///
    /// `ConfigError::InvalidDifficulty` if no SHA-256 hash can have that many zero bits
    pub fn set_difficulty_bits(&mut self, bits: u32) -> Result<(), ConfigError> {
        self.difficulty =
            Difficulty::try_from(bits).map_err(|_| ConfigError::InvalidDifficulty(bits))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty.bits() > MAX_DIFFICULTY_BITS {
            return Err(ConfigError::InvalidDifficulty(self.difficulty.bits()));
        }

        if !self.mining_reward.is_finite() || self.mining_reward < 0.0 {
            return Err(ConfigError::InvalidReward(self.mining_reward));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub chain: ChainConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            chain: ChainConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Loads configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        contents.parse()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chain.validate()
    }
}

impl std::str::FromStr for NodeConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: NodeConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

fn default_mining_reward() -> f64 {
    12.5
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config: NodeConfig = "".parse().unwrap();

        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.port, 8080);
        assert_eq!(config.chain.difficulty.bits(), 8);
        assert_eq!(config.chain.mining_reward, 12.5);
        assert_eq!(config.chain.reward_policy, RewardPolicy::Deferred);
    }

    #[test]
    fn test_parse_full_config() {
        let config: NodeConfig = r#"
            host = "0.0.0.0"
            port = 9000

            [chain]
            difficulty = 12
            mining_reward = 50.0
            reward_policy = "immediate"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.chain.difficulty.bits(), 12);
        assert_eq!(config.chain.mining_reward, 50.0);
        assert_eq!(config.chain.reward_policy, RewardPolicy::Immediate);
    }

    #[test]
    fn test_rejects_bad_values() {
        let too_hard = "[chain]\ndifficulty = 300\n".parse::<NodeConfig>();
        assert!(matches!(too_hard, Err(ConfigError::Parse(_))));

        let negative = "[chain]\nmining_reward = -1.0\n".parse::<NodeConfig>();
        assert!(matches!(negative, Err(ConfigError::InvalidReward(_))));
    }

    #[test]
    fn test_set_difficulty_bits() {
        let mut config = ChainConfig::default();

        config.set_difficulty_bits(16).unwrap();
        assert_eq!(config.difficulty.bits(), 16);

        config.set_difficulty_bits(MAX_DIFFICULTY_BITS).unwrap();
        assert_eq!(config.difficulty.bits(), MAX_DIFFICULTY_BITS);

        let result = config.set_difficulty_bits(300);
        assert!(matches!(result, Err(ConfigError::InvalidDifficulty(300))));
        assert_eq!(config.difficulty.bits(), MAX_DIFFICULTY_BITS);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 3000\n[chain]\ndifficulty = 4").unwrap();

        let config = NodeConfig::load(file.path()).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.chain.difficulty.bits(), 4);
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_load_missing_file() {
        let result = NodeConfig::load("/nonexistent/hashchain.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
