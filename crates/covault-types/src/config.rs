//! Configuration management for covault

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovaultConfig {
    pub chain: ChainConfig,
    pub coordination: CoordinationConfig,
}

/// Chain-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain ID the tracked account lives on
    pub id: String,
    /// Bech32 prefix for rendered addresses
    pub account_prefix: String,
}

/// Remote coordination service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Whether a coordination service is configured at all
    pub enabled: bool,
    /// Service endpoint
    pub endpoint: String,
    /// Chain IDs the service indexes; chains outside this list fall back to
    /// the local substrate
    pub supported_chains: Vec<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CovaultConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig {
                id: "covault-local".to_string(),
                account_prefix: "cov".to_string(),
            },
            coordination: CoordinationConfig {
                enabled: false,
                endpoint: "http://localhost:8787".to_string(),
                supported_chains: Vec::new(),
                timeout_secs: 30,
            },
        }
    }
}

impl CovaultConfig {
    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: CovaultConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get default configuration directory
    pub fn default_config_dir() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            home.join(".covault")
        } else {
            PathBuf::from(".covault")
        }
    }

    /// Get default configuration file path
    pub fn default_config_file() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Load configuration from the default location or fall back to defaults
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_file();
        if config_path.exists() {
            Self::load_from_file(config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Whether the coordination service covers the given chain
    pub fn coordination_supports_chain(&self, chain_id: &str) -> bool {
        self.coordination.enabled
            && self
                .coordination
                .supported_chains
                .iter()
                .any(|c| c == chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CovaultConfig::default();
        assert_eq!(config.chain.account_prefix, "cov");
        assert!(!config.coordination.enabled);
        assert!(!config.coordination_supports_chain("covault-local"));
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = CovaultConfig::default();
        config.coordination.enabled = true;
        config.coordination.supported_chains = vec!["covault-local".to_string()];
        config.save_to_file(&path).unwrap();

        let loaded = CovaultConfig::load_from_file(&path).unwrap();
        assert!(loaded.coordination_supports_chain("covault-local"));
        assert!(!loaded.coordination_supports_chain("other-chain"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(CovaultConfig::load_from_file("/nonexistent/config.toml").is_err());
    }
}
