//! Client configuration
//!
//! Loaded from a JSON file; every field has a default so partial files work.

use crate::client::events::DEFAULT_EVENT_CAPACITY;
use crate::contract::{DescriptorError, RemoteContractDescriptor};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Address the counter/message contract was deployed at
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x0f568c487a0fEB05202379F689f7D79CFfef5176";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),
}

/// State client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub contract_address: String,
    /// JSON ABI to build the descriptor from; the built-in one otherwise
    pub abi_path: Option<PathBuf>,
    /// `None` waits for the account holder indefinitely
    pub authorization_timeout_ms: Option<u64>,
    pub write_timeout_ms: Option<u64>,
    pub read_timeout_ms: Option<u64>,
    pub event_capacity: usize,
    pub data_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
            abi_path: None,
            authorization_timeout_ms: Some(120_000),
            write_timeout_ms: Some(300_000),
            read_timeout_ms: Some(30_000),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            data_dir: PathBuf::from(".contract_client"),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Build the contract descriptor this configuration points at
    pub fn descriptor(&self) -> Result<RemoteContractDescriptor, ConfigError> {
        match &self.abi_path {
            Some(path) => Ok(RemoteContractDescriptor::from_abi_file(
                &self.contract_address,
                path,
            )?),
            None => Ok(RemoteContractDescriptor::counter_message(
                &self.contract_address,
            )),
        }
    }

    pub fn authorization_timeout(&self) -> Option<Duration> {
        self.authorization_timeout_ms.map(Duration::from_millis)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout_ms.map(Duration::from_millis)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    /// File the development ledger is persisted to
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.json")
    }

    /// File the local wallet is persisted to
    pub fn wallet_path(&self) -> PathBuf {
        self.data_dir.join("wallet.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::COUNTER_MESSAGE_ABI;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{ "write_timeout_ms": 5000 }"#).unwrap();

        assert_eq!(config.write_timeout(), Some(Duration::from_millis(5000)));
        assert_eq!(config.contract_address, DEFAULT_CONTRACT_ADDRESS);
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn test_save_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.json");

        let config = ClientConfig {
            authorization_timeout_ms: None,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = ClientConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.authorization_timeout(), None);
    }

    #[test]
    fn test_descriptor_from_abi_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let abi_path = temp_dir.path().join("abi.json");
        fs::write(&abi_path, COUNTER_MESSAGE_ABI).unwrap();

        let config = ClientConfig {
            abi_path: Some(abi_path),
            ..Default::default()
        };
        let descriptor = config.descriptor().unwrap();
        assert_eq!(descriptor.address(), DEFAULT_CONTRACT_ADDRESS);
        assert!(descriptor.operation("setMessage").is_some());
    }
}
