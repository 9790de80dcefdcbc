//! StoreWrapper configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::TransactionMode;

/// Errors from loading or validating a `StoreConfig`
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store name must not be empty")]
    EmptyStoreName,

    #[error("schema version must be greater than 0")]
    InvalidVersion,
}

/// Configuration for a `StoreWrapper`.
///
/// The database and its single object store share `store_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Database and object store name
    pub store_name: String,
    /// Mode every transaction is opened with
    #[serde(default)]
    pub mode: TransactionMode,
    /// Schema version to open; `None` opens the current version
    #[serde(default)]
    pub version: Option<u32>,
}

impl StoreConfig {
    pub fn new(store_name: impl Into<String>, mode: TransactionMode) -> Self {
        Self {
            store_name: store_name.into(),
            mode,
            version: None,
        }
    }

    /// Open a specific schema version; a newer version triggers an upgrade.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_mode(mut self, mode: TransactionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Parse and validate a config from JSON, e.g.
    /// `{"storeName": "settings", "mode": "readwrite"}`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_name.is_empty() {
            return Err(ConfigError::EmptyStoreName);
        }
        if self.version == Some(0) {
            return Err(ConfigError::InvalidVersion);
        }
        Ok(())
    }
}
