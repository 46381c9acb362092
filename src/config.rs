//! Run configuration
//!
//! Loaded from a YAML file (camelCase keys, every key optional) with
//! passwords overridable from the environment.

use crate::array::WbemConfig;
use crate::error::{Error, Result};
use crate::export::CopySettings;
use crate::inventory::InventoryClientConfig;
use crate::reconcile::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Names the configuration file
pub const CONFIG_PATH_ENV: &str = "REPLICA_PAIRING_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "replica-pairing.yaml";
pub const ARRAY_PASSWORD_ENV: &str = "REPLICA_PAIRING_ARRAY_PASSWORD";
pub const INVENTORY_PASSWORD_ENV: &str = "REPLICA_PAIRING_INVENTORY_PASSWORD";

/// Login for one management endpoint
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            password: String::new(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PairingConfig {
    /// WBEM provider base URL
    pub array_endpoint: String,
    pub array_credentials: Credentials,
    /// CIM namespace of the array provider
    pub array_namespace: String,
    /// Inventory endpoint base URL
    pub inventory_endpoint: String,
    pub inventory_credentials: Credentials,
    /// CopyType written to the failover document
    pub copy_type: String,
    /// CopyMode written to the failover document
    pub copy_mode: String,
    pub staleness_threshold_minutes: u32,
    /// Continue on stale array data and log at debug level
    pub diagnostics_enabled: bool,
    pub verify_tls: bool,
    pub request_timeout_secs: u64,
    pub log_json: bool,
    pub output_directory: PathBuf,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            array_endpoint: "http://192.168.1.1:5988".to_string(),
            array_credentials: Credentials::new("admin"),
            array_namespace: "root/emc".to_string(),
            inventory_endpoint: "https://192.168.1.2:443".to_string(),
            inventory_credentials: Credentials::new("administrator@vsphere.local"),
            copy_type: "SNAPVX".to_string(),
            copy_mode: "NOCOPY".to_string(),
            staleness_threshold_minutes: 15,
            diagnostics_enabled: false,
            verify_tls: false,
            request_timeout_secs: 60,
            log_json: false,
            output_directory: PathBuf::from("."),
        }
    }
}

impl PairingConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load from the file named by `REPLICA_PAIRING_CONFIG`, then apply
    /// password overrides and validate
    pub fn load() -> Result<Self> {
        let (path, explicit) = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => (PathBuf::from(path), true),
            Err(_) => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        let mut config = Self::load_file(&path, explicit)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read a config file; a missing file is only an error when `required`
    pub fn load_file(path: &Path, required: bool) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                debug!("Loading configuration from {}", path.display());
                Self::from_yaml(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                debug!("No configuration file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Configuration(format!(
                "cannot read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Replace passwords with values from `lookup`, when set
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(password) = lookup(ARRAY_PASSWORD_ENV) {
            self.array_credentials.password = password;
        }
        if let Some(password) = lookup(INVENTORY_PASSWORD_ENV) {
            self.inventory_credentials.password = password;
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (key, endpoint) in [
            ("arrayEndpoint", &self.array_endpoint),
            ("inventoryEndpoint", &self.inventory_endpoint),
        ] {
            reqwest::Url::parse(endpoint)
                .map_err(|e| Error::Configuration(format!("{} '{}': {}", key, endpoint, e)))?;
        }
        if self.copy_type.trim().is_empty() {
            return Err(Error::Configuration("copyType must not be empty".into()));
        }
        if self.copy_mode.trim().is_empty() {
            return Err(Error::Configuration("copyMode must not be empty".into()));
        }
        if self.staleness_threshold_minutes == 0 {
            return Err(Error::Configuration(
                "stalenessThresholdMinutes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn wbem_config(&self) -> WbemConfig {
        WbemConfig {
            endpoint: self.array_endpoint.clone(),
            username: self.array_credentials.username.clone(),
            password: self.array_credentials.password.clone(),
            namespace: self.array_namespace.clone(),
            verify_tls: self.verify_tls,
            timeout: self.timeout(),
        }
    }

    pub fn inventory_client_config(&self) -> InventoryClientConfig {
        InventoryClientConfig {
            endpoint: self.inventory_endpoint.clone(),
            username: self.inventory_credentials.username.clone(),
            password: self.inventory_credentials.password.clone(),
            verify_tls: self.verify_tls,
            timeout: self.timeout(),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            staleness_threshold_minutes: i64::from(self.staleness_threshold_minutes),
            diagnostics_enabled: self.diagnostics_enabled,
        }
    }

    pub fn copy_settings(&self) -> CopySettings {
        CopySettings {
            copy_type: self.copy_type.clone(),
            copy_mode: self.copy_mode.clone(),
        }
    }
}
