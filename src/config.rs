//! Configuration handling for vpn-leak-check
//!
//! Every field has a built-in default, so the config file is optional and
//! may set only the values it cares about.

use crate::resolver::{default_services, RetryPolicy, Service, Strategy};
use crate::verdict::BlockRule;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub resolver: ResolverConfig,
    pub probe: ProbeConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub strategy: Strategy,
    /// Attempt cap for the single-retry strategy
    pub max_attempts: u32,
    /// Per-request timeout unless a service sets its own
    pub timeout_secs: u64,
    pub retry_delay_ms: u64,
    /// Lookup services, in fallback order
    pub services: Vec<Service>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            strategy: Strategy::default(),
            max_attempts: policy.max_attempts,
            timeout_secs: policy.timeout.as_secs(),
            retry_delay_ms: u64::try_from(policy.retry_delay.as_millis()).unwrap_or(u64::MAX),
            services: default_services(),
        }
    }
}

impl ResolverConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            timeout: Duration::from_secs(self.timeout_secs),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Check the VPN process and interface before resolving
    pub enabled: bool,
    pub process_name: String,
    pub interface: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            process_name: "openvpn".to_string(),
            interface: "tun0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Identities that must never be seen as the egress, e.g. the home ISP
    pub blocklist: Vec<BlockRule>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// `<config dir>/vpn-leak-check/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("vpn-leak-check").join("config.toml"))
    }

    /// Load an explicit path, or the default path if it exists, or defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            debug!("Loading config from {}", path.display());
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                debug!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => {
                debug!("No config file, using built-in defaults");
                Ok(Self::default())
            }
        }
    }
}
