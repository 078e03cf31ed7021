use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::Device;

pub mod settings;

pub use settings::{
    AuthSettings, ConnectionSettings, DhcpSettings, InventorySettings, ProbeModeSetting,
    PublishSettings, SamplingSettings, Settings,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

/// Конфигурация верхнего уровня: парк устройств и настройки.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub devices: Vec<Device>,
    #[serde(default)]
    pub settings: Settings,
}

impl AppConfig {
    /// Загружает, применяет переменные окружения `SNMP_*` и проверяет.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_yaml_str(&content)?;
        config.apply_overrides(|key| env::var(key).ok());
        config.fill_device_defaults();
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(content)?)
    }

    /// `SNMP_COMMUNITY` заменяет community по умолчанию, `SNMP_TIMEOUT`
    /// (целые секунды) таймаут запроса.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(community) = lookup("SNMP_COMMUNITY") {
            self.settings.auth.community = community;
        }
        if let Some(secs) = lookup("SNMP_TIMEOUT").and_then(|s| s.trim().parse::<u64>().ok()) {
            self.settings.connection.timeout = Duration::from_secs(secs);
        }
    }

    /// Устройства без своего community получают значение по умолчанию.
    pub fn fill_device_defaults(&mut self) {
        for device in &mut self.devices {
            if device.community.is_empty() {
                device.community = self.settings.auth.community.clone();
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::Validation("no devices configured".to_string()));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "device at {} has an empty name",
                    device.address
                )));
            }
            if device.address.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "device '{}' has an empty address",
                    device.name
                )));
            }
            if !seen.insert(device.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate device name '{}'",
                    device.name
                )));
            }
        }

        let s = &self.settings;
        if s.connection.timeout.is_zero() {
            return Err(ConfigError::Validation("connection.timeout must be > 0".to_string()));
        }
        if s.connection.max_repetitions == 0 {
            return Err(ConfigError::Validation(
                "connection.max_repetitions must be > 0".to_string(),
            ));
        }
        if s.inventory.max_index_probe < 2 {
            return Err(ConfigError::Validation(
                "inventory.max_index_probe must be >= 2".to_string(),
            ));
        }
        if s.inventory.max_concurrency == 0 {
            return Err(ConfigError::Validation(
                "inventory.max_concurrency must be > 0".to_string(),
            ));
        }
        if s.sampling.interval.is_zero() || s.sampling.duration.is_zero() {
            return Err(ConfigError::Validation(
                "sampling.duration and sampling.interval must be > 0".to_string(),
            ));
        }
        if let Err(e) = s.dhcp.pool() {
            return Err(ConfigError::Validation(format!("dhcp.pool: {e}")));
        }

        Ok(())
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }

    pub fn debug_config(&self) {
        tracing::debug!(
            devices = self.devices.len(),
            timeout = ?self.settings.connection.timeout,
            max_index_probe = self.settings.inventory.max_index_probe,
            probe_mode = ?self.settings.inventory.probe_mode,
            drop_policy = ?self.settings.inventory.drop_policy,
            "configuration loaded"
        );
    }
}
